//! Raw CSV reading for bronze trip files
//!
//! Every column is read as text (no schema inference) so a single odd value
//! cannot reject a file; typing happens later during normalization.

use crate::error::Result;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Read one raw CSV file with all columns as strings
pub fn read_raw_frame(path: &Path, null_values: &[String]) -> Result<DataFrame> {
    let null_tokens: Vec<PlSmallStr> = null_values
        .iter()
        .map(|token| PlSmallStr::from(token.as_str()))
        .collect();

    let parse_options = CsvParseOptions::default()
        .with_null_values(Some(NullValues::AllColumns(null_tokens)))
        .with_missing_is_null(true)
        .with_truncate_ragged_lines(true);

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(parse_options)
        .into_reader_with_file_handle(File::open(path)?)
        .finish()?;

    debug!(
        "Read {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );

    Ok(df)
}
