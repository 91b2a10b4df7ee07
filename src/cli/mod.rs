//! Command-line interface: argument parsing, command dispatch and the text report

pub mod args;
pub mod commands;
pub mod report;
