use bikeshare_etl::cli::{args::Args, commands};
use clap::Parser;
use std::process;

fn main() {
    let args = Args::parse();

    match commands::run(args) {
        Ok(()) => process::exit(0),
        Err(error) => {
            let label = if error.is_fatal() { "Fatal error" } else { "Error" };
            eprintln!("{}: {:#}", label, anyhow::Error::from(error));
            process::exit(1);
        }
    }
}
