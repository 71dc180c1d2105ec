//! storeql CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`, which prints the
//! JSON result or error document. Exits non-zero on failure.

use storeql::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
