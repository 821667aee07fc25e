//! Binary entry point for `atomic-scribe`.

use std::process;

fn main() {
    if let Err(e) = atomic_scribe::run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
