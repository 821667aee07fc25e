#![doc = include_str!("../README.md")]

pub mod cli;
pub mod command;
pub mod error;
pub mod fs;
pub mod validation;

pub use error::*;
pub use fs::{AtomicFile, AtomicWriter, WriteMode, atomic_write};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = cli::Cli::parse();
    init_logging(cli.log_level());
    command::write::execute(cli.write)
}

/// Installs the global logger. `RUST_LOG` takes precedence over `default`.
fn init_logging(default: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}
