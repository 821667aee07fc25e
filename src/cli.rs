use clap::{ArgAction, Parser, ValueEnum};

use crate::command::write::WriteArgs;
use crate::fs::WriteMode;

/// Write stdin (or a file) to a path atomically.
///
/// The destination is only replaced once all input has been written and
/// synced. On any failure it is left exactly as it was.
#[derive(Parser, Debug)]
#[command(name = "atomic-scribe", version)]
pub struct Cli {
    #[command(flatten)]
    pub write: WriteArgs,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Command-line spelling of [`WriteMode`].
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// UTF-8 text with platform line endings
    Text,
    /// Raw bytes, written verbatim
    Binary,
}

impl From<ModeArg> for WriteMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Text => WriteMode::Text,
            ModeArg::Binary => WriteMode::Binary,
        }
    }
}
