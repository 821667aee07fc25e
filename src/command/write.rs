use crate::cli::ModeArg;
use crate::error::Error;
use crate::fs::{AtomicFile, AtomicWriter};
use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Destination file (relative paths resolve against the current directory)
    pub path: PathBuf,

    /// Replace the destination if it already exists
    ///
    /// Without this flag the write fails if the destination exists when the
    /// new content is committed, including a file created by another process
    /// while input was still being read.
    #[arg(long, short = 'f')]
    pub overwrite: bool,

    /// How input bytes are transferred
    #[arg(long, value_enum, default_value_t = ModeArg::Binary)]
    pub mode: ModeArg,

    /// Read input from FILE instead of stdin
    #[arg(long, short = 'i', value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Do not print a summary on success
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

pub fn execute(args: WriteArgs) -> Result<()> {
    let mut input: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(
            File::open(path)
                .with_context(|| format!("Failed to open input {}", path.display()))?,
        ),
        None => Box::new(io::stdin().lock()),
    };

    let writer = AtomicWriter::new(&args.path)
        .overwrite(args.overwrite)
        .mode(args.mode.into());

    log::info!(
        "Writing {} (overwrite: {}, mode: {})",
        args.path.display(),
        args.overwrite,
        writer.write_mode()
    );

    let written = match writer.write(|file| copy_input(&mut input, file)) {
        Ok(written) => written,
        Err(Error::DestinationExists { path, .. }) => {
            bail!(
                "{} already exists (use --overwrite to replace it)",
                path.display()
            )
        }
        Err(Error::Caller(e)) => {
            return Err(anyhow::Error::new(e).context("Failed to copy input"));
        }
        Err(e) => return Err(e.into()),
    };

    log::info!("Committed {} bytes to {}", written, args.path.display());

    if !args.quiet {
        println!(
            "{} Wrote {} bytes to {}",
            "✓".green().bold(),
            written,
            args.path.display()
        );
    }

    Ok(())
}

/// Streams input into `file`, returning the bytes written to disk.
///
/// Text mode validates UTF-8 as it streams; a character split across reads
/// is completed by the next read.
fn copy_input(input: &mut dyn Read, file: &mut AtomicFile) -> io::Result<u64> {
    io::copy(input, file)?;
    Ok(file.bytes_written())
}
