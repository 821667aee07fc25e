//! Scoped atomic file writer.
//!
//! An [`AtomicWriter`] stages content in a temporary file next to the
//! target and moves it into place only when the caller's code succeeds.
//!
//! ## Guarantees
//!
//! - **Atomicity**: readers see the previous file or the complete new one
//! - **No trace on failure**: the temporary file is removed on every exit
//!   path, including panics in caller code
//! - **Root cause**: an error from caller code is returned as-is; errors
//!   while cleaning up are logged and dropped
//! - **No clobber**: with overwrite disabled, an existing target (even one
//!   created after the writer was opened) is never replaced
//!
//! ## States
//!
//! `Open → Committing → Committed` on success, `Open → RollingBack →
//! RolledBack` on failure. Only an open [`AtomicFile`] accepts writes;
//! [`AtomicFile::commit`] and [`AtomicFile::rollback`] consume it.
//!
//! ## Example
//!
//! ```no_run
//! # use atomic_scribe::{AtomicWriter, WriteMode};
//! # use std::io::Write;
//! # fn example() -> std::io::Result<()> {
//! AtomicWriter::new("settings.json")
//!     .overwrite(true)
//!     .mode(WriteMode::Text)
//!     .write(|file| file.write_all(b"{\"theme\": \"dark\"}\n"))?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Operation, Result};
use crate::fs::primitives;
use crate::validation;

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, PathPersistError};

const DEFAULT_TEMP_SUFFIX: &str = ".tmp";
const TEMP_RAND_BYTES: usize = 8;

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// Transfer semantics for data written through an [`AtomicFile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// UTF-8 text; `\n` becomes the platform line ending.
    #[default]
    Text,
    /// Bytes are written verbatim.
    Binary,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Text => f.write_str("text"),
            WriteMode::Binary => f.write_str("binary"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Temporary file exists and accepts writes.
    Open,
    Committing,
    /// Temporary file became the target.
    Committed,
    RollingBack,
    /// Temporary file removed; target untouched by this writer.
    RolledBack,
}

/// Configuration for one atomic write.
///
/// Settings are fixed when the temporary file is created by
/// [`open`](Self::open) or [`write`](Self::write). The writer itself holds
/// no file and can be reused or shared across threads.
#[derive(Debug, Clone)]
pub struct AtomicWriter {
    path: PathBuf,
    overwrite: bool,
    mode: WriteMode,
    temp_prefix: Option<String>,
    temp_suffix: String,
}

impl AtomicWriter {
    /// Creates a writer for `path` with overwrite disabled and text mode.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            overwrite: false,
            mode: WriteMode::default(),
            temp_prefix: None,
            temp_suffix: DEFAULT_TEMP_SUFFIX.to_string(),
        }
    }

    /// Whether commit may replace an existing file.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Prefix for the temporary file name.
    ///
    /// Defaults to `.<target file name>.`.
    pub fn temp_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.temp_prefix = Some(prefix.into());
        self
    }

    /// Suffix for the temporary file name. Defaults to `.tmp`.
    pub fn temp_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.temp_suffix = suffix.into();
        self
    }

    /// Target path as given, before resolution.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn write_mode(&self) -> WriteMode {
        self.mode
    }

    /// Creates the temporary file and returns a handle to it.
    ///
    /// The target is resolved against the current working directory now.
    /// The returned [`AtomicFile`] must be committed; dropping it rolls back.
    pub fn open(&self) -> Result<AtomicFile> {
        let (target, dir) = validation::resolve_target(&self.path)
            .map_err(|e| Error::resource(Operation::Resolve, &self.path, e))?;

        let prefix = match &self.temp_prefix {
            Some(prefix) => prefix.clone(),
            None => default_prefix(&target),
        };

        let temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&self.temp_suffix)
            .rand_bytes(TEMP_RAND_BYTES)
            .tempfile_in(&dir)
            .map_err(|e| {
                log::error!("Failed to create temporary file in {}: {}", dir.display(), e);
                Error::resource(Operation::Create, &target, e)
            })?;

        log::debug!(
            "Staging {} in {} (overwrite: {}, mode: {})",
            target.display(),
            temp.path().display(),
            self.overwrite,
            self.mode
        );

        Ok(AtomicFile {
            target,
            dir,
            overwrite: self.overwrite,
            mode: self.mode,
            temp: Some(temp),
            pending: Vec::new(),
            state: WriterState::Open,
            bytes_written: 0,
        })
    }

    /// Runs `f` against a fresh temporary file, then commits or rolls back.
    ///
    /// - `f` returns `Ok`: the file is committed and `f`'s value returned.
    /// - `f` returns `Err(e)`: the temporary file is removed and
    ///   [`Error::Caller`]`(e)` returned, whatever happens during cleanup.
    /// - `f` panics: the temporary file is removed while unwinding.
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut AtomicFile) -> std::result::Result<T, E>,
    {
        let mut file = self.open().map_err(|e| e.cast::<E>())?;

        match f(&mut file) {
            Ok(value) => {
                file.commit().map_err(|e| e.cast::<E>())?;
                Ok(value)
            }
            Err(e) => {
                file.discard();
                Err(Error::Caller(e))
            }
        }
    }
}

/// Writes `path` atomically through `f`.
///
/// Shorthand for [`AtomicWriter::write`] with the given settings.
pub fn atomic_write<P, T, E, F>(path: P, overwrite: bool, mode: WriteMode, f: F) -> Result<T, E>
where
    P: AsRef<Path>,
    F: FnOnce(&mut AtomicFile) -> std::result::Result<T, E>,
{
    AtomicWriter::new(path)
        .overwrite(overwrite)
        .mode(mode)
        .write(f)
}

fn default_prefix(target: &Path) -> String {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(".{}.", name)
}

/// Open handle to a staged write.
///
/// Implements [`Write`]. Nothing is visible at the target until
/// [`commit`](Self::commit). Dropping an uncommitted handle rolls back.
#[must_use = "AtomicFile must be committed or it is rolled back on drop"]
pub struct AtomicFile {
    target: PathBuf,
    dir: PathBuf,
    overwrite: bool,
    mode: WriteMode,
    temp: Option<NamedTempFile>,
    /// Incomplete UTF-8 sequence at the end of the last text write.
    pending: Vec<u8>,
    state: WriterState,
    bytes_written: u64,
}

impl fmt::Debug for AtomicFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicFile")
            .field("target", &self.target)
            .field("overwrite", &self.overwrite)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}

impl AtomicFile {
    /// Resolved absolute target path.
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Bytes written to the temporary file so far, after line ending
    /// translation.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Writes a string.
    ///
    /// In text mode `\n` is translated; in binary mode the UTF-8 bytes are
    /// written verbatim.
    pub fn write_str(&mut self, text: &str) -> io::Result<()> {
        match self.mode {
            WriteMode::Text if self.pending.is_empty() => self.write_text(text),
            WriteMode::Text => self.write_utf8(text.as_bytes()),
            WriteMode::Binary => self.write_raw(text.as_bytes()),
        }
    }

    fn temp_mut(&mut self) -> io::Result<&mut NamedTempFile> {
        self.temp
            .as_mut()
            .ok_or_else(|| io::Error::other("atomic file is no longer open"))
    }

    fn write_raw(&mut self, buf: &[u8]) -> io::Result<()> {
        self.temp_mut()?.as_file_mut().write_all(buf)?;
        self.bytes_written += buf.len() as u64;
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        if LINE_ENDING == "\n" {
            self.write_raw(text.as_bytes())
        } else {
            self.write_raw(text.replace('\n', LINE_ENDING).as_bytes())
        }
    }

    /// Decodes `buf` after any bytes held back from the previous write.
    ///
    /// A multibyte character split across writes is completed by the next
    /// one; only bytes that can never become valid UTF-8 are rejected.
    fn write_utf8(&mut self, buf: &[u8]) -> io::Result<()> {
        let data = if self.pending.is_empty() {
            Cow::Borrowed(buf)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(buf);
            Cow::Owned(joined)
        };

        let text = match std::str::from_utf8(&data) {
            Ok(text) => text,
            Err(e) if e.error_len().is_none() => {
                let (complete, tail) = data.split_at(e.valid_up_to());
                self.pending = tail.to_vec();
                std::str::from_utf8(complete).map_err(invalid_utf8)?
            }
            Err(e) => return Err(invalid_utf8(e)),
        };
        self.write_text(text)
    }

    /// Makes the written content visible at the target.
    ///
    /// Syncs and closes the temporary file, then renames it over the target
    /// (overwrite enabled) or moves it into place only if the target does
    /// not exist (overwrite disabled). On any failure the temporary file is
    /// removed and the target is left as it was.
    ///
    /// Once the target holds the new content the commit has succeeded;
    /// failing to sync the directory afterwards is only logged.
    pub fn commit(self) -> Result<()> {
        self.commit_with(primitives::sync_directory)
    }

    fn commit_with<F>(mut self, sync_dir: F) -> Result<()>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let temp = self.take_temp()?;
        self.state = WriterState::Committing;

        match self.persist(temp) {
            Ok(()) => {
                self.state = WriterState::Committed;
                log::debug!(
                    "Committed {} ({} bytes)",
                    self.target.display(),
                    self.bytes_written
                );
                primitives::settle(&self.dir, sync_dir);
                Ok(())
            }
            Err(e) => {
                self.state = WriterState::RolledBack;
                Err(e)
            }
        }
    }

    /// Discards the written content.
    ///
    /// Removes the temporary file and returns any error from doing so. The
    /// target is never touched.
    pub fn rollback(mut self) -> Result<()> {
        let temp = self.take_temp()?;
        self.state = WriterState::RollingBack;
        let result = remove_temp(temp);
        self.state = WriterState::RolledBack;
        result
    }

    /// Rolls back, logging instead of returning cleanup errors.
    fn discard(&mut self) {
        let Some(temp) = self.temp.take() else {
            return;
        };

        self.state = WriterState::RollingBack;
        if let Err(e) = remove_temp(temp) {
            log::warn!("Ignoring cleanup error for {}: {}", self.target.display(), e);
        }
        self.state = WriterState::RolledBack;
        log::debug!("Rolled back write to {}", self.target.display());
    }

    fn take_temp(&mut self) -> Result<NamedTempFile> {
        self.temp.take().ok_or_else(|| {
            Error::resource(
                Operation::Sync,
                &self.target,
                io::Error::other("atomic file is no longer open"),
            )
        })
    }

    fn persist(&self, mut temp: NamedTempFile) -> Result<()> {
        if !self.pending.is_empty() {
            let err = Error::resource(
                Operation::Decode,
                &self.target,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "text ends with an incomplete UTF-8 sequence ({} bytes)",
                        self.pending.len()
                    ),
                ),
            );
            discard_temp(temp, &self.target);
            return Err(err);
        }

        let synced = temp
            .as_file_mut()
            .flush()
            .and_then(|()| primitives::sync_file(temp.as_file()));
        if let Err(e) = synced {
            let err = Error::resource(Operation::Sync, temp.path(), e);
            discard_temp(temp, &self.target);
            return Err(err);
        }

        // Closes the handle; the name is still removed on drop.
        let temp_path = temp.into_temp_path();
        let staged = temp_path.to_path_buf();

        match primitives::persist(temp_path, &self.target, self.overwrite) {
            Ok(()) => {
                if !self.overwrite {
                    primitives::remove_leftover(&staged);
                }
                Ok(())
            }
            Err(PathPersistError { error, path }) => {
                let err = if !self.overwrite && error.kind() == io::ErrorKind::AlreadyExists {
                    log::debug!("Refusing to replace existing {}", self.target.display());
                    Error::DestinationExists {
                        path: self.target.clone(),
                        source: error,
                    }
                } else {
                    let op = if self.overwrite {
                        Operation::Replace
                    } else {
                        Operation::Move
                    };
                    Error::resource(op, &self.target, error)
                };

                if let Err(cleanup) = path.close() {
                    log::warn!(
                        "Failed to remove temporary file for {}: {}",
                        self.target.display(),
                        cleanup
                    );
                }
                Err(err)
            }
        }
    }
}

fn remove_temp(temp: NamedTempFile) -> Result<()> {
    let path = temp.path().to_path_buf();
    temp.close()
        .map_err(|e| Error::resource(Operation::Remove, &path, e))
}

fn discard_temp(temp: NamedTempFile, target: &Path) {
    if let Err(e) = remove_temp(temp) {
        log::warn!("Ignoring cleanup error for {}: {}", target.display(), e);
    }
}

fn invalid_utf8(e: std::str::Utf8Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

impl Write for AtomicFile {
    /// In text mode `buf` must continue valid UTF-8; otherwise `InvalidData`.
    /// A trailing partial character is held until the next write.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.mode {
            WriteMode::Binary => {
                let written = self.temp_mut()?.as_file_mut().write(buf)?;
                self.bytes_written += written as u64;
                Ok(written)
            }
            WriteMode::Text => {
                self.write_utf8(buf)?;
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp_mut()?.as_file_mut().flush()
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if self.state == WriterState::Open && self.temp.is_some() {
            log::warn!(
                "AtomicFile for {} dropped without commit, rolling back",
                self.target.display()
            );
            self.discard();
        }
    }
}
