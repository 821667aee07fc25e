//! Error types for atomic-scribe.
//!
//! Fallible operations return `Result<T, E>` which aliases
//! `Result<T, Error<E>>`. `E` is the error type of the caller's own code and
//! defaults to [`Infallible`] for operations that never run caller code.

use std::convert::Infallible;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filesystem step that produced a [`Error::Resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Validating and resolving the target path.
    Resolve,
    /// Creating the temporary file.
    Create,
    /// Finishing text that ended mid-character.
    Decode,
    /// Flushing the temporary file to stable storage.
    Sync,
    /// Renaming the temporary file over the target.
    Replace,
    /// Linking the temporary file to a target that must not exist.
    Move,
    /// Deleting the temporary file.
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Resolve => "resolve",
            Operation::Create => "create temporary file for",
            Operation::Decode => "decode text for",
            Operation::Sync => "sync",
            Operation::Replace => "replace",
            Operation::Move => "move into",
            Operation::Remove => "remove temporary file",
        };
        f.write_str(verb)
    }
}

/// Errors from atomic write operations.
#[derive(Debug, Error)]
pub enum Error<E = Infallible> {
    /// Commit with overwrite disabled found a file at the target.
    ///
    /// `source` is the OS error (kind `AlreadyExists`, code `EEXIST`).
    /// The existing file is untouched and the temporary file is gone.
    #[error("Destination already exists: {}", .path.display())]
    DestinationExists {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File system operation failed.
    #[error("Failed to {op} {}: {source}", .path.display())]
    Resource {
        op: Operation,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Error returned by the caller's code inside the write scope.
    ///
    /// Carried verbatim; cleanup errors never replace it.
    #[error("{0}")]
    Caller(E),
}

/// Result type alias for atomic-scribe operations.
pub type Result<T, E = Infallible> = std::result::Result<T, Error<E>>;

impl<E> Error<E> {
    /// Returns true if a commit was refused because the target exists.
    pub fn is_destination_exists(&self) -> bool {
        matches!(self, Error::DestinationExists { .. })
    }

    /// Returns true if the error came from the caller's own code.
    pub fn is_caller(&self) -> bool {
        matches!(self, Error::Caller(_))
    }

    /// The underlying OS error, unless this is a caller error.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Error::DestinationExists { source, .. } | Error::Resource { source, .. } => {
                Some(source)
            }
            Error::Caller(_) => None,
        }
    }

    /// Raw OS error code, e.g. `EEXIST` for [`Error::DestinationExists`].
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_error().and_then(io::Error::raw_os_error)
    }

    /// Path the failing operation was working on.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::DestinationExists { path, .. } | Error::Resource { path, .. } => {
                Some(path.as_path())
            }
            Error::Caller(_) => None,
        }
    }

    /// Extracts the caller's error.
    pub fn into_caller(self) -> Option<E> {
        match self {
            Error::Caller(e) => Some(e),
            _ => None,
        }
    }
}

impl Error<Infallible> {
    pub(crate) fn resource(op: Operation, path: &Path, source: io::Error) -> Self {
        Error::Resource {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Widens an error raised outside caller code to any caller error type.
    pub(crate) fn cast<E>(self) -> Error<E> {
        match self {
            Error::DestinationExists { path, source } => Error::DestinationExists { path, source },
            Error::Resource { op, path, source } => Error::Resource { op, path, source },
            Error::Caller(never) => match never {},
        }
    }
}

impl From<Error<Infallible>> for io::Error {
    fn from(err: Error<Infallible>) -> Self {
        io::Error::from(err.cast::<io::Error>())
    }
}

/// Flattens into the underlying `io::Error`.
///
/// A caller error comes back as the exact value the caller returned.
impl From<Error<io::Error>> for io::Error {
    fn from(err: Error<io::Error>) -> Self {
        match err {
            Error::DestinationExists { source, .. } | Error::Resource { source, .. } => source,
            Error::Caller(e) => e,
        }
    }
}
