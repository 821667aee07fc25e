//! Atomic move primitives and durability helpers.
//!
//! Moves go through [`tempfile::TempPath`]:
//!
//! - [`replace_atomic`] is `persist`, a single rename over whatever is at
//!   the destination.
//! - [`move_atomic`] is `persist_noclobber`. On Linux and macOS this is one
//!   `renameat2(RENAME_NOREPLACE)` / `renamex_np(RENAME_EXCL)` call; where
//!   the kernel or filesystem lacks it, the source is hard-linked to the
//!   destination (refused with `EEXIST` if the name exists) and unlinked.
//!   There is no check-then-rename window either way.
//!
//! Source and destination must be on the same filesystem. Once the
//! destination holds the content the move has happened: syncing the
//! directory and removing a leftover source name are logged on failure,
//! never reported as a failed move.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use tempfile::{PathPersistError, TempPath};

/// Atomically moves `src` to `dst`, replacing `dst` if it exists.
pub fn replace_atomic(src: &Path, dst: &Path) -> io::Result<()> {
    move_with(src, dst, true, sync_directory)
}

/// Atomically moves `src` to `dst`, failing if `dst` exists.
///
/// On `AlreadyExists` neither path is modified.
pub fn move_atomic(src: &Path, dst: &Path) -> io::Result<()> {
    move_with(src, dst, false, sync_directory)
}

fn move_with<F>(src: &Path, dst: &Path, overwrite: bool, sync: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let mut source = TempPath::try_from_path(src)?;
    // `src` belongs to the caller and must survive a refused move.
    source.disable_cleanup(true);

    persist(source, dst, overwrite).map_err(|e| e.error)?;
    log::debug!("Moved {} → {}", src.display(), dst.display());

    if !overwrite {
        remove_leftover(src);
    }
    settle(parent_dir(dst), sync);
    Ok(())
}

/// Renames `staged` to `dst`, or links it there only if `dst` is absent.
///
/// On failure `staged` comes back inside the error, still owning its name.
pub(crate) fn persist(
    staged: TempPath,
    dst: &Path,
    overwrite: bool,
) -> Result<(), PathPersistError> {
    if overwrite {
        staged.persist(dst)
    } else {
        staged.persist_noclobber(dst)
    }
}

/// Syncs `dir` after a name was moved into it.
///
/// The new entry is already visible, so a failure is logged and dropped.
pub(crate) fn settle<F>(dir: &Path, sync: F)
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    if let Err(e) = sync(dir) {
        log::warn!("Moved into {} but failed to sync it: {}", dir.display(), e);
    }
}

/// Removes the source name the link fallback of a no-clobber move may leave.
pub(crate) fn remove_leftover(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed leftover name {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove leftover {}: {}", path.display(), e),
    }
}

/// Flushes file content and metadata to stable storage.
pub fn sync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Makes directory entry changes in `dir` durable.
///
/// No-op on platforms that cannot open a directory as a file.
pub fn sync_directory(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        File::open(dir)?.sync_all()
    }

    #[cfg(not(unix))]
    {
        let _ = dir;
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}
