use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Checks that `path` can name a regular file.
pub fn validate_target(path: &Path) -> io::Result<()> {
    let raw = path.as_os_str();
    if raw.is_empty() {
        return Err(invalid(path, "path cannot be empty"));
    }

    if raw.to_string_lossy().ends_with(std::path::is_separator) {
        return Err(invalid(path, "path ends with a separator"));
    }

    if path.file_name().is_none() {
        return Err(invalid(path, "path does not name a file"));
    }

    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Err(io::Error::new(
            io::ErrorKind::IsADirectory,
            format!("{} is a directory", path.display()),
        )),
        _ => Ok(()),
    }
}

/// Resolves `path` against the current working directory.
///
/// Returns the absolute target and the directory that will hold the
/// temporary file. The target is fixed here; later changes to the working
/// directory do not move it.
pub fn resolve_target(path: &Path) -> io::Result<(PathBuf, PathBuf)> {
    validate_target(path)?;

    let target = std::path::absolute(path)?;
    let dir = target
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| invalid(path, "path has no parent directory"))?;

    log::debug!("Resolved {} to {}", path.display(), target.display());
    Ok((target, dir))
}

fn invalid(path: &Path, reason: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid path '{}': {}", path.display(), reason),
    )
}
