//! Blocking filesystem helpers shared by the local executor and folder trash.

use std::fs;
use std::io;
use std::path::Path;

/// Copy a file or directory tree. Returns the number of bytes copied.
pub(crate) fn copy_path(source: &Path, dest: &Path) -> io::Result<u64> {
    if source.is_dir() {
        copy_dir_recursive(source, dest)
    } else {
        fs::copy(source, dest)
    }
}

/// Recursively copy a directory.
fn copy_dir_recursive(source: &Path, dest: &Path) -> io::Result<u64> {
    fs::create_dir_all(dest)?;

    let mut total_bytes = 0u64;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if path.is_dir() {
            total_bytes += copy_dir_recursive(&path, &dest_path)?;
        } else {
            total_bytes += fs::copy(&path, &dest_path)?;
        }
    }

    Ok(total_bytes)
}

/// Move a file or directory. Tries a rename first and falls back to
/// copy + delete across filesystems.
pub(crate) fn move_path(source: &Path, dest: &Path) -> io::Result<u64> {
    let size = path_size(source);

    match fs::rename(source, dest) {
        Ok(()) => return Ok(size),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(e),
        Err(_) => {}
    }

    copy_path(source, dest)?;
    remove_path(source)?;
    Ok(size)
}

/// Delete a file or directory tree.
pub(crate) fn remove_path(path: &Path) -> io::Result<()> {
    // symlink_metadata so a link to a directory is removed, not followed
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Total size of a file or directory tree. Unreadable entries count as 0.
pub(crate) fn path_size(path: &Path) -> u64 {
    if path.is_dir() {
        fs::read_dir(path)
            .map(|entries| entries.flatten().map(|e| path_size(&e.path())).sum())
            .unwrap_or(0)
    } else {
        fs::metadata(path).map(|m| m.len()).unwrap_or(0)
    }
}

/// Create a link at `link` pointing to `target`.
pub(crate) fn create_link(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }

    #[cfg(windows)]
    {
        if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, link);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "links are not supported on this platform",
        ))
    }
}

/// Whether a path exists, without following a final symlink.
pub(crate) fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}
