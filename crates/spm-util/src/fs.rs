use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Build a sibling temp path for `path`, unique to this process and `tag`.
///
/// The temp lives in the same directory so a later rename stays on one
/// filesystem.
#[must_use]
pub fn sibling_temp_path(path: &Path, tag: &str) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!(
        ".{}.{tag}.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ))
}

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// The file will either have the old contents or the new contents, never a
/// partial write.
///
/// # Errors
/// Returns an error if the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp_path = sibling_temp_path(path, "tmp");

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    replace_file(&temp_path, path)
}

/// Move `from` over `to`, replacing any existing file.
///
/// On failure the source temp file is removed.
///
/// # Errors
/// Returns an error if the rename (and, on Windows, the copy fallback) fails.
pub fn replace_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            // On Windows, rename can fail if target exists.
            if cfg!(windows) {
                let copied = fs::copy(from, to);
                let _ = fs::remove_file(from);
                copied.map(|_| ())
            } else {
                let _ = fs::remove_file(from);
                Err(e)
            }
        }
    }
}
