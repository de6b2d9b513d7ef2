//! Archive extraction.
//!
//! Archives are gzip-compressed tarballs. Entries keep their relative paths
//! under the destination, except that a single top-level `package/`
//! directory (the usual registry tarball layout) is stripped.

use super::error::PkgError;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tar::Archive;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Extract `archive_path` into `dest_dir` without blocking the runtime.
///
/// # Errors
/// See [`extract_archive`].
pub async fn extract(archive_path: &Path, dest_dir: &Path) -> Result<(), PkgError> {
    let archive_path = archive_path.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();

    tokio::task::spawn_blocking(move || extract_archive(&archive_path, &dest_dir))
        .await
        .map_err(|e| PkgError::extract_failed(format!("Extraction task failed: {e}")))?
}

/// Extract a `.tar.gz` archive into `dest_dir`.
///
/// Extraction goes to a temp directory beside `dest_dir`, which then
/// replaces `dest_dir` (an existing tree is removed first). Either the whole
/// archive lands or an error is returned and `dest_dir` is left as it was.
///
/// # Errors
/// Returns an error if the archive cannot be read or decoded, contains
/// absolute or escaping paths, or the files cannot be written.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<(), PkgError> {
    let parent = dest_dir
        .parent()
        .ok_or_else(|| PkgError::extract_failed("Destination has no parent"))?;
    fs::create_dir_all(parent).map_err(|e| {
        PkgError::extract_failed(format!("Failed to create '{}': {e}", parent.display()))
    })?;

    let temp_dir = parent.join(format!(
        ".tmp-{}-{}-{}",
        dest_dir
            .file_name()
            .map_or_else(|| "pkg".into(), |n| n.to_string_lossy()),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    if temp_dir.exists() {
        let _ = fs::remove_dir_all(&temp_dir);
    }
    fs::create_dir_all(&temp_dir).map_err(|e| {
        PkgError::extract_failed(format!("Failed to create '{}': {e}", temp_dir.display()))
    })?;

    let result = extract_tgz_to(archive_path, &temp_dir).and_then(|()| {
        let root = extracted_root(&temp_dir)?;
        move_into_place(&root, dest_dir)
    });

    let _ = fs::remove_dir_all(&temp_dir);
    result
}

/// `temp/package` if that is the only top-level entry, otherwise `temp`.
fn extracted_root(temp_dir: &Path) -> Result<PathBuf, PkgError> {
    let entries: Vec<_> = fs::read_dir(temp_dir)
        .map_err(|e| PkgError::extract_failed(format!("Failed to read extracted dir: {e}")))?
        .filter_map(Result::ok)
        .collect();

    if let [only] = entries.as_slice() {
        if only.file_name() == "package" && only.path().is_dir() {
            return Ok(only.path());
        }
    }

    Ok(temp_dir.to_path_buf())
}

fn move_into_place(src: &Path, dest_dir: &Path) -> Result<(), PkgError> {
    if dest_dir.exists() {
        fs::remove_dir_all(dest_dir).map_err(|e| {
            PkgError::extract_failed(format!(
                "Failed to replace existing '{}': {e}",
                dest_dir.display()
            ))
        })?;
    }

    if let Err(rename_err) = fs::rename(src, dest_dir) {
        // Cross-filesystem fallback
        if let Err(copy_err) = copy_dir_all(src, dest_dir) {
            let _ = fs::remove_dir_all(dest_dir);
            return Err(PkgError::extract_failed(format!(
                "Failed to move or copy extracted package: rename={rename_err}, copy={copy_err}"
            )));
        }
    }

    Ok(())
}

fn extract_tgz_to(archive_path: &Path, dest: &Path) -> Result<(), PkgError> {
    let file = File::open(archive_path).map_err(|e| {
        PkgError::extract_failed(format!(
            "Failed to open archive '{}': {e}",
            archive_path.display()
        ))
    })?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

    for entry in archive
        .entries()
        .map_err(|e| PkgError::extract_failed(format!("Failed to read archive entries: {e}")))?
    {
        let mut entry = entry
            .map_err(|e| PkgError::extract_failed(format!("Failed to read archive entry: {e}")))?;

        let path = entry
            .path()
            .map_err(|e| PkgError::extract_failed(format!("Failed to read entry path: {e}")))?
            .into_owned();
        let path_str = path.to_string_lossy();

        if path.is_absolute() {
            return Err(PkgError::extract_failed(format!(
                "Archive contains absolute path: {path_str}"
            )));
        }

        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(PkgError::extract_failed(format!(
                "Archive contains path traversal: {path_str}"
            )));
        }

        let dest_path = dest.join(&path);

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path).map_err(|e| write_failed(&path_str, &e))?;
        } else if entry_type.is_file() {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent).map_err(|e| write_failed(&path_str, &e))?;
            }
            let mut file = File::create(&dest_path).map_err(|e| write_failed(&path_str, &e))?;
            io::copy(&mut entry, &mut file).map_err(|e| {
                PkgError::extract_failed(format!("Failed to decode '{path_str}': {e}"))
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(mode) = entry.header().mode() {
                    let _ = fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode));
                }
            }
        }
        // Symlinks and special entries are skipped
    }

    Ok(())
}

fn write_failed(path: &str, e: &io::Error) -> PkgError {
    PkgError::extract_failed(format!("Failed to write '{path}': {e}"))
}

fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else if ty.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}
