//! Archive cache management.
//!
//! Downloaded archives are kept flat in the cache directory, keyed by
//! archive file name (`{name}-{version}.tar.gz` unless the registry names
//! the file).

use super::error::PkgError;
use super::info::PackageInfo;
use spm_util::hash::file_matches_md5;
use std::path::PathBuf;

/// Archive cache.
#[derive(Debug, Clone)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    /// Create a cache rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Expected cache path of a package's archive.
    #[must_use]
    pub fn archive_path(&self, info: &PackageInfo) -> PathBuf {
        self.root.join(info.archive_filename())
    }

    /// Check whether the cached archive for `info` can be used as is.
    ///
    /// True only if the file exists and its MD5 equals the registry-declared
    /// hash. Packages without a declared hash never hit the cache.
    pub async fn verify(&self, info: &PackageInfo) -> Result<bool, PkgError> {
        let Some(expected) = info.md5.clone() else {
            return Ok(false);
        };
        let path = self.archive_path(info);
        if !path.is_file() {
            return Ok(false);
        }

        tokio::task::spawn_blocking(move || file_matches_md5(&path, &expected))
            .await
            .map_err(|e| PkgError::cache_error(format!("Hash task failed: {e}")))
    }
}
