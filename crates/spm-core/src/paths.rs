use std::path::{Path, PathBuf};

/// Environment variable to override the spm home directory.
pub const SPM_HOME_ENV: &str = "SPM_HOME";

/// Name of the per-user config file inside the spm home directory.
pub const SPMRC_NAME: &str = "spmrc";

/// Name of the per-project config file.
pub const PROJECT_SPMRC_NAME: &str = ".spmrc";

/// Get the spm home directory.
///
/// `SPM_HOME` wins; otherwise `~/.spm`, falling back to `./.spm` when no
/// home directory can be determined.
#[must_use]
pub fn spm_home() -> PathBuf {
    if let Some(home) = std::env::var_os(SPM_HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }

    dirs_next::home_dir().map_or_else(|| PathBuf::from(".spm"), |p| p.join(".spm"))
}

/// Default archive cache directory under a given spm home.
#[must_use]
pub fn default_cache_dir(home: &Path) -> PathBuf {
    home.join("cache")
}

/// Resolve `path` against `base` unless it is already absolute.
#[must_use]
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
