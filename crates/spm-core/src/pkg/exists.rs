//! Destination layout and the "already installed" check.
//!
//! Packages are extracted to `{destination}/{name}/{version}/`.

use super::downloadlist::DownloadList;
use super::info::DownloadEntry;
use super::spec::PackageSpec;
use std::path::PathBuf;

/// Install destination tree.
#[derive(Debug, Clone)]
pub struct Destination {
    root: PathBuf,
}

impl Destination {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory a package version is extracted into.
    #[must_use]
    pub fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(version)
    }

    /// Whether `{name}/{version}` is present on disk.
    #[must_use]
    pub fn is_installed(&self, name: &str, version: &str) -> bool {
        self.package_dir(name, version).is_dir()
    }
}

/// Decide whether `spec` is already materialized and should be skipped.
///
/// True iff `force` is off, `spec` names a version, and
/// `{destination}/{name}/{version}` exists. When true, `spec` is recorded
/// in `downloads` (idempotently) so later dedup checks treat it as handled.
/// Only touches the filesystem; never the network.
pub async fn check_existing(
    destination: &Destination,
    spec: &PackageSpec,
    force: bool,
    downloads: &DownloadList,
) -> bool {
    if force {
        return false;
    }
    let Some(version) = spec.version() else {
        return false;
    };
    if !destination.is_installed(&spec.name, version) {
        return false;
    }

    downloads
        .insert_if_absent(spec.key(), DownloadEntry::Requested(spec.clone()))
        .await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_package_dir() {
        let dest = Destination::new("/project/spm_modules");
        assert_eq!(
            dest.package_dir("foo", "1.2.0"),
            PathBuf::from("/project/spm_modules/foo/1.2.0")
        );
    }

    #[tokio::test]
    async fn test_check_existing_records_bare_identifier() {
        let dir = tempdir().unwrap();
        let dest = Destination::new(dir.path());
        fs::create_dir_all(dest.package_dir("foo", "1.2.0")).unwrap();

        let downloads = DownloadList::new();
        let spec = PackageSpec::parse("foo@1.2.0").unwrap();

        assert!(check_existing(&dest, &spec, false, &downloads).await);
        let snapshot = downloads.snapshot().await;
        assert_eq!(snapshot["foo@1.2.0"], DownloadEntry::Requested(spec.clone()));

        // Idempotent
        assert!(check_existing(&dest, &spec, false, &downloads).await);
        assert_eq!(downloads.len().await, 1);
    }

    #[tokio::test]
    async fn test_check_existing_false_when_forced() {
        let dir = tempdir().unwrap();
        let dest = Destination::new(dir.path());
        fs::create_dir_all(dest.package_dir("foo", "1.2.0")).unwrap();

        let downloads = DownloadList::new();
        let spec = PackageSpec::parse("foo@1.2.0").unwrap();

        assert!(!check_existing(&dest, &spec, true, &downloads).await);
        assert!(downloads.is_empty().await);
    }

    #[tokio::test]
    async fn test_check_existing_unversioned_always_proceeds() {
        let dir = tempdir().unwrap();
        let dest = Destination::new(dir.path());
        fs::create_dir_all(dir.path().join("foo").join("stable")).unwrap();

        let downloads = DownloadList::new();
        let spec = PackageSpec::parse("foo").unwrap();

        assert!(!check_existing(&dest, &spec, false, &downloads).await);
    }

    #[tokio::test]
    async fn test_check_existing_missing_dir() {
        let dir = tempdir().unwrap();
        let dest = Destination::new(dir.path());
        let downloads = DownloadList::new();
        let spec = PackageSpec::parse("foo@1.2.0").unwrap();

        assert!(!check_existing(&dest, &spec, false, &downloads).await);
        assert!(downloads.is_empty().await);
    }
}
