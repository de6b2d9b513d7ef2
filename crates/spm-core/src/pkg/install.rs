//! Recursive install orchestrator.
//!
//! One [`Installer`] drives one install run. Each identifier goes through:
//!
//! 1. parse
//! 2. destination check (skip if `{dest}/{name}/{version}` exists)
//! 3. in-run dedup against the [`DownloadList`]
//! 4. metadata resolution, then an insert-if-absent of the concrete key
//! 5. manifest save (root requests with `save` / `save_dev` only, also when
//!    the package was already installed or handled earlier in the run)
//! 6. destination re-check with the concrete version
//! 7. cache-first archive fetch and extraction
//! 8. concurrent install of the package's own dependencies
//!
//! A failing branch stops only its own descendants. Failures are collected
//! on the installer and never fail the parent.

use super::cache::PackageCache;
use super::downloadlist::DownloadList;
use super::error::{PkgError, PkgErrorKind};
use super::exists::{check_existing, Destination};
use super::extract::extract;
use super::fetch::fetch;
use super::info::{DownloadEntry, PackageInfo};
use super::manifest::{read_spm_dependencies, record_dependency, DependencyKind};
use super::registry::RegistryClient;
use super::spec::PackageSpec;
use crate::config::{Config, MANIFEST_NAME};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Settings for one install run.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Project directory; the manifest lives here.
    pub base_dir: PathBuf,
    pub destination_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub registry: String,
    /// Reinstall even if present, and ignore cached archives.
    pub force: bool,
    /// Record root packages under `spm.dependencies`.
    pub save: bool,
    /// Record root packages under `spm.devDependencies`.
    pub save_dev: bool,
}

impl InstallOptions {
    /// Build options from a loaded configuration. All flags start off.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_dir: config.cwd.clone(),
            destination_dir: config.destination_dir(),
            cache_dir: config.cache_dir(),
            registry: config.registry.clone(),
            force: false,
            save: false,
            save_dev: false,
        }
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }

    #[must_use]
    pub fn with_save_dev(mut self, save_dev: bool) -> Self {
        self.save_dev = save_dev;
        self
    }

    /// Path of the project descriptor.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.base_dir.join(MANIFEST_NAME)
    }
}

/// How a single install request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallOutcome {
    /// Already present in the destination.
    SkippedExisting,
    /// Already handled earlier in this run.
    SkippedDuplicate,
    /// Extracted from a verified cached archive.
    ServedFromCache,
    /// Downloaded from the registry and extracted.
    Downloaded,
}

impl InstallOutcome {
    /// Whether the request did extraction work.
    #[must_use]
    pub fn is_fresh(self) -> bool {
        matches!(self, Self::ServedFromCache | Self::Downloaded)
    }
}

/// A request that ended without error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledPackage {
    pub name: String,
    /// Concrete version when resolved, otherwise the requested one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub outcome: InstallOutcome,
    /// Whether this was a top-level request.
    pub root: bool,
    /// Extraction directory, for packages that were extracted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A request that failed, or a manifest save that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallFailure {
    /// Identifier as requested.
    pub identifier: String,
    pub code: String,
    /// Install stage that failed.
    pub kind: PkgErrorKind,
    pub message: String,
}

impl InstallFailure {
    fn new(identifier: &str, error: &PkgError) -> Self {
        Self {
            identifier: identifier.to_string(),
            code: error.code().to_string(),
            kind: error.kind(),
            message: error.message().to_string(),
        }
    }
}

/// Run-scoped install engine.
///
/// Cloning is cheap and every clone shares the same run state.
#[derive(Debug, Clone)]
pub struct Installer {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    options: InstallOptions,
    registry: RegistryClient,
    cache: PackageCache,
    destination: Destination,
    downloads: DownloadList,
    // Serializes manifest read-modify-write cycles
    manifest_lock: Mutex<()>,
    packages: Mutex<Vec<InstalledPackage>>,
    failures: Mutex<Vec<InstallFailure>>,
}

impl Installer {
    /// Create an installer for a fresh run.
    ///
    /// # Errors
    /// Returns an error if the registry URL is invalid.
    pub fn new(options: InstallOptions) -> Result<Self, PkgError> {
        let registry = RegistryClient::new(&options.registry)?;
        let cache = PackageCache::new(&options.cache_dir);
        let destination = Destination::new(&options.destination_dir);

        Ok(Self {
            inner: Arc::new(Inner {
                options,
                registry,
                cache,
                destination,
                downloads: DownloadList::new(),
                manifest_lock: Mutex::new(()),
                packages: Mutex::new(Vec::new()),
                failures: Mutex::new(Vec::new()),
            }),
        })
    }

    #[must_use]
    pub fn options(&self) -> &InstallOptions {
        &self.inner.options
    }

    /// The run's dedup table.
    #[must_use]
    pub fn downloads(&self) -> &DownloadList {
        &self.inner.downloads
    }

    /// Completed requests so far, in completion order.
    pub async fn packages(&self) -> Vec<InstalledPackage> {
        self.inner.packages.lock().await.clone()
    }

    /// Failures so far, in the order they happened.
    pub async fn failures(&self) -> Vec<InstallFailure> {
        self.inner.failures.lock().await.clone()
    }

    /// Install `identifier` and, recursively, its dependencies.
    ///
    /// Only root requests may update the project manifest. An error for
    /// this identifier is recorded on the installer before being returned;
    /// errors in its dependencies are recorded but not returned.
    pub fn install_package(
        &self,
        identifier: String,
        is_root: bool,
    ) -> BoxFuture<'static, Result<InstallOutcome, PkgError>> {
        let this = self.clone();
        async move {
            match this.install_inner(&identifier, is_root).await {
                Ok(outcome) => Ok(outcome),
                Err(e) => {
                    warn!(package = %identifier, code = e.code(), "Install failed: {}", e.message());
                    this.record_failure(InstallFailure::new(&identifier, &e))
                        .await;
                    Err(e)
                }
            }
        }
        .boxed()
    }

    async fn install_inner(
        &self,
        identifier: &str,
        is_root: bool,
    ) -> Result<InstallOutcome, PkgError> {
        let inner = &self.inner;
        let force = inner.options.force;
        let spec = PackageSpec::parse(identifier)?;
        let saving = is_root && self.saves_roots();

        if check_existing(&inner.destination, &spec, force, &inner.downloads).await {
            info!(event = "found", package = %spec, "Already installed");
            if saving && spec.is_exact() {
                if let Some(version) = spec.version() {
                    self.save_to_manifest(identifier, &spec.name, version).await;
                }
            }
            self.record_skip(&spec, InstallOutcome::SkippedExisting, is_root)
                .await;
            return Ok(InstallOutcome::SkippedExisting);
        }

        // A root that must be saved still needs its concrete version, so it
        // goes on to resolution and is deduplicated on the concrete key.
        if !saving && inner.downloads.contains(&spec.key()).await {
            debug!(event = "found", package = %spec, "Already handled in this run");
            self.record_skip(&spec, InstallOutcome::SkippedDuplicate, is_root)
                .await;
            return Ok(InstallOutcome::SkippedDuplicate);
        }

        let info = inner.registry.fetch_info(&spec).await?;
        debug!(package = %spec, version = %info.version, "Resolved");

        if !inner
            .downloads
            .insert_if_absent(info.key(), DownloadEntry::Resolved(info.clone()))
            .await
        {
            debug!(event = "found", package = %info.key(), "Resolved to a package already handled");
            if saving {
                self.save_to_manifest(identifier, &info.name, &info.version)
                    .await;
            }
            self.record_resolved(&info, InstallOutcome::SkippedDuplicate, is_root, None)
                .await;
            return Ok(InstallOutcome::SkippedDuplicate);
        }

        if saving {
            self.save_to_manifest(identifier, &info.name, &info.version)
                .await;
        }

        let package_dir = inner.destination.package_dir(&info.name, &info.version);
        if !force && package_dir.is_dir() {
            info!(event = "found", package = %info.key(), "Already installed");
            self.record_resolved(&info, InstallOutcome::SkippedExisting, is_root, None)
                .await;
            return Ok(InstallOutcome::SkippedExisting);
        }

        let outcome = self.materialize(&info, &package_dir).await?;
        self.record_resolved(&info, outcome, is_root, Some(&package_dir))
            .await;

        let children = child_dependencies(&package_dir, &info);
        if !children.is_empty() {
            info!(
                event = "depends",
                package = %info.key(),
                count = children.len(),
                "Installing dependencies"
            );
            join_all(
                children
                    .into_iter()
                    .map(|child| self.install_package(child, false)),
            )
            .await;
        }

        Ok(outcome)
    }

    /// Get the archive into the cache (unless a verified copy is there) and
    /// extract it into `package_dir`.
    async fn materialize(
        &self,
        info: &PackageInfo,
        package_dir: &Path,
    ) -> Result<InstallOutcome, PkgError> {
        let inner = &self.inner;
        let archive_path = inner.cache.archive_path(info);

        let outcome = if !inner.options.force && inner.cache.verify(info).await? {
            debug!(package = %info.key(), path = %archive_path.display(), "Using cached archive");
            InstallOutcome::ServedFromCache
        } else {
            let url = inner.registry.archive_url(info)?;
            info!(event = "install", package = %info.key(), url = %url, "Downloading");
            fetch(inner.registry.http(), url.as_str(), &archive_path).await?;
            InstallOutcome::Downloaded
        };

        extract(&archive_path, package_dir).await?;
        info!(
            event = "installed",
            package = %info.key(),
            path = %package_dir.display(),
            "Installed"
        );

        Ok(outcome)
    }

    fn saves_roots(&self) -> bool {
        let options = &self.inner.options;
        DependencyKind::from_flags(options.save, options.save_dev).is_some()
    }

    async fn save_to_manifest(&self, identifier: &str, name: &str, version: &str) {
        let options = &self.inner.options;
        let Some(kind) = DependencyKind::from_flags(options.save, options.save_dev) else {
            return;
        };

        let manifest_path = options.manifest_path();
        let _guard = self.inner.manifest_lock.lock().await;

        match record_dependency(&manifest_path, name, version, kind) {
            Ok(()) => debug!(
                package = %identifier,
                version,
                section = kind.section(),
                "Saved to manifest"
            ),
            Err(e) => {
                warn!(
                    package = %identifier,
                    code = e.code(),
                    "Failed to save to manifest: {}",
                    e.message()
                );
                self.record_failure(InstallFailure::new(identifier, &e))
                    .await;
            }
        }
    }

    async fn record_skip(&self, spec: &PackageSpec, outcome: InstallOutcome, root: bool) {
        self.inner.packages.lock().await.push(InstalledPackage {
            name: spec.name.clone(),
            version: spec.version.clone(),
            outcome,
            root,
            path: None,
        });
    }

    async fn record_resolved(
        &self,
        info: &PackageInfo,
        outcome: InstallOutcome,
        root: bool,
        path: Option<&Path>,
    ) {
        self.inner.packages.lock().await.push(InstalledPackage {
            name: info.name.clone(),
            version: Some(info.version.clone()),
            outcome,
            root,
            path: path.map(|p| p.to_string_lossy().into_owned()),
        });
    }

    async fn record_failure(&self, failure: InstallFailure) {
        self.inner.failures.lock().await.push(failure);
    }
}

/// Identifiers of the dependencies to install after `info` is extracted.
///
/// The extracted package's own descriptor wins (`spm.dependencies` only).
/// Without one, the registry metadata is used.
fn child_dependencies(package_dir: &Path, info: &PackageInfo) -> Vec<String> {
    let manifest_path = package_dir.join(MANIFEST_NAME);
    if !manifest_path.is_file() {
        return info.dependency_identifiers();
    }

    match read_spm_dependencies(&manifest_path, false) {
        Ok(deps) => {
            for err in &deps.errors {
                warn!(
                    package = %info.key(),
                    dependency = %err.name,
                    code = err.code,
                    "Ignoring dependency: {}",
                    err.message
                );
            }
            deps.identifiers()
        }
        Err(e) => {
            warn!(
                package = %info.key(),
                code = e.code(),
                "Unreadable package descriptor, using registry dependencies: {}",
                e.message()
            );
            info.dependency_identifiers()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::tempdir;

    fn options(root: &Path) -> InstallOptions {
        InstallOptions {
            base_dir: root.to_path_buf(),
            destination_dir: root.join("spm_modules"),
            cache_dir: root.join("cache"),
            // Nothing listens here; tests below must not reach the network
            registry: "http://127.0.0.1:9".into(),
            force: false,
            save: false,
            save_dev: false,
        }
    }

    fn info(deps: &[(&str, &str)]) -> PackageInfo {
        PackageInfo {
            name: "foo".into(),
            version: "1.2.0".into(),
            md5: None,
            filename: None,
            dependencies: deps
                .iter()
                .map(|(n, r)| ((*n).to_string(), (*r).to_string()))
                .collect(),
            dev_dependencies: BTreeMap::new(),
            engines: BTreeMap::new(),
        }
    }

    #[test]
    fn test_options_from_config() {
        let config = Config::new(PathBuf::from("/project"));
        let opts = InstallOptions::from_config(&config).with_save(true);

        assert_eq!(opts.destination_dir, PathBuf::from("/project/spm_modules"));
        assert_eq!(opts.manifest_path(), PathBuf::from("/project/package.json"));
        assert!(opts.save);
        assert!(!opts.force);
    }

    #[test]
    fn test_installer_rejects_bad_registry() {
        let dir = tempdir().unwrap();
        let mut opts = options(dir.path());
        opts.registry = "not a url".into();
        assert!(Installer::new(opts).is_err());
    }

    #[tokio::test]
    async fn test_existing_destination_skips_without_network() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("spm_modules/foo/1.2.0")).unwrap();
        let installer = Installer::new(options(dir.path())).unwrap();

        let outcome = installer
            .install_package("foo@1.2.0".into(), true)
            .await
            .unwrap();

        assert_eq!(outcome, InstallOutcome::SkippedExisting);
        assert!(installer.downloads().contains("foo@1.2.0").await);
        assert!(installer.failures().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_identifier_recorded_as_failure() {
        let dir = tempdir().unwrap();
        let installer = Installer::new(options(dir.path())).unwrap();

        let err = installer
            .install_package("foo@".into(), true)
            .await
            .unwrap_err();

        assert_eq!(err.code(), crate::pkg::error::codes::PKG_SPEC_INVALID);
        let failures = installer.failures().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].identifier, "foo@");
    }

    #[test]
    fn test_child_dependencies_prefers_descriptor() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"spm": {"dependencies": {"baz": "2.0.0"}, "devDependencies": {"x": "1.0.0"}}}"#,
        )
        .unwrap();

        let children = child_dependencies(dir.path(), &info(&[("bar", "^1.0.0")]));
        assert_eq!(children, vec!["baz@2.0.0"]);
    }

    #[test]
    fn test_child_dependencies_falls_back_to_metadata() {
        let dir = tempdir().unwrap();
        let children = child_dependencies(dir.path(), &info(&[("bar", "^1.0.0")]));
        assert_eq!(children, vec!["bar@^1.0.0"]);

        fs::write(dir.path().join("package.json"), "not json").unwrap();
        let children = child_dependencies(dir.path(), &info(&[("bar", "^1.0.0")]));
        assert_eq!(children, vec!["bar@^1.0.0"]);
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(InstallOutcome::ServedFromCache).unwrap(),
            serde_json::json!("served_from_cache")
        );
        assert!(InstallOutcome::Downloaded.is_fresh());
        assert!(!InstallOutcome::SkippedDuplicate.is_fresh());
    }
}
