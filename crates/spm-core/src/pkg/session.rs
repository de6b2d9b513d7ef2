//! Session driver: one `spm install` invocation.

use super::error::{PkgError, PkgErrorKind};
use super::install::{
    InstallFailure, InstallOptions, InstallOutcome, InstalledPackage, Installer,
};
use super::manifest::read_spm_dependencies;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info};

/// Counts over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallSummary {
    /// Archives downloaded from the registry.
    pub downloaded: u32,
    /// Archives extracted from the cache.
    pub cached: u32,
    /// Requests skipped as installed or already handled.
    pub skipped: u32,
    pub failed: u32,
}

/// Result of one install run.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub ok: bool,
    pub summary: InstallSummary,
    pub packages: Vec<InstalledPackage>,
    #[serde(rename = "errors")]
    pub failures: Vec<InstallFailure>,
    /// Keys recorded in the run's dedup table, sorted.
    pub downloadlist: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl InstallReport {
    fn new(
        packages: Vec<InstalledPackage>,
        failures: Vec<InstallFailure>,
        downloadlist: Vec<String>,
        notes: Vec<String>,
    ) -> Self {
        let mut summary = InstallSummary::default();
        for pkg in &packages {
            match pkg.outcome {
                InstallOutcome::Downloaded => summary.downloaded += 1,
                InstallOutcome::ServedFromCache => summary.cached += 1,
                InstallOutcome::SkippedExisting | InstallOutcome::SkippedDuplicate => {
                    summary.skipped += 1;
                }
            }
        }
        summary.failed = u32::try_from(failures.len()).unwrap_or(u32::MAX);

        Self {
            ok: failures.is_empty(),
            summary,
            packages,
            failures,
            downloadlist,
            notes,
        }
    }

    /// Packages that were extracted during this run.
    pub fn fresh(&self) -> impl Iterator<Item = &InstalledPackage> {
        self.packages.iter().filter(|p| p.outcome.is_fresh())
    }
}

/// Run an install session.
///
/// With explicit `identifiers`, each one is a root request. Without, the
/// roots are the project manifest's `spm.dependencies`,
/// `spm.devDependencies` and `spm.engines`; in that case nothing is saved
/// back to the manifest. Roots are installed concurrently over a single
/// shared dedup table.
///
/// # Errors
/// Returns an error if the installer cannot be created, or if no
/// identifiers were given and the manifest cannot be read. Per-package
/// failures are reported in the returned report instead.
pub async fn run_install(
    mut options: InstallOptions,
    identifiers: Vec<String>,
) -> Result<InstallReport, PkgError> {
    let mut notes = Vec::new();
    let mut failures = Vec::new();

    let roots = if identifiers.is_empty() {
        let manifest_path = options.manifest_path();
        let deps = read_spm_dependencies(&manifest_path, true)?;
        debug!(
            manifest = %manifest_path.display(),
            count = deps.deps.len(),
            "Read root dependencies"
        );

        failures.extend(deps.errors.iter().map(|e| InstallFailure {
            identifier: e.name.clone(),
            code: e.code.to_string(),
            kind: PkgErrorKind::Manifest,
            message: e.message.clone(),
        }));

        // Entries come from the manifest; writing them back would only
        // replace ranges with concrete versions.
        options.save = false;
        options.save_dev = false;

        deps.identifiers()
    } else {
        identifiers
    };

    if roots.is_empty() {
        notes.push("No dependencies to install".to_string());
    }

    let installer = Installer::new(options)?;
    join_all(
        roots
            .into_iter()
            .map(|id| installer.install_package(id, true)),
    )
    .await;

    failures.extend(installer.failures().await);
    let downloadlist = installer
        .downloads()
        .snapshot()
        .await
        .into_keys()
        .collect();

    let report = InstallReport::new(installer.packages().await, failures, downloadlist, notes);

    info!(
        downloaded = report.summary.downloaded,
        cached = report.summary.cached,
        skipped = report.summary.skipped,
        failed = report.summary.failed,
        "Install completed"
    );

    Ok(report)
}
