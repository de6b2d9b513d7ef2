//! Package installer.
//!
//! Provides:
//! - Parsing package identifiers (`name@version`)
//! - Fetching package metadata from an spm registry
//! - Resolving version ranges using semver
//! - Downloading archives into the cache and verifying them by MD5
//! - Extracting archives into `{destination}/{name}/{version}`
//! - Reading and updating the `spm` sections of `package.json`
//! - The recursive, deduplicated install run

pub mod cache;
pub mod downloadlist;
pub mod error;
pub mod exists;
pub mod extract;
pub mod fetch;
pub mod info;
pub mod install;
pub mod manifest;
pub mod registry;
pub mod session;
pub mod spec;
pub mod spmrc;
pub mod version;

pub use cache::PackageCache;
pub use downloadlist::DownloadList;
pub use error::{codes as pkg_codes, PkgError, PkgErrorKind};
pub use exists::{check_existing, Destination};
pub use extract::{extract, extract_archive};
pub use fetch::fetch;
pub use info::{DownloadEntry, PackageInfo};
pub use install::{InstallFailure, InstallOptions, InstallOutcome, InstalledPackage, Installer};
pub use manifest::{read_spm_dependencies, record_dependency, DependencyKind, ManifestDeps};
pub use registry::{RegistryClient, RepositoryListing};
pub use session::{run_install, InstallReport, InstallSummary};
pub use spec::{pkg_key, PackageSpec, STABLE};
pub use spmrc::{load_spmrc_files, parse_spmrc, SpmrcConfig};
pub use version::resolve_version;
