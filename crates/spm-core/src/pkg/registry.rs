//! spm registry client.
//!
//! Endpoints, relative to the registry base URL:
//! - `repository/{name}/{version}` and `repository/{name}/stable`: metadata
//!   for one version
//! - `repository/{name}/`: all published versions under `packages`
//! - `repository/{name}/{version}/{filename}`: the archive

use super::error::PkgError;
use super::info::PackageInfo;
use super::spec::{PackageSpec, STABLE};
use super::version::resolve_version;
use crate::version::user_agent;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// All published versions of a package.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryListing {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub packages: BTreeMap<String, Value>,
}

impl RepositoryListing {
    /// Published version strings.
    #[must_use]
    pub fn versions(&self) -> Vec<&str> {
        self.packages.keys().map(String::as_str).collect()
    }
}

/// Registry client for fetching package metadata.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: Url,
    http: Client,
}

impl RegistryClient {
    /// Create a new registry client with the given base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(base_url: &str) -> Result<Self, PkgError> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            PkgError::resolve_failed(format!("Invalid registry URL '{base_url}': {e}"))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(PkgError::resolve_failed(format!(
                "Invalid registry URL '{base_url}': cannot be a base"
            )));
        }

        // Ensure trailing slash for proper joining
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .user_agent(user_agent())
            .build()
            .map_err(|e| PkgError::resolve_failed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { base_url, http })
    }

    /// Get the HTTP client (for reuse in archive downloads).
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.http
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, PkgError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PkgError::resolve_failed(format!("Invalid registry URL '{}'", self.base_url)))?
            .pop_if_empty()
            .push("repository")
            .extend(segments);
        Ok(url)
    }

    /// Archive URL for a resolved package.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be built.
    pub fn archive_url(&self, info: &PackageInfo) -> Result<Url, PkgError> {
        self.endpoint(&[&info.name, &info.version, &info.archive_filename()])
    }

    /// Resolve an identifier into concrete metadata.
    ///
    /// Unversioned (or `@stable`) requests resolve to the `stable` tag.
    /// Exact versions are fetched directly. Ranges are matched against the
    /// full version listing.
    ///
    /// # Errors
    /// Returns an error if the package or a satisfying version does not
    /// exist, or the registry response is malformed.
    pub async fn fetch_info(&self, spec: &PackageSpec) -> Result<PackageInfo, PkgError> {
        let info = match spec.version() {
            None | Some(STABLE) => self.fetch_version(&spec.name, STABLE).await?,
            Some(version) if spec.is_exact() => self.fetch_version(&spec.name, version).await?,
            Some(range) => {
                let listing = self.fetch_listing(&spec.name).await?;
                let version = resolve_version(&spec.name, &listing.versions(), range)?;
                debug!(name = %spec.name, range, version = %version, "Matched range");
                let raw = listing
                    .packages
                    .get(&version)
                    .cloned()
                    .ok_or_else(|| PkgError::version_not_found(&spec.name, range))?;
                parse_info(&spec.name, Some(&version), raw)?
            }
        };

        if info.name != spec.name {
            return Err(PkgError::resolve_failed(format!(
                "Registry returned '{}' for '{}'",
                info.name, spec.name
            )));
        }

        Ok(info)
    }

    /// Fetch metadata for one version (or the `stable` tag).
    ///
    /// # Errors
    /// Returns an error if the request fails or the version is not found.
    pub async fn fetch_version(&self, name: &str, version: &str) -> Result<PackageInfo, PkgError> {
        let url = self.endpoint(&[name, version])?;
        debug!(url = %url, "Fetching package metadata");

        let response = self.http.get(url.as_str()).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(if version == STABLE {
                PkgError::not_found(name)
            } else {
                PkgError::version_not_found(name, version)
            });
        }

        if !response.status().is_success() {
            return Err(PkgError::resolve_failed(format!(
                "Registry returned status {} for '{name}@{version}'",
                response.status()
            )));
        }

        let raw: Value = response.json().await?;
        let concrete = (version != STABLE).then_some(version);
        parse_info(name, concrete, raw)
    }

    /// Fetch the listing of all published versions.
    ///
    /// # Errors
    /// Returns an error if the request fails or the package is not found.
    pub async fn fetch_listing(&self, name: &str) -> Result<RepositoryListing, PkgError> {
        let url = self.endpoint(&[name, ""])?;
        debug!(url = %url, "Fetching package listing");

        let response = self.http.get(url.as_str()).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(PkgError::not_found(name));
        }

        if !response.status().is_success() {
            return Err(PkgError::resolve_failed(format!(
                "Registry returned status {} for '{name}'",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

/// Turn a raw metadata object into `PackageInfo`, filling `name` and
/// `version` from the request when the registry omits them.
///
/// A concrete request must come back with that exact version. `version`
/// and `filename` must be single path components.
fn parse_info(name: &str, version: Option<&str>, mut raw: Value) -> Result<PackageInfo, PkgError> {
    let Some(obj) = raw.as_object_mut() else {
        return Err(PkgError::resolve_failed(format!(
            "Malformed metadata for '{name}': expected object"
        )));
    };

    obj.entry("name").or_insert_with(|| Value::from(name));
    if let Some(version) = version {
        obj.entry("version").or_insert_with(|| Value::from(version));
    }

    let info: PackageInfo = serde_json::from_value(raw)
        .map_err(|e| PkgError::resolve_failed(format!("Malformed metadata for '{name}': {e}")))?;

    if info.version.trim().is_empty() {
        return Err(PkgError::resolve_failed(format!(
            "Malformed metadata for '{name}': empty version"
        )));
    }

    if let Some(requested) = version {
        if info.version != requested {
            return Err(PkgError::resolve_failed(format!(
                "Registry returned version '{}' for '{name}@{requested}'",
                info.version
            )));
        }
    }

    // Both end up as path components under the cache and destination
    check_path_component(name, "version", &info.version)?;
    if let Some(filename) = &info.filename {
        check_path_component(name, "filename", filename)?;
    }

    Ok(info)
}

fn check_path_component(name: &str, field: &str, value: &str) -> Result<(), PkgError> {
    let escapes = value.contains(['/', '\\'])
        || value.contains("..")
        || Path::new(value).is_absolute();
    if escapes {
        return Err(PkgError::resolve_failed(format!(
            "Malformed metadata for '{name}': unsafe {field} '{value}'"
        )));
    }
    Ok(())
}
