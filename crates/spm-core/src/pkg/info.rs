//! Resolved package metadata.

use super::spec::{pkg_key, PackageSpec};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Metadata for one concrete package version, as returned by the registry.
///
/// This is authoritative for what gets downloaded and how the cached
/// archive is verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    /// MD5 of the canonical archive. Without it a cached archive is never trusted.
    #[serde(default)]
    pub md5: Option<String>,
    /// Archive file name override.
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, deserialize_with = "deserialize_dependencies")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "deserialize_dependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "deserialize_dependencies")]
    pub engines: BTreeMap<String, String>,
}

impl PackageInfo {
    /// Dedup / destination key: `name@version`.
    #[must_use]
    pub fn key(&self) -> String {
        pkg_key(&self.name, Some(&self.version))
    }

    /// File name of the archive in the cache and on the registry.
    #[must_use]
    pub fn archive_filename(&self) -> String {
        match self.filename.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_archive_filename(&self.name, &self.version),
        }
    }

    /// Production dependencies as `name@range` identifiers.
    #[must_use]
    pub fn dependency_identifiers(&self) -> Vec<String> {
        to_identifiers(&self.dependencies)
    }
}

/// Default archive file name: `{name}-{version}.tar.gz`.
///
/// Scoped names have their `/` flattened so the archive stays a single file.
#[must_use]
pub fn default_archive_filename(name: &str, version: &str) -> String {
    format!("{}-{version}.tar.gz", name.replace('/', "-"))
}

/// Convert a `name → range` mapping into identifier strings.
#[must_use]
pub fn to_identifiers(deps: &BTreeMap<String, String>) -> Vec<String> {
    deps.iter()
        .map(|(name, range)| {
            let range = range.trim();
            if range.is_empty() {
                name.clone()
            } else {
                format!("{name}@{range}")
            }
        })
        .collect()
}

/// An entry of the run-scoped dedup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEntry {
    /// Recorded by the destination check without a metadata lookup.
    Requested(PackageSpec),
    /// Recorded after metadata resolution.
    Resolved(PackageInfo),
}

impl DownloadEntry {
    /// Package name of the entry.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Requested(spec) => &spec.name,
            Self::Resolved(info) => &info.name,
        }
    }

    /// Version of the entry, if known.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Requested(spec) => spec.version(),
            Self::Resolved(info) => Some(&info.version),
        }
    }
}

/// Registries have served dependencies either as a `name → range` object
/// or as a list of `name@range` identifiers. Accept both; `null` is empty.
#[derive(Deserialize)]
#[serde(untagged)]
enum DependencyListing {
    Map(BTreeMap<String, String>),
    List(Vec<String>),
}

fn deserialize_dependencies<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let listing = Option::<DependencyListing>::deserialize(deserializer)?;
    Ok(match listing {
        None => BTreeMap::new(),
        Some(DependencyListing::Map(map)) => map,
        Some(DependencyListing::List(list)) => list
            .iter()
            .filter_map(|id| PackageSpec::parse(id).ok())
            .map(|spec| {
                let range = spec.version.unwrap_or_default();
                (spec.name, range)
            })
            .collect(),
    })
}
