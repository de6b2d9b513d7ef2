//! Project descriptor (`package.json`) access.
//!
//! spm keeps its own dependency sections under a top-level `spm` object:
//!
//! ```json
//! {
//!   "name": "app",
//!   "spm": {
//!     "dependencies": { "foo": "1.2.0" },
//!     "devDependencies": { "expect": "0.2.0" },
//!     "engines": { "seajs": "2.2.0" }
//!   }
//! }
//! ```

use super::error::{codes, PkgError};
use serde_json::{Map, Value};
use spm_util::fs::atomic_write;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Top-level key holding the spm sections.
pub const SPM_SECTION: &str = "spm";

/// Which manifest section a saved dependency goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Dependencies,
    DevDependencies,
}

impl DependencyKind {
    /// Section key under `spm`.
    #[must_use]
    pub fn section(self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::DevDependencies => "devDependencies",
        }
    }

    /// Pick the section from the `save` / `save_dev` flags.
    ///
    /// `save_dev` wins when both are set; `None` when neither is.
    #[must_use]
    pub fn from_flags(save: bool, save_dev: bool) -> Option<Self> {
        if save_dev {
            Some(Self::DevDependencies)
        } else if save {
            Some(Self::Dependencies)
        } else {
            None
        }
    }
}

/// Dependencies read from a descriptor.
#[derive(Debug, Clone, Default)]
pub struct ManifestDeps {
    /// Valid `(name, range)` pairs, sorted by name.
    pub deps: Vec<(String, String)>,
    /// Entries that could not be used.
    pub errors: Vec<ManifestDepError>,
}

impl ManifestDeps {
    /// Dependencies as `name@range` identifiers (bare `name` for an empty range).
    #[must_use]
    pub fn identifiers(&self) -> Vec<String> {
        self.deps
            .iter()
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
}

/// A descriptor entry that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDepError {
    /// Package or section name.
    pub name: String,
    pub code: &'static str,
    pub message: String,
}

impl ManifestDepError {
    fn invalid_range(name: &str, actual_type: &str) -> Self {
        Self {
            name: name.to_string(),
            code: codes::PKG_DEP_RANGE_INVALID,
            message: format!("expected string, got {actual_type}"),
        }
    }

    fn invalid_section(section: &str, actual_type: &str) -> Self {
        Self {
            name: section.to_string(),
            code: codes::PKG_MANIFEST_INVALID,
            message: format!("'{section}' must be an object, got {actual_type}"),
        }
    }
}

/// Read the spm dependency sections of a descriptor.
///
/// Always reads `spm.dependencies`. With `include_root_sections`,
/// `spm.devDependencies` and `spm.engines` are read too; on a name clash
/// `dependencies` beats `devDependencies`, which beats `engines`.
///
/// # Errors
/// Returns an error if the file is missing, is not valid JSON, or is not a
/// JSON object. Bad individual entries are reported in `errors` instead.
pub fn read_spm_dependencies(
    manifest_path: &Path,
    include_root_sections: bool,
) -> Result<ManifestDeps, PkgError> {
    let root = load_object(manifest_path)?;
    let mut result = ManifestDeps::default();

    let spm = match root.get(SPM_SECTION) {
        None | Some(Value::Null) => return Ok(result),
        Some(Value::Object(spm)) => spm,
        Some(other) => {
            result.errors.push(ManifestDepError::invalid_section(
                SPM_SECTION,
                json_type_name(other),
            ));
            return Ok(result);
        }
    };

    let mut deps_map: HashMap<String, String> = HashMap::new();

    // Lowest precedence first; later sections overwrite
    if include_root_sections {
        extract_section(spm, "engines", &mut deps_map, &mut result.errors);
        extract_section(spm, "devDependencies", &mut deps_map, &mut result.errors);
    }
    extract_section(spm, "dependencies", &mut deps_map, &mut result.errors);

    let mut deps: Vec<(String, String)> = deps_map.into_iter().collect();
    deps.sort_by(|a, b| a.0.cmp(&b.0));
    result.deps = deps;

    Ok(result)
}

/// Record `name → version` under `spm.{kind}` and rewrite the descriptor.
///
/// Missing `spm` and section objects are created. Existing key order is
/// kept. Output is pretty-printed with two-space indentation and a trailing
/// newline, written atomically.
///
/// # Errors
/// Returns an error if the descriptor is missing or malformed, or cannot be
/// written back.
pub fn record_dependency(
    manifest_path: &Path,
    name: &str,
    version: &str,
    kind: DependencyKind,
) -> Result<(), PkgError> {
    let mut root = load_object(manifest_path)?;

    let spm = root
        .entry(SPM_SECTION)
        .or_insert_with(|| Value::Object(Map::new()));
    if spm.is_null() {
        *spm = Value::Object(Map::new());
    }
    let spm = spm.as_object_mut().ok_or_else(|| {
        PkgError::manifest_invalid(format!("'{SPM_SECTION}' must be an object"))
    })?;

    let section = spm
        .entry(kind.section())
        .or_insert_with(|| Value::Object(Map::new()));
    if section.is_null() {
        *section = Value::Object(Map::new());
    }
    let section = section.as_object_mut().ok_or_else(|| {
        PkgError::manifest_invalid(format!(
            "'{SPM_SECTION}.{}' must be an object",
            kind.section()
        ))
    })?;

    section.insert(name.to_string(), Value::String(version.to_string()));

    let mut output = serde_json::to_string_pretty(&Value::Object(root))
        .map_err(|e| PkgError::manifest_invalid(format!("Failed to serialize: {e}")))?;
    output.push('\n');

    atomic_write(manifest_path, output.as_bytes()).map_err(|e| {
        PkgError::manifest_invalid(format!(
            "Failed to write '{}': {e}",
            manifest_path.display()
        ))
    })
}

fn load_object(manifest_path: &Path) -> Result<Map<String, Value>, PkgError> {
    if !manifest_path.is_file() {
        return Err(PkgError::manifest_not_found(manifest_path));
    }

    let content = fs::read_to_string(manifest_path)
        .map_err(|e| PkgError::manifest_invalid(format!("Failed to read: {e}")))?;

    match serde_json::from_str(&content) {
        Ok(Value::Object(root)) => Ok(root),
        Ok(_) => Err(PkgError::manifest_invalid(
            "package.json must be a JSON object",
        )),
        Err(e) => Err(PkgError::manifest_invalid(format!("Invalid JSON: {e}"))),
    }
}

fn extract_section(
    spm: &Map<String, Value>,
    section: &str,
    deps_map: &mut HashMap<String, String>,
    errors: &mut Vec<ManifestDepError>,
) {
    let Some(section_value) = spm.get(section) else {
        return;
    };

    let Some(section_obj) = section_value.as_object() else {
        if !section_value.is_null() {
            errors.push(ManifestDepError::invalid_section(
                section,
                json_type_name(section_value),
            ));
        }
        return;
    };

    for (name, range_value) in section_obj {
        if let Some(range) = range_value.as_str() {
            deps_map.insert(name.clone(), range.to_string());
        } else {
            errors.push(ManifestDepError::invalid_range(
                name,
                json_type_name(range_value),
            ));
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
