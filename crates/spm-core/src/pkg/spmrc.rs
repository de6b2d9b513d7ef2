//! `spmrc` file parser.
//!
//! `spmrc` files are plain `key = value` lines. Supported keys:
//! - `registry`: registry base URL
//! - `cache`: archive cache directory
//! - `destination`: install destination directory
//!
//! `#` and `;` start comments, `[section]` headers are accepted and ignored,
//! and `${ENV_VAR}` is expanded in values.

use crate::error::Error;
use crate::paths::{PROJECT_SPMRC_NAME, SPMRC_NAME};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Parsed `spmrc` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpmrcConfig {
    values: HashMap<String, String>,
    /// Files the values were read from, highest precedence first.
    pub sources: Vec<PathBuf>,
}

impl SpmrcConfig {
    /// Look up a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Registry base URL, if set.
    #[must_use]
    pub fn registry(&self) -> Option<&str> {
        self.get("registry")
    }

    /// Cache directory, if set.
    #[must_use]
    pub fn cache(&self) -> Option<&str> {
        self.get("cache")
    }

    /// Destination directory, if set.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.get("destination")
    }

    /// Merge `other` into `self`, keeping existing entries (first wins).
    pub fn merge(&mut self, other: SpmrcConfig) {
        for (key, value) in other.values {
            self.values.entry(key).or_insert(value);
        }
        self.sources.extend(other.sources);
    }
}

/// Parse the content of a single `spmrc` file. Later lines override earlier ones.
#[must_use]
pub fn parse_spmrc(content: &str) -> SpmrcConfig {
    let mut config = SpmrcConfig::default();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let value = expand_env_vars(value.trim().trim_matches('"'));
        config.values.insert(key.to_string(), value);
    }

    config
}

/// Load and merge `spmrc` files.
///
/// Priority order (first wins):
/// 1. `project_dir/.spmrc`
/// 2. `home_dir/spmrc`
///
/// Missing files are skipped.
///
/// # Errors
/// Returns an error if a file exists but cannot be read.
pub fn load_spmrc_files(project_dir: &Path, home_dir: &Path) -> Result<SpmrcConfig, Error> {
    let mut merged = SpmrcConfig::default();

    for path in [project_dir.join(PROJECT_SPMRC_NAME), home_dir.join(SPMRC_NAME)] {
        if !path.is_file() {
            continue;
        }
        let content = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
            path: path.clone(),
            source,
        })?;
        let mut parsed = parse_spmrc(&content);
        parsed.sources.push(path);
        merged.merge(parsed);
    }

    Ok(merged)
}

/// Expand `${ENV_VAR}` patterns. Unset variables expand to nothing.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
            if let Ok(val) = std::env::var(&var_name) {
                result.push_str(&val);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_basic_keys() {
        let config = parse_spmrc(
            "registry = https://registry.example.com\ncache=/tmp/spm-cache\ndestination = sea_modules\n",
        );
        assert_eq!(config.registry(), Some("https://registry.example.com"));
        assert_eq!(config.cache(), Some("/tmp/spm-cache"));
        assert_eq!(config.destination(), Some("sea_modules"));
    }

    #[test]
    fn test_parse_skips_comments_and_sections() {
        let config = parse_spmrc(
            "# comment\n; other comment\n[user]\nusername = alice\n\nnot a pair\n",
        );
        assert_eq!(config.get("username"), Some("alice"));
        assert_eq!(config.registry(), None);
    }

    #[test]
    fn test_parse_later_line_wins() {
        let config = parse_spmrc("registry = https://a\nregistry = https://b\n");
        assert_eq!(config.registry(), Some("https://b"));
    }

    #[test]
    fn test_parse_strips_quotes() {
        let config = parse_spmrc("destination = \"vendor/spm\"\n");
        assert_eq!(config.destination(), Some("vendor/spm"));
    }

    #[test]
    #[serial]
    fn test_env_expansion() {
        std::env::set_var("SPMRC_TEST_HOST", "mirror.example.com");
        let config = parse_spmrc("registry = https://${SPMRC_TEST_HOST}/\n");
        assert_eq!(config.registry(), Some("https://mirror.example.com/"));
        std::env::remove_var("SPMRC_TEST_HOST");
    }

    #[test]
    fn test_load_project_overrides_home() {
        let project = tempdir().unwrap();
        let home = tempdir().unwrap();
        fs::write(project.path().join(".spmrc"), "registry = https://project\n").unwrap();
        fs::write(
            home.path().join("spmrc"),
            "registry = https://home\ncache = /home-cache\n",
        )
        .unwrap();

        let config = load_spmrc_files(project.path(), home.path()).unwrap();
        assert_eq!(config.registry(), Some("https://project"));
        assert_eq!(config.cache(), Some("/home-cache"));
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn test_load_missing_files_is_empty() {
        let project = tempdir().unwrap();
        let home = tempdir().unwrap();
        let config = load_spmrc_files(project.path(), home.path()).unwrap();
        assert_eq!(config, SpmrcConfig::default());
    }
}
