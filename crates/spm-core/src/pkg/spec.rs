//! Package identifier parsing.
//!
//! Parses identifiers like:
//! - `jquery`
//! - `jquery@1.7.2`
//! - `jquery@~1.7.0`
//! - `@alice/widget@1.0.0`
//!
//! The version is everything after the LAST `@`. A leading `@` belongs to
//! the name.

use super::error::PkgError;
use std::fmt;

/// Version label used in place of a missing version.
pub const STABLE: &str = "stable";

/// Build the dedup key for a package: `name@version`, or `name@stable`
/// when no version is known.
#[must_use]
pub fn pkg_key(name: &str, version: Option<&str>) -> String {
    format!("{name}@{}", version.unwrap_or(STABLE))
}

/// A parsed package identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpec {
    /// Package name.
    pub name: String,
    /// Requested version or range (None means stable).
    pub version: Option<String>,
}

impl PackageSpec {
    /// Parse an identifier string.
    ///
    /// # Errors
    /// Returns an error if the name is empty or malformed, or if an `@`
    /// is followed by nothing.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(PkgError::spec_invalid("Empty package identifier"));
        }

        let (name, version) = match input.rfind('@') {
            Some(at_pos) if at_pos > 0 => {
                let version = &input[at_pos + 1..];
                if version.is_empty() {
                    return Err(PkgError::spec_invalid(format!(
                        "Invalid package identifier: empty version in '{input}'"
                    )));
                }
                (&input[..at_pos], Some(version.to_string()))
            }
            _ => (input, None),
        };

        Self::validate_name(name)?;

        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    /// Build a spec from a dependency entry (`name` → `range`).
    ///
    /// Empty ranges and the `stable` tag mean "no version".
    ///
    /// # Errors
    /// Returns an error if the name is invalid.
    pub fn from_dependency(name: &str, range: &str) -> Result<Self, PkgError> {
        Self::validate_name(name)?;
        let range = range.trim();
        let version = if range.is_empty() || range == STABLE || range == "*" {
            None
        } else {
            Some(range.to_string())
        };
        Ok(Self {
            name: name.to_string(),
            version,
        })
    }

    fn validate_name(name: &str) -> Result<(), PkgError> {
        if name.is_empty() {
            return Err(PkgError::spec_invalid("Empty package name"));
        }

        let bare = if let Some(scoped) = name.strip_prefix('@') {
            let Some((scope, rest)) = scoped.split_once('/') else {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid scoped package: missing '/' in '{name}'"
                )));
            };
            if scope.is_empty() || rest.is_empty() {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid scoped package name '{name}'"
                )));
            }
            Self::validate_segment(name, scope)?;
            rest
        } else {
            name
        };

        Self::validate_segment(name, bare)
    }

    fn validate_segment(name: &str, segment: &str) -> Result<(), PkgError> {
        if segment == "." || segment == ".." {
            return Err(PkgError::spec_invalid(format!(
                "Invalid package name '{name}'"
            )));
        }
        for c in segment.chars() {
            if !c.is_alphanumeric() && c != '-' && c != '_' && c != '.' {
                return Err(PkgError::spec_invalid(format!(
                    "Invalid character '{c}' in package name '{name}'"
                )));
            }
        }
        Ok(())
    }

    /// Requested version, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Whether the requested version is a single concrete version rather
    /// than a range.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.version()
            .is_some_and(|v| semver::Version::parse(v).is_ok())
    }

    /// Dedup key for this request.
    #[must_use]
    pub fn key(&self) -> String {
        pkg_key(&self.name, self.version())
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{version}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let spec = PackageSpec::parse("jquery").unwrap();
        assert_eq!(spec.name, "jquery");
        assert_eq!(spec.version, None);
        assert_eq!(spec.key(), "jquery@stable");
    }

    #[test]
    fn test_parse_with_version() {
        let spec = PackageSpec::parse("jquery@1.7.2").unwrap();
        assert_eq!(spec.name, "jquery");
        assert_eq!(spec.version(), Some("1.7.2"));
        assert!(spec.is_exact());
        assert_eq!(spec.key(), "jquery@1.7.2");
    }

    #[test]
    fn test_parse_with_range() {
        let spec = PackageSpec::parse("jquery@~1.7.0").unwrap();
        assert_eq!(spec.version(), Some("~1.7.0"));
        assert!(!spec.is_exact());
    }

    #[test]
    fn test_parse_splits_on_last_at() {
        let spec = PackageSpec::parse("@alice/widget@1.0.0").unwrap();
        assert_eq!(spec.name, "@alice/widget");
        assert_eq!(spec.version(), Some("1.0.0"));

        let spec = PackageSpec::parse("@alice/widget").unwrap();
        assert_eq!(spec.name, "@alice/widget");
        assert_eq!(spec.version, None);
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!(PackageSpec::parse("").is_err());
        assert!(PackageSpec::parse("   ").is_err());
        assert!(PackageSpec::parse("@").is_err());
    }

    #[test]
    fn test_parse_empty_version_fails() {
        assert!(PackageSpec::parse("jquery@").is_err());
    }

    #[test]
    fn test_parse_invalid_name_fails() {
        assert!(PackageSpec::parse("bad name").is_err());
        assert!(PackageSpec::parse("@scope").is_err());
        assert!(PackageSpec::parse("@/name").is_err());
        assert!(PackageSpec::parse("a/b").is_err());
    }

    #[test]
    fn test_dot_segments_are_not_names() {
        assert!(PackageSpec::parse("..").is_err());
        assert!(PackageSpec::parse("..@1.0.0").is_err());
        assert!(PackageSpec::parse("@scope/..").is_err());
        assert!(PackageSpec::from_dependency(".", "1.0.0").is_err());
        assert!(PackageSpec::parse("jquery.ui").is_ok());
    }

    #[test]
    fn test_from_dependency() {
        let spec = PackageSpec::from_dependency("bar", "^1.0.0").unwrap();
        assert_eq!(spec.to_string(), "bar@^1.0.0");

        let spec = PackageSpec::from_dependency("bar", "stable").unwrap();
        assert_eq!(spec.version, None);

        let spec = PackageSpec::from_dependency("bar", "").unwrap();
        assert_eq!(spec.to_string(), "bar");
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let spec = PackageSpec::parse("foo@1.2.0").unwrap();
        assert_eq!(PackageSpec::parse(&spec.to_string()).unwrap(), spec);
    }

    #[test]
    fn test_pkg_key() {
        assert_eq!(pkg_key("foo", Some("1.2.0")), "foo@1.2.0");
        assert_eq!(pkg_key("foo", None), "foo@stable");
    }
}
