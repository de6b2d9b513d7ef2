//! Package installer error types.

use serde::Serialize;
use std::fmt;
use std::io;

/// Package installer error codes.
pub mod codes {
    pub const PKG_SPEC_INVALID: &str = "PKG_SPEC_INVALID";
    pub const PKG_NOT_FOUND: &str = "PKG_NOT_FOUND";
    pub const PKG_VERSION_NOT_FOUND: &str = "PKG_VERSION_NOT_FOUND";
    pub const PKG_RESOLVE_FAILED: &str = "PKG_RESOLVE_FAILED";
    pub const PKG_TRANSFER_FAILED: &str = "PKG_TRANSFER_FAILED";
    pub const PKG_EXTRACT_FAILED: &str = "PKG_EXTRACT_FAILED";
    pub const PKG_MANIFEST_NOT_FOUND: &str = "PKG_MANIFEST_NOT_FOUND";
    pub const PKG_MANIFEST_INVALID: &str = "PKG_MANIFEST_INVALID";
    pub const PKG_DEP_RANGE_INVALID: &str = "PKG_DEP_RANGE_INVALID";
    pub const PKG_CACHE_ERROR: &str = "PKG_CACHE_ERROR";
}

/// Which install stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PkgErrorKind {
    /// Bad identifier, or metadata lookup failed / was malformed.
    Resolution,
    /// Archive download failed.
    Transfer,
    /// Archive could not be decoded or written.
    Extraction,
    /// Project descriptor missing or unparseable.
    Manifest,
    /// Local filesystem failure outside the other stages.
    Io,
}

/// Package installer error.
#[derive(Debug)]
pub struct PkgError {
    code: &'static str,
    message: String,
}

impl PkgError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classify the error by install stage.
    #[must_use]
    pub fn kind(&self) -> PkgErrorKind {
        match self.code {
            codes::PKG_SPEC_INVALID
            | codes::PKG_NOT_FOUND
            | codes::PKG_VERSION_NOT_FOUND
            | codes::PKG_RESOLVE_FAILED => PkgErrorKind::Resolution,
            codes::PKG_TRANSFER_FAILED => PkgErrorKind::Transfer,
            codes::PKG_EXTRACT_FAILED => PkgErrorKind::Extraction,
            codes::PKG_MANIFEST_NOT_FOUND
            | codes::PKG_MANIFEST_INVALID
            | codes::PKG_DEP_RANGE_INVALID => PkgErrorKind::Manifest,
            _ => PkgErrorKind::Io,
        }
    }

    /// Create a spec invalid error.
    pub fn spec_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_SPEC_INVALID, msg)
    }

    /// Create a package not found error.
    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self::new(codes::PKG_NOT_FOUND, format!("Package not found: {name}"))
    }

    /// Create a version not found error.
    #[must_use]
    pub fn version_not_found(name: &str, range: &str) -> Self {
        Self::new(
            codes::PKG_VERSION_NOT_FOUND,
            format!("No version of {name} satisfies range: {range}"),
        )
    }

    /// Create a metadata resolution error.
    pub fn resolve_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_RESOLVE_FAILED, msg)
    }

    /// Create an archive transfer error.
    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_TRANSFER_FAILED, msg)
    }

    /// Create an extraction failed error.
    pub fn extract_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_EXTRACT_FAILED, msg)
    }

    /// Create a manifest not found error.
    #[must_use]
    pub fn manifest_not_found(path: &std::path::Path) -> Self {
        Self::new(
            codes::PKG_MANIFEST_NOT_FOUND,
            format!("package.json not found: {}", path.display()),
        )
    }

    /// Create a manifest invalid error.
    pub fn manifest_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_MANIFEST_INVALID, msg)
    }

    /// Create a cache error.
    pub fn cache_error(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_CACHE_ERROR, msg)
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {}

impl From<io::Error> for PkgError {
    fn from(e: io::Error) -> Self {
        Self::new(codes::PKG_CACHE_ERROR, e.to_string())
    }
}

impl From<reqwest::Error> for PkgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::new(codes::PKG_RESOLVE_FAILED, format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::new(codes::PKG_RESOLVE_FAILED, format!("Connection failed: {e}"))
        } else if e.is_decode() {
            Self::new(codes::PKG_RESOLVE_FAILED, format!("Malformed metadata: {e}"))
        } else {
            Self::new(codes::PKG_RESOLVE_FAILED, e.to_string())
        }
    }
}

impl From<serde_json::Error> for PkgError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(codes::PKG_RESOLVE_FAILED, format!("Invalid JSON: {e}"))
    }
}
