use crate::error::Error;
use crate::paths::{default_cache_dir, resolve_against, spm_home};
use crate::pkg::spmrc::{load_spmrc_files, SpmrcConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Default registry URL.
pub const DEFAULT_REGISTRY: &str = "https://spmjs.io";

/// Environment variable to override the registry URL.
pub const REGISTRY_ENV: &str = "SPM_REGISTRY";

/// Default install destination, relative to the project directory.
pub const DEFAULT_DESTINATION: &str = "spm_modules";

/// File name of the project descriptor.
pub const MANIFEST_NAME: &str = "package.json";

/// Runtime configuration for the spm CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory (the project base directory).
    pub cwd: PathBuf,

    /// spm home directory (holds `spmrc` and the default cache).
    pub home_dir: PathBuf,

    /// Registry base URL.
    pub registry: String,

    /// Archive cache directory.
    pub cache_dir: PathBuf,

    /// Install destination; relative paths resolve against `cwd`.
    pub destination: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let home_dir = spm_home();
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            cache_dir: default_cache_dir(&home_dir),
            home_dir,
            registry: DEFAULT_REGISTRY.to_string(),
            destination: PathBuf::from(DEFAULT_DESTINATION),
        }
    }
}

impl Config {
    /// Create a new config with the given working directory and built-in defaults.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Load configuration for `cwd`.
    ///
    /// Layers, lowest precedence first: built-in defaults, `spmrc` files
    /// (home, then project), then `SPM_REGISTRY`. Explicit command-line
    /// values are applied afterwards by the caller through the `with_*`
    /// methods.
    ///
    /// # Errors
    /// Returns an error if an `spmrc` file cannot be read or holds an invalid
    /// registry URL.
    pub fn load(cwd: PathBuf) -> Result<Self, Error> {
        let mut config = Self::new(cwd);
        let rc = load_spmrc_files(&config.cwd, &config.home_dir)?;
        config.apply_spmrc(&rc)?;

        if let Ok(url) = std::env::var(REGISTRY_ENV) {
            if !url.trim().is_empty() {
                config.registry = validate_registry(url.trim(), REGISTRY_ENV)?;
            }
        }

        Ok(config)
    }

    fn apply_spmrc(&mut self, rc: &SpmrcConfig) -> Result<(), Error> {
        let origin = rc
            .sources
            .first()
            .map_or_else(|| "spmrc".to_string(), |p| p.display().to_string());

        if let Some(registry) = rc.registry() {
            self.registry = validate_registry(registry, &origin)?;
        }
        if let Some(cache) = rc.cache() {
            self.cache_dir = PathBuf::from(cache);
        }
        if let Some(destination) = rc.destination() {
            self.destination = PathBuf::from(destination);
        }
        Ok(())
    }

    /// Set the registry URL.
    #[must_use]
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = registry.into();
        self
    }

    /// Set the archive cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    /// Set the install destination.
    #[must_use]
    pub fn with_destination(mut self, destination: PathBuf) -> Self {
        self.destination = destination;
        self
    }

    /// Absolute install destination directory.
    #[must_use]
    pub fn destination_dir(&self) -> PathBuf {
        resolve_against(&self.cwd, &self.destination)
    }

    /// Absolute archive cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        resolve_against(&self.cwd, &self.cache_dir)
    }
}

fn validate_registry(value: &str, origin: &str) -> Result<String, Error> {
    Url::parse(value).map_err(|e| Error::ConfigInvalid {
        key: "registry".to_string(),
        origin: origin.to_string(),
        message: e.to_string(),
    })?;
    Ok(value.to_string())
}
