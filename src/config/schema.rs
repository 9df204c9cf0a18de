//! Configuration schema for getrun
//!
//! Configuration is stored at `~/.config/getrun/config.toml`

use crate::repository::RepositorySource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Artifact cache settings
    pub cache: CacheConfig,

    /// Child process settings
    pub launch: LaunchConfig,

    /// Dependency resolution settings
    pub resolver: ResolverConfig,

    /// Repository chain, queried in order
    pub repositories: Vec<RepositorySource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            cache: CacheConfig::default(),
            launch: LaunchConfig::default(),
            resolver: ResolverConfig::default(),
            repositories: RepositorySource::default_chain(),
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Artifact cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory, relative to the working directory
    pub dir: PathBuf,

    /// Refuse to reuse a cache populated for a different coordinate
    pub verify_coordinate: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            verify_coordinate: true,
        }
    }
}

/// Child process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Java launcher; falls back to `$JAVA_HOME/bin/java`, then `java`
    pub java: Option<PathBuf>,

    /// Extra JVM arguments placed before `-cp`
    pub jvm_args: Vec<String>,

    /// Seconds to wait after SIGTERM before force-killing the child
    pub shutdown_grace_secs: u64,
}

impl LaunchConfig {
    /// Resolve the launcher executable
    pub fn java_executable(&self) -> PathBuf {
        if let Some(ref java) = self.java {
            return java.clone();
        }

        let binary = if cfg!(windows) { "java.exe" } else { "java" };
        match std::env::var_os("JAVA_HOME") {
            Some(home) if !home.is_empty() => PathBuf::from(home).join("bin").join(binary),
            _ => PathBuf::from(binary),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            java: None,
            jvm_args: vec![],
            shutdown_grace_secs: 10,
        }
    }
}

/// Dependency resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Per-request timeout for remote repositories
    pub timeout_secs: u64,

    /// Verify downloaded jars against published `.sha256` files
    pub verify_checksums: bool,
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            verify_checksums: true,
        }
    }
}
