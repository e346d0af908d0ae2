//! Configuration schema types for `assetpipe.toml`
//!
//! Every section is optional; the defaults reproduce the fixed `./src` ->
//! `./dist` layout served on `127.0.0.1:3000`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Project roots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Source root holding the per-class subdirectories
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Destination root, removed before every build
    #[serde(default = "default_dist")]
    pub dist: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { src: default_src(), dist: default_dist() }
    }
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_dist() -> PathBuf {
    PathBuf::from("dist")
}

/// Development server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port to bind
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Watch mode configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce window for file events in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear the terminal before each rebuild
    #[serde(default)]
    pub clear_screen: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms(), clear_screen: false }
    }
}

fn default_debounce_ms() -> u32 {
    100
}

/// Complete `assetpipe.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Roots
    #[serde(default)]
    pub project: ProjectConfig,
    /// Development server
    #[serde(default)]
    pub server: ServerConfig,
    /// Watch mode
    #[serde(default)]
    pub watch: WatchConfig,
}

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted field path
    pub field: String,
    /// What is wrong
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl PipelineConfig {
    /// Check the configuration, returning every problem found.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.project.src.as_os_str().is_empty() {
            issues.push(issue("project.src", "must not be empty"));
        }
        if self.project.dist.as_os_str().is_empty() {
            issues.push(issue("project.dist", "must not be empty"));
        }
        if !self.project.src.as_os_str().is_empty() && self.project.src == self.project.dist {
            issues.push(issue("project.dist", "must differ from project.src"));
        }
        if self.server.host.trim().is_empty() {
            issues.push(issue("server.host", "must not be empty"));
        }
        if self.server.port == 0 {
            issues.push(issue("server.port", "must be between 1 and 65535"));
        }
        if self.watch.debounce_ms == 0 || self.watch.debounce_ms > 10_000 {
            issues.push(issue("watch.debounce_ms", "must be between 1 and 10000"));
        }

        issues
    }
}

fn issue(field: &str, message: &str) -> ConfigIssue {
    ConfigIssue { field: field.to_string(), message: message.to_string() }
}
