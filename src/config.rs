//! Engine configuration (`viewsync.toml`).
//!
//! Missing file → all defaults (no error). Unknown keys are rejected so a
//! typo never silently falls back to a default.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use viewsync_git::Identity;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Where repositories live and how trunks are initialized.
    #[serde(default)]
    pub repos: ReposConfig,

    /// Exclusive-executor settings.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Snapshot settings.
    #[serde(default)]
    pub snapshots: SnapshotsConfig,

    /// Identity stamped on every commit the engine writes.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Record store used by the CLI.
    #[serde(default)]
    pub store: StoreConfig,
}

// ---------------------------------------------------------------------------
// ReposConfig
// ---------------------------------------------------------------------------

/// Repository placement.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReposConfig {
    /// Root directory holding `<codebase>/trunk` and `<codebase>/<view>`.
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// Default branch of every trunk (default: `"trunk"`).
    #[serde(default = "default_trunk_branch")]
    pub trunk_branch: String,
}

impl Default for ReposConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            trunk_branch: default_trunk_branch(),
        }
    }
}

fn default_base_path() -> PathBuf {
    PathBuf::from(".viewsync/repos")
}

fn default_trunk_branch() -> String {
    "trunk".to_owned()
}

// ---------------------------------------------------------------------------
// ExecutorConfig
// ---------------------------------------------------------------------------

/// Lock-wait behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Default bound on lock waits, in milliseconds. Absent = wait forever.
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,

    /// How often a queued waiter re-checks its deadline and cancel token.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

const fn default_poll_interval_ms() -> u64 {
    25
}

impl ExecutorConfig {
    /// The configured default lock timeout.
    #[must_use]
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// The poll interval, never shorter than one millisecond.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

// ---------------------------------------------------------------------------
// SnapshotsConfig
// ---------------------------------------------------------------------------

/// Snapshot settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotsConfig {
    /// Push every snapshot ref to the trunk so other views can restore it.
    #[serde(default = "default_publish_to_trunk")]
    pub publish_to_trunk: bool,
}

impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            publish_to_trunk: default_publish_to_trunk(),
        }
    }
}

const fn default_publish_to_trunk() -> bool {
    true
}

// ---------------------------------------------------------------------------
// IdentityConfig
// ---------------------------------------------------------------------------

/// Commit identity.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_name")]
    pub name: String,
    #[serde(default = "default_identity_email")]
    pub email: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_identity_name(),
            email: default_identity_email(),
        }
    }
}

fn default_identity_name() -> String {
    Identity::default().name
}

fn default_identity_email() -> String {
    Identity::default().email
}

impl From<&IdentityConfig> for Identity {
    fn from(cfg: &IdentityConfig) -> Self {
        Self::new(cfg.name.clone(), cfg.email.clone())
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Record store location.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory holding one JSON file per record.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".viewsync/state")
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// A configuration file could not be read or parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }

    /// Config rooted at `dir`: repositories and records both live under it.
    ///
    /// Used by tests and embedders that want an isolated engine.
    #[must_use]
    pub fn rooted_at(dir: &Path) -> Self {
        let mut cfg = Self::default();
        cfg.repos.base_path = dir.join("repos");
        cfg.store.path = dir.join("state");
        cfg
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
