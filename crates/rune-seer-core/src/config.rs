//! Configuration loading and discovery.
//!
//! This module provides configuration file discovery by:
//! 1. Walking up from the current directory to find project config
//! 2. Loading user config from XDG config directory
//! 3. Merging with sensible defaults
//!
//! # Supported formats
//!
//! The following configuration file formats are supported:
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`)
//!
//! # Config file locations (in order of precedence, highest first):
//! - `RUNE_SEER_*` environment variables
//! - `rune-seer.<ext>` in current directory or any parent
//! - `.rune-seer.<ext>` in current directory or any parent
//! - `~/.config/rune-seer/config.<ext>` (user config)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`
//!
//! Nested keys are reached from the environment with a double underscore:
//! `RUNE_SEER_RATE_LIMIT__BURST=10`.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use rune_seer_core::config::{Config, ConfigLoader};
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let (config, _sources) = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! println!("burst: {}", config.rate_limit.burst);
//! ```

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::ratelimit::identity::DEFAULT_TRUSTED_PROXY_HEADER;

/// Default request body / input size limit (64 KiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 64 * 1024;

/// Default listen address for `serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Token-bucket policy applied to every client identity.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Tokens credited per second (sustained request rate).
    pub refill_per_second: f64,
    /// Bucket capacity (largest burst a fresh or rested client may send).
    pub burst: u32,
    /// Seconds between idle-visitor sweeps.
    pub sweep_interval_secs: u64,
    /// Seconds without contact after which a visitor is forgotten.
    pub visitor_ttl_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            refill_per_second: 1.0,
            burst: 5,
            sweep_interval_secs: 5 * 60,
            visitor_ttl_secs: 10 * 60,
        }
    }
}

impl RateLimitConfig {
    /// Interval between sweeps.
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Idle time after which a visitor is dropped.
    pub const fn visitor_ttl(&self) -> Duration {
        Duration::from_secs(self.visitor_ttl_secs)
    }

    /// Reject policies the limiter cannot enforce.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.refill_per_second.is_finite() && self.refill_per_second > 0.0) {
            return Err(ConfigError::Invalid {
                field: "rate_limit.refill_per_second",
                reason: format!("must be a positive number, got {}", self.refill_per_second),
            });
        }
        if self.burst == 0 {
            return Err(ConfigError::Invalid {
                field: "rate_limit.burst",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "rate_limit.sweep_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.visitor_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "rate_limit.visitor_ttl_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// The configuration for rune-seer.
///
/// This struct is deserialized from config files found during discovery
/// (TOML, YAML, or JSON) and `RUNE_SEER_*` environment variables.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (no file logging if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Address `serve` listens on.
    pub bind: String,
    /// Maximum input size in bytes (default: 64 KiB).
    ///
    /// Applies to CLI input and HTTP request bodies. Omit to use the default.
    /// Use `disable_input_limit` to remove the limit entirely.
    pub max_input_bytes: Option<usize>,
    /// Disable the input size limit entirely.
    pub disable_input_limit: bool,
    /// Header set by a trusted edge proxy carrying the client address.
    ///
    /// Consulted before `X-Forwarded-For`. An empty string disables it.
    pub trusted_proxy_header: String,
    /// Per-client rate limiting for `serve`.
    pub rate_limit: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_dir: None,
            bind: DEFAULT_BIND.to_string(),
            max_input_bytes: None,
            disable_input_limit: false,
            trusted_proxy_header: DEFAULT_TRUSTED_PROXY_HEADER.to_string(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Config {
    /// Effective input limit: `None` when disabled.
    pub fn input_limit(&self) -> Option<usize> {
        if self.disable_input_limit {
            None
        } else {
            Some(self.max_input_bytes.unwrap_or(DEFAULT_MAX_INPUT_BYTES))
        }
    }

    /// The trusted proxy header, or `None` when disabled.
    pub fn trusted_proxy_header(&self) -> Option<&str> {
        Some(self.trusted_proxy_header.trim()).filter(|h| !h.is_empty())
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        self.rate_limit.validate()?;
        if self.max_input_bytes == Some(0) && !self.disable_input_limit {
            return Err(ConfigError::Invalid {
                field: "max_input_bytes",
                reason: "must be at least 1; set disable_input_limit to remove the limit"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Metadata about which configuration sources were loaded.
///
/// Returned alongside [`Config`] from [`ConfigLoader::load()`] so commands
/// can report the actual config files without re-discovering them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigSources {
    /// Project config files found by walking up, ordered low→high precedence.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub project_files: Vec<Utf8PathBuf>,
    /// User config file from XDG config directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_file: Option<Utf8PathBuf>,
    /// Explicit config files loaded (e.g., from `--config` flag).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigSources {
    /// Returns the highest-precedence config file that was loaded.
    ///
    /// Precedence: explicit files > project files > user file.
    pub fn primary_file(&self) -> Option<&Utf8Path> {
        self.explicit_files
            .last()
            .map(Utf8PathBuf::as_path)
            .or_else(|| self.project_files.last().map(Utf8PathBuf::as_path))
            .or(self.user_file.as_deref())
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "rune-seer";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "RUNE_SEER_";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    ///
    /// The loader will walk up from this directory looking for config files.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/rune-seer/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set a boundary marker to stop directory traversal.
    ///
    /// When walking up directories, stop if we find a directory containing
    /// this file or directory name. Default is `.git`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Disable boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    /// Explicit files are loaded after discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. `RUNE_SEER_*` environment variables
    /// 2. Explicit files (in order added via `with_file`)
    /// 3. Project config (closest to search root)
    /// 4. User config (`~/.config/rune-seer/config.<ext>`)
    /// 5. Default values
    ///
    /// The merged result is validated before it is returned.
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<(Config, ConfigSources)> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let mut sources = ConfigSources::default();

        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
            sources.user_file = Some(user_config);
        }

        if let Some(ref root) = self.project_search_root {
            let project_configs = self.find_project_configs(root);
            for pc in &project_configs {
                figment = Self::merge_file(figment, pc);
            }
            sources.project_files = project_configs;
        }

        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }
        sources.explicit_files = self.explicit_files;

        // RUNE_SEER_BIND=0.0.0.0:8080, RUNE_SEER_RATE_LIMIT__BURST=10, etc.
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        config.validate()?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            burst = config.rate_limit.burst,
            refill_per_second = config.rate_limit.refill_per_second,
            "configuration loaded"
        );
        Ok((config, sources))
    }

    /// Load configuration, returning an error if no config file is found.
    pub fn load_or_error(self) -> ConfigResult<(Config, ConfigSources)> {
        let has_user = self.include_user_config && self.find_user_config().is_some();
        let has_project = self
            .project_search_root
            .as_ref()
            .is_some_and(|root| !self.find_project_configs(root).is_empty());
        let has_explicit = !self.explicit_files.is_empty();

        if !has_user && !has_project && !has_explicit {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    /// Find project config files by walking up from the given directory.
    ///
    /// Returns all matching config files from the closest directory that has
    /// any match, dotfiles before regular files (low→high precedence).
    fn find_project_configs(&self, start: &Utf8Path) -> Vec<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            let mut found = Vec::new();

            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    found.push(dotfile);
                }
            }
            for ext in CONFIG_EXTENSIONS {
                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    found.push(regular);
                }
            }

            if !found.is_empty() {
                return found;
            }

            // Checked after the config files so a config next to the marker is found.
            if let Some(ref marker) = self.boundary_marker
                && dir.join(marker).exists()
                && dir != start
            {
                break;
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        Vec::new()
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Get the project directories for XDG-compliant path resolution.
///
/// Returns `None` if the home directory cannot be determined.
fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path.
///
/// Returns `~/.config/rune-seer/` on Linux, `~/Library/Application Support/rune-seer/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serializes tests that mutate environment variables via `set_var`/`remove_var`.
    /// Prevents race conditions when nextest runs tests in the same binary concurrently.
    static TEST_ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::try_from(path.to_path_buf()).unwrap()
    }

    fn load_from(dir: &TempDir) -> (Config, ConfigSources) {
        ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(utf8(dir.path()))
            .load()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_dir.is_none());
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.trusted_proxy_header, "X-Fly-Client-IP");
        assert_eq!(config.rate_limit.refill_per_second, 1.0);
        assert_eq!(config.rate_limit.burst, 5);
        assert_eq!(config.rate_limit.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.rate_limit.visitor_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_loader_builds_with_defaults() {
        let loader = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker();

        let (config, sources) = loader.load().unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(sources.primary_file().is_none());
    }

    #[test]
    fn test_single_file_overrides_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"log_level = "debug"
log_dir = "/tmp/rune-seer"
bind = "0.0.0.0:9000"

[rate_limit]
burst = 20
"#,
        )
        .unwrap();

        let (config, sources) = ConfigLoader::new()
            .with_user_config(false)
            .with_file(utf8(&config_path))
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(
            config.log_dir.as_ref().map(|dir| dir.as_str()),
            Some("/tmp/rune-seer")
        );
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.rate_limit.burst, 20);
        // untouched nested fields keep their defaults
        assert_eq!(config.rate_limit.visitor_ttl_secs, 600);
        assert_eq!(sources.primary_file(), Some(utf8(&config_path).as_path()));
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first.toml");
        let second = tmp.path().join("second.yaml");
        fs::write(&first, "[rate_limit]\nburst = 7\nrefill_per_second = 2.0\n").unwrap();
        fs::write(&second, "rate_limit:\n  burst: 9\n").unwrap();

        let (config, _sources) = ConfigLoader::new()
            .with_user_config(false)
            .with_file(utf8(&first))
            .with_file(utf8(&second))
            .load()
            .unwrap();

        assert_eq!(config.rate_limit.burst, 9);
        assert_eq!(config.rate_limit.refill_per_second, 2.0);
    }

    #[test]
    fn test_project_config_discovery() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join(".rune-seer.toml"), r#"log_level = "warn""#).unwrap();

        let (config, sources) = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(utf8(&nested))
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(sources.project_files.len(), 1);
    }

    #[test]
    fn test_boundary_marker_stops_search() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        let nested = repo.join("src");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir(repo.join(".git")).unwrap();
        // above the boundary, must not be found
        fs::write(tmp.path().join(".rune-seer.toml"), r#"log_level = "error""#).unwrap();

        let (config, sources) = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(utf8(&nested))
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Info);
        assert!(sources.project_files.is_empty());
    }

    #[test]
    fn test_explicit_file_overrides_project_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("rune-seer.toml"), r#"bind = "127.0.0.1:1111""#).unwrap();
        let explicit = tmp.path().join("override.json");
        fs::write(&explicit, r#"{"bind": "127.0.0.1:2222"}"#).unwrap();

        let (config, sources) = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(utf8(tmp.path()))
            .with_file(utf8(&explicit))
            .load()
            .unwrap();

        assert_eq!(config.bind, "127.0.0.1:2222");
        assert_eq!(sources.primary_file(), Some(utf8(&explicit).as_path()));
    }

    #[test]
    fn dotfile_before_regular() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".rune-seer.toml"), r#"log_level = "debug""#).unwrap();
        fs::write(tmp.path().join("rune-seer.toml"), r#"log_level = "error""#).unwrap();

        let (config, sources) = load_from(&tmp);

        assert_eq!(config.log_level, LogLevel::Error);
        assert_eq!(sources.project_files.len(), 2);
    }

    #[test]
    fn only_closest_directory_contributes() {
        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("parent");
        let child = parent.join("child");
        fs::create_dir_all(&child).unwrap();

        fs::write(parent.join(".rune-seer.toml"), "[rate_limit]\nburst = 50\n").unwrap();
        fs::write(child.join(".rune-seer.toml"), r#"log_level = "error""#).unwrap();

        let (config, sources) = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(utf8(&child))
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Error);
        assert_eq!(config.rate_limit.burst, 5);
        assert_eq!(sources.project_files.len(), 1);
    }

    #[test]
    fn yaml_config_discovered() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("rune-seer.yaml"),
            "rate_limit:\n  refill_per_second: 0.5\n  visitor_ttl_secs: 60\n",
        )
        .unwrap();

        let (config, sources) = load_from(&tmp);

        assert_eq!(config.rate_limit.refill_per_second, 0.5);
        assert_eq!(config.rate_limit.visitor_ttl(), Duration::from_secs(60));
        assert_eq!(sources.project_files.len(), 1);
    }

    #[test]
    fn test_load_or_error_fails_when_no_config() {
        let tmp = TempDir::new().unwrap();
        let result = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(utf8(tmp.path()))
            .load_or_error();
        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn test_load_or_error_succeeds_with_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.toml");
        fs::write(&path, r#"log_level = "warn""#).unwrap();
        let (config, _) = ConfigLoader::new()
            .with_user_config(false)
            .with_file(utf8(&path))
            .load_or_error()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_user_config_dir() {
        if let Some(dir) = user_config_dir() {
            assert!(dir.as_str().contains("rune-seer"));
        }
    }

    #[test]
    fn input_limit_defaults_and_overrides() {
        let mut config = Config::default();
        assert_eq!(config.input_limit(), Some(DEFAULT_MAX_INPUT_BYTES));
        config.max_input_bytes = Some(10);
        assert_eq!(config.input_limit(), Some(10));
        config.disable_input_limit = true;
        assert_eq!(config.input_limit(), None);
    }

    #[test]
    fn empty_trusted_header_disables_it() {
        let mut config = Config::default();
        assert_eq!(config.trusted_proxy_header(), Some("X-Fly-Client-IP"));
        config.trusted_proxy_header = "  ".to_string();
        assert_eq!(config.trusted_proxy_header(), None);
    }

    #[test]
    fn zero_burst_is_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("rune-seer.toml"), "[rate_limit]\nburst = 0\n").unwrap();

        let result = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(utf8(tmp.path()))
            .load();

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "rate_limit.burst",
                ..
            })
        ));
    }

    #[test]
    fn non_positive_refill_is_rejected() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let policy = RateLimitConfig {
                refill_per_second: rate,
                ..RateLimitConfig::default()
            };
            assert!(policy.validate().is_err(), "rate {rate} accepted");
        }
    }

    #[test]
    fn zero_durations_are_rejected() {
        let policy = RateLimitConfig {
            sweep_interval_secs: 0,
            ..RateLimitConfig::default()
        };
        assert!(policy.validate().is_err());
        let policy = RateLimitConfig {
            visitor_ttl_secs: 0,
            ..RateLimitConfig::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn zero_input_limit_is_rejected_unless_disabled() {
        let mut config = Config {
            max_input_bytes: Some(0),
            ..Config::default()
        };
        assert!(config.validate().is_err());
        config.disable_input_limit = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_deserializes_from_yaml() {
        let yaml = r#"
log_level: warn
trusted_proxy_header: CF-Connecting-IP
rate_limit:
  burst: 3
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.trusted_proxy_header, "CF-Connecting-IP");
        assert_eq!(config.rate_limit.burst, 3);
        assert_eq!(config.rate_limit.refill_per_second, 1.0);
        assert_eq!(config.bind, DEFAULT_BIND);
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_env_var_override_nested() {
        let _lock = TEST_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        // SAFETY: Test environment; the mutex serializes env access across tests.
        unsafe {
            std::env::set_var("RUNE_SEER_RATE_LIMIT__BURST", "12");
        }

        let result = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load();

        // SAFETY: Cleanup after test.
        unsafe {
            std::env::remove_var("RUNE_SEER_RATE_LIMIT__BURST");
        }

        let (config, _sources) = result.unwrap();
        assert_eq!(config.rate_limit.burst, 12);
    }

    #[test]
    #[allow(unsafe_code)]
    fn test_env_var_overrides_file_config() {
        let _lock = TEST_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "bind = \"127.0.0.1:1\"\n").unwrap();

        // SAFETY: Test environment; the mutex serializes env access across tests.
        unsafe {
            std::env::set_var("RUNE_SEER_BIND", "127.0.0.1:2");
        }

        let result = ConfigLoader::new()
            .with_user_config(false)
            .with_file(utf8(&config_path))
            .load();

        // SAFETY: Cleanup after test.
        unsafe {
            std::env::remove_var("RUNE_SEER_BIND");
        }

        let (config, _sources) = result.unwrap();
        assert_eq!(config.bind, "127.0.0.1:2");
    }
}
