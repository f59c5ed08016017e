// carta-config/src/lib.rs
// Layered configuration shared by the controller and the spawner.
//
// Precedence, lowest to highest: built-in defaults, environment variables
// (`CARTA_` prefix, dotted keys with `.` mapped to `_`), an optional TOML
// config file, and finally `--override "key:value,key:value"` pairs.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

/// Environment variable prefix for all config keys.
pub const ENV_PREFIX: &str = "CARTA_";

/// Config file read from the working directory when no --config is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Pam,
    Oidc,
    Both,
}

impl FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(AuthMode::None),
            "pam" => Ok(AuthMode::Pam),
            "oidc" => Ok(AuthMode::Oidc),
            "both" => Ok(AuthMode::Both),
            other => bail!("unknown auth mode: {} (expected none|pam|oidc|both)", other),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthMode::None => "none",
            AuthMode::Pam => "pam",
            AuthMode::Oidc => "oidc",
            AuthMode::Both => "both",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub port: u16,
    pub hostname: String,
    pub spawner_address: String,
    pub base_folder: String,
    pub frontend_dir: String,
    pub auth_mode: AuthMode,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            hostname: String::new(),
            spawner_address: "http://localhost:8080".to_string(),
            base_folder: String::new(),
            frontend_dir: String::new(),
            auth_mode: AuthMode::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpawnerConfig {
    pub port: u16,
    pub hostname: String,
    pub worker_process: String,
    pub timeout_secs: u64,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            hostname: String::new(),
            worker_process: "carta-worker".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Configuration shared across both services.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub log_level: LogLevel,
    pub controller: ControllerConfig,
    pub spawner: SpawnerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => bail!(
                "unknown log level: {} (expected debug|info|warn|error)",
                other
            ),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{}", s)
    }
}

// Dotted keys accepted by `set`, also the env var vocabulary.
const KNOWN_KEYS: &[&str] = &[
    "log_level",
    "controller.port",
    "controller.hostname",
    "controller.spawner_address",
    "controller.base_folder",
    "controller.frontend_dir",
    "controller.auth_mode",
    "spawner.port",
    "spawner.hostname",
    "spawner.worker_process",
    "spawner.timeout",
];

// Optional-field mirror of `Config` for deserializing the TOML file.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    log_level: Option<LogLevel>,
    #[serde(default)]
    controller: ControllerFileConfig,
    #[serde(default)]
    spawner: SpawnerFileConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ControllerFileConfig {
    port: Option<u16>,
    hostname: Option<String>,
    spawner_address: Option<String>,
    base_folder: Option<String>,
    frontend_dir: Option<String>,
    auth_mode: Option<AuthMode>,
}

#[derive(Debug, Default, Deserialize)]
struct SpawnerFileConfig {
    port: Option<u16>,
    hostname: Option<String>,
    worker_process: Option<String>,
    timeout: Option<u64>,
}

impl Config {
    /// Loads configuration with full layering. A missing default config
    /// file is fine; an explicitly named one must exist and parse.
    pub fn load(config_path: Option<&Path>, override_str: Option<&str>) -> Result<Config> {
        let mut cfg = Config::default();

        cfg.apply_env();

        match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                cfg.apply_file(&content)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?;
                info!("Loaded config file {}", path.display());
            }
            None => {
                if let Ok(content) = std::fs::read_to_string(DEFAULT_CONFIG_FILE) {
                    cfg.apply_file(&content)
                        .with_context(|| format!("failed to parse {}", DEFAULT_CONFIG_FILE))?;
                    info!("Loaded config file {}", DEFAULT_CONFIG_FILE);
                }
            }
        }

        if let Some(overrides) = override_str {
            cfg.apply_overrides(overrides)?;
        }

        Ok(cfg)
    }

    /// Applies `CARTA_*` environment variables for every known key.
    fn apply_env(&mut self) {
        for key in KNOWN_KEYS {
            let env_key = format!("{}{}", ENV_PREFIX, key.replace('.', "_").to_uppercase());
            if let Ok(value) = std::env::var(&env_key) {
                // A malformed env value is ignored rather than fatal; the
                // explicit layers (file, override) stay strict.
                if self.set(key, &value).is_err() {
                    tracing::warn!("Ignoring invalid value in {}: {}", env_key, value);
                }
            }
        }
    }

    fn apply_file(&mut self, content: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(content)?;

        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        let c = file.controller;
        if let Some(v) = c.port {
            self.controller.port = v;
        }
        if let Some(v) = c.hostname {
            self.controller.hostname = v;
        }
        if let Some(v) = c.spawner_address {
            self.controller.spawner_address = v;
        }
        if let Some(v) = c.base_folder {
            self.controller.base_folder = v;
        }
        if let Some(v) = c.frontend_dir {
            self.controller.frontend_dir = v;
        }
        if let Some(v) = c.auth_mode {
            self.controller.auth_mode = v;
        }
        let s = file.spawner;
        if let Some(v) = s.port {
            self.spawner.port = v;
        }
        if let Some(v) = s.hostname {
            self.spawner.hostname = v;
        }
        if let Some(v) = s.worker_process {
            self.spawner.worker_process = v;
        }
        if let Some(v) = s.timeout {
            self.spawner.timeout_secs = v;
        }

        Ok(())
    }

    /// Applies an override string of comma-separated `key:value` pairs.
    /// These have the highest precedence; malformed pairs are fatal.
    fn apply_overrides(&mut self, overrides: &str) -> Result<()> {
        for pair in overrides.split(',') {
            let (key, value) = pair
                .split_once(':')
                .with_context(|| format!("invalid override {:?} (expected key:value)", pair))?;
            self.set(key.trim(), value.trim())
                .with_context(|| format!("invalid override {:?}", pair))?;
        }
        Ok(())
    }

    /// Sets a single value by dotted key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "log_level" => self.log_level = value.parse()?,
            "controller.port" => self.controller.port = value.parse()?,
            "controller.hostname" => self.controller.hostname = value.to_string(),
            "controller.spawner_address" => {
                self.controller.spawner_address = value.to_string();
            }
            "controller.base_folder" => self.controller.base_folder = value.to_string(),
            "controller.frontend_dir" => self.controller.frontend_dir = value.to_string(),
            "controller.auth_mode" => self.controller.auth_mode = value.parse()?,
            "spawner.port" => self.spawner.port = value.parse()?,
            "spawner.hostname" => self.spawner.hostname = value.to_string(),
            "spawner.worker_process" => self.spawner.worker_process = value.to_string(),
            "spawner.timeout" => self.spawner.timeout_secs = value.parse()?,
            other => bail!("unknown config key: {}", other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.controller.port, 8081);
        assert_eq!(cfg.controller.spawner_address, "http://localhost:8080");
        assert_eq!(cfg.controller.auth_mode, AuthMode::None);
        assert_eq!(cfg.spawner.port, 8080);
        assert_eq!(cfg.spawner.worker_process, "carta-worker");
        assert_eq!(cfg.spawner.timeout_secs, 5);
        assert_eq!(cfg.log_level, LogLevel::Info);
    }

    #[test]
    fn test_file_overlay() {
        let mut cfg = Config::default();
        cfg.apply_file(
            r#"
            log_level = "debug"

            [controller]
            port = 9001
            base_folder = "/data"

            [spawner]
            worker_process = "/usr/local/bin/carta_backend"
            timeout = 10
            "#,
        )
        .unwrap();

        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.controller.port, 9001);
        assert_eq!(cfg.controller.base_folder, "/data");
        // Untouched keys keep their defaults.
        assert_eq!(cfg.controller.spawner_address, "http://localhost:8080");
        assert_eq!(cfg.spawner.worker_process, "/usr/local/bin/carta_backend");
        assert_eq!(cfg.spawner.timeout_secs, 10);
    }

    #[test]
    fn test_override_beats_file() {
        let mut cfg = Config::default();
        cfg.apply_file("[controller]\nport = 9001\n").unwrap();
        cfg.apply_overrides("controller.port:9002, log_level:warn")
            .unwrap();

        assert_eq!(cfg.controller.port, 9002);
        assert_eq!(cfg.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_malformed_override_is_rejected() {
        let mut cfg = Config::default();
        assert!(cfg.apply_overrides("controller.port=9002").is_err());
        assert!(cfg.apply_overrides("controller.port:not-a-number").is_err());
        assert!(cfg.apply_overrides("no.such.key:1").is_err());
    }

    #[test]
    fn test_auth_mode_parsing() {
        assert_eq!("pam".parse::<AuthMode>().unwrap(), AuthMode::Pam);
        assert!("kerberos".parse::<AuthMode>().is_err());
    }

    #[test]
    fn test_explicit_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "[controller]\nauth_mode = \"none\"\nport = 7777\n").unwrap();

        let cfg = Config::load(Some(&path), None).unwrap();
        assert_eq!(cfg.controller.port, 7777);

        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing), None).is_err());
    }
}
