//! Layered configuration for jobstatus.
//!
//! Settings come from `jobstatus.toml`, then the environment (after loading
//! any `.env` file), then CLI flags applied by the command handlers.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 5001
//! db_path = ".jobstatus/jobstatus.db"
//! cors_origins = ["http://localhost:8080", "http://127.0.0.1:8080"]
//!
//! [auth]
//! secret = "change-me"
//!
//! [logging]
//! filter = "info"
//! json = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "jobstatus.toml";

/// Placeholder token secret; `validate()` warns while it is in use.
pub const DEFAULT_SECRET: &str = "change-me";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Origins allowed by CORS outside dev mode
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".jobstatus/jobstatus.db")
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:8080".to_string(),
        "http://127.0.0.1:8080".to_string(),
    ]
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            cors_origins: default_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSection {
    /// Secret used to sign bearer tokens
    #[serde(default = "default_secret")]
    pub secret: String,
}

fn default_secret() -> String {
    DEFAULT_SECRET.to_string()
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            secret: default_secret(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse jobstatus.toml")
    }

    /// Load configuration from `path`, or defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize jobstatus.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Full resolution for the CLI: `.env`, file, then environment.
    pub fn resolve(path: &Path) -> Result<Self> {
        // A missing .env is normal.
        let _ = dotenvy::dotenv();
        let mut config = Self::load_or_default(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `JOBSTATUS_*` environment variables on top of file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production).
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("JOBSTATUS_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("JOBSTATUS_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid JOBSTATUS_PORT '{}'", port))?;
        }
        if let Some(path) = lookup("JOBSTATUS_DB_PATH") {
            self.server.db_path = PathBuf::from(path);
        }
        if let Some(secret) = lookup("JOBSTATUS_SECRET") {
            self.auth.secret = secret;
        }
        if let Some(json) = lookup("JOBSTATUS_LOG_JSON") {
            self.logging.json = matches!(json.trim(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.auth.secret == DEFAULT_SECRET {
            warnings.push(
                "auth.secret is the built-in default; set JOBSTATUS_SECRET before exposing the server"
                    .to_string(),
            );
        }
        if self.auth.secret.trim().is_empty() {
            warnings.push("auth.secret is empty; tokens are trivially forgeable".to_string());
        }
        if self.server.port == 0 {
            warnings.push("server.port is 0; the OS will pick a random port".to_string());
        }
        for (i, origin) in self.server.cors_origins.iter().enumerate() {
            if origin.trim().is_empty() {
                warnings.push(format!("server.cors_origins[{}] is empty", i));
            }
        }

        warnings
    }
}
