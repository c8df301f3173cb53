use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub assetgraph: AssetGraphConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

/// Storage and logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AssetGraphConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_http_port(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Traversal limits
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Depth used when a traversal request names none.
    #[serde(default = "default_traversal_depth")]
    pub default_traversal_depth: usize,
    /// Largest depth a caller may request.
    #[serde(default = "default_max_traversal_depth")]
    pub max_traversal_depth: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_traversal_depth: default_traversal_depth(),
            max_traversal_depth: default_max_traversal_depth(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_traversal_depth() -> usize {
    1
}

fn default_max_traversal_depth() -> usize {
    10
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in ASSETGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("ASSETGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_file(&config_path)
    }

    /// Parse and validate a specific config file
    pub fn from_file(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.assetgraph.db_path.as_os_str().is_empty() {
            anyhow::bail!("assetgraph.db_path must not be empty");
        }

        if self.http_server.port == 0 {
            anyhow::bail!("http_server.port must be greater than 0");
        }

        if self.graph.max_traversal_depth == 0 {
            anyhow::bail!("graph.max_traversal_depth must be at least 1");
        }

        if self.graph.default_traversal_depth > self.graph.max_traversal_depth {
            anyhow::bail!(
                "graph.default_traversal_depth ({}) must not exceed graph.max_traversal_depth ({})",
                self.graph.default_traversal_depth,
                self.graph.max_traversal_depth
            );
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.assetgraph.db_path
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.assetgraph.migrations_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const FULL_CONFIG: &str = r#"
[assetgraph]
db_path = "./assetgraph.db"
log_level = "debug"

[http_server]
port = 9090
allowed_origins = ["https://ops.example.com"]

[graph]
default_traversal_depth = 2
max_traversal_depth = 6
"#;

    fn with_config_env(config_path: &Path, f: impl FnOnce()) {
        let original = std::env::var("ASSETGRAPH_CONFIG").ok();
        std::env::set_var("ASSETGRAPH_CONFIG", config_path);
        f();
        std::env::remove_var("ASSETGRAPH_CONFIG");
        if let Some(val) = original {
            std::env::set_var("ASSETGRAPH_CONFIG", val);
        }
    }

    #[test]
    fn test_config_load_success() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, FULL_CONFIG).unwrap();

        with_config_env(&config_path, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            let config = config.unwrap();
            assert_eq!(config.assetgraph.log_level, "debug");
            assert_eq!(config.http_server.port, 9090);
            assert_eq!(config.http_server.bind_address, "127.0.0.1");
            assert_eq!(config.graph.default_traversal_depth, 2);
            assert_eq!(config.graph.max_traversal_depth, 6);
            assert_eq!(config.migrations_dir(), Path::new("migrations"));
        });
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_toml("[assetgraph]\ndb_path = \"graph.db\"\n").unwrap();
        assert_eq!(config.assetgraph.log_level, "info");
        assert_eq!(config.http_server.port, 8080);
        assert!(config.http_server.allowed_origins.is_empty());
        assert_eq!(config.graph.default_traversal_depth, 1);
        assert_eq!(config.graph.max_traversal_depth, 10);
    }

    #[test]
    fn test_config_rejects_default_above_max() {
        let err = Config::from_toml(
            "[assetgraph]\ndb_path = \"graph.db\"\n[graph]\ndefault_traversal_depth = 5\nmax_traversal_depth = 3\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("default_traversal_depth"));
    }

    #[test]
    fn test_config_rejects_zero_port() {
        let err = Config::from_toml("[assetgraph]\ndb_path = \"graph.db\"\n[http_server]\nport = 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        with_config_env(Path::new("nonexistent.toml"), || {
            assert!(Config::load().is_err());
        });
    }
}
