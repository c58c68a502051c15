use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::Path;

use crate::database::DATABASE_FILE;

/// Runtime configuration for the scratch service.
pub struct ScratchConfig {
    /// Public base URL of the instance, always ending with `/`
    pub url: String,

    /// Port the HTTP server listens on
    pub port: u16,

    /// Shared bearer token protecting the API
    pub token: String,

    /// Path to the directory holding the SQLite database
    pub data_dir: String,

    /// Optional directory with a built frontend; static serving is
    /// disabled when unset
    pub static_dir: Option<String>,
}

const DEFAULT_URL: &str = "http://localhost:8080/";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TOKEN: &str = "p4$$w0rd";

const EMPTY_CONFIG: &str = r#"### scratch configuration file

### public base url of this instance (default: http://localhost:8080/)
# url = "http://localhost:8080/"

### port to run scratch on (default: 8080)
# port = 8080

### bearer token for authentication (default: p4$$w0rd)
# token = "p4$$w0rd"

### directory for the sqlite database (default: ~/.scratch)
# data_dir = "~/.scratch"

### directory with a built frontend; leave unset to disable static serving
# static_dir = ""
"#;

impl Default for ScratchConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            url: DEFAULT_URL.to_string(),
            port: DEFAULT_PORT,
            token: DEFAULT_TOKEN.to_string(),
            data_dir: format!("{}/.scratch", home_dir),
            static_dir: None,
        }
    }
}

impl ScratchConfig {
    /// Create and initialize a new configuration
    ///
    /// Reads `{path}` when given, otherwise `~/.scratch/scratch.toml`,
    /// writing a commented template first if the file does not exist.
    /// `SCRATCH_`-prefixed environment variables override file values.
    /// The resolved data directory is created on the spot.
    pub fn new(path: &Option<String>) -> Result<ScratchConfig> {
        let mut builder = Config::builder();

        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let scratch_dir = format!("{}/.scratch", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(scratch_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create scratch directory: {}", e))?;
                let p = format!("{}/scratch.toml", scratch_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of SCRATCH)
        // E.g., `SCRATCH_PORT=9090 scratch serve` overrides the port
        builder = builder.add_source(config::Environment::with_prefix("SCRATCH"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let values = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let config = Self::from_settings(&values)?;

        std::fs::create_dir_all(config.data_dir.as_str())
            .map_err(|e| anyhow!("Unable to create data directory: {}", e))?;

        Ok(config)
    }

    /// Parse and validate raw settings into a configuration.
    fn from_settings(values: &HashMap<String, String>) -> Result<ScratchConfig> {
        let defaults = ScratchConfig::default();

        let mut url = values
            .get("url")
            .cloned()
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        if url.is_empty() {
            return Err(anyhow!("url is empty"));
        }
        if !url.ends_with('/') {
            url.push('/');
        }

        let port = match values.get("port") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| anyhow!("port must be 1-65535, got {}", raw))?,
            None => DEFAULT_PORT,
        };
        if port == 0 {
            return Err(anyhow!("port must be 1-65535, got 0"));
        }

        let token = values
            .get("token")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOKEN.to_string());
        if token.is_empty() {
            return Err(anyhow!("token is empty"));
        }

        let data_dir = values
            .get("data_dir")
            .cloned()
            .unwrap_or(defaults.data_dir);

        let static_dir = values.get("static_dir").cloned().filter(|s| !s.is_empty());

        Ok(ScratchConfig {
            url,
            port,
            token,
            data_dir,
            static_dir,
        })
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/{}", data_dir, DATABASE_FILE)
    }

    /// Socket address the server binds to
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let lines = vec![
            format!("URL:             {}", self.url),
            format!("Listen Address:  {}", self.listen_addr()),
            format!("Data Directory:  {}", self.data_dir),
            format!("SQLite Path:     {}", self.sqlite_path()),
            format!(
                "Static Dir:      {}",
                self.static_dir.as_deref().unwrap_or("(disabled)")
            ),
            format!("Token:           {}", "*".repeat(self.token.len())),
        ];

        lines.join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.scratch/scratch.toml", home_dir)
    }
}
