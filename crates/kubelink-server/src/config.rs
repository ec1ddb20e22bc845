//! Server configuration from the environment
//!
//! | Variable | Default |
//! |---|---|
//! | `KUBELINK_HOST` | `127.0.0.1` |
//! | `KUBELINK_PORT` | `9081` |
//! | `KUBELINK_DATA_DIR` | platform data dir + `/kubelink` |
//! | `KUBELINK_KUBECONFIG_DIR` | `~/.kube` |
//! | `KUBELINK_MODEL_TEMPLATE` | unset (empty metadata cache) |
//! | `KUBELINK_SYSTEM_ID` | persisted in `<data_dir>/system_id` |
//! | `KUBELINK_MASTER_KEY` | persisted in `<data_dir>/master.key` |
//! | `KUBELINK_CORS` | `true` |
//! | `KUBELINK_DISCOVER_ON_START` | `true` |
//! | `KUBELINK_PROVIDER_TOKEN` | `local` |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 9081;

/// File holding the generated system id
const SYSTEM_ID_FILE: &str = "system_id";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("invalid listen address {0}")]
    Address(String),

    #[error("failed to persist system id at {path}: {source}")]
    SystemId {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on (0 picks a free port)
    pub port: u16,
    /// Database, master key, artifacts and logs live here
    pub data_dir: PathBuf,
    /// Folder holding the `config` kubeconfig used by discovery
    pub kubeconfig_dir: PathBuf,
    /// JSON file with the model metadata template
    pub model_template: Option<PathBuf>,
    /// Explicit system id; resolved from `data_dir` when absent
    pub system_id: Option<Uuid>,
    /// Hex-encoded master key; read from `data_dir` when absent
    pub master_key: Option<String>,
    /// Enable CORS for browser access
    pub enable_cors: bool,
    /// Run kubeconfig discovery when the server starts
    pub discover_on_startup: bool,
    /// Token passed to the connection store for startup discovery
    pub provider_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            data_dir: default_data_dir(),
            kubeconfig_dir: default_kubeconfig_dir(),
            model_template: None,
            system_id: None,
            master_key: None,
            enable_cors: true,
            discover_on_startup: true,
            provider_token: "local".to_string(),
        }
    }
}

impl ServerConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`; unset and empty values
    /// fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = get("KUBELINK_HOST") {
            config.host = host;
        }
        if let Some(port) = get("KUBELINK_PORT") {
            config.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "KUBELINK_PORT",
                value: port,
            })?;
        }
        if let Some(dir) = get("KUBELINK_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("KUBELINK_KUBECONFIG_DIR") {
            config.kubeconfig_dir = PathBuf::from(dir);
        }
        config.model_template = get("KUBELINK_MODEL_TEMPLATE").map(PathBuf::from);
        if let Some(id) = get("KUBELINK_SYSTEM_ID") {
            config.system_id = Some(id.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "KUBELINK_SYSTEM_ID",
                value: id,
            })?);
        }
        config.master_key = get("KUBELINK_MASTER_KEY");
        if let Some(flag) = get("KUBELINK_CORS") {
            config.enable_cors = parse_flag("KUBELINK_CORS", flag)?;
        }
        if let Some(flag) = get("KUBELINK_DISCOVER_ON_START") {
            config.discover_on_startup = parse_flag("KUBELINK_DISCOVER_ON_START", flag)?;
        }
        if let Some(token) = get("KUBELINK_PROVIDER_TOKEN") {
            config.provider_token = token;
        }

        Ok(config)
    }

    /// Get the socket address
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::Address(addr))
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(kubelink_storage::DATABASE_FILE)
    }

    pub fn master_key_path(&self) -> PathBuf {
        self.data_dir.join(kubelink_storage::MASTER_KEY_FILE)
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// The configured system id, or the one persisted in the data dir
    /// (generated on first use).
    pub fn resolve_system_id(&self) -> Result<Uuid, ConfigError> {
        if let Some(id) = self.system_id {
            return Ok(id);
        }
        load_or_create_system_id(&self.data_dir.join(SYSTEM_ID_FILE))
    }
}

fn load_or_create_system_id(path: &Path) -> Result<Uuid, ConfigError> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        if let Ok(id) = existing.trim().parse() {
            return Ok(id);
        }
    }

    let id = Uuid::new_v4();
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, id.to_string())
    };
    write().map_err(|source| ConfigError::SystemId {
        path: path.to_path_buf(),
        source,
    })?;

    info!(system_id = %id, "[Config] Generated system id");
    Ok(id)
}

fn parse_flag(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}

fn default_data_dir() -> PathBuf {
    kubelink_storage::default_data_dir().unwrap_or_else(|| PathBuf::from(".kubelink"))
}

fn default_kubeconfig_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".kube"))
        .unwrap_or_else(|| PathBuf::from(".kube"))
}
