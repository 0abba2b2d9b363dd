//! Runtime configuration from environment variables (`.env` is loaded by main)

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{CoachError, Result};

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8787";
pub const DEFAULT_IDENTITY_PATH: &str = ".coachlink-identity.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    JsonFile,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "json" | "json-file" => Ok(StoreBackend::JsonFile),
            other => Err(CoachError::validation(format!(
                "unknown store backend '{}' (expected sqlite or json)",
                other
            ))),
        }
    }

    fn default_path(&self) -> &'static str {
        match self {
            StoreBackend::Sqlite => "coachlink.db",
            StoreBackend::JsonFile => "coachlink.json",
        }
    }
}

/// Hosted REST data store
#[derive(Debug, Clone, PartialEq)]
pub struct CloudConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub store_backend: StoreBackend,
    /// None = backend default file name
    pub store_path: Option<PathBuf>,
    pub bind_addr: SocketAddr,
    pub rpc_url: String,
    pub cloud: Option<CloudConfig>,
    pub identity_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Sqlite,
            store_path: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            cloud: None,
            identity_path: PathBuf::from(DEFAULT_IDENTITY_PATH),
        }
    }
}

impl Config {
    /// Read `COACHLINK_*` variables from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map instead of the environment)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(backend) = lookup("COACHLINK_STORE") {
            config.store_backend = StoreBackend::parse(&backend)?;
        }
        config.store_path = lookup("COACHLINK_STORE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        if let Some(bind) = lookup("COACHLINK_BIND") {
            config.bind_addr = bind.parse().map_err(|_| {
                CoachError::validation(format!("COACHLINK_BIND is not a socket address: {}", bind))
            })?;
        }
        if let Some(url) = lookup("COACHLINK_RPC_URL") {
            config.rpc_url = normalize_url(&url)?;
        }

        // Both halves are needed to talk to the cloud store
        match (lookup("COACHLINK_CLOUD_URL"), lookup("COACHLINK_CLOUD_KEY")) {
            (Some(url), Some(api_key)) if !api_key.trim().is_empty() => {
                config.cloud = Some(CloudConfig {
                    url: normalize_url(&url)?,
                    api_key,
                });
            }
            (Some(_), _) => {
                tracing::warn!("COACHLINK_CLOUD_URL set without COACHLINK_CLOUD_KEY, cloud store disabled");
            }
            _ => {}
        }

        if let Some(path) = lookup("COACHLINK_IDENTITY_PATH") {
            config.identity_path = PathBuf::from(path);
        }

        Ok(config)
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.store_backend.default_path()))
    }
}

fn normalize_url(url: &str) -> Result<String> {
    let url = url.trim().trim_end_matches('/');
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(CoachError::validation(format!("expected an http(s) URL, got '{}'", url)));
    }
    Ok(url.to_string())
}
