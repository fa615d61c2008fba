//! CLI Configuration
//!
//! Resolves how to reach the Consul agent. Values come from command-line
//! flags (each bound to a `CONSULCTL_*` environment variable), then an
//! optional TOML file (~/.consulctl.toml), then built-in defaults.

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Agent host fallback when no address is configured anywhere else
pub const ENV_CONSUL_NODE: &str = "CONSUL_NODE";

const DEFAULT_HOST: &str = "consul-node";
const DEFAULT_PORT: u16 = 8500;
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Scheme used to talk to the agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// Agent connection flags shared by every command
#[derive(Debug, Clone, Default, Args)]
pub struct AgentArgs {
    /// The ip or hostname of the consul agent for API communication
    #[arg(long, global = true, env = "CONSULCTL_CONSUL_ADDRESS")]
    pub consul_address: Option<String>,

    /// The port of the consul agent for API communication
    #[arg(long, global = true, env = "CONSULCTL_CONSUL_PORT")]
    pub consul_port: Option<u16>,

    /// Protocol used when contacting the consul agent over its API
    #[arg(long, global = true, value_enum, env = "CONSULCTL_PROTOCOL")]
    pub protocol: Option<Protocol>,

    /// Timeout for each request to the agent, in seconds
    #[arg(long, global = true, env = "CONSULCTL_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Config file (default is ~/.consulctl.toml)
    #[arg(long, global = true, env = "CONSULCTL_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Optional settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub consul_address: Option<String>,
    pub consul_port: Option<u16>,
    pub protocol: Option<Protocol>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Get the default config file path (~/.consulctl.toml)
    pub fn path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".consulctl.toml"))
    }

    /// Load config from an explicit file, or from the default location if present
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::path()?;
                if !path.exists() {
                    return Ok(Self::default());
                }
                Self::load_from(&path)
            }
        }
    }

    /// Load config from a TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?;
        info!(path = %path.display(), "Using config file");
        Ok(config)
    }
}

/// Resolved agent settings, built once at startup and passed to every operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub timeout: Duration,
}

impl Settings {
    /// Merge flags, the config file and the host fallback
    pub fn resolve(args: &AgentArgs, config: &Config, node_fallback: Option<String>) -> Result<Self> {
        let host = args
            .consul_address
            .clone()
            .filter(|h| !h.is_empty())
            .or_else(|| config.consul_address.clone().filter(|h| !h.is_empty()))
            .or_else(|| node_fallback.filter(|h| !h.is_empty()))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = args
            .consul_port
            .or(config.consul_port)
            .unwrap_or(DEFAULT_PORT);
        if port == 0 {
            bail!("Consul port must be greater than zero");
        }

        let timeout_secs = args
            .timeout_secs
            .or(config.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            bail!("Request timeout must be at least one second");
        }

        Ok(Self {
            host,
            port,
            protocol: args.protocol.or(config.protocol).unwrap_or_default(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Resolve from flags, reading the config file and `CONSUL_NODE`
    pub fn from_args(args: &AgentArgs) -> Result<Self> {
        let config = Config::load(args.config.as_deref())?;
        Self::resolve(args, &config, std::env::var(ENV_CONSUL_NODE).ok())
    }

    /// Base URL of the agent's HTTP API
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}/v1", self.protocol, self.host, self.port)
    }
}
