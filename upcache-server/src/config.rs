//! Server settings read from the environment.

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::path::PathBuf;

use simplelog::LevelFilter;
use upcache_lib::error::ConfigError;

pub const ENV_PORT: &str = "PORT";
pub const ENV_BIND: &str = "UPCACHE_BIND";
pub const ENV_LOG: &str = "UPCACHE_LOG";
pub const ENV_LOG_FILE: &str = "UPCACHE_LOG_FILE";
pub const ENV_ADMIN_TOKEN: &str = "UPCACHE_ADMIN_TOKEN";

const DEFAULT_PORT: u16 = 3001;

/// Where to listen and how to log.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,

    /// Bearer token for `POST /api/cache/invalidate`; unset disables the route.
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            log_level: LevelFilter::Info,
            log_file: None,
            admin_token: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_PORT) {
            config.port = raw
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::invalid(ENV_PORT, &raw, e.to_string()))?;
        }
        if let Some(raw) = lookup(ENV_BIND) {
            config.bind = raw
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::invalid(ENV_BIND, &raw, e.to_string()))?;
        }
        if let Some(raw) = lookup(ENV_LOG) {
            config.log_level = raw.parse().map_err(|_| {
                ConfigError::invalid(ENV_LOG, &raw, "expected off, error, warn, info, debug or trace")
            })?;
        }
        config.log_file = lookup(ENV_LOG_FILE).map(PathBuf::from);
        config.admin_token = lookup(ENV_ADMIN_TOKEN);

        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
