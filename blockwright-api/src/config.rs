//! Server configuration from the environment

use anyhow::{Context, Result};
use blockwright::EngineConfig;
use std::net::SocketAddr;

/// Default bind address
pub const DEFAULT_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 3000);

/// Default upload limit: 32 MiB
pub const DEFAULT_MAX_UPLOAD: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// `BLOCKWRIGHT_ADDR`
    pub addr: SocketAddr,
    /// `BLOCKWRIGHT_MAX_UPLOAD`, in bytes
    pub max_upload: usize,
    /// Loaded from the JSON file named by `BLOCKWRIGHT_CONFIG`
    pub engine: EngineConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(DEFAULT_ADDR),
            max_upload: DEFAULT_MAX_UPLOAD,
            engine: EngineConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source; unset variables keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(addr) = lookup("BLOCKWRIGHT_ADDR") {
            config.addr = addr
                .parse()
                .with_context(|| format!("BLOCKWRIGHT_ADDR is not a socket address: {addr}"))?;
        }
        if let Some(max) = lookup("BLOCKWRIGHT_MAX_UPLOAD") {
            config.max_upload = max
                .trim()
                .parse()
                .with_context(|| format!("BLOCKWRIGHT_MAX_UPLOAD is not a byte count: {max}"))?;
        }
        if let Some(path) = lookup("BLOCKWRIGHT_CONFIG") {
            let json = std::fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
            config.engine = EngineConfig::from_json(&json).with_context(|| format!("invalid engine config in {path}"))?;
        }
        Ok(config)
    }
}
