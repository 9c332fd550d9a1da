// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: `$PASEO_HOME/config.json` plus the directory
//! layout described in `spec.md` §6.3.
//!
//! Precedence is CLI flag > config file > built-in default (`SPEC_FULL.md`
//! §10); [`Config::load`] only resolves the file/default tiers, since the
//! CLI tier is applied by the caller once flags are parsed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DaemonError;

/// Where the `/ws` listener binds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListenAddress {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}

impl ListenAddress {
    /// Parses `host:port`, a bare `:port`, or a `unix:`-prefixed socket path.
    pub fn parse(s: &str) -> Result<Self, DaemonError> {
        if let Some(path) = s.strip_prefix("unix:") {
            return Ok(ListenAddress::Unix { path: PathBuf::from(path) });
        }
        if let Some(port) = s.strip_prefix(':') {
            let port = port
                .parse()
                .map_err(|_| DaemonError::InvalidListenAddress(s.to_string()))?;
            return Ok(ListenAddress::Tcp { host: "127.0.0.1".to_string(), port });
        }
        let (host, port) =
            s.rsplit_once(':').ok_or_else(|| DaemonError::InvalidListenAddress(s.to_string()))?;
        let port: u16 =
            port.parse().map_err(|_| DaemonError::InvalidListenAddress(s.to_string()))?;
        Ok(ListenAddress::Tcp { host: host.to_string(), port })
    }
}

impl Default for ListenAddress {
    fn default() -> Self {
        ListenAddress::Tcp { host: "127.0.0.1".to_string(), port: 8787 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Pretty
    }
}

/// Speech/MCP feature flags. Round-tripped through `config.json` but inert:
/// no subsystem behind either flag is implemented by this host
/// (`SPEC_FULL.md` "Non-goals carried forward unchanged").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default)]
    pub voice_enabled: bool,
    #[serde(default)]
    pub mcp_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: ListenAddress,
    pub allowed_hosts: Vec<String>,
    pub log_format: LogFormat,
    pub log_level: String,
    pub features: FeatureFlags,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenAddress::default(),
            allowed_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            log_format: LogFormat::default(),
            log_level: "info".to_string(),
            features: FeatureFlags::default(),
        }
    }
}

impl Config {
    /// Loads `config.json` from `paseo_home`, or returns (and persists)
    /// defaults when the file doesn't exist yet.
    pub fn load(paseo_home: &Path) -> Result<Self, DaemonError> {
        let path = config_path(paseo_home);
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| DaemonError::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Config::default();
                config.save(paseo_home)?;
                Ok(config)
            }
            Err(e) => Err(DaemonError::Io(e)),
        }
    }

    pub fn save(&self, paseo_home: &Path) -> Result<(), DaemonError> {
        std::fs::create_dir_all(paseo_home)?;
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| DaemonError::Config(e.to_string()))?;
        std::fs::write(config_path(paseo_home), text)?;
        Ok(())
    }
}

fn config_path(paseo_home: &Path) -> PathBuf {
    paseo_home.join("config.json")
}

/// Ensures the `$PASEO_HOME` directory layout from `spec.md` §6.3 exists.
pub fn ensure_layout(paseo_home: &Path) -> Result<(), DaemonError> {
    std::fs::create_dir_all(paseo_home)?;
    std::fs::create_dir_all(paseo_home.join("agents"))?;
    std::fs::create_dir_all(paseo_home.join("models"))?;
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
