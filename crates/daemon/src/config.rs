use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([127, 0, 0, 1], 3030);
pub const DEFAULT_REAP_INTERVAL_MS: u64 = 1_000;

/// Coordinator configuration file (YAML).
///
/// Example `slotlockd.yaml`:
/// ```yaml
/// bind-addr: 0.0.0.0:3030
/// reap-interval-ms: 2000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorConfigFile {
    #[serde(default, alias = "bind-addr")]
    pub bind_addr: Option<SocketAddr>,
    #[serde(default, alias = "reap-interval-ms")]
    pub reap_interval_ms: Option<u64>,
}

/// Effective settings after merging CLI flags, config file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub bind_addr: SocketAddr,
    pub reap_interval_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(DEFAULT_BIND_ADDR),
            reap_interval_ms: DEFAULT_REAP_INTERVAL_MS,
        }
    }
}

impl CoordinatorConfig {
    /// Merge: CLI args > config file > defaults.
    pub fn resolve(
        bind_addr: Option<SocketAddr>,
        reap_interval_ms: Option<u64>,
        file: CoordinatorConfigFile,
    ) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            bind_addr: bind_addr.or(file.bind_addr).unwrap_or(defaults.bind_addr),
            reap_interval_ms: reap_interval_ms
                .or(file.reap_interval_ms)
                .unwrap_or(defaults.reap_interval_ms),
        };
        if config.reap_interval_ms == 0 {
            anyhow::bail!("reap_interval_ms must be greater than zero");
        }
        Ok(config)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}
