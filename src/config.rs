use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from nhwatch.toml.
///
/// Every section has defaults matching the stock NiceHash Miner 2 install,
/// so the file is optional; a missing config file yields the defaults.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct WatchConfig {
    pub pool: PoolConfig,
    pub miner: MinerConfig,
    pub monitor: MonitorConfig,
    pub serve: ServeConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Stats endpoint; the wallet address is appended verbatim.
    pub api_base: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Image name of the miner UI process.
    pub ui_image: String,
    /// Image name of the worker process spawned by the UI.
    pub worker_image: String,
    /// Install directory relative to the user's home.
    pub install_subpath: PathBuf,
    /// Full executable path used when the home directory cannot be resolved.
    pub fallback_exe: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
}

// --- Default implementations ---

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.nicehash.com/api?method=stats.provider&addr=".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            ui_image: "NiceHash Miner 2.exe".to_string(),
            worker_image: "excavator.exe".to_string(),
            install_subpath: ["AppData", "Local", "Programs", "NiceHash Miner 2"]
                .iter()
                .collect(),
            fallback_exe: PathBuf::from(
                r"C:\Users\miner\AppData\Local\Programs\NiceHash Miner 2\NiceHash Miner 2.exe",
            ),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            // The pool API updates at minute granularity; two minutes makes a
            // zero delta a strong stall signal without false positives.
            poll_interval_secs: 120,
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl WatchConfig {
    /// Load configuration from the given TOML file.
    ///
    /// A missing file is not an error: all defaults apply.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Read the payout wallet address from its file.
///
/// The file holds the address as its entire contents; surrounding whitespace
/// is trimmed. Missing file, unreadable file, or empty content is an error —
/// the watchdog is useless without an address to poll.
pub fn load_wallet(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::WalletMissing {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::WalletRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let address = text.trim();
    if address.is_empty() {
        return Err(ConfigError::WalletEmpty {
            path: path.to_path_buf(),
        });
    }
    Ok(address.to_string())
}

/// Errors from configuration and wallet loading.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    WalletMissing {
        path: PathBuf,
    },
    WalletRead {
        path: PathBuf,
        source: std::io::Error,
    },
    WalletEmpty {
        path: PathBuf,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {source}", path.display())
            }
            ConfigError::WalletMissing { path } => {
                write!(f, "wallet file {} does not exist", path.display())
            }
            ConfigError::WalletRead { path, source } => {
                write!(f, "failed to read wallet file {}: {source}", path.display())
            }
            ConfigError::WalletEmpty { path } => {
                write!(f, "wallet file {} is empty", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::WalletRead { source, .. } => Some(source),
            ConfigError::WalletMissing { .. } | ConfigError::WalletEmpty { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_config_file_absent() {
        let dir = tempdir().unwrap();
        let config = WatchConfig::load(&dir.path().join("nhwatch.toml")).unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 120);
        assert_eq!(config.serve.port, 8080);
        assert_eq!(config.serve.bind, "0.0.0.0");
        assert_eq!(config.miner.ui_image, "NiceHash Miner 2.exe");
        assert_eq!(config.miner.worker_image, "excavator.exe");
        assert_eq!(config.pool.timeout_secs, 30);
        assert!(config.pool.api_base.contains("stats.provider"));
    }

    #[test]
    fn test_partial_config_overrides_only_named_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nhwatch.toml");
        std::fs::write(
            &path,
            "[monitor]\npoll_interval_secs = 30\n\n[serve]\nport = 9090\n",
        )
        .unwrap();

        let config = WatchConfig::load(&path).unwrap();
        assert_eq!(config.monitor.poll_interval_secs, 30);
        assert_eq!(config.serve.port, 9090);
        // Untouched sections keep defaults
        assert_eq!(config.serve.bind, "0.0.0.0");
        assert_eq!(config.miner.ui_image, "NiceHash Miner 2.exe");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nhwatch.toml");
        std::fs::write(&path, "[monitor\npoll_interval_secs = oops").unwrap();

        let err = WatchConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn test_load_wallet_trims_whitespace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet");
        std::fs::write(&path, "  3BmDmCzFwAYxeWKTF4mkyqCN8gW96GAaTt\n").unwrap();

        let address = load_wallet(&path).unwrap();
        assert_eq!(address, "3BmDmCzFwAYxeWKTF4mkyqCN8gW96GAaTt");
    }

    #[test]
    fn test_load_wallet_missing_file() {
        let dir = tempdir().unwrap();
        let err = load_wallet(&dir.path().join("wallet")).unwrap_err();
        assert!(matches!(err, ConfigError::WalletMissing { .. }));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_load_wallet_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet");
        std::fs::write(&path, "").unwrap();

        let err = load_wallet(&path).unwrap_err();
        assert!(matches!(err, ConfigError::WalletEmpty { .. }));
    }

    #[test]
    fn test_load_wallet_whitespace_only_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet");
        std::fs::write(&path, "   \n\t\n").unwrap();

        let err = load_wallet(&path).unwrap_err();
        assert!(matches!(err, ConfigError::WalletEmpty { .. }));
    }
}
