use anyhow::{Context, Result};
use ledger_api::Address;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the node or wallet bridge that signs for the user.
    pub rpc_url: String,
    pub contract_address: String,
    /// Base of the explorer's transaction pages, e.g. `https://sepolia.etherscan.io/tx`.
    pub explorer_url: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl LedgerConfig {
    pub fn contract_address(&self) -> Result<Address> {
        self.contract_address
            .parse()
            .with_context(|| format!("invalid contract address '{}'", self.contract_address))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

pub fn read_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let s = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file '{}'", path.as_ref().display()))?;
    let cfg: Config = toml::from_str(&s).context("failed to parse TOML config")?;
    Ok(cfg)
}

pub fn read_config_from_toml() -> Result<Config> {
    // 1. ./config/config.toml
    // 2. CARGO_MANIFEST_DIR/config/config.toml (for cargo run)
    let cwd_config = std::path::PathBuf::from("config").join("config.toml");
    if cwd_config.exists() {
        return read_config(&cwd_config);
    }

    if let Ok(crate_root) = std::env::var("CARGO_MANIFEST_DIR") {
        let cargo_config = std::path::PathBuf::from(&crate_root)
            .join("config")
            .join("config.toml");
        if cargo_config.exists() {
            return read_config(&cargo_config);
        }
    }

    anyhow::bail!(
        "Could not find config.toml in ./config/config.toml or CARGO_MANIFEST_DIR/config/config.toml. Use --config-file to specify a path."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_with_defaults() -> Result<()> {
        let cfg: Config = toml::from_str(
            r#"
            [ledger]
            rpc_url = "http://localhost:8545"
            contract_address = "0x62c59d4De614368Bf3793D1fD3b2180Fb96C2De3"
            "#,
        )?;
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.ledger.poll_interval(), Duration::from_secs(2));
        assert!(cfg.ledger.explorer_url.is_none());
        assert_eq!(cfg.ledger.contract_address()?.short(), "0x62c5...2de3");
        Ok(())
    }

    #[test]
    fn test_bundled_config_parses() -> Result<()> {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config").join("config.toml");
        let cfg = read_config(path)?;
        assert!(!cfg.ledger.rpc_url.is_empty());
        assert!(cfg.ledger.contract_address().is_ok());
        Ok(())
    }
}
