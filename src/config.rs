//! Configuration management for the set-code activator
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::codec::quantity::{parse_address, Quantity};

use anyhow::{Context, Result};
use ethers::types::{Address, U256};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

const GWEI: u64 = 1_000_000_000;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub activation: ActivationConfig,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    pub networks: HashMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivationConfig {
    /// Key into `networks`; `ACTIVATOR_NETWORK` overrides it
    pub network: String,
    /// Deployed contract the account delegates its code to
    pub delegate_address: String,
    /// Function called on the freshly delegated account
    #[serde(default = "default_call_signature")]
    pub call_signature: String,
    /// Extra ABI-encoded arguments appended after the selector
    #[serde(default)]
    pub call_args: Option<String>,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_value_wei")]
    pub value_wei: String,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    /// Tip used when the node has no `eth_maxPriorityFeePerGas`
    #[serde(default = "default_priority_fee_gwei")]
    pub default_priority_fee_gwei: u64,
    /// Ceiling on max fee per gas
    pub max_fee_gwei: Option<u64>,
    #[serde(default)]
    pub buffer_percent: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub chain_id: u64,
    pub rpc_urls: Vec<String>,
}

fn default_call_signature() -> String {
    "initialize()".to_string()
}

fn default_gas_limit() -> u64 {
    1_000_000
}

fn default_value_wei() -> String {
    "0".to_string()
}

fn default_send_timeout_secs() -> u64 {
    30
}

fn default_priority_fee_gwei() -> u64 {
    1
}

fn default_private_key_env() -> String {
    "DEPLOYER_PRIVATE_KEY".to_string()
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            default_priority_fee_gwei: default_priority_fee_gwei(),
            max_fee_gwei: None,
            buffer_percent: 0,
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
        }
    }
}

impl FeeConfig {
    pub fn default_priority_fee(&self) -> U256 {
        U256::from(self.default_priority_fee_gwei) * U256::from(GWEI)
    }

    pub fn max_fee_cap(&self) -> Option<U256> {
        self.max_fee_gwei
            .map(|gwei| U256::from(gwei) * U256::from(GWEI))
    }
}

impl ActivationConfig {
    pub fn delegate(&self) -> Result<Address> {
        parse_address(&self.delegate_address)
            .with_context(|| format!("Invalid delegate address {:?}", self.delegate_address))
    }

    pub fn value(&self) -> Result<Quantity> {
        self.value_wei
            .parse::<Quantity>()
            .with_context(|| format!("Invalid value_wei {:?}", self.value_wei))
    }

    /// Decoded extra call arguments (may be empty)
    pub fn call_args(&self) -> Result<Vec<u8>> {
        match &self.call_args {
            None => Ok(Vec::new()),
            Some(args) => {
                let digits = args.strip_prefix("0x").unwrap_or(args);
                hex::decode(digits).with_context(|| format!("Invalid call_args {:?}", args))
            }
        }
    }
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("ACTIVATOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse settings from TOML text, substituting `${VAR}` first
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);

        let mut settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        if let Ok(network) = env::var("ACTIVATOR_NETWORK") {
            if !network.is_empty() {
                settings.activation.network = network;
            }
        }

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        let network = self.network()?;
        if network.rpc_urls.is_empty() {
            anyhow::bail!(
                "Network {} has no RPC URLs configured",
                self.activation.network
            );
        }

        self.activation.delegate()?;
        self.activation.value()?;
        self.activation.call_args()?;

        if self.activation.gas_limit == 0 {
            anyhow::bail!("Gas limit must be non-zero");
        }

        if self.wallet.private_key_env.is_empty() {
            anyhow::bail!("wallet.private_key_env must name an environment variable");
        }

        Ok(())
    }

    /// The network selected for this run
    pub fn network(&self) -> Result<&NetworkConfig> {
        self.networks
            .get(&self.activation.network)
            .with_context(|| {
                let mut known: Vec<_> = self.networks.keys().cloned().collect();
                known.sort();
                format!(
                    "Unknown network {:?} (configured: {})",
                    self.activation.network,
                    known.join(", ")
                )
            })
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[activation]
network = "devnet6"
delegate_address = "0x00000000000000000000000000000000000000aa"

[fees]
max_fee_gwei = 500

[networks.devnet6]
chain_id = 7072151312
rpc_urls = ["https://rpc.pectra-devnet-6.ethpandaops.io"]

[networks.holesky]
chain_id = 17000
rpc_urls = ["https://1rpc.io/holesky"]
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_missing_env_var_becomes_empty() {
        let result = substitute_env_vars("key = \"${SETCODE_ACTIVATOR_SURELY_UNSET}\"");
        assert_eq!(result, "key = \"\"");
    }

    #[test]
    fn test_defaults_applied() {
        let settings = Settings::from_toml(SAMPLE).unwrap();

        assert_eq!(settings.activation.call_signature, "initialize()");
        assert_eq!(settings.activation.gas_limit, 1_000_000);
        assert_eq!(settings.activation.send_timeout_secs, 30);
        assert!(settings.activation.value().unwrap().is_zero());
        assert!(settings.activation.call_args().unwrap().is_empty());
        assert_eq!(settings.wallet.private_key_env, "DEPLOYER_PRIVATE_KEY");
        assert_eq!(settings.fees.default_priority_fee(), U256::from(GWEI));
        assert_eq!(
            settings.fees.max_fee_cap(),
            Some(U256::from(500u64) * U256::from(GWEI))
        );
    }

    #[test]
    fn test_network_selection() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        assert_eq!(settings.network().unwrap().chain_id, 7_072_151_312);
        assert_eq!(settings.networks["holesky"].rpc_urls[0], "https://1rpc.io/holesky");
    }

    #[test]
    fn test_unknown_network_rejected() {
        let input = SAMPLE.replace("network = \"devnet6\"", "network = \"mainnet\"");
        let err = Settings::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("Unknown network"));
    }

    #[test]
    fn test_bad_delegate_rejected() {
        let input = SAMPLE.replace(
            "0x00000000000000000000000000000000000000aa",
            "0x000000000000000000000000000000000000aa",
        );
        assert!(Settings::from_toml(&input).is_err());
    }

    #[test]
    fn test_negative_value_rejected() {
        let input = SAMPLE.replace(
            "[fees]",
            "value_wei = \"-1\"\n\n[fees]",
        );
        assert!(Settings::from_toml(&input).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.activation.network, "devnet6");
        assert_eq!(
            settings.activation.delegate().unwrap(),
            parse_address("0x00000000000000000000000000000000000000aa").unwrap()
        );
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::load_from(Path::new("/nonexistent/activator.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
