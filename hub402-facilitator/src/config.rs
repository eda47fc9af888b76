//! Facilitator server configuration.
//!
//! Every setting comes from a command-line flag or its environment variable;
//! `main` loads a `.env` file first, so deployments can keep the variables
//! there.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `EVM_PRIVATE_KEY` | required |
//! | `NETWORK` | `polkadot-hub-testnet` |
//! | `LOG_LEVEL` | `info` (`RUST_LOG` wins when set) |
//! | `CHAIN_ID`, `CHAIN_NAME`, `CHAIN_RPC_URL` | no custom chain |
//! | `NATIVE_CURRENCY_NAME`, `NATIVE_CURRENCY_SYMBOL`, `NATIVE_CURRENCY_DECIMALS` | `ETH`, `ETH`, `18` |
//! | `GAS_LIMIT` | estimate per transaction |
//! | `GAS_PRICE_MULTIPLIER` | `1.0` |
//! | `RPC_TIMEOUT_SECS`, `TX_RECEIPT_TIMEOUT_SECS` | `10`, `60` |
//! | `HOST`, `PORT` | `0.0.0.0`, `4021` |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use hub402::proto::NativeCurrency;
use hub402_evm::chain::Timeouts;
use hub402_evm::exact::facilitator::GasPolicy;
use hub402_evm::networks::{CustomChainConfig, POLKADOT_HUB_TESTNET_NAME};
use url::Url;

/// Errors detected while turning flags into runtime settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `CHAIN_RPC_URL` is not a URL.
    #[error("invalid CHAIN_RPC_URL {url:?}: {source}")]
    InvalidRpcUrl {
        /// The rejected value.
        url: String,
        /// Parser error.
        source: url::ParseError,
    },
    /// `GAS_PRICE_MULTIPLIER` is negative or not a finite number.
    #[error("GAS_PRICE_MULTIPLIER must be a finite, non-negative number, got {0}")]
    InvalidMultiplier(f64),
}

/// x402 payment facilitator for EVM chains.
#[derive(Clone, Parser)]
#[command(name = "hub402-facilitator")]
#[command(author, version, about, long_about = None)]
pub struct FacilitatorConfig {
    /// Facilitator private key, `0x` followed by 64 hex characters.
    #[arg(long, env = "EVM_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Default network identifier.
    #[arg(long, default_value = POLKADOT_HUB_TESTNET_NAME, env = "NETWORK")]
    pub network: String,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Chain ID of a custom network (0 disables it).
    #[arg(long, default_value_t = 0, env = "CHAIN_ID")]
    pub chain_id: u64,

    /// Display name of the custom network.
    #[arg(long, env = "CHAIN_NAME")]
    pub chain_name: Option<String>,

    /// JSON-RPC endpoint of the custom network.
    #[arg(long, env = "CHAIN_RPC_URL")]
    pub chain_rpc_url: Option<String>,

    /// Native currency name of the custom network.
    #[arg(long, default_value = "ETH", env = "NATIVE_CURRENCY_NAME")]
    pub native_currency_name: String,

    /// Native currency symbol of the custom network.
    #[arg(long, default_value = "ETH", env = "NATIVE_CURRENCY_SYMBOL")]
    pub native_currency_symbol: String,

    /// Native currency decimals of the custom network.
    #[arg(long, default_value_t = 18, env = "NATIVE_CURRENCY_DECIMALS")]
    pub native_currency_decimals: u8,

    /// Fixed gas limit for settlement transactions.
    #[arg(long, env = "GAS_LIMIT")]
    pub gas_limit: Option<u64>,

    /// Multiplier applied to gas estimates.
    #[arg(long, default_value_t = 1.0, env = "GAS_PRICE_MULTIPLIER")]
    pub gas_price_multiplier: f64,

    /// Bound on each chain read and broadcast, in seconds.
    #[arg(long, default_value_t = 10, env = "RPC_TIMEOUT_SECS")]
    pub rpc_timeout_secs: u64,

    /// Bound on waiting for a settlement receipt, in seconds.
    #[arg(long, default_value_t = 60, env = "TX_RECEIPT_TIMEOUT_SECS")]
    pub tx_receipt_timeout_secs: u64,

    /// Bind address.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED), env = "HOST")]
    pub host: IpAddr,

    /// Bind port.
    #[arg(long, short, default_value_t = 4021, env = "PORT")]
    pub port: u16,
}

impl std::fmt::Debug for FacilitatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorConfig")
            .field("private_key", &"<redacted>")
            .field("network", &self.network)
            .field("log_level", &self.log_level)
            .field("chain_id", &self.chain_id)
            .field("chain_name", &self.chain_name)
            .field("chain_rpc_url", &self.chain_rpc_url)
            .field("gas_limit", &self.gas_limit)
            .field("gas_price_multiplier", &self.gas_price_multiplier)
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .field("tx_receipt_timeout_secs", &self.tx_receipt_timeout_secs)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl FacilitatorConfig {
    /// The custom chain, if `CHAIN_ID` and `CHAIN_RPC_URL` are both set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRpcUrl`] if the endpoint does not parse.
    pub fn custom_chain(&self) -> Result<Option<CustomChainConfig>, ConfigError> {
        if self.chain_id == 0 {
            return Ok(None);
        }
        let Some(raw) = non_empty(self.chain_rpc_url.as_deref()) else {
            return Ok(None);
        };
        let rpc_url = Url::parse(raw).map_err(|source| ConfigError::InvalidRpcUrl {
            url: raw.to_owned(),
            source,
        })?;
        Ok(Some(CustomChainConfig {
            chain_id: self.chain_id,
            name: non_empty(self.chain_name.as_deref()).map(str::to_owned),
            rpc_url: Some(rpc_url),
            native_currency: NativeCurrency {
                name: self.native_currency_name.clone(),
                symbol: self.native_currency_symbol.clone(),
                decimals: self.native_currency_decimals,
            },
        }))
    }

    /// Gas limit selection for settlements.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMultiplier`] for a negative or non-finite multiplier.
    pub fn gas_policy(&self) -> Result<GasPolicy, ConfigError> {
        let multiplier = self.gas_price_multiplier;
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(ConfigError::InvalidMultiplier(multiplier));
        }
        Ok(GasPolicy {
            fixed_limit: self.gas_limit,
            multiplier,
        })
    }

    /// Chain interaction bounds.
    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            rpc: Duration::from_secs(self.rpc_timeout_secs),
            confirmation: Duration::from_secs(self.tx_receipt_timeout_secs),
            ..Timeouts::default()
        }
    }

    /// Address the server binds to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
