//! Known EVM networks and the optional operator-configured custom chain.
//!
//! [`NetworkRegistry`] is built once at startup and is read-only afterwards.
//! Lookups are by the network identifier carried in payment requirements
//! (e.g., `"polkadot-hub-testnet"`).

use hub402::proto::NativeCurrency;
use url::Url;

/// Polkadot Hub testnet (Passet Hub) chain ID.
pub const POLKADOT_HUB_TESTNET: u64 = 420_420_422;

/// Network identifier of the Polkadot Hub testnet.
pub const POLKADOT_HUB_TESTNET_NAME: &str = "polkadot-hub-testnet";

/// Static description of a built-in network.
#[derive(Debug, Clone, Copy)]
struct BuiltinNetwork {
    name: &'static str,
    chain_id: u64,
    rpc_url: &'static str,
    currency: (&'static str, &'static str, u8),
}

const BUILTIN_NETWORKS: &[BuiltinNetwork] = &[BuiltinNetwork {
    name: POLKADOT_HUB_TESTNET_NAME,
    chain_id: POLKADOT_HUB_TESTNET,
    rpc_url: "https://testnet-passet-hub-eth-rpc.polkadot.io",
    currency: ("PAS", "PAS", 18),
}];

/// Immutable chain parameters for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDescriptor {
    /// Network identifier used in payment requirements.
    pub name: String,
    /// EIP-155 chain ID.
    pub chain_id: u64,
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Native gas currency.
    pub native_currency: NativeCurrency,
}

/// Operator-supplied custom chain.
///
/// Admitted into the registry only when `chain_id` is non-zero and `rpc_url`
/// is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomChainConfig {
    /// EIP-155 chain ID; `0` means "not configured".
    pub chain_id: u64,
    /// Display name, normalized into the network identifier.
    pub name: Option<String>,
    /// JSON-RPC endpoint.
    pub rpc_url: Option<Url>,
    /// Native gas currency.
    pub native_currency: NativeCurrency,
}

impl CustomChainConfig {
    /// The network identifier this chain is addressed by.
    ///
    /// Lower-cased with inner whitespace runs collapsed to `-` and outer
    /// whitespace dropped, or `custom-chain-<id>` when no usable name was
    /// given.
    #[must_use]
    pub fn network_name(&self) -> String {
        let normalized = self
            .name
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-");
        if normalized.is_empty() {
            format!("custom-chain-{}", self.chain_id)
        } else {
            normalized
        }
    }

    fn into_descriptor(self) -> Option<NetworkDescriptor> {
        if self.chain_id == 0 {
            return None;
        }
        let name = self.network_name();
        let rpc_url = self.rpc_url?;
        Some(NetworkDescriptor {
            name,
            chain_id: self.chain_id,
            rpc_url,
            native_currency: self.native_currency,
        })
    }
}

/// Error returned when a network identifier cannot be resolved.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The identifier matches neither a built-in network nor the custom chain.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
}

/// Lookup table from network identifier to [`NetworkDescriptor`].
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: Vec<NetworkDescriptor>,
    custom: Option<String>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl NetworkRegistry {
    /// Builds the registry from the built-in table and an optional custom chain.
    ///
    /// A custom chain whose name collides with a built-in entry replaces it.
    #[must_use]
    pub fn new(custom: Option<CustomChainConfig>) -> Self {
        let mut networks: Vec<NetworkDescriptor> = BUILTIN_NETWORKS
            .iter()
            .filter_map(|b| {
                Some(NetworkDescriptor {
                    name: b.name.to_owned(),
                    chain_id: b.chain_id,
                    rpc_url: Url::parse(b.rpc_url).ok()?,
                    native_currency: NativeCurrency {
                        name: b.currency.0.to_owned(),
                        symbol: b.currency.1.to_owned(),
                        decimals: b.currency.2,
                    },
                })
            })
            .collect();

        let custom = custom
            .and_then(CustomChainConfig::into_descriptor)
            .map(|descriptor| {
                let name = descriptor.name.clone();
                match networks.iter_mut().find(|n| n.name == name) {
                    Some(existing) => *existing = descriptor,
                    None => networks.push(descriptor),
                }
                name
            });

        Self { networks, custom }
    }

    /// Resolves a network identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownNetwork`] when the identifier is not registered.
    pub fn resolve(&self, network: &str) -> Result<&NetworkDescriptor, RegistryError> {
        self.networks
            .iter()
            .find(|n| n.name == network)
            .ok_or_else(|| RegistryError::UnknownNetwork(network.to_owned()))
    }

    /// Identifiers of every registered network, built-ins first.
    #[must_use]
    pub fn list_supported(&self) -> Vec<&str> {
        self.networks.iter().map(|n| n.name.as_str()).collect()
    }

    /// All registered networks in advertisement order.
    pub fn descriptors(&self) -> impl Iterator<Item = &NetworkDescriptor> {
        self.networks.iter()
    }

    /// Whether `network` is the configured custom chain.
    #[must_use]
    pub fn is_custom(&self, network: &str) -> bool {
        self.custom.as_deref() == Some(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn currency() -> NativeCurrency {
        NativeCurrency {
            name: "Ether".into(),
            symbol: "ETH".into(),
            decimals: 18,
        }
    }

    fn custom(chain_id: u64, name: Option<&str>, rpc: Option<&str>) -> CustomChainConfig {
        CustomChainConfig {
            chain_id,
            name: name.map(str::to_owned),
            rpc_url: rpc.map(|u| Url::parse(u).unwrap()),
            native_currency: currency(),
        }
    }

    #[test]
    fn builtin_network_resolves() {
        let registry = NetworkRegistry::default();
        let hub = registry.resolve(POLKADOT_HUB_TESTNET_NAME).unwrap();
        assert_eq!(hub.chain_id, POLKADOT_HUB_TESTNET);
        assert_eq!(hub.native_currency.symbol, "PAS");
        assert_eq!(registry.list_supported(), vec![POLKADOT_HUB_TESTNET_NAME]);
    }

    #[test]
    fn unknown_network_fails() {
        let registry = NetworkRegistry::default();
        assert!(matches!(
            registry.resolve("nonexistent-chain"),
            Err(RegistryError::UnknownNetwork(n)) if n == "nonexistent-chain"
        ));
    }

    #[test]
    fn custom_chain_requires_id_and_rpc() {
        let no_id = NetworkRegistry::new(Some(custom(0, Some("x"), Some("http://localhost:8545"))));
        assert_eq!(no_id.list_supported().len(), 1);

        let no_rpc = NetworkRegistry::new(Some(custom(31337, Some("x"), None)));
        assert_eq!(no_rpc.list_supported().len(), 1);
    }

    #[test]
    fn custom_chain_name_is_normalized() {
        let registry = NetworkRegistry::new(Some(custom(
            31337,
            Some("  My  Local\tChain "),
            Some("http://localhost:8545"),
        )));
        let local = registry.resolve("my-local-chain").unwrap();
        assert_eq!(local.chain_id, 31337);
        assert!(registry.is_custom("my-local-chain"));
        assert_eq!(
            registry.list_supported(),
            vec![POLKADOT_HUB_TESTNET_NAME, "my-local-chain"]
        );
    }

    #[test]
    fn unnamed_custom_chain_gets_generated_name() {
        let registry =
            NetworkRegistry::new(Some(custom(31337, Some("   "), Some("http://localhost:8545"))));
        assert!(registry.resolve("custom-chain-31337").is_ok());
    }

    #[test]
    fn custom_chain_overrides_colliding_builtin() {
        let registry = NetworkRegistry::new(Some(custom(
            1,
            Some("Polkadot Hub Testnet"),
            Some("http://localhost:8545"),
        )));
        assert_eq!(registry.list_supported().len(), 1);
        let hub = registry.resolve(POLKADOT_HUB_TESTNET_NAME).unwrap();
        assert_eq!(hub.chain_id, 1);
        assert_eq!(hub.rpc_url.as_str(), "http://localhost:8545/");
    }
}
