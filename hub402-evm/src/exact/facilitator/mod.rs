//! Facilitator-side verification and settlement for the EVM exact scheme.
//!
//! [`ExactEvmFacilitator`] owns the network registry, the signer context and
//! the policies that govern chain interaction. Each call borrows them into a
//! short-lived [`Verifier`] or [`Settler`].

mod contract;
mod error;
mod settle;
mod signature;
mod verify;

use std::sync::Arc;

use alloy_primitives::Address;
pub use contract::IEIP3009;
pub use error::ExactEvmError;
use hub402::facilitator::{BoxFuture, Facilitator};
use hub402::proto::{
    PaymentExtra, PaymentRequirements, SettlementOutcome, SupportedKind, VerificationOutcome,
};
use hub402::timestamp::{Clock, SystemClock};
pub use settle::{FALLBACK_GAS_LIMIT, GasPolicy, Settler, transfer_call};
pub use signature::{SignatureError, signing_hash, token_domain, verify_signer};
pub use verify::{VerifiedPayment, Verifier, assert_requirements};

use crate::chain::{ChainConnector, SignerContext, Timeouts};
use crate::networks::{NetworkDescriptor, NetworkRegistry};

/// Exact-scheme facilitator for every network in a [`NetworkRegistry`].
pub struct ExactEvmFacilitator<C: ChainConnector> {
    registry: NetworkRegistry,
    signer: SignerContext<C>,
    clock: Arc<dyn Clock>,
    timeouts: Timeouts,
    gas: GasPolicy,
    default_network: Option<String>,
}

impl<C: ChainConnector> std::fmt::Debug for ExactEvmFacilitator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEvmFacilitator")
            .field("registry", &self.registry)
            .field("signer", &self.signer)
            .field("timeouts", &self.timeouts)
            .field("gas", &self.gas)
            .field("default_network", &self.default_network)
            .finish_non_exhaustive()
    }
}

impl<C: ChainConnector> ExactEvmFacilitator<C> {
    /// Creates a facilitator with the system clock and default policies.
    pub fn new(registry: NetworkRegistry, signer: SignerContext<C>) -> Self {
        Self {
            registry,
            signer,
            clock: Arc::new(SystemClock),
            timeouts: Timeouts::default(),
            gas: GasPolicy::default(),
            default_network: None,
        }
    }

    /// Replaces the gas policy.
    #[must_use]
    pub const fn with_gas_policy(mut self, gas: GasPolicy) -> Self {
        self.gas = gas;
        self
    }

    /// Replaces the RPC and confirmation timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Replaces the clock used for validity-window checks.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Network advertised by [`Facilitator::supported`] when the registry is empty.
    #[must_use]
    pub fn with_default_network(mut self, network: impl Into<String>) -> Self {
        self.default_network = Some(network.into());
        self
    }

    /// Address that pays gas for settlements.
    #[must_use]
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    /// The registry this facilitator serves.
    #[must_use]
    pub const fn registry(&self) -> &NetworkRegistry {
        &self.registry
    }

    /// Borrows a verifier over this facilitator's state.
    #[must_use]
    pub fn verifier(&self) -> Verifier<'_, C> {
        Verifier {
            registry: &self.registry,
            signer: &self.signer,
            clock: &*self.clock,
            timeouts: self.timeouts,
        }
    }

    /// Borrows a settler over this facilitator's state.
    #[must_use]
    pub fn settler(&self) -> Settler<'_, C> {
        Settler {
            verifier: self.verifier(),
            gas: self.gas,
        }
    }

    fn supported_extra(&self, network: &NetworkDescriptor) -> PaymentExtra {
        if !self.registry.is_custom(&network.name) {
            return PaymentExtra::default();
        }
        PaymentExtra {
            chain_id: Some(network.chain_id),
            rpc_url: Some(network.rpc_url.clone()),
            native_currency: Some(network.native_currency.clone()),
            ..PaymentExtra::default()
        }
    }
}

impl<C: ChainConnector> Facilitator for ExactEvmFacilitator<C> {
    fn verify(
        &self,
        payload: String,
        requirements: PaymentRequirements,
    ) -> BoxFuture<'_, VerificationOutcome> {
        Box::pin(async move { self.verifier().verify(&payload, &requirements).await })
    }

    fn settle(
        &self,
        payload: String,
        requirements: PaymentRequirements,
    ) -> BoxFuture<'_, SettlementOutcome> {
        Box::pin(async move { self.settler().settle(&payload, &requirements).await })
    }

    fn supported(&self) -> Vec<SupportedKind> {
        let kinds: Vec<SupportedKind> = self
            .registry
            .descriptors()
            .map(|network| SupportedKind::exact(&network.name, self.supported_extra(network)))
            .collect();
        if kinds.is_empty() {
            return self
                .default_network
                .iter()
                .map(|network| SupportedKind::exact(network, PaymentExtra::default()))
                .collect();
        }
        kinds
    }
}
