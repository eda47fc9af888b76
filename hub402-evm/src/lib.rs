#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM support for the hub402 x402 facilitator.
//!
//! Implements the `exact` scheme on EIP-155 chains using ERC-3009
//! `transferWithAuthorization`: payers sign an EIP-712 authorization off-chain
//! and the facilitator submits it, paying gas from its own account.
//!
//! # Modules
//!
//! - [`networks`] - Built-in networks and the optional custom chain
//! - [`chain`] - Chain access: the [`ChainClient`](chain::ChainClient) seam,
//!   its alloy implementation, and the facilitator's signer
//! - [`exact`] - Payload codec, verification, and settlement
//!
//! # Feature Flags
//!
//! - `telemetry` - `tracing` spans and events around chain interaction

pub mod chain;
pub mod exact;
pub mod networks;

pub use exact::facilitator::ExactEvmFacilitator;
pub use networks::{CustomChainConfig, NetworkDescriptor, NetworkRegistry};
