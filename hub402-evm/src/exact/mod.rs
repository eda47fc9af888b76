//! The `exact` payment scheme on EVM chains.
//!
//! Payments are ERC-3009 `transferWithAuthorization` authorizations signed
//! under the token's EIP-712 domain. [`types`] holds the payload codec and
//! [`facilitator`] the verification and settlement logic.

pub mod facilitator;
pub mod types;

pub use types::*;
