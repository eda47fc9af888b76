#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the hub402 x402 payment facilitator.
//!
//! This crate holds the chain-agnostic pieces: the JSON wire format spoken by
//! resource servers, the reason codes reported on failure, authorization
//! timestamps, and the [`Facilitator`](facilitator::Facilitator) trait that
//! chain-specific crates implement.
//!
//! # Modules
//!
//! - [`facilitator`] - Core trait for payment verification and settlement
//! - [`proto`] - Wire format types and reason codes
//! - [`timestamp`] - Unix timestamps and clocks for authorization windows

pub mod facilitator;
pub mod proto;
pub mod timestamp;
