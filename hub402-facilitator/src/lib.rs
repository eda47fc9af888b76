//! HTTP server for the hub402 x402 facilitator.
//!
//! # Modules
//!
//! - [`handlers`] - Axum route handlers and router builder
//! - [`error`] - Request-level error responses
//! - [`config`] - Flag and environment configuration

pub mod config;
pub mod error;
pub mod handlers;

pub use handlers::{AppState, facilitator_router};
