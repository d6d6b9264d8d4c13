//! Tidepool Cart - optimistic cart synchronization engine.
//!
//! Lets a user repeatedly change a line's quantity (or remove it) with
//! instant visual feedback while the authoritative backend confirms or
//! rejects each change, without flooding the network and without corrupting
//! the displayed cart when edits race.
//!
//! # Architecture
//!
//! - [`store::CartStore`] - source of truth for the displayed cart; applies
//!   mutations optimistically and reconciles against the gateway
//! - [`debounce::Debouncer`] - per-line trailing-edge coalescing of quantity
//!   changes; the only place timing logic lives
//! - [`gateway::RemoteCartGateway`] - the abstract backend contract;
//!   [`gateway::RestCartGateway`] implements it over a JSON cart API
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tidepool_cart::{CartStore, CartSyncConfig, RestCartGateway, RestGatewayConfig};
//!
//! let gateway = RestCartGateway::new(&RestGatewayConfig::from_env()?)?;
//! let (cart, mut events) = CartStore::new(Arc::new(gateway), CartSyncConfig::default());
//!
//! cart.fetch_cart().await?;
//! cart.set_quantity(&line_id, 3)?; // instant locally, debounced on the wire
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod debounce;
pub mod error;
pub mod gateway;
pub mod store;

pub use config::{CartSyncConfig, ConfigError, RestGatewayConfig};
pub use error::{CartError, GatewayError};
pub use gateway::{RemoteCartGateway, RestCartGateway};
pub use store::{CartEvent, CartStore};
