//! Tidepool Core - Shared types library.
//!
//! This crate provides the domain types shared between the cart
//! synchronization engine and its host application:
//!
//! - `cart` - The optimistic cart engine (`tidepool-cart`)
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no timers.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, monetary values, and the cart data model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
