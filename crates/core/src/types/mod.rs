//! Core types for Tidepool.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod money;

pub use cart::{CartSnapshot, LineItem};
pub use id::*;
pub use money::{CurrencyCode, Money, MoneyError};
