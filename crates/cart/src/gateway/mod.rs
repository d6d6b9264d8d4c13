//! The authoritative cart backend boundary.
//!
//! The engine depends on the [`RemoteCartGateway`] contract only; transport,
//! endpoint paths, and authentication belong to the implementation. Every
//! mutation returns a full, consistent [`CartSnapshot`] — the engine never
//! inspects partial responses, each response is a complete replacement of
//! truth.

mod rest;

pub use rest::RestCartGateway;

use async_trait::async_trait;

use tidepool_core::{CartSnapshot, LineId, VariantId};

use crate::error::GatewayError;

/// Authoritative cart operations.
#[async_trait]
pub trait RemoteCartGateway: Send + Sync {
    /// Fetch the current cart snapshot.
    async fn fetch(&self) -> Result<CartSnapshot, GatewayError>;

    /// Set the quantity of an existing line item.
    async fn set_quantity(
        &self,
        item_id: &LineId,
        quantity: u32,
    ) -> Result<CartSnapshot, GatewayError>;

    /// Remove a line item.
    async fn remove(&self, item_id: &LineId) -> Result<CartSnapshot, GatewayError>;

    /// Add a product variant to the cart.
    async fn add(&self, variant_id: &VariantId, quantity: u32)
    -> Result<CartSnapshot, GatewayError>;
}
