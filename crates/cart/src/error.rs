//! Error taxonomy for the cart engine.
//!
//! Gateway failures and store failures are separate layers: the gateway
//! reports what went wrong on the wire, the store translates that into what
//! it means for the cart. All mutation failures are recovered locally
//! (rollback, busy flag cleared) before being surfaced, and they surface
//! exactly once.

use thiserror::Error;

use tidepool_core::LineId;

/// Errors returned by a [`crate::gateway::RemoteCartGateway`] implementation.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body could not be decoded into a cart snapshot.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The backend explicitly refused the operation (insufficient stock,
    /// expired session, item no longer exists).
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Errors surfaced by the [`crate::store::CartStore`].
#[derive(Debug, Clone, Error)]
pub enum CartError {
    /// Quantity below 1 was requested; rejected locally, never sent to the
    /// gateway. Removal is a distinct operation, not quantity zero.
    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(u32),

    /// No line item with this ID exists in the current snapshot.
    #[error("No line item with id {0}")]
    UnknownItem(LineId),

    /// Cart retrieval failed; the previous snapshot is retained.
    #[error("Failed to fetch cart: {0}")]
    Fetch(#[source] GatewayError),

    /// The gateway rejected a mutation; the optimistic change was rolled
    /// back to the last authoritative value.
    #[error("Mutation rejected: {0}")]
    MutationRejected(String),

    /// Transport failure during a mutation; rolled back like a rejection,
    /// distinguished only for user messaging.
    #[error("Network error: {0}")]
    Network(String),
}

impl CartError {
    /// Translate a gateway failure for a mutation into store terms.
    #[must_use]
    pub fn from_mutation(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected(message) => Self::MutationRejected(message),
            GatewayError::Http(message) | GatewayError::Parse(message) => Self::Network(message),
        }
    }
}
