//! REST implementation of the cart gateway.
//!
//! Talks to a JSON cart API:
//!
//! - `GET    {base}/cart`              - fetch the snapshot
//! - `POST   {base}/cart/lines`        - add a variant
//! - `PUT    {base}/cart/lines/{id}`   - change a line quantity
//! - `DELETE {base}/cart/lines/{id}`   - remove a line
//!
//! Every response body is a full cart payload. 4xx responses carry a JSON
//! error message and map to [`GatewayError::Rejected`]; everything else that
//! is not a success maps to [`GatewayError::Http`].

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use tidepool_core::{CartSnapshot, CurrencyCode, LineId, LineItem, Money, VariantId};

use crate::config::RestGatewayConfig;
use crate::error::GatewayError;
use crate::gateway::RemoteCartGateway;

use async_trait::async_trait;

// =============================================================================
// RestCartGateway
// =============================================================================

/// Cart gateway over a REST/JSON cart API.
#[derive(Clone)]
pub struct RestCartGateway {
    inner: Arc<RestCartGatewayInner>,
}

struct RestCartGatewayInner {
    client: reqwest::Client,
    base_url: Url,
    access_token: secrecy::SecretString,
}

impl RestCartGateway {
    /// Create a new gateway client.
    ///
    /// The underlying HTTP client enforces the configured request timeout so
    /// a hung request resolves as a failure instead of pinning a busy flag.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &RestGatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(RestCartGatewayInner {
                client,
                base_url: config.base_url.clone(),
                access_token: config.access_token.clone(),
            }),
        })
    }

    /// Build a URL under the base, escaping each path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.inner.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| GatewayError::Http("base URL cannot be a base".to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// Send a request and decode the full cart payload from the response.
    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<CartSnapshot, GatewayError> {
        let response = request
            .header("X-Cart-Access-Token", self.inner.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        let status = response.status();

        // Read the body as text first for better error diagnostics.
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        if status.is_client_error() {
            return Err(GatewayError::Rejected(rejection_message(status, &body)));
        }
        if !status.is_success() {
            debug!(status = %status, "cart API returned non-success status");
            return Err(GatewayError::Http(format!("unexpected status {status}")));
        }

        let dto: CartDto = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Parse(format!("malformed cart payload: {e}")))?;
        convert_cart(dto)
    }
}

#[async_trait]
impl RemoteCartGateway for RestCartGateway {
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<CartSnapshot, GatewayError> {
        let url = self.endpoint(&["cart"])?;
        self.execute(self.inner.client.get(url)).await
    }

    #[instrument(skip(self), fields(item = %item_id))]
    async fn set_quantity(
        &self,
        item_id: &LineId,
        quantity: u32,
    ) -> Result<CartSnapshot, GatewayError> {
        let url = self.endpoint(&["cart", "lines", item_id.as_str()])?;
        self.execute(
            self.inner
                .client
                .put(url)
                .json(&json!({ "quantity": quantity })),
        )
        .await
    }

    #[instrument(skip(self), fields(item = %item_id))]
    async fn remove(&self, item_id: &LineId) -> Result<CartSnapshot, GatewayError> {
        let url = self.endpoint(&["cart", "lines", item_id.as_str()])?;
        self.execute(self.inner.client.delete(url)).await
    }

    #[instrument(skip(self), fields(variant = %variant_id))]
    async fn add(
        &self,
        variant_id: &VariantId,
        quantity: u32,
    ) -> Result<CartSnapshot, GatewayError> {
        let url = self.endpoint(&["cart", "lines"])?;
        self.execute(self.inner.client.post(url).json(&json!({
            "variant_id": variant_id.as_str(),
            "quantity": quantity,
        })))
        .await
    }
}

// =============================================================================
// Wire Types & Conversions
// =============================================================================

/// Cart payload as the API returns it.
#[derive(Debug, Deserialize)]
struct CartDto {
    currency: String,
    lines: Vec<LineDto>,
}

/// One cart line as the API returns it.
#[derive(Debug, Deserialize)]
struct LineDto {
    id: String,
    variant_id: String,
    title: String,
    quantity: u32,
    /// Decimal amount as string (preserves precision).
    unit_price: String,
    subtotal: String,
}

/// Error payload for rejected mutations.
#[derive(Debug, Deserialize)]
struct ErrorDto {
    error: String,
}

/// Extract a rejection message from a 4xx body, falling back to the status.
fn rejection_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorDto>(body)
        .map_or_else(|_| status.to_string(), |dto| dto.error)
}

fn convert_cart(dto: CartDto) -> Result<CartSnapshot, GatewayError> {
    let currency = CurrencyCode::from_str(&dto.currency)
        .map_err(|e| GatewayError::Parse(e.to_string()))?;

    let items = dto
        .lines
        .into_iter()
        .map(|line| convert_line(line, currency))
        .collect::<Result<Vec<_>, _>>()?;

    let mut snapshot = CartSnapshot {
        items,
        total_items: 0,
        total_amount: Money::zero(currency),
    };
    snapshot.recompute_totals();
    Ok(snapshot)
}

fn convert_line(dto: LineDto, currency: CurrencyCode) -> Result<LineItem, GatewayError> {
    Ok(LineItem {
        id: LineId::new(dto.id),
        variant_id: VariantId::new(dto.variant_id),
        title: dto.title,
        quantity: dto.quantity,
        unit_price: parse_amount(&dto.unit_price, currency)?,
        subtotal: parse_amount(&dto.subtotal, currency)?,
        is_updating: false,
        is_deleting: false,
    })
}

fn parse_amount(raw: &str, currency: CurrencyCode) -> Result<Money, GatewayError> {
    let amount = Decimal::from_str(raw)
        .map_err(|e| GatewayError::Parse(format!("bad amount {raw:?}: {e}")))?;
    Ok(Money::new(amount, currency))
}
