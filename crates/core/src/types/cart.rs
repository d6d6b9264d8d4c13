//! Cart data model: line items and the cart snapshot aggregate.
//!
//! A [`CartSnapshot`] is the unit of truth exchanged with the backend: every
//! successful mutation returns a complete snapshot that replaces local state
//! wholesale. The busy flags on [`LineItem`] are client-side only and never
//! travel over the wire.

use serde::{Deserialize, Serialize};

use super::id::{LineId, VariantId};
use super::money::{CurrencyCode, Money};

/// One product variant in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Line identifier, unique within a cart.
    pub id: LineId,
    /// Product variant this line refers to.
    pub variant_id: VariantId,
    /// Product title for display.
    pub title: String,
    /// Quantity last confirmed locally. Always at least 1; removal is a
    /// distinct operation, never quantity zero.
    pub quantity: u32,
    /// Price per unit.
    pub unit_price: Money,
    /// Line subtotal. Derived (`unit_price × quantity`) for display between
    /// reconciliations; the authoritative value comes from the backend.
    pub subtotal: Money,
    /// True while a quantity change for this line is in flight.
    #[serde(skip, default)]
    pub is_updating: bool,
    /// True while a removal for this line is in flight.
    #[serde(skip, default)]
    pub is_deleting: bool,
}

/// The cart aggregate: ordered line items plus totals.
///
/// Item order is display-relevant (insertion order from the last
/// authoritative fetch). The totals are recomputed only when an
/// authoritative snapshot is accepted, never from optimistic local edits, so
/// the UI never shows a total the backend has not validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Ordered line items.
    pub items: Vec<LineItem>,
    /// Total number of units across all lines.
    pub total_items: u32,
    /// Total amount across all line subtotals.
    pub total_amount: Money,
}

impl CartSnapshot {
    /// Create an empty cart in the given currency.
    #[must_use]
    pub const fn empty(currency_code: CurrencyCode) -> Self {
        Self {
            items: Vec::new(),
            total_items: 0,
            total_amount: Money::zero(currency_code),
        }
    }

    /// Look up a line item by ID.
    #[must_use]
    pub fn line(&self, id: &LineId) -> Option<&LineItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Look up a line item by ID, mutably.
    pub fn line_mut(&mut self, id: &LineId) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    /// Recompute `total_items` and `total_amount` from the line items.
    ///
    /// An empty cart keeps its previous currency so totals stay displayable.
    pub fn recompute_totals(&mut self) {
        self.total_items = self.items.iter().map(|item| item.quantity).sum();

        let currency = self
            .items
            .first()
            .map_or(self.total_amount.currency_code, |item| {
                item.subtotal.currency_code
            });
        self.total_amount = self
            .items
            .iter()
            .fold(Money::zero(currency), |total, item| {
                total.plus(&item.subtotal)
            });
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn line(id: &str, quantity: u32, unit_cents: i64) -> LineItem {
        let unit_price = Money::new(Decimal::new(unit_cents, 2), CurrencyCode::USD);
        LineItem {
            id: LineId::new(id),
            variant_id: VariantId::new(format!("variant-{id}")),
            title: format!("Product {id}"),
            quantity,
            unit_price,
            subtotal: unit_price.times(quantity),
            is_updating: false,
            is_deleting: false,
        }
    }

    #[test]
    fn test_recompute_totals_sums_lines() {
        let mut cart = CartSnapshot {
            items: vec![line("a", 2, 1000), line("b", 1, 550)],
            total_items: 0,
            total_amount: Money::zero(CurrencyCode::USD),
        };

        cart.recompute_totals();

        assert_eq!(cart.total_items, 3);
        assert_eq!(cart.total_amount.amount, Decimal::new(2550, 2));
    }

    #[test]
    fn test_recompute_totals_empty_cart_keeps_currency() {
        let mut cart = CartSnapshot::empty(CurrencyCode::EUR);
        cart.recompute_totals();

        assert_eq!(cart.total_items, 0);
        assert_eq!(cart.total_amount, Money::zero(CurrencyCode::EUR));
    }

    #[test]
    fn test_line_lookup() {
        let cart = CartSnapshot {
            items: vec![line("a", 1, 100)],
            total_items: 1,
            total_amount: Money::new(Decimal::ONE, CurrencyCode::USD),
        };

        assert!(cart.line(&LineId::new("a")).is_some());
        assert!(cart.line(&LineId::new("missing")).is_none());
    }

    #[test]
    fn test_busy_flags_not_serialized() {
        let mut item = line("a", 1, 100);
        item.is_updating = true;

        let json = serde_json::to_value(&item).expect("serialize line item");
        assert!(json.get("is_updating").is_none());
        assert!(json.get("is_deleting").is_none());
    }
}
