//! Shopping cart model.
//!
//! A cart is an ordered list of [`LineItem`]s. Each line is addressed by a
//! [`LineItemKey`] derived from the product id and the (optional) size, and
//! that key is the only identity used for selection and loading state.
//!
//! - [`selection`] - which lines the shopper picked for checkout
//! - [`loading`] - which lines have a mutation in flight
//! - [`coordinator`] - drives quantity updates and removals through a
//!   [`CartStore`]

pub mod coordinator;
pub mod loading;
pub mod selection;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::RemoteError;
use crate::types::{Price, ProductId};

pub use coordinator::{CartChange, CartCoordinator, CartStore, Confirmation, RemovalPrompt};
pub use loading::{LoadingGuard, LoadingSet};
pub use selection::SelectionSet;

/// Marker used in the textual key of a line without a size.
pub const NO_SIZE: &str = "no-size";

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Another update for the same line has not finished yet.
    #[error("an update for {0} is already in progress")]
    MutationInFlight(LineItemKey),

    /// Quantities below one are removals, not updates.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The cart backend rejected or failed the call.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Failure to parse a textual [`LineItemKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid line item key: {0}")]
pub struct ParseLineItemKeyError(String);

// =============================================================================
// LineItemKey
// =============================================================================

/// Identity of one cart row: product id plus normalized size.
///
/// Sizes that are absent, blank, or equal to [`NO_SIZE`] all normalize to
/// `None`, so a product without size variants always collapses to one row.
/// Equality is structural, so `(1, "M")` and `(1, "L")` never collide.
///
/// The textual form (`"12-M"`, `"12-no-size"`) is what forms and sessions
/// carry; it parses back to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineItemKey {
    product_id: ProductId,
    size: Option<String>,
}

impl LineItemKey {
    /// Derive the key for a product and optional size.
    #[must_use]
    pub fn new(product_id: ProductId, size: Option<&str>) -> Self {
        Self {
            product_id,
            size: normalize_size(size),
        }
    }

    /// Product id part of the key.
    #[must_use]
    pub const fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// Normalized size, `None` for size-less products.
    #[must_use]
    pub fn size(&self) -> Option<&str> {
        self.size.as_deref()
    }
}

fn normalize_size(size: Option<&str>) -> Option<String> {
    size.map(str::trim)
        .filter(|s| !s.is_empty() && *s != NO_SIZE)
        .map(ToString::to_string)
}

impl fmt::Display for LineItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.product_id,
            self.size.as_deref().unwrap_or(NO_SIZE)
        )
    }
}

impl FromStr for LineItemKey {
    type Err = ParseLineItemKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, size) = s
            .split_once('-')
            .ok_or_else(|| ParseLineItemKeyError(s.to_string()))?;
        let product_id = id
            .parse::<ProductId>()
            .map_err(|_| ParseLineItemKeyError(s.to_string()))?;
        Ok(Self::new(product_id, Some(size)))
    }
}

impl Serialize for LineItemKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LineItemKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// LineItem
// =============================================================================

/// One product + size entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub size: Option<String>,
    pub name: String,
    pub unit_price: Price,
    /// Always at least 1 while the line is in a [`Cart`].
    pub quantity: u32,
    pub image: Option<String>,
    pub color: Option<String>,
}

impl LineItem {
    /// Key addressing this line.
    #[must_use]
    pub fn key(&self) -> LineItemKey {
        LineItemKey::new(self.product_id, self.size.as_deref())
    }

    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Ordered cart contents.
///
/// Built from whatever the backend returns; lines with quantity 0 are
/// dropped and lines sharing a key are merged into the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// Build a cart, enforcing the one-row-per-key and quantity ≥ 1 rules.
    pub fn new(items: impl IntoIterator<Item = LineItem>) -> Self {
        let mut merged: Vec<LineItem> = Vec::new();
        for item in items {
            if item.quantity == 0 {
                continue;
            }
            let key = item.key();
            if let Some(existing) = merged.iter_mut().find(|i| i.key() == key) {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            } else {
                merged.push(item);
            }
        }
        Self { items: merged }
    }

    /// Lines in cart order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Look up a line by key.
    #[must_use]
    pub fn get(&self, key: &LineItemKey) -> Option<&LineItem> {
        self.items.iter().find(|item| &item.key() == key)
    }

    #[must_use]
    pub fn contains(&self, key: &LineItemKey) -> bool {
        self.get(key).is_some()
    }

    /// Subtotal over every line.
    #[must_use]
    pub fn total(&self) -> Price {
        self.items.iter().map(LineItem::line_total).sum()
    }

    /// Number of units across all lines (badge count).
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn item(id: i64, size: Option<&str>, quantity: u32, price: i64) -> LineItem {
        LineItem {
            product_id: ProductId::new(id),
            size: size.map(ToString::to_string),
            name: format!("Shoe {id}"),
            unit_price: Price::new(rust_decimal::Decimal::from(price)),
            quantity,
            image: None,
            color: None,
        }
    }
}
