//! Order history.
//!
//! Listing, paging and the "mark as received" action over an
//! [`OrderHistorySource`]. Reordering lives in [`reorder`].

pub mod reorder;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::remote::RemoteError;
use crate::types::{BearerToken, OrderId, OrderStatus, Price, ProductId};

pub use reorder::{ReorderOutcome, ReorderSink, reorder};

/// Orders shown per "show more" step.
pub const PAGE_SIZE: usize = 3;

/// Item lines listed on an order card before "+N more".
pub const PREVIEW_ITEMS: usize = 3;

// =============================================================================
// Records
// =============================================================================

/// One line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawOrderItem")]
pub struct OrderItem {
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
    pub size: Option<String>,
    pub quantity: u32,
    pub unit_price: Price,
    pub total_price: Price,
}

impl OrderItem {
    /// Name for display, `"Product"` when the backend omitted it.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or("Product")
    }
}

/// Backend shape of an order line: the product may be flattened or nested.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrderItem {
    #[serde(default, alias = "product_id")]
    product_id: Option<ProductId>,
    #[serde(default, alias = "product_name")]
    product_name: Option<String>,
    #[serde(default, alias = "product_image")]
    product_image: Option<String>,
    #[serde(default)]
    product: Option<NestedProduct>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    quantity: u32,
    #[serde(default, alias = "unit_price")]
    unit_price: Price,
    #[serde(default, alias = "total_price")]
    total_price: Option<Price>,
}

#[derive(Deserialize)]
struct NestedProduct {
    id: Option<ProductId>,
    name: Option<String>,
}

impl From<RawOrderItem> for OrderItem {
    fn from(raw: RawOrderItem) -> Self {
        let (nested_id, nested_name) = raw
            .product
            .map_or((None, None), |p| (p.id, p.name));
        Self {
            product_id: raw.product_id.or(nested_id),
            product_name: raw.product_name.or(nested_name),
            product_image: raw.product_image,
            size: raw.size.filter(|s| !s.trim().is_empty()),
            quantity: raw.quantity,
            unit_price: raw.unit_price,
            total_price: raw
                .total_price
                .unwrap_or_else(|| raw.unit_price.times(raw.quantity)),
        }
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub total_amount: Price,
    #[serde(default, alias = "createdAt")]
    pub order_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default, alias = "items")]
    pub order_items: Vec<OrderItem>,
}

impl OrderRecord {
    /// `"ORD-..."` when the backend assigned a number, the id otherwise.
    #[must_use]
    pub fn display_number(&self) -> String {
        self.order_number
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.id.to_string())
    }

    /// E.g. `January 5, 2025 at 02:30 PM`.
    #[must_use]
    pub fn formatted_date(&self) -> Option<String> {
        self.order_date
            .map(|d| d.format("%B %-d, %Y at %I:%M %p").to_string())
    }

    /// Item count for the card; an order never shows fewer than one.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.order_items.len().max(1)
    }

    #[must_use]
    pub fn preview_items(&self) -> &[OrderItem] {
        let end = self.order_items.len().min(PREVIEW_ITEMS);
        self.order_items.get(..end).unwrap_or_default()
    }

    /// Lines not covered by [`Self::preview_items`].
    #[must_use]
    pub fn hidden_item_count(&self) -> usize {
        self.order_items.len().saturating_sub(PREVIEW_ITEMS)
    }

    /// First line with a product id, offered for review after receipt.
    #[must_use]
    pub fn review_candidate(&self) -> Option<ReviewPrompt> {
        let first = self.order_items.first()?;
        Some(ReviewPrompt {
            product_id: first.product_id?,
            product_name: first.display_name().to_string(),
        })
    }
}

/// "Review this product" offered after an order was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPrompt {
    pub product_id: ProductId,
    pub product_name: String,
}

// =============================================================================
// Paging
// =============================================================================

/// How many orders of the history are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderPager {
    shown: usize,
}

impl OrderPager {
    /// From the `show` query parameter; never shows fewer than a page.
    #[must_use]
    pub fn new(requested: Option<usize>) -> Self {
        Self {
            shown: requested.unwrap_or(PAGE_SIZE).max(PAGE_SIZE),
        }
    }

    #[must_use]
    pub fn visible<'a>(&self, orders: &'a [OrderRecord]) -> &'a [OrderRecord] {
        let end = orders.len().min(self.shown);
        orders.get(..end).unwrap_or_default()
    }

    #[must_use]
    pub const fn has_more(&self, total: usize) -> bool {
        total > self.shown
    }

    /// Value of `show` for the "show more" link.
    #[must_use]
    pub const fn show_more(&self) -> usize {
        self.shown.saturating_add(PAGE_SIZE)
    }
}

impl Default for OrderPager {
    fn default() -> Self {
        Self::new(None)
    }
}

// =============================================================================
// Source & operations
// =============================================================================

#[derive(Debug, Error)]
pub enum OrderHistoryError {
    #[error("Please log in to view your orders.")]
    Unauthenticated,

    #[error("Session expired. Please log in again.")]
    SessionExpired,

    #[error("Failed to load orders. Please try again.")]
    LoadFailed(#[source] RemoteError),

    #[error("Failed to load order details. Please try again.")]
    DetailsFailed(#[source] RemoteError),

    #[error("{}", mark_received_message(.0))]
    MarkReceivedFailed(#[source] RemoteError),
}

impl OrderHistoryError {
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::SessionExpired)
    }
}

fn mark_received_message(error: &RemoteError) -> String {
    error.backend_message().map_or_else(
        || "Failed to mark order as received. Please try again.".to_string(),
        ToString::to_string,
    )
}

/// Order endpoints of the commerce backend.
#[async_trait]
pub trait OrderHistorySource: Send + Sync {
    async fn fetch_user_orders(&self, token: &BearerToken) -> Result<Vec<OrderRecord>, RemoteError>;

    async fn fetch_order_details(
        &self,
        token: &BearerToken,
        order_id: OrderId,
    ) -> Result<OrderRecord, RemoteError>;

    async fn mark_order_received(
        &self,
        token: &BearerToken,
        order_id: OrderId,
    ) -> Result<(), RemoteError>;
}

/// The shopper's orders, newest first as the backend returns them.
///
/// # Errors
///
/// - [`OrderHistoryError::Unauthenticated`] without a credential
/// - [`OrderHistoryError::SessionExpired`] when the backend answers 401
/// - [`OrderHistoryError::LoadFailed`] for anything else
#[instrument(skip_all)]
pub async fn load_orders<S>(
    source: &S,
    token: Option<&BearerToken>,
) -> Result<Vec<OrderRecord>, OrderHistoryError>
where
    S: OrderHistorySource + ?Sized,
{
    let token = token.ok_or(OrderHistoryError::Unauthenticated)?;
    source.fetch_user_orders(token).await.map_err(|e| {
        error!(error = %e, "Error fetching orders");
        match e {
            RemoteError::SessionExpired => OrderHistoryError::SessionExpired,
            other => OrderHistoryError::LoadFailed(other),
        }
    })
}

/// One order with its lines.
///
/// # Errors
///
/// Same credential handling as [`load_orders`]; other failures are
/// [`OrderHistoryError::DetailsFailed`].
#[instrument(skip(source, token))]
pub async fn load_order_details<S>(
    source: &S,
    token: Option<&BearerToken>,
    order_id: OrderId,
) -> Result<OrderRecord, OrderHistoryError>
where
    S: OrderHistorySource + ?Sized,
{
    let token = token.ok_or(OrderHistoryError::Unauthenticated)?;
    source
        .fetch_order_details(token, order_id)
        .await
        .map_err(|e| {
            error!(error = %e, "Error fetching order details");
            match e {
                RemoteError::SessionExpired => OrderHistoryError::SessionExpired,
                other => OrderHistoryError::DetailsFailed(other),
            }
        })
}

/// Confirm receipt of a delivered order.
///
/// Returns the product to offer for review: the first line of the updated
/// order, when it has a product id. A failure to re-read the order after a
/// successful update only loses the prompt.
///
/// # Errors
///
/// [`OrderHistoryError::MarkReceivedFailed`] carrying the backend's reason.
#[instrument(skip(source, token))]
pub async fn mark_received<S>(
    source: &S,
    token: Option<&BearerToken>,
    order_id: OrderId,
) -> Result<Option<ReviewPrompt>, OrderHistoryError>
where
    S: OrderHistorySource + ?Sized,
{
    let token = token.ok_or(OrderHistoryError::Unauthenticated)?;
    source
        .mark_order_received(token, order_id)
        .await
        .map_err(|e| {
            error!(error = %e, "Error marking order as received");
            match e {
                RemoteError::SessionExpired => OrderHistoryError::SessionExpired,
                other => OrderHistoryError::MarkReceivedFailed(other),
            }
        })?;
    info!("Order marked as received");

    match source.fetch_order_details(token, order_id).await {
        Ok(order) => Ok(order.review_candidate()),
        Err(e) => {
            error!(error = %e, "Error re-reading received order");
            Ok(None)
        }
    }
}
