//! "Order again": put a past order's lines back into the cart.

use async_trait::async_trait;
use tracing::{instrument, warn};

use super::OrderRecord;
use crate::catalog::Product;
use crate::notice::Notice;
use crate::remote::RemoteError;
use crate::types::ProductId;

/// Catalog lookup and cart insertion, bound to one shopper.
#[async_trait]
pub trait ReorderSink: Send + Sync {
    async fn fetch_product(&self, product_id: ProductId) -> Result<Product, RemoteError>;

    async fn add_to_cart(
        &self,
        product: &Product,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<(), RemoteError>;
}

/// Result of a reorder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorderOutcome {
    pub added: usize,
    /// Names of the lines that could not be added.
    pub failed: Vec<String>,
}

impl ReorderOutcome {
    /// Toast for the outcome.
    #[must_use]
    pub fn notice(&self) -> Notice {
        match (self.added, self.failed.is_empty()) {
            (0, true) => Notice::error("No items found in this order."),
            (0, false) => Notice::error("Failed to add items to cart. Please try again."),
            (added, true) => {
                Notice::success(format!("Successfully added {added} item(s) to your cart!"))
            }
            (added, false) => Notice::warning(format!(
                "Added {added} item(s) to cart. Failed to add: {}",
                self.failed.join(", ")
            )),
        }
    }

    /// Whether anything landed in the cart, so the shopper should be taken
    /// there.
    #[must_use]
    pub const fn should_open_cart(&self) -> bool {
        self.added > 0
    }
}

/// Add every line of `order` to the cart with its original size and
/// quantity.
///
/// Lines are independent: one failing line does not stop the others.
#[instrument(skip_all, fields(order_id = %order.id, lines = order.order_items.len()))]
pub async fn reorder<S>(sink: &S, order: &OrderRecord) -> ReorderOutcome
where
    S: ReorderSink + ?Sized,
{
    let mut outcome = ReorderOutcome::default();

    for line in &order.order_items {
        let result = match line.product_id {
            Some(product_id) => match sink.fetch_product(product_id).await {
                Ok(product) => {
                    sink.add_to_cart(&product, line.size.as_deref(), line.quantity.max(1))
                        .await
                }
                Err(e) => Err(e),
            },
            None => Err(RemoteError::NotFound),
        };

        match result {
            Ok(()) => outcome.added += 1,
            Err(e) => {
                warn!(product = line.display_name(), error = %e, "Error adding item to cart");
                outcome.failed.push(line.display_name().to_string());
            }
        }
    }

    outcome
}
