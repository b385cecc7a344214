//! Order submission.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::{CheckoutError, PaymentMethod, ShippingInfo};
use crate::cart::LineItem;
use crate::remote::RemoteError;
use crate::types::{BearerToken, OrderId, OrderStatus, Price, ProductId};

/// Image sent for lines that have none.
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/200";

/// Body of the order-creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub shipping_info: ShippingPayload,
    pub items: Vec<OrderLinePayload>,
}

/// Shipping block of [`OrderPayload`]. The email stays in the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingPayload {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLinePayload {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub size: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
}

impl OrderPayload {
    /// Build the payload for `items`. The total is recomputed from the lines.
    #[must_use]
    pub fn new(shipping: &ShippingInfo, payment: PaymentMethod, items: &[&LineItem]) -> Self {
        let total: Price = items.iter().map(|item| item.line_total()).sum();
        Self {
            total_amount: total.amount(),
            payment_method: payment,
            shipping_info: ShippingPayload {
                first_name: shipping.first_name.clone(),
                last_name: shipping.last_name.clone(),
                address: shipping.address.clone(),
                city: shipping.city.clone(),
                province: shipping.province.clone(),
                postal_code: shipping.postal_code.clone(),
                phone: shipping.phone.clone(),
            },
            items: items
                .iter()
                .map(|item| OrderLinePayload {
                    product_id: item.product_id,
                    name: item.name.clone(),
                    image: item
                        .image
                        .clone()
                        .filter(|image| !image.trim().is_empty())
                        .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
                    size: item.size.clone(),
                    price: item.unit_price.amount(),
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

/// What the backend returns for a created order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    #[serde(default)]
    pub id: Option<OrderId>,
    #[serde(default)]
    pub order_number: Option<String>,
}

/// Confirmation shown after a successful order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_number: String,
    pub total_amount: Price,
    pub status: OrderStatus,
    pub order_id: Option<OrderId>,
}

impl OrderSummary {
    fn from_created(created: CreatedOrder, total_amount: Price) -> Self {
        let order_number = created
            .order_number
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("ORD-{}", Utc::now().timestamp_millis()));
        Self {
            order_number,
            total_amount,
            status: OrderStatus::Pending,
            order_id: created.id,
        }
    }
}

/// Order creation on the commerce backend.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn create_order(
        &self,
        token: &BearerToken,
        payload: &OrderPayload,
    ) -> Result<CreatedOrder, RemoteError>;
}

/// Submit an order for `items`.
///
/// Validation runs first and the credential is checked next, so a rejected
/// submission never reaches the network. On success exactly one
/// `create_order` call was made.
///
/// # Errors
///
/// - [`CheckoutError::EmptySelection`] if `items` is empty
/// - shipping or payment validation errors
/// - [`CheckoutError::Unauthenticated`] without a credential
/// - [`CheckoutError::Rejected`] if the backend call fails
#[instrument(skip_all, fields(items = items.len(), payment = %payment))]
pub async fn place_order<G>(
    gateway: &G,
    token: Option<&BearerToken>,
    shipping: &ShippingInfo,
    payment: PaymentMethod,
    items: &[&LineItem],
) -> Result<OrderSummary, CheckoutError>
where
    G: OrderGateway + ?Sized,
{
    if items.is_empty() {
        return Err(CheckoutError::EmptySelection);
    }
    shipping.validate()?;
    if !payment.is_enabled() {
        return Err(CheckoutError::PaymentUnavailable(payment));
    }
    let token = token.ok_or(CheckoutError::Unauthenticated)?;

    let payload = OrderPayload::new(shipping, payment, items);
    let total = Price::new(payload.total_amount);

    match gateway.create_order(token, &payload).await {
        Ok(created) => {
            let summary = OrderSummary::from_created(created, total);
            info!(order_number = %summary.order_number, total = %total, "Order placed");
            Ok(summary)
        }
        Err(e) => {
            error!(error = %e, "Order failed");
            Err(CheckoutError::Rejected(e))
        }
    }
}
