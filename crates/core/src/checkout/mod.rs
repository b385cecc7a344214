//! Checkout flow.
//!
//! Checkout runs over a snapshot of the shopper's selection:
//!
//! 1. [`CheckoutWizard`] walks Shipping → Payment → Review, refusing to
//!    leave a step whose input is incomplete.
//! 2. [`place_order`] validates everything again, then makes exactly one
//!    [`OrderGateway::create_order`] call.

pub mod order;
pub mod payment;
pub mod shipping;
pub mod step;

use thiserror::Error;

use crate::remote::RemoteError;
use crate::types::EmailError;

pub use order::{
    CreatedOrder, OrderGateway, OrderLinePayload, OrderPayload, OrderSummary, PLACEHOLDER_IMAGE,
    ShippingPayload, place_order,
};
pub use payment::PaymentMethod;
pub use shipping::{ShippingField, ShippingInfo};
pub use step::{CheckoutStep, CheckoutWizard};

/// Errors that stop checkout from moving forward.
///
/// The `Display` text is what the shopper sees.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Please select at least one item to checkout.")]
    EmptySelection,

    #[error("Please fill in: {}", field_labels(.0))]
    IncompleteShipping(Vec<ShippingField>),

    #[error("Please enter a valid email address.")]
    InvalidEmail(#[source] EmailError),

    #[error("{} is not available yet.", .0.name())]
    PaymentUnavailable(PaymentMethod),

    #[error("No authentication token found. Please log in again.")]
    Unauthenticated,

    /// The backend refused or failed the order.
    #[error("{}", rejected_message(.0))]
    Rejected(#[source] RemoteError),
}

impl CheckoutError {
    /// Whether the shopper has to sign in again before retrying.
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::Rejected(RemoteError::SessionExpired)
        )
    }
}

fn field_labels(fields: &[ShippingField]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}

fn rejected_message(error: &RemoteError) -> String {
    error.backend_message().map_or_else(
        || "Failed to place order. Please try again.".to_string(),
        |message| format!("Failed to place order: {message}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            CheckoutError::EmptySelection.to_string(),
            "Please select at least one item to checkout."
        );
        assert_eq!(
            CheckoutError::IncompleteShipping(vec![ShippingField::City, ShippingField::Phone])
                .to_string(),
            "Please fill in: City, Phone"
        );
        assert_eq!(
            CheckoutError::PaymentUnavailable(PaymentMethod::GCash).to_string(),
            "GCash is not available yet."
        );
        assert_eq!(
            CheckoutError::Rejected(RemoteError::rejected(409, "Out of stock")).to_string(),
            "Failed to place order: Out of stock"
        );
        assert_eq!(
            CheckoutError::Rejected(RemoteError::Network("timed out".into())).to_string(),
            "Failed to place order. Please try again."
        );
    }

    #[test]
    fn test_requires_login() {
        assert!(CheckoutError::Unauthenticated.requires_login());
        assert!(CheckoutError::Rejected(RemoteError::SessionExpired).requires_login());
        assert!(!CheckoutError::EmptySelection.requires_login());
    }
}
