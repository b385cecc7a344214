//! Payment method choice.
//!
//! Only cash on delivery is live; the wallet options are listed so the
//! shopper knows they are coming but cannot be picked.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cod,
    #[serde(rename = "gcash")]
    GCash,
    #[serde(rename = "paypal")]
    PayPal,
}

impl PaymentMethod {
    /// Every method in display order.
    pub const ALL: [Self; 3] = [Self::Cod, Self::GCash, Self::PayPal];

    /// Wire id sent to the backend and used in forms.
    #[must_use]
    pub const fn id(&self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::GCash => "gcash",
            Self::PayPal => "paypal",
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Cod => "Cash on Delivery",
            Self::GCash => "GCash",
            Self::PayPal => "PayPal",
        }
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Cod => "Pay when your order arrives",
            Self::GCash => "Pay via GCash (Coming Soon)",
            Self::PayPal => "Pay via PayPal (Coming Soon)",
        }
    }

    /// Whether the method can be selected.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Cod)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown payment method: {0}")]
pub struct UnknownPaymentMethod(String);

impl FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPaymentMethod(s.to_string()))
    }
}
