//! Order lifecycle status as reported by the commerce backend.

use serde::{Deserialize, Serialize};

/// Order status.
///
/// ```text
/// PENDING -> PROCESSING -> DELIVERED -> COMPLETED
///     \__________\______________________-> CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order created but not yet processed.
    #[default]
    Pending,
    /// Being prepared for shipping.
    Processing,
    /// Delivered; the customer can mark it as received.
    Delivered,
    /// The customer marked it as received.
    Completed,
    /// Order cancelled.
    Cancelled,
}

impl OrderStatus {
    /// Wire name, e.g. `"DELIVERED"`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Delivered => "DELIVERED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Lowercase name used for CSS status badges.
    #[must_use]
    pub const fn css_class(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Delivered => "delivered",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Only delivered orders can be marked as received.
    #[must_use]
    pub const fn can_mark_received(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Items of delivered or completed orders can be reviewed.
    #[must_use]
    pub const fn can_review(&self) -> bool {
        matches!(self, Self::Delivered | Self::Completed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "DELIVERED" => Ok(Self::Delivered),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let status: OrderStatus = serde_json::from_str("\"DELIVERED\"").unwrap();
        assert_eq!(status, OrderStatus::Delivered);
        assert_eq!(serde_json::to_string(&OrderStatus::Completed).unwrap(), "\"COMPLETED\"");
    }

    #[test]
    fn test_status_from_str_is_case_insensitive() {
        assert_eq!("pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_actions() {
        assert!(OrderStatus::Delivered.can_mark_received());
        assert!(!OrderStatus::Completed.can_mark_received());
        assert!(OrderStatus::Completed.can_review());
        assert!(OrderStatus::Delivered.can_review());
        assert!(!OrderStatus::Pending.can_review());
    }
}
