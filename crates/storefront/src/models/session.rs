//! Session-related types.
//!
//! Types stored in the session for authentication and checkout state.

use serde::{Deserialize, Serialize};

use stride_core::{BearerToken, Email};

/// Session-stored shopper identity.
///
/// Minimal data stored in the session to call the backend on the shopper's
/// behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Display name from the backend, falls back to the email.
    pub name: String,
    /// Shopper's email address.
    pub email: Email,
    /// Bearer token issued at login.
    pub token: BearerToken,
}

impl CurrentUser {
    /// Name shown in the header.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Session keys for storefront state.
pub mod session_keys {
    /// Key for storing the current logged-in shopper.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the cart lines picked for checkout.
    pub const SELECTION: &str = "cart_selection";

    /// Key for the in-progress checkout wizard.
    pub const CHECKOUT: &str = "checkout";

    /// Key for the summary of the last placed order.
    pub const LAST_ORDER: &str = "last_order";

    /// Key for the one-shot notice shown on the next page.
    pub const NOTICE: &str = "notice";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_first_name() {
        let user = CurrentUser {
            name: "Juan Dela Cruz".into(),
            email: Email::parse("juan@example.ph").unwrap(),
            token: BearerToken::new("jwt").unwrap(),
        };
        assert_eq!(user.first_name(), "Juan");
    }

    #[test]
    fn test_token_not_in_debug_output() {
        let user = CurrentUser {
            name: "Juan".into(),
            email: Email::parse("juan@example.ph").unwrap(),
            token: BearerToken::new("very-secret-jwt").unwrap(),
        };
        assert!(!format!("{user:?}").contains("very-secret-jwt"));
    }
}
