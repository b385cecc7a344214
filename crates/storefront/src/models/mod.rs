//! Session-held models for the storefront.

pub mod flash;
pub mod session;

pub use flash::{PageContext, push_notice, take_notice};
pub use session::{CurrentUser, session_keys};
