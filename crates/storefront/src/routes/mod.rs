//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Health check
//!
//! # Products
//! GET  /products/{id}               - Product detail with reviews
//!
//! # Cart
//! GET  /cart                        - Cart page
//! POST /cart/add                    - Add a product
//! POST /cart/select                 - Toggle a line for checkout
//! POST /cart/increment              - "+" control
//! POST /cart/decrement              - "-" control (asks before removing)
//! POST /cart/remove                 - "×" control (asks before removing)
//!
//! # Checkout (requires auth)
//! GET  /checkout                    - Current wizard step
//! POST /checkout/start              - Snapshot the selection
//! POST /checkout/shipping           - Submit shipping details
//! POST /checkout/payment            - Choose payment method
//! POST /checkout/back               - Previous step
//! POST /checkout/place              - Place the order
//! GET  /checkout/confirmation       - Order placed
//!
//! # Orders (requires auth)
//! GET  /orders                      - Order history (?show=N)
//! GET  /orders/{id}                 - Order detail
//! POST /orders/{id}/received        - Mark a delivered order received
//! POST /orders/{id}/reorder         - Add an order's items to the cart
//!
//! # Reviews (requires auth)
//! GET  /reviews/{product_id}        - Review form
//! POST /reviews/{product_id}        - Create or update the review
//!
//! # Auth
//! GET  /auth/login                  - Login page
//! POST /auth/login                  - Login action
//! POST /auth/logout                 - Logout action
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;
pub mod reviews;

use axum::{
    Router,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tower_sessions::Session;

use stride_core::notice::Notice;

use crate::backend::BackendError;
use crate::error::{Result, clear_sentry_user};
use crate::middleware::{LOGIN_PATH, clear_current_user};
use crate::models::push_notice;
use crate::state::AppState;

/// Shown when the backend rejects the shopper's token.
pub const SESSION_EXPIRED: &str = "Session expired. Please log in again.";

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new().route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/select", post(cart::select))
        .route("/increment", post(cart::increment))
        .route("/decrement", post(cart::decrement))
        .route("/remove", post(cart::remove))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/start", post(checkout::start))
        .route("/shipping", post(checkout::shipping))
        .route("/payment", post(checkout::payment))
        .route("/back", post(checkout::back))
        .route("/place", post(checkout::place))
        .route("/confirmation", get(checkout::confirmation))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/received", post(orders::received))
        .route("/{id}/reorder", post(orders::reorder))
}

/// Create the review routes router.
pub fn review_routes() -> Router<AppState> {
    Router::new().route("/{product_id}", get(reviews::form).post(reviews::submit))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .nest("/reviews", review_routes())
        .nest("/auth", auth_routes())
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Queue `notice` and redirect to `to`.
pub(crate) async fn redirect_with_notice(
    session: &Session,
    to: &str,
    notice: Notice,
) -> Result<Response> {
    push_notice(session, notice).await?;
    Ok(Redirect::to(to).into_response())
}

/// Sign the shopper out after the backend rejected their token.
pub(crate) async fn session_expired(session: &Session) -> Result<Response> {
    tracing::info!("Backend rejected bearer token, signing out");
    clear_current_user(session).await?;
    clear_sentry_user();
    redirect_with_notice(session, LOGIN_PATH, Notice::warning(SESSION_EXPIRED)).await
}

/// Turn a failed backend call into a response: a 401 signs the shopper out,
/// anything else becomes an [`crate::error::AppError`].
pub(crate) async fn backend_failure(session: &Session, error: BackendError) -> Result<Response> {
    if error.status() == Some(401) {
        return session_expired(session).await;
    }
    Err(error.into())
}
