//! Cart route handlers.
//!
//! The cart itself lives on the backend; the checkout selection lives in the
//! session. Quantity changes and removals go through a [`CartCoordinator`]
//! sharing the shopper's loading state, so a second click on a line that is
//! still updating is refused instead of racing the first.

use std::sync::atomic::{AtomicBool, Ordering};

use askama::Template;
use askama_web::WebTemplate;
use async_trait::async_trait;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use stride_core::cart::{
    Cart, CartChange, CartCoordinator, CartError, Confirmation, LineItem, LineItemKey,
    RemovalPrompt, SelectionSet,
};
use stride_core::notice::Notice;
use stride_core::{ProductId, RemoteError};

use crate::backend::ShopperClient;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, PageContext, session_keys};
use crate::routes::{backend_failure, redirect_with_notice, session_expired};
use crate::state::AppState;

const CART_PATH: &str = "/cart";

// =============================================================================
// View Types
// =============================================================================

/// Cart line display data for templates.
pub struct LineItemView {
    pub key: String,
    pub product_id: i64,
    pub name: String,
    pub size: String,
    pub color: String,
    pub image: String,
    pub unit_price: String,
    pub quantity: u32,
    pub line_total: String,
    pub selected: bool,
    pub loading: bool,
}

impl LineItemView {
    fn new(item: &LineItem, selected: bool, loading: bool) -> Self {
        Self {
            key: item.key().to_string(),
            product_id: item.product_id.as_i64(),
            name: item.name.clone(),
            size: item.size.clone().unwrap_or_default(),
            color: item.color.clone().unwrap_or_default(),
            image: item
                .image
                .clone()
                .unwrap_or_else(|| stride_core::checkout::PLACEHOLDER_IMAGE.to_string()),
            unit_price: item.unit_price.display(),
            quantity: item.quantity,
            line_total: item.line_total().display(),
            selected,
            loading,
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub items: Vec<LineItemView>,
    pub unit_count: u32,
    pub selected_count: usize,
    pub selected_total: String,
}

/// "Remove item from cart?" page.
#[derive(Template, WebTemplate)]
#[template(path = "cart/confirm_remove.html")]
pub struct ConfirmRemoveTemplate {
    pub page: PageContext,
    pub item: LineItemView,
    pub action: &'static str,
}

// =============================================================================
// Form Types
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i64,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
}

/// Selection checkbox form data.
#[derive(Debug, Deserialize)]
pub struct SelectForm {
    pub key: String,
    /// Present (any value) when the box is ticked.
    #[serde(default)]
    pub checked: Option<String>,
}

/// Form data of the quantity and remove controls.
#[derive(Debug, Deserialize)]
pub struct LineForm {
    pub key: String,
    /// `yes` or `no` once the shopper answered the removal question.
    #[serde(default)]
    pub confirm: Option<String>,
}

// =============================================================================
// Removal Prompt
// =============================================================================

/// Answers "Remove item from cart?" from the submitted form.
///
/// Without an answer it declines and remembers that the question is still
/// open, so the handler can render the confirmation page.
struct FormPrompt {
    answer: Option<Confirmation>,
    unanswered: AtomicBool,
}

impl FormPrompt {
    fn new(confirm: Option<&str>) -> Self {
        let answer = match confirm.map(str::trim) {
            Some("yes") => Some(Confirmation::Confirmed),
            Some("no") => Some(Confirmation::Cancelled),
            _ => None,
        };
        Self {
            answer,
            unanswered: AtomicBool::new(false),
        }
    }

    fn needs_answer(&self) -> bool {
        self.unanswered.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RemovalPrompt for FormPrompt {
    async fn request_removal(&self, _item: &LineItem) -> Confirmation {
        self.answer.unwrap_or_else(|| {
            self.unanswered.store(true, Ordering::Relaxed);
            Confirmation::Cancelled
        })
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the checkout selection from the session.
pub(crate) async fn load_selection(session: &Session) -> SelectionSet {
    session
        .get::<SelectionSet>(session_keys::SELECTION)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Store the checkout selection in the session.
pub(crate) async fn save_selection(
    session: &Session,
    selection: &SelectionSet,
) -> std::result::Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::SELECTION, selection).await
}

fn parse_key(raw: &str) -> Result<LineItemKey> {
    raw.parse()
        .map_err(|e: stride_core::cart::ParseLineItemKeyError| AppError::BadRequest(e.to_string()))
}

/// Everything a line mutation needs.
struct LineContext {
    coordinator: CartCoordinator<ShopperClient>,
    cart: Cart,
    selection: SelectionSet,
}

impl LineContext {
    async fn load(
        state: &AppState,
        session: &Session,
        user: &CurrentUser,
    ) -> std::result::Result<Self, crate::backend::BackendError> {
        let shopper = state.backend().for_shopper(user.token.clone());
        let cart = shopper.cart().await?;
        let coordinator = CartCoordinator::new(shopper, state.loading_set(&user.email).await);
        Ok(Self {
            coordinator,
            cart,
            selection: load_selection(session).await,
        })
    }
}

/// Shopper-facing outcome of a line mutation.
fn change_notice(result: &std::result::Result<CartChange, CartError>) -> Option<Notice> {
    match result {
        Ok(CartChange::Removed) => Some(Notice::success("Item removed from cart")),
        Ok(CartChange::QuantityUpdated(_) | CartChange::Cancelled) => None,
        Err(CartError::MutationInFlight(_)) => {
            Some(Notice::warning("This item is still being updated."))
        }
        Err(CartError::InvalidQuantity) => Some(Notice::warning("Quantity must be at least 1.")),
        Err(CartError::Remote(e)) => Some(Notice::error(
            e.backend_message()
                .unwrap_or("Failed to update cart. Please try again."),
        )),
    }
}

/// Persist the selection and report the outcome back on the cart page.
async fn finish(
    session: &Session,
    selection: &SelectionSet,
    result: std::result::Result<CartChange, CartError>,
) -> Result<Response> {
    if matches!(result, Err(CartError::Remote(RemoteError::SessionExpired))) {
        return session_expired(session).await;
    }

    save_selection(session, selection).await?;
    match change_notice(&result) {
        Some(notice) => redirect_with_notice(session, CART_PATH, notice).await,
        None => Ok(Redirect::to(CART_PATH).into_response()),
    }
}

async fn line_gone(session: &Session) -> Result<Response> {
    redirect_with_notice(
        session,
        CART_PATH,
        Notice::warning("That item is no longer in your cart."),
    )
    .await
}

// =============================================================================
// Routes
// =============================================================================

/// Display cart page.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let cart = match state.backend().get_cart(&user.token).await {
        Ok(cart) => cart,
        Err(e) => return backend_failure(&session, e).await,
    };

    let mut selection = load_selection(&session).await;
    if selection.retain_present(&cart) > 0 {
        save_selection(&session, &selection).await?;
    }
    let loading = state.loading_set(&user.email).await.snapshot();

    let items = cart
        .items()
        .iter()
        .map(|item| {
            let key = item.key();
            LineItemView::new(item, selection.is_selected(&key), loading.contains(&key))
        })
        .collect();

    Ok(CartShowTemplate {
        page: PageContext::load(&session, Some(&user)).await,
        items,
        unit_count: cart.unit_count(),
        selected_count: selection.len(),
        selected_total: selection.selected_total(&cart).display(),
    }
    .into_response())
}

/// Add a product to the cart.
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let product_id = ProductId::new(form.product_id);
    let back = format!("/products/{product_id}");

    let product = match state.backend().product(product_id).await {
        Ok(product) => product,
        Err(e) => return backend_failure(&session, e).await,
    };

    let size = form.size.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if product.has_sizes() && !size.is_some_and(|s| product.offers_size(s)) {
        return redirect_with_notice(&session, &back, Notice::warning("Please select a size")).await;
    }

    let quantity = form.quantity.unwrap_or(1).max(1);
    let shopper = state.backend().for_shopper(user.token.clone());
    match shopper.add_to_cart(product_id, size, quantity).await {
        Ok(()) => {
            let id = product_id.to_string();
            add_breadcrumb("cart", "Added to cart", Some(&[("product_id", id.as_str())]));
            redirect_with_notice(&session, &back, Notice::success("Added to cart!")).await
        }
        Err(e) if e.status() == Some(401) => session_expired(&session).await,
        Err(e) => {
            tracing::error!(error = %e, "Error adding to cart");
            let remote = RemoteError::from(e);
            let message = remote
                .backend_message()
                .unwrap_or("Failed to add to cart. Please try again.");
            redirect_with_notice(&session, &back, Notice::error(message)).await
        }
    }
}

/// Tick or untick a line for checkout.
#[instrument(skip(state, session, user))]
pub async fn select(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<SelectForm>,
) -> Result<Response> {
    let key = parse_key(&form.key)?;
    let cart = match state.backend().get_cart(&user.token).await {
        Ok(cart) => cart,
        Err(e) => return backend_failure(&session, e).await,
    };
    if !cart.contains(&key) {
        return line_gone(&session).await;
    }

    let mut selection = load_selection(&session).await;
    selection.toggle(key, form.checked.is_some());
    save_selection(&session, &selection).await?;

    Ok(Redirect::to(CART_PATH).into_response())
}

/// "+" control.
#[instrument(skip(state, session, user))]
pub async fn increment(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let key = parse_key(&form.key)?;
    let ctx = match LineContext::load(&state, &session, &user).await {
        Ok(ctx) => ctx,
        Err(e) => return backend_failure(&session, e).await,
    };
    let Some(item) = ctx.cart.get(&key) else {
        return line_gone(&session).await;
    };

    let result = ctx.coordinator.increment(item).await;
    finish(&session, &ctx.selection, result).await
}

/// "-" control. At quantity 1 the shopper is asked before the line goes.
#[instrument(skip(state, session, user))]
pub async fn decrement(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let key = parse_key(&form.key)?;
    let mut ctx = match LineContext::load(&state, &session, &user).await {
        Ok(ctx) => ctx,
        Err(e) => return backend_failure(&session, e).await,
    };
    let Some(item) = ctx.cart.get(&key).cloned() else {
        return line_gone(&session).await;
    };

    let prompt = FormPrompt::new(form.confirm.as_deref());
    let result = ctx
        .coordinator
        .decrement(&item, &mut ctx.selection, &prompt)
        .await;

    if prompt.needs_answer() {
        return Ok(confirm_page(&session, &user, &item, "/cart/decrement").await);
    }
    finish(&session, &ctx.selection, result).await
}

/// "×" control. Asks the same question as decrement-to-zero.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let key = parse_key(&form.key)?;
    let mut ctx = match LineContext::load(&state, &session, &user).await {
        Ok(ctx) => ctx,
        Err(e) => return backend_failure(&session, e).await,
    };
    let Some(item) = ctx.cart.get(&key).cloned() else {
        return line_gone(&session).await;
    };

    let prompt = FormPrompt::new(form.confirm.as_deref());
    let result = ctx
        .coordinator
        .request_remove(&item, &mut ctx.selection, &prompt)
        .await;

    if prompt.needs_answer() {
        return Ok(confirm_page(&session, &user, &item, "/cart/remove").await);
    }
    finish(&session, &ctx.selection, result).await
}

async fn confirm_page(
    session: &Session,
    user: &CurrentUser,
    item: &LineItem,
    action: &'static str,
) -> Response {
    ConfirmRemoveTemplate {
        page: PageContext::load(session, Some(user)).await,
        item: LineItemView::new(item, false, false),
        action,
    }
    .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stride_core::Price;

    use super::*;

    fn line() -> LineItem {
        LineItem {
            product_id: ProductId::new(12),
            size: Some("M".into()),
            name: "Court Classic".into(),
            unit_price: Price::from_centavos(150_000),
            quantity: 1,
            image: None,
            color: None,
        }
    }

    #[tokio::test]
    async fn test_form_prompt_answers() {
        let item = line();

        let yes = FormPrompt::new(Some("yes"));
        assert_eq!(yes.request_removal(&item).await, Confirmation::Confirmed);
        assert!(!yes.needs_answer());

        let no = FormPrompt::new(Some("no"));
        assert_eq!(no.request_removal(&item).await, Confirmation::Cancelled);
        assert!(!no.needs_answer());

        let open = FormPrompt::new(None);
        assert_eq!(open.request_removal(&item).await, Confirmation::Cancelled);
        assert!(open.needs_answer());
    }

    #[test]
    fn test_change_notices() {
        let key = line().key();
        assert!(change_notice(&Ok(CartChange::QuantityUpdated(2))).is_none());
        assert!(change_notice(&Ok(CartChange::Cancelled)).is_none());
        assert_eq!(
            change_notice(&Ok(CartChange::Removed)).unwrap().message,
            "Item removed from cart"
        );
        assert_eq!(
            change_notice(&Err(CartError::Remote(RemoteError::rejected(400, "Out of stock"))))
                .unwrap()
                .message,
            "Out of stock"
        );
        assert_eq!(
            change_notice(&Err(CartError::Remote(RemoteError::Network("reset".into()))))
                .unwrap()
                .message,
            "Failed to update cart. Please try again."
        );
        assert!(change_notice(&Err(CartError::MutationInFlight(key))).is_some());
    }

    #[test]
    fn test_line_view() {
        let view = LineItemView::new(&line(), true, false);
        assert_eq!(view.key, "12-M");
        assert_eq!(view.line_total, "₱ 1,500.00");
        assert_eq!(view.image, stride_core::checkout::PLACEHOLDER_IMAGE);
        assert!(view.selected);
    }
}
