//! Order history route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use stride_core::notice::Notice;
use stride_core::reviews::find_user_review;
use stride_core::{BearerToken, OrderId, ProductId};
use stride_core::orders::reorder::reorder as reorder_order;
use stride_core::orders::{
    self, OrderItem, OrderPager, OrderRecord, load_order_details, load_orders,
};

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::PageContext;
use crate::routes::{redirect_with_notice, session_expired};
use crate::state::AppState;

const ORDERS_PATH: &str = "/orders";

// =============================================================================
// View Types
// =============================================================================

/// Order line for templates.
pub struct OrderItemView {
    pub product_id: i64,
    pub has_product: bool,
    pub name: String,
    pub image: String,
    pub size: String,
    pub quantity: u32,
    pub unit_price: String,
    pub total_price: String,
    pub reviewed: bool,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.map_or(0, |id| id.as_i64()),
            has_product: item.product_id.is_some(),
            name: item.display_name().to_string(),
            image: item.product_image.clone().unwrap_or_default(),
            size: item.size.clone().unwrap_or_default(),
            quantity: item.quantity,
            unit_price: item.unit_price.display(),
            total_price: item.total_price.display(),
            reviewed: false,
        }
    }
}

/// Order card or detail data for templates.
pub struct OrderView {
    pub id: i64,
    pub number: String,
    pub date: String,
    pub status: &'static str,
    pub status_class: &'static str,
    pub total: String,
    pub shipping_address: String,
    pub item_count: usize,
    pub items: Vec<OrderItemView>,
    pub hidden_item_count: usize,
    pub can_mark_received: bool,
    pub can_review: bool,
}

impl OrderView {
    /// Card view: only the first few lines.
    fn preview(order: &OrderRecord) -> Self {
        Self::build(order, order.preview_items(), order.hidden_item_count())
    }

    /// Detail view: every line.
    fn full(order: &OrderRecord) -> Self {
        Self::build(order, &order.order_items, 0)
    }

    fn build(order: &OrderRecord, items: &[OrderItem], hidden_item_count: usize) -> Self {
        Self {
            id: order.id.as_i64(),
            number: order.display_number(),
            date: order.formatted_date().unwrap_or_default(),
            status: order.status.as_str(),
            status_class: order.status.css_class(),
            total: order.total_amount.display(),
            shipping_address: order.shipping_address.clone().unwrap_or_default(),
            item_count: order.item_count(),
            items: items.iter().map(OrderItemView::from).collect(),
            hidden_item_count,
            can_mark_received: order.status.can_mark_received(),
            can_review: order.status.can_review(),
        }
    }
}

/// Flag the lines the shopper has already reviewed. Lookup failures leave
/// the line unflagged.
async fn mark_reviewed(state: &AppState, token: &BearerToken, view: &mut OrderView) {
    if !view.can_review {
        return;
    }
    for item in view.items.iter_mut().filter(|i| i.has_product) {
        let product_id = ProductId::new(item.product_id);
        item.reviewed = match find_user_review(state.backend(), token, product_id).await {
            Ok(review) => review.is_some(),
            Err(e) => {
                tracing::warn!(product_id = %product_id, error = %e, "Review lookup failed");
                false
            }
        };
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub page: PageContext,
    pub orders: Vec<OrderView>,
    pub error: String,
    pub has_more: bool,
    pub show_more: usize,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub page: PageContext,
    pub order: OrderView,
}

/// Query parameters for the order history.
#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub show: Option<usize>,
}

// =============================================================================
// Routes
// =============================================================================

/// Display the shopper's order history.
#[instrument(skip(state, session, user))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(query): Query<OrdersQuery>,
) -> Result<Response> {
    let pager = OrderPager::new(query.show);

    let (orders, error) = match load_orders(state.backend(), Some(&user.token)).await {
        Ok(orders) => (orders, String::new()),
        Err(e) if e.requires_login() => return session_expired(&session).await,
        Err(e) => (Vec::new(), e.to_string()),
    };

    Ok(OrdersIndexTemplate {
        page: PageContext::load(&session, Some(&user)).await,
        orders: pager.visible(&orders).iter().map(OrderView::preview).collect(),
        error,
        has_more: pager.has_more(orders.len()),
        show_more: pager.show_more(),
    }
    .into_response())
}

/// Display one order with all of its lines.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    match load_order_details(state.backend(), Some(&user.token), OrderId::new(id)).await {
        Ok(order) => {
            let mut view = OrderView::full(&order);
            mark_reviewed(&state, &user.token, &mut view).await;
            Ok(OrderShowTemplate {
                page: PageContext::load(&session, Some(&user)).await,
                order: view,
            }
            .into_response())
        }
        Err(e) if e.requires_login() => session_expired(&session).await,
        Err(e) => redirect_with_notice(&session, ORDERS_PATH, Notice::error(e.to_string())).await,
    }
}

/// Mark a delivered order as received, then offer a review of its first
/// product.
#[instrument(skip(state, session, user))]
pub async fn received(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    let order_id = OrderId::new(id);
    match orders::mark_received(state.backend(), Some(&user.token), order_id).await {
        Ok(prompt) => {
            add_breadcrumb("orders", "Order marked as received", None);
            let to = prompt.map_or_else(
                || ORDERS_PATH.to_string(),
                |p| format!("/reviews/{}", p.product_id),
            );
            redirect_with_notice(&session, &to, Notice::success("Order marked as received!")).await
        }
        Err(e) if e.requires_login() => session_expired(&session).await,
        Err(e) => redirect_with_notice(&session, ORDERS_PATH, Notice::error(e.to_string())).await,
    }
}

/// Add every line of a past order back to the cart.
#[instrument(skip(state, session, user))]
pub async fn reorder(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    let order = match load_order_details(state.backend(), Some(&user.token), OrderId::new(id)).await
    {
        Ok(order) => order,
        Err(e) if e.requires_login() => return session_expired(&session).await,
        Err(e) => {
            return redirect_with_notice(&session, ORDERS_PATH, Notice::error(e.to_string())).await;
        }
    };

    let shopper = state.backend().for_shopper(user.token.clone());
    let outcome = reorder_order(&shopper, &order).await;
    add_breadcrumb("orders", "Reorder", Some(&[("order", order.display_number().as_str())]));

    let to = if outcome.should_open_cart() {
        "/cart"
    } else {
        ORDERS_PATH
    };
    redirect_with_notice(&session, to, outcome.notice()).await
}
