//! Checkout wizard route handlers.
//!
//! The wizard is stored in the session. It holds a snapshot of the selected
//! line keys taken when checkout started; the lines themselves are re-read
//! from the backend cart on every step.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use stride_core::checkout::{
    CheckoutError, CheckoutStep, CheckoutWizard, OrderSummary, PaymentMethod, ShippingField,
    ShippingInfo, place_order,
};
use stride_core::notice::Notice;
use stride_core::Price;

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{PageContext, session_keys};
use crate::routes::cart::{load_selection, save_selection};
use crate::routes::{backend_failure, redirect_with_notice, session_expired};
use crate::state::AppState;

const CHECKOUT_PATH: &str = "/checkout";
const CART_PATH: &str = "/cart";

// =============================================================================
// View Types
// =============================================================================

/// Progress indicator entry.
pub struct StepView {
    pub number: u8,
    pub title: &'static str,
    pub current: bool,
    pub done: bool,
}

/// Shipping form field.
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
    pub input_type: &'static str,
}

/// Payment option.
pub struct PaymentView {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub enabled: bool,
    pub chosen: bool,
}

/// Line in the order summary.
pub struct SummaryLineView {
    pub name: String,
    pub size: String,
    pub quantity: u32,
    pub line_total: String,
}

fn field_name(field: ShippingField) -> &'static str {
    match field {
        ShippingField::FirstName => "first_name",
        ShippingField::LastName => "last_name",
        ShippingField::Email => "email",
        ShippingField::Phone => "phone",
        ShippingField::Address => "address",
        ShippingField::City => "city",
        ShippingField::Province => "province",
        ShippingField::PostalCode => "postal_code",
    }
}

fn shipping_fields(shipping: &ShippingInfo) -> Vec<FieldView> {
    ShippingField::ALL
        .into_iter()
        .map(|field| FieldView {
            name: field_name(field),
            label: field.label(),
            value: shipping.get(field).to_string(),
            input_type: match field {
                ShippingField::Email => "email",
                ShippingField::Phone => "tel",
                _ => "text",
            },
        })
        .collect()
}

fn steps(current: CheckoutStep) -> Vec<StepView> {
    CheckoutStep::ALL
        .into_iter()
        .map(|step| StepView {
            number: step.number(),
            title: step.title(),
            current: step == current,
            done: step < current,
        })
        .collect()
}

fn payment_options(chosen: PaymentMethod) -> Vec<PaymentView> {
    PaymentMethod::ALL
        .into_iter()
        .map(|method| PaymentView {
            id: method.id(),
            name: method.name(),
            description: method.description(),
            enabled: method.is_enabled(),
            chosen: method == chosen,
        })
        .collect()
}

// =============================================================================
// Templates
// =============================================================================

/// Checkout page template. Renders the form of the current step.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub step: &'static str,
    pub steps: Vec<StepView>,
    pub fields: Vec<FieldView>,
    pub shipping: ShippingInfo,
    pub payments: Vec<PaymentView>,
    pub payment_name: &'static str,
    pub lines: Vec<SummaryLineView>,
    pub total: String,
}

/// Order placed page.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/confirmation.html")]
pub struct ConfirmationTemplate {
    pub page: PageContext,
    pub order_number: String,
    pub total: String,
    pub status: &'static str,
}

// =============================================================================
// Form Types
// =============================================================================

/// Payment step form data.
#[derive(Debug, Deserialize)]
pub struct PaymentForm {
    pub payment_method: String,
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn load_wizard(session: &Session) -> Option<CheckoutWizard> {
    session
        .get::<CheckoutWizard>(session_keys::CHECKOUT)
        .await
        .ok()
        .flatten()
}

async fn save_wizard(session: &Session, wizard: &CheckoutWizard) -> Result<()> {
    session.insert(session_keys::CHECKOUT, wizard).await?;
    Ok(())
}

/// Save the wizard and go back to it, showing `error` if a step refused.
async fn after_step(
    session: &Session,
    wizard: &CheckoutWizard,
    result: std::result::Result<CheckoutStep, CheckoutError>,
) -> Result<Response> {
    save_wizard(session, wizard).await?;
    match result {
        Ok(_) => Ok(Redirect::to(CHECKOUT_PATH).into_response()),
        Err(e) => redirect_with_notice(session, CHECKOUT_PATH, Notice::warning(e.to_string())).await,
    }
}

async fn no_checkout(session: &Session) -> Result<Response> {
    redirect_with_notice(
        session,
        CART_PATH,
        Notice::warning(CheckoutError::EmptySelection.to_string()),
    )
    .await
}

// =============================================================================
// Routes
// =============================================================================

/// Snapshot the selection and enter the wizard.
#[instrument(skip_all)]
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let cart = match state.backend().get_cart(&user.token).await {
        Ok(cart) => cart,
        Err(e) => return backend_failure(&session, e).await,
    };
    let mut selection = load_selection(&session).await;
    selection.retain_present(&cart);
    save_selection(&session, &selection).await?;

    let shipping = ShippingInfo::prefill(&user.name, user.email.as_str());
    match CheckoutWizard::start(selection, shipping) {
        Ok(wizard) => {
            add_breadcrumb("checkout", "Checkout started", None);
            save_wizard(&session, &wizard).await?;
            Ok(Redirect::to(CHECKOUT_PATH).into_response())
        }
        Err(e) => redirect_with_notice(&session, CART_PATH, Notice::warning(e.to_string())).await,
    }
}

/// Render the current step.
#[instrument(skip_all)]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let Some(wizard) = load_wizard(&session).await else {
        return Ok(Redirect::to(CART_PATH).into_response());
    };
    let cart = match state.backend().get_cart(&user.token).await {
        Ok(cart) => cart,
        Err(e) => return backend_failure(&session, e).await,
    };

    let items = wizard.items().selected_items(&cart);
    if items.is_empty() {
        session.remove_value(session_keys::CHECKOUT).await?;
        return no_checkout(&session).await;
    }

    let total: Price = items.iter().map(|item| item.line_total()).sum();
    let lines = items
        .iter()
        .map(|item| SummaryLineView {
            name: item.name.clone(),
            size: item.size.clone().unwrap_or_default(),
            quantity: item.quantity,
            line_total: item.line_total().display(),
        })
        .collect();

    let step = match wizard.step() {
        CheckoutStep::Shipping => "shipping",
        CheckoutStep::Payment => "payment",
        CheckoutStep::Review => "review",
    };

    Ok(CheckoutTemplate {
        page: PageContext::load(&session, Some(&user)).await,
        step,
        steps: steps(wizard.step()),
        fields: shipping_fields(wizard.shipping()),
        shipping: wizard.shipping().clone(),
        payments: payment_options(wizard.payment()),
        payment_name: wizard.payment().name(),
        lines,
        total: total.display(),
    }
    .into_response())
}

/// Submit the shipping step.
#[instrument(skip_all)]
pub async fn shipping(
    session: Session,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<ShippingInfo>,
) -> Result<Response> {
    let Some(mut wizard) = load_wizard(&session).await else {
        return Ok(Redirect::to(CART_PATH).into_response());
    };
    let result = wizard.submit_shipping(form);
    after_step(&session, &wizard, result).await
}

/// Submit the payment step.
#[instrument(skip_all, fields(payment = %form.payment_method))]
pub async fn payment(
    session: Session,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<PaymentForm>,
) -> Result<Response> {
    let Some(mut wizard) = load_wizard(&session).await else {
        return Ok(Redirect::to(CART_PATH).into_response());
    };
    let Ok(method) = form.payment_method.parse::<PaymentMethod>() else {
        return redirect_with_notice(
            &session,
            CHECKOUT_PATH,
            Notice::warning("Please choose a payment method."),
        )
        .await;
    };
    let result = wizard.submit_payment(method);
    after_step(&session, &wizard, result).await
}

/// Go back one step.
#[instrument(skip_all)]
pub async fn back(session: Session, RequireAuth(_user): RequireAuth) -> Result<Response> {
    let Some(mut wizard) = load_wizard(&session).await else {
        return Ok(Redirect::to(CART_PATH).into_response());
    };
    wizard.back();
    save_wizard(&session, &wizard).await?;
    Ok(Redirect::to(CHECKOUT_PATH).into_response())
}

/// Place the order.
#[instrument(skip_all)]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let Some(wizard) = load_wizard(&session).await else {
        return Ok(Redirect::to(CART_PATH).into_response());
    };
    if wizard.step() != CheckoutStep::Review {
        return Ok(Redirect::to(CHECKOUT_PATH).into_response());
    }
    let cart = match state.backend().get_cart(&user.token).await {
        Ok(cart) => cart,
        Err(e) => return backend_failure(&session, e).await,
    };
    let items = wizard.items().selected_items(&cart);

    match place_order(
        state.backend(),
        Some(&user.token),
        wizard.shipping(),
        wizard.payment(),
        &items,
    )
    .await
    {
        Ok(summary) => {
            let mut selection = load_selection(&session).await;
            for item in &items {
                selection.evict(&item.key());
            }
            save_selection(&session, &selection).await?;
            session.remove_value(session_keys::CHECKOUT).await?;
            session.insert(session_keys::LAST_ORDER, &summary).await?;

            add_breadcrumb(
                "checkout",
                "Order placed",
                Some(&[("order_number", summary.order_number.as_str())]),
            );
            Ok(Redirect::to("/checkout/confirmation").into_response())
        }
        Err(e) if e.requires_login() => session_expired(&session).await,
        Err(CheckoutError::EmptySelection) => {
            session.remove_value(session_keys::CHECKOUT).await?;
            no_checkout(&session).await
        }
        Err(e) => redirect_with_notice(&session, CHECKOUT_PATH, Notice::error(e.to_string())).await,
    }
}

/// Show the order that was just placed.
#[instrument(skip_all)]
pub async fn confirmation(session: Session, RequireAuth(user): RequireAuth) -> Result<Response> {
    let Some(summary) = session
        .get::<OrderSummary>(session_keys::LAST_ORDER)
        .await?
    else {
        return Ok(Redirect::to("/orders").into_response());
    };

    Ok(ConfirmationTemplate {
        page: PageContext::load(&session, Some(&user))
            .await
            .with_notice(Some(Notice::success("Order placed successfully!"))),
        order_number: summary.order_number,
        total: summary.total_amount.display(),
        status: summary.status.as_str(),
    }
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_mark_progress() {
        let views = steps(CheckoutStep::Payment);
        let flags: Vec<(bool, bool)> = views.iter().map(|s| (s.done, s.current)).collect();
        assert_eq!(flags, vec![(true, false), (false, true), (false, false)]);
    }

    #[test]
    fn test_only_cod_is_selectable() {
        let options = payment_options(PaymentMethod::Cod);
        let enabled: Vec<&str> = options.iter().filter(|o| o.enabled).map(|o| o.id).collect();
        assert_eq!(enabled, vec!["cod"]);
        assert!(options.iter().any(|o| o.chosen && o.id == "cod"));
    }

    #[test]
    fn test_field_names_match_form_deserialization() {
        let shipping: ShippingInfo = serde_json::from_value(serde_json::json!({
            "first_name": "Juan",
            "postal_code": "1100",
        }))
        .unwrap_or_default();

        let fields = shipping_fields(&shipping);
        assert_eq!(fields.len(), 8);
        let first = fields.iter().find(|f| f.name == "first_name").map(|f| f.value.as_str());
        let postal = fields.iter().find(|f| f.name == "postal_code").map(|f| f.value.as_str());
        assert_eq!(first, Some("Juan"));
        assert_eq!(postal, Some("1100"));
    }
}
