//! Authentication route handlers.
//!
//! The commerce backend issues a bearer token for email and password; the
//! token is kept in the session and sent with every shopper call.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use stride_core::notice::Notice;
use stride_core::{BearerToken, Email};

use crate::backend::BackendError;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{LOGIN_PATH, OptionalAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, PageContext};
use crate::routes::redirect_with_notice;
use crate::state::AppState;

/// Where a shopper lands after logging in without a `next` target.
const DEFAULT_LANDING: &str = "/cart";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
///
/// No `Debug`: the password must never reach the logs.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Query parameters for the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub email: String,
    pub next: String,
}

/// Only same-site absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> &str {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//"))
        .unwrap_or(DEFAULT_LANDING)
}

// =============================================================================
// Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to(safe_next(query.next.as_deref())).into_response();
    }

    LoginTemplate {
        page: PageContext::load(&session, None).await,
        email: String::new(),
        next: safe_next(query.next.as_deref()).to_string(),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref()).to_string();
    let password = SecretString::from(form.password);

    let retry = |message: &str| LoginTemplate {
        page: PageContext {
            user_name: None,
            notice: Some(Notice::error(message)),
        },
        email: form.email.clone(),
        next: next.clone(),
    };

    let Ok(email) = Email::parse(&form.email) else {
        return Ok(retry("Please enter a valid email address.").into_response());
    };

    let response = match state.backend().login(&email, &password).await {
        Ok(response) => response,
        Err(BackendError::Status {
            status: 400 | 401 | 403,
            message,
        }) => {
            tracing::warn!(email = %email, "Login rejected");
            let message = message.unwrap_or_else(|| "Invalid email or password.".to_string());
            return Ok(retry(&message).into_response());
        }
        Err(e) => {
            tracing::error!(error = %e, "Login failed");
            return Ok(retry("Login failed. Please try again.").into_response());
        }
    };

    let Some(token) = BearerToken::new(response.token.clone()) else {
        tracing::error!("Backend returned an empty token");
        return Ok(retry("Login failed. Please try again.").into_response());
    };

    let user = CurrentUser {
        name: response
            .display_name()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(email.as_str())
            .to_string(),
        email,
        token,
    };

    set_current_user(&session, &user).await?;
    set_sentry_user(user.email.as_str(), Some(&user.name));
    tracing::info!(email = %user.email, "Shopper logged in");

    redirect_with_notice(
        &session,
        &next,
        Notice::success(format!("Welcome back, {}!", user.first_name())),
    )
    .await
}

/// Handle logout.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<Response> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    redirect_with_notice(&session, LOGIN_PATH, Notice::success("You have been logged out.")).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(None), "/cart");
        assert_eq!(safe_next(Some("/orders")), "/orders");
        assert_eq!(safe_next(Some("//evil.example")), "/cart");
        assert_eq!(safe_next(Some("https://evil.example")), "/cart");
    }
}
