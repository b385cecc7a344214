//! Review form route handlers.
//!
//! One review per shopper and product: the form edits the existing review
//! when there is one.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use stride_core::notice::Notice;
use stride_core::reviews::{
    MAX_RATING, MIN_RATING, ReviewDraft, ReviewError, ReviewSubmission, find_user_review,
    submit_review,
};
use stride_core::{ProductId, RemoteError};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::PageContext;
use crate::routes::{backend_failure, redirect_with_notice, session_expired};
use crate::state::AppState;

// =============================================================================
// Templates
// =============================================================================

/// Star choice in the rating picker.
pub struct RatingOption {
    pub value: u8,
    pub checked: bool,
}

/// Review form template.
#[derive(Template, WebTemplate)]
#[template(path = "reviews/form.html")]
pub struct ReviewFormTemplate {
    pub page: PageContext,
    pub product_id: i64,
    pub product_name: String,
    pub editing: bool,
    pub ratings: Vec<RatingOption>,
    pub comment: String,
}

impl ReviewFormTemplate {
    fn new(
        page: PageContext,
        product_id: ProductId,
        product_name: String,
        editing: bool,
        draft: &ReviewDraft,
    ) -> Self {
        Self {
            page,
            product_id: product_id.as_i64(),
            product_name,
            editing,
            ratings: rating_options(draft.rating),
            comment: draft.comment.clone(),
        }
    }
}

fn rating_options(chosen: u8) -> Vec<RatingOption> {
    (MIN_RATING..=MAX_RATING)
        .rev()
        .map(|value| RatingOption {
            value,
            checked: value == chosen,
        })
        .collect()
}

// =============================================================================
// Form Types
// =============================================================================

/// Review form data. A missing rating fails validation.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

// =============================================================================
// Routes
// =============================================================================

/// Display the review form, prefilled with the shopper's review if any.
#[instrument(skip(state, session, user))]
pub async fn form(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<i64>,
) -> Result<Response> {
    let product_id = ProductId::new(product_id);
    let product = match state.backend().product(product_id).await {
        Ok(product) => product,
        Err(e) if e.status() == Some(404) => {
            return Err(AppError::NotFound(format!("product {product_id}")));
        }
        Err(e) => return backend_failure(&session, e).await,
    };

    let existing = match find_user_review(state.backend(), &user.token, product_id).await {
        Ok(existing) => existing,
        Err(RemoteError::SessionExpired) => return session_expired(&session).await,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load own review");
            None
        }
    };

    Ok(ReviewFormTemplate::new(
        PageContext::load(&session, Some(&user)).await,
        product_id,
        product.name,
        existing.is_some(),
        &ReviewDraft::for_existing(existing.as_ref()),
    )
    .into_response())
}

/// Create or update the shopper's review.
#[instrument(skip(state, session, user, form), fields(rating = form.rating))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<i64>,
    Form(form): Form<ReviewForm>,
) -> Result<Response> {
    let product_id = ProductId::new(product_id);
    let draft = ReviewDraft {
        rating: form.rating,
        comment: form.comment,
    };

    let existing = match find_user_review(state.backend(), &user.token, product_id).await {
        Ok(existing) => existing,
        Err(RemoteError::SessionExpired) => return session_expired(&session).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load own review");
            return redirect_with_notice(
                &session,
                &format!("/reviews/{product_id}"),
                Notice::error("Failed to submit review. Please try again."),
            )
            .await;
        }
    };

    match submit_review(
        state.backend(),
        Some(&user.token),
        product_id,
        existing.as_ref(),
        &draft,
    )
    .await
    {
        Ok(submission) => {
            let message = match submission {
                ReviewSubmission::Created => "Review submitted successfully!",
                ReviewSubmission::Updated => "Review updated successfully!",
            };
            add_breadcrumb("reviews", message, None);
            redirect_with_notice(
                &session,
                &format!("/products/{product_id}"),
                Notice::success(message),
            )
            .await
        }
        Err(ReviewError::Unauthenticated | ReviewError::Rejected {
            source: RemoteError::SessionExpired,
            ..
        }) => session_expired(&session).await,
        Err(e) => {
            let product_name = match state.backend().product(product_id).await {
                Ok(product) => product.name,
                Err(_) => String::from("Product"),
            };
            Ok(ReviewFormTemplate::new(
                PageContext::load(&session, Some(&user))
                    .await
                    .with_notice(Some(Notice::error(e.to_string()))),
                product_id,
                product_name,
                existing.is_some(),
                &draft,
            )
            .into_response())
        }
    }
}
