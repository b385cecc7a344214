//! Product detail page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use stride_core::ProductId;
use stride_core::catalog::Product;
use stride_core::reviews::{self, Review};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::PageContext;
use crate::state::AppState;

/// Review display data for templates.
pub struct ReviewView {
    pub author: String,
    pub rating: u8,
    pub comment: String,
    pub date: String,
}

impl From<&Review> for ReviewView {
    fn from(review: &Review) -> Self {
        Self {
            author: review.author().to_string(),
            rating: review.rating,
            comment: review.comment.clone(),
            date: review.formatted_date().unwrap_or_default(),
        }
    }
}

/// Product display data for templates.
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: String,
    pub image: String,
    pub gallery: Vec<String>,
    pub sizes: Vec<String>,
    pub color: String,
    pub category: String,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name.clone(),
            description: product.description.clone().unwrap_or_default(),
            price: product.price.display(),
            image: product.primary_image().to_string(),
            gallery: product.images.iter().skip(1).cloned().collect(),
            sizes: product.sizes.clone(),
            color: product.color.clone().unwrap_or_default(),
            category: product.category.clone().unwrap_or_default(),
        }
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub product: ProductView,
    pub reviews: Vec<ReviewView>,
    pub average_rating: String,
    pub has_own_review: bool,
}

/// Display a product with its reviews.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<i64>,
) -> Result<Response> {
    let product_id = ProductId::new(id);

    let product = match state.backend().product(product_id).await {
        Ok(product) => product,
        Err(e) if e.status() == Some(404) => {
            return Err(AppError::NotFound(format!("product {product_id}")));
        }
        Err(e) => return Err(e.into()),
    };

    let product_reviews = state
        .backend()
        .product_reviews(product_id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load reviews");
            Vec::new()
        });

    let has_own_review = match &user {
        Some(user) => reviews::find_user_review(state.backend(), &user.token, product_id)
            .await
            .ok()
            .flatten()
            .is_some(),
        None => false,
    };

    Ok(ProductShowTemplate {
        page: PageContext::load(&session, user.as_ref()).await,
        product: ProductView::from(&product),
        reviews: product_reviews.iter().map(ReviewView::from).collect(),
        average_rating: reviews::average_rating(&product_reviews)
            .map(|avg| format!("{avg:.1}"))
            .unwrap_or_default(),
        has_own_review,
    }
    .into_response())
}
