//! Product reviews.
//!
//! A shopper has at most one review per product. The form edits that review
//! when it exists and creates one otherwise.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::remote::RemoteError;
use crate::types::{BearerToken, ProductId, ReviewId, UserId};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// A published review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
}

impl Review {
    /// Reviewer name for display.
    #[must_use]
    pub fn author(&self) -> &str {
        self.user_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Anonymous")
    }

    #[must_use]
    pub fn formatted_date(&self) -> Option<String> {
        self.created_at.map(|d| d.format("%B %-d, %Y").to_string())
    }
}

/// Review form input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub rating: u8,
    pub comment: String,
}

impl Default for ReviewDraft {
    fn default() -> Self {
        Self {
            rating: MAX_RATING,
            comment: String::new(),
        }
    }
}

impl ReviewDraft {
    /// Start from the shopper's existing review, if any.
    #[must_use]
    pub fn for_existing(existing: Option<&Review>) -> Self {
        existing.map_or_else(Self::default, |review| Self {
            rating: review.rating.clamp(MIN_RATING, MAX_RATING),
            comment: review.comment.clone(),
        })
    }

    /// # Errors
    ///
    /// [`ReviewError::EmptyComment`] or [`ReviewError::InvalidRating`].
    pub fn validate(&self) -> Result<(), ReviewError> {
        if self.comment.trim().is_empty() {
            return Err(ReviewError::EmptyComment);
        }
        if !(MIN_RATING..=MAX_RATING).contains(&self.rating) {
            return Err(ReviewError::InvalidRating(self.rating));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Please write a comment")]
    EmptyComment,

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("Please log in to submit a review")]
    Unauthenticated,

    #[error("{}", rejected_message(.editing, .source))]
    Rejected { editing: bool, source: RemoteError },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn rejected_message(editing: &bool, error: &RemoteError) -> String {
    match error.backend_message() {
        Some(message) => message.to_string(),
        None if *editing => "Failed to update review. Please try again.".to_string(),
        None => "Failed to submit review. Please try again.".to_string(),
    }
}

/// Whether a submission created or edited the review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewSubmission {
    Created,
    Updated,
}

/// Review endpoints of the commerce backend.
#[async_trait]
pub trait ReviewGateway: Send + Sync {
    /// Public reviews of a product.
    async fn fetch_product_reviews(&self, product_id: ProductId) -> Result<Vec<Review>, RemoteError>;

    /// The shopper's own review; [`RemoteError::NotFound`] when there is none.
    async fn fetch_user_review(
        &self,
        token: &BearerToken,
        product_id: ProductId,
    ) -> Result<Review, RemoteError>;

    async fn create_review(
        &self,
        token: &BearerToken,
        product_id: ProductId,
        draft: &ReviewDraft,
    ) -> Result<(), RemoteError>;

    async fn update_review(
        &self,
        token: &BearerToken,
        review_id: ReviewId,
        draft: &ReviewDraft,
    ) -> Result<(), RemoteError>;
}

/// The shopper's review of `product_id`, `None` if they have not written one.
///
/// # Errors
///
/// Any failure other than "not found".
pub async fn find_user_review<G>(
    gateway: &G,
    token: &BearerToken,
    product_id: ProductId,
) -> Result<Option<Review>, RemoteError>
where
    G: ReviewGateway + ?Sized,
{
    match gateway.fetch_user_review(token, product_id).await {
        Ok(review) => Ok(Some(review)),
        Err(RemoteError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Create or update the shopper's review.
///
/// Validation happens before the credential check; neither makes a call.
///
/// # Errors
///
/// Validation errors, [`ReviewError::Unauthenticated`], or
/// [`ReviewError::Rejected`].
#[instrument(skip(gateway, token, existing, draft), fields(rating = draft.rating))]
pub async fn submit_review<G>(
    gateway: &G,
    token: Option<&BearerToken>,
    product_id: ProductId,
    existing: Option<&Review>,
    draft: &ReviewDraft,
) -> Result<ReviewSubmission, ReviewError>
where
    G: ReviewGateway + ?Sized,
{
    draft.validate()?;
    let token = token.ok_or(ReviewError::Unauthenticated)?;
    let draft = ReviewDraft {
        rating: draft.rating,
        comment: draft.comment.trim().to_string(),
    };

    let (result, submission) = match existing {
        Some(review) => (
            gateway.update_review(token, review.id, &draft).await,
            ReviewSubmission::Updated,
        ),
        None => (
            gateway.create_review(token, product_id, &draft).await,
            ReviewSubmission::Created,
        ),
    };

    match result {
        Ok(()) => {
            info!(?submission, "Review saved");
            Ok(submission)
        }
        Err(source) => {
            error!(error = %source, "Error submitting review");
            Err(ReviewError::Rejected {
                editing: submission == ReviewSubmission::Updated,
                source,
            })
        }
    }
}

/// Mean rating to one decimal, `None` without reviews.
#[must_use]
pub fn average_rating(reviews: &[Review]) -> Option<f64> {
    let count = u32::try_from(reviews.len()).ok().filter(|n| *n > 0)?;
    let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    let mean = f64::from(sum) / f64::from(count);
    Some((mean * 10.0).round() / 10.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct FakeGateway {
        calls: Mutex<Vec<&'static str>>,
        fail_with: Option<RemoteError>,
    }

    impl FakeGateway {
        fn record(&self, call: &'static str) -> Result<(), RemoteError> {
            self.calls.lock().unwrap().push(call);
            self.fail_with.clone().map_or(Ok(()), Err)
        }
    }

    #[async_trait]
    impl ReviewGateway for FakeGateway {
        async fn fetch_product_reviews(&self, _product_id: ProductId) -> Result<Vec<Review>, RemoteError> {
            Ok(vec![])
        }

        async fn fetch_user_review(
            &self,
            _token: &BearerToken,
            product_id: ProductId,
        ) -> Result<Review, RemoteError> {
            if product_id.as_i64() == 1 {
                Ok(review(10, 4))
            } else {
                Err(RemoteError::NotFound)
            }
        }

        async fn create_review(
            &self,
            _token: &BearerToken,
            _product_id: ProductId,
            _draft: &ReviewDraft,
        ) -> Result<(), RemoteError> {
            self.record("create")
        }

        async fn update_review(
            &self,
            _token: &BearerToken,
            _review_id: ReviewId,
            _draft: &ReviewDraft,
        ) -> Result<(), RemoteError> {
            self.record("update")
        }
    }

    fn review(id: i64, rating: u8) -> Review {
        Review {
            id: ReviewId::new(id),
            rating,
            comment: "Comfortable".into(),
            created_at: None,
            user_name: None,
            user_id: None,
            product_id: Some(ProductId::new(1)),
        }
    }

    fn token() -> BearerToken {
        BearerToken::new("jwt").unwrap()
    }

    fn draft(comment: &str) -> ReviewDraft {
        ReviewDraft {
            rating: 4,
            comment: comment.into(),
        }
    }

    #[tokio::test]
    async fn test_blank_comment_makes_no_call() {
        let gateway = FakeGateway::default();
        let err = submit_review(&gateway, Some(&token()), ProductId::new(1), None, &draft("  "))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please write a comment");
        assert!(gateway.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_token() {
        let gateway = FakeGateway::default();
        let err = submit_review(&gateway, None, ProductId::new(1), None, &draft("Great"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please log in to submit a review");
    }

    #[tokio::test]
    async fn test_create_versus_update() {
        let gateway = FakeGateway::default();
        let existing = review(10, 3);

        let created = submit_review(&gateway, Some(&token()), ProductId::new(2), None, &draft("Nice"))
            .await
            .unwrap();
        let updated = submit_review(
            &gateway,
            Some(&token()),
            ProductId::new(1),
            Some(&existing),
            &draft("Even better"),
        )
        .await
        .unwrap();

        assert_eq!(created, ReviewSubmission::Created);
        assert_eq!(updated, ReviewSubmission::Updated);
        assert_eq!(*gateway.calls.lock().unwrap(), vec!["create", "update"]);
    }

    #[tokio::test]
    async fn test_failure_messages() {
        let gateway = FakeGateway {
            fail_with: Some(RemoteError::Network("reset".into())),
            ..FakeGateway::default()
        };
        let err = submit_review(&gateway, Some(&token()), ProductId::new(2), None, &draft("Nice"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to submit review. Please try again.");

        let existing = review(10, 3);
        let err = submit_review(
            &gateway,
            Some(&token()),
            ProductId::new(1),
            Some(&existing),
            &draft("Nice"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Failed to update review. Please try again.");

        let gateway = FakeGateway {
            fail_with: Some(RemoteError::rejected(400, "Failed to add review: already reviewed")),
            ..FakeGateway::default()
        };
        let err = submit_review(&gateway, Some(&token()), ProductId::new(2), None, &draft("Nice"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to add review: already reviewed");
    }

    #[tokio::test]
    async fn test_find_user_review_maps_not_found() {
        let gateway = FakeGateway::default();
        let found = find_user_review(&gateway, &token(), ProductId::new(1)).await.unwrap();
        assert_eq!(found.unwrap().rating, 4);
        let missing = find_user_review(&gateway, &token(), ProductId::new(2)).await.unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_draft_defaults_and_rating_bounds() {
        assert_eq!(ReviewDraft::default().rating, 5);
        assert_eq!(ReviewDraft::for_existing(Some(&review(1, 2))).rating, 2);

        let mut d = draft("ok");
        d.rating = 0;
        assert!(matches!(d.validate(), Err(ReviewError::InvalidRating(0))));
        d.rating = 6;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_average_rating() {
        assert_eq!(average_rating(&[]), None);
        assert_eq!(average_rating(&[review(1, 5), review(2, 4), review(3, 4)]), Some(4.3));
    }
}
