//! Commerce backend REST client.
//!
//! Every authenticated call carries `Authorization: Bearer <token>`.
//! Products are cached for 5 minutes using `moka`.

mod error;
mod shopper;
pub mod wire;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use stride_core::cart::Cart;
use stride_core::catalog::Product;
use stride_core::checkout::{CreatedOrder, OrderGateway, OrderPayload};
use stride_core::orders::{OrderHistorySource, OrderRecord};
use stride_core::reviews::{Review, ReviewDraft, ReviewGateway};
use stride_core::{BearerToken, Email, OrderId, ProductId, RemoteError, ReviewId};

use crate::config::BackendConfig;

pub use error::{BackendError, error_message};
pub use shopper::ShopperClient;
use wire::{CartLineRequest, CartResponse, LoginRequest, LoginResponse, ReviewRequest};

/// Longest body excerpt written to the logs.
const LOG_BODY_CHARS: usize = 500;

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the commerce backend.
///
/// Cheap to clone; clones share the connection pool and product cache.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    products: Cache<ProductId, Product>,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        let products = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.base_url.clone(),
                products,
            }),
        })
    }

    /// Bind this client to a shopper's credential.
    #[must_use]
    pub fn for_shopper(&self, token: BearerToken) -> ShopperClient {
        ShopperClient::new(self.clone(), token)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&BearerToken>,
    ) -> Result<RequestBuilder, BackendError> {
        let url = self.inner.base_url.join(path)?;
        let request = self.inner.client.request(method, url);
        Ok(match token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        })
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let excerpt = body.chars().take(LOG_BODY_CHARS).collect::<String>();
            if status.is_server_error() {
                tracing::error!(status = %status, body = %excerpt, "Backend returned server error");
            } else {
                tracing::warn!(status = %status, body = %excerpt, "Backend rejected request");
            }
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(LOG_BODY_CHARS).collect::<String>(),
                "Failed to parse backend response"
            );
            BackendError::Parse(e.to_string())
        })
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns error if the backend rejects the credentials.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<LoginResponse, BackendError> {
        let body = LoginRequest {
            email: email.as_str(),
            password: password.expose_secret(),
        };
        let request = self.request(Method::POST, "api/auth/login", None)?.json(&body);
        self.send_json(request).await
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Fetch the shopper's cart.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn get_cart(&self, token: &BearerToken) -> Result<Cart, BackendError> {
        let request = self.request(Method::GET, "api/cart", Some(token))?;
        let response: CartResponse = self.send_json(request).await?;
        let cart = response.into_cart();
        debug!(lines = cart.len(), "Fetched cart");
        Ok(cart)
    }

    /// Add `quantity` of a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn add_to_cart(
        &self,
        token: &BearerToken,
        product_id: ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<(), BackendError> {
        let body = CartLineRequest {
            product_id,
            size,
            quantity,
        };
        let request = self
            .request(Method::POST, "api/cart/add", Some(token))?
            .json(&body);
        self.send(request).await.map(drop)
    }

    /// Set the quantity of a cart line.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn update_quantity(
        &self,
        token: &BearerToken,
        product_id: ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<(), BackendError> {
        let body = CartLineRequest {
            product_id,
            size,
            quantity,
        };
        let request = self
            .request(Method::PUT, "api/cart/update", Some(token))?
            .json(&body);
        self.send(request).await.map(drop)
    }

    /// Remove a cart line.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn remove_from_cart(
        &self,
        token: &BearerToken,
        product_id: ProductId,
        size: Option<&str>,
    ) -> Result<(), BackendError> {
        let mut request = self
            .request(Method::DELETE, "api/cart/remove", Some(token))?
            .query(&[("productId", product_id.to_string())]);
        if let Some(size) = size {
            request = request.query(&[("size", size)]);
        }
        self.send(request).await.map(drop)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Get a product by id. Cached for 5 minutes.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn product(&self, product_id: ProductId) -> Result<Product, BackendError> {
        if let Some(product) = self.inner.products.get(&product_id).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let path = format!("api/products/{product_id}");
        let product: Product = self
            .send_json(self.request(Method::GET, &path, None)?)
            .await?;

        self.inner.products.insert(product_id, product.clone()).await;
        Ok(product)
    }

    // =========================================================================
    // Reviews
    // =========================================================================

    /// Public reviews of a product.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self))]
    pub async fn product_reviews(&self, product_id: ProductId) -> Result<Vec<Review>, BackendError> {
        let path = format!("api/reviews/product/{product_id}");
        self.send_json(self.request(Method::GET, &path, None)?).await
    }

    /// The shopper's review of a product. 404 when there is none.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn user_review(
        &self,
        token: &BearerToken,
        product_id: ProductId,
    ) -> Result<Review, BackendError> {
        let path = format!("api/reviews/user/product/{product_id}");
        self.send_json(self.request(Method::GET, &path, Some(token))?)
            .await
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token, draft))]
    pub async fn create_review(
        &self,
        token: &BearerToken,
        product_id: ProductId,
        draft: &ReviewDraft,
    ) -> Result<(), BackendError> {
        let body = ReviewRequest {
            product_id: Some(product_id),
            rating: draft.rating,
            comment: &draft.comment,
        };
        let request = self
            .request(Method::POST, "api/reviews", Some(token))?
            .json(&body);
        self.send(request).await.map(drop)
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token, draft))]
    pub async fn update_review(
        &self,
        token: &BearerToken,
        review_id: ReviewId,
        draft: &ReviewDraft,
    ) -> Result<(), BackendError> {
        let body = ReviewRequest {
            product_id: None,
            rating: draft.rating,
            comment: &draft.comment,
        };
        let path = format!("api/reviews/{review_id}");
        let request = self.request(Method::PUT, &path, Some(token))?.json(&body);
        self.send(request).await.map(drop)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Submit an order. An empty success body yields a default [`CreatedOrder`].
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip_all, fields(lines = payload.items.len()))]
    pub async fn create_order(
        &self,
        token: &BearerToken,
        payload: &OrderPayload,
    ) -> Result<CreatedOrder, BackendError> {
        let request = self
            .request(Method::POST, "api/orders/create", Some(token))?
            .json(payload);
        let body = self.send(request).await?;
        if body.trim().is_empty() {
            return Ok(CreatedOrder::default());
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Parse(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn user_orders(&self, token: &BearerToken) -> Result<Vec<OrderRecord>, BackendError> {
        self.send_json(self.request(Method::GET, "api/orders/user", Some(token))?)
            .await
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn order_details(
        &self,
        token: &BearerToken,
        order_id: OrderId,
    ) -> Result<OrderRecord, BackendError> {
        let path = format!("api/orders/{order_id}");
        self.send_json(self.request(Method::GET, &path, Some(token))?)
            .await
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, token))]
    pub async fn mark_received(
        &self,
        token: &BearerToken,
        order_id: OrderId,
    ) -> Result<(), BackendError> {
        let path = format!("api/orders/{order_id}/mark-received");
        let request = self
            .request(Method::PUT, &path, Some(token))?
            .json(&serde_json::json!({}));
        self.send(request).await.map(drop)
    }
}

// =============================================================================
// Core collaborator implementations
// =============================================================================

#[async_trait]
impl OrderGateway for BackendClient {
    async fn create_order(
        &self,
        token: &BearerToken,
        payload: &OrderPayload,
    ) -> Result<CreatedOrder, RemoteError> {
        Ok(Self::create_order(self, token, payload).await?)
    }
}

#[async_trait]
impl OrderHistorySource for BackendClient {
    async fn fetch_user_orders(&self, token: &BearerToken) -> Result<Vec<OrderRecord>, RemoteError> {
        Ok(self.user_orders(token).await?)
    }

    async fn fetch_order_details(
        &self,
        token: &BearerToken,
        order_id: OrderId,
    ) -> Result<OrderRecord, RemoteError> {
        Ok(self.order_details(token, order_id).await?)
    }

    async fn mark_order_received(
        &self,
        token: &BearerToken,
        order_id: OrderId,
    ) -> Result<(), RemoteError> {
        Ok(self.mark_received(token, order_id).await?)
    }
}

#[async_trait]
impl ReviewGateway for BackendClient {
    async fn fetch_product_reviews(&self, product_id: ProductId) -> Result<Vec<Review>, RemoteError> {
        Ok(self.product_reviews(product_id).await?)
    }

    async fn fetch_user_review(
        &self,
        token: &BearerToken,
        product_id: ProductId,
    ) -> Result<Review, RemoteError> {
        Ok(self.user_review(token, product_id).await?)
    }

    async fn create_review(
        &self,
        token: &BearerToken,
        product_id: ProductId,
        draft: &ReviewDraft,
    ) -> Result<(), RemoteError> {
        Ok(Self::create_review(self, token, product_id, draft).await?)
    }

    async fn update_review(
        &self,
        token: &BearerToken,
        review_id: ReviewId,
        draft: &ReviewDraft,
    ) -> Result<(), RemoteError> {
        Ok(Self::update_review(self, token, review_id, draft).await?)
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use stride_core::OrderStatus;
    use stride_core::cart::LineItem;
    use stride_core::checkout::{PaymentMethod, ShippingInfo, place_order};
    use stride_core::orders::{OrderHistoryError, load_orders};
    use stride_core::reviews::find_user_review;

    use super::*;

    fn token() -> BearerToken {
        BearerToken::new("jwt-123").unwrap()
    }

    pub(super) fn line_item(id: i64, size: Option<&str>, quantity: u32) -> LineItem {
        LineItem {
            product_id: ProductId::new(id),
            size: size.map(ToString::to_string),
            name: format!("Shoe {id}"),
            unit_price: stride_core::Price::from_centavos(250_000),
            quantity,
            image: None,
            color: None,
        }
    }

    #[tokio::test]
    async fn test_get_cart_sends_bearer_token() {
        let router = Router::new().route(
            "/api/cart",
            get(|headers: HeaderMap| async move {
                let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
                if auth != Some("Bearer jwt-123") {
                    return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({}))).into_response();
                }
                Json(serde_json::json!({
                    "items": [
                        {"productId": 1, "name": "Court Classic", "price": 2500, "quantity": 2, "size": "42"}
                    ]
                }))
                .into_response()
            }),
        );
        let client = test_server::spawn(router).await;

        let cart = client.get_cart(&token()).await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.unit_count(), 2);

        let anonymous = BearerToken::new("other").unwrap();
        let err = client.get_cart(&anonymous).await.unwrap_err();
        assert_eq!(RemoteError::from(err), RemoteError::SessionExpired);
    }

    #[tokio::test]
    async fn test_product_is_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/products/{id}",
            get(move |Path(id): Path<i64>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({"id": id, "name": "Trail Runner", "price": 4599.5}))
                }
            }),
        );
        let client = test_server::spawn(router).await;

        let first = client.product(ProductId::new(7)).await.unwrap();
        let second = client.product(ProductId::new(7)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_user_review_is_none() {
        let router = Router::new().route(
            "/api/reviews/user/product/{id}",
            get(|| async { (StatusCode::NOT_FOUND, "No review found") }),
        );
        let client = test_server::spawn(router).await;

        let review = find_user_review(&client, &token(), ProductId::new(3)).await.unwrap();
        assert!(review.is_none());
    }

    #[tokio::test]
    async fn test_order_rejection_message_reaches_checkout() {
        let router = Router::new().route(
            "/api/orders/create",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"message": "Out of stock"})),
                )
            }),
        );
        let client = test_server::spawn(router).await;
        let item = line_item(1, Some("42"), 1);
        let shipping = ShippingInfo {
            first_name: "Juan".into(),
            last_name: "Dela Cruz".into(),
            email: "juan@example.ph".into(),
            phone: "09171234567".into(),
            address: "123 Rizal St".into(),
            city: "Makati".into(),
            province: "Metro Manila".into(),
            postal_code: "1200".into(),
        };

        let err = place_order(&client, Some(&token()), &shipping, PaymentMethod::Cod, &[&item])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to place order: Out of stock");
    }

    #[tokio::test]
    async fn test_orders_and_mark_received() {
        let router = Router::new()
            .route(
                "/api/orders/user",
                get(|| async {
                    Json(serde_json::json!([
                        {"id": 9, "orderNumber": "ORD-9", "status": "DELIVERED", "totalAmount": 2500,
                         "orderItems": [{"productId": 1, "productName": "Court Classic", "quantity": 1,
                                         "unitPrice": 2500, "totalPrice": 2500}]}
                    ]))
                }),
            )
            .route(
                "/api/orders/{id}/mark-received",
                put(|Path(id): Path<i64>| async move {
                    if id == 9 {
                        StatusCode::OK
                    } else {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                }),
            );
        let client = test_server::spawn(router).await;

        let orders = load_orders(&client, Some(&token())).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Delivered);

        client.mark_received(&token(), OrderId::new(9)).await.unwrap();
        assert!(client.mark_received(&token(), OrderId::new(10)).await.is_err());
    }

    #[tokio::test]
    async fn test_expired_token_on_orders() {
        let router = Router::new().route(
            "/api/orders/user",
            get(|| async { StatusCode::UNAUTHORIZED }),
        );
        let client = test_server::spawn(router).await;

        let err = load_orders(&client, Some(&token())).await.unwrap_err();
        assert!(matches!(err, OrderHistoryError::SessionExpired));
    }

    #[tokio::test]
    async fn test_login_reads_nested_user() {
        let router = Router::new().route(
            "/api/auth/login",
            post(|Json(body): Json<serde_json::Value>| async move {
                if body["password"] == "secret" {
                    Json(serde_json::json!({
                        "token": "jwt-123",
                        "user": {"name": "Juan", "email": body["email"]}
                    }))
                    .into_response()
                } else {
                    (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response()
                }
            }),
        );
        let client = test_server::spawn(router).await;
        let email = Email::parse("juan@example.ph").unwrap();

        let response = client
            .login(&email, &SecretString::from("secret"))
            .await
            .unwrap();
        assert_eq!(response.token, "jwt-123");
        assert_eq!(response.display_name(), Some("Juan"));

        let err = client
            .login(&email, &SecretString::from("wrong"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::Status { status: 401, message: Some(ref m) } if m == "Invalid credentials"
        ));
    }
}
