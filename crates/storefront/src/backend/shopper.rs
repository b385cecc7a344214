//! Backend handle bound to one signed-in shopper.

use async_trait::async_trait;
use stride_core::cart::{Cart, CartStore};
use stride_core::catalog::Product;
use stride_core::orders::ReorderSink;
use stride_core::{BearerToken, ProductId, RemoteError};

use super::{BackendClient, BackendError};

/// A [`BackendClient`] carrying the shopper's bearer token.
#[derive(Clone)]
pub struct ShopperClient {
    client: BackendClient,
    token: BearerToken,
}

impl ShopperClient {
    pub(super) const fn new(client: BackendClient, token: BearerToken) -> Self {
        Self { client, token }
    }

    #[must_use]
    pub const fn token(&self) -> &BearerToken {
        &self.token
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn cart(&self) -> Result<Cart, BackendError> {
        self.client.get_cart(&self.token).await
    }

    /// # Errors
    ///
    /// Returns error if the API request fails.
    pub async fn add_to_cart(
        &self,
        product_id: ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<(), BackendError> {
        self.client
            .add_to_cart(&self.token, product_id, size, quantity)
            .await
    }
}

#[async_trait]
impl CartStore for ShopperClient {
    async fn update_quantity(
        &self,
        product_id: ProductId,
        quantity: u32,
        size: Option<&str>,
    ) -> Result<(), RemoteError> {
        Ok(self
            .client
            .update_quantity(&self.token, product_id, size, quantity)
            .await?)
    }

    async fn remove_from_cart(
        &self,
        product_id: ProductId,
        size: Option<&str>,
    ) -> Result<(), RemoteError> {
        Ok(self
            .client
            .remove_from_cart(&self.token, product_id, size)
            .await?)
    }
}

#[async_trait]
impl ReorderSink for ShopperClient {
    async fn fetch_product(&self, product_id: ProductId) -> Result<Product, RemoteError> {
        Ok(self.client.product(product_id).await?)
    }

    async fn add_to_cart(
        &self,
        product: &Product,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        Ok(Self::add_to_cart(self, product.id, size, quantity).await?)
    }
}
