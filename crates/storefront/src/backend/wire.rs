//! Request and response bodies of the commerce backend that have no
//! counterpart in the core model.

use serde::{Deserialize, Serialize};
use stride_core::cart::{Cart, LineItem};
use stride_core::{Price, ProductId};

// =============================================================================
// Auth
// =============================================================================

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `POST /api/auth/login` response. The user may be flattened or nested.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user: Option<LoginUser>,
}

#[derive(Debug, Deserialize)]
pub struct LoginUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl LoginResponse {
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or_else(|| self.user.as_ref().and_then(|u| u.name.as_deref()))
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or_else(|| self.user.as_ref().and_then(|u| u.email.as_deref()))
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Body of `POST /api/cart/add` and `PUT /api/cart/update`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest<'a> {
    pub product_id: ProductId,
    pub size: Option<&'a str>,
    pub quantity: u32,
}

/// `GET /api/cart` returns either a bare list or an object wrapping one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CartResponse {
    Items(Vec<CartItemResponse>),
    Wrapped {
        #[serde(alias = "cartItems")]
        items: Vec<CartItemResponse>,
    },
}

impl CartResponse {
    /// Convert to the core cart, dropping rows without a product id.
    #[must_use]
    pub fn into_cart(self) -> Cart {
        let items = match self {
            Self::Items(items) | Self::Wrapped { items } => items,
        };
        Cart::new(items.into_iter().filter_map(|item| {
            let line = item.into_line_item();
            if line.is_none() {
                tracing::warn!("Dropping cart row without a product id");
            }
            line
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemResponse {
    #[serde(default)]
    id: Option<ProductId>,
    #[serde(default)]
    product_id: Option<ProductId>,
    #[serde(default)]
    product: Option<CartProduct>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    price: Option<Price>,
    #[serde(default)]
    unit_price: Option<Price>,
    #[serde(default)]
    quantity: u32,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartProduct {
    #[serde(default)]
    id: Option<ProductId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    price: Option<Price>,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

impl CartItemResponse {
    fn into_line_item(self) -> Option<LineItem> {
        let product = self.product;
        let nested = |f: fn(&CartProduct) -> Option<String>| product.as_ref().and_then(f);

        let product_id = self
            .product_id
            .or_else(|| product.as_ref().and_then(|p| p.id))
            .or(self.id)?;
        let name = self
            .name
            .or(self.product_name)
            .or_else(|| nested(|p| p.name.clone()))
            .unwrap_or_else(|| "Product".to_string());
        let unit_price = self
            .price
            .or(self.unit_price)
            .or_else(|| product.as_ref().and_then(|p| p.price))
            .unwrap_or(Price::ZERO);
        let image = self
            .image
            .or(self.image_url)
            .or_else(|| nested(|p| p.images.first().cloned().or_else(|| p.image_url.clone())));
        let color = self.color.or_else(|| nested(|p| p.color.clone()));

        Some(LineItem {
            product_id,
            size: self.size,
            name,
            unit_price,
            quantity: self.quantity,
            image,
            color,
        })
    }
}

// =============================================================================
// Reviews
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    pub rating: u8,
    pub comment: &'a str,
}
