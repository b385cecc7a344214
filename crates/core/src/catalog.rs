//! Products as the backend describes them.

use serde::{Deserialize, Serialize};

use crate::checkout::PLACEHOLDER_IMAGE;
use crate::types::{Price, ProductId};

/// A product from `GET /api/products/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, alias = "imageUrl")]
    pub image: Option<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl Product {
    /// First image, falling back to the single image field and then to a
    /// placeholder.
    #[must_use]
    pub fn primary_image(&self) -> &str {
        self.images
            .iter()
            .chain(self.image.iter())
            .map(String::as_str)
            .find(|url| !url.trim().is_empty())
            .unwrap_or(PLACEHOLDER_IMAGE)
    }

    /// Whether the shopper has to pick a size before adding to cart.
    #[must_use]
    pub fn has_sizes(&self) -> bool {
        !self.sizes.is_empty()
    }

    /// Whether `size` is one of the offered sizes.
    #[must_use]
    pub fn offers_size(&self, size: &str) -> bool {
        self.sizes.iter().any(|s| s == size.trim())
    }
}
