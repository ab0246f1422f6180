// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Type definitions

use serde::{Deserialize, Serialize};

/// Identifier of a product listing
pub type ProductId = u64;

/// Image shown for listings created without a photo
pub const PLACEHOLDER_IMAGE: &str = "@/assets/images/splash.png";

/// Icons the UI knows how to draw; anything else falls back to the first one
const KNOWN_ICONS: [&str; 5] = ["star", "chair", "table", "bed", "couch"];

/// Product category shown on the home screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    /// Icon class as shipped, e.g. "fa-solid fa-bed"
    pub icon: String,
}

impl Category {
    /// Reduce the icon class to a bare icon key ("fa-solid fa-bed" -> "bed")
    pub fn icon_key(&self) -> &'static str {
        let last = self.icon.split_whitespace().last().unwrap_or_default();
        let name = last.strip_prefix("fa-").unwrap_or(last).to_lowercase();
        KNOWN_ICONS
            .iter()
            .find(|known| **known == name)
            .copied()
            .unwrap_or(KNOWN_ICONS[0])
    }
}

/// A product listing as seen by the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Currency-formatted text, never parsed
    pub price: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// URI or bundled asset identifier
    #[serde(default)]
    pub image: String,
    /// Computed from the favorites ledger at read time, never persisted
    #[serde(default, skip_serializing)]
    pub is_favorite: bool,
}

impl Product {
    /// Build a product from a stored record that has no bundled counterpart.
    /// Missing text fields become empty strings.
    pub(crate) fn from_patch(id: ProductId, patch: &ProductPatch) -> Self {
        let mut product = Self {
            id,
            name: String::new(),
            price: String::new(),
            description: String::new(),
            category: None,
            image: String::new(),
            is_favorite: false,
        };
        patch.apply_to(&mut product);
        product
    }
}

/// Partial product fields; every present field replaces the whole target field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ProductPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Shallow merge into `product`. The id and favorite flag are never touched.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(price) = &self.price {
            product.price = price.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(category) = &self.category {
            product.category = Some(category.clone());
        }
        if let Some(image) = &self.image {
            product.image = image.clone();
        }
    }
}

/// User input for a new listing, before an id is assigned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub name: String,
    pub price: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl NewListing {
    /// Check required fields and normalize whitespace.
    ///
    /// Title, price and description must be non-blank. A blank category is
    /// dropped and a missing image becomes [`PLACEHOLDER_IMAGE`].
    pub fn validate(self) -> Result<Self, AppError> {
        let name = self.name.trim().to_string();
        let price = self.price.trim().to_string();
        let description = self.description.trim().to_string();

        let mut missing = Vec::new();
        if name.is_empty() {
            missing.push("name");
        }
        if price.is_empty() {
            missing.push("price");
        }
        if description.is_empty() {
            missing.push("description");
        }
        if !missing.is_empty() {
            return Err(AppError::InvalidListing(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let image = self
            .image
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .or_else(|| Some(PLACEHOLDER_IMAGE.to_string()));

        Ok(Self {
            name,
            price,
            description,
            category,
            image,
        })
    }

    pub(crate) fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
            description: self.description,
            category: self.category,
            image: self.image.unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            is_favorite: false,
        }
    }
}

/// Bookmarked product with display fields copied at bookmark time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteEntry {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub price: String,
}

impl FavoriteEntry {
    pub fn snapshot(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            image: product.image.clone(),
            price: product.price.clone(),
        }
    }
}

/// The signed-in user; at most one is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    #[serde(default)]
    pub is_authenticated: bool,
}

/// Error types for the marketplace data layer
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("File I/O error: {0}")]
    FileIo(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid listing: {0}")]
    InvalidListing(String),

    #[error("No product ids left to assign")]
    IdExhausted,

    #[error("Identity provider returned HTTP {status}")]
    IdentityApi { status: u16 },

    #[error("Catalog endpoint returned HTTP {status}")]
    CatalogApi { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileIo(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}
