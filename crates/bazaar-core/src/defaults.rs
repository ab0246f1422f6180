// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Bundled default catalog
//
// Shipped with the app and used for first-run seeding and as the
// "factory" side of the product merge.

use crate::types::{AppError, Category, Product};

const CATEGORIES_JSON: &str = include_str!("../assets/categories.json");
const PRODUCTS_JSON: &str = include_str!("../assets/products.json");

/// Factory categories and products
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultCatalog {
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
}

impl DefaultCatalog {
    pub fn new(categories: Vec<Category>, products: Vec<Product>) -> Self {
        Self {
            categories,
            products,
        }
    }

    /// Parse the documents compiled into the crate
    pub fn bundled() -> Result<Self, AppError> {
        Self::from_json(CATEGORIES_JSON, PRODUCTS_JSON)
    }

    pub fn from_json(categories: &str, products: &str) -> Result<Self, AppError> {
        let categories: Vec<Category> = serde_json::from_str(categories).map_err(|e| {
            AppError::Serialization(format!("Failed to parse bundled categories: {}", e))
        })?;
        let products: Vec<Product> = serde_json::from_str(products).map_err(|e| {
            AppError::Serialization(format!("Failed to parse bundled products: {}", e))
        })?;
        Ok(Self::new(categories, products))
    }
}
