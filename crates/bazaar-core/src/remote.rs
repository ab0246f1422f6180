// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Public catalog endpoint
//
// Optional seeding source: a public product API whose records use `title`
// instead of `name` and a numeric price.

use crate::types::{AppError, Product, ProductId};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Source of products for remote seeding
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn fetch_products(&self) -> Result<Vec<Product>, AppError>;
}

/// Product record as served by the public catalog
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteProduct {
    pub id: ProductId,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub image: String,
}

impl From<RemoteProduct> for Product {
    fn from(remote: RemoteProduct) -> Self {
        Self {
            id: remote.id,
            name: remote.title,
            price: format_price(remote.price),
            description: remote.description,
            category: remote.category,
            image: remote.image,
            is_favorite: false,
        }
    }
}

/// Render a numeric price as display text, e.g. 109.95 -> "$109.95"
pub fn format_price(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// HTTP client for the public catalog endpoint
#[derive(Clone)]
pub struct PublicCatalogClient {
    client: reqwest::Client,
    url: String,
}

impl PublicCatalogClient {
    pub fn new(
        url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RemoteCatalog for PublicCatalogClient {
    async fn fetch_products(&self) -> Result<Vec<Product>, AppError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::CatalogApi {
                status: status.as_u16(),
            });
        }

        let products: Vec<RemoteProduct> = response.json().await?;
        tracing::debug!("Fetched {} products from {}", products.len(), self.url);
        Ok(products.into_iter().map(Product::from).collect())
    }
}
