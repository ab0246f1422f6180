// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Catalog repository
//
// Products and categories are reconciled on every read: bundled defaults
// merged with whatever the device has stored. A catalog seeded from the
// remote endpoint skips the bundled products. Nothing is cached between
// calls.

use crate::defaults::DefaultCatalog;
use crate::favorites::FavoriteRecords;
use crate::remote::RemoteCatalog;
use crate::store::{keys, load_json, save_json, KeyLocks, KeyValueStore};
use crate::types::{AppError, Category, NewListing, Product, ProductId, ProductPatch};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Ids of every deleted product; keeps bundled ones from being merged back in
/// and keeps all of them from being reissued
pub const DELETED_PRODUCTS_KEY: &str = "deleted_products";

/// Which seed the stored products came from
pub const CATALOG_SOURCE_KEY: &str = "catalog_source";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    /// Stored products are overrides on top of the bundled defaults
    Bundled,
    /// Stored products are the whole catalog; bundled defaults are ignored
    Remote,
}

/// A product as found in storage. Any field may be missing; present fields
/// override the bundled product with the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProduct {
    pub id: ProductId,
    #[serde(flatten)]
    pub fields: ProductPatch,
}

impl From<&Product> for StoredProduct {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            fields: ProductPatch {
                name: Some(product.name.clone()),
                price: Some(product.price.clone()),
                description: Some(product.description.clone()),
                category: product.category.clone(),
                image: Some(product.image.clone()),
            },
        }
    }
}

/// Merge bundled defaults with stored products.
///
/// Every default appears in order, with the fields of a stored product of
/// the same id laid over it. Stored products matching no default follow in
/// stored order. Duplicate stored ids keep their first occurrence.
/// `is_favorite` is left false.
pub fn reconcile(defaults: &[Product], stored: &[StoredProduct]) -> Vec<Product> {
    let default_ids: HashSet<ProductId> = defaults.iter().map(|p| p.id).collect();

    let mut merged: Vec<Product> = defaults
        .iter()
        .map(|default| {
            let mut product = default.clone();
            product.is_favorite = false;
            if let Some(over) = stored.iter().find(|s| s.id == default.id) {
                over.fields.apply_to(&mut product);
            }
            product
        })
        .collect();

    let mut appended = HashSet::new();
    for record in stored {
        if default_ids.contains(&record.id) || !appended.insert(record.id) {
            continue;
        }
        merged.push(Product::from_patch(record.id, &record.fields));
    }

    merged
}

/// Next listing id: one past the highest id in use or retired, 1 for an empty catalog
fn next_id(products: &[Product], retired: &HashSet<ProductId>) -> Result<ProductId, AppError> {
    products
        .iter()
        .map(|p| p.id)
        .chain(retired.iter().copied())
        .max()
        .map_or(Ok(1), |max| max.checked_add(1).ok_or(AppError::IdExhausted))
}

/// Single source of truth for categories and products
#[derive(Clone)]
pub struct CatalogRepository {
    store: Arc<dyn KeyValueStore>,
    locks: Arc<KeyLocks>,
    defaults: Arc<DefaultCatalog>,
    favorites: FavoriteRecords,
}

impl CatalogRepository {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        locks: Arc<KeyLocks>,
        defaults: Arc<DefaultCatalog>,
    ) -> Self {
        let favorites = FavoriteRecords::new(store.clone(), locks.clone());
        Self {
            store,
            locks,
            defaults,
            favorites,
        }
    }

    pub fn defaults(&self) -> &DefaultCatalog {
        &self.defaults
    }

    /// Seed categories and products from the bundled defaults where nothing is
    /// stored yet. Safe to call on every start.
    pub async fn initialize(&self) {
        if let Err(e) = self
            .seed_if_absent(keys::CATEGORIES, &self.defaults.categories)
            .await
        {
            tracing::error!("Failed to seed categories: {}", e);
        }
        if let Err(e) = self
            .seed_if_absent(keys::PRODUCTS, &self.defaults.products)
            .await
        {
            tracing::error!("Failed to seed products: {}", e);
        }
    }

    async fn seed_if_absent<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &[T],
    ) -> Result<bool, AppError> {
        let _guard = self.locks.lock(key).await;
        if self.store.get(key).await?.is_some() {
            tracing::debug!("{} already stored, not seeding", key);
            return Ok(false);
        }
        save_json(self.store.as_ref(), key, value).await?;
        tracing::info!("Seeded {} with {} bundled entries", key, value.len());
        Ok(true)
    }

    /// Seed products from a remote catalog instead of the bundled list.
    /// Does nothing if products are already stored.
    pub async fn seed_from_remote(&self, source: &dyn RemoteCatalog) -> Result<bool, AppError> {
        let _guard = self.locks.lock(keys::PRODUCTS).await;
        if self.store.get(keys::PRODUCTS).await?.is_some() {
            return Ok(false);
        }

        let products = source.fetch_products().await?;
        save_json(self.store.as_ref(), CATALOG_SOURCE_KEY, &CatalogSource::Remote).await?;
        if let Err(e) = save_json(self.store.as_ref(), keys::PRODUCTS, &products).await {
            if let Err(undo) = self.store.remove(CATALOG_SOURCE_KEY).await {
                tracing::error!("Failed to reset catalog source: {}", undo);
            }
            return Err(e);
        }
        tracing::info!("Seeded products with {} remote entries", products.len());
        Ok(true)
    }

    /// Where the stored products were seeded from
    pub async fn source(&self) -> Result<CatalogSource, AppError> {
        Ok(load_json(self.store.as_ref(), CATALOG_SOURCE_KEY)
            .await?
            .unwrap_or(CatalogSource::Bundled))
    }

    /// Stored categories, or the bundled ones if none are stored
    pub async fn get_categories(&self) -> Vec<Category> {
        match load_json::<Vec<Category>>(self.store.as_ref(), keys::CATEGORIES).await {
            Ok(Some(categories)) => categories,
            Ok(None) => self.defaults.categories.clone(),
            Err(e) => {
                tracing::error!("Error getting categories: {}", e);
                self.defaults.categories.clone()
            }
        }
    }

    /// The reconciled catalog with favorite flags applied
    pub async fn get_products(&self) -> Vec<Product> {
        let products = match self.load_products().await {
            Ok(products) => products,
            Err(e) => {
                tracing::error!("Error getting products: {}", e);
                reconcile(&self.defaults.products, &[])
            }
        };
        self.mark_favorites(products).await
    }

    pub async fn get_product_by_id(&self, id: ProductId) -> Option<Product> {
        self.get_products().await.into_iter().find(|p| p.id == id)
    }

    /// Case-insensitive substring match on the product name.
    /// A blank query returns the whole catalog.
    pub async fn search_products(&self, query: &str) -> Vec<Product> {
        let query = query.trim().to_lowercase();
        let products = self.get_products().await;
        if query.is_empty() {
            return products;
        }
        products
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&query))
            .collect()
    }

    /// Products whose category matches `category`, ignoring case
    pub async fn products_in_category(&self, category: &str) -> Vec<Product> {
        let category = category.trim();
        self.get_products()
            .await
            .into_iter()
            .filter(|p| {
                p.category
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(category))
            })
            .collect()
    }

    /// Create a listing with the next free id and persist the full catalog
    pub async fn add_product(&self, listing: NewListing) -> Result<Product, AppError> {
        let listing = listing.validate()?;

        let _guard = self.locks.lock(keys::PRODUCTS).await;
        let mut products = self.load_products().await?;
        let retired = self.load_retired().await?;
        let id = next_id(&products, &retired)?;

        let product = listing.into_product(id);
        products.push(product.clone());
        self.save_products(&products).await?;

        tracing::info!("Added product {} ({})", id, product.name);
        Ok(product)
    }

    /// Apply `patch` to the product with `id`. Returns `None` if there is no
    /// such product. Favorite snapshots are left as they are.
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>, AppError> {
        let updated = {
            let _guard = self.locks.lock(keys::PRODUCTS).await;
            let mut products = self.load_products().await?;
            let Some(product) = products.iter_mut().find(|p| p.id == id) else {
                tracing::debug!("update_product: no product {}", id);
                return Ok(None);
            };
            patch.apply_to(product);
            let updated = product.clone();
            self.save_products(&products).await?;
            updated
        };

        let favorites = self.favorites.ids().await;
        Ok(Some(Product {
            is_favorite: favorites.contains(&id),
            ..updated
        }))
    }

    /// Remove the product with `id` and its favorite entry.
    /// Returns whether a product was removed. A failed catalog write leaves
    /// the product as it was; a failed favorites write is returned after the
    /// product is gone, and calling again finishes the cascade.
    pub async fn delete_product(&self, id: ProductId) -> Result<bool, AppError> {
        let removed = {
            let _guard = self.locks.lock(keys::PRODUCTS).await;
            let mut products = self.load_products().await?;
            let before = products.len();
            products.retain(|p| p.id != id);
            let removed = products.len() != before;

            if removed {
                // Tombstone before products; rolled back if the products write fails
                let previous = self.load_retired().await?;
                let mut retired = previous.clone();
                retired.insert(id);
                self.save_retired(&retired).await?;

                if let Err(e) = self.save_products(&products).await {
                    if let Err(undo) = self.save_retired(&previous).await {
                        tracing::error!("Failed to restore deleted ids after {}: {}", id, undo);
                    }
                    return Err(e);
                }
                tracing::info!("Deleted product {}", id);
            }
            removed
        };

        self.favorites.try_remove(id).await?;
        Ok(removed)
    }

    /// Reconciled catalog without favorite flags; storage errors propagate
    async fn load_products(&self) -> Result<Vec<Product>, AppError> {
        let stored: Vec<StoredProduct> = load_json(self.store.as_ref(), keys::PRODUCTS)
            .await?
            .unwrap_or_default();
        let retired = self.load_retired().await?;
        let defaults: &[Product] = match self.source().await? {
            CatalogSource::Bundled => &self.defaults.products,
            CatalogSource::Remote => &[],
        };

        let mut products = reconcile(defaults, &stored);
        if !retired.is_empty() {
            products.retain(|p| !retired.contains(&p.id));
        }
        Ok(products)
    }

    async fn load_retired(&self) -> Result<HashSet<ProductId>, AppError> {
        let retired: Option<Vec<ProductId>> =
            load_json(self.store.as_ref(), DELETED_PRODUCTS_KEY).await?;
        Ok(retired.unwrap_or_default().into_iter().collect())
    }

    async fn save_retired(&self, retired: &HashSet<ProductId>) -> Result<(), AppError> {
        let mut ids: Vec<ProductId> = retired.iter().copied().collect();
        ids.sort_unstable();
        save_json(self.store.as_ref(), DELETED_PRODUCTS_KEY, &ids).await
    }

    async fn save_products(&self, products: &[Product]) -> Result<(), AppError> {
        save_json(self.store.as_ref(), keys::PRODUCTS, products).await
    }

    async fn mark_favorites(&self, mut products: Vec<Product>) -> Vec<Product> {
        let favorites = self.favorites.ids().await;
        for product in &mut products {
            product.is_favorite = favorites.contains(&product.id);
        }
        products
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteCatalog;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    fn product(id: ProductId, name: &str, price: &str) -> Product {
        Product {
            id,
            name: name.to_string(),
            price: price.to_string(),
            description: String::new(),
            category: None,
            image: format!("{}.png", name.to_lowercase()),
            is_favorite: false,
        }
    }

    fn lamp_defaults() -> DefaultCatalog {
        DefaultCatalog::new(
            vec![Category {
                id: 1,
                name: "Lighting".to_string(),
                icon: "fa-solid fa-star".to_string(),
            }],
            vec![product(1, "Lamp", "$12")],
        )
    }

    fn repo_with(defaults: DefaultCatalog) -> (Arc<MemoryStore>, CatalogRepository) {
        let store = Arc::new(MemoryStore::new());
        let repo = CatalogRepository::new(
            store.clone(),
            Arc::new(KeyLocks::new()),
            Arc::new(defaults),
        );
        (store, repo)
    }

    fn desk() -> NewListing {
        NewListing {
            name: "Desk".to_string(),
            price: "$50".to_string(),
            description: "Oak desk".to_string(),
            category: Some("Table".to_string()),
            image: None,
        }
    }

    #[test]
    fn test_reconcile_prefers_stored_fields() {
        let defaults = vec![product(1, "Lamp", "$12"), product(2, "Rug", "$30")];
        let stored = vec![StoredProduct {
            id: 2,
            fields: ProductPatch::default().price("$25"),
        }];

        let merged = reconcile(&defaults, &stored);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], defaults[0]);
        assert_eq!(merged[1].price, "$25");
        assert_eq!(merged[1].name, "Rug");
    }

    #[test]
    fn test_reconcile_appends_user_listings_once() {
        let defaults = vec![product(1, "Lamp", "$12")];
        let desk = StoredProduct::from(&product(7, "Desk", "$50"));
        let stored = vec![desk.clone(), desk];

        let merged = reconcile(&defaults, &stored);
        let ids: Vec<_> = merged.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 7]);
        assert_eq!(merged[1].name, "Desk");
    }

    #[test]
    fn test_next_id_floor_and_retired() {
        assert_eq!(next_id(&[], &HashSet::new()).unwrap(), 1);
        let products = vec![product(3, "Lamp", "$12")];
        assert_eq!(next_id(&products, &HashSet::new()).unwrap(), 4);
        assert_eq!(next_id(&products, &HashSet::from([9])).unwrap(), 10);
        assert!(matches!(
            next_id(&[product(u64::MAX, "Max", "$1")], &HashSet::new()),
            Err(AppError::IdExhausted)
        ));
    }

    #[tokio::test]
    async fn test_initialize_seeds_once() {
        let (store, repo) = repo_with(lamp_defaults());
        repo.initialize().await;
        assert!(store.get(keys::PRODUCTS).await.unwrap().is_some());
        assert!(store.get(keys::CATEGORIES).await.unwrap().is_some());

        repo.update_product(1, ProductPatch::default().name("Lamp v2"))
            .await
            .unwrap();
        repo.initialize().await;

        assert_eq!(repo.get_product_by_id(1).await.unwrap().name, "Lamp v2");
    }

    #[tokio::test]
    async fn test_get_categories_stored_list_wins() {
        let (store, repo) = repo_with(lamp_defaults());
        assert_eq!(repo.get_categories().await[0].name, "Lighting");

        let stored = vec![Category {
            id: 5,
            name: "Sofa".to_string(),
            icon: "fa-solid fa-couch".to_string(),
        }];
        save_json(store.as_ref(), keys::CATEGORIES, &stored)
            .await
            .unwrap();
        assert_eq!(repo.get_categories().await, stored);
    }

    #[tokio::test]
    async fn test_add_product_scenario() {
        let (_store, repo) = repo_with(lamp_defaults());
        repo.initialize().await;

        let added = repo.add_product(desk()).await.unwrap();
        assert_eq!(added.id, 2);
        assert_eq!(added.name, "Desk");

        let ids: Vec<_> = repo.get_products().await.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_add_product_to_empty_catalog_starts_at_one() {
        let (_store, repo) = repo_with(DefaultCatalog::default());
        let added = repo.add_product(desk()).await.unwrap();
        assert_eq!(added.id, 1);
    }

    #[tokio::test]
    async fn test_add_product_rejects_invalid_listing() {
        let (store, repo) = repo_with(lamp_defaults());
        let err = repo
            .add_product(NewListing {
                name: "Desk".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidListing(_)));
        assert!(store.get(keys::PRODUCTS).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_adds_get_distinct_ids() {
        let (_store, repo) = repo_with(lamp_defaults());
        let (a, b) = tokio::join!(repo.add_product(desk()), repo.add_product(desk()));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.id, b.id);
        assert_eq!(repo.get_products().await.len(), 3);
    }

    #[tokio::test]
    async fn test_update_missing_product_is_noop() {
        let (store, repo) = repo_with(lamp_defaults());
        let result = repo
            .update_product(42, ProductPatch::default().name("Ghost"))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.get(keys::PRODUCTS).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_default_product_stays_deleted() {
        let (_store, repo) = repo_with(lamp_defaults());
        repo.initialize().await;

        assert!(repo.delete_product(1).await.unwrap());
        assert!(repo.get_product_by_id(1).await.is_none());

        repo.initialize().await;
        assert!(repo.get_products().await.is_empty());

        // Retired id is not handed out again
        let added = repo.add_product(desk()).await.unwrap();
        assert_eq!(added.id, 2);
    }

    #[tokio::test]
    async fn test_deleted_listing_id_is_not_reissued() {
        let (_store, repo) = repo_with(lamp_defaults());
        let desk_id = repo.add_product(desk()).await.unwrap().id;
        assert!(repo.delete_product(desk_id).await.unwrap());

        let next = repo.add_product(desk()).await.unwrap();
        assert_eq!(next.id, desk_id + 1);
    }

    #[tokio::test]
    async fn test_failed_tombstone_write_keeps_local_edit() {
        let (store, repo) = repo_with(lamp_defaults());
        repo.initialize().await;
        repo.update_product(1, ProductPatch::default().price("$99"))
            .await
            .unwrap();
        store.set_fail_writes_to(DELETED_PRODUCTS_KEY, true);

        assert!(repo.delete_product(1).await.is_err());
        assert_eq!(repo.get_product_by_id(1).await.unwrap().price, "$99");
    }

    #[tokio::test]
    async fn test_failed_products_write_restores_tombstones() {
        let (store, repo) = repo_with(lamp_defaults());
        repo.initialize().await;
        repo.update_product(1, ProductPatch::default().price("$99"))
            .await
            .unwrap();
        store.set_fail_writes_to(keys::PRODUCTS, true);

        assert!(repo.delete_product(1).await.is_err());
        assert_eq!(repo.get_product_by_id(1).await.unwrap().price, "$99");
        assert!(repo.load_retired().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_product_reports_false() {
        let (_store, repo) = repo_with(lamp_defaults());
        assert!(!repo.delete_product(99).await.unwrap());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_blank_returns_all() {
        let (_store, repo) = repo_with(lamp_defaults());
        repo.add_product(desk()).await.unwrap();

        let hits = repo.search_products("LAM").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Lamp");

        assert_eq!(repo.search_products("  ").await.len(), 2);
        assert!(repo.search_products("sofa").await.is_empty());
    }

    #[tokio::test]
    async fn test_products_in_category() {
        let (_store, repo) = repo_with(lamp_defaults());
        repo.add_product(desk()).await.unwrap();

        let tables = repo.products_in_category("table").await;
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "Desk");
    }

    #[tokio::test]
    async fn test_read_failure_falls_back_to_defaults() {
        let (store, repo) = repo_with(lamp_defaults());
        repo.add_product(desk()).await.unwrap();
        store.set_fail_reads(true);

        let products = repo.get_products().await;
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Lamp");
        assert_eq!(repo.get_categories().await[0].name, "Lighting");
    }

    #[tokio::test]
    async fn test_mutations_propagate_store_errors() {
        let (store, repo) = repo_with(lamp_defaults());
        store.set_fail_writes(true);

        assert!(repo.add_product(desk()).await.is_err());
        assert!(repo
            .update_product(1, ProductPatch::default().price("$1"))
            .await
            .is_err());
        assert!(repo.delete_product(1).await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_products_do_not_get_overwritten() {
        let (store, repo) = repo_with(lamp_defaults());
        store.set(keys::PRODUCTS, "{oops").await.unwrap();

        assert!(repo.add_product(desk()).await.is_err());
        assert_eq!(
            store.get(keys::PRODUCTS).await.unwrap().as_deref(),
            Some("{oops")
        );
    }

    struct FixedCatalog(Vec<Product>);

    #[async_trait]
    impl RemoteCatalog for FixedCatalog {
        async fn fetch_products(&self) -> Result<Vec<Product>, AppError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_seed_from_remote_only_when_absent() {
        let (_store, repo) = repo_with(DefaultCatalog::default());
        let remote = FixedCatalog(vec![product(20, "Backpack", "$109.95")]);

        assert!(repo.seed_from_remote(&remote).await.unwrap());
        assert!(!repo.seed_from_remote(&remote).await.unwrap());
        assert_eq!(repo.get_product_by_id(20).await.unwrap().name, "Backpack");
        assert_eq!(repo.source().await.unwrap(), CatalogSource::Remote);
    }

    #[tokio::test]
    async fn test_remote_seed_replaces_bundled_products() {
        let lamp = Product {
            category: Some("Lighting".to_string()),
            ..product(1, "Lamp", "$12")
        };
        let (_store, repo) = repo_with(DefaultCatalog::new(
            Vec::new(),
            vec![lamp, product(2, "Rug", "$30")],
        ));
        let remote = FixedCatalog(vec![
            product(1, "Backpack", "$109.95"),
            product(20, "Jacket", "$55.99"),
        ]);

        assert!(repo.seed_from_remote(&remote).await.unwrap());
        repo.initialize().await;

        let products = repo.get_products().await;
        let names: Vec<_> = products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Backpack", "Jacket"]);
        assert_eq!(products[0].category, None);

        // Deleting and adding work against the remote list alone
        assert!(repo.delete_product(1).await.unwrap());
        assert_eq!(repo.add_product(desk()).await.unwrap().id, 21);
        assert_eq!(repo.get_products().await.len(), 2);
    }

    #[tokio::test]
    async fn test_bundled_seed_is_the_default_source() {
        let (_store, repo) = repo_with(lamp_defaults());
        repo.initialize().await;
        assert_eq!(repo.source().await.unwrap(), CatalogSource::Bundled);
    }
}
