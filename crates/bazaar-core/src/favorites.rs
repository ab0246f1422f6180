// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Favorites ledger
//
// Bookmarks are stored as display snapshots so they can be listed even
// when the product is gone. Snapshots are not refreshed when the product
// changes.

use crate::catalog::CatalogRepository;
use crate::store::{keys, load_json, save_json, KeyLocks, KeyValueStore};
use crate::types::{AppError, FavoriteEntry, Product, ProductId};
use std::collections::HashSet;
use std::sync::Arc;

/// Raw access to the persisted favorites list, shared with the catalog for
/// favorite flags and delete cascades
#[derive(Clone)]
pub(crate) struct FavoriteRecords {
    store: Arc<dyn KeyValueStore>,
    locks: Arc<KeyLocks>,
}

impl FavoriteRecords {
    pub(crate) fn new(store: Arc<dyn KeyValueStore>, locks: Arc<KeyLocks>) -> Self {
        Self { store, locks }
    }

    async fn load(&self) -> Result<Vec<FavoriteEntry>, AppError> {
        Ok(load_json(self.store.as_ref(), keys::FAVORITES)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, entries: &[FavoriteEntry]) -> Result<(), AppError> {
        save_json(self.store.as_ref(), keys::FAVORITES, entries).await
    }

    pub(crate) async fn entries(&self) -> Vec<FavoriteEntry> {
        self.load().await.unwrap_or_else(|e| {
            tracing::error!("Error getting favorites: {}", e);
            Vec::new()
        })
    }

    pub(crate) async fn ids(&self) -> HashSet<ProductId> {
        self.entries()
            .await
            .into_iter()
            .map(|entry| entry.product_id)
            .collect()
    }

    /// Drop the entry for `product_id`
    pub(crate) async fn try_remove(&self, product_id: ProductId) -> Result<(), AppError> {
        let _guard = self.locks.lock(keys::FAVORITES).await;
        let mut entries = self.load().await?;
        entries.retain(|entry| entry.product_id != product_id);
        self.save(&entries).await
    }

    /// Drop the entry for `product_id`. Failures are logged, not returned.
    pub(crate) async fn remove(&self, product_id: ProductId) {
        if let Err(e) = self.try_remove(product_id).await {
            tracing::error!("Error removing {} from favorites: {}", product_id, e);
        }
    }
}

/// The set of bookmarked products
#[derive(Clone)]
pub struct FavoritesLedger {
    records: FavoriteRecords,
    locks: Arc<KeyLocks>,
    catalog: CatalogRepository,
}

impl FavoritesLedger {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        locks: Arc<KeyLocks>,
        catalog: CatalogRepository,
    ) -> Self {
        Self {
            records: FavoriteRecords::new(store, locks.clone()),
            locks,
            catalog,
        }
    }

    /// Stored snapshots, empty if nothing is stored or the read fails
    pub async fn get_favorites(&self) -> Vec<FavoriteEntry> {
        self.records.entries().await
    }

    pub async fn is_favorite(&self, product_id: ProductId) -> bool {
        self.records.ids().await.contains(&product_id)
    }

    /// Bookmark a product, snapshotting its current name, image and price.
    /// Does nothing if it is already bookmarked or does not exist.
    pub async fn add_to_favorites(&self, product_id: ProductId) {
        let _guard = self.locks.lock(keys::FAVORITES).await;

        let mut entries = match self.records.load().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Error adding {} to favorites: {}", product_id, e);
                return;
            }
        };
        if entries.iter().any(|entry| entry.product_id == product_id) {
            return;
        }

        let Some(product) = self.catalog.get_product_by_id(product_id).await else {
            tracing::debug!("Not bookmarking missing product {}", product_id);
            return;
        };

        entries.push(FavoriteEntry::snapshot(&product));
        if let Err(e) = self.records.save(&entries).await {
            tracing::error!("Error adding {} to favorites: {}", product_id, e);
        }
    }

    /// Remove a bookmark; removing one that does not exist is fine
    pub async fn remove_from_favorites(&self, product_id: ProductId) {
        self.records.remove(product_id).await;
    }

    /// Flip the bookmark for `product_id` and return whether it is now set
    pub async fn toggle_favorite(&self, product_id: ProductId) -> bool {
        let _guard = self.locks.lock(keys::FAVORITES).await;

        let mut entries = match self.records.load().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Error toggling favorite {}: {}", product_id, e);
                return false;
            }
        };

        let was_favorite = entries.iter().any(|entry| entry.product_id == product_id);
        if was_favorite {
            entries.retain(|entry| entry.product_id != product_id);
        } else {
            let Some(product) = self.catalog.get_product_by_id(product_id).await else {
                tracing::debug!("Not bookmarking missing product {}", product_id);
                return false;
            };
            entries.push(FavoriteEntry::snapshot(&product));
        }

        match self.records.save(&entries).await {
            Ok(()) => !was_favorite,
            Err(e) => {
                tracing::error!("Error toggling favorite {}: {}", product_id, e);
                was_favorite
            }
        }
    }

    /// Bookmarked products with live catalog fields rather than snapshots
    pub async fn get_favorite_products(&self) -> Vec<Product> {
        self.catalog
            .get_products()
            .await
            .into_iter()
            .filter(|product| product.is_favorite)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::DefaultCatalog;
    use crate::store::MemoryStore;
    use crate::types::{NewListing, ProductPatch};

    fn lamp() -> Product {
        Product {
            id: 1,
            name: "Lamp".to_string(),
            price: "$12".to_string(),
            description: "Brass desk lamp".to_string(),
            category: None,
            image: "lamp.png".to_string(),
            is_favorite: false,
        }
    }

    fn setup() -> (Arc<MemoryStore>, CatalogRepository, FavoritesLedger) {
        let store = Arc::new(MemoryStore::new());
        let locks = Arc::new(KeyLocks::new());
        let catalog = CatalogRepository::new(
            store.clone(),
            locks.clone(),
            Arc::new(DefaultCatalog::new(Vec::new(), vec![lamp()])),
        );
        let ledger = FavoritesLedger::new(store.clone(), locks, catalog.clone());
        (store, catalog, ledger)
    }

    #[tokio::test]
    async fn test_add_then_remove_round_trip() {
        let (_store, _catalog, ledger) = setup();

        ledger.add_to_favorites(1).await;
        let favorites = ledger.get_favorites().await;
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].product_id, 1);

        ledger.remove_from_favorites(1).await;
        assert!(ledger.get_favorites().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent_and_ignores_missing_products() {
        let (_store, _catalog, ledger) = setup();

        ledger.add_to_favorites(1).await;
        ledger.add_to_favorites(1).await;
        ledger.add_to_favorites(404).await;

        assert_eq!(ledger.get_favorites().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_absent_entry_is_safe() {
        let (store, _catalog, ledger) = setup();
        ledger.remove_from_favorites(3).await;
        assert_eq!(
            store.get(keys::FAVORITES).await.unwrap().as_deref(),
            Some("[]")
        );
    }

    #[tokio::test]
    async fn test_is_favorite_flag_follows_ledger() {
        let (_store, catalog, ledger) = setup();
        assert!(!catalog.get_products().await[0].is_favorite);

        ledger.add_to_favorites(1).await;
        assert!(catalog.get_products().await[0].is_favorite);
        assert!(ledger.is_favorite(1).await);
    }

    #[tokio::test]
    async fn test_snapshot_goes_stale_but_favorite_products_are_live() {
        let (_store, catalog, ledger) = setup();

        ledger.add_to_favorites(1).await;
        catalog
            .update_product(1, ProductPatch::default().name("Lamp v2"))
            .await
            .unwrap();

        assert_eq!(ledger.get_favorites().await[0].name, "Lamp");
        let live = ledger.get_favorite_products().await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].name, "Lamp v2");
    }

    #[tokio::test]
    async fn test_delete_cascades_to_favorites() {
        let (_store, catalog, ledger) = setup();
        let desk = catalog
            .add_product(NewListing {
                name: "Desk".to_string(),
                price: "$50".to_string(),
                description: "Oak".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        ledger.add_to_favorites(desk.id).await;
        ledger.add_to_favorites(1).await;
        assert!(catalog.delete_product(desk.id).await.unwrap());

        assert!(catalog.get_product_by_id(desk.id).await.is_none());
        let favorites = ledger.get_favorite_products().await;
        assert!(favorites.iter().all(|p| p.id != desk.id));
        assert!(ledger
            .get_favorites()
            .await
            .iter()
            .all(|entry| entry.product_id != desk.id));
    }

    #[tokio::test]
    async fn test_toggle_favorite() {
        let (_store, _catalog, ledger) = setup();
        assert!(ledger.toggle_favorite(1).await);
        assert!(!ledger.toggle_favorite(1).await);
        assert!(!ledger.toggle_favorite(77).await);
    }

    #[tokio::test]
    async fn test_concurrent_toggles_do_not_cancel_out() {
        let (_store, _catalog, ledger) = setup();
        let (a, b) = tokio::join!(ledger.toggle_favorite(1), ledger.toggle_favorite(1));

        assert_ne!(a, b);
        assert!(!ledger.is_favorite(1).await);
        assert!(ledger.get_favorites().await.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_reports_unchanged_state_on_write_failure() {
        let (store, _catalog, ledger) = setup();
        ledger.add_to_favorites(1).await;
        store.set_fail_writes_to(keys::FAVORITES, true);

        assert!(ledger.toggle_favorite(1).await);
        assert!(ledger.is_favorite(1).await);
    }

    #[tokio::test]
    async fn test_failed_cascade_fails_the_delete() {
        let (store, catalog, ledger) = setup();
        catalog.initialize().await;
        ledger.add_to_favorites(1).await;
        store.set_fail_writes_to(keys::FAVORITES, true);

        assert!(catalog.delete_product(1).await.is_err());
        assert_eq!(ledger.get_favorites().await[0].product_id, 1);

        // Retrying once the store recovers finishes the cascade
        store.set_fail_writes_to(keys::FAVORITES, false);
        assert!(!catalog.delete_product(1).await.unwrap());
        assert!(ledger.get_favorites().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_failures_are_swallowed() {
        let (store, _catalog, ledger) = setup();
        store.set_fail_writes(true);

        ledger.add_to_favorites(1).await;
        ledger.remove_from_favorites(1).await;

        store.set_fail_writes(false);
        assert!(ledger.get_favorites().await.is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_yields_empty_ledger() {
        let (store, _catalog, ledger) = setup();
        ledger.add_to_favorites(1).await;
        store.set_fail_reads(true);
        assert!(ledger.get_favorites().await.is_empty());
    }
}
