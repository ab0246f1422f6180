// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Service container
//
// Built once at startup and handed to the UI layer. All services share one
// store handle and one set of per-key locks.

use crate::catalog::CatalogRepository;
use crate::config::{AppConfig, IdentityProviderKind, StorageKind};
use crate::defaults::DefaultCatalog;
use crate::favorites::FavoritesLedger;
use crate::identity::{GitHubApi, GoogleApi, IdentityApi};
use crate::images::{generate_image_id, ImageReferenceMap};
use crate::remote::{PublicCatalogClient, RemoteCatalog};
use crate::session::SessionStore;
use crate::store::{FileStore, KeyLocks, KeyValueStore, MemoryStore};
use crate::types::{AppError, ProductId, ProductPatch};
use std::sync::Arc;

/// Every data service the UI talks to
#[derive(Clone)]
pub struct Marketplace {
    pub catalog: CatalogRepository,
    pub favorites: FavoritesLedger,
    pub session: SessionStore,
    pub images: ImageReferenceMap,
    remote: Option<Arc<dyn RemoteCatalog>>,
}

impl Marketplace {
    /// Build the services described by `config`
    pub async fn open(config: &AppConfig) -> Result<Self, AppError> {
        config.validate()?;

        let store: Arc<dyn KeyValueStore> = match config.storage {
            StorageKind::File => {
                let store = match &config.data_dir {
                    Some(dir) => FileStore::open(dir).await?,
                    None => FileStore::open_default().await?,
                };
                Arc::new(store)
            }
            StorageKind::Memory => Arc::new(MemoryStore::new()),
        };

        let timeout = config.request_timeout();
        let identity: Arc<dyn IdentityApi> = match config.identity_provider {
            IdentityProviderKind::GitHub => Arc::new(GitHubApi::new(
                &config.github_api_url,
                &config.user_agent,
                timeout,
            )?),
            IdentityProviderKind::Google => Arc::new(GoogleApi::new(
                &config.google_userinfo_url,
                &config.user_agent,
                timeout,
            )?),
        };

        let mut marketplace = Self::with_store(store, DefaultCatalog::bundled()?, identity);
        if let Some(url) = &config.catalog_url {
            let client = PublicCatalogClient::new(url, &config.user_agent, timeout)?;
            marketplace = marketplace.with_remote_catalog(Arc::new(client));
        }

        tracing::info!(
            "Marketplace ready (storage: {:?}, identity: {:?})",
            config.storage,
            config.identity_provider
        );
        Ok(marketplace)
    }

    /// Build the services over caller-supplied collaborators
    pub fn with_store(
        store: Arc<dyn KeyValueStore>,
        defaults: DefaultCatalog,
        identity: Arc<dyn IdentityApi>,
    ) -> Self {
        let locks = Arc::new(KeyLocks::new());
        let catalog = CatalogRepository::new(store.clone(), locks.clone(), Arc::new(defaults));
        let favorites = FavoritesLedger::new(store.clone(), locks.clone(), catalog.clone());
        let session = SessionStore::new(store.clone(), identity);
        let images = ImageReferenceMap::new(store, locks);

        Self {
            catalog,
            favorites,
            session,
            images,
            remote: None,
        }
    }

    /// Seed products from `remote` on first run instead of the bundled list
    pub fn with_remote_catalog(mut self, remote: Arc<dyn RemoteCatalog>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// First-run seeding. A failing remote catalog falls back to the bundled one.
    pub async fn initialize(&self) {
        if let Some(remote) = &self.remote {
            if let Err(e) = self.catalog.seed_from_remote(remote.as_ref()).await {
                tracing::warn!("Remote catalog unavailable, using bundled products: {}", e);
            }
        }
        self.catalog.initialize().await;
    }

    /// Record a new photo for a product and point the product at it.
    ///
    /// Returns the generated image id, or `None` if the product does not exist.
    pub async fn attach_product_image(
        &self,
        product_id: ProductId,
        uri: &str,
    ) -> Result<Option<String>, AppError> {
        if self.catalog.get_product_by_id(product_id).await.is_none() {
            return Ok(None);
        }

        let image_id = generate_image_id(&format!("product_{}.jpg", product_id));
        self.images.store_reference(&image_id, uri).await?;
        let updated = self
            .catalog
            .update_product(product_id, ProductPatch::default().image(uri))
            .await?;

        Ok(updated.map(|_| image_id))
    }
}
