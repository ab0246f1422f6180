// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Local data layer for the marketplace app
//
// This crate provides:
// - KeyValueStore adapter with file and memory backends
// - CatalogRepository reconciling bundled defaults with stored listings
// - FavoritesLedger for bookmarked products
// - SessionStore for the signed-in user and identity provider lookups
// - ImageReferenceMap for user-supplied photos
// - Marketplace, the service container handed to the UI
//
// Screens and navigation live in the app, not here.

pub mod catalog;
pub mod config;
pub mod defaults;
pub mod favorites;
pub mod identity;
pub mod images;
pub mod logging;
pub mod remote;
pub mod session;
pub mod state;
pub mod store;
pub mod types;

// Re-export commonly used items
pub use catalog::{reconcile, CatalogRepository, CatalogSource, StoredProduct};
pub use config::{AppConfig, ConfigStore, IdentityProviderKind, StorageKind};
pub use defaults::DefaultCatalog;
pub use favorites::FavoritesLedger;
pub use identity::{ExternalProfile, GitHubApi, GoogleApi, IdentityApi, ProviderEmail};
pub use images::{ImageReferenceMap, ImageSource};
pub use remote::{PublicCatalogClient, RemoteCatalog};
pub use session::{convert_external_profile, SessionStore};
pub use state::Marketplace;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use types::{
    AppError, Category, FavoriteEntry, NewListing, Product, ProductId, ProductPatch, User,
};
