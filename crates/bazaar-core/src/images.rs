// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Image reference map
//
// Maps opaque image ids to the URI the photo actually lives at.

use crate::store::{keys, load_json, save_json, KeyLocks, KeyValueStore};
use crate::types::AppError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

const VALID_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// Where an image reference points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// http:// or https:// URL
    Remote,
    /// Inline data:image/... URI
    DataUri,
    /// file:// URI on the device
    LocalFile,
    /// Name of an image shipped with the app
    Bundled,
}

impl ImageSource {
    pub fn classify(reference: &str) -> Self {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            Self::Remote
        } else if reference.starts_with("data:image/") {
            Self::DataUri
        } else if reference.starts_with("file://") {
            Self::LocalFile
        } else {
            Self::Bundled
        }
    }

    /// Whether the UI can load the reference directly as a URI
    pub fn is_uri(&self) -> bool {
        !matches!(self, Self::Bundled)
    }
}

/// Extension of `file_name` including the dot, or "" if there is none
fn extension(file_name: &str) -> &str {
    file_name.rfind('.').map_or("", |i| &file_name[i..])
}

/// Accept only common photo formats, judged by extension
pub fn is_valid_image_type(file_name: &str) -> bool {
    let ext = extension(file_name).to_lowercase();
    VALID_EXTENSIONS.contains(&ext.as_str())
}

/// Id for a new upload: `product_<millis><ext>`, keeping the original extension
pub fn generate_image_id(original_name: &str) -> String {
    generate_image_id_at(original_name, Utc::now())
}

pub fn generate_image_id_at(original_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "product_{}{}",
        now.timestamp_millis(),
        extension(original_name)
    )
}

/// Persisted image id -> URI mapping
#[derive(Clone)]
pub struct ImageReferenceMap {
    store: Arc<dyn KeyValueStore>,
    locks: Arc<KeyLocks>,
}

impl ImageReferenceMap {
    pub fn new(store: Arc<dyn KeyValueStore>, locks: Arc<KeyLocks>) -> Self {
        Self { store, locks }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, AppError> {
        Ok(load_json(self.store.as_ref(), keys::IMAGE_REFERENCES)
            .await?
            .unwrap_or_default())
    }

    /// Insert or replace the URI for `image_id`
    pub async fn store_reference(&self, image_id: &str, uri: &str) -> Result<(), AppError> {
        let _guard = self.locks.lock(keys::IMAGE_REFERENCES).await;
        let mut references = self.load().await?;
        references.insert(image_id.to_string(), uri.to_string());
        save_json(self.store.as_ref(), keys::IMAGE_REFERENCES, &references).await?;
        tracing::debug!("Stored image reference {}", image_id);
        Ok(())
    }

    pub async fn get_reference(&self, image_id: &str) -> Option<String> {
        match self.load().await {
            Ok(mut references) => references.remove(image_id),
            Err(e) => {
                tracing::error!("Error getting image reference {}: {}", image_id, e);
                None
            }
        }
    }

    /// Every stored reference, empty if the read fails
    pub async fn references(&self) -> BTreeMap<String, String> {
        self.load().await.unwrap_or_else(|e| {
            tracing::error!("Error getting image references: {}", e);
            BTreeMap::new()
        })
    }
}
