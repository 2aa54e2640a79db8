use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::category::AssetCategory;
use super::derivative::{self, DerivativeOutput, DerivativeSet, GeneratedPrimary};
use super::store::AssetStore;
use super::validation::{self, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Everything a caller learns about a completed upload. Paths are relative
/// to the storage root.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadManifest {
    pub stored_name: String,
    pub category: AssetCategory,
    pub owner_id: i64,
    pub primary_path: String,
    /// Size of the stored artifact, which differs from the upload size when
    /// the primary was re-encoded.
    pub size_bytes: u64,
    /// What the client claimed. Recorded for diagnostics, never trusted.
    pub declared_mime: Option<String>,
    /// What the bytes actually are.
    pub sniffed_mime: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub reencoded: bool,
    pub thumbnail_path: Option<String>,
    pub medium_path: Option<String>,
    pub large_path: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Validate, derive, persist. One entry point for every upload regardless
/// of category.
pub struct MediaPipeline {
    store: Arc<dyn AssetStore>,
}

impl MediaPipeline {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        Self { store }
    }

    pub async fn submit(
        &self,
        bytes: Vec<u8>,
        declared_mime: Option<String>,
        category: AssetCategory,
        owner_id: i64,
    ) -> Result<UploadManifest, MediaError> {
        let pass = validation::validate(&bytes, category)?;
        if let Some(declared) = &declared_mime {
            if declared != pass.sniffed_mime {
                debug!(
                    "declared type {declared} disagrees with sniffed {} for {category} upload",
                    pass.sniffed_mime
                );
            }
        }

        let output = if category.is_image() {
            derivative::generate(&bytes, category)
        } else {
            DerivativeOutput {
                primary: GeneratedPrimary::Verbatim,
                derivatives: DerivativeSet::default(),
            }
        };

        let reencoded = matches!(output.primary, GeneratedPrimary::Reencoded(_));
        let (primary_bytes, extension): (&[u8], &str) = match &output.primary {
            GeneratedPrimary::Verbatim => (&bytes, pass.extension),
            GeneratedPrimary::Reencoded(encoded) => (encoded, "jpg"),
        };

        let (asset, derivative_paths) = self
            .store
            .store(category, owner_id, extension, primary_bytes, &output.derivatives)
            .await?;

        info!(
            "stored {} for owner {owner_id} ({} bytes, {} derivatives)",
            asset.stored_name,
            asset.size_bytes,
            [&derivative_paths.thumbnail, &derivative_paths.medium, &derivative_paths.large]
                .iter()
                .filter(|slot| slot.is_some())
                .count()
        );

        Ok(UploadManifest {
            stored_name: asset.stored_name,
            category,
            owner_id,
            primary_path: asset.relative_path,
            size_bytes: asset.size_bytes,
            declared_mime,
            sniffed_mime: pass.sniffed_mime.to_string(),
            width: pass.dimensions.map(|(w, _)| w),
            height: pass.dimensions.map(|(_, h)| h),
            reencoded,
            thumbnail_path: derivative_paths.thumbnail,
            medium_path: derivative_paths.medium,
            large_path: derivative_paths.large,
            uploaded_at: Utc::now(),
        })
    }

    /// Removes a stored asset and its derivatives. Returns whether the
    /// primary artifact existed.
    pub async fn remove(&self, stored_name: &str) -> Result<bool, MediaError> {
        let removed = self.store.delete(stored_name).await?;
        if removed {
            info!("deleted {stored_name}");
        }
        Ok(removed)
    }

    pub async fn sweep_orphans(&self, max_age_hours: u64) -> Result<usize, MediaError> {
        let removed = self.store.sweep_orphans(max_age_hours).await?;
        if removed > 0 {
            info!("orphan sweep removed {removed} staged files");
        }
        Ok(removed)
    }
}
