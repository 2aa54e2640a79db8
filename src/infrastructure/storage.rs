use crate::config::AppConfig;
use crate::media::LocalAssetStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Builds the asset store and makes sure its bucket layout exists.
pub async fn setup_asset_store(config: &AppConfig) -> Result<Arc<LocalAssetStore>> {
    let store = LocalAssetStore::new(&config.storage_root);
    store.ensure_layout().await?;

    info!("📦 Local storage root: {}", config.storage_root);

    Ok(Arc::new(store))
}
