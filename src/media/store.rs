use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use super::category::AssetCategory;
use super::derivative::DerivativeSet;

/// Shared bucket for all resized copies.
pub const DERIVATIVES_DIR: &str = "derivatives";

/// Staging bucket; the only place the orphan sweep ever touches.
pub const TEMP_DIR: &str = "temp";

/// Random token length in stored names. The token is what makes concurrent
/// uploads for one owner collision-free.
const TOKEN_LEN: usize = 12;

const DERIVATIVE_TAGS: [&str; 3] = ["thumb", "medium", "large"];

/// One persisted primary artifact.
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub category: AssetCategory,
    pub owner_id: i64,
    pub stored_name: String,
    /// Path relative to the storage root; stable across remounts.
    pub relative_path: String,
    pub size_bytes: u64,
}

/// Relative paths of the derivative files that were actually written.
#[derive(Debug, Clone, Default)]
pub struct StoredDerivatives {
    pub thumbnail: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persists the primary artifact under its category bucket and the
    /// derivatives under the shared derivatives bucket. Derivative writes
    /// are best-effort; a failed slot is logged and reported absent.
    async fn store(
        &self,
        category: AssetCategory,
        owner_id: i64,
        extension: &str,
        primary: &[u8],
        derivatives: &DerivativeSet,
    ) -> Result<(StoredAsset, StoredDerivatives)>;

    /// Removes the primary artifact and any derivative files derivable from
    /// its stem. Returns whether the primary existed. Missing derivatives
    /// are not an error.
    async fn delete(&self, stored_name: &str) -> Result<bool>;

    /// Removes temp-bucket entries older than the given age. Never touches
    /// category buckets. Returns the number of files removed.
    async fn sweep_orphans(&self, max_age_hours: u64) -> Result<usize>;
}

/// Category-partitioned store on a local disk root.
pub struct LocalAssetStore {
    root: PathBuf,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the fixed bucket layout: one directory per category plus
    /// derivatives/ and temp/.
    pub async fn ensure_layout(&self) -> Result<()> {
        for category in AssetCategory::ALL {
            tokio::fs::create_dir_all(self.root.join(category.as_str()))
                .await
                .with_context(|| format!("creating bucket for {category}"))?;
        }
        tokio::fs::create_dir_all(self.root.join(DERIVATIVES_DIR))
            .await
            .context("creating derivatives bucket")?;
        tokio::fs::create_dir_all(self.root.join(TEMP_DIR))
            .await
            .context("creating temp bucket")?;
        Ok(())
    }

    fn new_stored_name(category: AssetCategory, owner_id: i64, extension: &str) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        format!("{category}_{owner_id}_{token}.{extension}")
    }

    /// Writes one derivative slot, reporting its relative path on success.
    async fn write_derivative(&self, stem: &str, tag: &str, bytes: &[u8]) -> Option<String> {
        let file_name = format!("{stem}_{tag}.jpg");
        let path = self.root.join(DERIVATIVES_DIR).join(&file_name);
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => Some(format!("{DERIVATIVES_DIR}/{file_name}")),
            Err(e) => {
                warn!("failed to write {tag} derivative {file_name}: {e}");
                None
            }
        }
    }
}

/// Recovers the category and owner from a stored name. Stored names are
/// `{category}_{owner}_{token}.{ext}`; anything else is foreign.
pub fn parse_stored_name(stored_name: &str) -> Option<(AssetCategory, i64)> {
    let category = AssetCategory::ALL
        .into_iter()
        .find(|category| stored_name.starts_with(&format!("{}_", category.as_str())))?;
    let rest = &stored_name[category.as_str().len() + 1..];
    let owner_id = rest.split('_').next()?.parse().ok()?;
    Some((category, owner_id))
}

/// Stored names never contain path components; anything else is a caller
/// trying to escape the bucket.
fn is_safe_name(stored_name: &str) -> bool {
    !stored_name.is_empty()
        && !stored_name.contains('/')
        && !stored_name.contains('\\')
        && !stored_name.contains("..")
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn store(
        &self,
        category: AssetCategory,
        owner_id: i64,
        extension: &str,
        primary: &[u8],
        derivatives: &DerivativeSet,
    ) -> Result<(StoredAsset, StoredDerivatives)> {
        let stored_name = Self::new_stored_name(category, owner_id, extension);
        let relative_path = format!("{}/{}", category.as_str(), stored_name);
        let primary_path = self.root.join(&relative_path);

        tokio::fs::write(&primary_path, primary)
            .await
            .with_context(|| format!("writing primary artifact {stored_name}"))?;

        let stem = stored_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&stored_name);

        let mut stored = StoredDerivatives::default();
        if let Some(bytes) = &derivatives.thumbnail {
            stored.thumbnail = self.write_derivative(stem, "thumb", bytes).await;
        }
        if let Some(bytes) = &derivatives.medium {
            stored.medium = self.write_derivative(stem, "medium", bytes).await;
        }
        if let Some(bytes) = &derivatives.large {
            stored.large = self.write_derivative(stem, "large", bytes).await;
        }

        Ok((
            StoredAsset {
                category,
                owner_id,
                stored_name,
                relative_path,
                size_bytes: primary.len() as u64,
            },
            stored,
        ))
    }

    async fn delete(&self, stored_name: &str) -> Result<bool> {
        if !is_safe_name(stored_name) {
            anyhow::bail!("invalid stored name");
        }
        let Some((category, _)) = parse_stored_name(stored_name) else {
            anyhow::bail!("stored name has no category prefix: {stored_name}");
        };

        let primary_path = self.root.join(category.as_str()).join(stored_name);
        let removed = match tokio::fs::remove_file(&primary_path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e).with_context(|| format!("deleting {stored_name}")),
        };

        // Derivative names are derivable from the stem; clean up whatever is
        // there. Absent files are expected (fallback uploads have none).
        let stem = stored_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(stored_name);
        for tag in DERIVATIVE_TAGS {
            let path = self.root.join(DERIVATIVES_DIR).join(format!("{stem}_{tag}.jpg"));
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove derivative {stem}_{tag}.jpg: {e}");
                }
            }
        }

        Ok(removed)
    }

    async fn sweep_orphans(&self, max_age_hours: u64) -> Result<usize> {
        let cutoff = Duration::from_secs(max_age_hours * 3600);
        let temp = self.root.join(TEMP_DIR);
        let mut entries = tokio::fs::read_dir(&temp)
            .await
            .context("reading temp bucket")?;

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let age = match entry.metadata().await.and_then(|m| {
                m.modified()
                    .map(|t| t.elapsed().unwrap_or(Duration::ZERO))
            }) {
                Ok(age) => age,
                Err(e) => {
                    warn!("skipping unreadable temp entry {:?}: {e}", path.file_name());
                    continue;
                }
            };
            if age >= cutoff {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {
                        debug!("swept orphan {:?}", path.file_name());
                        removed += 1;
                    }
                    Err(e) => warn!("failed to sweep {:?}: {e}", path.file_name()),
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_derivatives() -> DerivativeSet {
        DerivativeSet {
            thumbnail: Some(vec![1, 2, 3]),
            medium: Some(vec![4, 5, 6]),
            large: None,
        }
    }

    async fn temp_store() -> (tempfile::TempDir, LocalAssetStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(dir.path());
        store.ensure_layout().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_store_writes_category_bucket_and_derivatives() {
        let (dir, store) = temp_store().await;
        let (asset, derivatives) = store
            .store(
                AssetCategory::MealPhoto,
                7,
                "jpg",
                b"primary-bytes",
                &sample_derivatives(),
            )
            .await
            .unwrap();

        assert!(asset.stored_name.starts_with("meal_photo_7_"));
        assert!(asset.stored_name.ends_with(".jpg"));
        assert_eq!(asset.size_bytes, 13);
        assert!(dir.path().join(&asset.relative_path).exists());

        let thumb = derivatives.thumbnail.expect("thumbnail path");
        assert!(thumb.starts_with("derivatives/"));
        assert!(thumb.ends_with("_thumb.jpg"));
        assert!(dir.path().join(&thumb).exists());
        assert!(derivatives.large.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_names_do_not_collide() {
        let (_dir, store) = temp_store().await;
        let mut names = std::collections::HashSet::new();
        for _ in 0..50 {
            let (asset, _) = store
                .store(
                    AssetCategory::ProgressPhoto,
                    42,
                    "jpg",
                    b"x",
                    &DerivativeSet::default(),
                )
                .await
                .unwrap();
            assert!(names.insert(asset.stored_name), "name collision");
        }
    }

    #[tokio::test]
    async fn test_delete_removes_primary_and_derivatives() {
        let (dir, store) = temp_store().await;
        let (asset, derivatives) = store
            .store(
                AssetCategory::ProfilePhoto,
                3,
                "png",
                b"primary",
                &sample_derivatives(),
            )
            .await
            .unwrap();
        let thumb_path = dir.path().join(derivatives.thumbnail.unwrap());
        assert!(thumb_path.exists());

        assert!(store.delete(&asset.stored_name).await.unwrap());
        assert!(!dir.path().join(&asset.relative_path).exists());
        assert!(!thumb_path.exists());

        // Second delete: primary already gone, derivatives already gone,
        // neither is an error.
        assert!(!store.delete(&asset.stored_name).await.unwrap());
    }

    #[test]
    fn test_parse_stored_name() {
        assert_eq!(
            parse_stored_name("meal_photo_7_Ab12Cd34Ef56.jpg"),
            Some((AssetCategory::MealPhoto, 7))
        );
        assert_eq!(
            parse_stored_name("progress_photo_42_xYz.png"),
            Some((AssetCategory::ProgressPhoto, 42))
        );
        assert_eq!(parse_stored_name("vacation.jpg"), None);
        assert_eq!(parse_stored_name("meal_photo_notanumber.jpg"), None);
    }

    #[tokio::test]
    async fn test_delete_rejects_path_traversal() {
        let (_dir, store) = temp_store().await;
        assert!(store.delete("../etc/passwd").await.is_err());
        assert!(store.delete("meal_photo_1_abc/../x.jpg").await.is_err());
        assert!(store.delete("").await.is_err());
    }

    #[tokio::test]
    async fn test_sweep_orphans_only_touches_temp() {
        let (dir, store) = temp_store().await;
        tokio::fs::write(dir.path().join(TEMP_DIR).join("stale-1"), b"a")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join(TEMP_DIR).join("stale-2"), b"b")
            .await
            .unwrap();
        let kept = dir.path().join("meal_photo").join("meal_photo_1_keep.jpg");
        tokio::fs::write(&kept, b"keep").await.unwrap();

        // Age zero sweeps everything currently in temp.
        assert_eq!(store.sweep_orphans(0).await.unwrap(), 2);
        assert!(kept.exists());

        // Fresh entries survive a 24h threshold.
        tokio::fs::write(dir.path().join(TEMP_DIR).join("fresh"), b"c")
            .await
            .unwrap();
        assert_eq!(store.sweep_orphans(24).await.unwrap(), 0);
    }
}
