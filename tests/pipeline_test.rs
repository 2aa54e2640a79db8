use fitlink_backend::media::store::TEMP_DIR;
use fitlink_backend::media::{
    AssetCategory, LocalAssetStore, MediaError, MediaPipeline, ValidationError,
};
use image::codecs::jpeg::JpegEncoder;
use std::sync::Arc;
use tempfile::TempDir;

fn textured_rgb(width: u32, height: u32) -> image::RgbImage {
    image::RgbImage::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(31).wrapping_add(y.wrapping_mul(17))) as u8;
        image::Rgb([v, v.wrapping_add(85), v.wrapping_add(170)])
    })
}

fn jpeg_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let img = textured_rgb(width, height);
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder
        .encode(img.as_raw(), width, height, image::ColorType::Rgb8)
        .unwrap();
    out
}

fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n".to_vec()
}

async fn temp_pipeline() -> (TempDir, MediaPipeline) {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalAssetStore::new(dir.path());
    store.ensure_layout().await.unwrap();
    (dir, MediaPipeline::new(Arc::new(store)))
}

#[tokio::test]
async fn test_small_meal_photo_upload() {
    let (dir, pipeline) = temp_pipeline().await;
    let source = jpeg_bytes(50, 50, 90);

    let manifest = pipeline
        .submit(source.clone(), Some("image/jpeg".to_string()), AssetCategory::MealPhoto, 7)
        .await
        .unwrap();

    assert!(manifest.stored_name.starts_with("meal_photo_7_"));
    assert_eq!(manifest.sniffed_mime, "image/jpeg");
    assert_eq!(manifest.declared_mime.as_deref(), Some("image/jpeg"));
    assert_eq!((manifest.width, manifest.height), (Some(50), Some(50)));
    assert!(!manifest.reencoded);
    assert_eq!(manifest.size_bytes, source.len() as u64);

    // 50x50 fits every box: thumbnail and medium still render, large is skipped.
    assert!(manifest.thumbnail_path.is_some());
    assert!(manifest.medium_path.is_some());
    assert!(manifest.large_path.is_none());

    assert!(dir.path().join(&manifest.primary_path).exists());
    assert!(dir.path().join(manifest.thumbnail_path.unwrap()).exists());
    assert!(dir.path().join(manifest.medium_path.unwrap()).exists());
}

#[tokio::test]
async fn test_large_source_emits_all_three_derivatives() {
    let (_dir, pipeline) = temp_pipeline().await;
    let source = jpeg_bytes(2000, 1500, 90);

    let manifest = pipeline
        .submit(source, None, AssetCategory::ExerciseImage, 1)
        .await
        .unwrap();

    assert!(manifest.thumbnail_path.is_some());
    assert!(manifest.medium_path.is_some());
    assert!(manifest.large_path.is_some());
    assert!(!manifest.reencoded);
}

#[tokio::test]
async fn test_progress_photo_stored_smaller_than_exercise_image() {
    let (_dir, pipeline) = temp_pipeline().await;
    let source = jpeg_bytes(2000, 1500, 95);

    let progress = pipeline
        .submit(source.clone(), None, AssetCategory::ProgressPhoto, 2)
        .await
        .unwrap();
    let exercise = pipeline
        .submit(source.clone(), None, AssetCategory::ExerciseImage, 2)
        .await
        .unwrap();

    // Same bytes, different storage policy: the progress photo is bounded
    // and re-encoded, the exercise image is kept verbatim.
    assert!(progress.reencoded);
    assert!(!exercise.reencoded);
    assert_eq!(exercise.size_bytes, source.len() as u64);
    assert!(progress.size_bytes < exercise.size_bytes);
    assert!(progress.primary_path.ends_with(".jpg"));
}

#[tokio::test]
async fn test_document_skips_the_generator() {
    let (dir, pipeline) = temp_pipeline().await;

    let manifest = pipeline
        .submit(pdf_bytes(), Some("application/pdf".to_string()), AssetCategory::Document, 3)
        .await
        .unwrap();

    assert_eq!(manifest.sniffed_mime, "application/pdf");
    assert!(manifest.stored_name.ends_with(".pdf"));
    assert_eq!((manifest.width, manifest.height), (None, None));
    assert!(manifest.thumbnail_path.is_none());
    assert!(manifest.medium_path.is_none());
    assert!(manifest.large_path.is_none());
    assert!(dir.path().join(&manifest.primary_path).exists());
}

#[tokio::test]
async fn test_declared_type_is_recorded_but_not_trusted() {
    let (_dir, pipeline) = temp_pipeline().await;

    // Client claims PNG; the bytes are JPEG. The manifest keeps both.
    let manifest = pipeline
        .submit(jpeg_bytes(40, 40, 80), Some("image/png".to_string()), AssetCategory::MealPhoto, 4)
        .await
        .unwrap();

    assert_eq!(manifest.declared_mime.as_deref(), Some("image/png"));
    assert_eq!(manifest.sniffed_mime, "image/jpeg");
    assert!(manifest.stored_name.ends_with(".jpg"));
}

#[tokio::test]
async fn test_rejections_surface_as_validation_errors() {
    let (_dir, pipeline) = temp_pipeline().await;

    let oversized = vec![0u8; 10 * 1024 * 1024 + 1];
    let err = pipeline
        .submit(oversized, None, AssetCategory::MealPhoto, 5)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MediaError::Validation(ValidationError::SizeExceeded { .. })
    ));

    let err = pipeline
        .submit(pdf_bytes(), None, AssetCategory::MealPhoto, 5)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MediaError::Validation(ValidationError::UnsupportedType { .. })
    ));

    let mut truncated = jpeg_bytes(100, 100, 80);
    truncated.truncate(64);
    let err = pipeline
        .submit(truncated, None, AssetCategory::MealPhoto, 5)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MediaError::Validation(ValidationError::CorruptImage { .. })
    ));

    let err = pipeline
        .submit(Vec::new(), None, AssetCategory::Document, 5)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MediaError::Validation(ValidationError::SizeExceeded { .. })
    ));
}

#[tokio::test]
async fn test_remove_round_trip() {
    let (dir, pipeline) = temp_pipeline().await;

    let manifest = pipeline
        .submit(jpeg_bytes(50, 50, 85), None, AssetCategory::ProfilePhoto, 6)
        .await
        .unwrap();
    let primary = dir.path().join(&manifest.primary_path);
    let thumb = dir.path().join(manifest.thumbnail_path.unwrap());
    assert!(primary.exists());
    assert!(thumb.exists());

    assert!(pipeline.remove(&manifest.stored_name).await.unwrap());
    assert!(!primary.exists());
    assert!(!thumb.exists());

    // Already gone: not an error, just "nothing removed".
    assert!(!pipeline.remove(&manifest.stored_name).await.unwrap());
}

#[tokio::test]
async fn test_sweep_only_clears_staged_files() {
    let (dir, pipeline) = temp_pipeline().await;

    let manifest = pipeline
        .submit(jpeg_bytes(30, 30, 85), None, AssetCategory::MealPhoto, 8)
        .await
        .unwrap();
    tokio::fs::write(dir.path().join(TEMP_DIR).join("abandoned-upload"), b"x")
        .await
        .unwrap();

    assert_eq!(pipeline.sweep_orphans(0).await.unwrap(), 1);
    assert!(dir.path().join(&manifest.primary_path).exists());
}

#[tokio::test]
async fn test_unwritable_derivative_bucket_degrades_not_fails() {
    let (dir, pipeline) = temp_pipeline().await;
    tokio::fs::remove_dir_all(dir.path().join("derivatives"))
        .await
        .unwrap();

    // Every derivative write fails, but the upload itself still lands.
    let manifest = pipeline
        .submit(jpeg_bytes(400, 300, 90), None, AssetCategory::MealPhoto, 3)
        .await
        .unwrap();

    assert!(manifest.thumbnail_path.is_none());
    assert!(manifest.medium_path.is_none());
    assert!(manifest.large_path.is_none());
    assert!(dir.path().join(&manifest.primary_path).exists());
}
