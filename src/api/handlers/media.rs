use crate::api::error::AppError;
use crate::media::store;
use crate::media::{AssetCategory, UploadManifest};
use crate::realtime::{DeliveryEvent, DeliveryPolicy, EventCategory};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = Multipart, description = "Asset upload: `file`, `category`, `owner_id` fields"),
    responses(
        (status = 200, description = "Asset stored", body = UploadManifest),
        (status = 400, description = "Missing or malformed field"),
        (status = 413, description = "Category size ceiling exceeded"),
        (status = 415, description = "Content type not allowed for category"),
        (status = 422, description = "Image payload does not decode")
    ),
    tag = "media"
)]
pub async fn upload_asset(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadManifest>, AppError> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut declared_mime: Option<String> = None;
    let mut category: Option<AssetCategory> = None;
    let mut owner_id: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                declared_mime = field.content_type().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file_bytes = Some(bytes.to_vec());
            }
            "category" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                category = Some(text.parse().map_err(AppError::BadRequest)?);
            }
            "owner_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                owner_id = Some(
                    text.parse()
                        .map_err(|_| AppError::BadRequest("owner_id must be an integer".to_string()))?,
                );
            }
            _ => {}
        }
    }

    let bytes = file_bytes.ok_or(AppError::BadRequest("No file provided".to_string()))?;
    let category = category.ok_or(AppError::BadRequest("No category provided".to_string()))?;
    let owner_id = owner_id.ok_or(AppError::BadRequest("No owner_id provided".to_string()))?;

    let manifest = state
        .pipeline
        .submit(bytes, declared_mime, category, owner_id)
        .await?;

    // The uploader's own devices hear about it, and so does the other side
    // of their training relationship. Fire-and-forget on both.
    let payload = serde_json::to_value(&manifest)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    state.delivery.deliver(&DeliveryEvent::new(
        EventCategory::UploadCompleted,
        payload.clone(),
        DeliveryPolicy::Direct { target: owner_id },
    ));
    state.delivery.deliver(&DeliveryEvent::new(
        EventCategory::UploadCompleted,
        payload,
        DeliveryPolicy::ToCounterpart { source: owner_id },
    ));

    Ok(Json(manifest))
}

#[utoipa::path(
    delete,
    path = "/assets/{stored_name}",
    params(
        ("stored_name" = String, Path, description = "Stored asset name from the upload manifest")
    ),
    responses(
        (status = 204, description = "Asset removed"),
        (status = 404, description = "No such asset")
    ),
    tag = "media"
)]
pub async fn delete_asset(
    State(state): State<crate::AppState>,
    Path(stored_name): Path<String>,
) -> Result<StatusCode, AppError> {
    let Some((_, owner_id)) = store::parse_stored_name(&stored_name) else {
        return Err(AppError::BadRequest(format!(
            "not a stored asset name: {stored_name}"
        )));
    };

    let removed = state.pipeline.remove(&stored_name).await?;
    if !removed {
        return Err(AppError::NotFound(format!("asset {stored_name} not found")));
    }

    let payload = json!({ "stored_name": stored_name, "owner_id": owner_id });
    state.delivery.deliver(&DeliveryEvent::new(
        EventCategory::UploadDeleted,
        payload.clone(),
        DeliveryPolicy::Direct { target: owner_id },
    ));
    state.delivery.deliver(&DeliveryEvent::new(
        EventCategory::UploadDeleted,
        payload,
        DeliveryPolicy::ToCounterpart { source: owner_id },
    ));

    Ok(StatusCode::NO_CONTENT)
}
