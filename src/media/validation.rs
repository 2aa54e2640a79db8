use thiserror::Error;

use super::category::AssetCategory;

/// Rejection reasons surfaced to the upload caller. Nothing past validation
/// produces one of these: once an upload validates, the pipeline always
/// stores something.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Size is zero or above the category ceiling.
    #[error("upload of {size} bytes not accepted for {category} (ceiling {limit} bytes)")]
    SizeExceeded {
        size: usize,
        limit: usize,
        category: AssetCategory,
    },

    /// Sniffed content type is outside the category allow-list. The
    /// caller-declared type plays no part in this decision.
    #[error("content type '{detected}' not accepted for {category}")]
    UnsupportedType {
        detected: String,
        category: AssetCategory,
    },

    /// Sniffing said image, but the structural decode disagreed.
    #[error("image failed to decode: {reason}")]
    CorruptImage { reason: String },
}

/// Facts established by a successful validation run. Dimensions come from
/// the structural decode, so image manifests get them without a second pass.
#[derive(Debug, Clone)]
pub struct ValidationPass {
    pub size_bytes: usize,
    pub sniffed_mime: &'static str,
    pub extension: &'static str,
    pub dimensions: Option<(u32, u32)>,
}

/// Validates raw upload bytes against a category: size ceiling first, then
/// content sniffing, then (for image categories) a full structural decode.
/// Read-only; writes nothing.
pub fn validate(bytes: &[u8], category: AssetCategory) -> Result<ValidationPass, ValidationError> {
    let size = bytes.len();
    let limit = category.max_size_bytes();

    // Empty and oversized uploads are both rejected before any content
    // inspection. The ceiling check must not depend on a decode.
    if size == 0 || size > limit {
        return Err(ValidationError::SizeExceeded {
            size,
            limit,
            category,
        });
    }

    let kind = infer::get(bytes).ok_or_else(|| ValidationError::UnsupportedType {
        detected: "unknown".to_string(),
        category,
    })?;

    let sniffed = kind.mime_type();
    if !category.allowed_types().contains(&sniffed) {
        return Err(ValidationError::UnsupportedType {
            detected: sniffed.to_string(),
            category,
        });
    }

    let dimensions = if category.is_image() {
        let img = image::load_from_memory(bytes).map_err(|e| ValidationError::CorruptImage {
            reason: e.to_string(),
        })?;
        Some((img.width(), img.height()))
    } else {
        None
    };

    Ok(ValidationPass {
        size_bytes: size,
        sniffed_mime: sniffed,
        extension: kind.extension(),
        dimensions,
    })
}
