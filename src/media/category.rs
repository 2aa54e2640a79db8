use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Size ceiling for generic image categories: 10 MiB
pub const IMAGE_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Size ceiling for profile photos: 5 MiB
pub const PROFILE_PHOTO_MAX_BYTES: usize = 5 * 1024 * 1024;

/// Size ceiling for documents: 20 MiB
pub const DOCUMENT_MAX_BYTES: usize = 20 * 1024 * 1024;

/// Sniffed MIME types accepted for the image categories
pub const ALLOWED_IMAGE_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Sniffed MIME types accepted for the document category
pub const ALLOWED_DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Classification of an uploaded asset. The category fixes the validation
/// ceiling, the sniffed-type allow-list and the derivative compression
/// policy, and names the on-disk bucket the primary artifact lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    MealPhoto,
    ProfilePhoto,
    ProgressPhoto,
    Document,
    ExerciseImage,
}

impl AssetCategory {
    /// Every category, in a fixed order (bucket creation, tests).
    pub const ALL: [AssetCategory; 5] = [
        AssetCategory::MealPhoto,
        AssetCategory::ProfilePhoto,
        AssetCategory::ProgressPhoto,
        AssetCategory::Document,
        AssetCategory::ExerciseImage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::MealPhoto => "meal_photo",
            AssetCategory::ProfilePhoto => "profile_photo",
            AssetCategory::ProgressPhoto => "progress_photo",
            AssetCategory::Document => "document",
            AssetCategory::ExerciseImage => "exercise_image",
        }
    }

    /// Maximum accepted upload size in bytes for this category.
    pub fn max_size_bytes(&self) -> usize {
        match self {
            AssetCategory::ProfilePhoto => PROFILE_PHOTO_MAX_BYTES,
            AssetCategory::Document => DOCUMENT_MAX_BYTES,
            _ => IMAGE_MAX_BYTES,
        }
    }

    /// Sniffed MIME types this category accepts.
    pub fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            AssetCategory::Document => ALLOWED_DOCUMENT_TYPES,
            _ => ALLOWED_IMAGE_TYPES,
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, AssetCategory::Document)
    }

    /// Space-sensitive categories trade fidelity for disk: the stored
    /// "original" is itself a bounded, low-quality re-encode.
    pub fn is_space_sensitive(&self) -> bool {
        matches!(self, AssetCategory::ProgressPhoto)
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meal_photo" => Ok(AssetCategory::MealPhoto),
            "profile_photo" => Ok(AssetCategory::ProfilePhoto),
            "progress_photo" => Ok(AssetCategory::ProgressPhoto),
            "document" => Ok(AssetCategory::Document),
            "exercise_image" => Ok(AssetCategory::ExerciseImage),
            other => Err(format!("unknown asset category '{}'", other)),
        }
    }
}
