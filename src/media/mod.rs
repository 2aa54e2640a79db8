pub mod category;
pub mod derivative;
pub mod pipeline;
pub mod store;
pub mod validation;

pub use category::AssetCategory;
pub use pipeline::{MediaError, MediaPipeline, UploadManifest};
pub use store::{AssetStore, LocalAssetStore};
pub use validation::ValidationError;
