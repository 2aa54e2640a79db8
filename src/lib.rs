pub mod api;
pub mod config;
pub mod infrastructure;
pub mod media;
pub mod realtime;

use crate::config::AppConfig;
use crate::media::MediaPipeline;
use crate::realtime::DeliveryService;
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::media::upload_asset,
        api::handlers::media::delete_asset,
        api::handlers::realtime::publish_event,
        api::handlers::realtime::subscribe,
        api::handlers::realtime::unsubscribe,
        api::handlers::realtime::delivery_stats,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::realtime::SubscriptionRequest,
            media::UploadManifest,
            media::AssetCategory,
            realtime::DeliveryEvent,
            realtime::DeliveryPolicy,
            realtime::EventCategory,
            realtime::DeliveryStats,
        )
    ),
    tags(
        (name = "media", description = "Asset upload and removal"),
        (name = "realtime", description = "Event delivery and subscriptions"),
        (name = "system", description = "Health and diagnostics")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<MediaPipeline>,
    pub delivery: Arc<DeliveryService>,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    let cors = if state.config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
    };

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/upload",
            post(api::handlers::media::upload_asset).layer(axum::extract::DefaultBodyLimit::max(
                state.config.max_upload_bytes + 10 * 1024 * 1024, // 10MB buffer for multipart overhead
            )),
        )
        .route(
            "/assets/:stored_name",
            delete(api::handlers::media::delete_asset),
        )
        .route("/ws", get(api::handlers::realtime::ws_connect))
        .route("/events", post(api::handlers::realtime::publish_event))
        .route(
            "/subscriptions",
            post(api::handlers::realtime::subscribe).delete(api::handlers::realtime::unsubscribe),
        )
        .route("/stats", get(api::handlers::realtime::delivery_stats))
        .layer(cors)
        .with_state(state)
}
