use clap::Parser;
use dotenvy::dotenv;
use fitlink_backend::config::AppConfig;
use fitlink_backend::infrastructure::{realtime, storage};
use fitlink_backend::media::MediaPipeline;
use fitlink_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run (api, worker, all)
    #[arg(short, long, default_value = "all")]
    mode: String,

    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitlink_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting FitLink Backend [Mode: {}]...", args.mode);

    // 2. Setup Common Infrastructure
    let config = AppConfig::from_env();
    info!(
        "🗂️  Storage Config: Root={}, Sweep every {}s, Orphan age {}h",
        config.storage_root, config.sweep_interval_secs, config.orphan_max_age_hours
    );

    let store = storage::setup_asset_store(&config).await?;
    let pipeline = Arc::new(MediaPipeline::new(store));
    let delivery = realtime::setup_delivery();

    // 3. Setup Graceful Shutdown Channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles = Vec::new();

    // 4. Initialize Worker Service
    if args.mode == "worker" || args.mode == "all" {
        let worker_pipeline = pipeline.clone();
        let worker_config = config.clone();
        let worker_shutdown = shutdown_rx.clone();

        let worker_handle = tokio::spawn(async move {
            run_sweeper(worker_pipeline, worker_config, worker_shutdown).await;
        });
        handles.push(worker_handle);
        info!("👷 Orphan sweeper initialized.");
    }

    // 5. Initialize API Service
    if args.mode == "api" || args.mode == "all" {
        let state = AppState {
            pipeline: pipeline.clone(),
            delivery: delivery.clone(),
            config: config.clone(),
        };

        // Configure tracing layer for HTTP requests
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            );

        let app = create_app(state).layer(trace_layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("✅ API Server listening on: http://0.0.0.0:{}", args.port);
        info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", args.port);

        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_signal().await;
                })
                .await
            {
                error!("❌ Server runtime error: {}", e);
            }
        });
        handles.push(server_handle);
    }

    // 6. Wait for Shutdown Signal
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    info!("🛑 Shutting down backend services...");
    info!("👋 Backend exited cleanly.");
    Ok(())
}

/// Periodically clears stale staged files so aborted uploads cannot fill
/// the disk. Category buckets are never touched.
async fn run_sweeper(
    pipeline: Arc<MediaPipeline>,
    config: AppConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("🚀 Orphan sweeper started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("🛑 Orphan sweeper shutting down");
                break;
            }
            _ = sleep(Duration::from_secs(config.sweep_interval_secs)) => {
                info!("🧹 Running orphan sweep...");
                match pipeline.sweep_orphans(config.orphan_max_age_hours).await {
                    Ok(removed) => info!("✅ Orphan sweep completed ({} removed)", removed),
                    Err(e) => error!("Orphan sweep failed: {}", e),
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
