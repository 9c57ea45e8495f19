use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sample_exchange::{clock::SystemClock, config::Config, db, handlers, paths, state::AppState};

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sample_exchange=debug,tower_http=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::load().unwrap_or_else(|e| panic!("Invalid configuration: {}", e));

  let pool = db::init_db(&config.database_path).expect("Failed to initialize database");
  if let Err(e) = std::fs::create_dir_all(&config.storage_path) {
    tracing::warn!("Could not create storage directory {}: {}", config.storage_path.display(), e);
  }

  tracing::info!(
    "Windows: upload {} for {}h, submissions {} for {}h (UTC offset {})",
    config.windows.upload_weekday,
    config.windows.upload_duration.num_hours(),
    config.windows.submission_weekday,
    config.windows.submission_duration.num_hours(),
    config.windows.utc_offset
  );

  let bind_addr = config.bind_addr();
  let port = config.server_port;
  let state = AppState::new(pool, config, Arc::new(SystemClock));

  // API routes first; everything else is the single-page frontend
  let frontend = ServeDir::new(paths::FRONTEND_DIST_DIR)
    .not_found_service(ServeFile::new(format!("{}/index.html", paths::FRONTEND_DIST_DIR)));
  let app = handlers::router(state)
    .fallback_service(frontend)
    .layer(TraceLayer::new_for_http());

  let listener = tokio::net::TcpListener::bind(&bind_addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", bind_addr));

  tracing::info!("Server running on http://localhost:{}", port);

  axum::serve(listener, app)
    .await
    .expect("Server failed to start");
}
