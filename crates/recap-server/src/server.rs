use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    serve, Router,
};
use chrono::{DateTime, Utc};
use recap_db::DatabaseManager;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::ingest::AudioIngestor;
use crate::pipeline::JobPipeline;
use crate::routes;

pub struct AppState {
    pub db: Arc<DatabaseManager>,
    pub ingestor: Arc<AudioIngestor>,
    pub pipeline: Arc<JobPipeline>,
    pub app_start_time: DateTime<Utc>,
}

pub struct Server {
    state: Arc<AppState>,
    addr: SocketAddr,
    max_body_bytes: usize,
}

impl Server {
    pub fn new(
        db: Arc<DatabaseManager>,
        ingestor: Arc<AudioIngestor>,
        pipeline: Arc<JobPipeline>,
        addr: SocketAddr,
        max_body_bytes: usize,
    ) -> Self {
        Server {
            state: Arc::new(AppState {
                db,
                ingestor,
                pipeline,
                app_start_time: Utc::now(),
            }),
            addr,
            max_body_bytes,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/upload", post(routes::meetings::upload))
            .route("/status/:task_id", get(routes::meetings::check_status))
            .route("/meetings", get(routes::meetings::list_meetings))
            .route(
                "/meetings/:id",
                get(routes::meetings::get_meeting).delete(routes::meetings::delete_meeting),
            )
            .route("/health", get(routes::health::health_check))
            .route("/ws", get(routes::websocket::ws_live_handler))
            // Oversized uploads are rejected at the transport with 413.
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let app = self.router();
        info!("starting server on {}", self.addr);
        serve(
            TcpListener::bind(self.addr).await?,
            app.into_make_service(),
        )
        .await?;
        Ok(())
    }
}
