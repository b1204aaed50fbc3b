use std::sync::Arc;
use anyhow::Context;
use axum::Router;
use axum_macros::FromRef;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use crate::config::AppConfig;
use crate::storage::FileStorage;
use crate::store::CmsStore;

mod content;
mod error;
mod media;
mod ping;

pub use error::ApiError;

pub const CONTENT_TYPE_HEADER: &str = "content-type";
pub const APPLICATION_JSON: &str = "application/json";

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Clone, FromRef)]
pub struct ApiContext {
    pub cfg: Arc<AppConfig>,
    pub store: Arc<RwLock<CmsStore<FileStorage>>>,
}

impl ApiContext {
    pub fn new(cfg: AppConfig, store: CmsStore<FileStorage>) -> Self {
        Self {
            cfg: Arc::new(cfg),
            store: Arc::new(RwLock::new(store)),
        }
    }
}

/// The full application router, shared between `serve` and the tests.
pub fn app(ctx: ApiContext) -> Router {
    let uploads = ServeDir::new(&ctx.cfg.upload_dir);
    api_router()
        .nest_service("/uploads", uploads)
        .layer(CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(Any))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(ctx)
}

pub async fn serve(ctx: ApiContext) -> anyhow::Result<()> {
    let bind = ctx.cfg.bind.clone();
    let router = app(ctx);
    let listener = tokio::net::TcpListener::bind(&bind).await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("listening on {}", &bind);
    axum::serve(listener, router)
        .await
        .context("error running HTTP server")
}

fn api_router() -> Router<ApiContext> {
    ping::router()
        .merge(media::router())
        .merge(content::router())
}
