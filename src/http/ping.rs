use axum::routing::get;
use axum::Router;
use crate::http::ApiContext;

pub fn router() -> Router<ApiContext> {
    Router::new().route("/ping", get(ping))
}

async fn ping() -> &'static str {
    "pong"
}
