use std::str::FromStr;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::Value;
use crate::entities::content::validate_section;
use crate::entities::Section;
use crate::http::error::ApiError;
use crate::http::{ApiContext, Result};

pub fn router() -> Router<ApiContext> {
    Router::new()
        .route("/api/services/health", get(health))
        .route("/api/services/publish", post(publish))
        .route("/api/services/:section", get(get_section).put(put_section))
}

fn parse_section(raw: &str) -> Result<Section> {
    Section::from_str(raw).map_err(|_| ApiError::NotFound)
}

async fn get_section(
    State(ctx): State<ApiContext>,
    Path(section): Path<String>,
) -> Result<Json<Value>> {
    let section = parse_section(&section)?;
    let store = ctx.store.read().await;
    Ok(Json(store.get_section(section)))
}

async fn put_section(
    State(ctx): State<ApiContext>,
    Path(section): Path<String>,
    Json(content): Json<Value>,
) -> Result<Json<Value>> {
    let section = parse_section(&section)?;
    let errors = validate_section(section, &content);
    if !errors.is_empty() {
        return Err(ApiError::unprocessable_entity(errors));
    }
    let mut store = ctx.store.write().await;
    store.put_section(section, content.clone()).await?;
    Ok(Json(content))
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishReport {
    published: Vec<Section>,
    at: DateTime<Utc>,
}

async fn publish(State(ctx): State<ApiContext>) -> Result<Json<PublishReport>> {
    let mut store = ctx.store.write().await;
    let at = store.publish().await?;
    Ok(Json(PublishReport { published: Section::ALL.to_vec(), at }))
}

#[derive(serde::Serialize)]
struct Health {
    status: &'static str,
    sections: usize,
    media: usize,
}

async fn health(State(ctx): State<ApiContext>) -> Result<Json<Health>> {
    let store = ctx.store.read().await;
    Ok(Json(Health {
        status: "ok",
        sections: store.section_count(),
        media: store.media_count(),
    }))
}
