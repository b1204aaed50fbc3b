use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use mime::Mime;
use crate::entities::media::{is_allowed_mime, MAX_UPLOAD_SIZE_IN_BYTES};
use crate::entities::{
    BulkDeleteOutcome, ConflictBody, DuplicateAction, MediaId, MediaPage, StoreResult, SyncReport,
    UploadResponse,
};
use crate::http::error::ApiError;
use crate::http::{ApiContext, Result};
use crate::store::NewUpload;
use crate::thumbnails::{self, ThumbnailReport, ThumbnailStatus};

// Leaves room for multipart framing around a full-size file.
const MAX_BODY_SIZE: usize = MAX_UPLOAD_SIZE_IN_BYTES as usize + 1_048_576;

pub fn router() -> Router<ApiContext> {
    Router::new()
        .route("/media", get(list_media).post(create_media))
        .route("/media/bulk/delete", delete(bulk_delete))
        .route("/media/sync", post(sync_media))
        .route("/media/check-thumbnails", get(check_thumbnails))
        .route("/media/regenerate-thumbnails", post(regenerate_thumbnails))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
}

#[derive(serde::Deserialize, Debug, Default)]
struct Pagination {
    page_size: Option<usize>,
    page_index: Option<usize>,
}

#[derive(serde::Deserialize, Debug)]
struct BulkDeleteRequest {
    ids: Vec<MediaId>,
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::unprocessable_entity([("file", format!("multipart error: {}", err))])
}

fn resolve_upload_mime(filename: &str, declared: Option<&str>, content: &[u8]) -> Mime {
    declared
        .and_then(|x| x.parse::<Mime>().ok())
        .or_else(|| mime_guess::from_path(filename).first())
        .or_else(|| infer::get(content).and_then(|x| x.mime_type().parse().ok()))
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

async fn create_media(
    State(ctx): State<ApiContext>,
    mut parts: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut display_name: Option<String> = None;
    let mut alt: Option<String> = None;
    let mut description: Option<String> = None;
    let mut action: Option<DuplicateAction> = None;

    while let Some(field) = parts.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(|x| x.to_string());
        match field_name.as_deref() {
            Some("file") => {
                let filename = field.file_name()
                    .ok_or_else(|| ApiError::unprocessable_entity([("file", "filename is empty")]))?
                    .to_string();
                let declared = field.content_type().map(|x| x.to_string());
                let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
                file = Some((filename, declared, bytes));
            }
            Some("name") => display_name = Some(field.text().await.map_err(multipart_error)?),
            Some("alt") => alt = Some(field.text().await.map_err(multipart_error)?),
            Some("description") => description = Some(field.text().await.map_err(multipart_error)?),
            Some("action") => {
                let text = field.text().await.map_err(multipart_error)?;
                let parsed = text.parse::<DuplicateAction>()
                    .map_err(|e| ApiError::unprocessable_entity([("action", e)]))?;
                action = Some(parsed);
            }
            _ => {}
        }
    }

    let (filename, declared, bytes) = file
        .ok_or_else(|| ApiError::unprocessable_entity([("file", "missing file")]))?;
    if bytes.len() as u64 > MAX_UPLOAD_SIZE_IN_BYTES {
        return Err(ApiError::PayloadTooLarge);
    }
    let mime = resolve_upload_mime(&filename, declared.as_deref(), &bytes);
    if !is_allowed_mime(&mime) {
        return Err(ApiError::UnsupportedMediaType { mime: mime.to_string() });
    }

    let original_name = display_name
        .filter(|x| !x.trim().is_empty())
        .unwrap_or_else(|| filename.clone());
    let mime_str = mime.to_string();
    let size = bytes.len() as i64;

    let mut store = ctx.store.write().await;
    let result = store
        .store_upload(&bytes, NewUpload {
            original_name: &original_name,
            declared_mime: Some(&mime_str),
            alt: alt.filter(|x| !x.is_empty()),
            description: description.filter(|x| !x.is_empty()),
            action,
        })
        .await?;

    match result {
        StoreResult::Duplicate { existing } => {
            Err(ApiError::conflict(&ConflictBody::new(&existing, &original_name, &mime_str, size)))
        }
        StoreResult::Created(media) => {
            Ok((StatusCode::CREATED, Json(UploadResponse { media, replaced: false, renamed: false })))
        }
        StoreResult::Replaced(media) => {
            Ok((StatusCode::CREATED, Json(UploadResponse { media, replaced: true, renamed: false })))
        }
        StoreResult::Renamed(media) => {
            Ok((StatusCode::CREATED, Json(UploadResponse { media, replaced: false, renamed: true })))
        }
    }
}

async fn list_media(
    State(ctx): State<ApiContext>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<MediaPage>> {
    let page_size = pagination.page_size.unwrap_or(10).clamp(1, 50);
    let page_index = pagination.page_index.unwrap_or(0);
    let store = ctx.store.read().await;
    let items = store.list_media(page_size, page_index);
    Ok(Json(MediaPage {
        items,
        total: store.media_count(),
        page_size,
        page_index,
    }))
}

async fn bulk_delete(
    State(ctx): State<ApiContext>,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteOutcome>> {
    let mut store = ctx.store.write().await;
    let outcome = store.bulk_delete(&req.ids).await?;
    Ok(Json(outcome))
}

async fn sync_media(State(ctx): State<ApiContext>) -> Result<Json<SyncReport>> {
    let mut store = ctx.store.write().await;
    let report = store.sync_upload_dir().await?;
    Ok(Json(report))
}

async fn check_thumbnails(State(ctx): State<ApiContext>) -> Result<Json<ThumbnailStatus>> {
    let store = ctx.store.read().await;
    Ok(Json(thumbnails::check(&store)))
}

async fn regenerate_thumbnails(State(ctx): State<ApiContext>) -> Result<Json<ThumbnailReport>> {
    let store = ctx.store.read().await;
    Ok(Json(thumbnails::generate_missing(&store)))
}
