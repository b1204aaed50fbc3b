use std::borrow::Cow;
use std::collections::HashMap;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;
use crate::entities::ConflictBody;
use crate::error::FolioError;
use crate::http::{APPLICATION_JSON, CONTENT_TYPE_HEADER};

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("request path not found")]
    NotFound,

    #[error("a stored file matches this upload")]
    Conflict {
        serialized_conflict: String,
    },

    #[error("error in the request body")]
    UnprocessableEntity {
        errors: HashMap<Cow<'static, str>, Vec<Cow<'static, str>>>,
    },

    #[error("uploaded file is too large")]
    PayloadTooLarge,

    #[error("unsupported media type: {mime}")]
    UnsupportedMediaType {
        mime: String,
    },

    #[error("an error occurred with storage: {0}")]
    Store(#[from] FolioError),

    #[error("an internal server error occurred: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl ApiError {
    pub fn conflict(body: &ConflictBody) -> Self {
        let serialized_conflict = serde_json::to_string(body)
            .unwrap_or_else(|_| "{}".to_string());
        Self::Conflict { serialized_conflict }
    }

    pub fn unprocessable_entity<K, V>(errors: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Cow<'static, str>>,
        V: Into<Cow<'static, str>>,
    {
        let mut error_map = HashMap::new();

        for (key, val) in errors {
            error_map
                .entry(key.into())
                .or_insert_with(Vec::new)
                .push(val.into());
        }

        Self::UnprocessableEntity { errors: error_map }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Store(_) | Self::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::UnprocessableEntity { errors } => {
                #[derive(serde::Serialize)]
                struct Errors {
                    errors: HashMap<Cow<'static, str>, Vec<Cow<'static, str>>>,
                }

                return (StatusCode::UNPROCESSABLE_ENTITY, Json(Errors { errors })).into_response();
            }

            Self::Conflict { serialized_conflict } => {
                let mut response = (StatusCode::CONFLICT, serialized_conflict).into_response();
                response.headers_mut().insert(CONTENT_TYPE_HEADER, HeaderValue::from_static(APPLICATION_JSON));
                return response;
            }

            Self::Store(ref e) => {
                error!("Storage error: {:?}", e);
            }

            Self::Anyhow(ref e) => {
                error!("Generic error: {:?}", e);
            }

            _ => (),
        }

        (self.status_code(), self.to_string()).into_response()
    }
}
