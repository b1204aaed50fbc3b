use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// A validated duplicate report: the stored file the upload collided with,
/// and what the server saw in the rejected upload. Lives only for the
/// duration of one resolution flow.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadConflict {
    pub existing: ExistingFileInfo,
    pub uploaded: UploadedFileInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExistingFileInfo {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFileInfo {
    pub original_name: String,
    pub mimetype: String,
    pub size: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConflictValidationError {
    #[error("The duplicate report from the server is not an object.")]
    NotAnObject,
    #[error("The duplicate report is missing `{0}`.")]
    MissingPart(&'static str),
    #[error("The duplicate report has a missing or empty `existingFile.{0}`.")]
    ExistingField(&'static str),
    #[error("The duplicate report has an invalid `existingFile.size`.")]
    ExistingSize,
    #[error("The duplicate report has an unparseable `existingFile.createdAt`.")]
    ExistingCreatedAt,
    #[error("The duplicate report has an invalid `existingFile.url`.")]
    ExistingUrl,
    #[error("The duplicate report has a missing or empty `uploadedFile.{0}`.")]
    UploadedField(&'static str),
    #[error("The duplicate report has an invalid `uploadedFile.size`.")]
    UploadedSize,
}

fn non_empty(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}

fn numeric_size(value: Option<&Value>) -> Option<u64> {
    let number = value?.as_f64()?;
    if number.is_finite() && number >= 0.0 {
        Some(number as u64)
    } else {
        None
    }
}

fn plausible_url(url: &str) -> bool {
    (url.starts_with('/') || url.starts_with("http://") || url.starts_with("https://"))
        && !url.chars().any(char::is_whitespace)
}

/// Structural validation of a 409 body. Malformed data is rejected, never
/// coerced: any failure here aborts the workflow before a dialog opens.
pub fn validate_conflict(value: &Value) -> Result<UploadConflict, ConflictValidationError> {
    let root = value.as_object().ok_or(ConflictValidationError::NotAnObject)?;
    let existing = root.get("existingFile")
        .and_then(|v| v.as_object())
        .ok_or(ConflictValidationError::MissingPart("existingFile"))?;
    let uploaded = root.get("uploadedFile")
        .and_then(|v| v.as_object())
        .ok_or(ConflictValidationError::MissingPart("uploadedFile"))?;

    let id = non_empty(existing, "id").ok_or(ConflictValidationError::ExistingField("id"))?;
    let url = non_empty(existing, "url").ok_or(ConflictValidationError::ExistingField("url"))?;
    if !plausible_url(&url) {
        return Err(ConflictValidationError::ExistingUrl);
    }
    let created_raw = non_empty(existing, "createdAt")
        .ok_or(ConflictValidationError::ExistingField("createdAt"))?;
    let created_at = DateTime::parse_from_rfc3339(&created_raw)
        .map_err(|_| ConflictValidationError::ExistingCreatedAt)?
        .with_timezone(&Utc);
    let existing_size = numeric_size(existing.get("size"))
        .ok_or(ConflictValidationError::ExistingSize)?;
    let name = existing.get("name")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let original_name = non_empty(uploaded, "originalName")
        .ok_or(ConflictValidationError::UploadedField("originalName"))?;
    let mimetype = non_empty(uploaded, "mimetype")
        .ok_or(ConflictValidationError::UploadedField("mimetype"))?;
    let uploaded_size = numeric_size(uploaded.get("size"))
        .filter(|size| *size > 0)
        .ok_or(ConflictValidationError::UploadedSize)?;

    Ok(UploadConflict {
        existing: ExistingFileInfo { id, name, size: existing_size, url, created_at },
        uploaded: UploadedFileInfo { original_name, mimetype, size: uploaded_size },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> Value {
        json!({
            "existingFile": {
                "id": "a1",
                "name": "photo.png",
                "size": 2_048_576,
                "url": "/up/photo.png",
                "createdAt": "2024-01-01T00:00:00Z",
            },
            "uploadedFile": {
                "originalName": "photo.png",
                "mimetype": "image/png",
                "size": 2_048_576,
            },
        })
    }

    #[test]
    fn accepts_a_well_formed_report() {
        let conflict = validate_conflict(&valid_payload()).unwrap();
        assert_eq!(conflict.existing.id, "a1");
        assert_eq!(conflict.existing.size, 2_048_576);
        assert_eq!(conflict.uploaded.original_name, "photo.png");
        assert_eq!(conflict.uploaded.mimetype, "image/png");
        assert_eq!(conflict.existing.created_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn rejects_non_objects() {
        assert_eq!(validate_conflict(&json!([])), Err(ConflictValidationError::NotAnObject));
        assert_eq!(validate_conflict(&json!("nope")), Err(ConflictValidationError::NotAnObject));
    }

    #[test]
    fn rejects_missing_parts() {
        let mut payload = valid_payload();
        payload.as_object_mut().unwrap().remove("uploadedFile");
        assert_eq!(validate_conflict(&payload), Err(ConflictValidationError::MissingPart("uploadedFile")));
    }

    #[test]
    fn rejects_missing_existing_id() {
        let mut payload = valid_payload();
        payload["existingFile"]["id"] = json!("");
        assert_eq!(validate_conflict(&payload), Err(ConflictValidationError::ExistingField("id")));
    }

    #[test]
    fn rejects_non_numeric_size() {
        let mut payload = valid_payload();
        payload["existingFile"]["size"] = json!("2048576");
        assert_eq!(validate_conflict(&payload), Err(ConflictValidationError::ExistingSize));

        let mut payload = valid_payload();
        payload["existingFile"]["size"] = json!(-1);
        assert_eq!(validate_conflict(&payload), Err(ConflictValidationError::ExistingSize));
    }

    #[test]
    fn rejects_unparseable_created_at() {
        let mut payload = valid_payload();
        payload["existingFile"]["createdAt"] = json!("yesterday");
        assert_eq!(validate_conflict(&payload), Err(ConflictValidationError::ExistingCreatedAt));
    }

    #[test]
    fn rejects_invalid_url() {
        let mut payload = valid_payload();
        payload["existingFile"]["url"] = json!("not a url");
        assert_eq!(validate_conflict(&payload), Err(ConflictValidationError::ExistingUrl));
    }

    #[test]
    fn rejects_zero_size_upload() {
        let mut payload = valid_payload();
        payload["uploadedFile"]["size"] = json!(0);
        assert_eq!(validate_conflict(&payload), Err(ConflictValidationError::UploadedSize));
    }

    #[test]
    fn rejects_empty_uploaded_mimetype() {
        let mut payload = valid_payload();
        payload["uploadedFile"]["mimetype"] = json!("");
        assert_eq!(validate_conflict(&payload), Err(ConflictValidationError::UploadedField("mimetype")));
    }
}
