use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::entities::Media;
use crate::storage::Storage;
use crate::store::CmsStore;

/// Bounding box for generated thumbnails, longest edge in pixels.
pub const THUMBNAIL_EDGE: u32 = 320;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailReport {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailStatus {
    pub total: usize,
    pub missing: usize,
    pub media_ids: Vec<String>,
}

pub fn check<S: Storage>(store: &CmsStore<S>) -> ThumbnailStatus {
    let missing: Vec<Media> = store.media_without_thumbnail();
    ThumbnailStatus {
        total: store.media_count(),
        missing: missing.len(),
        media_ids: missing.into_iter().map(|m| m.id).collect(),
    }
}

/// Renders PNG thumbnails for image media that lack one. Videos need an
/// external frame grabber and are counted as skipped.
pub fn generate_missing<S: Storage>(store: &CmsStore<S>) -> ThumbnailReport {
    let mut report = ThumbnailReport::default();
    for media in store.media_without_thumbnail() {
        if !media.mime_type.starts_with("image/") {
            report.skipped += 1;
            continue;
        }
        match render_thumbnail(store, &media) {
            Ok(()) => report.generated += 1,
            Err(err) => {
                warn!("thumbnail for {} failed: {}", media.id, err);
                report.failed += 1;
            }
        }
    }
    report
}

fn render_thumbnail<S: Storage>(store: &CmsStore<S>, media: &Media) -> Result<(), image::ImageError> {
    let img = image::open(store.media_path(media))?;
    let thumb = img.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE);
    thumb.save(store.thumbnail_path(&media.id))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::entities::{DuplicateAction, StoreResult};
    use crate::storage::InMemoryStorage;
    use crate::store::NewUpload;
    use image::{ImageBuffer, Rgb};

    fn upload<'a>(name: &'a str, mime: &'a str) -> NewUpload<'a> {
        NewUpload {
            original_name: name,
            declared_mime: Some(mime),
            alt: None,
            description: None,
            action: None::<DuplicateAction>,
        }
    }

    #[tokio::test]
    async fn generates_for_images_and_skips_videos() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::new(dir.path().to_str().unwrap(), "uploads", "127.0.0.1:0", "http://127.0.0.1:0").unwrap();
        let mut store = CmsStore::new(&cfg, InMemoryStorage::default());

        let img = ImageBuffer::from_pixel(640, 480, Rgb([10u8, 20, 30]));
        let mut png_bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageOutputFormat::Png).unwrap();

        let StoreResult::Created(photo) = store.store_upload(&png_bytes, upload("shot.png", "image/png")).await.unwrap() else {
            panic!("expected created")
        };
        store.store_upload(b"not really a video", upload("clip.mp4", "video/mp4")).await.unwrap();

        let before = check(&store);
        assert_eq!(before.total, 2);
        assert_eq!(before.missing, 2);

        let report = generate_missing(&store);
        assert_eq!(report.generated, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert!(store.thumbnail_path(&photo.id).exists());

        let after = check(&store);
        assert_eq!(after.missing, 1);
    }

    #[tokio::test]
    async fn undecodable_image_counts_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::new(dir.path().to_str().unwrap(), "uploads", "127.0.0.1:0", "http://127.0.0.1:0").unwrap();
        let mut store = CmsStore::new(&cfg, InMemoryStorage::default());

        store.store_upload(b"garbage bytes", upload("broken.png", "image/png")).await.unwrap();
        let report = generate_missing(&store);
        assert_eq!(report.failed, 1);
        assert_eq!(report.generated, 0);
    }
}
