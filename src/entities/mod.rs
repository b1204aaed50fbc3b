pub mod content;
pub mod media;

pub use crate::entities::content::Section;
pub use crate::entities::media::{
    BulkDeleteOutcome, ConflictBody, DuplicateAction, ExistingFile, Media, MediaId, MediaPage,
    StoreResult, SyncReport, UploadResponse, UploadedFile,
};
