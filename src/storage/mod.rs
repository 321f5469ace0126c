pub mod artifact;
pub mod task;

pub use artifact::{ArtifactUploader, HttpArtifactUploader, UploadedArtifact};
pub use task::{sqlite::SqliteTaskStorage, TaskStorage};
