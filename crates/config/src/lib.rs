// Configuration loading and local draft persistence

pub mod draft;
pub mod settings;

pub use draft::{draft_key, Draft, DraftStorage, DraftStore, FileStorage, MemoryStorage, StorageError};
pub use settings::Settings;
