//! Service components for the labeling backend

pub mod batch;
pub mod media_scanner;
pub mod session_store;
pub mod storage;

pub use batch::BatchEngine;
pub use media_scanner::{MediaScanner, ScanError, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
pub use session_store::{EntityState, SessionStore};
pub use storage::StorageService;
