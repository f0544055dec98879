//! Upload and output storage
//!
//! Owns the data folder layout: `uploads/` for user files keyed by generated
//! id, `outputs/` for export and batch artifacts.

use segmark_common::{Error, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File storage rooted at the configured data folder
pub struct StorageService {
    uploads: PathBuf,
    outputs: PathBuf,
}

impl StorageService {
    /// Open the storage, creating the directory layout if missing
    pub fn new(data_folder: &Path) -> Result<Self> {
        let uploads = data_folder.join("uploads");
        let outputs = data_folder.join("outputs");
        std::fs::create_dir_all(&uploads)?;
        std::fs::create_dir_all(&outputs)?;
        Ok(Self { uploads, outputs })
    }

    /// Save uploaded bytes under a fresh id, keeping the original extension.
    /// Returns (file_id, stored path).
    pub fn save_upload(&self, content: &[u8], original_name: &str) -> Result<(String, PathBuf)> {
        let file_id = Uuid::new_v4().to_string();
        let extension = Path::new(original_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();

        let path = self.uploads.join(format!("{}{}", file_id, extension));
        std::fs::write(&path, content)?;
        tracing::debug!(file_id = %file_id, path = %path.display(), "Upload stored");
        Ok((file_id, path))
    }

    /// Locate an uploaded file by id (extension is not known to callers)
    pub fn upload_path(&self, file_id: &str) -> Option<PathBuf> {
        let entries = std::fs::read_dir(&self.uploads).ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(stem) = path.file_stem() {
                if stem.to_string_lossy() == file_id {
                    return Some(path);
                }
            }
        }
        None
    }

    /// Locate an uploaded file by id, failing with NotFound when absent
    pub fn require_upload(&self, file_id: &str) -> Result<PathBuf> {
        self.upload_path(file_id)
            .ok_or_else(|| Error::NotFound(format!("File {} not found", file_id)))
    }

    /// Create a named folder under outputs/
    pub fn create_output_folder(&self, name: &str) -> Result<PathBuf> {
        let folder = self.outputs.join(name);
        std::fs::create_dir_all(&folder)?;
        Ok(folder)
    }

    pub fn outputs_root(&self) -> &Path {
        &self.outputs
    }

    /// Delete an uploaded file; no-op when the id is unknown
    pub fn delete_upload(&self, file_id: &str) -> Result<()> {
        if let Some(path) = self.upload_path(file_id) {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_locate_upload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageService::new(dir.path()).unwrap();

        let (file_id, path) = storage.save_upload(b"pixels", "photo.JPG").unwrap();
        assert!(path.to_string_lossy().ends_with(".jpg"));

        let found = storage.upload_path(&file_id).unwrap();
        assert_eq!(found, path);
        assert_eq!(std::fs::read(&found).unwrap(), b"pixels");
    }

    #[test]
    fn unknown_upload_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageService::new(dir.path()).unwrap();
        assert!(storage.upload_path("nope").is_none());
        assert!(matches!(
            storage.require_upload("nope"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn delete_upload_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageService::new(dir.path()).unwrap();
        let (file_id, _) = storage.save_upload(b"x", "a.png").unwrap();

        storage.delete_upload(&file_id).unwrap();
        assert!(storage.upload_path(&file_id).is_none());
        storage.delete_upload(&file_id).unwrap();
    }

    #[test]
    fn output_folders_are_created_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageService::new(dir.path()).unwrap();
        let folder = storage.create_output_folder("batch_x").unwrap();
        assert!(folder.starts_with(storage.outputs_root()));
        assert!(folder.is_dir());
    }
}
