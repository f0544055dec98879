//! Media file scanner
//!
//! Enumerates a folder against the fixed extension allow-list, matched
//! case-insensitively. Image extensions are always accepted; video
//! extensions only when the scanner is built with `include_video`.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Image extensions always accepted by batch enumeration
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Video extensions accepted only when include_video is set
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

/// Scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl From<ScanError> for segmark_common::Error {
    fn from(e: ScanError) -> Self {
        segmark_common::Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            e.to_string(),
        ))
    }
}

/// Folder scanner for segmentable media files
pub struct MediaScanner {
    include_video: bool,
}

impl MediaScanner {
    pub fn new(include_video: bool) -> Self {
        Self { include_video }
    }

    /// Enumerate matching files directly under `folder`, sorted by path for
    /// deterministic processing order
    pub fn scan(&self, folder: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !folder.exists() {
            return Err(ScanError::PathNotFound(folder.to_path_buf()));
        }
        if !folder.is_dir() {
            return Err(ScanError::NotADirectory(folder.to_path_buf()));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    let path = entry.into_path();
                    self.is_allowed(&path).then_some(path)
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    None
                }
            })
            .collect();

        files.sort();
        Ok(files)
    }

    fn is_allowed(&self, path: &Path) -> bool {
        let Some(ext) = path.extension() else {
            return false;
        };
        let ext = ext.to_string_lossy().to_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str())
            || (self.include_video && VIDEO_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// True for files carrying a video extension
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
        .unwrap_or(false)
}
