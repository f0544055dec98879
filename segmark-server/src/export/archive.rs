//! In-memory zip packaging
//!
//! The export artifact set can be returned as one compressed archive instead
//! of being written to disk; batch results are downloadable the same way.

use segmark_common::{Error, Result};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Builder for an in-memory zip archive
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    /// Add one file entry
    pub fn add_file(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.writer
            .start_file(name, self.options)
            .map_err(|e| Error::Internal(format!("Archive entry {} failed: {}", name, e)))?;
        self.writer.write_all(bytes)?;
        Ok(())
    }

    /// Finish and return the archive bytes
    pub fn finish(self) -> Result<Vec<u8>> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| Error::Internal(format!("Archive finalize failed: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Bundle a directory tree into an in-memory zip, entry names relative to
/// `dir`
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>> {
    let mut builder = ArchiveBuilder::new();

    for entry in walkdir::WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| Error::Internal(format!("Walk failed: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let bytes = std::fs::read(entry.path())?;
        builder.add_file(&relative, &bytes)?;
    }

    builder.finish()
}
