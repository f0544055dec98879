//! Mask rendering and export pipeline
//!
//! Turns a list of instances plus the source image into the full artifact
//! set: overlay composite, labeled overlay, instance-id map, combined mask,
//! per-instance masks, and a metadata record. The identical set goes either
//! under a target directory or into one in-memory zip archive — the caller
//! selects the sink.

pub mod archive;
pub mod coco;
pub mod color;
pub mod glyphs;
pub mod overlay;
pub mod raster;

use image::{GrayImage, RgbaImage};
use segmark_common::{Error, Result};
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::models::{BBox, Instance, InstancePayload};

pub use archive::{zip_directory, ArchiveBuilder};
pub use coco::CocoDataset;

/// Fixed artifact file names within an export
pub const OVERLAY_FILE: &str = "overlay_visualization.png";
pub const LABELED_OVERLAY_FILE: &str = "overlay_with_labels.png";
pub const INSTANCE_MAP_FILE: &str = "instance_map.png";
pub const COMBINED_MASK_FILE: &str = "combined_mask.png";
pub const METADATA_FILE: &str = "metadata.json";
pub const MASKS_DIR: &str = "masks";

/// Per-instance metadata record
#[derive(Debug, Clone, Serialize)]
pub struct InstanceMetadata {
    pub id: usize,
    pub score: f32,
    pub bbox: BBox,
    /// Pixel count of the normalized mask
    pub area: usize,
}

/// Top-level metadata record for one export
#[derive(Debug, Clone, Serialize)]
pub struct ExportMetadata {
    pub entity_id: String,
    pub prompt: Option<String>,
    pub instance_count: usize,
    pub width: u32,
    pub height: u32,
    pub instances: Vec<InstanceMetadata>,
}

/// The rendered artifact set, sink-agnostic
pub struct ArtifactSet {
    pub overlay: RgbaImage,
    pub labeled_overlay: RgbaImage,
    pub instance_map: GrayImage,
    pub combined_mask: GrayImage,
    pub instance_masks: Vec<GrayImage>,
    pub metadata: ExportMetadata,
}

/// Pipeline step 1: normalize raw instance payloads to the source image
/// shape, assigning indices in payload order
pub fn normalize_instances(
    payloads: &[InstancePayload],
    width: u32,
    height: u32,
) -> Vec<Instance> {
    payloads
        .iter()
        .enumerate()
        .map(|(index, payload)| Instance {
            index,
            mask: payload.mask.binarize(height as usize, width as usize),
            bbox: payload.bbox,
            score: payload.score,
            label: payload.label.clone().unwrap_or_default(),
        })
        .collect()
}

/// Render the full artifact set for normalized instances
pub fn render(
    source: &RgbaImage,
    instances: &[Instance],
    entity_id: &str,
    prompt: Option<&str>,
) -> ArtifactSet {
    let (width, height) = source.dimensions();

    let metadata = ExportMetadata {
        entity_id: entity_id.to_string(),
        prompt: prompt.map(str::to_string),
        instance_count: instances.len(),
        width,
        height,
        instances: instances
            .iter()
            .map(|instance| InstanceMetadata {
                id: instance.index,
                score: instance.score,
                bbox: instance.bbox,
                area: instance.mask.area(),
            })
            .collect(),
    };

    ArtifactSet {
        overlay: overlay::render_overlay(source, instances),
        labeled_overlay: overlay::render_labeled_overlay(source, instances),
        instance_map: raster::instance_map(instances, width, height),
        combined_mask: raster::combined_mask(instances, width, height),
        instance_masks: instances
            .iter()
            .map(|instance| raster::mask_to_gray(&instance.mask))
            .collect(),
        metadata,
    }
}

/// Write the artifact set under `dir`, returning the created files
pub fn write_to_dir(set: &ArtifactSet, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let masks_dir = dir.join(MASKS_DIR);
    std::fs::create_dir_all(&masks_dir)?;

    let mut written = Vec::new();
    for (name, bytes) in artifact_entries(set)? {
        let path = dir.join(&name);
        std::fs::write(&path, bytes)?;
        written.push(path);
    }
    Ok(written)
}

/// Bundle the artifact set into one in-memory zip archive
pub fn to_archive(set: &ArtifactSet) -> Result<Vec<u8>> {
    let mut builder = ArchiveBuilder::new();
    for (name, bytes) in artifact_entries(set)? {
        builder.add_file(&name, &bytes)?;
    }
    builder.finish()
}

/// The artifact set as (relative name, bytes) entries — one source of truth
/// for both sinks
fn artifact_entries(set: &ArtifactSet) -> Result<Vec<(String, Vec<u8>)>> {
    let mut entries = vec![
        (OVERLAY_FILE.to_string(), rgba_png_bytes(&set.overlay)?),
        (
            LABELED_OVERLAY_FILE.to_string(),
            rgba_png_bytes(&set.labeled_overlay)?,
        ),
        (
            INSTANCE_MAP_FILE.to_string(),
            gray_png_bytes(&set.instance_map)?,
        ),
        (
            COMBINED_MASK_FILE.to_string(),
            gray_png_bytes(&set.combined_mask)?,
        ),
    ];

    for (idx, mask) in set.instance_masks.iter().enumerate() {
        entries.push((
            format!("{}/mask_{:02}.png", MASKS_DIR, idx),
            gray_png_bytes(mask)?,
        ));
    }

    let metadata = serde_json::to_vec_pretty(&set.metadata)
        .map_err(|e| Error::Internal(format!("Metadata serialization failed: {}", e)))?;
    entries.push((METADATA_FILE.to_string(), metadata));

    Ok(entries)
}

fn rgba_png_bytes(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| Error::Internal(format!("PNG encode failed: {}", e)))?;
    Ok(bytes)
}

fn gray_png_bytes(img: &GrayImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|e| Error::Internal(format!("PNG encode failed: {}", e)))?;
    Ok(bytes)
}

/// Encode one grayscale mask as PNG bytes (batch per-prompt mask files)
pub fn mask_png_bytes(mask: &GrayImage) -> Result<Vec<u8>> {
    gray_png_bytes(mask)
}

/// Make a prompt or file stem safe as a path component
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MaskGrid;
    use image::Rgba;

    fn payload(rows: Vec<Vec<f32>>, score: f32) -> InstancePayload {
        InstancePayload {
            mask: MaskGrid { rows },
            bbox: BBox {
                x1: 0.0,
                y1: 0.0,
                x2: 2.0,
                y2: 2.0,
            },
            score,
            label: Some("cat".to_string()),
        }
    }

    #[test]
    fn metadata_area_matches_resized_mask() {
        // 1x1 full mask resized to 4x4 -> 16 pixels
        let payloads = vec![payload(vec![vec![1.0]], 0.9)];
        let instances = normalize_instances(&payloads, 4, 4);
        let source = RgbaImage::from_pixel(4, 4, Rgba([5, 5, 5, 255]));
        let set = render(&source, &instances, "img-1", Some("cat"));

        assert_eq!(set.metadata.instance_count, 1);
        assert_eq!(set.metadata.instances[0].area, 16);
        assert_eq!(set.metadata.instances[0].id, 0);
        assert_eq!(set.metadata.width, 4);
    }

    #[test]
    fn directory_sink_writes_full_artifact_set() {
        let dir = tempfile::tempdir().unwrap();
        let payloads = vec![payload(vec![vec![1.0]], 0.9), payload(vec![vec![1.0]], 0.8)];
        let instances = normalize_instances(&payloads, 3, 3);
        let source = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        let set = render(&source, &instances, "img-1", None);

        write_to_dir(&set, dir.path()).unwrap();

        for name in [
            OVERLAY_FILE,
            LABELED_OVERLAY_FILE,
            INSTANCE_MAP_FILE,
            COMBINED_MASK_FILE,
            METADATA_FILE,
        ] {
            assert!(dir.path().join(name).is_file(), "missing {}", name);
        }
        assert!(dir.path().join("masks/mask_00.png").is_file());
        assert!(dir.path().join("masks/mask_01.png").is_file());
    }

    #[test]
    fn archive_sink_mirrors_directory_layout() {
        let payloads = vec![payload(vec![vec![1.0]], 0.9)];
        let instances = normalize_instances(&payloads, 2, 2);
        let source = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let set = render(&source, &instances, "img-1", None);

        let bytes = to_archive(&set).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();

        assert!(names.contains(&OVERLAY_FILE.to_string()));
        assert!(names.contains(&"masks/mask_00.png".to_string()));
        assert!(names.contains(&METADATA_FILE.to_string()));
    }

    #[test]
    fn sanitize_component_strips_path_separators() {
        assert_eq!(sanitize_component("red car"), "red_car");
        assert_eq!(sanitize_component("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_component(""), "_");
        assert_eq!(sanitize_component("dog-2.v1"), "dog-2.v1");
    }
}
