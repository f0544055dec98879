//! COCO dataset-interchange serialization
//!
//! Categories come from the job's prompt list (category id = prompt index
//! + 1). Annotation ids are one counter starting at 1, incremented per
//! written annotation across the whole job — never reset per file.

use segmark_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::Instance;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoDataset {
    pub images: Vec<CocoImage>,
    pub annotations: Vec<CocoAnnotation>,
    pub categories: Vec<CocoCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoImage {
    pub id: usize,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoAnnotation {
    pub id: u64,
    pub image_id: usize,
    pub category_id: usize,
    /// [x, y, width, height]
    pub bbox: [f32; 4],
    /// Bounding-box area (width × height)
    pub area: f32,
    pub iscrowd: u8,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoCategory {
    pub id: usize,
    pub name: String,
    pub supercategory: String,
}

impl CocoDataset {
    /// Seed a dataset with one category per prompt
    pub fn from_prompts(prompts: &[String]) -> Self {
        Self {
            categories: prompts
                .iter()
                .enumerate()
                .map(|(idx, prompt)| CocoCategory {
                    id: idx + 1,
                    name: prompt.clone(),
                    supercategory: "object".to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn add_image(&mut self, id: usize, file_name: &str, width: u32, height: u32) {
        self.images.push(CocoImage {
            id,
            file_name: file_name.to_string(),
            width,
            height,
        });
    }

    /// Append annotations for one unit's instances, advancing the shared
    /// annotation id counter
    pub fn add_instances(
        &mut self,
        image_id: usize,
        category_id: usize,
        instances: &[Instance],
        next_annotation_id: &mut u64,
    ) {
        for instance in instances {
            let bbox = instance.bbox.to_xywh();
            self.annotations.push(CocoAnnotation {
                id: *next_annotation_id,
                image_id,
                category_id,
                bbox,
                area: bbox[2] * bbox[3],
                iscrowd: 0,
                score: instance.score,
            });
            *next_annotation_id += 1;
        }
    }

    /// Serialize to pretty JSON at `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Internal(format!("COCO serialization failed: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BBox, BitMask};

    fn instance(index: usize) -> Instance {
        Instance {
            index,
            mask: BitMask::new(1, 1),
            bbox: BBox {
                x1: 10.0,
                y1: 20.0,
                x2: 30.0,
                y2: 50.0,
            },
            score: 0.75,
            label: "cat".to_string(),
        }
    }

    #[test]
    fn categories_come_from_prompts() {
        let dataset = CocoDataset::from_prompts(&["cat".to_string(), "dog".to_string()]);
        assert_eq!(dataset.categories.len(), 2);
        assert_eq!(dataset.categories[0].id, 1);
        assert_eq!(dataset.categories[0].name, "cat");
        assert_eq!(dataset.categories[1].id, 2);
        assert_eq!(dataset.categories[0].supercategory, "object");
    }

    #[test]
    fn annotation_ids_are_a_single_counter() {
        let mut dataset = CocoDataset::from_prompts(&["cat".to_string()]);
        let mut next_id = 1;
        dataset.add_instances(0, 1, &[instance(0), instance(1)], &mut next_id);
        dataset.add_instances(1, 1, &[instance(0)], &mut next_id);

        let ids: Vec<u64> = dataset.annotations.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(next_id, 4);
    }

    #[test]
    fn annotation_bbox_is_xywh_with_box_area() {
        let mut dataset = CocoDataset::default();
        let mut next_id = 1;
        dataset.add_instances(3, 2, &[instance(0)], &mut next_id);

        let ann = &dataset.annotations[0];
        assert_eq!(ann.bbox, [10.0, 20.0, 20.0, 30.0]);
        assert_eq!(ann.area, 600.0);
        assert_eq!(ann.iscrowd, 0);
        assert_eq!(ann.image_id, 3);
        assert_eq!(ann.category_id, 2);
    }

    #[test]
    fn writes_parseable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.json");
        let dataset = CocoDataset::from_prompts(&["cat".to_string()]);
        dataset.write_to(&path).unwrap();

        let parsed: CocoDataset =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.categories.len(), 1);
        assert!(parsed.images.is_empty());
        assert!(parsed.annotations.is_empty());
    }
}
