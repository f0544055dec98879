//! Mask and instance types
//!
//! Masks arrive from the inference engine as float score grids of arbitrary
//! shape. Before any pixel-level computation they are normalized to the
//! source image's exact (height, width) by nearest-neighbor resize and
//! re-binarized at the 50% threshold.

use serde::{Deserialize, Serialize};

/// Bounding box in pixel coordinates, corner form (x1, y1, x2, y2)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Corner form to (x, y, width, height), the COCO bbox convention
    pub fn to_xywh(&self) -> [f32; 4] {
        [self.x1, self.y1, self.width(), self.height()]
    }
}

/// Raw mask grid as produced by the inference engine: rows of per-pixel
/// scores in [0, 1]. Wire format is nested JSON arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskGrid {
    pub rows: Vec<Vec<f32>>,
}

impl MaskGrid {
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Normalize to the target shape: nearest-neighbor resize when the shape
    /// differs, then re-binarize at the 50% threshold.
    pub fn binarize(&self, height: usize, width: usize) -> BitMask {
        let src_h = self.height();
        let src_w = self.width();
        let mut mask = BitMask::new(height, width);

        if src_h == 0 || src_w == 0 || height == 0 || width == 0 {
            return mask;
        }

        for y in 0..height {
            let sy = if src_h == height { y } else { y * src_h / height };
            let row = &self.rows[sy];
            for x in 0..width {
                let sx = if src_w == width { x } else { x * src_w / width };
                let score = row.get(sx).copied().unwrap_or(0.0);
                if score > 0.5 {
                    mask.set(y, x, true);
                }
            }
        }

        mask
    }
}

/// Binarized mask over the source image's exact (height, width), row-major
#[derive(Debug, Clone, PartialEq)]
pub struct BitMask {
    height: usize,
    width: usize,
    bits: Vec<bool>,
}

impl BitMask {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            bits: vec![false; height * width],
        }
    }

    /// Build from nested boolean rows; all rows must share one width
    pub fn from_rows(rows: &[Vec<bool>]) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut mask = Self::new(height, width);
        for (y, row) in rows.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                mask.set(y, x, v);
            }
        }
        mask
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn get(&self, y: usize, x: usize) -> bool {
        self.bits[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, y: usize, x: usize, value: bool) {
        self.bits[y * self.width + x] = value;
    }

    /// Count of set pixels
    pub fn area(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Mean (row, column) of set pixels; None when the mask is empty
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let mut count = 0usize;
        let mut sum_y = 0f64;
        let mut sum_x = 0f64;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(y, x) {
                    count += 1;
                    sum_y += y as f64;
                    sum_x += x as f64;
                }
            }
        }
        if count == 0 {
            return None;
        }
        Some((sum_y / count as f64, sum_x / count as f64))
    }

    /// Nested 0/1 rows for JSON responses
    pub fn to_rows_u8(&self) -> Vec<Vec<u8>> {
        (0..self.height)
            .map(|y| (0..self.width).map(|x| u8::from(self.get(y, x))).collect())
            .collect()
    }
}

/// One detected object: normalized mask, box, score, source prompt, and a
/// 0-based index assigned in result order after confidence filtering.
/// The index is stable only within one request or job unit.
#[derive(Debug, Clone)]
pub struct Instance {
    pub index: usize,
    pub mask: BitMask,
    pub bbox: BBox,
    pub score: f32,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[f32]]) -> MaskGrid {
        MaskGrid {
            rows: rows.iter().map(|r| r.to_vec()).collect(),
        }
    }

    #[test]
    fn binarize_same_shape_thresholds_at_half() {
        let g = grid(&[&[0.9, 0.4], &[0.51, 0.5]]);
        let mask = g.binarize(2, 2);
        assert!(mask.get(0, 0));
        assert!(!mask.get(0, 1));
        assert!(mask.get(1, 0));
        // exactly 0.5 is below the strict 50% threshold
        assert!(!mask.get(1, 1));
    }

    #[test]
    fn binarize_resizes_nearest_neighbor() {
        // 2x2 source upsampled to 4x4: each source pixel becomes a 2x2 block
        let g = grid(&[&[1.0, 0.0], &[0.0, 1.0]]);
        let mask = g.binarize(4, 4);
        assert_eq!(mask.area(), 8);
        assert!(mask.get(0, 0) && mask.get(1, 1));
        assert!(!mask.get(0, 2) && !mask.get(1, 3));
        assert!(mask.get(2, 2) && mask.get(3, 3));
        assert!(!mask.get(3, 0));
    }

    #[test]
    fn binarize_downsamples() {
        let g = grid(&[
            &[1.0, 1.0, 0.0, 0.0],
            &[1.0, 1.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0],
            &[0.0, 0.0, 0.0, 0.0],
        ]);
        let mask = g.binarize(2, 2);
        assert!(mask.get(0, 0));
        assert!(!mask.get(0, 1));
        assert!(!mask.get(1, 0));
        assert!(!mask.get(1, 1));
    }

    #[test]
    fn centroid_of_plus_shape() {
        let mut mask = BitMask::new(3, 3);
        mask.set(0, 1, true);
        mask.set(1, 0, true);
        mask.set(1, 1, true);
        mask.set(1, 2, true);
        mask.set(2, 1, true);
        let (cy, cx) = mask.centroid().unwrap();
        assert!((cy - 1.0).abs() < 1e-9);
        assert!((cx - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_mask_has_no_centroid() {
        assert!(BitMask::new(4, 4).centroid().is_none());
        assert_eq!(BitMask::new(4, 4).area(), 0);
    }

    #[test]
    fn bbox_xywh_conversion() {
        let b = BBox {
            x1: 10.0,
            y1: 20.0,
            x2: 30.0,
            y2: 25.0,
        };
        assert_eq!(b.to_xywh(), [10.0, 20.0, 20.0, 5.0]);
    }
}
