//! Pixel-level mask rasterization
//!
//! All functions operate on normalized BitMasks (already resized to the
//! source image shape and re-binarized).

use image::GrayImage;

use crate::models::{BitMask, Instance};

/// Border pixels of a mask: set pixels lying on the image boundary, or with
/// at least one 4-connected neighbor outside the mask
pub fn edge_mask(mask: &BitMask) -> BitMask {
    let height = mask.height();
    let width = mask.width();
    let mut edges = BitMask::new(height, width);

    for y in 0..height {
        for x in 0..width {
            if !mask.get(y, x) {
                continue;
            }
            let on_boundary = y == 0 || x == 0 || y == height - 1 || x == width - 1;
            let interior = !on_boundary
                && mask.get(y - 1, x)
                && mask.get(y + 1, x)
                && mask.get(y, x - 1)
                && mask.get(y, x + 1);
            if on_boundary || !interior {
                edges.set(y, x, true);
            }
        }
    }

    edges
}

/// Single-channel map of which instance covers each pixel: 0 for background,
/// otherwise the 1-based index of the highest-index covering instance
/// (later instances overwrite earlier ones on overlap)
pub fn instance_map(instances: &[Instance], width: u32, height: u32) -> GrayImage {
    let mut map = GrayImage::new(width, height);
    for instance in instances {
        let value = (instance.index + 1).min(u8::MAX as usize) as u8;
        for y in 0..height.min(instance.mask.height() as u32) {
            for x in 0..width.min(instance.mask.width() as u32) {
                if instance.mask.get(y as usize, x as usize) {
                    map.put_pixel(x, y, image::Luma([value]));
                }
            }
        }
    }
    map
}

/// Per-pixel logical OR over all instance masks, encoded 0/255
pub fn combined_mask(instances: &[Instance], width: u32, height: u32) -> GrayImage {
    let mut combined = GrayImage::new(width, height);
    for instance in instances {
        for y in 0..height.min(instance.mask.height() as u32) {
            for x in 0..width.min(instance.mask.width() as u32) {
                if instance.mask.get(y as usize, x as usize) {
                    combined.put_pixel(x, y, image::Luma([255]));
                }
            }
        }
    }
    combined
}

/// One mask as a 0/255 grayscale raster
pub fn mask_to_gray(mask: &BitMask) -> GrayImage {
    let mut out = GrayImage::new(mask.width() as u32, mask.height() as u32);
    for y in 0..mask.height() {
        for x in 0..mask.width() {
            if mask.get(y, x) {
                out.put_pixel(x as u32, y as u32, image::Luma([255]));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BBox;

    fn full_mask(height: usize, width: usize) -> BitMask {
        let mut mask = BitMask::new(height, width);
        for y in 0..height {
            for x in 0..width {
                mask.set(y, x, true);
            }
        }
        mask
    }

    fn instance(index: usize, mask: BitMask) -> Instance {
        Instance {
            index,
            mask,
            bbox: BBox {
                x1: 0.0,
                y1: 0.0,
                x2: 1.0,
                y2: 1.0,
            },
            score: 0.9,
            label: "thing".to_string(),
        }
    }

    #[test]
    fn full_3x3_mask_is_all_edges() {
        let edges = edge_mask(&full_mask(3, 3));
        assert_eq!(edges.area(), 9);
    }

    #[test]
    fn interior_pixel_is_not_an_edge() {
        // 3x3 block inside a 5x5 canvas: only the center survives as interior
        let mut mask = BitMask::new(5, 5);
        for y in 1..4 {
            for x in 1..4 {
                mask.set(y, x, true);
            }
        }
        let edges = edge_mask(&mask);
        assert_eq!(edges.area(), 8);
        assert!(!edges.get(2, 2));
        assert!(edges.get(1, 1));
    }

    #[test]
    fn instance_map_encodes_one_based_indices() {
        // three non-overlapping single-pixel masks
        let mut m0 = BitMask::new(2, 2);
        m0.set(0, 0, true);
        let mut m1 = BitMask::new(2, 2);
        m1.set(0, 1, true);
        let mut m2 = BitMask::new(2, 2);
        m2.set(1, 0, true);

        let instances = vec![instance(0, m0), instance(1, m1), instance(2, m2)];
        let map = instance_map(&instances, 2, 2);
        assert_eq!(map.get_pixel(0, 0).0[0], 1);
        assert_eq!(map.get_pixel(1, 0).0[0], 2);
        assert_eq!(map.get_pixel(0, 1).0[0], 3);
        assert_eq!(map.get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn overlap_resolves_last_writer_wins_but_or_is_invariant() {
        // indices 0 and 1 share pixel (0,0)
        let mut m0 = BitMask::new(1, 2);
        m0.set(0, 0, true);
        let mut m1 = BitMask::new(1, 2);
        m1.set(0, 0, true);
        m1.set(0, 1, true);

        let instances = vec![instance(0, m0), instance(1, m1)];
        let map = instance_map(&instances, 2, 1);
        assert_eq!(map.get_pixel(0, 0).0[0], 2);

        let combined = combined_mask(&instances, 2, 1);
        assert_eq!(combined.get_pixel(0, 0).0[0], 255);
        assert_eq!(combined.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn combined_mask_is_logical_or() {
        let mut m0 = BitMask::new(2, 2);
        m0.set(0, 0, true);
        let mut m1 = BitMask::new(2, 2);
        m1.set(1, 1, true);

        let instances = vec![instance(0, m0), instance(1, m1)];
        let combined = combined_mask(&instances, 2, 2);
        assert_eq!(combined.get_pixel(0, 0).0[0], 255);
        assert_eq!(combined.get_pixel(1, 1).0[0], 255);
        assert_eq!(combined.get_pixel(1, 0).0[0], 0);
        assert_eq!(combined.get_pixel(0, 1).0[0], 0);
    }
}
