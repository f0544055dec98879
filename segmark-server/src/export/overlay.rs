//! Overlay compositing
//!
//! Each instance paints its fill color over mask pixels and its border color
//! over edge pixels into one shared transparent layer, in index order, with
//! standard alpha-over blending. The finished layer is then composited onto
//! the source image.

use image::{Pixel, Rgba, RgbaImage};

use super::color::{instance_color, label_color, FILL_ALPHA};
use super::glyphs;
use super::raster::edge_mask;
use crate::models::Instance;

/// Render the semi-transparent instance overlay onto a copy of the source
pub fn render_overlay(source: &RgbaImage, instances: &[Instance]) -> RgbaImage {
    let layer = paint_layer(source.width(), source.height(), instances);
    let mut out = source.clone();
    image::imageops::overlay(&mut out, &layer, 0, 0);
    out
}

/// Overlay plus each instance's index drawn at its mask centroid.
/// Instances with zero mask pixels carry no label.
pub fn render_labeled_overlay(source: &RgbaImage, instances: &[Instance]) -> RgbaImage {
    let mut out = render_overlay(source, instances);
    let total = instances.len();
    for instance in instances {
        let Some((cy, cx)) = instance.mask.centroid() else {
            continue;
        };
        glyphs::draw_number(
            &mut out,
            cx.round() as i64,
            cy.round() as i64,
            instance.index,
            label_color(instance.index, total),
        );
    }
    out
}

/// Paint fills and borders for all instances into one transparent layer
fn paint_layer(width: u32, height: u32, instances: &[Instance]) -> RgbaImage {
    let mut layer = RgbaImage::new(width, height);
    let total = instances.len();

    for instance in instances {
        let rgb = instance_color(instance.index, total);
        let fill = Rgba([rgb[0], rgb[1], rgb[2], FILL_ALPHA]);
        let border = Rgba([rgb[0], rgb[1], rgb[2], 255]);
        let edges = edge_mask(&instance.mask);

        for y in 0..height.min(instance.mask.height() as u32) {
            for x in 0..width.min(instance.mask.width() as u32) {
                if !instance.mask.get(y as usize, x as usize) {
                    continue;
                }
                let px = layer.get_pixel_mut(x, y);
                if edges.get(y as usize, x as usize) {
                    px.blend(&border);
                } else {
                    px.blend(&fill);
                }
            }
        }
    }

    layer
}
