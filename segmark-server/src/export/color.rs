//! Deterministic instance color assignment
//!
//! The palette must be reproducible exactly by any independent renderer
//! sharing the scheme: for instance index `i` of `N` total,
//! hue = (i × 360 / N) mod 360, saturation = 70 + (i mod 3) × 10 percent,
//! lightness = 50 + (i mod 2) × 10 percent.

/// Alpha used for mask fill pixels (30% of 255)
pub const FILL_ALPHA: u8 = 76;

/// RGB for an instance's fill and border
pub fn instance_color(index: usize, total: usize) -> [u8; 3] {
    let (hue, saturation, lightness) = instance_hsl(index, total);
    hsl_to_rgb(hue, saturation, lightness)
}

/// Label text color: same hue at lower lightness (25 or 35 percent) for
/// legibility over the fill
pub fn label_color(index: usize, total: usize) -> [u8; 3] {
    let (hue, saturation, _) = instance_hsl(index, total);
    let lightness = 25.0 + (index % 2) as f32 * 10.0;
    hsl_to_rgb(hue, saturation, lightness)
}

/// (hue degrees, saturation percent, lightness percent) for an instance
pub fn instance_hsl(index: usize, total: usize) -> (f32, f32, f32) {
    let total = total.max(1);
    let hue = (index as f32 * 360.0 / total as f32) % 360.0;
    let saturation = 70.0 + (index % 3) as f32 * 10.0;
    let lightness = 50.0 + (index % 2) as f32 * 10.0;
    (hue, saturation, lightness)
}

/// HSL → RGB. Hue in degrees, saturation and lightness in percent.
pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [u8; 3] {
    let s = saturation / 100.0;
    let l = lightness / 100.0;

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let h_prime = (hue % 360.0) / 60.0;
    let x = c * (1.0 - (h_prime % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = match h_prime as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    ]
}
