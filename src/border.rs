//! Anti-aliased mask for the rounded message border.
//!
//! Only one quarter of the rounded corner is rasterized. Each pixel stores
//! the exact fraction of its area that lies inside a circular arc, found by
//! integrating the circle rather than by sampling, so the edge is smooth
//! without supersampling. The border mesh mirrors and stretches this one
//! bitmap over all four corners and edges.

use image::{Rgba, RgbaImage};

/// Area under `y = sqrt(r² − (r − x)²)` between `x0` and `x1`.
///
/// The arc starts at the origin and rises up and to the right until it
/// reaches `(r, r)`.
pub fn integrate_arc(r: f64, x0: f64, x1: f64) -> f64 {
    antiderivative(r, r - x0) - antiderivative(r, r - x1)
}

/// `∫ sqrt(r² − u²) du`
fn antiderivative(r: f64, u: f64) -> f64 {
    let u = u.clamp(-r, r);
    (r * r * (u / r).asin() + u * (r * r - u * u).max(0.0).sqrt()) / 2.0
}

/// Per-pixel coverage of a quarter circle of `radius` inside a `size`×`size`
/// grid, indexed `[y][x]` with `y = 0` at the arc's lowest row. The circle's
/// centre sits at the grid's right edge, on row 0. A radius smaller than
/// `size` is right-aligned, leaving uncovered columns on the left.
pub fn arc_coverage(size: u32, radius: u32) -> Vec<Vec<f32>> {
    let r = f64::from(radius);
    // x at which the arc crosses each horizontal grid line
    let crossings: Vec<f64> = (0..=radius)
        .map(|i| {
            let i = f64::from(i);
            r - (r * r - i * i).sqrt()
        })
        .collect();

    let offset = i64::from(radius) - i64::from(size);
    (0..size)
        .map(|y| {
            (0..size)
                .map(|ix| {
                    let x = i64::from(ix) + offset;
                    if x < 0 || y >= radius {
                        return 0.0;
                    }
                    let y = y as usize;
                    #[expect(clippy::cast_precision_loss)]
                    let x = x as f64;
                    pixel_coverage(r, x, y, crossings[y], crossings[y + 1])
                })
                .collect()
        })
        .collect()
}

/// Fraction of pixel `[x, x+1] × [y, y+1]` lying right of and below the arc,
/// given where the arc crosses the pixel row's bottom and top edges.
#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn pixel_coverage(r: f64, x: f64, y: usize, bottom: f64, top: f64) -> f32 {
    let (mut start, mut end) = (x, x + 1.0);
    if bottom > end {
        return 0.0;
    }
    if top < start {
        return 1.0;
    }

    let mut area = 0.0;
    if bottom > start {
        start = bottom;
    }
    if top < end {
        // everything right of the top crossing is fully covered
        area = end - top;
        end = top;
    }
    area += integrate_arc(r, start, end) - (end - start) * y as f64;
    area.clamp(0.0, 1.0) as f32
}

/// Map `[0, 1]` onto a byte, truncating.
#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_byte(f: f32) -> u8 {
    (f * 255.0).clamp(0.0, 255.0) as u8
}

/// The rasterized corner quadrant.
///
/// The image is `size + 1` pixels wide and `size` tall. Alpha holds coverage
/// of the outer arc (radius `size`) and red holds `1 −` coverage of the inner
/// arc (radius `size − outline`), so red marks the outline band. The extra
/// last column is the straight-edge strip: fully opaque, with red set on the
/// first `outline` rows.
pub struct BorderMask {
    image: RgbaImage,
    size: u32,
    outline: u32,
}

impl BorderMask {
    /// Rasterize a corner of radius `size` with an `outline`-pixel stroke.
    pub fn new(size: u32, outline: u32) -> Self {
        let outer = arc_coverage(size, size);
        let inner = arc_coverage(size, size.saturating_sub(outline));

        let mut image = RgbaImage::new(size + 1, size);
        for y in 0..size {
            let row = (size - y - 1) as usize;
            for x in 0..size {
                let col = x as usize;
                let red = to_byte(1.0 - inner[row][col]);
                let alpha = to_byte(outer[row][col]);
                image.put_pixel(x, y, Rgba([red, 0, 0, alpha]));
            }
            let red = if y < outline { 255 } else { 0 };
            image.put_pixel(size, y, Rgba([red, 0, 0, 255]));
        }

        Self {
            image,
            size,
            outline,
        }
    }

    /// RGBA pixels, ready for upload.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Outer radius (the border size).
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Outline stroke width.
    pub fn outline(&self) -> u32 {
        self.outline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn full_quarter_integrates_to_quarter_circle() {
        let r = 64.0;
        let area = integrate_arc(r, 0.0, r);
        assert!((area - PI * r * r / 4.0).abs() < 1e-9);
    }

    #[test]
    fn coverage_falls_off_away_from_centre() {
        let cov = arc_coverage(64, 64);
        for y in 0..64 {
            for x in 0..63 {
                assert!(cov[y][x] <= cov[y][x + 1] + 1e-6, "row {y} col {x}");
            }
        }
        for x in 0..64 {
            for y in 0..63 {
                assert!(cov[y][x] + 1e-6 >= cov[y + 1][x], "row {y} col {x}");
            }
        }
    }

    #[test]
    fn row_sums_match_exact_area() {
        let r = 64.0;
        let cov = arc_coverage(64, 64);
        for (y, row) in cov.iter().enumerate() {
            let sum: f64 = row.iter().copied().map(f64::from).sum();
            let y = y as f64;
            let exact = antiderivative(r, y + 1.0) - antiderivative(r, y);
            assert!((sum - exact).abs() < 1e-3, "row {y}: {sum} vs {exact}");
        }
    }

    #[test]
    fn crossing_pixel_coverage_tracks_arc_position() {
        let r = 64.0;
        let cov = arc_coverage(64, 64);
        let crossing = |t: f64| r - (r * r - t * t).sqrt();
        let mut closest_to_half = 1.0_f32;

        // steep part of the arc, where it stays within one column per row
        for y in 0..32_usize {
            let (bottom, top) = (crossing(y as f64), crossing(y as f64 + 1.0));
            if bottom.floor() != top.floor() {
                continue;
            }
            let col = bottom.floor() as usize;
            let expected = (col as f64 + 1.0 - (bottom + top) / 2.0) as f32;
            let actual = cov[y][col];
            assert!((actual - expected).abs() < 0.01, "row {y}: {actual} vs {expected}");
            if (actual - 0.5).abs() < (closest_to_half - 0.5).abs() {
                closest_to_half = actual;
            }
        }
        assert!((closest_to_half - 0.5).abs() < 0.05);
    }

    #[test]
    fn smaller_radius_is_right_aligned() {
        let cov = arc_coverage(10, 8);
        assert_eq!(cov[0][0], 0.0);
        assert_eq!(cov[0][1], 0.0);
        assert!(cov[0][2] > 0.9);
        assert_eq!(cov[0][9], 1.0);
        // rows at or above the radius are empty
        assert!(cov[9].iter().all(|&c| c == 0.0));
    }

    #[test]
    fn mask_channels() {
        let mask = BorderMask::new(6, 2);
        let img = mask.image();
        assert_eq!(img.dimensions(), (7, 6));

        // far corner from the circle centre is outside everything
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        // next to the centre: inside both arcs, so opaque fill, no outline
        assert_eq!(img.get_pixel(5, 5).0, [0, 0, 0, 255]);

        // straight-edge strip
        assert_eq!(img.get_pixel(6, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(6, 1).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(6, 2).0, [0, 0, 0, 255]);
    }

    #[test]
    fn outline_band_is_red_on_outer_edge() {
        let mask = BorderMask::new(6, 2);
        // top row, rightmost arc column: inside the outer arc but outside the
        // inner one
        let px = mask.image().get_pixel(5, 0).0;
        assert_eq!(px[0], 255);
        assert!(px[3] > 200);
    }

    #[test]
    fn zero_size_mask_is_a_single_empty_column() {
        let mask = BorderMask::new(0, 0);
        assert_eq!(mask.image().dimensions(), (1, 0));
    }
}
