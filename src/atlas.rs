//! Glyph atlas: every printable ASCII character packed into one single-channel
//! bitmap, plus the metrics the text compiler needs to address it.
//!
//! Packing runs in two passes. [`measure`] walks the glyphs once to find the
//! row count, the widest row and the tallest ascent/descent; only then are
//! the final bitmap dimensions known, so [`place`] walks them again to blit
//! the bitmaps and compute normalized UVs.

use image::{GrayImage, Luma};
use log::warn;

use crate::config::OsdConfig;
use crate::font::{GlyphRasterizer, RasterizedGlyph};

/// First character code held in the atlas (space).
pub const FIRST_CODE: u8 = 32;

/// Number of character codes held in the atlas (`' '..='~'`).
pub const GLYPH_COUNT: usize = 95;

/// Placement of one character inside the atlas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// Horizontal advance in pixels; also the width of its atlas cell.
    pub advance: u32,
    /// Normalized top-left corner of the cell.
    pub uv: [f32; 2],
    /// Normalized cell width.
    pub uv_width: f32,
    /// Top-left corner of the cell in atlas pixels.
    pub cell: [u32; 2],
}

/// Sizing record produced by the measure pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    /// Number of packed rows.
    pub rows: u32,
    /// Bitmap width: the widest row including gutters.
    pub width: u32,
    /// Bitmap height: `rows * (row_height + 1) + 1`.
    pub height: u32,
    /// Height of every row: tallest ascent plus deepest descent.
    pub row_height: u32,
    /// Tallest extent above the baseline over all glyphs.
    pub max_bearing: i32,
    /// Deepest extent below the baseline over all glyphs.
    pub max_drop: i32,
}

/// The packed glyph bitmap and per-glyph metrics.
pub struct Atlas {
    glyphs: Vec<Option<Glyph>>,
    bitmap: GrayImage,
    layout: AtlasLayout,
    norm_row_height: f32,
    border_size: u32,
    outline_width: u32,
}

impl Atlas {
    /// Rasterize every supported character and pack the results.
    ///
    /// Characters the rasterizer cannot produce are left out of the atlas.
    pub fn build(rasterizer: &mut impl GlyphRasterizer, config: &OsdConfig) -> Self {
        let glyphs: Vec<Option<RasterizedGlyph>> = (0..GLYPH_COUNT)
            .map(|i| {
                let code = FIRST_CODE + u8::try_from(i).unwrap_or(0);
                let glyph = rasterizer.rasterize(code);
                if glyph.is_none() {
                    warn!("could not rasterize glyph {code}");
                }
                glyph
            })
            .collect();

        let layout = measure(&glyphs, config.max_atlas_width);
        let (placed, bitmap) = place(&glyphs, &layout, config.max_atlas_width);

        let border_size = ceil_ratio(layout.row_height, config.border_ratio);
        let outline_width = ceil_ratio(border_size, config.outline_ratio);

        #[expect(clippy::cast_precision_loss)]
        let norm_row_height = layout.row_height as f32 / layout.height as f32;

        Self {
            glyphs: placed,
            bitmap,
            layout,
            norm_row_height,
            border_size,
            outline_width,
        }
    }

    /// Look up a character. Returns `None` outside the printable range or if
    /// the glyph could not be rasterized.
    pub fn glyph(&self, ch: char) -> Option<&Glyph> {
        let code = u32::from(ch).checked_sub(u32::from(FIRST_CODE))?;
        self.glyphs.get(usize::try_from(code).ok()?)?.as_ref()
    }

    /// The packed single-channel bitmap.
    pub fn bitmap(&self) -> &GrayImage {
        &self.bitmap
    }

    /// Sizing record from the measure pass.
    pub fn layout(&self) -> &AtlasLayout {
        &self.layout
    }

    /// Text row height in pixels.
    pub fn row_height(&self) -> u32 {
        self.layout.row_height
    }

    /// Row height divided by the bitmap height.
    pub fn norm_row_height(&self) -> f32 {
        self.norm_row_height
    }

    /// Size of the rounded border drawn around a message.
    pub fn border_size(&self) -> u32 {
        self.border_size
    }

    /// Thickness of the outline stroke inside the border.
    pub fn outline_width(&self) -> u32 {
        self.outline_width
    }
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn ceil_ratio(value: u32, ratio: f32) -> u32 {
    (value as f32 * ratio).ceil().max(0.0) as u32
}

/// Whether a cell of `advance` pixels no longer fits on a row that already
/// spans `row_width` pixels.
fn wraps(row_width: u32, advance: u32, max_width: u32) -> bool {
    row_width + advance + 1 > max_width
}

/// First pass: size the atlas without touching any pixels.
pub fn measure(glyphs: &[Option<RasterizedGlyph>], max_width: u32) -> AtlasLayout {
    let mut rows = 1;
    let mut row_width = 1;
    let mut widest = 0;
    let mut max_bearing = 0;
    let mut max_drop = 0;

    for glyph in glyphs.iter().flatten() {
        max_bearing = max_bearing.max(glyph.bearing_y);
        max_drop = max_drop.max(glyph.drop_below());

        if wraps(row_width, glyph.advance, max_width) {
            widest = widest.max(row_width);
            row_width = 1;
            rows += 1;
        }
        row_width += glyph.advance + 1;
    }
    widest = widest.max(row_width);

    let row_height = u32::try_from(max_bearing + max_drop).unwrap_or(0);
    AtlasLayout {
        rows,
        width: widest,
        height: rows * (row_height + 1) + 1,
        row_height,
        max_bearing,
        max_drop,
    }
}

/// Second pass: blit each glyph into its cell and compute its UVs from the
/// final dimensions in `layout`.
pub fn place(
    glyphs: &[Option<RasterizedGlyph>],
    layout: &AtlasLayout,
    max_width: u32,
) -> (Vec<Option<Glyph>>, GrayImage) {
    let mut bitmap = GrayImage::new(layout.width, layout.height);
    let mut placed = Vec::with_capacity(glyphs.len());

    #[expect(clippy::cast_precision_loss)]
    let (atlas_w, atlas_h) = (layout.width as f32, layout.height as f32);

    let mut row_width = 1;
    let mut row_y = 1;

    for glyph in glyphs {
        let Some(glyph) = glyph else {
            placed.push(None);
            continue;
        };

        if wraps(row_width, glyph.advance, max_width) {
            row_width = 1;
            row_y += layout.row_height + 1;
        }

        #[expect(clippy::cast_precision_loss)]
        placed.push(Some(Glyph {
            advance: glyph.advance,
            uv: [row_width as f32 / atlas_w, row_y as f32 / atlas_h],
            uv_width: glyph.advance as f32 / atlas_w,
            cell: [row_width, row_y],
        }));

        let x = i64::from(row_width) + i64::from(glyph.bearing_x);
        let y = i64::from(row_y) + i64::from(layout.max_bearing - glyph.bearing_y);
        blit(&mut bitmap, glyph, x, y);

        row_width += glyph.advance + 1;
    }

    (placed, bitmap)
}

/// Copy a glyph bitmap into the atlas with its top-left at (`x`, `y`),
/// clipping whatever falls outside.
fn blit(atlas: &mut GrayImage, glyph: &RasterizedGlyph, x: i64, y: i64) {
    let (w, h) = (i64::from(atlas.width()), i64::from(atlas.height()));
    for (i, &value) in glyph.bitmap.iter().enumerate() {
        let Ok(i) = u32::try_from(i) else { break };
        let Some(gx) = i.checked_rem(glyph.width) else { return };
        let gy = i / glyph.width;
        if gy >= glyph.height {
            break;
        }
        let (tx, ty) = (x + i64::from(gx), y + i64::from(gy));
        if (0..w).contains(&tx) && (0..h).contains(&ty) {
            #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            atlas.put_pixel(tx as u32, ty as u32, Luma([value]));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Rasterizer producing solid boxes with widths that vary per character.
    pub(crate) struct BoxRasterizer {
        pub missing: Vec<u8>,
    }

    impl GlyphRasterizer for BoxRasterizer {
        fn rasterize(&mut self, code: u8) -> Option<RasterizedGlyph> {
            if self.missing.contains(&code) {
                return None;
            }
            let advance = 4 + u32::from(code % 7);
            let (width, height) = (advance - 1, 10);
            let descent = if code % 3 == 0 { 3 } else { 0 };
            Some(RasterizedGlyph {
                advance,
                width,
                height,
                bearing_x: 0,
                bearing_y: 10 - descent,
                bitmap: vec![255; (width * height) as usize],
            })
        }
    }

    fn narrow_config(max_width: u32) -> OsdConfig {
        OsdConfig {
            max_atlas_width: max_width,
            ..OsdConfig::default()
        }
    }

    pub(crate) fn test_atlas() -> Atlas {
        let mut raster = BoxRasterizer {
            missing: vec![b'~'],
        };
        Atlas::build(&mut raster, &narrow_config(128))
    }

    #[test]
    fn row_height_spans_ascent_and_descent() {
        let atlas = test_atlas();
        assert_eq!(atlas.layout().max_bearing, 10);
        assert_eq!(atlas.layout().max_drop, 3);
        assert_eq!(atlas.row_height(), 13);
    }

    #[test]
    fn height_includes_row_gutters() {
        let atlas = test_atlas();
        let layout = atlas.layout();
        assert!(layout.rows > 1);
        assert_eq!(layout.height, layout.rows * (layout.row_height + 1) + 1);
        assert_eq!(atlas.bitmap().height(), layout.height);
        assert!(layout.width <= 128);
    }

    #[test]
    fn uvs_stay_inside_unit_square() {
        let atlas = test_atlas();
        for ch in ' '..='}' {
            let g = atlas.glyph(ch).unwrap();
            assert!(g.uv[0] >= 0.0 && g.uv[0] + g.uv_width <= 1.0, "{ch:?}");
            assert!(
                g.uv[1] >= 0.0 && g.uv[1] + atlas.norm_row_height() <= 1.0,
                "{ch:?}"
            );
        }
    }

    #[test]
    fn cells_do_not_overlap() {
        let atlas = test_atlas();
        let h = atlas.row_height();
        let cells: Vec<_> = (' '..='}')
            .map(|ch| {
                let g = atlas.glyph(ch).unwrap();
                (g.cell[0], g.cell[1], g.cell[0] + g.advance, g.cell[1] + h)
            })
            .collect();
        for (i, a) in cells.iter().enumerate() {
            for b in &cells[i + 1..] {
                let disjoint = a.2 <= b.0 || b.2 <= a.0 || a.3 <= b.1 || b.3 <= a.1;
                assert!(disjoint, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn missing_and_out_of_range_glyphs_are_absent() {
        let atlas = test_atlas();
        assert!(atlas.glyph('~').is_none());
        assert!(atlas.glyph('\n').is_none());
        assert!(atlas.glyph('é').is_none());
        assert!(atlas.glyph('A').is_some());
    }

    #[test]
    fn glyph_pixels_land_in_their_cell() {
        let atlas = test_atlas();
        let g = atlas.glyph('A').unwrap();
        // 'A' has no descent, so its bitmap starts on the cell's top row
        let top = g.cell[1];
        assert_eq!(atlas.bitmap().get_pixel(g.cell[0], top).0, [255]);
        // gutter column right after the cell stays empty
        assert_eq!(atlas.bitmap().get_pixel(g.cell[0] + g.advance, top).0, [0]);
    }

    #[test]
    fn border_sizes_follow_ratios() {
        let atlas = test_atlas();
        // ceil(13 * 0.2) = 3, ceil(3 * 0.2) = 1
        assert_eq!(atlas.border_size(), 3);
        assert_eq!(atlas.outline_width(), 1);
    }

    #[test]
    fn empty_glyph_set_measures_to_minimal_atlas() {
        let layout = measure(&[None, None], 64);
        assert_eq!(layout.rows, 1);
        assert_eq!(layout.width, 1);
        assert_eq!(layout.height, 2);
    }
}
