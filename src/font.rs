//! Glyph rasterization.
//!
//! The atlas builder only needs a bitmap and a few metrics per character, so
//! it talks to a [`GlyphRasterizer`]. [`FontdueRasterizer`] is the backend
//! used at runtime.

use std::path::Path;

use fontdue::{Font, FontSettings};

use crate::error::OsdError;

/// A single rendered glyph.
#[derive(Debug, Clone, Default)]
pub struct RasterizedGlyph {
    /// Horizontal advance in whole pixels.
    pub advance: u32,
    /// Bitmap width in pixels.
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    /// Offset from the pen position to the bitmap's left edge.
    pub bearing_x: i32,
    /// Distance from the baseline up to the bitmap's top row.
    pub bearing_y: i32,
    /// Row-major coverage, `width * height` bytes, top row first.
    pub bitmap: Vec<u8>,
}

impl RasterizedGlyph {
    /// Pixels the bitmap extends below the baseline.
    pub fn drop_below(&self) -> i32 {
        i32::try_from(self.height).unwrap_or(i32::MAX) - self.bearing_y
    }
}

/// Source of glyph bitmaps at a fixed pixel size.
pub trait GlyphRasterizer {
    /// Render `code`, or `None` if the font cannot produce it.
    fn rasterize(&mut self, code: u8) -> Option<RasterizedGlyph>;
}

/// [`GlyphRasterizer`] backed by a fontdue font.
pub struct FontdueRasterizer {
    font: Font,
    px: f32,
}

impl FontdueRasterizer {
    /// Load the font at `path` for rendering at `pixel_size`.
    ///
    /// # Errors
    ///
    /// Returns [`OsdError::FontLoad`] if the file cannot be read and
    /// [`OsdError::FontParse`] if it is not a usable font.
    pub fn load(path: &Path, pixel_size: u32) -> Result<Self, OsdError> {
        let bytes = std::fs::read(path).map_err(|e| OsdError::FontLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(&bytes, pixel_size)
    }

    /// Parse an in-memory font for rendering at `pixel_size`.
    ///
    /// # Errors
    ///
    /// Returns [`OsdError::FontParse`] if the bytes are not a usable font.
    pub fn from_bytes(bytes: &[u8], pixel_size: u32) -> Result<Self, OsdError> {
        #[expect(clippy::cast_precision_loss)]
        let px = pixel_size as f32;
        let settings = FontSettings {
            scale: px,
            ..FontSettings::default()
        };
        let font =
            Font::from_bytes(bytes, settings).map_err(|e| OsdError::FontParse(e.to_string()))?;
        Ok(Self { font, px })
    }
}

impl GlyphRasterizer for FontdueRasterizer {
    fn rasterize(&mut self, code: u8) -> Option<RasterizedGlyph> {
        let ch = char::from(code);
        // Index 0 is the font's missing-glyph box.
        if ch != ' ' && self.font.lookup_glyph_index(ch) == 0 {
            return None;
        }

        let (metrics, bitmap) = self.font.rasterize(ch, self.px);
        let width = u32::try_from(metrics.width).ok()?;
        let height = u32::try_from(metrics.height).ok()?;
        let top = metrics.ymin + i32::try_from(metrics.height).ok()?;

        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let advance = metrics.advance_width.round().max(0.0) as u32;

        Some(RasterizedGlyph {
            advance,
            width,
            height,
            bearing_x: metrics.xmin,
            bearing_y: top,
            bitmap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_file_reports_path() {
        let result = FontdueRasterizer::load(Path::new("/nonexistent/osd-font.ttf"), 16);
        match result {
            Err(OsdError::FontLoad { path, .. }) => {
                assert_eq!(path, Path::new("/nonexistent/osd-font.ttf"));
            }
            _ => panic!("expected FontLoad error"),
        }
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let result = FontdueRasterizer::from_bytes(b"definitely not a font", 16);
        assert!(matches!(result, Err(OsdError::FontParse(_))));
    }

    #[test]
    fn drop_below_baseline() {
        let glyph = RasterizedGlyph {
            height: 12,
            bearing_y: 9,
            ..RasterizedGlyph::default()
        };
        assert_eq!(glyph.drop_below(), 3);
    }
}
