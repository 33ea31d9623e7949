//! Host-facing configuration for the overlay.

use std::path::PathBuf;

use crate::types::Corner;

/// Appear/display/disappear durations in milliseconds.
///
/// `None` means the state never times out on its own.
pub type Timeouts = [Option<u32>; 3];

/// Tunables for the overlay. [`Default`] matches the stock look: yellow text
/// on black rounded boxes, twenty message slots.
#[derive(Debug, Clone)]
pub struct OsdConfig {
    /// Font resource rasterized into the glyph atlas.
    pub font_path: PathBuf,
    /// Glyph pixel size as a fraction of the screen height.
    pub text_height_ratio: f32,
    /// Text buffer capacity per message, in bytes. Also bounds the number of
    /// glyph quads a message can hold.
    pub max_message_len: usize,
    /// Number of pre-allocated message slots.
    pub message_count: usize,
    /// Time for a newly created message to scroll into place.
    pub scroll_ms: f32,
    /// Outline and glyph colour.
    pub fg_color: [f32; 3],
    /// Box fill colour.
    pub bg_color: [f32; 3],
    /// Border size as a fraction of the text row height.
    pub border_ratio: f32,
    /// Outline thickness as a fraction of the border size.
    pub outline_ratio: f32,
    /// Rows of the glyph atlas wrap once they would exceed this width.
    pub max_atlas_width: u32,
    /// Timeouts for messages pinned to the six edge anchors.
    pub edge_timeouts: Timeouts,
    /// Timeouts for messages pinned to the three middle-row anchors.
    pub middle_timeouts: Timeouts,
}

impl Default for OsdConfig {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("font.ttf"),
            text_height_ratio: 0.015,
            max_message_len: 1024,
            message_count: 20,
            scroll_ms: 250.0,
            fg_color: [1.0, 1.0, 0.0],
            bg_color: [0.0, 0.0, 0.0],
            border_ratio: 0.2,
            outline_ratio: 0.2,
            max_atlas_width: 1024,
            edge_timeouts: [Some(333), Some(1500), Some(666)],
            middle_timeouts: [Some(333), Some(1000), Some(333)],
        }
    }
}

impl OsdConfig {
    /// Default configuration reading glyphs from `font_path`.
    pub fn new(font_path: impl Into<PathBuf>) -> Self {
        Self {
            font_path: font_path.into(),
            ..Self::default()
        }
    }

    /// Override the number of message slots.
    #[must_use]
    pub fn with_message_count(mut self, count: usize) -> Self {
        self.message_count = count;
        self
    }

    /// Override the per-message text capacity.
    #[must_use]
    pub fn with_max_message_len(mut self, len: usize) -> Self {
        self.max_message_len = len;
        self
    }

    /// Override the foreground and background colours.
    #[must_use]
    pub fn with_colors(mut self, fg: [f32; 3], bg: [f32; 3]) -> Self {
        self.fg_color = fg;
        self.bg_color = bg;
        self
    }

    /// Timeouts a new message on `corner` starts with.
    pub fn timeouts_for(&self, corner: Corner) -> Timeouts {
        if corner.is_middle() {
            self.middle_timeouts
        } else {
            self.edge_timeouts
        }
    }

    /// Vertices reserved per message slot: six per glyph plus the border.
    pub fn slot_vertices(&self) -> usize {
        self.max_message_len * crate::mesh::VERTICES_PER_GLYPH + crate::mesh::BORDER_VERTEX_COUNT
    }

    /// Glyph pixel size for a screen of the given height.
    pub(crate) fn glyph_pixel_size(&self, screen_height: u32) -> u32 {
        #[expect(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let px = (screen_height as f32 * self.text_height_ratio) as u32;
        px.max(1)
    }
}
