//! An on-screen-display overlay for OpenGL via [glow].
//!
//! Short status messages ("Saved state 2", "Paused", "Fast forward") are
//! pinned to one of nine screen anchors, fade in, stay up for a while, then
//! fade out. Messages sharing an anchor stack, and new ones on the edge
//! anchors slide into place.
//!
//! The crate has two halves:
//!
//! - [`Osd`] is a cloneable, thread-safe handle for creating, updating and
//!   deleting messages from anywhere in the host.
//! - [`OsdRenderer`] lives on the render thread. Once per frame it advances
//!   every message's timers and draws the survivors over the host's frame.
//!
//! # Features
//!
//! - **Glyph atlas**: printable ASCII rasterized once via [fontdue] and
//!   packed into a single-channel texture.
//! - **Anti-aliased rounded borders** from exact circle-coverage integration,
//!   with no supersampling.
//! - **Fixed message pool**: slots and their vertex buffer regions are
//!   allocated up front; text is recompiled only when it changes.
//! - **Transparent to the host**: GL bindings and blend state are restored
//!   after every frame.
//!
//! # Safety
//!
//! [`OsdRenderer::render`] and [`OsdRenderer::shutdown`] issue raw GL calls
//! and require the renderer's context to be current. Everything on [`Osd`]
//! is safe and may be called from any thread.
//!
//! [glow]: https://docs.rs/glow
//! [fontdue]: https://docs.rs/fontdue

mod atlas;
mod border;
mod config;
mod error;
mod font;
mod mesh;
mod osd;
mod queue;
mod render;
mod shaders;
mod types;

pub use atlas::{Atlas, AtlasLayout, Glyph};
pub use border::BorderMask;
pub use config::{OsdConfig, Timeouts};
pub use error::OsdError;
pub use font::{FontdueRasterizer, GlyphRasterizer, RasterizedGlyph};
pub use mesh::{compile_border, compile_text, TextMesh};
pub use osd::Osd;
pub use queue::{Message, MessageQueue};
pub use render::{anchor_origin, projection, FrameClock, OsdRenderer};
pub use types::{Corner, MessageId, MessageState, Vertex};
