//! The frame renderer: owns the GL objects, advances the message queue once
//! per frame and draws what is still on screen.

use std::sync::Arc;
use std::time::Instant;

use glow::{HasContext, PixelUnpackData};
use log::{debug, error};

use crate::atlas::Atlas;
use crate::border::BorderMask;
use crate::config::OsdConfig;
use crate::error::OsdError;
use crate::font::FontdueRasterizer;
use crate::mesh::{self, BORDER_VERTEX_COUNT};
use crate::osd::{Osd, Status};
use crate::queue::Message;
use crate::shaders;
use crate::types::{Corner, Vertex};

/// GL internal formats, pre-cast to the `i32` that `tex_image_2d` expects.
#[expect(clippy::cast_possible_wrap)]
const R8_INTERNAL_FORMAT: i32 = glow::R8 as i32;
#[expect(clippy::cast_possible_wrap)]
const RGBA8_INTERNAL_FORMAT: i32 = glow::RGBA8 as i32;

/// Convert a `u32` to `i32` for GL API calls, saturating.
fn gl_size(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Convert a byte or vertex offset to `i32` for GL API calls, saturating.
fn gl_offset(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Cached uniform locations for the message program.
struct Uniforms {
    /// `u_projection`: viewport pixels to clip space.
    projection: glow::UniformLocation,
    /// `u_position`: mesh origin in viewport pixels.
    position: glow::UniformLocation,
    /// `u_alpha`: message opacity.
    alpha: glow::UniformLocation,
}

impl Uniforms {
    /// Look up every per-frame uniform of `program`.
    unsafe fn locate(gl: &glow::Context, program: glow::Program) -> Result<Self, OsdError> {
        let find = |name: &str| {
            unsafe { gl.get_uniform_location(program, name) }
                .ok_or_else(|| OsdError::Shader(format!("{name} missing from message shader")))
        };
        Ok(Self {
            projection: find("u_projection")?,
            position: find("u_position")?,
            alpha: find("u_alpha")?,
        })
    }
}

/// Everything created by lazy initialization.
struct GpuResources {
    program: glow::Program,
    uniforms: Uniforms,
    vao: glow::VertexArray,
    /// One fixed-size region per message slot.
    vbo: glow::Buffer,
    atlas_texture: glow::Texture,
    border_texture: glow::Texture,
    atlas: Atlas,
}

impl GpuResources {
    /// Rasterize the font, build both bitmaps and create the GL objects.
    ///
    /// Any object created before a failing step is deleted again.
    ///
    /// # Safety
    ///
    /// Requires a valid, current OpenGL context.
    unsafe fn new(
        gl: &glow::Context,
        config: &OsdConfig,
        [_, screen_height]: [u32; 2],
    ) -> Result<Self, OsdError> {
        let pixel_size = config.glyph_pixel_size(screen_height);
        let mut rasterizer = FontdueRasterizer::load(&config.font_path, pixel_size)?;
        let atlas = Atlas::build(&mut rasterizer, config);
        let mask = BorderMask::new(atlas.border_size(), atlas.outline_width());

        let program =
            unsafe { shaders::compile_program(gl, shaders::VERTEX_SRC, shaders::FRAGMENT_SRC) }?;
        let uniforms = match unsafe { Uniforms::locate(gl, program) } {
            Ok(uniforms) => uniforms,
            Err(e) => {
                unsafe { gl.delete_program(program) };
                return Err(e);
            }
        };

        let vao = unsafe { gl.create_vertex_array() };
        let vbo = unsafe { gl.create_buffer() };
        let atlas_texture = unsafe { gl.create_texture() };
        let border_texture = unsafe { gl.create_texture() };

        let (vao, vbo, atlas_texture, border_texture) =
            match (vao, vbo, atlas_texture, border_texture) {
                (Ok(vao), Ok(vbo), Ok(atlas_texture), Ok(border_texture)) => {
                    (vao, vbo, atlas_texture, border_texture)
                }
                (vao, vbo, atlas_texture, border_texture) => {
                    let reason = [
                        vao.as_ref().err(),
                        vbo.as_ref().err(),
                        atlas_texture.as_ref().err(),
                        border_texture.as_ref().err(),
                    ]
                    .into_iter()
                    .flatten()
                    .next()
                    .cloned()
                    .unwrap_or_default();
                    unsafe {
                        if let Ok(vao) = vao {
                            gl.delete_vertex_array(vao);
                        }
                        if let Ok(vbo) = vbo {
                            gl.delete_buffer(vbo);
                        }
                        for texture in [atlas_texture, border_texture].into_iter().flatten() {
                            gl.delete_texture(texture);
                        }
                        gl.delete_program(program);
                    }
                    return Err(OsdError::Gl(reason));
                }
            };

        let resources = Self {
            program,
            uniforms,
            vao,
            vbo,
            atlas_texture,
            border_texture,
            atlas,
        };

        unsafe {
            resources.upload_textures(gl, &mask);
            resources.setup_vertex_buffer(gl, config);
            resources.set_constant_uniforms(gl, config);
        }

        debug!(
            "OSD initialized: atlas {}x{}, row height {}, border {}",
            resources.atlas.bitmap().width(),
            resources.atlas.bitmap().height(),
            resources.atlas.row_height(),
            resources.atlas.border_size(),
        );

        Ok(resources)
    }

    /// Upload the single-channel glyph atlas and the RGBA border mask.
    unsafe fn upload_textures(&self, gl: &glow::Context, mask: &BorderMask) {
        let atlas = self.atlas.bitmap();
        let border = mask.image();
        unsafe {
            // atlas rows are not padded to four bytes
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.active_texture(glow::TEXTURE0);

            gl.bind_texture(glow::TEXTURE_2D, Some(self.atlas_texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                R8_INTERNAL_FORMAT,
                gl_size(atlas.width()),
                gl_size(atlas.height()),
                0,
                glow::RED,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(atlas.as_raw())),
            );
            set_sampling(gl);

            gl.bind_texture(glow::TEXTURE_2D, Some(self.border_texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                RGBA8_INTERNAL_FORMAT,
                gl_size(border.width()),
                gl_size(border.height()),
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(border.as_raw())),
            );
            set_sampling(gl);
        }
    }

    /// Allocate the shared vertex buffer and describe the packed vertex.
    unsafe fn setup_vertex_buffer(&self, gl: &glow::Context, config: &OsdConfig) {
        let stride = std::mem::size_of::<Vertex>();
        let size = config.slot_vertices() * stride * config.message_count;
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_data_size(glow::ARRAY_BUFFER, gl_offset(size), glow::DYNAMIC_DRAW);
            // position in xy, texture coordinate in zw
            gl.vertex_attrib_pointer_f32(
                shaders::VERTEX_ATTRIB,
                4,
                glow::FLOAT,
                false,
                gl_offset(stride),
                0,
            );
            gl.enable_vertex_attrib_array(shaders::VERTEX_ATTRIB);
        }
    }

    /// Colours and the sampler unit never change after initialization.
    unsafe fn set_constant_uniforms(&self, gl: &glow::Context, config: &OsdConfig) {
        let [fr, fg, fb] = config.fg_color;
        let [br, bg, bb] = config.bg_color;
        unsafe {
            gl.use_program(Some(self.program));
            let texture = gl.get_uniform_location(self.program, "u_texture");
            let fg_color = gl.get_uniform_location(self.program, "u_fg_color");
            let bg_color = gl.get_uniform_location(self.program, "u_bg_color");
            gl.uniform_1_i32(texture.as_ref(), 0);
            gl.uniform_3_f32(fg_color.as_ref(), fr, fg, fb);
            gl.uniform_3_f32(bg_color.as_ref(), br, bg, bb);
        }
    }

    /// Delete every GL object.
    unsafe fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.program);
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
            gl.delete_texture(self.atlas_texture);
            gl.delete_texture(self.border_texture);
        }
    }

    /// Compile the message if needed, then draw its border and its text.
    ///
    /// `scratch` must hold one full slot of vertices.
    unsafe fn draw_message(
        &self,
        gl: &glow::Context,
        scratch: &mut [Vertex],
        msg: &mut Message,
        viewport: [i32; 2],
    ) {
        let atlas = &self.atlas;
        let mesh = if let Some(mesh) = msg.compiled {
            mesh
        } else {
            let text_capacity = scratch.len().saturating_sub(BORDER_VERTEX_COUNT);
            let mesh = mesh::compile_text(msg.text(), atlas, &mut scratch[..text_capacity]);
            let end = mesh.vertex_count + BORDER_VERTEX_COUNT;
            let border = mesh::compile_border(mesh.width, atlas);
            scratch[mesh.vertex_count..end].copy_from_slice(&border);
            unsafe {
                gl.buffer_sub_data_u8_slice(
                    glow::ARRAY_BUFFER,
                    gl_offset(msg.vbo_offset),
                    bytemuck::cast_slice(&scratch[..end]),
                );
            }
            msg.compiled = Some(mesh);
            mesh
        };

        let b = gl_size(atlas.border_size());
        let [x, y] = anchor_origin(
            msg.corner(),
            viewport,
            gl_size(mesh.width),
            gl_size(atlas.row_height()),
            b,
        );
        #[expect(clippy::cast_precision_loss)]
        let (x, y, b) = (
            x as f32,
            y as f32 + draw_offset(msg.corner(), msg.y_offset()),
            b as f32,
        );

        let first = msg.vbo_offset / std::mem::size_of::<Vertex>();
        unsafe {
            gl.uniform_1_f32(Some(&self.uniforms.alpha), msg.alpha());

            gl.uniform_2_f32(Some(&self.uniforms.position), x, y);
            gl.bind_texture(glow::TEXTURE_2D, Some(self.border_texture));
            gl.draw_arrays(
                glow::TRIANGLES,
                gl_offset(first + mesh.vertex_count),
                gl_offset(BORDER_VERTEX_COUNT),
            );

            if mesh.vertex_count > 0 {
                gl.uniform_2_f32(Some(&self.uniforms.position), x + b, y + b);
                gl.bind_texture(glow::TEXTURE_2D, Some(self.atlas_texture));
                gl.draw_arrays(
                    glow::TRIANGLES,
                    gl_offset(first),
                    gl_offset(mesh.vertex_count),
                );
            }
        }
    }
}

/// Sampler state for both overlay textures: bilinear filtering, and edge
/// clamping so border `u` coordinates past 1 repeat the mask's last column.
const SAMPLING: [(u32, u32); 4] = [
    (glow::TEXTURE_MIN_FILTER, glow::LINEAR),
    (glow::TEXTURE_MAG_FILTER, glow::LINEAR),
    (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
    (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
];

/// Apply [`SAMPLING`] to the texture bound on `TEXTURE_2D`.
unsafe fn set_sampling(gl: &glow::Context) {
    for (name, value) in SAMPLING {
        // GL enum values fit in an i32.
        #[expect(clippy::cast_possible_wrap)]
        unsafe {
            gl.tex_parameter_i32(glow::TEXTURE_2D, name, value as i32);
        }
    }
}

/// Pipeline state the overlay touches, captured on creation and put back
/// when dropped, whichever way the frame exits.
struct GlStateGuard<'a> {
    gl: &'a glow::Context,
    program: Option<glow::Program>,
    vertex_array: Option<glow::VertexArray>,
    array_buffer: Option<glow::Buffer>,
    active_texture: u32,
    /// Binding of `TEXTURE_2D` on unit 0, the unit the overlay draws with.
    texture: Option<glow::Texture>,
    blend: bool,
    /// `[src_rgb, dst_rgb, src_alpha, dst_alpha]`
    blend_func: [u32; 4],
    unpack_alignment: i32,
}

impl<'a> GlStateGuard<'a> {
    /// Record the current state and leave texture unit 0 active.
    ///
    /// # Safety
    ///
    /// The context must be current for the whole lifetime of the guard.
    unsafe fn capture(gl: &'a glow::Context) -> Self {
        let param = |name| u32::try_from(unsafe { gl.get_parameter_i32(name) }).unwrap_or(0);
        unsafe {
            let active_texture = param(glow::ACTIVE_TEXTURE);
            gl.active_texture(glow::TEXTURE0);
            Self {
                gl,
                program: gl.get_parameter_program(glow::CURRENT_PROGRAM),
                vertex_array: gl.get_parameter_vertex_array(glow::VERTEX_ARRAY_BINDING),
                array_buffer: gl.get_parameter_buffer(glow::ARRAY_BUFFER_BINDING),
                active_texture,
                texture: gl.get_parameter_texture(glow::TEXTURE_BINDING_2D),
                blend: gl.is_enabled(glow::BLEND),
                blend_func: [
                    param(glow::BLEND_SRC_RGB),
                    param(glow::BLEND_DST_RGB),
                    param(glow::BLEND_SRC_ALPHA),
                    param(glow::BLEND_DST_ALPHA),
                ],
                unpack_alignment: gl.get_parameter_i32(glow::UNPACK_ALIGNMENT),
            }
        }
    }
}

impl Drop for GlStateGuard<'_> {
    fn drop(&mut self) {
        let gl = self.gl;
        let [src_rgb, dst_rgb, src_alpha, dst_alpha] = self.blend_func;
        // capture() requires the context to stay current until now
        unsafe {
            gl.blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha);
            if self.blend {
                gl.enable(glow::BLEND);
            } else {
                gl.disable(glow::BLEND);
            }
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, self.unpack_alignment);

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, self.texture);
            if self.active_texture != 0 {
                gl.active_texture(self.active_texture);
            }

            gl.bind_vertex_array(self.vertex_array);
            gl.bind_buffer(glow::ARRAY_BUFFER, self.array_buffer);
            gl.use_program(self.program);
        }
    }
}

/// Initialization progress. Failure is permanent.
enum Stage {
    Pending,
    Ready(GpuResources),
    Failed,
}

/// Draws the on-screen messages over whatever the host has rendered.
///
/// Nothing touches the GL context until the first [`render`](Self::render),
/// which rasterizes the font and creates the GPU objects. If that fails the
/// error is logged once and the overlay stays disabled: every later frame is
/// a no-op and [`Osd`] handles drop their messages.
///
/// # Example
///
/// ```no_run
/// # use osd_overlay_glow::{Corner, OsdConfig, OsdRenderer};
/// # use std::sync::Arc;
/// # fn example(gl: Arc<glow::Context>) {
/// let config = OsdConfig::new("/usr/share/fonts/mono.ttf");
/// let mut renderer = OsdRenderer::new(gl, config, [1280, 720]);
/// let osd = renderer.osd();
///
/// // Each frame, after the host has drawn:
/// unsafe { renderer.render() };
/// osd.create_message(Corner::TopRight, "Paused");
///
/// // Before the context goes away:
/// unsafe { renderer.shutdown() };
/// # }
/// ```
pub struct OsdRenderer {
    gl: Arc<glow::Context>,
    osd: Osd,
    config: OsdConfig,
    /// Screen size used to pick the glyph size at initialization.
    screen: [u32; 2],
    stage: Stage,
    clock: FrameClock,
    /// Viewport size the projection uniform was last set for.
    viewport: [i32; 2],
    /// One slot's worth of vertices, reused for every compilation.
    scratch: Vec<Vertex>,
}

impl OsdRenderer {
    /// Set up the overlay for a screen of `[width, height]` pixels.
    ///
    /// No GL calls are made here; see [`render`](Self::render).
    pub fn new(gl: Arc<glow::Context>, config: OsdConfig, screen: [u32; 2]) -> Self {
        Self {
            gl,
            osd: Osd::new(&config),
            scratch: vec![Vertex::default(); config.slot_vertices()],
            config,
            screen,
            stage: Stage::Pending,
            clock: FrameClock::default(),
            viewport: [0, 0],
        }
    }

    /// A handle for posting messages from any thread.
    pub fn osd(&self) -> Osd {
        self.osd.clone()
    }

    /// Whether initialization failed and the overlay is disabled.
    pub fn is_failed(&self) -> bool {
        matches!(self.stage, Stage::Failed)
    }

    /// Change the screen size used to pick the glyph size. Takes effect at
    /// the next initialization.
    pub fn set_screen_size(&mut self, screen: [u32; 2]) {
        self.screen = screen;
    }

    /// Advance every message by the time since the previous call and draw
    /// them into the current framebuffer and viewport.
    ///
    /// The first call initializes the GPU side. Program, vertex array, array
    /// buffer, texture and blend bindings are restored before returning.
    ///
    /// # Safety
    ///
    /// Requires the GL context passed to [`new`](Self::new) to be current.
    pub unsafe fn render(&mut self) {
        let elapsed = self.clock.tick(Instant::now());

        if matches!(self.stage, Stage::Pending) {
            unsafe { self.init() };
        }
        let Stage::Ready(res) = &self.stage else {
            return;
        };

        let mut shared = self.osd.lock();
        if shared.queue.is_empty() {
            return;
        }

        let gl = &*self.gl;
        let _state = unsafe { GlStateGuard::capture(gl) };

        let mut viewport = [0_i32; 4];
        unsafe {
            gl.use_program(Some(res.program));
            gl.bind_vertex_array(Some(res.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(res.vbo));
            gl.get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);
        }

        let size = [viewport[2], viewport[3]];
        if size != self.viewport {
            self.viewport = size;
            let matrix = projection(size);
            unsafe { gl.uniform_matrix_4_f32_slice(Some(&res.uniforms.projection), false, &matrix) };
        }

        unsafe {
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
        }

        let scratch = &mut self.scratch;
        let message_height = message_height(&res.atlas);
        shared.queue.advance(elapsed, message_height, |msg| unsafe {
            res.draw_message(gl, scratch.as_mut_slice(), msg, size);
        });
    }

    /// Bring up the GPU side and open the message pool, or latch the
    /// failure.
    unsafe fn init(&mut self) {
        let gl = Arc::clone(&self.gl);
        let _state = unsafe { GlStateGuard::capture(&gl) };
        match unsafe { GpuResources::new(&gl, &self.config, self.screen) } {
            Ok(res) => {
                self.stage = Stage::Ready(res);
                self.viewport = [0, 0];
                self.osd.lock().status = Status::Ready;
            }
            Err(e) => {
                error!("OSD disabled: {e}");
                self.stage = Stage::Failed;
                self.osd.lock().status = Status::Failed;
            }
        }
    }

    /// Drop every message and delete the GL objects.
    ///
    /// Producers are shut out until the next [`render`](Self::render)
    /// initializes again. A failed overlay stays failed.
    ///
    /// # Safety
    ///
    /// Requires the GL context passed to [`new`](Self::new) to be current.
    pub unsafe fn shutdown(&mut self) {
        let mut shared = self.osd.lock();
        shared.queue.clear();
        if let Stage::Ready(res) = &self.stage {
            unsafe { res.destroy(&self.gl) };
            self.stage = Stage::Pending;
            shared.status = Status::Pending;
        }
        self.clock = FrameClock::default();
        debug!("OSD shut down");
    }
}

/// Bottom-left corner of a message's border box in viewport pixels, before
/// stacking.
///
/// `text_width` is the compiled text width, `row_height` the atlas row height
/// and `border` the border size.
pub fn anchor_origin(
    corner: Corner,
    [width, height]: [i32; 2],
    text_width: i32,
    row_height: i32,
    border: i32,
) -> [i32; 2] {
    let x = match corner {
        Corner::TopLeft | Corner::MiddleLeft | Corner::BottomLeft => border,
        Corner::TopCenter | Corner::MiddleCenter | Corner::BottomCenter => {
            width / 2 - text_width / 2 - border
        }
        Corner::TopRight | Corner::MiddleRight | Corner::BottomRight => {
            width - text_width - 3 * border
        }
    };
    let y = if corner.is_top() {
        height - row_height - 3 * border
    } else if corner.is_middle() {
        height / 2 - row_height / 2 - border
    } else {
        border
    };
    [x, y]
}

/// Stacking offset as applied on screen: top anchors stack downward.
fn draw_offset(corner: Corner, y_offset: f32) -> f32 {
    if corner.is_top() {
        -y_offset
    } else {
        y_offset
    }
}

/// Millisecond frame timer.
///
/// Time is counted as whole milliseconds since the first tick, and each tick
/// returns the difference from the previous count. Sub-millisecond remainders
/// therefore carry over to later frames instead of being lost.
#[derive(Debug, Default)]
pub struct FrameClock {
    epoch: Option<Instant>,
    last_ms: u128,
}

impl FrameClock {
    /// Milliseconds to advance by for a frame starting at `now`. The first
    /// tick returns 0.
    pub fn tick(&mut self, now: Instant) -> u32 {
        let Some(epoch) = self.epoch else {
            self.epoch = Some(now);
            self.last_ms = 0;
            return 0;
        };
        let ms = now.saturating_duration_since(epoch).as_millis();
        let elapsed = ms.saturating_sub(self.last_ms);
        self.last_ms = self.last_ms.max(ms);
        u32::try_from(elapsed).unwrap_or(u32::MAX)
    }
}

/// Vertical distance between stacked messages.
#[expect(clippy::cast_precision_loss)]
fn message_height(atlas: &Atlas) -> f32 {
    (atlas.row_height() + 3 * atlas.border_size()) as f32
}

/// Column-major orthographic projection of `[0, w] × [0, h]` onto clip
/// space.
#[expect(clippy::cast_precision_loss)]
pub fn projection([width, height]: [i32; 2]) -> [f32; 16] {
    let (w, h) = (width.max(1) as f32, height.max(1) as f32);
    [
        2.0 / w, 0.0, 0.0, 0.0, //
        0.0, 2.0 / h, 0.0, 0.0, //
        0.0, 0.0, -1.0, 0.0, //
        -1.0, -1.0, 0.0, 1.0,
    ]
}
