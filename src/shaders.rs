//! GLSL shader sources and compilation helpers.
//!
//! Both stages target GLSL 1.40 (OpenGL 3.1), which is widely supported on
//! desktop platforms. Text and borders share one program: the texture bound
//! for the draw call decides which of the two is being drawn.

use glow::HasContext;

use crate::error::OsdError;

/// Attribute slot of the packed vertex, bound before linking.
pub const VERTEX_ATTRIB: u32 = 0;

/// Vertex shader for message meshes.
///
/// Each vertex packs its pixel position in `xy` and its texture coordinate in
/// `zw`. Positions are relative to the mesh origin, which `u_position` places
/// in viewport pixels.
///
/// # Uniforms
///
/// | Name           | Type   | Description                                 |
/// |----------------|--------|---------------------------------------------|
/// | `u_projection` | `mat4` | Viewport pixels to clip space               |
/// | `u_position`   | `vec2` | Mesh origin in viewport pixels (bottom-left)|
pub const VERTEX_SRC: &str = r"#version 140

in vec4 a_vertex;

uniform mat4 u_projection;
uniform vec2 u_position;

out vec2 v_uv;

void main() {
    v_uv = a_vertex.zw;
    gl_Position = u_projection * vec4(a_vertex.xy + u_position, 0.0, 1.0);
}
";

/// Fragment shader for message meshes.
///
/// The red channel of the sample picks between the background and the
/// foreground colour; its alpha channel masks the shape. With the glyph atlas
/// bound (a single red channel, alpha reads as 1) this gives glyphs on an
/// opaque box; with the border mask bound it gives the rounded frame and its
/// outline.
///
/// # Uniforms
///
/// | Name         | Type        | Description                       |
/// |--------------|-------------|-----------------------------------|
/// | `u_texture`  | `sampler2D` | Atlas or border mask              |
/// | `u_fg_color` | `vec3`      | Glyph and outline colour          |
/// | `u_bg_color` | `vec3`      | Box fill colour                   |
/// | `u_alpha`    | `float`     | Message opacity (fade in and out) |
pub const FRAGMENT_SRC: &str = r"#version 140

in vec2 v_uv;

uniform sampler2D u_texture;
uniform vec3 u_fg_color;
uniform vec3 u_bg_color;
uniform float u_alpha;

out vec4 frag_color;

void main() {
    vec4 s = texture(u_texture, v_uv);
    frag_color = vec4(mix(u_bg_color, u_fg_color, s.r), u_alpha * s.a);
}
";

/// Compile a shader program from vertex and fragment source strings.
///
/// `a_vertex` is bound to [`VERTEX_ATTRIB`] before linking. The compiled
/// shader objects are detached and deleted once the program is linked, so
/// only the program handle needs to be cleaned up by the caller.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
///
/// # Errors
///
/// Returns [`OsdError::Shader`] with the info log if compilation or linking
/// fails.
pub unsafe fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<glow::Program, OsdError> {
    let program = unsafe { gl.create_program() }.map_err(OsdError::Gl)?;

    let vs = match unsafe { compile_shader(gl, Stage::Vertex, vertex_src) } {
        Ok(vs) => vs,
        Err(e) => {
            unsafe { gl.delete_program(program) };
            return Err(e);
        }
    };
    let fs = match unsafe { compile_shader(gl, Stage::Fragment, fragment_src) } {
        Ok(fs) => fs,
        Err(e) => {
            unsafe {
                gl.delete_shader(vs);
                gl.delete_program(program);
            }
            return Err(e);
        }
    };

    unsafe {
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.bind_attrib_location(program, VERTEX_ATTRIB, "a_vertex");
        gl.link_program(program);

        let linked = gl.get_program_link_status(program);
        let log = (!linked).then(|| gl.get_program_info_log(program));

        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);

        if let Some(log) = log {
            gl.delete_program(program);
            return Err(OsdError::Shader(format!("link: {}", log.trim_end())));
        }
    }

    Ok(program)
}

/// One of the two programmable stages the overlay uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn gl_type(self) -> u32 {
        match self {
            Stage::Vertex => glow::VERTEX_SHADER,
            Stage::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Stage::Vertex => "vertex",
            Stage::Fragment => "fragment",
        }
    }
}

/// Build the error reported for a failed compile of `stage`.
fn compile_error(stage: Stage, log: &str) -> OsdError {
    OsdError::Shader(format!("{} shader: {}", stage.name(), log.trim_end()))
}

/// Compile one stage of the message program.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
unsafe fn compile_shader(
    gl: &glow::Context,
    stage: Stage,
    source: &str,
) -> Result<glow::Shader, OsdError> {
    let shader = unsafe { gl.create_shader(stage.gl_type()) }.map_err(OsdError::Gl)?;
    let log = unsafe {
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        (!gl.get_shader_compile_status(shader)).then(|| gl.get_shader_info_log(shader))
    };
    match log {
        None => Ok(shader),
        Some(log) => {
            unsafe { gl.delete_shader(shader) };
            Err(compile_error(stage, &log))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_declare_the_uniforms_the_renderer_sets() {
        for name in ["u_projection", "u_position"] {
            assert!(VERTEX_SRC.contains(name), "{name}");
        }
        for name in ["u_texture", "u_fg_color", "u_bg_color", "u_alpha"] {
            assert!(FRAGMENT_SRC.contains(name), "{name}");
        }
        assert!(VERTEX_SRC.contains("in vec4 a_vertex;"));
    }

    #[test]
    fn compile_errors_name_the_stage() {
        let err = compile_error(Stage::Fragment, "0:12: 'frag' : undeclared\n");
        assert_eq!(
            err.to_string(),
            "fragment shader: 0:12: 'frag' : undeclared"
        );
        assert_eq!(Stage::Vertex.gl_type(), glow::VERTEX_SHADER);
    }
}
