//! Vertex compilers for message text and the rounded border around it.
//!
//! Both produce plain triangle lists (`glDrawArrays(GL_TRIANGLES, ...)`) in
//! pixel units, with the origin at the bottom-left of the mesh.

use crate::atlas::Atlas;
use crate::types::Vertex;

/// Vertices in every border mesh: four quads of two triangles each.
pub const BORDER_VERTEX_COUNT: usize = 24;

/// Vertices emitted per glyph.
pub const VERTICES_PER_GLYPH: usize = 6;

/// Result of compiling a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextMesh {
    /// Sum of the advances of all emitted glyphs, in pixels.
    pub width: u32,
    /// Number of vertices written.
    pub vertex_count: usize,
}

/// Lay out `text` as one quad per glyph into `vertices`.
///
/// Characters missing from the atlas are skipped. Once the next quad would no
/// longer fit in `vertices`, compilation stops and returns what was written
/// so far.
pub fn compile_text(text: &str, atlas: &Atlas, vertices: &mut [Vertex]) -> TextMesh {
    let h = i32::try_from(atlas.row_height()).unwrap_or(i32::MAX);
    let norm_h = atlas.norm_row_height();
    let mut mesh = TextMesh::default();
    let mut x = 0_i32;

    for ch in text.chars() {
        let Some(glyph) = atlas.glyph(ch) else {
            continue;
        };
        let end = mesh.vertex_count + VERTICES_PER_GLYPH;
        let Some(slot) = vertices.get_mut(mesh.vertex_count..end) else {
            break;
        };

        let w = i32::try_from(glyph.advance).unwrap_or(i32::MAX);
        let [u0, v0] = glyph.uv;
        let (u1, v1) = (u0 + glyph.uv_width, v0 + norm_h);

        let top_left = Vertex::at(x, h, u0, v0);
        let bottom_left = Vertex::at(x, 0, u0, v1);
        let bottom_right = Vertex::at(x + w, 0, u1, v1);
        let top_right = Vertex::at(x + w, h, u1, v0);
        slot.copy_from_slice(&[
            top_left,
            bottom_left,
            bottom_right,
            top_left,
            bottom_right,
            top_right,
        ]);

        mesh.vertex_count += VERTICES_PER_GLYPH;
        mesh.width += glyph.advance;
        x += w;
    }

    mesh
}

/// Two triangles covering one side of the border.
///
/// `corners` go round the quad starting at the outer corner, which maps to
/// the mask origin; `uvs` are the matching texture coordinates.
fn quad(corners: [(i32, i32); 4], uvs: [[f32; 2]; 4]) -> [Vertex; 6] {
    let v = |i: usize| Vertex::at(corners[i].0, corners[i].1, uvs[i][0], uvs[i][1]);
    [v(0), v(1), v(2), v(0), v(2), v(3)]
}

/// Build the 24-vertex frame around a text block `text_width` wide.
///
/// The frame spans `text_width + 2b` by `row_height + 2b`, where `b` is the
/// atlas border size; the text itself goes at `(b, b)`. Each side is one quad
/// whose `u` runs in mask pixels, so the rounded corner occupies the start
/// and the clamped last column of the mask stretches along the rest.
pub fn compile_border(text_width: u32, atlas: &Atlas) -> [Vertex; BORDER_VERTEX_COUNT] {
    let b = i32::try_from(atlas.border_size()).unwrap_or(i32::MAX);
    let w = i32::try_from(text_width).unwrap_or(i32::MAX).saturating_add(b);
    let h = i32::try_from(atlas.row_height()).unwrap_or(i32::MAX).saturating_add(b);

    #[expect(clippy::cast_precision_loss)]
    let (nw, nh) = (w as f32 / (b + 1) as f32, h as f32 / (b + 1) as f32);

    let top = quad(
        [(0, h + b), (0, h), (w, h), (w, h + b)],
        [[0.0, 0.0], [0.0, 1.0], [nw, 1.0], [nw, 0.0]],
    );
    let right = quad(
        [(w + b, h + b), (w + b, b), (w, b), (w, h + b)],
        [[0.0, 0.0], [nh, 0.0], [nh, 1.0], [0.0, 1.0]],
    );
    let bottom = quad(
        [(w + b, 0), (w + b, b), (b, b), (b, 0)],
        [[0.0, 0.0], [0.0, 1.0], [nw, 1.0], [nw, 0.0]],
    );
    let left = quad(
        [(0, 0), (0, h), (b, h), (b, 0)],
        [[0.0, 0.0], [nh, 0.0], [nh, 1.0], [0.0, 1.0]],
    );

    let mut out = [Vertex::default(); BORDER_VERTEX_COUNT];
    for (dst, src) in out.chunks_exact_mut(6).zip([top, right, bottom, left]) {
        dst.copy_from_slice(&src);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::atlas::tests::test_atlas;

    fn advances(atlas: &Atlas, text: &str) -> u32 {
        text.chars().filter_map(|c| atlas.glyph(c)).map(|g| g.advance).sum()
    }

    #[test]
    fn six_vertices_per_glyph() {
        let atlas = test_atlas();
        let mut buf = vec![Vertex::default(); 64];
        let mesh = compile_text("Hi!", &atlas, &mut buf);
        assert_eq!(mesh.vertex_count, 18);
        assert_eq!(mesh.width, advances(&atlas, "Hi!"));
    }

    #[test]
    fn quads_advance_left_to_right() {
        let atlas = test_atlas();
        let mut buf = vec![Vertex::default(); 12];
        compile_text("AB", &atlas, &mut buf);
        let a = atlas.glyph('A').unwrap().advance as f32;
        let h = atlas.row_height() as f32;

        assert_eq!(buf[0].position, [0.0, h]);
        assert_eq!(buf[1].position, [0.0, 0.0]);
        assert_eq!(buf[2].position, [a, 0.0]);
        assert_eq!(buf[5].position, [a, h]);
        // second glyph starts where the first ends
        assert_eq!(buf[6].position, [a, h]);
        assert_eq!(buf[0].uv, atlas.glyph('A').unwrap().uv);
    }

    #[test]
    fn unknown_characters_are_skipped() {
        let atlas = test_atlas();
        let mut buf = vec![Vertex::default(); 64];
        let mesh = compile_text("a\u{e9}~\tb", &atlas, &mut buf);
        assert_eq!(mesh.vertex_count, 12);
        assert_eq!(mesh.width, advances(&atlas, "ab"));
    }

    #[test]
    fn long_text_is_truncated_to_capacity() {
        let atlas = test_atlas();
        let k = 7;
        let text = "abcdefghijkl"; // k + 5 glyphs
        let mut buf = vec![Vertex::default(); k * VERTICES_PER_GLYPH];
        let mesh = compile_text(text, &atlas, &mut buf);
        assert_eq!(mesh.vertex_count, k * VERTICES_PER_GLYPH);
        assert_eq!(mesh.width, advances(&atlas, &text[..k]));
    }

    #[test]
    fn partial_quad_space_is_not_used() {
        let atlas = test_atlas();
        let mut buf = vec![Vertex::default(); 11];
        let mesh = compile_text("xyz", &atlas, &mut buf);
        assert_eq!(mesh.vertex_count, 6);
    }

    #[test]
    fn empty_text_compiles_to_nothing() {
        let atlas = test_atlas();
        let mut buf = vec![Vertex::default(); 6];
        assert_eq!(compile_text("", &atlas, &mut buf), TextMesh::default());
    }

    #[test]
    fn border_frames_the_text_block() {
        let atlas = test_atlas();
        let b = atlas.border_size() as f32;
        let text_h = atlas.row_height() as f32;
        let verts = compile_border(40, &atlas);

        let xs = verts.iter().map(|v| v.position[0]);
        let ys = verts.iter().map(|v| v.position[1]);
        let max_x = xs.clone().fold(f32::MIN, f32::max);
        let min_x = xs.fold(f32::MAX, f32::min);
        let max_y = ys.clone().fold(f32::MIN, f32::max);
        let min_y = ys.fold(f32::MAX, f32::min);

        assert_eq!((min_x, min_y), (0.0, 0.0));
        assert_eq!(max_x, 40.0 + 2.0 * b);
        assert_eq!(max_y, text_h + 2.0 * b);
    }

    #[test]
    fn border_uvs_scale_with_content() {
        let atlas = test_atlas();
        let b = atlas.border_size() as f32;
        let short = compile_border(10, &atlas);
        let long = compile_border(100, &atlas);

        // top edge stretches to (width + b) mask pixels
        assert_eq!(short[2].uv, [(10.0 + b) / (b + 1.0), 1.0]);
        assert_eq!(long[2].uv, [(100.0 + b) / (b + 1.0), 1.0]);
        // the arc always starts at the mask origin
        for side in 0..4 {
            assert_eq!(short[side * 6].uv, [0.0, 0.0]);
        }
    }

    #[test]
    fn border_triangles_are_not_degenerate() {
        let atlas = test_atlas();
        let verts = compile_border(25, &atlas);
        for tri in verts.chunks_exact(3) {
            let [a, b, c] = [tri[0].position, tri[1].position, tri[2].position];
            let area = (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]);
            assert!(area.abs() > 0.0, "{tri:?}");
        }
    }
}
