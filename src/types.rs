//! Plain data types shared between the mesh compilers, the message queue and
//! the renderer.

use bytemuck::{Pod, Zeroable};

use crate::error::OsdError;

/// A vertex of a text or border mesh, ready for the GPU.
///
/// Positions are in pixels relative to the message origin; `uv` addresses
/// either the glyph atlas or the border mask depending on the draw call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Pixel position.
    pub position: [f32; 2],
    /// Normalized texture coordinate.
    pub uv: [f32; 2],
}

impl Vertex {
    /// Build a vertex from integer pixel coordinates.
    #[expect(clippy::cast_precision_loss)]
    pub(crate) fn at(x: i32, y: i32, u: f32, v: f32) -> Self {
        Self {
            position: [x as f32, y as f32],
            uv: [u, v],
        }
    }
}

/// Screen anchor a message is pinned to.
///
/// ```text
///   TopLeft    TopCenter    TopRight
///   MiddleLeft MiddleCenter MiddleRight
///   BottomLeft BottomCenter BottomRight
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Corner {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    MiddleCenter,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Corner {
    /// Number of anchors.
    pub const COUNT: usize = 9;

    /// All anchors in their numeric order.
    pub const ALL: [Corner; Self::COUNT] = [
        Corner::TopLeft,
        Corner::TopCenter,
        Corner::TopRight,
        Corner::MiddleLeft,
        Corner::MiddleCenter,
        Corner::MiddleRight,
        Corner::BottomLeft,
        Corner::BottomCenter,
        Corner::BottomRight,
    ];

    /// Index into per-corner tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the anchor sits on the top row.
    pub fn is_top(self) -> bool {
        matches!(self, Corner::TopLeft | Corner::TopCenter | Corner::TopRight)
    }

    /// Whether the anchor sits on the middle row. Middle messages do not
    /// scroll in and use the shorter timeouts.
    pub fn is_middle(self) -> bool {
        matches!(
            self,
            Corner::MiddleLeft | Corner::MiddleCenter | Corner::MiddleRight
        )
    }
}

impl TryFrom<u32> for Corner {
    type Error = OsdError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(OsdError::InvalidCorner(value))
    }
}

/// Lifecycle phase of an active message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageState {
    /// Fading in.
    Appearing,
    /// Fully visible.
    Displaying,
    /// Fading out; removed once this phase times out.
    Disappearing,
}

impl MessageState {
    /// Index into a [`Timeouts`](crate::config::Timeouts) triple.
    pub fn index(self) -> usize {
        match self {
            MessageState::Appearing => 0,
            MessageState::Displaying => 1,
            MessageState::Disappearing => 2,
        }
    }

    /// The following phase, or `None` once the message should be removed.
    pub fn next(self) -> Option<Self> {
        match self {
            MessageState::Appearing => Some(MessageState::Displaying),
            MessageState::Displaying => Some(MessageState::Disappearing),
            MessageState::Disappearing => None,
        }
    }
}

/// Handle to a message returned by
/// [`Osd::create_message`](crate::Osd::create_message).
///
/// A handle outlives its message safely: once the slot is recycled and handed
/// out again, operations on the old handle do nothing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_from_integer() {
        assert_eq!(Corner::try_from(0).ok(), Some(Corner::TopLeft));
        assert_eq!(Corner::try_from(8).ok(), Some(Corner::BottomRight));
        assert!(matches!(
            Corner::try_from(9),
            Err(OsdError::InvalidCorner(9))
        ));
    }

    #[test]
    fn corner_rows() {
        let top: Vec<_> = Corner::ALL.into_iter().filter(|c| c.is_top()).collect();
        let middle: Vec<_> = Corner::ALL.into_iter().filter(|c| c.is_middle()).collect();
        assert_eq!(top, [Corner::TopLeft, Corner::TopCenter, Corner::TopRight]);
        assert_eq!(
            middle,
            [Corner::MiddleLeft, Corner::MiddleCenter, Corner::MiddleRight]
        );
    }

    #[test]
    fn state_sequence_ends_after_disappearing() {
        assert_eq!(
            MessageState::Appearing.next(),
            Some(MessageState::Displaying)
        );
        assert_eq!(MessageState::Disappearing.next(), None);
    }
}
