//! Fixed pool of message slots and the per-frame lifecycle that drives them.
//!
//! Slots live in one array for the life of the pool. Each slot is in exactly
//! one of three places: the free list, the active sequence, or detached (a
//! caller-managed message that finished its lifecycle and was not recycled).
//! The slot's byte offset into the shared vertex buffer is fixed when the
//! pool is built and never changes.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};

use log::{debug, trace};

use crate::config::{OsdConfig, Timeouts};
use crate::mesh::TextMesh;
use crate::types::{Corner, MessageId, MessageState, Vertex};

/// Where a slot currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Membership {
    Free,
    Active,
    Detached,
}

/// One message slot.
#[derive(Debug)]
pub struct Message {
    text: String,
    corner: Corner,
    state: MessageState,
    timeouts: Timeouts,
    elapsed_ms: u32,
    y_offset: f32,
    alpha: f32,
    /// Cached text mesh; `None` until the renderer compiles the current text.
    pub(crate) compiled: Option<TextMesh>,
    /// Byte offset of this slot in the shared vertex buffer.
    pub(crate) vbo_offset: usize,
    caller_managed: bool,
    generation: u32,
    membership: Membership,
}

impl Message {
    fn new(vbo_offset: usize) -> Self {
        Self {
            text: String::new(),
            corner: Corner::BottomLeft,
            state: MessageState::Appearing,
            timeouts: [Some(0); 3],
            elapsed_ms: 0,
            y_offset: 0.0,
            alpha: 0.0,
            compiled: None,
            vbo_offset,
            caller_managed: false,
            generation: 0,
            membership: Membership::Free,
        }
    }

    /// Current text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Anchor the message is pinned to.
    pub fn corner(&self) -> Corner {
        self.corner
    }

    /// Lifecycle phase.
    pub fn state(&self) -> MessageState {
        self.state
    }

    /// Time spent in the current phase.
    pub fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms
    }

    /// Stacking plus scroll-in offset from the anchor, in pixels, as computed
    /// by the last frame.
    pub fn y_offset(&self) -> f32 {
        self.y_offset
    }

    /// Opacity as computed by the last frame.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    fn timeout(&self) -> Option<u32> {
        self.timeouts[self.state.index()]
    }

    /// Add frame time and move to the next phase once the current one has
    /// run out. Returns `false` when the message is done.
    fn tick(&mut self, elapsed_ms: u32) -> bool {
        self.elapsed_ms = self.elapsed_ms.saturating_add(elapsed_ms);
        match self.timeout() {
            Some(timeout) if self.elapsed_ms >= timeout => match self.state.next() {
                Some(next) => {
                    trace!("message {:?} -> {next:?}", self.text);
                    self.state = next;
                    self.elapsed_ms = 0;
                    true
                }
                None => false,
            },
            _ => true,
        }
    }

    /// Fade in while appearing, fade out while disappearing.
    #[expect(clippy::cast_precision_loss)]
    fn update_alpha(&mut self) {
        self.alpha = match self.timeout() {
            Some(timeout) if timeout != 0 => {
                let t = timeout as f32;
                match self.state {
                    MessageState::Appearing => self.elapsed_ms as f32 / t,
                    MessageState::Disappearing => {
                        timeout.saturating_sub(self.elapsed_ms) as f32 / t
                    }
                    MessageState::Displaying => 1.0,
                }
            }
            _ => 1.0,
        }
        .clamp(0.0, 1.0);
    }
}

/// Format `text` into `buf`, keeping at most `max_len - 1` bytes.
fn format_into(buf: &mut String, text: impl fmt::Display, max_len: usize) {
    buf.clear();
    // writing into a String cannot fail
    let _ = write!(buf, "{text}");
    let mut len = max_len.saturating_sub(1).min(buf.len());
    while !buf.is_char_boundary(len) {
        len -= 1;
    }
    buf.truncate(len);
}

/// The pool of message slots, split into free and active sequences.
pub struct MessageQueue {
    slots: Vec<Message>,
    free: VecDeque<usize>,
    /// Newest first; this is the drawing and stacking order.
    active: VecDeque<usize>,
    /// Scroll-in state per corner, in message heights. Zero or negative.
    corner_scroll: [f32; Corner::COUNT],
    config: OsdConfig,
}

impl MessageQueue {
    /// Allocate `config.message_count` slots, all free.
    pub fn new(config: &OsdConfig) -> Self {
        let slot_bytes = config.slot_vertices() * std::mem::size_of::<Vertex>();
        let slots: Vec<Message> = (0..config.message_count)
            .map(|i| Message::new(i * slot_bytes))
            .collect();
        Self {
            free: (0..slots.len()).collect(),
            active: VecDeque::with_capacity(slots.len()),
            slots,
            corner_scroll: [0.0; Corner::COUNT],
            config: config.clone(),
        }
    }

    /// Whether nothing is on screen.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Number of active messages.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Number of slots available for new messages.
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Resolve a handle to a slot that is not on the free list.
    fn lookup(&self, id: MessageId) -> Option<usize> {
        let index = usize::try_from(id.index).ok()?;
        let msg = self.slots.get(index)?;
        (msg.generation == id.generation && msg.membership != Membership::Free).then_some(index)
    }

    /// The message behind `id`, if the handle is still live.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.lookup(id).map(|i| &self.slots[i])
    }

    /// Whether `id` refers to a message that is currently on screen.
    pub fn is_active(&self, id: MessageId) -> bool {
        self.get(id).is_some_and(|m| m.membership == Membership::Active)
    }

    /// Take a free slot and start a new message on `corner`.
    ///
    /// Returns `None` when every slot is in use.
    pub fn create(&mut self, corner: Corner, text: impl fmt::Display) -> Option<MessageId> {
        let Some(index) = self.free.pop_front() else {
            debug!("message pool exhausted, dropping message");
            return None;
        };

        let timeouts = self.config.timeouts_for(corner);
        let msg = &mut self.slots[index];
        format_into(&mut msg.text, text, self.config.max_message_len);
        msg.corner = corner;
        msg.state = MessageState::Appearing;
        msg.timeouts = timeouts;
        msg.elapsed_ms = 0;
        msg.y_offset = 0.0;
        msg.update_alpha();
        msg.compiled = None;
        msg.caller_managed = false;
        msg.generation = msg.generation.wrapping_add(1);
        msg.membership = Membership::Active;

        // start one message height further out and scroll in from there
        self.corner_scroll[corner.index()] -= 1.0;
        self.active.push_front(index);

        Some(MessageId {
            index: u32::try_from(index).ok()?,
            generation: msg.generation,
        })
    }

    /// Replace the text of a message.
    ///
    /// A message already fading out is brought back to the start of its
    /// display phase; a detached caller-managed message is put back on
    /// screen.
    pub fn update(&mut self, id: MessageId, text: impl fmt::Display) {
        let Some(index) = self.lookup(id) else { return };
        let max_len = self.config.max_message_len;
        let msg = &mut self.slots[index];

        let mut new_text = String::with_capacity(msg.text.len());
        format_into(&mut new_text, text, max_len);
        if new_text != msg.text {
            msg.text = new_text;
            msg.compiled = None;
        }

        if msg.state == MessageState::Disappearing {
            msg.state = MessageState::Displaying;
            msg.elapsed_ms = 0;
        }

        if msg.membership != Membership::Active {
            msg.membership = Membership::Active;
            self.active.push_front(index);
        }
    }

    /// Take a message off screen and return its slot to the pool, whether or
    /// not it was caller-managed.
    pub fn delete(&mut self, id: MessageId) {
        let Some(index) = self.lookup(id) else { return };
        self.slots[index].caller_managed = false;
        self.active.retain(|&i| i != index);
        self.release(index);
    }

    /// Keep a message on screen until it is deleted.
    pub fn set_static(&mut self, id: MessageId) {
        let Some(index) = self.lookup(id) else { return };
        let msg = &mut self.slots[index];
        msg.timeouts[MessageState::Displaying.index()] = None;
        msg.state = MessageState::Displaying;
        msg.elapsed_ms = 0;
    }

    /// Stop the slot from returning to the pool when its lifecycle ends.
    pub fn set_caller_managed(&mut self, id: MessageId) {
        if let Some(index) = self.lookup(id) {
            self.slots[index].caller_managed = true;
        }
    }

    /// Free the text of a slot already unlinked from `active` and put it on
    /// the free list, or detach it if the caller manages it.
    fn release(&mut self, index: usize) {
        let msg = &mut self.slots[index];
        msg.text = String::new();
        msg.compiled = None;
        if msg.caller_managed {
            msg.membership = Membership::Detached;
        } else {
            msg.membership = Membership::Free;
            self.free.push_front(index);
        }
    }

    /// Advance every active message by `elapsed_ms` and hand the survivors
    /// to `draw`, newest first.
    ///
    /// Messages sharing a corner stack `message_height` apart. Edge corners
    /// additionally slide by their scroll-in state, which then decays back to
    /// zero over `scroll_ms` per message height.
    pub fn advance(
        &mut self,
        elapsed_ms: u32,
        message_height: f32,
        mut draw: impl FnMut(&mut Message),
    ) {
        let mut stack = [0.0_f32; Corner::COUNT];

        let mut i = 0;
        while i < self.active.len() {
            let index = self.active[i];
            let msg = &mut self.slots[index];

            if !msg.tick(elapsed_ms) {
                trace!("message {:?} expired", msg.text);
                self.active.remove(i);
                self.release(index);
                continue;
            }

            let corner = msg.corner.index();
            msg.y_offset = stack[corner];
            if !msg.corner.is_middle() {
                msg.y_offset += self.corner_scroll[corner] * message_height;
            }
            msg.update_alpha();
            draw(msg);

            stack[corner] += message_height;
            i += 1;
        }

        #[expect(clippy::cast_precision_loss)]
        let scroll = elapsed_ms as f32 / self.config.scroll_ms;
        for s in &mut self.corner_scroll {
            *s = (*s + scroll).min(0.0);
        }
    }

    /// Return every slot to the free list, detached ones included.
    pub fn clear(&mut self) {
        while let Some(index) = self.active.pop_front() {
            self.slots[index].caller_managed = false;
            self.release(index);
        }
        for index in 0..self.slots.len() {
            if self.slots[index].membership == Membership::Detached {
                self.slots[index].caller_managed = false;
                self.release(index);
            }
        }
        self.corner_scroll = [0.0; Corner::COUNT];
    }

    /// Scroll-in state of `corner`, in message heights.
    pub fn corner_scroll(&self, corner: Corner) -> f32 {
        self.corner_scroll[corner.index()]
    }

    /// Check that every slot sits in exactly one place and the lists agree
    /// with each slot's own record.
    pub(crate) fn partition_is_consistent(&self) -> bool {
        let mut seen = vec![None; self.slots.len()];
        let listed = self
            .free
            .iter()
            .map(|&i| (i, Membership::Free))
            .chain(self.active.iter().map(|&i| (i, Membership::Active)));
        for (index, place) in listed {
            match seen.get_mut(index) {
                Some(entry) if entry.is_none() => *entry = Some(place),
                _ => return false,
            }
        }
        self.slots.iter().zip(seen).all(|(msg, place)| match place {
            Some(place) => msg.membership == place,
            None => msg.membership == Membership::Detached,
        })
    }
}
