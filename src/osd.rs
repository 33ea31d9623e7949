//! The producer-side handle: create, update and delete messages from any
//! thread.

use std::fmt;
use std::sync::Arc;

use log::warn;
use parking_lot::{Mutex, MutexGuard};

use crate::config::OsdConfig;
use crate::queue::MessageQueue;
use crate::types::{Corner, MessageId};

/// Whether the renderer has brought the GPU side up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    /// Not initialized yet, or shut down.
    Pending,
    Ready,
    /// Initialization failed; the overlay stays disabled.
    Failed,
}

/// Everything guarded by the queue lock.
pub(crate) struct Shared {
    pub status: Status,
    pub queue: MessageQueue,
}

/// Cloneable, thread-safe handle for posting on-screen messages.
///
/// Every operation takes the same lock the renderer holds while it advances
/// and draws the queue. Until the renderer has initialized (and forever, if
/// initialization failed) new messages are dropped and the other operations
/// do nothing.
///
/// # Example
///
/// ```no_run
/// # use osd_overlay_glow::{Corner, Osd, OsdConfig};
/// let osd = Osd::new(&OsdConfig::new("/usr/share/fonts/mono.ttf"));
/// let slot = 2;
/// if let Some(msg) = osd.create_message(Corner::BottomLeft, format_args!("Saved state {slot}")) {
///     osd.update_message(msg, "Saved state 2 (overwritten)");
/// }
/// ```
#[derive(Clone)]
pub struct Osd {
    shared: Arc<Mutex<Shared>>,
}

impl Osd {
    /// Build the message pool described by `config`.
    pub fn new(config: &OsdConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                status: Status::Pending,
                queue: MessageQueue::new(config),
            })),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock()
    }

    /// Run `f` on the queue if the overlay is up.
    fn with_ready<T>(&self, f: impl FnOnce(&mut MessageQueue) -> T) -> Option<T> {
        let mut shared = self.lock();
        (shared.status == Status::Ready).then(|| f(&mut shared.queue))
    }

    /// Post a new message on `corner`.
    ///
    /// Returns `None` if the overlay is not running or every slot is in use;
    /// the message is simply dropped in that case.
    pub fn create_message(&self, corner: Corner, text: impl fmt::Display) -> Option<MessageId> {
        self.with_ready(|q| q.create(corner, text)).flatten()
    }

    /// Post a new message on the anchor numbered `corner` (0 = top left,
    /// 8 = bottom right, row by row). Out-of-range anchors are rejected.
    pub fn create_message_at(&self, corner: u32, text: impl fmt::Display) -> Option<MessageId> {
        match Corner::try_from(corner) {
            Ok(corner) => self.create_message(corner, text),
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }

    /// Replace a message's text. A message that is already fading out is
    /// shown again for its full display time.
    pub fn update_message(&self, id: MessageId, text: impl fmt::Display) {
        self.with_ready(|q| q.update(id, text));
    }

    /// Remove a message and recycle its slot.
    pub fn delete_message(&self, id: MessageId) {
        self.with_ready(|q| q.delete(id));
    }

    /// Keep a message on screen until [`delete_message`](Self::delete_message).
    pub fn set_static(&self, id: MessageId) {
        self.with_ready(|q| q.set_static(id));
    }

    /// Keep the message's slot reserved after it fades out, so the handle
    /// can bring it back with [`update_message`](Self::update_message).
    pub fn set_caller_managed(&self, id: MessageId) {
        self.with_ready(|q| q.set_caller_managed(id));
    }

    /// Whether `id` is currently on screen.
    pub fn is_active(&self, id: MessageId) -> bool {
        self.lock().queue.is_active(id)
    }

    /// Number of messages on screen.
    pub fn active_count(&self) -> usize {
        self.lock().queue.active_len()
    }

    /// Whether the renderer has initialized and accepts messages.
    pub fn is_ready(&self) -> bool {
        self.lock().status == Status::Ready
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn ready_osd(count: usize) -> Osd {
        let osd = Osd::new(&OsdConfig::default().with_message_count(count));
        osd.lock().status = Status::Ready;
        osd
    }

    #[test]
    fn messages_are_dropped_until_ready() {
        let osd = Osd::new(&OsdConfig::default().with_message_count(4));
        assert!(!osd.is_ready());
        assert!(osd.create_message(Corner::TopLeft, "early").is_none());
        assert_eq!(osd.active_count(), 0);

        osd.lock().status = Status::Ready;
        assert!(osd.create_message(Corner::TopLeft, "now").is_some());
        assert_eq!(osd.active_count(), 1);
    }

    #[test]
    fn failed_overlay_ignores_everything() {
        let osd = ready_osd(2);
        let id = osd.create_message(Corner::TopLeft, "before").unwrap();
        osd.lock().status = Status::Failed;

        assert!(osd.create_message(Corner::TopLeft, "after").is_none());
        osd.delete_message(id);
        assert!(osd.is_active(id));
    }

    #[test]
    fn numbered_corners() {
        let osd = ready_osd(2);
        let id = osd.create_message_at(8, "bottom right").unwrap();
        let corner = osd.lock().queue.get(id).unwrap().corner();
        assert_eq!(corner, Corner::BottomRight);
        assert!(osd.create_message_at(9, "nowhere").is_none());
        assert_eq!(osd.active_count(), 1);
    }

    #[test]
    fn handles_are_shared_between_clones() {
        let osd = ready_osd(2);
        let other = osd.clone();
        let id = osd.create_message(Corner::MiddleCenter, "shared").unwrap();
        other.update_message(id, "changed");
        assert_eq!(osd.lock().queue.get(id).unwrap().text(), "changed");
        other.delete_message(id);
        assert!(!osd.is_active(id));
    }

    #[test]
    fn concurrent_producers_keep_the_pool_consistent() {
        const PRODUCERS: usize = 4;
        const ITERATIONS: usize = 10_000;

        let osd = ready_osd(20);
        let done = AtomicBool::new(false);

        thread::scope(|s| {
            s.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    let mut shared = osd.lock();
                    shared.queue.advance(7, 20.0, |_| {});
                    assert!(shared.queue.partition_is_consistent());
                }
            });

            let producers: Vec<_> = (0..PRODUCERS)
                .map(|p| {
                    let osd = osd.clone();
                    s.spawn(move || {
                        let mut mine = Vec::new();
                        for i in 0..ITERATIONS {
                            let corner = Corner::ALL[(p + i) % Corner::COUNT];
                            match i % 5 {
                                0 | 1 => {
                                    if let Some(id) = osd.create_message(corner, i) {
                                        mine.push(id);
                                    }
                                }
                                2 => {
                                    if let Some(&id) = mine.last() {
                                        osd.update_message(id, format_args!("{p}:{i}"));
                                    }
                                }
                                3 => {
                                    if let Some(id) = mine.pop() {
                                        osd.delete_message(id);
                                    }
                                }
                                _ => {
                                    if let Some(&id) = mine.first() {
                                        osd.set_caller_managed(id);
                                        osd.set_static(id);
                                    }
                                }
                            }
                        }
                        for id in mine {
                            osd.delete_message(id);
                        }
                    })
                })
                .collect();

            for handle in producers {
                handle.join().unwrap();
            }
            done.store(true, Ordering::Relaxed);
        });

        let mut shared = osd.lock();
        assert!(shared.queue.partition_is_consistent());
        shared.queue.clear();
        assert_eq!(shared.queue.free_len(), 20);
    }
}
