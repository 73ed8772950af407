/*! The response registry: maps a pending request's tag to a one-shot
delivery slot.

The [`crate::mux::Mux`]'s reader thread is the sole producer into this
map; caller threads are the sole consumers of their own slot. Ownership
is one-directional (registry is owned by the Mux, the reader only
borrows it), so there's no cycle to worry about.
*/
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};

use log::warn;

use crate::tag::ResponseTag;

/// The receiving half of a [`PendingSlot`]. Fulfilled exactly once,
/// either with the raw payload bytes or an empty sentinel on close.
pub type PendingSlot = Receiver<Vec<u8>>;

/// Registry of tags awaiting a reply.
#[derive(Debug, Default)]
pub struct ResponseRegistry {
    pending: Mutex<HashMap<ResponseTag, SyncSender<Vec<u8>>>>,
    closed: AtomicBool,
}

impl ResponseRegistry {
    /// Create a new, open registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tag` and return a handle the caller can block on.
    ///
    /// If the registry has already been closed, the returned slot is
    /// immediately fulfilled with the empty sentinel payload.
    ///
    /// # Panics
    ///
    /// Panics if `tag` is already registered and its prior slot has
    /// not yet been consumed — this indicates a tag generator bug,
    /// since tags must be unique over the lifetime of a live request.
    pub fn wait_for(&self, tag: ResponseTag) -> PendingSlot {
        let (tx, rx) = mpsc::sync_channel(1);
        if self.closed.load(Ordering::SeqCst) {
            // Best-effort: the receiver is guaranteed to get this,
            // since nothing else holds the sender.
            let _ = tx.send(Vec::new());
            return rx;
        }
        let mut pending = self.pending.lock().unwrap();
        if pending.contains_key(&tag) {
            panic!("tag {tag} is already registered with a pending slot");
        }
        pending.insert(tag, tx);
        rx
    }

    /// Deliver `bytes` to the slot registered for `tag`, if any.
    ///
    /// If no caller is waiting on `tag`, the payload is logged and
    /// dropped: this is how an asynchronous framing or late-arrival
    /// error reaches the log instead of a caller.
    pub fn deliver(&self, tag: &ResponseTag, bytes: Vec<u8>) {
        let sender = self.pending.lock().unwrap().remove(tag);
        match sender {
            Some(tx) => {
                // The receiver may have been dropped already (e.g.
                // cancellation raced delivery); that's fine, there's
                // simply nobody left to tell.
                let _ = tx.send(bytes);
            }
            None => {
                warn!("dropping response for unregistered tag {tag}");
            }
        }
    }

    /// Unregister `tag` without delivering anything, if it is still
    /// pending. Used when a caller's wait is cancelled: the slot's
    /// receiver is about to be dropped, so there is nobody left to
    /// deliver to.
    pub fn cancel(&self, tag: &ResponseTag) {
        self.pending.lock().unwrap().remove(tag);
    }

    /// Unregister every tag, delivering the empty sentinel payload to
    /// each, and mark the registry closed so future `wait_for` calls
    /// return an already-fulfilled handle.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut pending = self.pending.lock().unwrap();
        for (_, tx) in pending.drain() {
            let _ = tx.send(Vec::new());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn delivers_to_the_right_tag() {
        let reg = ResponseRegistry::new();
        let a = reg.wait_for(ResponseTag::new("shefi"));
        let b = reg.wait_for(ResponseTag::new("kyaru"));
        reg.deliver(&ResponseTag::new("kyaru"), b"kiruya".to_vec());
        reg.deliver(&ResponseTag::new("shefi"), b"shifuna".to_vec());
        assert_eq!(a.recv_timeout(Duration::from_secs(1)).unwrap(), b"shifuna");
        assert_eq!(b.recv_timeout(Duration::from_secs(1)).unwrap(), b"kiruya");
    }

    #[test]
    fn delivering_unregistered_tag_is_dropped_not_fatal() {
        let reg = ResponseRegistry::new();
        reg.deliver(&ResponseTag::new("ghost"), b"nobody home".to_vec());
    }

    #[test]
    fn close_delivers_sentinel_to_outstanding_waiters() {
        let reg = ResponseRegistry::new();
        let a = reg.wait_for(ResponseTag::new("shefi"));
        reg.close();
        assert_eq!(a.recv_timeout(Duration::from_secs(1)).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn wait_for_after_close_is_already_fulfilled() {
        let reg = ResponseRegistry::new();
        reg.close();
        let a = reg.wait_for(ResponseTag::new("late"));
        assert_eq!(a.recv_timeout(Duration::from_secs(1)).unwrap(), Vec::<u8>::new());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn double_wait_for_same_live_tag_panics() {
        let reg = ResponseRegistry::new();
        let _a = reg.wait_for(ResponseTag::new("dup"));
        let _b = reg.wait_for(ResponseTag::new("dup"));
    }

    #[test]
    fn tag_can_be_reused_after_delivery() {
        let reg = ResponseRegistry::new();
        let a = reg.wait_for(ResponseTag::new("0"));
        reg.deliver(&ResponseTag::new("0"), b"first".to_vec());
        assert_eq!(a.recv_timeout(Duration::from_secs(1)).unwrap(), b"first");
        let b = reg.wait_for(ResponseTag::new("0"));
        reg.deliver(&ResponseTag::new("0"), b"second".to_vec());
        assert_eq!(b.recv_timeout(Duration::from_secs(1)).unwrap(), b"second");
    }
}
