//! Marshaling remote change notifications onto the UI thread.
//!
//! Gateways invoke change callbacks from arbitrary threads. Controls may only
//! be touched from the thread that owns the [`ControlTree`](crate::ControlTree).
//! The bridge between the two is a channel:
//!
//! ```text
//! gateway thread                         UI thread
//! ──────────────                         ─────────
//! ChangeCallback(value)
//!   └─ live? ──no──> dropped
//!        │yes
//!        └─ NotificationSender::send ──> NotificationQueue ──> ControlTree::process_notifications
//! ```
//!
//! The callback never touches a control. It only enqueues a [`RemoteChange`]
//! tagged with the [`BindingId`] it was created for.

use inserv_core::{AttributeValue, ChangeCallback};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

/// Identity of one binding within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub(crate) u64);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding-{}", self.0)
    }
}

/// A remote value change waiting to be applied on the UI thread.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteChange {
    /// Binding the change is addressed to
    pub binding: BindingId,
    /// New remote value
    pub value: AttributeValue,
}

/// Sending half of the notification channel. Cheap to clone, `Send`.
#[derive(Debug, Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<RemoteChange>,
}

impl NotificationSender {
    /// Enqueue a change. Returns false if the queue is gone.
    pub fn send(&self, change: RemoteChange) -> bool {
        self.tx.send(change).is_ok()
    }

    /// Build the callback handed to the gateway for `binding`.
    ///
    /// Once `live` is cleared the callback drops every value it receives.
    pub(crate) fn forwarding_callback(
        &self,
        binding: BindingId,
        live: Arc<AtomicBool>,
    ) -> ChangeCallback {
        let sender = self.clone();
        Arc::new(move |value: AttributeValue| {
            if !live.load(Ordering::Acquire) {
                trace!(%binding, "Change after unbind dropped at source");
                return;
            }
            if !sender.send(RemoteChange { binding, value }) {
                trace!(%binding, "Notification queue closed");
            }
        })
    }
}

/// Receiving half of the notification channel.
///
/// Not `Send`: it stays on the thread that owns the control tree.
#[derive(Debug)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<RemoteChange>,
    rx: mpsc::UnboundedReceiver<RemoteChange>,
    _ui_thread: PhantomData<*const ()>,
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            _ui_thread: PhantomData,
        }
    }

    /// A sender feeding this queue.
    pub fn sender(&self) -> NotificationSender {
        NotificationSender {
            tx: self.tx.clone(),
        }
    }

    /// Next pending change, without waiting.
    pub fn try_next(&mut self) -> Option<RemoteChange> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next change.
    pub async fn next(&mut self) -> Option<RemoteChange> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_forwards_while_live() {
        let mut queue = NotificationQueue::new();
        let live = Arc::new(AtomicBool::new(true));
        let cb = queue.sender().forwarding_callback(BindingId(3), live.clone());

        cb(AttributeValue::Int(1));
        assert_eq!(
            queue.try_next(),
            Some(RemoteChange {
                binding: BindingId(3),
                value: AttributeValue::Int(1),
            })
        );

        live.store(false, Ordering::Release);
        cb(AttributeValue::Int(2));
        assert_eq!(queue.try_next(), None);
    }

    #[test]
    fn test_callback_runs_on_foreign_thread() {
        let mut queue = NotificationQueue::new();
        let cb = queue
            .sender()
            .forwarding_callback(BindingId(1), Arc::new(AtomicBool::new(true)));

        std::thread::spawn(move || cb(AttributeValue::from("from afar")))
            .join()
            .unwrap();

        let change = queue.try_next().unwrap();
        assert_eq!(change.value, AttributeValue::from("from afar"));
    }

    #[tokio::test]
    async fn test_next_waits_for_change() {
        let mut queue = NotificationQueue::new();
        let sender = queue.sender();
        tokio::spawn(async move {
            sender.send(RemoteChange {
                binding: BindingId(9),
                value: AttributeValue::Bool(true),
            });
        });
        assert_eq!(queue.next().await.unwrap().binding, BindingId(9));
    }
}
