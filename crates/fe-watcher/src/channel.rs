//! Channel adapter that turns callbacks into an async event stream.
//!
//! [`event_channel`] returns a [`ChannelCallback`] to hand to the
//! [`WatcherBuilder`] and an [`EventStream`] to consume in async code.
//!
//! ```text
//! ┌──────────────────────────────┐              ┌──────────────────────────┐
//! │ Backend thread               │   try_send   │ Async runtime (tokio)    │
//! │ CallbackBridge ─► Channel-   │─────────────►│ EventStream::recv()      │
//! │                   Callback   │              │                          │
//! └──────────────────────────────┘              └──────────────────────────┘
//! ```
//!
//! The channel is bounded and the backend thread never waits on it. When the
//! consumer falls behind and the channel is full, events are discarded and the
//! next event to fit is preceded by [`BackendError::Overflow`], the same signal
//! an overflowing OS queue produces. Consumers re-scan their roots on it.
//!
//! [`WatcherBuilder`]: crate::WatcherBuilder

use std::sync::atomic::{AtomicBool, Ordering};

use camino::Utf8Path;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::callback::FileWatcherCallback;
use crate::error::BackendError;
use crate::events::{ChangeType, WatchEvent};

/// Creates a connected callback/stream pair with room for `capacity` events.
///
/// # Panics
///
/// Panics if `capacity` is zero; [`WatchConfig::validate`] rejects that value.
///
/// [`WatchConfig::validate`]: fe_core::WatchConfig::validate
#[must_use]
pub fn event_channel(capacity: usize) -> (ChannelCallback, EventStream) {
    let (tx, rx) = mpsc::channel(capacity);
    let callback = ChannelCallback {
        tx,
        overflowed: AtomicBool::new(false),
    };
    (callback, EventStream { rx })
}

/// A [`FileWatcherCallback`] that forwards every invocation into a channel.
///
/// Never blocks the delivering thread.
#[derive(Debug)]
pub struct ChannelCallback {
    tx: mpsc::Sender<WatchEvent>,
    /// Set when an event was discarded and the overflow is not yet reported.
    overflowed: AtomicBool,
}

impl ChannelCallback {
    fn send(&self, event: WatchEvent) {
        if self.overflowed.load(Ordering::Acquire) {
            match self.tx.try_send(WatchEvent::Error(BackendError::overflow(None))) {
                Ok(()) => self.overflowed.store(false, Ordering::Release),
                Err(TrySendError::Full(_)) => {
                    tracing::trace!(?event, "Event stream still full, discarding event");
                    return;
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(?event, "Event stream dropped, discarding event");
                    return;
                }
            }
        }

        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::debug!(?event, "Event stream full, discarding event");
                self.overflowed.store(true, Ordering::Release);
            }
            Err(TrySendError::Closed(event)) => {
                tracing::debug!(?event, "Event stream dropped, discarding event");
            }
        }
    }
}

impl FileWatcherCallback for ChannelCallback {
    fn path_changed(&self, change: ChangeType, path: &Utf8Path) {
        self.send(WatchEvent::Changed {
            kind: change,
            path: path.to_owned(),
        });
    }

    fn report_error(&self, error: BackendError) {
        self.send(WatchEvent::Error(error));
    }
}

/// Receiving half of [`event_channel`].
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<WatchEvent>,
}

impl EventStream {
    /// Receives the next event.
    ///
    /// Returns `None` once the session has been closed and every delivered
    /// event has been consumed.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    /// Tries to receive an event without waiting.
    pub fn try_recv(&mut self) -> Result<WatchEvent, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }

    /// Receives the next event from synchronous code.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<WatchEvent> {
        self.rx.blocking_recv()
    }
}
