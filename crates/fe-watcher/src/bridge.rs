//! Translation between raw backend delivery and the application callback.
//!
//! The [`CallbackBridge`] is the only object a backend thread calls into. It
//! decodes raw ordinals, guards every delivery with a single gate shared with
//! [`WatchSession::close`], and keeps application panics from unwinding into
//! backend-owned code.
//!
//! # Delivery Gate
//!
//! ```text
//!   backend thread                      application thread
//!   ──────────────                      ──────────────────
//!   on_change ──► lock(gate)            close()
//!                 open? ──► callback      │
//!                 unlock                  ▼
//!                                       lock(gate)  (waits for in-flight delivery)
//!                                       open = false
//!                                       unlock ──► Backend::close
//!   on_change ──► lock(gate)
//!                 closed ──► Dropped
//! ```
//!
//! Holding the gate across the callback also serialises deliveries coming
//! from several backend threads, so records are never reordered here.
//!
//! [`WatchSession::close`]: crate::WatchSession::close

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use camino::Utf8Path;
use fe_core::CallbackFailurePolicy;
use parking_lot::Mutex;

use crate::callback::FileWatcherCallback;
use crate::error::{BackendError, WatchError};
use crate::events::{ChangeType, RawChangeRecord};

/// Outcome of handing a record to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The application callback was invoked.
    Delivered,
    /// The session is closed; the record was discarded.
    Dropped,
}

/// Forwards backend records to an application [`FileWatcherCallback`].
pub struct CallbackBridge {
    callback: Box<dyn FileWatcherCallback>,
    policy: CallbackFailurePolicy,
    /// `true` while the owning session is open.
    gate: Mutex<bool>,
}

impl fmt::Debug for CallbackBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackBridge")
            .field("policy", &self.policy)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl CallbackBridge {
    /// Creates an open bridge around `callback`.
    #[must_use]
    pub fn new(callback: Box<dyn FileWatcherCallback>, policy: CallbackFailurePolicy) -> Self {
        Self {
            callback,
            policy,
            gate: Mutex::new(true),
        }
    }

    /// Decodes a raw change record and delivers it.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::UnknownChangeType`] if `kind` is outside the
    /// agreed ordinal list. The callback is not invoked in that case; the
    /// backend and the bridge disagree on the protocol and the record cannot
    /// be trusted.
    pub fn on_change(&self, kind: u8, path: &str) -> Result<Delivery, WatchError> {
        let change = ChangeType::from_ordinal(kind).inspect_err(|error| {
            tracing::error!(ordinal = kind, path, %error, "Rejecting change record");
        })?;

        let open = self.gate.lock();
        if !*open {
            tracing::trace!(path, "Session closed, dropping change record");
            return Ok(Delivery::Dropped);
        }
        self.invoke_path_changed(change, Utf8Path::new(path));
        drop(open);

        Ok(Delivery::Delivered)
    }

    /// Delivers a [`RawChangeRecord`].
    ///
    /// # Errors
    ///
    /// Same as [`CallbackBridge::on_change`].
    #[inline]
    pub fn on_record(&self, record: &RawChangeRecord) -> Result<Delivery, WatchError> {
        self.on_change(record.kind, &record.path)
    }

    /// Forwards a backend error to the application's error callback.
    pub fn on_error(&self, error: BackendError) -> Delivery {
        let open = self.gate.lock();
        if !*open {
            tracing::debug!(%error, "Session closed, dropping backend error");
            return Delivery::Dropped;
        }
        self.invoke_report_error(error);
        drop(open);

        Delivery::Delivered
    }

    /// Returns `true` while records are still being delivered.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.gate.lock()
    }

    /// Closes the gate, waiting for any in-flight delivery to finish.
    ///
    /// Returns `true` if this call closed it.
    pub(crate) fn shut(&self) -> bool {
        std::mem::replace(&mut *self.gate.lock(), false)
    }

    fn invoke_path_changed(&self, change: ChangeType, path: &Utf8Path) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.callback.path_changed(change, path);
        }));
        if let Err(payload) = result {
            let message = panic_message(payload.as_ref());
            self.abort_if_required(&message);
            tracing::warn!(%path, %change, panic = %message, "Change callback panicked");
            self.invoke_report_error(BackendError::CallbackPanicked(message));
        }
    }

    fn invoke_report_error(&self, error: BackendError) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.callback.report_error(error);
        }));
        if let Err(payload) = result {
            let message = panic_message(payload.as_ref());
            self.abort_if_required(&message);
            tracing::error!(panic = %message, "Error callback panicked; error dropped");
        }
    }

    fn abort_if_required(&self, message: &str) {
        if self.policy == CallbackFailurePolicy::Abort {
            tracing::error!(panic = %message, "Watcher callback panicked, aborting");
            std::process::abort();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
