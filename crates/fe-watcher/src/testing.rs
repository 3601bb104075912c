//! Test doubles shared by the unit tests of this crate.

use std::collections::BTreeSet;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;

use crate::backend::{Backend, BackendFactory};
use crate::bridge::CallbackBridge;
use crate::callback::FileWatcherCallback;
use crate::error::BackendError;
use crate::events::ChangeType;

/// Records every callback invocation.
#[derive(Debug, Default)]
pub(crate) struct RecordingCallback {
    changes: Mutex<Vec<(ChangeType, String)>>,
    errors: Mutex<Vec<String>>,
    panic_on: Option<String>,
    panic_on_error: bool,
}

impl RecordingCallback {
    /// A recorder whose change callback panics for `path`.
    pub(crate) fn panicking_on(path: &str) -> Self {
        Self {
            panic_on: Some(path.to_owned()),
            ..Self::default()
        }
    }

    /// Makes the error callback panic on every error.
    pub(crate) fn with_panicking_errors(mut self) -> Self {
        self.panic_on_error = true;
        self
    }

    pub(crate) fn changes(&self) -> Vec<(ChangeType, String)> {
        self.changes.lock().clone()
    }

    pub(crate) fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl FileWatcherCallback for RecordingCallback {
    fn path_changed(&self, change: ChangeType, path: &Utf8Path) {
        if self.panic_on.as_deref() == Some(path.as_str()) {
            panic!("refusing to handle {path}");
        }
        self.changes.lock().push((change, path.to_string()));
    }

    fn report_error(&self, error: BackendError) {
        if self.panic_on_error {
            panic!("refusing to handle {error}");
        }
        self.errors.lock().push(error.to_string());
    }
}

/// A backend primitive invocation seen by [`FakeFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FakeCall {
    Start(Vec<Utf8PathBuf>),
    Stop(Vec<Utf8PathBuf>),
    Close,
}

#[derive(Debug, Default)]
struct FakeShared {
    watched: Mutex<BTreeSet<Utf8PathBuf>>,
    calls: Mutex<Vec<FakeCall>>,
    bridge: Mutex<Option<Arc<CallbackBridge>>>,
    fail_create: bool,
    fail_close: bool,
}

/// An in-memory backend factory that records what reaches the backend.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeFactory {
    shared: Arc<FakeShared>,
}

impl FakeFactory {
    /// A factory whose allocation always fails.
    pub(crate) fn unavailable() -> Self {
        Self {
            shared: Arc::new(FakeShared {
                fail_create: true,
                ..FakeShared::default()
            }),
        }
    }

    /// A factory whose backends fail to close.
    pub(crate) fn failing_close() -> Self {
        Self {
            shared: Arc::new(FakeShared {
                fail_close: true,
                ..FakeShared::default()
            }),
        }
    }

    /// The bridge the last backend was bound to.
    pub(crate) fn bridge(&self) -> Arc<CallbackBridge> {
        self.shared
            .bridge
            .lock()
            .clone()
            .expect("no backend has been created")
    }

    pub(crate) fn has_created(&self) -> bool {
        self.shared.bridge.lock().is_some()
    }

    pub(crate) fn calls(&self) -> Vec<FakeCall> {
        self.shared.calls.lock().clone()
    }

    pub(crate) fn watched(&self) -> Vec<String> {
        self.shared
            .watched
            .lock()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl BackendFactory for FakeFactory {
    fn create(&self, bridge: Arc<CallbackBridge>) -> Result<Box<dyn Backend>, BackendError> {
        if self.shared.fail_create {
            return Err(BackendError::InsufficientResources(
                "fake notification queue could not be allocated".to_owned(),
            ));
        }
        *self.shared.bridge.lock() = Some(bridge);
        Ok(Box::new(FakeBackend {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeBackend {
    shared: Arc<FakeShared>,
}

impl Backend for FakeBackend {
    fn start_watching(&mut self, paths: &[Utf8PathBuf]) -> Result<(), BackendError> {
        self.shared.calls.lock().push(FakeCall::Start(paths.to_vec()));
        self.shared.watched.lock().extend(paths.iter().cloned());
        Ok(())
    }

    fn stop_watching(&mut self, paths: &[Utf8PathBuf]) -> Result<bool, BackendError> {
        self.shared.calls.lock().push(FakeCall::Stop(paths.to_vec()));
        let mut watched = self.shared.watched.lock();
        // Every path is removed even after a miss.
        Ok(paths
            .iter()
            .fold(true, |all, path| watched.remove(path) && all))
    }

    fn close(&mut self) -> Result<(), BackendError> {
        self.shared.calls.lock().push(FakeCall::Close);
        if self.shared.fail_close {
            return Err(BackendError::Terminated("fake close failure".to_owned()));
        }
        Ok(())
    }
}
