//! The backend capability a watch session is built on.
//!
//! A backend owns the OS notification resource and the set of watched paths.
//! It delivers change records and errors on its own thread(s), and only ever
//! through the [`CallbackBridge`] it was created with. It never calls back
//! into the session.

use std::sync::Arc;

use camino::Utf8PathBuf;

use crate::bridge::CallbackBridge;
use crate::error::BackendError;

/// Per-platform watch primitives, exclusively owned by a [`WatchSession`].
///
/// Paths handed to these methods are absolute and free of duplicates.
///
/// [`WatchSession`]: crate::WatchSession
pub trait Backend: Send {
    /// Starts watching `paths`. Paths that are already watched are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to register a path.
    fn start_watching(&mut self, paths: &[Utf8PathBuf]) -> Result<(), BackendError>;

    /// Stops watching `paths`.
    ///
    /// Returns `false` if any path was not being watched or could not be
    /// unregistered. A per-path miss is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend itself is unusable.
    fn stop_watching(&mut self, paths: &[Utf8PathBuf]) -> Result<bool, BackendError>;

    /// Releases the OS resource. Called exactly once by the owning session.
    ///
    /// # Errors
    ///
    /// Returns an error if teardown failed; the backend is unusable either way.
    fn close(&mut self) -> Result<(), BackendError>;
}

/// Creates a [`Backend`] bound to a callback bridge.
pub trait BackendFactory: Send + Sync {
    /// Allocates the backend resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS notification resource cannot be allocated.
    fn create(&self, bridge: Arc<CallbackBridge>) -> Result<Box<dyn Backend>, BackendError>;
}

impl<F> BackendFactory for F
where
    F: Fn(Arc<CallbackBridge>) -> Result<Box<dyn Backend>, BackendError> + Send + Sync,
{
    fn create(&self, bridge: Arc<CallbackBridge>) -> Result<Box<dyn Backend>, BackendError> {
        self(bridge)
    }
}
