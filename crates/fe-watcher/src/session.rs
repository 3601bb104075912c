//! The watch session: exclusive owner of a backend handle.
//!
//! # Lifecycle
//!
//! ```text
//!        WatcherBuilder::start()
//!                 │
//!                 ▼
//!   ┌──────────────────────────┐  start_watching / stop_watching
//!   │           Open           │◄─────────────────────────────┐
//!   │ handle: Some(backend)    │──────────────────────────────┘
//!   └────────────┬─────────────┘
//!                │ close()
//!                ▼
//!   ┌──────────────────────────┐  any call ──► SessionClosed
//!   │          Closed          │  close()  ──► AlreadyClosed
//!   │ handle: None             │
//!   └──────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::backend::Backend;
use crate::bridge::CallbackBridge;
use crate::error::WatchError;

/// Normalized path batch handed to a backend.
type PathBatch = SmallVec<[Utf8PathBuf; 4]>;

/// A live watch over a set of paths.
///
/// Created by [`WatcherBuilder::start`]. The session can be shared between
/// application threads; every method takes `&self`.
///
/// Call [`close`](WatchSession::close) exactly once to release OS resources
/// deterministically. A session dropped while still open is closed on drop,
/// with a warning.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use fe_watcher::{BackendError, ChangeType, FileWatcherCallback, WatcherBuilder};
///
/// struct Log;
///
/// impl FileWatcherCallback for Log {
///     fn path_changed(&self, change: ChangeType, path: &Utf8Path) {
///         println!("{change} {path}");
///     }
///     fn report_error(&self, error: BackendError) {
///         eprintln!("{error}");
///     }
/// }
///
/// # fn main() -> Result<(), fe_watcher::WatchError> {
/// let session = WatcherBuilder::new(Log).start()?;
/// session.start_watching(["src"])?;
/// // ... events arrive on the backend thread ...
/// session.close()?;
/// # Ok(())
/// # }
/// ```
///
/// [`WatcherBuilder::start`]: crate::WatcherBuilder::start
pub struct WatchSession {
    /// `Some` while open. Taken exactly once by `close`.
    backend: Mutex<Option<Box<dyn Backend>>>,
    bridge: Arc<CallbackBridge>,
}

impl fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSession")
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    pub(crate) fn new(backend: Box<dyn Backend>, bridge: Arc<CallbackBridge>) -> Self {
        Self {
            backend: Mutex::new(Some(backend)),
            bridge,
        }
    }

    /// Starts watching `paths`.
    ///
    /// Relative paths are resolved against the current directory before they
    /// reach the backend. Paths that are already watched are unaffected.
    ///
    /// An empty path is rejected rather than read as the current directory;
    /// pass `"."` to watch the current directory.
    ///
    /// # Errors
    ///
    /// - [`WatchError::SessionClosed`] if the session is closed (no backend call is made)
    /// - [`WatchError::Normalize`] if a path is empty or the current directory is unreadable
    /// - [`WatchError::NonUtf8Path`] if the resolved path is not valid UTF-8
    /// - [`WatchError::Backend`] if the backend refused a path
    pub fn start_watching<I, P>(&self, paths: I) -> Result<(), WatchError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Utf8Path>,
    {
        let mut guard = self.backend.lock();
        let backend = guard.as_mut().ok_or(WatchError::SessionClosed)?;
        let paths = normalize_paths(paths)?;

        tracing::debug!(count = paths.len(), "Starting to watch paths");
        backend.start_watching(&paths)?;
        Ok(())
    }

    /// Stops watching `paths`.
    ///
    /// Returns `true` if every path was removed, `false` if any path was not
    /// being watched or could not be removed.
    ///
    /// # Errors
    ///
    /// - [`WatchError::SessionClosed`] if the session is closed (no backend call is made)
    /// - [`WatchError::Normalize`] or [`WatchError::NonUtf8Path`] if a path cannot be made absolute
    /// - [`WatchError::Backend`] if the backend is unusable
    pub fn stop_watching<I, P>(&self, paths: I) -> Result<bool, WatchError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Utf8Path>,
    {
        let mut guard = self.backend.lock();
        let backend = guard.as_mut().ok_or(WatchError::SessionClosed)?;
        let paths = normalize_paths(paths)?;

        tracing::debug!(count = paths.len(), "Stopping to watch paths");
        let removed = backend.stop_watching(&paths)?;
        if !removed {
            tracing::debug!("Some paths were not being watched");
        }
        Ok(removed)
    }

    /// Closes the session and releases the backend.
    ///
    /// Once this returns, no change or error callback is invoked for this
    /// session. A delivery already in progress when `close` is called finishes
    /// first; anything arriving later is dropped.
    ///
    /// Must not be called from inside this session's own callback: it waits
    /// for the in-progress delivery, which would then never finish.
    ///
    /// # Errors
    ///
    /// - [`WatchError::AlreadyClosed`] if the session is already closed
    /// - [`WatchError::Backend`] if backend teardown failed; the session is closed regardless
    pub fn close(&self) -> Result<(), WatchError> {
        let backend = self.backend.lock().take().ok_or(WatchError::AlreadyClosed)?;
        self.teardown(backend)
    }

    /// Returns `true` until [`close`](WatchSession::close) has been called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.backend.lock().is_some()
    }

    fn teardown(&self, mut backend: Box<dyn Backend>) -> Result<(), WatchError> {
        self.bridge.shut();
        let result = backend.close();
        drop(backend);

        match &result {
            Ok(()) => tracing::info!("Watch session closed"),
            Err(error) => tracing::warn!(%error, "Backend reported an error while closing"),
        }
        result.map_err(WatchError::from)
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        if let Some(backend) = self.backend.get_mut().take() {
            tracing::warn!("Watch session dropped without close(), closing now");
            // Errors were already logged by teardown.
            let _ = self.teardown(backend);
        }
    }
}

/// Makes `path` absolute without touching the file system.
///
/// Symbolic links are not resolved.
///
/// # Errors
///
/// Returns [`WatchError::Normalize`] for an empty path or an unreadable
/// current directory, and [`WatchError::NonUtf8Path`] if the current
/// directory is not valid UTF-8.
pub fn to_absolute(path: &Utf8Path) -> Result<Utf8PathBuf, WatchError> {
    let absolute = std::path::absolute(path).map_err(|source| WatchError::Normalize {
        path: path.to_owned(),
        source,
    })?;
    Utf8PathBuf::from_path_buf(absolute).map_err(WatchError::non_utf8_path)
}

/// Normalizes a batch of paths, dropping duplicates but keeping first-seen order.
fn normalize_paths<I, P>(paths: I) -> Result<PathBatch, WatchError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Utf8Path>,
{
    let mut seen = FxHashSet::default();
    let mut batch = PathBatch::new();
    for path in paths {
        let absolute = to_absolute(path.as_ref())?;
        if seen.insert(absolute.clone()) {
            batch.push(absolute);
        }
    }
    Ok(batch)
}
