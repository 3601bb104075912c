//! The application-facing callback contract.

use std::sync::Arc;

use camino::Utf8Path;

use crate::error::BackendError;
use crate::events::ChangeType;

/// Receives change notifications and errors from a watch session.
///
/// Both methods run on a backend-owned delivery thread. While one of them
/// executes, further notifications are held back, so implementations should
/// return promptly and must not block indefinitely.
///
/// # Reentrancy
///
/// A callback must not call [`WatchSession::close`] on the session that is
/// delivering to it: close waits for the in-flight delivery to finish.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use fe_watcher::{BackendError, ChangeType, FileWatcherCallback};
///
/// struct PrintingCallback;
///
/// impl FileWatcherCallback for PrintingCallback {
///     fn path_changed(&self, change: ChangeType, path: &Utf8Path) {
///         println!("{change} {path}");
///     }
///
///     fn report_error(&self, error: BackendError) {
///         eprintln!("watch error: {error}");
///     }
/// }
/// ```
///
/// [`WatchSession::close`]: crate::WatchSession::close
pub trait FileWatcherCallback: Send + Sync + 'static {
    /// Called once per change record, in the order the backend observed them.
    fn path_changed(&self, change: ChangeType, path: &Utf8Path);

    /// Called with errors the backend encountered while running.
    fn report_error(&self, error: BackendError);
}

impl<T: FileWatcherCallback + ?Sized> FileWatcherCallback for Arc<T> {
    #[inline]
    fn path_changed(&self, change: ChangeType, path: &Utf8Path) {
        (**self).path_changed(change, path);
    }

    #[inline]
    fn report_error(&self, error: BackendError) {
        (**self).report_error(error);
    }
}

impl<T: FileWatcherCallback + ?Sized> FileWatcherCallback for Box<T> {
    #[inline]
    fn path_changed(&self, change: ChangeType, path: &Utf8Path) {
        (**self).path_changed(change, path);
    }

    #[inline]
    fn report_error(&self, error: BackendError) {
        (**self).report_error(error);
    }
}
