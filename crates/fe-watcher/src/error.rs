//! Error types for the fe-watcher crate.
//!
//! Two error types split along the propagation boundary:
//!
//! - [`WatchError`] is returned synchronously from builder and session calls.
//! - [`BackendError`] is produced on backend threads and delivered
//!   asynchronously through [`FileWatcherCallback::report_error`]. Backends
//!   also return it from their primitives, where the session wraps it.
//!
//! [`FileWatcherCallback::report_error`]: crate::FileWatcherCallback::report_error

use std::path::PathBuf;

use camino::Utf8PathBuf;

/// Errors returned synchronously by the builder and the session.
///
/// # Error Recovery Strategy
///
/// - **Backend unavailable** ([`WatchError::BackendUnavailable`]): Fatal to that `start()` attempt
/// - **Closed session** ([`WatchError::SessionClosed`], [`WatchError::AlreadyClosed`]): Caller error
/// - **Path errors** ([`WatchError::NonUtf8Path`], [`WatchError::Normalize`]): Fix the input and retry
/// - **Backend rejection** ([`WatchError::Backend`]): Session stays usable
/// - **Protocol skew** ([`WatchError::UnknownChangeType`]): Internal defect, never retried
///
/// # Examples
///
/// ```
/// use fe_watcher::WatchError;
///
/// fn handle_error(err: WatchError) {
///     match err {
///         WatchError::SessionClosed | WatchError::AlreadyClosed => {
///             eprintln!("session used after close: {err}");
///         }
///         other => eprintln!("watch failed: {other}"),
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The backend resource could not be allocated while starting a session.
    #[error("watch backend unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),

    /// An operation was attempted on a closed session.
    #[error("watcher already closed")]
    SessionClosed,

    /// `close()` was called on a session that is already closed.
    #[error("watcher closed already")]
    AlreadyClosed,

    /// A path could not be represented as UTF-8 after normalization.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(PathBuf),

    /// A path could not be made absolute.
    #[error("failed to make '{path}' absolute: {source}")]
    Normalize {
        /// The path as supplied by the caller.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The backend rejected a start, stop, or close request.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A backend emitted an ordinal outside the agreed [`ChangeType`] list.
    ///
    /// [`ChangeType`]: crate::ChangeType
    #[error("unknown change type ordinal {0}; backend and bridge disagree on protocol")]
    UnknownChangeType(u8),
}

impl WatchError {
    /// Creates a new [`WatchError::NonUtf8Path`] error.
    #[inline]
    pub fn non_utf8_path(path: impl Into<PathBuf>) -> Self {
        Self::NonUtf8Path(path.into())
    }

    /// Returns `true` if the error comes from using a closed session.
    #[inline]
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::SessionClosed | Self::AlreadyClosed)
    }
}

/// Errors raised by a backend, either while running or from its primitives.
///
/// The session does not interpret these; they are forwarded verbatim to the
/// application's error callback.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The notification queue overflowed and events were lost.
    #[error("event queue overflow{}", path.as_ref().map(|p| format!(" for {p}")).unwrap_or_default())]
    Overflow {
        /// The watched root that must be re-scanned, if known.
        path: Option<Utf8PathBuf>,
    },

    /// The OS refused more watch resources (e.g. `max_user_watches`).
    #[error("insufficient resources: {0}")]
    InsufficientResources(String),

    /// The underlying `notify` watcher reported an error.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// An event path could not be decoded as UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(PathBuf),

    /// A raw record carried an ordinal outside the agreed list.
    #[error("unknown change type ordinal {0}")]
    UnknownChangeType(u8),

    /// The application's change callback panicked.
    #[error("change callback panicked: {0}")]
    CallbackPanicked(String),

    /// The backend can no longer deliver events.
    #[error("backend terminated: {0}")]
    Terminated(String),
}

impl BackendError {
    /// Creates a new [`BackendError::Overflow`] error.
    #[inline]
    pub fn overflow(path: Option<Utf8PathBuf>) -> Self {
        Self::Overflow { path }
    }

    /// Converts a `notify` error, recognising watch-limit exhaustion.
    #[must_use]
    pub fn from_notify(error: notify::Error) -> Self {
        match error.kind {
            notify::ErrorKind::MaxFilesWatch => {
                Self::InsufficientResources("OS watch limit reached".to_owned())
            }
            _ => Self::Notify(error),
        }
    }

    /// Returns `true` if the backend can no longer deliver events.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }

    /// Returns `true` if the session remains usable after this error.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Overflow { path } => path.as_ref(),
            Self::InsufficientResources(_)
            | Self::Notify(_)
            | Self::NonUtf8Path(_)
            | Self::UnknownChangeType(_)
            | Self::CallbackPanicked(_)
            | Self::Terminated(_) => None,
        }
    }
}
