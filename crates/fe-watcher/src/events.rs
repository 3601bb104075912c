//! Event types crossing the backend boundary.
//!
//! Backends emit [`RawChangeRecord`]s: an ordinal drawn from the fixed
//! [`ChangeType`] list plus a path string. The callback bridge decodes the
//! ordinal and hands the typed pair to the application.
//!
//! # Event Flow
//!
//! ```text
//! OS notification
//!        │
//!        ▼
//!   Backend thread builds (ordinal, path)
//!        │
//!        ▼
//!   CallbackBridge::on_change decodes ChangeType
//!        │
//!        ▼
//!   FileWatcherCallback::path_changed
//! ```

use std::fmt;

use camino::Utf8PathBuf;

use crate::error::{BackendError, WatchError};

/// Version of the ordinal list shared between backends and the bridge.
///
/// Bumped whenever a [`ChangeType`] variant is added, removed, or reordered.
pub const CHANGE_TYPE_PROTOCOL_VERSION: u32 = 1;

/// The kind of change observed for a path.
///
/// The discriminants are the wire ordinals backends emit. They are part of the
/// backend protocol and must not be reordered.
///
/// # Examples
///
/// ```
/// use fe_watcher::ChangeType;
///
/// assert_eq!(ChangeType::from_ordinal(2).unwrap(), ChangeType::Modified);
/// assert_eq!(ChangeType::Removed.ordinal(), 1);
/// assert!(ChangeType::from_ordinal(42).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ChangeType {
    /// The path came into existence.
    Created = 0,
    /// The path was deleted or moved away.
    Removed = 1,
    /// The content or metadata of the path changed.
    Modified = 2,
    /// The backend lost track of the path; its state must be re-read.
    Invalidated = 3,
    /// The backend saw activity it could not classify.
    Unknown = 4,
}

impl ChangeType {
    /// All variants in ordinal order.
    pub const ALL: [Self; 5] = [
        Self::Created,
        Self::Removed,
        Self::Modified,
        Self::Invalidated,
        Self::Unknown,
    ];

    /// Decodes a wire ordinal.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::UnknownChangeType`] for an ordinal outside the
    /// agreed list. This means backend and bridge disagree on the protocol.
    #[inline]
    pub fn from_ordinal(ordinal: u8) -> Result<Self, WatchError> {
        Self::ALL
            .get(usize::from(ordinal))
            .copied()
            .ok_or(WatchError::UnknownChangeType(ordinal))
    }

    /// Returns the wire ordinal of this change type.
    #[inline]
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Returns the upper-case label used in logs and CLI output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Removed => "REMOVED",
            Self::Modified => "MODIFIED",
            Self::Invalidated => "INVALIDATED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A change record as emitted by a backend, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChangeRecord {
    /// Ordinal into the [`ChangeType`] list.
    pub kind: u8,
    /// Absolute, OS-native path of the affected file.
    pub path: String,
}

impl RawChangeRecord {
    /// Creates a record from a typed change.
    #[inline]
    pub fn new(kind: ChangeType, path: impl Into<String>) -> Self {
        Self {
            kind: kind.ordinal(),
            path: path.into(),
        }
    }
}

/// A decoded callback invocation, as delivered through an
/// [`EventStream`](crate::channel::EventStream).
#[derive(Debug)]
pub enum WatchEvent {
    /// A path changed.
    Changed {
        /// What happened to the path.
        kind: ChangeType,
        /// The absolute path that changed.
        path: Utf8PathBuf,
    },
    /// The backend reported an error.
    Error(BackendError),
}
