//! Watch sessions and callback dispatch over OS file-system notification backends.
//!
//! This crate lets an application watch a changing set of paths and receive
//! typed change and error callbacks. Notifications arrive on a thread the
//! backend owns; the crate defines how they cross into application code and
//! how a session is torn down without racing them.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Backend thread (notify)                        │
//! │  ┌──────────────────┐  (ordinal, path)  ┌──────────────────────┐  │
//! │  │ NotifyBackend    │ ────────────────► │ CallbackBridge       │  │
//! │  │ (inotify/FSEvents│  BackendError     │ gate + ChangeType    │  │
//! │  │  /poll)          │ ────────────────► │ decoding             │  │
//! │  └────────▲─────────┘                   └──────────┬───────────┘  │
//! └───────────│────────────────────────────────────────│──────────────┘
//!             │ start / stop / close                   │ path_changed
//!             │                                        ▼ report_error
//! ┌───────────┴────────────────────┐        ┌──────────────────────────┐
//! │ WatchSession (app threads)     │        │ FileWatcherCallback      │
//! │ Open ──close()──► Closed       │        │ (application)            │
//! └────────────────────────────────┘        └──────────────────────────┘
//! ```
//!
//! Calls only flow one way: the application thread calls into the session,
//! the backend thread calls into the bridge, and neither calls back into the
//! other. `close()` shuts the bridge gate, so no callback runs after it
//! returns.
//!
//! # Crate Dependencies
//!
//! ```text
//! fe-cli ──► fe-watcher ──► fe-core
//! ```
//!
//! # Usage
//!
//! ## Callback-driven
//!
//! ```no_run
//! use camino::Utf8Path;
//! use fe_watcher::{BackendError, ChangeType, FileWatcherCallback, WatcherBuilder};
//!
//! struct Printer;
//!
//! impl FileWatcherCallback for Printer {
//!     fn path_changed(&self, change: ChangeType, path: &Utf8Path) {
//!         println!("{change} {path}");
//!     }
//!     fn report_error(&self, error: BackendError) {
//!         eprintln!("watch error: {error}");
//!     }
//! }
//!
//! # fn main() -> Result<(), fe_watcher::WatchError> {
//! let session = WatcherBuilder::new(Printer).start()?;
//! session.start_watching(["/tmp/project"])?;
//! // ...
//! session.stop_watching(["/tmp/project"])?;
//! session.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming into async code
//!
//! ```no_run
//! use fe_watcher::{event_channel, WatchEvent, WatcherBuilder};
//!
//! # async fn example() -> Result<(), fe_watcher::WatchError> {
//! let (callback, mut events) = event_channel(100);
//! let session = WatcherBuilder::new(callback).start()?;
//! session.start_watching(["./src"])?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         WatchEvent::Changed { kind, path } => println!("{kind} {path}"),
//!         WatchEvent::Error(error) => eprintln!("{error}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Diagnostics
//!
//! [`get_version`] and [`invalidate_log_level_cache`] work without a session
//! and are safe to call from any thread.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod backend;
pub mod bridge;
pub mod builder;
pub mod callback;
pub mod channel;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod notify_backend;
pub mod session;

#[cfg(test)]
mod testing;

// Re-export error types
pub use error::{BackendError, WatchError};

// Re-export event types
pub use events::{CHANGE_TYPE_PROTOCOL_VERSION, ChangeType, RawChangeRecord, WatchEvent};

// Re-export the session surface
pub use backend::{Backend, BackendFactory};
pub use bridge::{CallbackBridge, Delivery};
pub use builder::WatcherBuilder;
pub use callback::FileWatcherCallback;
pub use channel::{ChannelCallback, EventStream, event_channel};
pub use notify_backend::{NotifyBackend, NotifyBackendFactory};
pub use session::WatchSession;

// Re-export diagnostics
pub use diagnostics::{get_version, invalidate_log_level_cache};
