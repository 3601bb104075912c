//! Backend built on the `notify` crate.
//!
//! `notify` owns the OS plumbing (inotify, FSEvents, `ReadDirectoryChangesW`,
//! or a polling thread) and calls our event handler on its own thread. The
//! handler translates each `notify` event into raw change records and pushes
//! them through the [`CallbackBridge`].
//!
//! # Event Translation
//!
//! | `notify` event                  | change records                       |
//! |---------------------------------|--------------------------------------|
//! | `Create(_)`                     | `Created`                            |
//! | `Remove(_)`                     | `Removed`                            |
//! | `Modify(Name(From))`            | `Removed`                            |
//! | `Modify(Name(To))`              | `Created`                            |
//! | `Modify(Name(Both))`            | `Removed` old path, `Created` new    |
//! | `Modify(Name(_))`               | `Invalidated`                        |
//! | `Modify(_)`                     | `Modified`                           |
//! | `Access(_)`                     | none                                 |
//! | `Any`, `Other`                  | `Unknown`                            |
//! | any event flagged for rescan    | overflow error, then `Invalidated`   |
//!
//! # Terminal Conditions
//!
//! The backend reports [`BackendError::Terminated`] through the error
//! callback when it can no longer deliver anything useful:
//!
//! - the OS event loop failed to read its notification queue (a `notify` I/O
//!   error that names no path), or
//! - the last watched root was deleted, which makes the OS drop its watch.
//!
//! A deleted root is always removed from the watched set, so it can be
//! watched again once it has been recreated.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use fe_core::{BackendKind, WatchConfig};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, PollWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tracing::Level;

use crate::backend::{Backend, BackendFactory};
use crate::bridge::CallbackBridge;
use crate::diagnostics;
use crate::error::{BackendError, WatchError};
use crate::events::ChangeType;

/// Creates [`NotifyBackend`]s according to a [`WatchConfig`].
#[derive(Debug, Clone, Copy)]
pub struct NotifyBackendFactory {
    config: WatchConfig,
}

impl NotifyBackendFactory {
    /// Creates a factory for the backend selected by `config.backend`.
    #[must_use]
    pub const fn new(config: WatchConfig) -> Self {
        Self { config }
    }
}

impl BackendFactory for NotifyBackendFactory {
    fn create(&self, bridge: Arc<CallbackBridge>) -> Result<Box<dyn Backend>, BackendError> {
        Ok(Box::new(NotifyBackend::new(&self.config, bridge)?))
    }
}

/// Watched roots, shared with the delivery thread.
type WatchedRoots = Arc<Mutex<FxHashSet<Utf8PathBuf>>>;

/// A [`Backend`] driving a `notify` watcher.
pub struct NotifyBackend {
    /// `None` once closed.
    watcher: Option<Box<dyn Watcher + Send>>,
    watched: WatchedRoots,
    mode: RecursiveMode,
}

impl std::fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("watched", &*self.watched.lock())
            .field("mode", &self.mode)
            .field("is_closed", &self.watcher.is_none())
            .finish()
    }
}

impl NotifyBackend {
    /// Allocates the OS watcher and binds its delivery thread to `bridge`.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS notification resource cannot be created.
    pub fn new(config: &WatchConfig, bridge: Arc<CallbackBridge>) -> Result<Self, BackendError> {
        let watched = WatchedRoots::default();
        let roots = Arc::clone(&watched);
        let handler =
            move |result: notify::Result<notify::Event>| dispatch(&bridge, &roots, result);

        let watcher: Box<dyn Watcher + Send> = match config.backend {
            BackendKind::Poll { interval_ms } => {
                let poll_config =
                    notify::Config::default().with_poll_interval(Duration::from_millis(interval_ms));
                Box::new(PollWatcher::new(handler, poll_config).map_err(BackendError::from_notify)?)
            }
            _ => Box::new(notify::recommended_watcher(handler).map_err(BackendError::from_notify)?),
        };

        tracing::debug!(backend = ?config.backend, "Created notify watcher");

        Ok(Self {
            watcher: Some(watcher),
            watched,
            mode: if config.recursive {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            },
        })
    }

    /// Returns the currently watched paths in sorted order.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<Utf8PathBuf> {
        let mut paths: Vec<Utf8PathBuf> = self.watched.lock().iter().cloned().collect();
        paths.sort_unstable();
        paths
    }
}

impl Backend for NotifyBackend {
    fn start_watching(&mut self, paths: &[Utf8PathBuf]) -> Result<(), BackendError> {
        let watcher = self.watcher.as_mut().ok_or_else(closed_error)?;

        for path in paths {
            if self.watched.lock().contains(path) {
                tracing::trace!(path = %path, "Path already watched");
                continue;
            }
            // The set is not locked here: inotify waits on the delivery thread,
            // which may itself be waiting for the set.
            watcher
                .watch(path.as_std_path(), self.mode)
                .map_err(BackendError::from_notify)?;
            self.watched.lock().insert(path.clone());
            tracing::debug!(path = %path, "Watching path");
        }

        Ok(())
    }

    fn stop_watching(&mut self, paths: &[Utf8PathBuf]) -> Result<bool, BackendError> {
        let watcher = self.watcher.as_mut().ok_or_else(closed_error)?;
        let mut all_removed = true;

        for path in paths {
            if !self.watched.lock().remove(path) {
                tracing::debug!(path = %path, "Path was not being watched");
                all_removed = false;
                continue;
            }
            if let Err(error) = watcher.unwatch(path.as_std_path()) {
                tracing::warn!(path = %path, %error, "Failed to unwatch path");
                all_removed = false;
            }
        }

        Ok(all_removed)
    }

    fn close(&mut self) -> Result<(), BackendError> {
        let watcher = self.watcher.take().ok_or_else(closed_error)?;
        // Dropping the watcher stops notify's delivery thread.
        drop(watcher);
        let mut watched = self.watched.lock();
        tracing::debug!(count = watched.len(), "Released notify watcher");
        watched.clear();
        Ok(())
    }
}

fn closed_error() -> BackendError {
    BackendError::Terminated("notify watcher already closed".to_owned())
}

/// Handles one `notify` callback on the backend thread.
fn dispatch(
    bridge: &CallbackBridge,
    roots: &Mutex<FxHashSet<Utf8PathBuf>>,
    result: notify::Result<notify::Event>,
) {
    let event = match result {
        Ok(event) => event,
        Err(error) if is_event_loop_failure(&error) => {
            tracing::error!(%error, "Notify event loop failed");
            bridge.on_error(BackendError::Terminated(format!(
                "failed to read file events: {error}"
            )));
            return;
        }
        Err(error) => {
            bridge.on_error(BackendError::from_notify(error));
            return;
        }
    };

    if diagnostics::backend_log_enabled(Level::TRACE) {
        tracing::trace!(kind = ?event.kind, paths = ?event.paths, "Raw notify event");
    }

    if event.need_rescan() {
        let root = event
            .paths
            .first()
            .and_then(|path| Utf8PathBuf::from_path_buf(path.clone()).ok());
        bridge.on_error(BackendError::overflow(root));
    }

    for (change, path) in translate(&event) {
        let Some(path) = path.to_str() else {
            tracing::warn!(path = %path.display(), "Skipping non-UTF-8 path in file event");
            bridge.on_error(BackendError::NonUtf8Path(path.to_path_buf()));
            continue;
        };
        if let Err(WatchError::UnknownChangeType(ordinal)) = bridge.on_change(change.ordinal(), path)
        {
            bridge.on_error(BackendError::UnknownChangeType(ordinal));
        }
    }

    if matches!(event.kind, EventKind::Remove(_)) {
        forget_removed_roots(bridge, roots, &event.paths);
    }
}

/// I/O errors without a path come from the event loop itself rather than from
/// a single watched file.
fn is_event_loop_failure(error: &notify::Error) -> bool {
    matches!(error.kind, notify::ErrorKind::Io(_)) && error.paths.is_empty()
}

/// Drops deleted roots from the watched set; the OS has already dropped their
/// watches.
fn forget_removed_roots(
    bridge: &CallbackBridge,
    roots: &Mutex<FxHashSet<Utf8PathBuf>>,
    paths: &[PathBuf],
) {
    let mut roots = roots.lock();
    let mut removed = 0_usize;
    for path in paths {
        let Some(path) = Utf8Path::from_path(path) else {
            continue;
        };
        if roots.remove(path) {
            tracing::warn!(%path, "Watched root was deleted");
            removed += 1;
        }
    }
    let exhausted = removed > 0 && roots.is_empty();
    drop(roots);

    if exhausted {
        bridge.on_error(BackendError::Terminated(
            "every watched root was deleted".to_owned(),
        ));
    }
}

/// Maps a `notify` event to `(change, path)` pairs in delivery order.
fn translate(event: &notify::Event) -> SmallVec<[(ChangeType, &Path); 2]> {
    let mut records = SmallVec::new();

    let change = if event.need_rescan() {
        ChangeType::Invalidated
    } else {
        match event.kind {
            EventKind::Access(_) => return records,
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                ChangeType::Created
            }
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                ChangeType::Removed
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = event.paths.iter();
                if let Some(from) = paths.next() {
                    records.push((ChangeType::Removed, from.as_path()));
                }
                if let Some(to) = paths.next() {
                    records.push((ChangeType::Created, to.as_path()));
                }
                return records;
            }
            EventKind::Modify(ModifyKind::Name(_)) => ChangeType::Invalidated,
            EventKind::Modify(_) => ChangeType::Modified,
            EventKind::Any | EventKind::Other => ChangeType::Unknown,
        }
    };

    records.extend(event.paths.iter().map(|path| (change, path.as_path())));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingCallback;
    use fe_core::CallbackFailurePolicy;
    use notify::event::{AccessKind, CreateKind, DataChange, Flag, RemoveKind};
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> notify::Event {
        paths
            .iter()
            .fold(notify::Event::new(kind), |event, path| {
                event.add_path(PathBuf::from(path))
            })
    }

    fn kinds(event: &notify::Event) -> Vec<(ChangeType, String)> {
        translate(event)
            .into_iter()
            .map(|(change, path)| (change, path.display().to_string()))
            .collect()
    }

    fn recording_bridge() -> (Arc<RecordingCallback>, Arc<CallbackBridge>) {
        let recorder = Arc::new(RecordingCallback::default());
        let bridge = Arc::new(CallbackBridge::new(
            Box::new(Arc::clone(&recorder)),
            CallbackFailurePolicy::ReportError,
        ));
        (recorder, bridge)
    }

    fn roots(paths: &[&str]) -> Mutex<FxHashSet<Utf8PathBuf>> {
        Mutex::new(paths.iter().map(|path| Utf8PathBuf::from(*path)).collect())
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !condition() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        condition()
    }

    fn temp_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
        let path = dir.path().join(name);
        std::fs::create_dir_all(&path).expect("create watched dir");
        Utf8PathBuf::from_path_buf(path).expect("UTF-8 temp path")
    }

    #[test]
    fn test_translate_basic_kinds() {
        assert_eq!(
            kinds(&event(EventKind::Create(CreateKind::File), &["/a"])),
            vec![(ChangeType::Created, "/a".to_owned())]
        );
        assert_eq!(
            kinds(&event(EventKind::Remove(RemoveKind::Any), &["/a"])),
            vec![(ChangeType::Removed, "/a".to_owned())]
        );
        assert_eq!(
            kinds(&event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &["/a"]
            )),
            vec![(ChangeType::Modified, "/a".to_owned())]
        );
        assert_eq!(
            kinds(&event(EventKind::Other, &["/a"])),
            vec![(ChangeType::Unknown, "/a".to_owned())]
        );
    }

    #[test]
    fn test_translate_ignores_access() {
        let access = event(EventKind::Access(AccessKind::Any), &["/a"]);
        assert!(kinds(&access).is_empty());
    }

    #[test]
    fn test_translate_renames() {
        assert_eq!(
            kinds(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/old", "/new"]
            )),
            vec![
                (ChangeType::Removed, "/old".to_owned()),
                (ChangeType::Created, "/new".to_owned()),
            ]
        );
        assert_eq!(
            kinds(&event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/old"])),
            vec![(ChangeType::Removed, "/old".to_owned())]
        );
        assert_eq!(
            kinds(&event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/new"])),
            vec![(ChangeType::Created, "/new".to_owned())]
        );
        assert_eq!(
            kinds(&event(EventKind::Modify(ModifyKind::Name(RenameMode::Any)), &["/x"])),
            vec![(ChangeType::Invalidated, "/x".to_owned())]
        );
    }

    #[test]
    fn test_dispatch_rescan_reports_overflow_then_invalidates() {
        let (recorder, bridge) = recording_bridge();
        let rescan = event(EventKind::Other, &["/root"]).set_flag(Flag::Rescan);

        dispatch(&bridge, &roots(&["/root"]), Ok(rescan));

        assert_eq!(recorder.errors(), vec!["event queue overflow for /root".to_owned()]);
        assert_eq!(
            recorder.changes(),
            vec![(ChangeType::Invalidated, "/root".to_owned())]
        );
    }

    #[test]
    fn test_dispatch_forwards_errors() {
        let (recorder, bridge) = recording_bridge();

        dispatch(
            &bridge,
            &roots(&[]),
            Err(notify::Error::new(notify::ErrorKind::MaxFilesWatch)),
        );

        assert_eq!(recorder.errors().len(), 1);
        assert!(recorder.errors()[0].starts_with("insufficient resources"));
    }

    #[test]
    fn test_event_loop_io_failure_is_terminal() {
        let (recorder, bridge) = recording_bridge();
        let read_failed = notify::Error::io(std::io::Error::other("read failed"));

        dispatch(&bridge, &roots(&["/w"]), Err(read_failed));

        let errors = recorder.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("backend terminated"));
        assert!(errors[0].contains("read failed"));
    }

    #[test]
    fn test_io_failure_for_one_path_is_not_terminal() {
        let (recorder, bridge) = recording_bridge();
        let stat_failed = notify::Error::io(std::io::Error::other("stat failed"))
            .add_path(PathBuf::from("/w/file"));

        dispatch(&bridge, &roots(&["/w"]), Err(stat_failed));

        let errors = recorder.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("notify watcher error"));
    }

    #[test]
    fn test_deleting_last_root_terminates() {
        let (recorder, bridge) = recording_bridge();
        let watched = roots(&["/w/a", "/w/b"]);
        let remove = |path: &str| event(EventKind::Remove(RemoveKind::Folder), &[path]);

        // Children of a root do not affect the watched set.
        dispatch(&bridge, &watched, Ok(remove("/w/a/child")));
        dispatch(&bridge, &watched, Ok(remove("/w/a")));
        assert!(recorder.errors().is_empty());
        assert_eq!(watched.lock().len(), 1);

        dispatch(&bridge, &watched, Ok(remove("/w/b")));

        assert!(watched.lock().is_empty());
        assert_eq!(
            recorder.errors(),
            vec!["backend terminated: every watched root was deleted".to_owned()]
        );
        let removed: Vec<_> = recorder.changes().into_iter().map(|(_, path)| path).collect();
        assert_eq!(removed, vec!["/w/a/child", "/w/a", "/w/b"]);
    }

    #[test]
    fn test_deleted_root_reported_by_native_watcher() {
        let dir = TempDir::new().expect("temp dir");
        let root = temp_path(&dir, "doomed");
        let (recorder, bridge) = recording_bridge();
        let mut backend = NotifyBackend::new(&WatchConfig::default(), bridge).unwrap();
        backend.start_watching(&[root.clone()]).unwrap();

        std::fs::remove_dir(&root).expect("remove watched dir");

        let terminated = wait_until(|| {
            recorder
                .errors()
                .iter()
                .any(|error| error.starts_with("backend terminated"))
        });
        assert!(terminated, "errors: {:?}", recorder.errors());
        assert!(backend.watched_paths().is_empty());
        backend.close().unwrap();
    }

    #[test]
    fn test_watched_set_union_and_difference() {
        let dir = TempDir::new().expect("temp dir");
        let a = temp_path(&dir, "a");
        let b = temp_path(&dir, "b");
        let (_recorder, bridge) = recording_bridge();
        let mut backend = NotifyBackend::new(&WatchConfig::default(), bridge).unwrap();

        backend.start_watching(&[a.clone()]).unwrap();
        // Duplicate add is a no-op.
        backend.start_watching(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(backend.watched_paths(), vec![a.clone(), b.clone()]);

        assert!(backend.stop_watching(&[a.clone()]).unwrap());
        assert_eq!(backend.watched_paths(), vec![b.clone()]);

        // Removing an unwatched path reports a partial failure.
        assert!(!backend.stop_watching(&[a.clone(), b.clone()]).unwrap());
        assert!(backend.watched_paths().is_empty());

        backend.close().unwrap();
        assert!(matches!(
            backend.start_watching(&[a]),
            Err(BackendError::Terminated(_))
        ));
    }

    #[test]
    fn test_missing_path_is_rejected() {
        let (_recorder, bridge) = recording_bridge();
        let mut backend = NotifyBackend::new(&WatchConfig::default(), bridge).unwrap();

        let missing = Utf8PathBuf::from("/nonexistent/path/that/does/not/exist");
        assert!(backend.start_watching(&[missing]).is_err());
        assert!(backend.watched_paths().is_empty());
    }

    #[test]
    fn test_poll_backend_reports_created_file() {
        let dir = TempDir::new().expect("temp dir");
        let root = temp_path(&dir, "poll");
        let (recorder, bridge) = recording_bridge();
        let config = WatchConfig {
            backend: BackendKind::Poll { interval_ms: 20 },
            ..WatchConfig::default()
        };
        let mut backend = NotifyBackend::new(&config, bridge).unwrap();
        backend.start_watching(&[root.clone()]).unwrap();

        std::fs::write(root.join("new.txt"), "hello").expect("write file");

        let saw_file = || {
            recorder
                .changes()
                .iter()
                .any(|(change, path)| *change == ChangeType::Created && path.ends_with("new.txt"))
        };
        let seen = wait_until(saw_file);
        backend.close().unwrap();

        assert!(seen);
    }
}
