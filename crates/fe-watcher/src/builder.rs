//! Configures and starts watch sessions.

use std::fmt;
use std::sync::Arc;

use fe_core::WatchConfig;

use crate::backend::BackendFactory;
use crate::bridge::CallbackBridge;
use crate::callback::FileWatcherCallback;
use crate::error::WatchError;
use crate::notify_backend::NotifyBackendFactory;
use crate::session::WatchSession;

/// Builds a [`WatchSession`] around an application callback.
///
/// Without [`with_backend`](WatcherBuilder::with_backend) the session runs on
/// the `notify` backend selected by [`WatchConfig::backend`].
///
/// # Examples
///
/// ```no_run
/// use fe_core::{BackendKind, WatchConfig};
/// use fe_watcher::{event_channel, WatcherBuilder};
///
/// # fn main() -> Result<(), fe_watcher::WatchError> {
/// let config = WatchConfig {
///     backend: BackendKind::Poll { interval_ms: 500 },
///     ..WatchConfig::default()
/// };
/// let (callback, _events) = event_channel(config.channel_capacity);
/// let session = WatcherBuilder::new(callback).with_config(config).start()?;
/// session.start_watching(["/var/log"])?;
/// # Ok(())
/// # }
/// ```
pub struct WatcherBuilder {
    callback: Box<dyn FileWatcherCallback>,
    config: WatchConfig,
    factory: Option<Box<dyn BackendFactory>>,
}

impl fmt::Debug for WatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherBuilder")
            .field("config", &self.config)
            .field("custom_backend", &self.factory.is_some())
            .finish_non_exhaustive()
    }
}

impl WatcherBuilder {
    /// Creates a builder that will deliver to `callback`.
    pub fn new(callback: impl FileWatcherCallback) -> Self {
        Self {
            callback: Box::new(callback),
            config: WatchConfig::default(),
            factory: None,
        }
    }

    /// Replaces the session configuration.
    #[must_use]
    pub fn with_config(mut self, config: WatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `factory` instead of the `notify` backend.
    #[must_use]
    pub fn with_backend(mut self, factory: impl BackendFactory + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    /// Allocates the backend and returns an open session.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::BackendUnavailable`] if the backend resource
    /// cannot be allocated. No session exists in that case.
    pub fn start(self) -> Result<WatchSession, WatchError> {
        let Self {
            callback,
            config,
            factory,
        } = self;

        let bridge = Arc::new(CallbackBridge::new(callback, config.callback_failure));
        let factory: Box<dyn BackendFactory> = match factory {
            Some(factory) => factory,
            None => Box::new(NotifyBackendFactory::new(config)),
        };

        let backend = factory.create(Arc::clone(&bridge)).map_err(|error| {
            tracing::warn!(%error, "Failed to allocate watch backend");
            WatchError::BackendUnavailable(error)
        })?;

        tracing::info!(recursive = config.recursive, "Watch session started");
        Ok(WatchSession::new(backend, bridge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::testing::{FakeFactory, RecordingCallback};
    use crate::{Backend, ChangeType};
    use fe_core::CallbackFailurePolicy;

    #[test]
    fn test_start_returns_open_session() {
        let factory = FakeFactory::default();
        let session = WatcherBuilder::new(RecordingCallback::default())
            .with_backend(factory.clone())
            .start()
            .unwrap();

        assert!(session.is_open());
        assert!(factory.has_created());
        assert!(factory.bridge().is_open());
    }

    #[test]
    fn test_allocation_failure_is_backend_unavailable() {
        let factory = FakeFactory::unavailable();
        let result = WatcherBuilder::new(RecordingCallback::default())
            .with_backend(factory.clone())
            .start();

        assert!(matches!(
            result,
            Err(WatchError::BackendUnavailable(BackendError::InsufficientResources(_)))
        ));
        assert!(!factory.has_created());
    }

    #[test]
    fn test_closure_factory() {
        let factory = |_bridge: Arc<CallbackBridge>| -> Result<Box<dyn Backend>, BackendError> {
            Err(BackendError::Terminated("no backend on this platform".to_owned()))
        };
        let result = WatcherBuilder::new(RecordingCallback::default())
            .with_backend(factory)
            .start();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("no backend on this platform"));
    }

    #[test]
    fn test_callback_reaches_bridge() {
        let recorder = Arc::new(RecordingCallback::default());
        let factory = FakeFactory::default();
        let _session = WatcherBuilder::new(Arc::clone(&recorder))
            .with_config(WatchConfig {
                callback_failure: CallbackFailurePolicy::ReportError,
                ..WatchConfig::default()
            })
            .with_backend(factory.clone())
            .start()
            .unwrap();

        factory.bridge().on_change(0, "/tmp/new").unwrap();

        assert_eq!(
            recorder.changes(),
            vec![(ChangeType::Created, "/tmp/new".to_owned())]
        );
    }

    #[test]
    fn test_default_backend_starts_and_closes() {
        let session = WatcherBuilder::new(RecordingCallback::default())
            .start()
            .expect("native watcher should be available");
        assert!(session.close().is_ok());
    }
}
