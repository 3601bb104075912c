//! Backend diagnostics that do not depend on any session.
//!
//! Backends consult [`backend_log_enabled`] before emitting high-volume log
//! records. The answer is cached process-wide, so the per-event cost is a
//! single atomic load. After the application reconfigures logging it calls
//! [`invalidate_log_level_cache`] and the next check re-queries `tracing`.

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::Level;
use tracing::level_filters::LevelFilter;

/// Marks an empty cache.
const UNSET: u8 = u8::MAX;

/// Encoding of cached levels; the index is the stored value.
const LEVELS: [LevelFilter; 6] = [
    LevelFilter::OFF,
    LevelFilter::ERROR,
    LevelFilter::WARN,
    LevelFilter::INFO,
    LevelFilter::DEBUG,
    LevelFilter::TRACE,
];

static CACHED_LEVEL: AtomicU8 = AtomicU8::new(UNSET);

/// Returns the version of the watcher backend.
///
/// # Examples
///
/// ```
/// assert!(!fe_watcher::get_version().is_empty());
/// ```
#[must_use]
pub const fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Drops the cached log verbosity so it is re-read before the next log check.
pub fn invalidate_log_level_cache() {
    CACHED_LEVEL.store(UNSET, Ordering::Release);
    tracing::debug!("Backend log level cache invalidated");
}

/// Returns the log verbosity backends should honour, filling the cache if empty.
#[must_use]
pub fn backend_log_level() -> LevelFilter {
    if let Some(level) = cached_log_level() {
        return level;
    }
    let level = LevelFilter::current();
    let encoded = LEVELS
        .iter()
        .position(|candidate| *candidate == level)
        .and_then(|index| u8::try_from(index).ok())
        .unwrap_or(UNSET);
    CACHED_LEVEL.store(encoded, Ordering::Release);
    level
}

/// Returns `true` if backends should emit records at `level`.
#[inline]
#[must_use]
pub fn backend_log_enabled(level: Level) -> bool {
    level <= backend_log_level()
}

fn cached_log_level() -> Option<LevelFilter> {
    LEVELS
        .get(usize::from(CACHED_LEVEL.load(Ordering::Acquire)))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches_package() {
        assert_eq!(get_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_cache_fill_and_invalidate() {
        invalidate_log_level_cache();
        let level = backend_log_level();
        assert_eq!(level, LevelFilter::current());
        assert!(cached_log_level().is_some());

        invalidate_log_level_cache();
        assert_eq!(backend_log_level(), LevelFilter::current());
    }

    #[test]
    fn test_enabled_agrees_with_level() {
        let level = backend_log_level();
        assert_eq!(backend_log_enabled(Level::ERROR), Level::ERROR <= level);
        assert_eq!(backend_log_enabled(Level::TRACE), Level::TRACE <= level);
    }
}
