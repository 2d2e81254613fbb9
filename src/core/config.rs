//! # Context configuration.
//!
//! Provides [`Config`], the startup-time settings of a [`Context`](crate::Context).
//!
//! ## Production flag
//! `production` replaces build-environment sniffing with an explicit switch:
//! - `false` → empty names fail fast with [`ConfigError::MissingName`](crate::ConfigError),
//!   and constructing a unit whose name is already cached returns the cached instance.
//! - `true`  → empty names are tolerated and every construction yields a fresh unit.
//!
//! The default follows the build profile (`production = !cfg!(debug_assertions)`).
//!
//! ## Sentinel values
//! - `default_timeout = 0s` → units tear down as soon as they are released
//! - `bus_capacity` is clamped to at least 1

use std::time::Duration;

use crate::policies::IdleMode;

/// Settings shared by every unit built from a context.
///
/// ## Field semantics
/// - `production`: disables name validation and name-based deduplication
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `idle`: idle scheduler used for non-forced teardown
/// - `default_timeout`: teardown timeout for units that do not set one
#[derive(Clone, Debug)]
pub struct Config {
    /// Production mode switch.
    pub production: bool,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Idle scheduler selection.
    ///
    /// Ignored when the context builder is given an explicit scheduler.
    pub idle: IdleMode,

    /// Default teardown timeout for units built without an explicit one.
    ///
    /// Combinators inherit their parent's timeout instead.
    pub default_timeout: Duration,
}

impl Config {
    /// Production configuration: no name validation, no deduplication.
    pub fn production() -> Self {
        Self {
            production: true,
            ..Self::default()
        }
    }

    /// Development configuration: names validated and deduplicated.
    pub fn development() -> Self {
        Self {
            production: false,
            ..Self::default()
        }
    }

    /// Returns `true` when empty names must be rejected.
    #[inline]
    pub fn validates_names(&self) -> bool {
        !self.production
    }

    /// Returns `true` when construction consults the name cache.
    #[inline]
    pub fn deduplicates(&self) -> bool {
        !self.production
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `production = !cfg!(debug_assertions)`
    /// - `bus_capacity = 1024`
    /// - `idle = IdleMode::Inline`
    /// - `default_timeout = 0s`
    fn default() -> Self {
        Self {
            production: !cfg!(debug_assertions),
            bus_capacity: 1024,
            idle: IdleMode::default(),
            default_timeout: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_disables_checks() {
        let cfg = Config::production();
        assert!(!cfg.validates_names());
        assert!(!cfg.deduplicates());

        let dev = Config::development();
        assert!(dev.validates_names());
        assert!(dev.deduplicates());
    }

    #[test]
    fn capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
