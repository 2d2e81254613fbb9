//! # Context: registries, event bus and scheduling capabilities.
//!
//! A [`Context`] is created once at application startup and handed to every unit
//! factory. It replaces process-wide globals with an explicit object:
//!
//! - [`Registry`]: active stack and name cache, see [`Context::inspect`]
//! - [`Bus`]: lifecycle events, see [`Context::subscribe`]
//! - [`IdleScheduler`]: where non-forced teardown runs
//! - optional [`SubscriberSet`] pumping bus events to subscribers
//!
//! ## Architecture
//! ```text
//! ContextBuilder::build()
//!   ├─► Bus::new(cfg.bus_capacity)
//!   ├─► Registry::new()
//!   ├─► idle = explicit scheduler | cfg.idle.scheduler()
//!   └─► subscribers? ─► SubscriberSet::spawn(subs, &bus, cfg.bus_capacity)
//!
//! Context::shutdown()
//!   ├─► reset every active unit (newest first)
//!   ├─► clear the name cache
//!   ├─► publish ContextShutdown
//!   ├─► cancel token ─► running tasks observe cancellation
//!   └─► SubscriberSet::shutdown ─► queued events delivered, workers joined
//! ```
//!
//! ## Ownership
//! Units keep a clone of their context, and the name cache keeps every named unit.
//! [`Context::shutdown`] breaks that cycle; a context that is simply dropped keeps its
//! cached units alive.
//!
//! ## Example
//! ```rust
//! use progkit::{Config, Context, Value};
//!
//! let ctx = Context::new(Config::development());
//! let hello = ctx.unit("hello").build(|| Value::ready("hi")).unwrap();
//!
//! assert_eq!(hello.start().now(), Some(&"hi"));
//! assert!(ctx.inspect().is_active("hello"));
//! hello.stop();
//! assert!(!ctx.inspect().is_active("hello"));
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::registry::{Registry, Snapshot};
use crate::events::{Bus, Event, EventKind};
use crate::policies::IdleScheduler;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::units::UnitBuilder;

/// Shared handle to the unit registries and runtime capabilities.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    cfg: Config,
    registry: Registry,
    bus: Bus,
    idle: Arc<dyn IdleScheduler>,
    token: CancellationToken,
    subscribers: Mutex<Option<SubscriberSet>>,
}

impl Context {
    /// Creates a context without subscribers. Does not require a tokio runtime.
    pub fn new(cfg: Config) -> Self {
        Self::builder(cfg).build()
    }

    /// Starts building a context.
    pub fn builder(cfg: Config) -> ContextBuilder {
        ContextBuilder::new(cfg)
    }

    /// Starts building a unit named `name`.
    ///
    /// An empty name is rejected at build time outside production.
    pub fn unit(&self, name: impl Into<String>) -> UnitBuilder {
        UnitBuilder::new(self.clone(), name.into())
    }

    /// Returns the configuration this context was built with.
    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }

    /// Returns a read-only copy of the active stack and the name cache.
    pub fn inspect(&self) -> Snapshot {
        self.inner.registry.snapshot()
    }

    /// Creates a receiver for lifecycle events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// Returns a token that is cancelled by [`shutdown`](Self::shutdown).
    pub fn child_token(&self) -> CancellationToken {
        self.inner.token.child_token()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Hard-resets every active unit, clears the name cache and stops subscribers.
    ///
    /// Events published before the call are delivered to subscribers before it returns.
    pub async fn shutdown(&self) {
        let active = self.inner.registry.drain_active();
        let count = active.len();
        for unit in active {
            unit.reset();
        }
        self.inner.registry.clear_names();

        tracing::debug!(target: "progkit", reset = count, "context shutdown");
        self.publish(Event::new(EventKind::ContextShutdown).with_reason(format!("reset={count}")));
        self.inner.token.cancel();

        let subscribers = self.inner.subscribers.lock().take();
        if let Some(set) = subscribers {
            set.shutdown().await;
        }
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.inner.bus.publish(ev);
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn idle(&self) -> &dyn IdleScheduler {
        self.inner.idle.as_ref()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cfg", &self.inner.cfg)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Context`] with optional subscribers and idle scheduler.
pub struct ContextBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    idle: Option<Arc<dyn IdleScheduler>>,
}

impl ContextBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            idle: None,
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with bounded
    /// queues. A non-empty list requires [`build`](Self::build) to run inside a tokio runtime.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Overrides the idle scheduler selected by [`Config::idle`].
    pub fn with_idle_scheduler(mut self, idle: Arc<dyn IdleScheduler>) -> Self {
        self.idle = Some(idle);
        self
    }

    /// Builds the context.
    pub fn build(self) -> Context {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let idle = self.idle.unwrap_or_else(|| self.cfg.idle.scheduler());
        let token = CancellationToken::new();

        let subscribers = (!self.subscribers.is_empty()).then(|| {
            SubscriberSet::spawn(self.subscribers, &bus, self.cfg.bus_capacity_clamped())
        });

        Context {
            inner: Arc::new(ContextInner {
                cfg: self.cfg,
                registry: Registry::new(),
                bus,
                idle,
                token,
                subscribers: Mutex::new(subscribers),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::units::Value;
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().push(event.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[test]
    fn builds_without_runtime() {
        let ctx = Context::new(Config::development());
        assert!(!ctx.is_shut_down());
        assert!(ctx.inspect().active.is_empty());
    }

    #[test]
    fn names_are_validated_outside_production() {
        let dev = Context::new(Config::development());
        let err = dev.unit("").build(|| Value::ready(1)).unwrap_err();
        assert_eq!(err, ConfigError::MissingName { parent: None });

        let prod = Context::new(Config::production());
        assert!(prod.unit("").build(|| Value::ready(1)).is_ok());
    }

    #[test]
    fn names_are_deduplicated_outside_production() {
        let dev = Context::new(Config::development());
        let a = dev.unit("same").build(|| Value::ready(1)).unwrap();
        let b = dev.unit("same").build(|| Value::ready(2)).unwrap();
        assert_eq!(a.id(), b.id());

        let conflict = dev.unit("same").build(|| Value::ready("text"));
        assert!(matches!(conflict, Err(ConfigError::NameConflict { .. })));

        let prod = Context::new(Config::production());
        let a = prod.unit("same").build(|| Value::ready(1)).unwrap();
        let b = prod.unit("same").build(|| Value::ready(2)).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn shutdown_resets_active_units_and_flushes_subscribers() {
        let rec = Arc::new(Recorder::default());
        let ctx = Context::builder(Config::development())
            .with_subscribers(vec![rec.clone()])
            .build();

        let unit = ctx
            .unit("held")
            .with_timeout(Duration::from_secs(60))
            .build(|| Value::ready(()))
            .unwrap();
        unit.start();
        unit.start();

        ctx.shutdown().await;

        assert_eq!(unit.ref_count(), 0);
        assert!(!unit.has_output());
        assert!(ctx.inspect().named.is_empty());
        assert!(ctx.is_shut_down());

        let seen = rec.seen.lock().clone();
        assert_eq!(seen.first(), Some(&EventKind::UnitStarting));
        assert!(seen.contains(&EventKind::UnitReset));
        assert_eq!(seen.last(), Some(&EventKind::ContextShutdown));
    }
}
