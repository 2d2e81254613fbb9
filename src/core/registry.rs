//! # Unit registries: active stack and name cache.
//!
//! Every [`Context`](crate::Context) owns one [`Registry`] with two maps:
//!
//! - **active stack**: units whose computation was invoked and not yet torn down,
//!   kept in activation order. Presence implies the unit holds a cached output.
//! - **name cache**: name → unit, consulted at construction time (outside production)
//!   so that building a unit twice under the same name yields the same instance.
//!
//! ## Architecture
//! ```text
//! Unit::start ──► activate(unit)   ──► active: [u1, u2, ...]
//! Unit::stop  ──► deactivate(id)   ──┘
//!
//! UnitBuilder::build ──► lookup::<Unit<A, X>>(name) ──► hit: cached clone
//!                    └─► remember(name, unit)        ──► by_name
//!
//! Context::inspect ──► Snapshot { active, named }
//! ```
//!
//! ## Rules
//! - Units are stored type-erased: [`Inspect`] for introspection and reset,
//!   `Box<dyn Any>` for typed lookup by name.
//! - A name hit with different output/exit types is a [`ConfigError::NameConflict`].
//! - Callbacks into units (reset) never run while a registry lock is held.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::ConfigError;
use crate::policies::UnitState;
use crate::units::UnitId;

/// Type-erased, read-mostly view of a unit.
pub(crate) trait Inspect: Send + Sync + 'static {
    fn id(&self) -> UnitId;
    fn name(&self) -> Arc<str>;
    fn ref_count(&self) -> u32;
    fn has_output(&self) -> bool;
    fn timeout(&self) -> Duration;

    /// Hard reset, used by context shutdown.
    fn reset(&self);

    fn info(&self) -> UnitInfo {
        UnitInfo {
            id: self.id(),
            name: self.name(),
            ref_count: self.ref_count(),
            has_output: self.has_output(),
            timeout: self.timeout(),
        }
    }
}

/// Point-in-time description of a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitInfo {
    /// Unit identity.
    pub id: UnitId,
    /// Unit name.
    pub name: Arc<str>,
    /// Outstanding references.
    pub ref_count: u32,
    /// Whether a computation result is cached.
    pub has_output: bool,
    /// Teardown timeout.
    pub timeout: Duration,
}

impl UnitInfo {
    /// Lifecycle state derived from the reference count and cache.
    pub fn state(&self) -> UnitState {
        match (self.has_output, self.ref_count) {
            (false, _) => UnitState::Dormant,
            (true, 0) => UnitState::PendingTeardown,
            (true, _) => UnitState::Active,
        }
    }
}

impl fmt::Display for UnitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} [{}] refs={} timeout={}ms",
            self.id,
            self.name,
            self.state().as_label(),
            self.ref_count,
            self.timeout.as_millis()
        )
    }
}

/// Read-only copy of both registries.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Active stack, oldest activation first.
    pub active: Vec<UnitInfo>,
    /// Name cache, sorted by name.
    pub named: Vec<UnitInfo>,
}

impl Snapshot {
    /// Returns `true` if a unit with this name is on the active stack.
    pub fn is_active(&self, name: &str) -> bool {
        self.active.iter().any(|u| &*u.name == name)
    }

    /// Looks up a cached unit by name.
    pub fn named(&self, name: &str) -> Option<&UnitInfo> {
        self.named.iter().find(|u| &*u.name == name)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "active ({}):", self.active.len())?;
        for u in &self.active {
            writeln!(f, "  {u}")?;
        }
        writeln!(f, "named ({}):", self.named.len())?;
        for u in &self.named {
            writeln!(f, "  {u}")?;
        }
        Ok(())
    }
}

struct NamedEntry {
    unit: Box<dyn Any + Send + Sync>,
    info: Arc<dyn Inspect>,
}

/// Active stack plus name cache.
#[derive(Default)]
pub(crate) struct Registry {
    active: RwLock<Vec<Arc<dyn Inspect>>>,
    by_name: RwLock<HashMap<Arc<str>, NamedEntry>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pushes a unit onto the active stack (no-op if already there).
    pub(crate) fn activate(&self, unit: Arc<dyn Inspect>) {
        let mut active = self.active.write();
        let id = unit.id();
        if !active.iter().any(|u| u.id() == id) {
            active.push(unit);
        }
    }

    /// Removes a unit from the active stack.
    pub(crate) fn deactivate(&self, id: UnitId) {
        self.active.write().retain(|u| u.id() != id);
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self, id: UnitId) -> bool {
        self.active.read().iter().any(|u| u.id() == id)
    }

    /// Returns the cached unit registered under `name`.
    ///
    /// `Ok(None)` on a miss, [`ConfigError::NameConflict`] when the cached unit has another type.
    pub(crate) fn lookup<U>(&self, name: &str) -> Result<Option<U>, ConfigError>
    where
        U: Any + Clone,
    {
        let by_name = self.by_name.read();
        let Some(entry) = by_name.get(name) else {
            return Ok(None);
        };
        match entry.unit.downcast_ref::<U>() {
            Some(unit) => Ok(Some(unit.clone())),
            None => Err(ConfigError::NameConflict {
                name: name.to_string(),
            }),
        }
    }

    /// Records `unit` under `name`, replacing any previous entry.
    pub(crate) fn remember<U>(&self, name: Arc<str>, unit: U, info: Arc<dyn Inspect>)
    where
        U: Any + Send + Sync,
    {
        self.by_name.write().insert(
            name,
            NamedEntry {
                unit: Box::new(unit),
                info,
            },
        );
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let active = self.active.read().iter().map(|u| u.info()).collect();
        let mut named: Vec<UnitInfo> = self
            .by_name
            .read()
            .values()
            .map(|e| e.info.info())
            .collect();
        named.sort_by(|a, b| a.name.cmp(&b.name));
        Snapshot { active, named }
    }

    /// Takes the whole active stack, newest first.
    pub(crate) fn drain_active(&self) -> Vec<Arc<dyn Inspect>> {
        let mut drained = std::mem::take(&mut *self.active.write());
        drained.reverse();
        drained
    }

    pub(crate) fn clear_names(&self) {
        self.by_name.write().clear();
    }
}
