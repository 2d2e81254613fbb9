//! # Unit construction and naming.
//!
//! [`UnitBuilder`] is obtained from [`Context::unit`](crate::Context::unit) and applies
//! the context's construction rules:
//!
//! - outside production an empty name fails with [`ConfigError::MissingName`];
//! - outside production a name already in the cache returns the cached unit
//!   (or [`ConfigError::NameConflict`] when its types differ);
//! - every built unit is recorded in the name cache.
//!
//! [`Name`] is what combinators accept: fixed text, or a function of the parent name.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::unit::{ExitFn, RunFn, Unit};
use super::value::{Output, Value};
use crate::core::Context;
use crate::error::ConfigError;

/// Name given to a derived unit.
#[derive(Clone)]
pub enum Name {
    /// Literal text.
    Fixed(Cow<'static, str>),
    /// Computed from the parent unit's name.
    Derived(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl Name {
    /// Builds a name computed from the parent's name.
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Name::Derived(Arc::new(f))
    }

    /// Resolves the name against `parent`.
    pub fn resolve(&self, parent: &str) -> String {
        match self {
            Name::Fixed(s) => s.to_string(),
            Name::Derived(f) => f(parent),
        }
    }

    /// Resolves the name and joins it to `parent` with `arrow`, e.g. `"load ← fetch"`.
    pub(crate) fn compose(
        &self,
        arrow: &str,
        parent: &str,
        validate: bool,
    ) -> Result<String, ConfigError> {
        let own = self.resolve(parent);
        if own.is_empty() && validate {
            return Err(ConfigError::MissingName {
                parent: Some(parent.to_string()),
            });
        }
        Ok(format!("{own} {arrow} {parent}"))
    }
}

impl From<&'static str> for Name {
    fn from(s: &'static str) -> Self {
        Name::Fixed(Cow::Borrowed(s))
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name::Fixed(Cow::Owned(s))
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Name::Fixed(s) => f.debug_tuple("Fixed").field(s).finish(),
            Name::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Builder for a single unit.
pub struct UnitBuilder {
    ctx: Context,
    name: String,
    timeout: Option<Duration>,
}

impl UnitBuilder {
    pub(crate) fn new(ctx: Context, name: String) -> Self {
        Self {
            ctx,
            name,
            timeout: None,
        }
    }

    /// Sets the teardown timeout (default: [`Config::default_timeout`](crate::Config)).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds a unit without exit function.
    pub fn build<A, F>(self, run: F) -> Result<Unit<A>, ConfigError>
    where
        A: Output,
        F: Fn() -> Value<A> + Send + Sync + 'static,
    {
        self.build_raw(Arc::new(run), None)
    }

    /// Builds a unit whose computation is async; `start` returns a pending value.
    ///
    /// `start` must then be called inside a tokio runtime.
    pub fn build_async<A, F, Fut>(self, run: F) -> Result<Unit<A>, ConfigError>
    where
        A: Output,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = A> + Send + 'static,
    {
        self.build_raw(Arc::new(move || Value::pending(run())), None)
    }

    /// Builds a unit with an exit function receiving the last output and the `forced` flag.
    pub fn build_with_exit<A, X, F, E>(self, run: F, exit: E) -> Result<Unit<A, X>, ConfigError>
    where
        A: Output,
        X: Output,
        F: Fn() -> Value<A> + Send + Sync + 'static,
        E: Fn(Value<A>, bool) -> Value<X> + Send + Sync + 'static,
    {
        let exit: ExitFn<A, X> = Arc::new(move |out: Value<A>, forced: bool| exit(out, forced).map(Some));
        self.build_raw(Arc::new(run), Some(exit))
    }

    pub(crate) fn build_raw<A, X>(
        self,
        run: RunFn<A>,
        exit: Option<ExitFn<A, X>>,
    ) -> Result<Unit<A, X>, ConfigError>
    where
        A: Output,
        X: Output,
    {
        let cfg = self.ctx.config();
        if self.name.is_empty() && cfg.validates_names() {
            return Err(ConfigError::MissingName { parent: None });
        }
        if cfg.deduplicates() {
            if let Some(cached) = self.ctx.registry().lookup::<Unit<A, X>>(&self.name)? {
                return Ok(cached);
            }
        }

        let timeout = self.timeout.unwrap_or(cfg.default_timeout);
        let name: Arc<str> = Arc::from(self.name);
        let unit = Unit::new(self.ctx.clone(), Arc::clone(&name), timeout, run, exit);
        self.ctx
            .registry()
            .remember(name, unit.clone(), Arc::new(unit.clone()));
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;

    #[test]
    fn names_compose_with_parent() {
        let fixed = Name::from("load");
        assert_eq!(fixed.compose("←", "fetch", true).unwrap(), "load ← fetch");

        let derived = Name::derived(|p| format!("{p}Len"));
        assert_eq!(derived.compose("↞", "items", true).unwrap(), "itemsLen ↞ items");
    }

    #[test]
    fn empty_names_fail_only_when_validated() {
        let empty = Name::from(String::new());
        assert_eq!(
            empty.compose("←", "p", true),
            Err(ConfigError::MissingName {
                parent: Some("p".into())
            })
        );
        assert_eq!(empty.compose("←", "p", false).unwrap(), " ← p");
    }

    #[test]
    fn timeout_defaults_to_config() {
        let ctx = Context::new(Config {
            default_timeout: Duration::from_millis(30),
            ..Config::development()
        });
        let a = ctx.unit("a").build(|| Value::ready(())).unwrap();
        let b = ctx
            .unit("b")
            .with_timeout(Duration::ZERO)
            .build(|| Value::ready(()))
            .unwrap();
        assert_eq!(a.timeout(), Duration::from_millis(30));
        assert_eq!(b.timeout(), Duration::ZERO);
    }

    #[tokio::test]
    async fn async_units_start_pending() {
        let ctx = Context::new(Config::development());
        let unit = ctx.unit("async").build_async(|| async { 5 }).unwrap();
        let v = unit.start();
        assert!(v.is_pending());
        assert_eq!(v.resolve().await, 5);
    }
}
