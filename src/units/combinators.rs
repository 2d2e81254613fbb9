//! # Unit combinators.
//!
//! - [`combine`] / [`combine_all`]: fan-out. Starts every member in argument order and
//!   yields their values *without* awaiting them. Teardown stops every member in
//!   argument order and aggregates their exit outputs.
//! - [`once`] / [`map_once`]: the computation runs at most once per process,
//!   independent of activation cycles.
//! - [`delay`]: a value that becomes available after a fixed time.
//! - [`and_then!`](crate::and_then): left fold of [`Unit::and_then`] over several units.
//!
//! ## Example
//! ```rust
//! use progkit::{combine, Config, Context, Value};
//!
//! let ctx = Context::new(Config::development());
//! let a = ctx.unit("a").build(|| Value::ready(1)).unwrap();
//! let b = ctx.unit("b").build(|| Value::ready("two")).unwrap();
//!
//! let both = combine((&a, &b)).unwrap();
//! assert_eq!(both.name(), "[a, b]");
//!
//! let (va, vb) = both.start().now().cloned().unwrap();
//! assert_eq!((va.now(), vb.now()), (Some(&1), Some(&"two")));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use once_cell::sync::OnceCell;

use super::unit::Unit;
use super::value::{Output, Value};
use crate::core::Context;
use crate::error::ConfigError;

/// Groups of units that can be combined into one.
///
/// Implemented for tuples of `&Unit` of up to eight members.
pub trait Combine {
    /// Tuple of member values.
    type Outputs: Output;
    /// Tuple of member exit outputs.
    type Exits: Output;

    /// Builds the combined unit.
    fn combine(self) -> Result<Unit<Self::Outputs, Self::Exits>, ConfigError>;
}

/// Fan-out over a tuple of units, see [`Combine`].
pub fn combine<C: Combine>(units: C) -> Result<Unit<C::Outputs, C::Exits>, ConfigError> {
    units.combine()
}

macro_rules! impl_combine {
    ($( ($A:ident, $X:ident, $u:ident) ),+) => {
        impl<'a, $($A: Output, $X: Output),+> Combine for ($(&'a Unit<$A, $X>,)+) {
            type Outputs = ($(Value<$A>,)+);
            type Exits = ($(Option<$X>,)+);

            fn combine(self) -> Result<Unit<Self::Outputs, Self::Exits>, ConfigError> {
                let ($($u,)+) = self;
                let name = format!("[{}]", [$($u.name()),+].join(", "));
                let ctx = [$($u.context()),+][0].clone();

                let members = ($($u.clone(),)+);
                let run = {
                    let members = members.clone();
                    move || {
                        let ($($u,)+) = &members;
                        Value::Ready(($($u.start(),)+))
                    }
                };
                let exit = move |_: Value<Self::Outputs>, forced: bool| {
                    let ($($u,)+) = &members;
                    let released = ($($u.stop_with(forced).into_value(),)+);
                    match released {
                        ($(Value::Ready($u),)+) => Value::Ready(Some(($($u,)+))),
                        ($($u,)+) => Value::pending(async move {
                            Some(($($u.resolve().await,)+))
                        }),
                    }
                };

                ctx.unit(name)
                    .with_timeout(Duration::ZERO)
                    .build_raw(Arc::new(run), Some(Arc::new(exit)))
            }
        }
    };
}

impl_combine!((A1, X1, u1));
impl_combine!((A1, X1, u1), (A2, X2, u2));
impl_combine!((A1, X1, u1), (A2, X2, u2), (A3, X3, u3));
impl_combine!((A1, X1, u1), (A2, X2, u2), (A3, X3, u3), (A4, X4, u4));
impl_combine!((A1, X1, u1), (A2, X2, u2), (A3, X3, u3), (A4, X4, u4), (A5, X5, u5));
impl_combine!(
    (A1, X1, u1),
    (A2, X2, u2),
    (A3, X3, u3),
    (A4, X4, u4),
    (A5, X5, u5),
    (A6, X6, u6)
);
impl_combine!(
    (A1, X1, u1),
    (A2, X2, u2),
    (A3, X3, u3),
    (A4, X4, u4),
    (A5, X5, u5),
    (A6, X6, u6),
    (A7, X7, u7)
);
impl_combine!(
    (A1, X1, u1),
    (A2, X2, u2),
    (A3, X3, u3),
    (A4, X4, u4),
    (A5, X5, u5),
    (A6, X6, u6),
    (A7, X7, u7),
    (A8, X8, u8)
);

/// Fan-out over any number of units of the same type.
pub fn combine_all<A, X>(
    ctx: &Context,
    units: &[Unit<A, X>],
) -> Result<Unit<Vec<Value<A>>, Vec<Option<X>>>, ConfigError>
where
    A: Output,
    X: Output,
{
    let names: Vec<&str> = units.iter().map(Unit::name).collect();
    let name = format!("[{}]", names.join(", "));
    let members: Arc<[Unit<A, X>]> = units.into();

    let run = {
        let members = Arc::clone(&members);
        move || Value::Ready(members.iter().map(Unit::start).collect::<Vec<_>>())
    };
    let exit = move |_: Value<Vec<Value<A>>>, forced: bool| {
        let released: Vec<Value<Option<X>>> = members
            .iter()
            .map(|u| u.stop_with(forced).into_value())
            .collect();
        let settled: Option<Vec<Option<X>>> = released.iter().map(|v| v.now().cloned()).collect();
        match settled {
            Some(all) => Value::Ready(Some(all)),
            None => Value::pending(async move {
                Some(futures::future::join_all(released.into_iter().map(Value::resolve)).await)
            }),
        }
    };

    ctx.unit(name)
        .with_timeout(Duration::ZERO)
        .build_raw(Arc::new(run), Some(Arc::new(exit)))
}

/// A unit whose computation runs at most once per process.
///
/// Later activation cycles reuse the first result.
pub fn once<T, F>(ctx: &Context, name: impl AsRef<str>, run: F) -> Result<Unit<T>, ConfigError>
where
    T: Output,
    F: Fn() -> Value<T> + Send + Sync + 'static,
{
    let name = name.as_ref();
    if name.is_empty() && ctx.config().validates_names() {
        return Err(ConfigError::MissingName { parent: None });
    }
    let cell: OnceCell<Value<T>> = OnceCell::new();
    ctx.unit(format!("once({name})"))
        .build(move || cell.get_or_init(&run).clone())
}

/// Starts `unit` at most once per process; teardown still releases it.
pub fn map_once<A, X>(unit: &Unit<A, X>) -> Result<Unit<A, X>, ConfigError>
where
    A: Output,
    X: Output,
{
    let cell: OnceCell<Value<A>> = OnceCell::new();
    let starter = unit.clone();
    let releaser = unit.clone();

    unit.context()
        .unit(format!("once({})", unit.name()))
        .with_timeout(unit.timeout())
        .build_raw(
            Arc::new(move || cell.get_or_init(|| starter.start()).clone()),
            Some(Arc::new(move |_: Value<A>, forced: bool| {
                releaser.stop_with(forced).into_value()
            })),
        )
}

static ANONYMOUS_DELAYS: AtomicU64 = AtomicU64::new(1);

/// A unit that yields `value` once `after` has elapsed.
///
/// The timer is independent of `stop`: a started delay always resolves.
///
/// Without a name (or with an empty one) the delay gets a label of its own, e.g.
/// `delay(50:#3)`, so it never shares a cached unit with another delay.
pub fn delay<T>(
    ctx: &Context,
    after: Duration,
    value: T,
    name: Option<&str>,
) -> Result<Unit<T>, ConfigError>
where
    T: Output,
{
    let label = match name.filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => format!("#{}", ANONYMOUS_DELAYS.fetch_add(1, Ordering::Relaxed)),
    };
    let name = format!("delay({}:{label})", after.as_millis());
    ctx.unit(name).build(move || {
        let value = value.clone();
        Value::pending(async move {
            tokio::time::sleep(after).await;
            value
        })
    })
}

/// Runs units strictly in sequence and tears them down in reverse order.
///
/// `and_then!(a, b, c)` is `a.and_then(&b)?.and_then(&c)`, yielding
/// `Result<Unit<C, XA>, ConfigError>`. Arguments are units (or references to units).
///
/// ```rust
/// use progkit::{and_then, Config, Context, Value};
///
/// let ctx = Context::new(Config::development());
/// let a = ctx.unit("a").build(|| Value::ready(1)).unwrap();
/// let b = ctx.unit("b").build(|| Value::ready(2)).unwrap();
/// let c = ctx.unit("c").build(|| Value::ready(3)).unwrap();
///
/// let seq = and_then!(a, b, c).unwrap();
/// assert_eq!(seq.start().now(), Some(&3));
/// assert_eq!(seq.name(), "c 🡸 b 🡸 a");
/// ```
#[macro_export]
macro_rules! and_then {
    ($first:expr $(, $rest:expr)+ $(,)?) => {
        (|| -> ::core::result::Result<_, $crate::ConfigError> {
            let unit = ($first).clone();
            $( let unit = unit.and_then(&$rest)?; )+
            ::core::result::Result::Ok(unit)
        })()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::policies::UnitState;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> Context {
        Context::new(Config::development())
    }

    fn tracked(
        ctx: &Context,
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
        timeout: Duration,
    ) -> Unit<&'static str, &'static str> {
        let log = log.clone();
        ctx.unit(name)
            .with_timeout(timeout)
            .build_with_exit(
                move || Value::ready(name),
                move |_, forced| {
                    log.lock().push(name);
                    Value::ready(if forced { "forced" } else { name })
                },
            )
            .unwrap()
    }

    #[test]
    fn combine_starts_all_and_stops_in_order() {
        let ctx = ctx();
        let log = Arc::default();
        let a = tracked(&ctx, &log, "a", Duration::ZERO);
        let b = tracked(&ctx, &log, "b", Duration::ZERO);

        let both = combine((&a, &b)).unwrap();
        let (va, vb) = both.start().now().cloned().unwrap();
        assert_eq!((va.now(), vb.now()), (Some(&"a"), Some(&"b")));
        assert_eq!((a.ref_count(), b.ref_count()), (1, 1));

        let exits = both.stop().now().map(|x| x.cloned());
        assert_eq!(exits, Some(Some((Some("a"), Some("b")))));
        assert_eq!(*log.lock(), vec!["a", "b"]);
        assert_eq!(a.state(), UnitState::Dormant);
    }

    #[tokio::test]
    async fn combine_passes_pending_values_through() {
        let ctx = ctx();
        let slow = ctx.unit("slow").build_async(|| async { 7 }).unwrap();
        let fast = ctx.unit("fast").build(|| Value::ready('x')).unwrap();

        let both = combine((&slow, &fast)).unwrap();
        let (vs, vf) = both.start().resolve().await;
        assert!(vs.is_pending() || vs.now() == Some(&7));
        assert_eq!(vf.now(), Some(&'x'));
        assert_eq!(vs.resolve().await, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn combine_aggregates_pending_releases() {
        let ctx = ctx();
        let log = Arc::default();
        let a = tracked(&ctx, &log, "a", Duration::ZERO);
        let b = tracked(&ctx, &log, "b", Duration::from_millis(40));

        let both = combine((&a, &b)).unwrap();
        both.start();
        let release = both.stop();
        assert!(release.is_pending());
        assert_eq!(*log.lock(), vec!["a"]);

        assert_eq!(release.settle().await, Some((Some("a"), Some("b"))));
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    #[should_panic(expected = "exit failed")]
    fn combine_surfaces_member_exit_panics() {
        let ctx = ctx();
        let ok = ctx.unit("ok").build(|| Value::ready(())).unwrap();
        let bad = ctx
            .unit("bad")
            .build_with_exit(|| Value::ready(()), |_, _| -> Value<()> { panic!("exit failed") })
            .unwrap();

        let both = combine((&ok, &bad)).unwrap();
        both.start();
        let _ = both.stop();
    }

    #[test]
    fn combine_all_is_homogeneous() {
        let ctx = ctx();
        let log = Arc::default();
        let units: Vec<_> = ["x", "y", "z"]
            .into_iter()
            .map(|n| tracked(&ctx, &log, n, Duration::ZERO))
            .collect();

        let all = combine_all(&ctx, &units).unwrap();
        assert_eq!(all.name(), "[x, y, z]");
        let values = all.start().now().cloned().unwrap();
        assert_eq!(values.len(), 3);

        let exits = all.stop().now().map(|x| x.cloned());
        assert_eq!(exits, Some(Some(vec![Some("x"), Some("y"), Some("z")])));
    }

    #[test]
    fn once_runs_once_per_process() {
        let ctx = ctx();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let unit = once(&ctx, "setup", move || Value::ready(c.fetch_add(1, Ordering::SeqCst))).unwrap();
        assert_eq!(unit.name(), "once(setup)");

        std::thread::scope(|s| {
            s.spawn(|| unit.start());
            s.spawn(|| unit.start());
        });
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        unit.stop();
        unit.stop();
        assert_eq!(unit.state(), UnitState::Dormant);

        unit.start();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn map_once_starts_parent_once() {
        let ctx = ctx();
        let log = Arc::default();
        let a = tracked(&ctx, &log, "a", Duration::ZERO);
        let guarded = map_once(&a).unwrap();
        assert_eq!(guarded.name(), "once(a)");

        guarded.start();
        guarded.stop();
        assert_eq!(a.ref_count(), 0);

        guarded.start();
        assert_eq!(a.ref_count(), 0);
        guarded.stop();
        assert!(a.stop().is_retained());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_resolves_even_after_stop() {
        let ctx = ctx();
        let d = delay(&ctx, Duration::from_millis(50), "x", Some("stage")).unwrap();
        assert_eq!(d.name(), "delay(50:stage)");

        let value = d.start();
        d.stop();
        assert_eq!(d.state(), UnitState::Dormant);
        assert_eq!(value.resolve().await, "x");
    }

    #[tokio::test(start_paused = true)]
    async fn unnamed_delays_are_distinct() {
        let ctx = ctx();
        let x = delay(&ctx, Duration::from_millis(5), "x", None).unwrap();
        let y = delay(&ctx, Duration::from_millis(5), "y", Some("")).unwrap();

        assert_ne!(x.id(), y.id());
        assert_ne!(x.name(), y.name());
        assert!(x.name().starts_with("delay(5:#"));
        assert_eq!(x.start().resolve().await, "x");
        assert_eq!(y.start().resolve().await, "y");
    }

    #[test]
    fn and_then_macro_folds_left() {
        let ctx = ctx();
        let log = Arc::default();
        let a = tracked(&ctx, &log, "a", Duration::ZERO);
        let b = tracked(&ctx, &log, "b", Duration::ZERO);
        let c = tracked(&ctx, &log, "c", Duration::ZERO);

        let seq = crate::and_then!(a, b, c).unwrap();
        assert_eq!(seq.start().now(), Some(&"c"));
        seq.stop();
        assert_eq!(*log.lock(), vec!["c", "b", "a"]);
    }
}
