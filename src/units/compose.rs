//! # Composition methods: `map`, `map_value`, `chain`, `and_then`.
//!
//! Each method builds a *derived* unit in the parent's context, inheriting the parent's
//! timeout. The derived unit claims the parent on start and releases it on stop, so a
//! parent lives exactly as long as any of its dependents (or direct callers) hold it.
//!
//! ## Teardown order
//! ```text
//! chain(A, f) start:  A.start ─► await ─► B = f(a) ─► B.start
//! chain(A, f) stop:   B.stop ─► (B pending? await) ─► A.stop
//! ```
//!
//! ## Race-abort
//! If the chain is torn down while A's output is still pending, the continuation
//! does not call `f` or start B. The chain's pending output is then abandoned and a
//! `RaceAborted` event is published.

use std::sync::Arc;

use parking_lot::Mutex;

use super::builder::Name;
use super::unit::Unit;
use super::value::{Eventual, Output, Value};
use crate::error::ConfigError;
use crate::events::{Event, EventKind};

/// Second unit of a chain, keyed by release epoch.
struct ChainSlot<B, Y> {
    epoch: u64,
    current: Option<Unit<B, Y>>,
}

impl<A: Output, X: Output> Unit<A, X> {
    /// Derives a unit whose output is `f` applied to this unit's output, after it resolves.
    pub fn map<B, F>(&self, f: F, name: impl Into<Name>) -> Result<Unit<B, X>, ConfigError>
    where
        B: Output,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let name = name
            .into()
            .compose("←", self.name(), self.context().config().validates_names())?;
        let f = Arc::new(f);
        let parent = self.clone();
        let releaser = self.clone();

        self.context().unit(name).with_timeout(self.timeout()).build_raw(
            Arc::new(move || {
                let f = Arc::clone(&f);
                parent.start().map(move |a| f(a))
            }),
            Some(Arc::new(move |_: Value<B>, forced: bool| {
                releaser.stop_with(forced).into_value()
            })),
        )
    }

    /// Derives a unit whose output is `f` applied to this unit's [`Value`] as is,
    /// without waiting for it.
    pub fn map_value<B, F>(&self, f: F, name: impl Into<Name>) -> Result<Unit<B, X>, ConfigError>
    where
        B: Output,
        F: Fn(Value<A>) -> B + Send + Sync + 'static,
    {
        let name = name
            .into()
            .compose("↞", self.name(), self.context().config().validates_names())?;
        let parent = self.clone();
        let releaser = self.clone();

        self.context().unit(name).with_timeout(self.timeout()).build_raw(
            Arc::new(move || Value::Ready(f(parent.start()))),
            Some(Arc::new(move |_: Value<B>, forced: bool| {
                releaser.stop_with(forced).into_value()
            })),
        )
    }

    /// Monadic bind: starts this unit, passes its output to `f` and starts the unit `f`
    /// returns. On stop the second unit is stopped strictly before this one.
    ///
    /// # Race-abort
    /// If the chain is stopped while this unit's output is still pending, `f` is never
    /// called and the value returned by that `start` never resolves (a `RaceAborted`
    /// event is published instead). Callers that may await it after stopping should
    /// bound the wait, e.g. with `tokio::time::timeout`.
    pub fn chain<B, Y, F>(&self, f: F, name: impl Into<Name>) -> Result<Unit<B, X>, ConfigError>
    where
        B: Output,
        Y: Output,
        F: Fn(A) -> Unit<B, Y> + Send + Sync + 'static,
    {
        let name = name
            .into()
            .compose("🡸", self.name(), self.context().config().validates_names())?;
        let label: Arc<str> = Arc::from(name.as_str());
        let slot = Arc::new(Mutex::new(ChainSlot::<B, Y> {
            epoch: 0,
            current: None,
        }));
        let f = Arc::new(f);

        let run = {
            let parent = self.clone();
            let slot = Arc::clone(&slot);
            move || {
                let epoch = slot.lock().epoch;
                match parent.start() {
                    Value::Ready(a) => {
                        let next = f(a);
                        slot.lock().current = Some(next.clone());
                        next.start()
                    }
                    Value::Pending(eventual) => {
                        let slot = Arc::clone(&slot);
                        let f = Arc::clone(&f);
                        let ctx = parent.context().clone();
                        let label = Arc::clone(&label);
                        Value::Pending(Eventual::spawn_optional(async move {
                            let a = eventual.await;
                            let live = slot.lock().epoch == epoch;
                            let next = if live { Some(f(a)) } else { None };
                            let next = next.filter(|next| {
                                let mut slot = slot.lock();
                                let live = slot.epoch == epoch;
                                if live {
                                    slot.current = Some(next.clone());
                                }
                                live
                            });
                            match next {
                                Some(next) => Some(next.start().resolve().await),
                                None => {
                                    tracing::warn!(target: "progkit", unit = %label, "chain released before its parent resolved");
                                    ctx.publish(Event::new(EventKind::RaceAborted).with_unit(label));
                                    None
                                }
                            }
                        }))
                    }
                }
            }
        };

        let exit = {
            let parent = self.clone();
            move |_: Value<B>, forced: bool| {
                let next = {
                    let mut slot = slot.lock();
                    slot.epoch += 1;
                    slot.current.take()
                };
                if let Some(next) = next {
                    let released = next.stop_with(forced);
                    if !forced && released.is_pending() {
                        let parent = parent.clone();
                        return Value::pending(async move {
                            let _ = released.settle().await;
                            parent.stop().settle().await
                        });
                    }
                }
                parent.stop_with(forced).into_value()
            }
        };

        self.context()
            .unit(name)
            .with_timeout(self.timeout())
            .build_raw(Arc::new(run), Some(Arc::new(exit)))
    }

    /// Runs `next` after this unit, ignoring this unit's output.
    ///
    /// Teardown stops `next` first, then this unit.
    pub fn and_then<B, Y>(&self, next: &Unit<B, Y>) -> Result<Unit<B, X>, ConfigError>
    where
        B: Output,
        Y: Output,
    {
        let next = next.clone();
        let name = next.name().to_string();
        self.chain(move |_| next.clone(), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, Context};
    use crate::policies::UnitState;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn logged(ctx: &Context, log: &Log, name: &'static str) -> Unit<&'static str> {
        let (on_start, on_stop) = (log.clone(), log.clone());
        ctx.unit(name)
            .build_with_exit(
                move || {
                    on_start.lock().push(format!("start {name}"));
                    Value::ready(name)
                },
                move |_, _| {
                    on_stop.lock().push(format!("stop {name}"));
                    Value::ready(())
                },
            )
            .unwrap()
    }

    #[test]
    fn map_applies_and_releases_parent() {
        let ctx = Context::new(Config::development());
        let base = ctx.unit("n").build(|| Value::ready(20)).unwrap();
        let plus = base.map(|n| n + 1, "plus").unwrap();

        assert_eq!(plus.name(), "plus ← n");
        assert_eq!(plus.start().now(), Some(&21));
        assert_eq!(base.ref_count(), 1);

        plus.stop();
        assert_eq!(base.state(), UnitState::Dormant);
        assert_eq!(plus.state(), UnitState::Dormant);
    }

    #[tokio::test]
    async fn map_waits_for_pending_parents() {
        let ctx = Context::new(Config::development());
        let base = ctx.unit("slow").build_async(|| async { 2 }).unwrap();
        let doubled = base.map(|n| n * 2, Name::derived(|p| format!("double({p})"))).unwrap();

        assert_eq!(doubled.name(), "double(slow) ← slow");
        assert_eq!(doubled.start().resolve().await, 4);
    }

    #[tokio::test]
    async fn map_value_sees_the_raw_value() {
        let ctx = Context::new(Config::development());
        let base = ctx.unit("raw").build_async(|| async { 1 }).unwrap();
        let pending = base.map_value(|v| v.is_pending(), "isPending").unwrap();

        assert_eq!(pending.name(), "isPending ↞ raw");
        assert_eq!(pending.start().now(), Some(&true));
    }

    #[test]
    fn chain_stops_dependent_first() {
        let ctx = Context::new(Config::development());
        let log: Log = Arc::default();
        let a = logged(&ctx, &log, "a");
        let b = logged(&ctx, &log, "b");

        let b2 = b.clone();
        let chained = a.chain(move |_| b2.clone(), "then").unwrap();
        assert_eq!(chained.start().now(), Some(&"b"));
        chained.stop();

        assert_eq!(
            *log.lock(),
            vec!["start a", "start b", "stop b", "stop a"]
        );
    }

    #[test]
    fn and_then_names_after_next() {
        let ctx = Context::new(Config::development());
        let a = ctx.unit("a").build(|| Value::ready(1)).unwrap();
        let b = ctx.unit("b").build(|| Value::ready("two")).unwrap();

        let seq = a.and_then(&b).unwrap();
        assert_eq!(seq.name(), "b 🡸 a");
        assert_eq!(seq.start().now(), Some(&"two"));
        assert_eq!(a.ref_count(), 1);
        assert_eq!(b.ref_count(), 1);

        seq.stop();
        assert_eq!(a.ref_count(), 0);
        assert_eq!(b.ref_count(), 0);
    }

    #[tokio::test]
    async fn chain_awaits_pending_parent() {
        let ctx = Context::new(Config::development());
        let a = ctx.unit("id").build_async(|| async { 3usize }).unwrap();
        let ctx2 = ctx.clone();
        let chained = a
            .chain(
                move |n| {
                    ctx2.unit(format!("item{n}"))
                        .build(move || Value::ready(n * 10))
                        .unwrap()
                },
                "item",
            )
            .unwrap();

        assert_eq!(chained.start().resolve().await, 30);
        assert!(ctx.inspect().is_active("item3"));

        chained.stop();
        assert!(!ctx.inspect().is_active("item3"));
        assert!(!ctx.inspect().is_active("id"));
    }

    #[tokio::test(start_paused = true)]
    async fn chain_race_abort_skips_dependent() {
        let ctx = Context::new(Config::development());
        let mut rx = ctx.subscribe();
        let a = ctx
            .unit("late")
            .build_async(|| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                1
            })
            .unwrap();
        let b = ctx.unit("never").build(|| Value::ready(2)).unwrap();

        let b2 = b.clone();
        let chained = a.chain(move |_| b2.clone(), "racy").unwrap();
        let out = chained.start();
        chained.stop();

        let waited = tokio::time::timeout(Duration::from_millis(200), out.resolve()).await;
        assert!(waited.is_err());
        assert_eq!(b.ref_count(), 0);
        assert!(!b.has_output());

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::RaceAborted));
    }

    #[tokio::test(start_paused = true)]
    async fn chain_waits_for_dependent_teardown() {
        let ctx = Context::new(Config::development());
        let log: Log = Arc::default();
        let a = logged(&ctx, &log, "a");
        let (l, ll) = (log.clone(), log.clone());
        let slow = ctx
            .unit("slow")
            .with_timeout(Duration::from_millis(30))
            .build_with_exit(
                move || {
                    l.lock().push("start slow".into());
                    Value::ready(())
                },
                move |_, _| {
                    ll.lock().push("stop slow".into());
                    Value::ready(())
                },
            )
            .unwrap();

        let chained = a.and_then(&slow).unwrap();
        chained.start();
        let release = chained.stop();
        assert!(release.is_pending());
        assert_eq!(log.lock().len(), 2);

        release.settle().await;
        assert_eq!(
            *log.lock(),
            vec!["start a", "start slow", "stop slow", "stop a"]
        );
    }
}
