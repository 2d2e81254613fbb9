//! # Unit: reference-counted, memoizing, lazily started computation.
//!
//! A [`Unit`] wraps a zero-argument computation and an optional exit function.
//!
//! - `start` claims the unit. Only the first claim of an activation cycle (or a forced
//!   one) invokes the computation; every other claim gets the cached [`Value`].
//! - `stop` releases a claim. When the last claim goes away the [`TeardownPolicy`]
//!   decides whether teardown runs now or after the unit timeout.
//! - Non-forced teardown is handed to the context's
//!   [`IdleScheduler`](crate::IdleScheduler) and re-validates the reference count when
//!   it finally runs.
//!
//! ## Flow
//! ```text
//! start(force)
//!   ├─► ref_count += 1, abort pending teardowns (TeardownAborted)
//!   ├─► cached && !force ─► return cached
//!   └─► run() ─► cache, push on active stack (ComputationInvoked)
//!
//! stop(force)
//!   ├─► ref_count == 0 ─► RefcountDrift, Retained
//!   ├─► ref_count -= 1
//!   └─► policy.on_release(remaining, force)
//!         ├─ Keep      ─► Retained                       (UnitReleased)
//!         ├─ Defer(d)  ─► Released(timer(d) ─► exit_with) (TeardownScheduled)
//!         └─ ExitNow   ─► Released(exit_with(force))
//!
//! exit_with(force)
//!   ├─ force ─► teardown now
//!   └─ idle  ─► schedule_when_idle(teardown if ref_count == 0) (IdleDeferred)
//!
//! teardown ─► clear cache, leave active stack, exit(output, forced) (UnitStopped)
//! ```
//!
//! ## Locking
//! `start` holds a per-unit gate while the computation runs, so it is never invoked
//! twice concurrently. A computation must not start its own unit.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::release::Release;
use super::value::{Output, Value};
use crate::core::{Context, Inspect};
use crate::events::{Event, EventKind};
use crate::policies::{TeardownPolicy, TeardownStep, UnitState};

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque unit identity, unique per process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl UnitId {
    fn next() -> Self {
        Self(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    pub fn get(self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) type RunFn<A> = Arc<dyn Fn() -> Value<A> + Send + Sync>;
pub(crate) type ExitFn<A, X> = Arc<dyn Fn(Value<A>, bool) -> Value<Option<X>> + Send + Sync>;

/// Reference-counted lazy computation producing `A`, whose teardown yields `X`.
///
/// Cheap to clone; clones share the same state.
pub struct Unit<A, X = ()> {
    inner: Arc<Inner<A, X>>,
}

struct Inner<A, X> {
    id: UnitId,
    name: Arc<str>,
    policy: TeardownPolicy,
    run: RunFn<A>,
    exit: Option<ExitFn<A, X>>,
    gate: Mutex<()>,
    state: Mutex<State<A>>,
    ctx: Context,
}

struct State<A> {
    ref_count: u32,
    output: Option<Value<A>>,
    /// Abort tokens of deferred teardowns (timer or idle).
    pending: Vec<CancellationToken>,
}

impl<A> State<A> {
    /// Cancels every deferred teardown; returns `true` if one was still live.
    fn abort_pending(&mut self) -> bool {
        let mut aborted = false;
        for token in self.pending.drain(..) {
            aborted |= !token.is_cancelled();
            token.cancel();
        }
        aborted
    }
}

impl<A: Output, X: Output> Unit<A, X> {
    pub(crate) fn new(
        ctx: Context,
        name: Arc<str>,
        timeout: Duration,
        run: RunFn<A>,
        exit: Option<ExitFn<A, X>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: UnitId::next(),
                name,
                policy: TeardownPolicy::from_timeout(timeout),
                run,
                exit,
                gate: Mutex::new(()),
                state: Mutex::new(State {
                    ref_count: 0,
                    output: None,
                    pending: Vec::new(),
                }),
                ctx,
            }),
        }
    }

    /// Unit identity.
    pub fn id(&self) -> UnitId {
        self.inner.id
    }

    /// Unit name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Teardown timeout (`0s` = immediate).
    pub fn timeout(&self) -> Duration {
        self.inner.policy.timeout()
    }

    /// Teardown policy derived from the timeout.
    pub fn policy(&self) -> TeardownPolicy {
        self.inner.policy
    }

    /// Context the unit was built in.
    pub fn context(&self) -> &Context {
        &self.inner.ctx
    }

    /// Outstanding `start` calls not yet matched by `stop`.
    pub fn ref_count(&self) -> u32 {
        self.inner.state.lock().ref_count
    }

    /// Whether a computation result is cached.
    pub fn has_output(&self) -> bool {
        self.inner.state.lock().output.is_some()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> UnitState {
        let st = self.inner.state.lock();
        match (&st.output, st.ref_count) {
            (None, _) => UnitState::Dormant,
            (Some(_), 0) => UnitState::PendingTeardown,
            (Some(_), _) => UnitState::Active,
        }
    }

    /// Claims the unit and returns its (possibly pending) output.
    pub fn start(&self) -> Value<A> {
        self.start_with(false)
    }

    /// Claims the unit and re-invokes the computation even if an output is cached.
    pub fn start_forced(&self) -> Value<A> {
        self.start_with(true)
    }

    /// Releases one claim.
    ///
    /// # Panics
    /// With a non-zero timeout, or a non-inline idle scheduler, the teardown is
    /// spawned and this must be called inside a tokio runtime.
    pub fn stop(&self) -> Release<X> {
        self.stop_with(false)
    }

    /// Releases one claim and tears the unit down right away, even if other claims remain.
    pub fn stop_forced(&self) -> Release<X> {
        self.stop_with(true)
    }

    /// Claims the unit for the lifetime of the returned guard.
    pub fn lease(&self) -> Lease<A, X> {
        let value = self.start();
        Lease {
            unit: self.clone(),
            value,
            released: false,
        }
    }

    /// `start` with an explicit `force` flag.
    pub fn start_with(&self, force: bool) -> Value<A> {
        let _gate = self.inner.gate.lock();

        let (refs, cached, aborted) = {
            let mut st = self.inner.state.lock();
            st.ref_count = st.ref_count.saturating_add(1);
            let aborted = st.abort_pending();
            let cached = if force { None } else { st.output.clone() };
            (st.ref_count, cached, aborted)
        };

        tracing::debug!(target: "progkit", unit = %self.inner.name, refs, force, "starting");
        self.publish(self.event(EventKind::UnitStarting).with_ref_count(refs));
        if aborted {
            self.publish(self.event(EventKind::TeardownAborted).with_ref_count(refs));
        }

        if let Some(cached) = cached {
            return cached;
        }

        let output = (self.inner.run)();
        self.inner.state.lock().output = Some(output.clone());
        self.inner.ctx.registry().activate(Arc::new(self.clone()));
        self.publish(self.event(EventKind::ComputationInvoked));
        output
    }

    /// `stop` with an explicit `force` flag.
    pub fn stop_with(&self, force: bool) -> Release<X> {
        let token = CancellationToken::new();

        let released = {
            let _gate = self.inner.gate.lock();
            let mut st = self.inner.state.lock();
            if st.ref_count == 0 {
                None
            } else {
                st.ref_count -= 1;
                let step = self.inner.policy.on_release(st.ref_count, force);
                if matches!(step, TeardownStep::Defer(_)) {
                    st.pending.push(token.clone());
                }
                Some((st.ref_count, step))
            }
        };

        let Some((refs, step)) = released else {
            tracing::warn!(target: "progkit", unit = %self.inner.name, "stop called without outstanding references");
            self.publish(self.event(EventKind::RefcountDrift));
            return Release::Retained;
        };

        tracing::debug!(target: "progkit", unit = %self.inner.name, refs, force, "releasing");
        match step {
            TeardownStep::Keep => {
                self.publish(self.event(EventKind::UnitReleased).with_ref_count(refs));
                Release::Retained
            }
            TeardownStep::ExitNow => Release::Released(self.exit_with(force)),
            TeardownStep::Defer(delay) => {
                self.publish(
                    self.event(EventKind::TeardownScheduled)
                        .with_ref_count(refs)
                        .with_delay(delay),
                );
                let me = self.clone();
                Release::Released(Value::pending(async move {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => None,
                        _ = tokio::time::sleep(delay) => {
                            if me.ref_count() > 0 {
                                None
                            } else {
                                me.exit_with(false).resolve().await
                            }
                        }
                    }
                }))
            }
        }
    }

    /// Hard reset: drops every claim, aborts deferred teardowns and runs the exit
    /// function (forced) if an output was cached.
    ///
    /// For owning infrastructure (tests, hot reload, shutdown), not for consumers.
    pub fn reset(&self) {
        let (output, discarded) = {
            let _gate = self.inner.gate.lock();
            let mut st = self.inner.state.lock();
            let discarded = st.ref_count;
            st.ref_count = 0;
            st.abort_pending();
            (st.output.take(), discarded)
        };
        self.inner.ctx.registry().deactivate(self.inner.id);

        tracing::debug!(target: "progkit", unit = %self.inner.name, discarded, "resetting");
        self.publish(self.event(EventKind::UnitReset).with_ref_count(discarded));

        if let (Some(output), Some(exit)) = (output, &self.inner.exit) {
            let _ = exit(output, true);
        }
    }

    /// Runs teardown now when forced, otherwise in the next idle window.
    fn exit_with(&self, force: bool) -> Value<Option<X>> {
        if force {
            return self.teardown(true);
        }

        let abort = CancellationToken::new();
        self.inner.state.lock().pending.push(abort.clone());

        let (tx, mut rx) = oneshot::channel();
        let me = self.clone();
        let job_abort = abort.clone();
        let handle = self.inner.ctx.idle().schedule_when_idle(Box::new(move || {
            if !job_abort.is_cancelled() {
                let _ = tx.send(me.teardown(false));
            }
        }));

        match rx.try_recv() {
            Ok(exit) => exit,
            Err(oneshot::error::TryRecvError::Closed) => Value::Ready(None),
            Err(oneshot::error::TryRecvError::Empty) => {
                self.publish(self.event(EventKind::IdleDeferred));
                Value::pending(async move {
                    tokio::select! {
                        biased;
                        res = &mut rx => match res {
                            Ok(exit) => exit.resolve().await,
                            Err(_) => None,
                        },
                        _ = abort.cancelled() => {
                            handle.cancel();
                            // a job that already began tearing down still reports its exit
                            match rx.await {
                                Ok(exit) => exit.resolve().await,
                                Err(_) => None,
                            }
                        }
                    }
                })
            }
        }
    }

    /// Clears the unit and invokes the exit function, once per activation cycle.
    fn teardown(&self, force: bool) -> Value<Option<X>> {
        let Some(output) = self.clear(force) else {
            return Value::Ready(None);
        };

        tracing::debug!(target: "progkit", unit = %self.inner.name, force, "stopping");
        self.publish(self.event(EventKind::UnitStopped).with_forced(force));

        match &self.inner.exit {
            Some(exit) => exit(output, force),
            None => Value::Ready(None),
        }
    }

    /// Takes the cached output if the unit is eligible for teardown.
    fn clear(&self, force: bool) -> Option<Value<A>> {
        let output = {
            let mut st = self.inner.state.lock();
            if !force && st.ref_count > 0 {
                return None;
            }
            st.ref_count = 0;
            st.abort_pending();
            st.output.take()
        };
        self.inner.ctx.registry().deactivate(self.inner.id);
        output
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_unit(Arc::clone(&self.inner.name))
            .with_unit_id(self.inner.id.get())
    }

    fn publish(&self, ev: Event) {
        self.inner.ctx.publish(ev);
    }
}

impl<A, X> Clone for Unit<A, X> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, X> fmt::Display for Unit<A, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unit({})", self.inner.name)
    }
}

impl<A, X> fmt::Debug for Unit<A, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl<A: Output, X: Output> Inspect for Unit<A, X> {
    fn id(&self) -> UnitId {
        self.inner.id
    }

    fn name(&self) -> Arc<str> {
        Arc::clone(&self.inner.name)
    }

    fn ref_count(&self) -> u32 {
        Unit::ref_count(self)
    }

    fn has_output(&self) -> bool {
        Unit::has_output(self)
    }

    fn timeout(&self) -> Duration {
        Unit::timeout(self)
    }

    fn reset(&self) {
        Unit::reset(self);
    }
}

/// RAII claim on a unit: `start` on creation, `stop` on drop.
///
/// Mirrors a consumer that mounts and unmounts.
#[must_use = "dropping a lease releases the unit immediately"]
pub struct Lease<A: Output, X: Output = ()> {
    unit: Unit<A, X>,
    value: Value<A>,
    released: bool,
}

impl<A: Output, X: Output> Lease<A, X> {
    /// Output returned by the `start` this lease holds.
    pub fn value(&self) -> &Value<A> {
        &self.value
    }

    /// The leased unit.
    pub fn unit(&self) -> &Unit<A, X> {
        &self.unit
    }

    /// Releases the claim now and returns the release outcome.
    pub fn release(mut self) -> Release<X> {
        self.released = true;
        self.unit.stop()
    }
}

impl<A: Output, X: Output> Drop for Lease<A, X> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.unit.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::policies::IdleMode;
    use std::sync::atomic::AtomicUsize;

    fn ctx() -> Context {
        Context::new(Config::development())
    }

    fn counting(ctx: &Context, name: &str, timeout: Duration) -> (Unit<usize, usize>, Arc<AtomicUsize>, Arc<Mutex<Vec<bool>>>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let exits = Arc::new(Mutex::new(Vec::new()));
        let (r, e) = (runs.clone(), exits.clone());
        let unit = ctx
            .unit(name)
            .with_timeout(timeout)
            .build_with_exit(
                move || Value::ready(r.fetch_add(1, Ordering::SeqCst) + 1),
                move |out, forced| {
                    e.lock().push(forced);
                    out.map(|n| n * 100)
                },
            )
            .unwrap();
        (unit, runs, exits)
    }

    #[test]
    fn memoizes_within_a_cycle() {
        let ctx = ctx();
        let (unit, runs, exits) = counting(&ctx, "memo", Duration::ZERO);

        assert_eq!(unit.state(), UnitState::Dormant);
        for _ in 0..3 {
            assert_eq!(unit.start().now(), Some(&1));
        }
        assert_eq!(unit.ref_count(), 3);
        assert_eq!(unit.state(), UnitState::Active);

        assert!(unit.stop().is_retained());
        assert!(unit.stop().is_retained());
        let release = unit.stop();
        assert_eq!(release.now(), Some(Some(&100)));

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(*exits.lock(), vec![false]);
        assert_eq!(unit.state(), UnitState::Dormant);

        // next cycle re-invokes
        assert_eq!(unit.start().now(), Some(&2));
    }

    #[test]
    fn stop_without_claims_is_drift() {
        let ctx = ctx();
        let mut rx = ctx.subscribe();
        let (unit, _, exits) = counting(&ctx, "drift", Duration::ZERO);

        assert!(unit.stop().is_retained());
        assert!(exits.lock().is_empty());
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::RefcountDrift);
    }

    #[test]
    fn forced_stop_ignores_remaining_claims() {
        let ctx = ctx();
        let (unit, _, exits) = counting(&ctx, "forced", Duration::from_secs(10));

        unit.start();
        unit.start();
        let release = unit.stop_forced();

        assert_eq!(release.now(), Some(Some(&100)));
        assert_eq!(*exits.lock(), vec![true]);
        assert_eq!(unit.ref_count(), 0);
        assert!(!ctx.inspect().is_active("forced"));
    }

    #[test]
    fn forced_start_reinvokes() {
        let ctx = ctx();
        let (unit, runs, _) = counting(&ctx, "reinvoke", Duration::ZERO);

        unit.start();
        assert_eq!(unit.start_forced().now(), Some(&2));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.inspect().active.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_teardown_fires_after_timeout() {
        let ctx = ctx();
        let (unit, _, exits) = counting(&ctx, "delayed", Duration::from_millis(50));

        unit.start();
        let release = unit.stop();
        assert!(release.is_pending());
        assert_eq!(unit.state(), UnitState::PendingTeardown);

        assert_eq!(release.settle().await, Some(100));
        assert_eq!(*exits.lock(), vec![false]);
        assert_eq!(unit.state(), UnitState::Dormant);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_within_timeout_aborts_teardown() {
        let ctx = ctx();
        let mut rx = ctx.subscribe();
        let (unit, runs, exits) = counting(&ctx, "aborted", Duration::from_millis(50));

        unit.start();
        let release = unit.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(unit.start().now(), Some(&1));

        assert_eq!(release.settle().await, None);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(unit.state(), UnitState::Active);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(exits.lock().is_empty());

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::TeardownAborted));
    }

    #[test]
    fn reset_clears_everything() {
        let ctx = ctx();
        let (unit, _, exits) = counting(&ctx, "reset", Duration::ZERO);

        unit.start();
        unit.start();
        unit.reset();

        assert_eq!(unit.state(), UnitState::Dormant);
        assert_eq!(unit.ref_count(), 0);
        assert_eq!(*exits.lock(), vec![true]);
        assert!(unit.stop().is_retained());

        // racing start right after reset begins a fresh cycle
        assert_eq!(unit.start().now(), Some(&2));
        assert_eq!(unit.state(), UnitState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_aborts_pending_teardown() {
        let ctx = ctx();
        let (unit, _, exits) = counting(&ctx, "reset-pending", Duration::from_millis(50));

        unit.start();
        let release = unit.stop();
        unit.reset();

        assert_eq!(release.settle().await, None);
        assert_eq!(*exits.lock(), vec![true]);
        assert_eq!(unit.state(), UnitState::Dormant);
    }

    #[tokio::test]
    async fn idle_teardown_revalidates_claims() {
        let cfg = Config {
            idle: IdleMode::Yield(2),
            ..Config::development()
        };
        let ctx = Context::new(cfg);
        let (unit, _, exits) = counting(&ctx, "idle", Duration::ZERO);

        unit.start();
        let first = unit.stop();
        assert!(first.is_pending());
        unit.start();
        assert_eq!(first.settle().await, None);
        assert!(exits.lock().is_empty());

        let second = unit.stop();
        assert_eq!(second.settle().await, Some(100));
        assert_eq!(*exits.lock(), vec![false]);
    }

    #[test]
    fn lease_stops_on_drop() {
        let ctx = ctx();
        let (unit, _, exits) = counting(&ctx, "lease", Duration::ZERO);

        {
            let lease = unit.lease();
            assert_eq!(lease.value().now(), Some(&1));
            assert_eq!(unit.ref_count(), 1);
        }
        assert_eq!(unit.ref_count(), 0);
        assert_eq!(*exits.lock(), vec![false]);

        let lease = unit.lease();
        assert_eq!(lease.release().now(), Some(Some(&200)));
        assert_eq!(exits.lock().len(), 2);
    }

    #[test]
    fn display_uses_name() {
        let ctx = ctx();
        let (unit, _, _) = counting(&ctx, "shown", Duration::ZERO);
        assert_eq!(unit.to_string(), "Unit(shown)");
    }
}
