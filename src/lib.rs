//! # progkit
//!
//! **progkit** wraps lazily started computations in reference-counted, composable
//! **units**. A unit runs its computation on the first `start`, shares the cached
//! result with every later consumer, and tears the underlying resource down only
//! when the last consumer calls `stop`, right away or after a timeout that a new
//! `start` can still abort.
//!
//! Units compose (`map`, `chain`, `and_then`, [`combine`], [`once`], [`delay`]) while
//! keeping start/stop ordered through the composition graph, across async boundaries.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   consumer A        consumer B        consumer C
//!      │ start/stop       │ start/stop      │ start/stop
//!      ▼                  ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Unit "todos 🡸 reducer(todos)"          (refcount, cached Value)  │
//! │    ├─► chain slot ─► Unit "[taskCompletion(..), load ← fetch]"    │
//! │    │                   ├─► Unit "load ← fetch" ─► Unit "fetch"    │
//! │    │                   └─► Unit "taskCompletion(task(poll))"      │
//! │    └─► parent ─────► Unit "reducer(todos)"  ─► Store              │
//! └──────┬──────────────────────────────┬──────────────────────────┬──┘
//!        │ register / forget            │ publish                  │ idle jobs
//!        ▼                              ▼                          ▼
//! ┌───────────────┐      ┌─────────────────────────────┐   ┌───────────────┐
//! │   Registry    │      │  Bus (broadcast channel)    │   │ IdleScheduler │
//! │ active stack  │      └──────────────┬──────────────┘   │ Inline/Yield  │
//! │ name cache    │                     ▼                  └───────────────┘
//! └───────────────┘                     ▼
//!                          SubscriberSet pump (accepts?)
//!                           ┌───────────┼───────────┐
//!                           ▼           ▼           ▼
//!                        worker1     worker2     workerN
//! ```
//!
//! ### Lifecycle
//! ```text
//! start ─► refs += 1, abort pending teardown
//!          ├─ output cached ─► return it
//!          └─ otherwise     ─► run computation, cache, join active stack
//!
//! stop  ─► refs == 0      ─► RefcountDrift (no-op)
//!          refs -= 1
//!          ├─ refs > 0, not forced ─► Retained
//!          ├─ forced or timeout==0 ─► exit_with
//!          └─ timeout > 0          ─► PendingTeardown ─► sleep(timeout)
//!                                       ├─ started again ─► abort, resolve None
//!                                       └─ still unused  ─► exit_with
//!
//! exit_with ─► (not forced) idle scheduler ─► re-check refs
//!           └► clear cache, leave active stack, exit(output, forced)
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                         |
//! |-------------------|---------------------------------------------------------------|--------------------------------------------|
//! | **Units**         | Lazy, shared, reference-counted computations.                 | [`Unit`], [`Value`], [`Release`], [`Lease`]|
//! | **Composition**   | Derived units with ordered start/stop.                        | [`Unit::map`], [`Unit::chain`], [`combine`]|
//! | **Teardown**      | Immediate, timeout-deferred or idle-deferred teardown.        | [`TeardownPolicy`], [`IdleScheduler`]      |
//! | **Context**       | Registries, event bus, idle capability, shutdown.             | [`Context`], [`Config`], [`Snapshot`]      |
//! | **Subscriber API**| Hook into unit lifecycle events.                              | [`Subscribe`], [`Event`]                   |
//! | **Store**         | Units attaching reducers and dispatching actions.             | [`Store`], [`MemoryStore`], [`reduce`]     |
//! | **Tasks**         | Units starting and cancelling external tasks.                 | [`Task`], [`TaskFn`], [`run_task`]         |
//! | **Errors**        | Construction and task errors.                                 | [`ConfigError`], [`TaskError`]             |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use progkit::{Config, Context, Value, combine};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = Context::new(Config::development());
//!
//!     let fetch = ctx
//!         .unit("fetch")
//!         .with_timeout(Duration::from_millis(100))
//!         .build_async(|| async { vec!["write docs", "ship"] })?;
//!     let count = fetch.map(|todos| todos.len(), "count")?;
//!     let first = fetch.map(|todos| todos[0], "first")?;
//!
//!     let view = combine((&count, &first))?;
//!     let (n, head) = view.start().resolve().await;
//!     assert_eq!((n.resolve().await, head.resolve().await), (2, "write docs"));
//!     assert_eq!(fetch.ref_count(), 2);
//!
//!     view.stop().settle().await;
//!     assert_eq!(fetch.ref_count(), 0);
//!
//!     ctx.shutdown().await;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod store;
mod subscribers;
mod tasks;
mod units;

// ---- Public re-exports ----

pub use core::{Config, Context, ContextBuilder, Snapshot, UnitInfo};
pub use error::{ConfigError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use policies::{
    IdleHandle, IdleJob, IdleMode, IdleScheduler, InlineIdle, TeardownPolicy, UnitState, YieldIdle,
};
pub use store::{MemoryStore, Reducer, Store, dispatch, reduce, select, with_store};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{
    Task, TaskFn, TaskHandle, TaskRef, TaskResult, TaskSpec, run_task, task_completion,
};
pub use units::{
    Combine, Eventual, Lease, Name, Output, Release, Unit, UnitBuilder, UnitId, Value, combine,
    combine_all, delay, map_once, once,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
