//! Units bound to a [`Store`].

use std::sync::Arc;

use super::{Reducer, Store};
use crate::core::Context;
use crate::error::ConfigError;
use crate::units::{Output, Unit, Value};

/// A unit running `run` against the store when started (`store(name)`).
pub fn with_store<St, T, F>(
    ctx: &Context,
    store: &Arc<St>,
    name: impl AsRef<str>,
    run: F,
) -> Result<Unit<T>, ConfigError>
where
    St: Store,
    T: Output,
    F: Fn(&St) -> T + Send + Sync + 'static,
{
    let store = Arc::clone(store);
    ctx.unit(format!("store({})", name.as_ref()))
        .build(move || Value::ready(run(&store)))
}

/// A unit reading from the store when started (`select(name)`).
pub fn select<St, T, F>(
    ctx: &Context,
    store: &Arc<St>,
    name: impl AsRef<str>,
    selector: F,
) -> Result<Unit<T>, ConfigError>
where
    St: Store,
    T: Output,
    F: Fn(&St) -> T + Send + Sync + 'static,
{
    let store = Arc::clone(store);
    ctx.unit(format!("select({})", name.as_ref()))
        .build(move || Value::ready(selector(&store)))
}

/// A unit that attaches `reducer` under `name` while active (`reducer(name)`).
///
/// The output is the store itself; teardown detaches the reducer, so a later
/// activation resumes from the memoized slice state.
pub fn reduce<St>(
    ctx: &Context,
    store: &Arc<St>,
    name: impl Into<String>,
    reducer: Reducer<St::State, St::Action>,
) -> Result<Unit<Arc<St>>, ConfigError>
where
    St: Store,
{
    let name: Arc<str> = Arc::from(name.into());
    let attach = (Arc::clone(store), Arc::clone(&name));
    let detach = (Arc::clone(store), Arc::clone(&name));

    ctx.unit(format!("reducer({name})")).build_with_exit(
        move || {
            let (store, name) = &attach;
            store.attach_reducer(name, reducer.clone());
            Value::ready(Arc::clone(store))
        },
        move |_, _| {
            let (store, name) = &detach;
            store.detach_reducer(name);
            Value::ready(())
        },
    )
}

/// A unit that dispatches `action()` when started and yields the action (`dispatch(name)`).
pub fn dispatch<St, F>(
    ctx: &Context,
    store: &Arc<St>,
    name: impl AsRef<str>,
    action: F,
) -> Result<Unit<St::Action>, ConfigError>
where
    St: Store,
    F: Fn() -> St::Action + Send + Sync + 'static,
{
    let store = Arc::clone(store);
    ctx.unit(format!("dispatch({})", name.as_ref()))
        .build(move || {
            let action = action();
            store.dispatch(action.clone());
            Value::ready(action)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::policies::UnitState;
    use crate::store::MemoryStore;

    type Counters = MemoryStore<i32, i32>;

    fn setup() -> (Context, Arc<Counters>) {
        (Context::new(Config::development()), Arc::new(MemoryStore::new()))
    }

    #[test]
    fn reducer_is_attached_while_active() {
        let (ctx, store) = setup();
        let unit = reduce(&ctx, &store, "sum", Reducer::new(0, |s, a| s + a)).unwrap();
        assert_eq!(unit.name(), "reducer(sum)");
        assert!(!store.is_attached("sum"));

        unit.start();
        unit.start();
        assert!(store.is_attached("sum"));
        store.dispatch(3);

        unit.stop();
        assert!(store.is_attached("sum"));
        unit.stop();
        assert!(!store.is_attached("sum"));
        assert_eq!(unit.state(), UnitState::Dormant);

        unit.start();
        assert_eq!(store.state("sum"), Some(3));
    }

    #[test]
    fn dispatch_yields_the_action() {
        let (ctx, store) = setup();
        let sum = reduce(&ctx, &store, "sum", Reducer::new(0, |s, a| s + a)).unwrap();
        let add = dispatch(&ctx, &store, "add", || 5).unwrap();
        assert_eq!(add.name(), "dispatch(add)");

        sum.start();
        assert_eq!(add.start().now(), Some(&5));
        assert_eq!(add.start().now(), Some(&5));
        assert_eq!(store.state("sum"), Some(5));
        assert_eq!(store.dispatched(), 1);
    }

    #[test]
    fn chained_dispatch_sees_attached_reducer() {
        let (ctx, store) = setup();
        let sum = reduce(&ctx, &store, "sum", Reducer::new(10, |s, a| s * a)).unwrap();
        let double = dispatch(&ctx, &store, "double", || 2).unwrap();
        let read = select(&ctx, &store, "sum", |s: &Counters| s.state("sum")).unwrap();

        let flow = crate::and_then!(sum, double, read).unwrap();
        assert_eq!(flow.start().now(), Some(&Some(20)));

        flow.stop();
        assert!(!store.is_attached("sum"));
    }

    #[test]
    fn with_store_passes_the_store() {
        let (ctx, store) = setup();
        let unit = with_store(&ctx, &store, "attached", |s: &Counters| s.attached().len()).unwrap();
        assert_eq!(unit.name(), "store(attached)");
        assert_eq!(unit.start().now(), Some(&0));
    }
}
