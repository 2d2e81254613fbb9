//! # Example: Todos screen
//!
//! Wires a small "screen" out of units:
//! - `reducer(todos)` attaches the todos slice to the store while the screen is mounted
//! - `fetchTodos` loads the initial list, then `loadTodosAfterFetch` dispatches it
//! - `task(pollTodos)` keeps adding todos until the screen unmounts
//!
//! ```text
//! todos = reducer(todos) 🡸 [taskCompletion(task(pollTodos)), loadTodosAfterFetch 🡸 fetchTodos]
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example todos --features logging
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use progkit::{
    Config, Context, LogWriter, MemoryStore, Reducer, Store, Subscribe, TaskError, TaskFn, TaskRef,
    TaskSpec, combine, dispatch, reduce, run_task, task_completion,
};

type Todos = BTreeMap<u32, String>;
type TodoStore = MemoryStore<Todos, TodoAction>;

#[derive(Clone, Debug)]
enum TodoAction {
    Load(Todos),
    Add(u32, String),
}

fn todos_reducer(state: &Todos, action: &TodoAction) -> Todos {
    match action {
        TodoAction::Load(todos) => todos.clone(),
        TodoAction::Add(id, title) => {
            let mut next = state.clone();
            next.insert(*id, title.clone());
            next
        }
    }
}

async fn fetch_todos() -> Result<Todos, String> {
    tokio::time::sleep(Duration::from_millis(80)).await;
    Ok(BTreeMap::from([
        (1, "write the reducer".to_string()),
        (2, "wire the screen".to_string()),
    ]))
}

fn poll_todos(store: Arc<TodoStore>) -> TaskRef {
    let next_id = Arc::new(AtomicU32::new(100));
    TaskFn::arc("pollTodos", move |token: CancellationToken| {
        let store = Arc::clone(&store);
        let next_id = Arc::clone(&next_id);
        async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return Err(TaskError::Canceled),
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {
                        let id = next_id.fetch_add(1, Ordering::Relaxed);
                        store.dispatch(TodoAction::Add(id, format!("polled #{id}")));
                    }
                }
            }
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let ctx = Context::builder(Config::production())
        .with_subscribers(subs)
        .build();
    let store: Arc<TodoStore> = Arc::new(MemoryStore::new());

    let slice = reduce(&ctx, &store, "todos", Reducer::new(Todos::new(), todos_reducer))?;

    let fetch = ctx
        .unit("fetchTodos")
        .with_timeout(Duration::from_millis(250))
        .build_async(fetch_todos)?;
    let load = {
        let (ctx, store) = (ctx.clone(), Arc::clone(&store));
        fetch.chain(
            move |fetched: Result<Todos, String>| {
                let todos = fetched.unwrap_or_default();
                dispatch(&ctx, &store, "loadTodos", move || TodoAction::Load(todos.clone()))
                    .expect("production contexts accept every name")
            },
            "loadTodosAfterFetch",
        )?
    };

    let poller = run_task(&ctx, TaskSpec::new(poll_todos(Arc::clone(&store))))?;
    let polled = task_completion(&poller)?;

    let screen = slice.and_then(&combine((&polled, &load))?)?;

    // mount
    let lease = screen.lease();
    let (_, loaded) = lease.value().clone().resolve().await;
    println!("loaded: {:?}", loaded.resolve().await);

    tokio::time::sleep(Duration::from_millis(350)).await;
    println!("while mounted: {:?}", store.state("todos"));
    println!("{}", ctx.inspect());

    // unmount, then wait for every deferred teardown
    let exits = lease.release().settle().await;
    println!("unmounted: {exits:?}");
    println!("attached reducers after unmount: {:?}", store.attached());
    println!("{}", ctx.inspect());

    ctx.shutdown().await;
    Ok(())
}
