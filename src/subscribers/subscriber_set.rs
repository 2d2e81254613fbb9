//! # Subscriber fan-out for a context's lifecycle events.
//!
//! A [`SubscriberSet`] is started by [`ContextBuilder::build`](crate::ContextBuilder::build)
//! when subscribers were given. It owns the whole delivery path from the [`Bus`] to the
//! subscribers:
//!
//! ```text
//! Bus ──► pump ──► accepts(ev)? ──► lane (bounded queue) ──► worker ──► on_event
//!                       │                   │                      │
//!                       no: skipped         full/closed            panic
//!                                           ▼                      ▼
//!                                  SubscriberOverflow      SubscriberPanicked
//!                                        (bus)                   (bus)
//! ```
//!
//! Units never wait on a subscriber: the pump only `try_send`s into lanes. A lane that
//! is full drops the event for that subscriber alone.
//!
//! An overflow report that itself overflows is dropped silently, so a stuck subscriber
//! cannot feed on its own diagnostics.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

/// One subscriber and the sending half of its queue.
struct Lane {
    sub: Arc<dyn Subscribe>,
    tx: mpsc::Sender<Arc<Event>>,
}

impl Lane {
    fn open(sub: Arc<dyn Subscribe>, default_capacity: usize, bus: &Bus) -> (Self, JoinHandle<()>) {
        let cap = sub.queue_capacity().unwrap_or(default_capacity).max(1);
        let (tx, rx) = mpsc::channel(cap);
        let worker = tokio::spawn(drive(Arc::clone(&sub), rx, bus.clone()));
        (Self { sub, tx }, worker)
    }

    /// Queues `ev` if the subscriber wants it. Returns why it was dropped, if it was.
    fn offer(&self, ev: &Arc<Event>) -> Option<&'static str> {
        if !self.sub.accepts(ev) {
            return None;
        }
        match self.tx.try_send(Arc::clone(ev)) {
            Ok(()) => None,
            Err(mpsc::error::TrySendError::Full(_)) => Some("full"),
            Err(mpsc::error::TrySendError::Closed(_)) => Some("closed"),
        }
    }
}

/// Worker loop of one lane; ends once the lane's sender is dropped.
async fn drive(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(ev.as_ref()))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            let info = panic_message(payload.as_ref());
            tracing::warn!(target: "progkit", subscriber = sub.name(), %info, "subscriber panicked");
            bus.publish(Event::subscriber_panicked(sub.name(), info));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Lanes plus their workers, owned by the pump task.
struct Fanout {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl Fanout {
    fn deliver(&self, ev: Event) {
        let ev = Arc::new(ev);
        let is_overflow = ev.kind == EventKind::SubscriberOverflow;

        for lane in &self.lanes {
            if let Some(reason) = lane.offer(&ev) {
                if !is_overflow {
                    self.bus
                        .publish(Event::subscriber_overflow(lane.sub.name(), reason));
                }
            }
        }
    }

    /// Closes every lane and waits until the workers handled what was queued.
    async fn close(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn pump(mut rx: broadcast::Receiver<Event>, fanout: Fanout, token: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Ok(ev) => fanout.deliver(ev),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "progkit", skipped, "subscriber pump lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = token.cancelled() => break,
        }
    }

    // events published before shutdown still reach the subscribers
    loop {
        match rx.try_recv() {
            Ok(ev) => fanout.deliver(ev),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    fanout.close().await;
}

/// Running fan-out from a context's bus to its subscribers.
///
/// Dropping the set without [`shutdown`](Self::shutdown) leaves the pump running until
/// the bus closes.
pub struct SubscriberSet {
    token: CancellationToken,
    pump: JoinHandle<()>,
}

impl SubscriberSet {
    /// Subscribes to `bus` and starts one worker per subscriber.
    ///
    /// `default_capacity` sizes the queue of every subscriber that does not pick its own
    /// through [`Subscribe::queue_capacity`]. Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(subs: Vec<Arc<dyn Subscribe>>, bus: &Bus, default_capacity: usize) -> Self {
        let rx = bus.subscribe();
        let (lanes, workers) = subs
            .into_iter()
            .map(|sub| Lane::open(sub, default_capacity, bus))
            .unzip();
        let fanout = Fanout {
            lanes,
            workers,
            bus: bus.clone(),
        };

        let token = CancellationToken::new();
        let pump = tokio::spawn(pump(rx, fanout, token.clone()));
        Self { token, pump }
    }

    /// Stops the pump, delivers what is already on the bus and waits for every worker.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.pump.await;
    }
}
