//! Delivery of decoded events to subscribers.
//!
//! Runs on the session's event thread, never on the reader. A slow
//! subscriber backs up the bounded event queue; once that is full the
//! reader drops new events and counts them instead of stalling.
//! Security context updates happen on the reader before queueing, so a
//! dropped event still takes effect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gaprpc_codec::EventRecord;
use serde::Serialize;
use tracing::debug;

/// Counters kept by a session. Read them with `Session::stats`.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub events_delivered: AtomicU64,
    pub events_dropped_queue_full: AtomicU64,
    pub frames_dropped_unknown: AtomicU64,
    pub event_decode_failures: AtomicU64,
    pub late_responses: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            events_dropped_queue_full: self.events_dropped_queue_full.load(Ordering::Relaxed),
            frames_dropped_unknown: self.frames_dropped_unknown.load(Ordering::Relaxed),
            event_decode_failures: self.event_decode_failures.load(Ordering::Relaxed),
            late_responses: self.late_responses.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a session's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Events decoded and handed to subscribers.
    pub events_delivered: u64,
    /// Events dropped because the event queue was full.
    pub events_dropped_queue_full: u64,
    /// Frames that were neither a response nor an event.
    pub frames_dropped_unknown: u64,
    /// Event frames whose body failed to decode.
    pub event_decode_failures: u64,
    /// Responses that arrived with no call waiting for them.
    pub late_responses: u64,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&EventRecord) + Send>;

#[derive(Clone)]
enum Subscriber {
    Callback(Arc<Mutex<Callback>>),
    Channel(crossbeam_channel::Sender<EventRecord>),
    #[cfg(feature = "async")]
    Async(tokio::sync::mpsc::UnboundedSender<EventRecord>),
}

impl Subscriber {
    /// Returns false once the subscriber has gone away.
    fn deliver(&self, record: &EventRecord) -> bool {
        match self {
            Subscriber::Callback(callback) => {
                let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
                callback(record);
                true
            }
            Subscriber::Channel(tx) => tx.send(record.clone()).is_ok(),
            #[cfg(feature = "async")]
            Subscriber::Async(tx) => tx.send(record.clone()).is_ok(),
        }
    }
}

pub(crate) struct Dispatcher {
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub fn new(counters: Arc<Counters>) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            counters,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Subscriber)>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, subscriber));
        id
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&EventRecord) + Send + 'static,
    {
        self.add(Subscriber::Callback(Arc::new(Mutex::new(Box::new(callback)))))
    }

    pub fn channel(&self) -> crossbeam_channel::Receiver<EventRecord> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.add(Subscriber::Channel(tx));
        rx
    }

    #[cfg(feature = "async")]
    pub fn async_channel(&self) -> tokio::sync::mpsc::UnboundedReceiver<EventRecord> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.add(Subscriber::Async(tx));
        rx
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Hand `record` to every subscriber in subscription order.
    pub fn dispatch(&self, record: &EventRecord) {
        // Deliver from a snapshot so callbacks may subscribe or unsubscribe.
        let subscribers: Vec<(SubscriptionId, Subscriber)> = self.lock().clone();
        let mut gone = Vec::new();
        for (id, subscriber) in &subscribers {
            if !subscriber.deliver(record) {
                gone.push(*id);
            }
        }
        if !gone.is_empty() {
            self.lock().retain(|(id, _)| !gone.contains(id));
            debug!(count = gone.len(), "dropped closed event subscribers");
        }
        Counters::bump(&self.counters.events_delivered);
    }
}

#[cfg(test)]
mod tests {
    use gaprpc_codec::events::RssiChanged;
    use gaprpc_codec::GapEvent;

    use super::*;

    fn dispatcher() -> (Dispatcher, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        (Dispatcher::new(Arc::clone(&counters)), counters)
    }

    fn rssi(conn_handle: u16, rssi: i8) -> EventRecord {
        EventRecord::new(conn_handle, GapEvent::RssiChanged(RssiChanged { rssi }))
    }

    #[test]
    fn delivers_in_order_to_every_subscriber() {
        let (dispatcher, counters) = dispatcher();
        let first = dispatcher.channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dispatcher.subscribe(move |record| {
            if let GapEvent::RssiChanged(event) = &record.event {
                sink.lock().unwrap().push(event.rssi);
            }
        });

        for value in [-40, -50, -60] {
            dispatcher.dispatch(&rssi(1, value));
        }

        let received: Vec<i8> = first
            .try_iter()
            .map(|record| match record.event {
                GapEvent::RssiChanged(event) => event.rssi,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(received, vec![-40, -50, -60]);
        assert_eq!(*seen.lock().unwrap(), vec![-40, -50, -60]);
        assert_eq!(counters.snapshot().events_delivered, 3);
    }

    #[test]
    fn unsubscribe_and_closed_receivers() {
        let (dispatcher, _) = dispatcher();
        let id = dispatcher.subscribe(|_| {});
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));

        let rx = dispatcher.channel();
        drop(rx);
        dispatcher.dispatch(&rssi(1, -1));
        assert!(dispatcher.lock().is_empty());
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let (dispatcher, _) = dispatcher();
        let dispatcher = Arc::new(dispatcher);
        let slot = Arc::new(Mutex::new(None));
        let inner = Arc::clone(&dispatcher);
        let own_id = Arc::clone(&slot);
        let id = dispatcher.subscribe(move |_| {
            if let Some(id) = own_id.lock().unwrap().take() {
                inner.unsubscribe(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        dispatcher.dispatch(&rssi(1, -1));
        assert!(dispatcher.lock().is_empty());
    }
}
