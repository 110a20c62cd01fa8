//! The session actor: one link, one call in flight.
//!
//! A `Session` owns the link and three threads:
//! - `gaprpc-worker` takes calls off a bounded queue one at a time, writes
//!   the command and waits for its response. It is the only writer.
//! - `gaprpc-reader` reads frames. Responses go to the call in flight,
//!   events go onto a bounded event queue. It never waits on a call.
//!   Pairing and disconnect events update the security store here,
//!   before queueing, so they apply even when the queue is full.
//! - `gaprpc-events` decodes queued events and hands them to subscribers.
//!
//! The protocol has no correlation id. Any response is taken to answer
//! the call in flight, so at most one call may be outstanding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use gaprpc_codec::{
    decode_event, decode_response, encode_request, peek_event_id, EventRecord, Operation, Outcome,
    WireReader,
};
use gaprpc_codec::events::{AUTH_STATUS, DISCONNECTED};
use gaprpc_frame::{FrameConfig, FrameError, FrameReader, FrameWriter, PacketType};
use gaprpc_transport::{LinkAddr, LinkConfig, LinkStream};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::dispatcher::{Counters, Dispatcher, SessionStats, SubscriptionId};
use crate::error::{Result, RpcError};
use crate::pending::{pending, PendingReply};
use crate::security::SecurityContextStore;

type Completion = Box<dyn FnOnce(Result<Option<Bytes>>) + Send>;

/// One queued call: the encoded command and what to do with its response.
struct Call {
    opcode: u8,
    name: &'static str,
    request: Bytes,
    expects_response: bool,
    complete: Completion,
}

/// State shared between the session handle and its threads.
struct Shared {
    stop: AtomicBool,
    link_down: AtomicBool,
    /// Where the reader hands the next response. Set only while a call
    /// is waiting for one.
    response_slot: Mutex<Option<Sender<Bytes>>>,
    counters: Arc<Counters>,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Option<Sender<Bytes>>> {
        self.response_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A connection to one radio controller.
pub struct Session {
    call_tx: Option<Sender<Call>>,
    shared: Arc<Shared>,
    link: LinkStream,
    dispatcher: Arc<Dispatcher>,
    security: Arc<SecurityContextStore>,
    config: SessionConfig,
    threads: Vec<JoinHandle<()>>,
}

impl Session {
    /// Open the link at `addr` and start a session on it.
    pub fn open(addr: &LinkAddr, link_config: &LinkConfig, config: SessionConfig) -> Result<Self> {
        let link = LinkStream::open(addr, link_config)?;
        debug!(addr = %addr, "link opened");
        Self::from_stream(link, config)
    }

    /// Start a session on an already connected link.
    pub fn from_stream(link: LinkStream, config: SessionConfig) -> Result<Self> {
        config.validate()?;

        let frame_config = FrameConfig {
            max_payload_size: config.max_payload_size,
            read_timeout: Some(config.poll_interval),
            write_timeout: Some(config.response_timeout),
        };
        let reader = FrameReader::with_config_link(link.try_clone()?, frame_config.clone())?;
        let writer = FrameWriter::with_config_link(link.try_clone()?, frame_config)?;

        let counters = Arc::new(Counters::default());
        let security = Arc::new(SecurityContextStore::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&counters)));
        let shared = Arc::new(Shared {
            stop: AtomicBool::new(false),
            link_down: AtomicBool::new(false),
            response_slot: Mutex::new(None),
            counters,
        });

        let (call_tx, call_rx) = crossbeam_channel::bounded(config.call_queue_capacity);
        let (event_tx, event_rx) = crossbeam_channel::bounded(config.event_queue_capacity);

        let mut session = Self {
            call_tx: Some(call_tx),
            shared,
            link,
            dispatcher,
            security,
            config,
            threads: Vec::with_capacity(3),
        };

        let shared = Arc::clone(&session.shared);
        let timeout = session.config.response_timeout;
        session.spawn("gaprpc-worker", move || run_worker(writer, call_rx, shared, timeout))?;

        let shared = Arc::clone(&session.shared);
        let security = Arc::clone(&session.security);
        session.spawn("gaprpc-reader", move || {
            run_reader(reader, shared, security, event_tx)
        })?;

        let shared = Arc::clone(&session.shared);
        let dispatcher = Arc::clone(&session.dispatcher);
        session.spawn("gaprpc-events", move || run_events(event_rx, dispatcher, shared))?;

        info!(
            link = session.link.kind(),
            response_timeout_ms = session.config.response_timeout.as_millis() as u64,
            "session opened"
        );
        Ok(session)
    }

    fn spawn<F>(&mut self, name: &str, body: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new().name(name.to_string()).spawn(body)?;
        self.threads.push(handle);
        Ok(())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Queue `op` and run `handler` with its result on the worker thread.
    ///
    /// Encoding happens here: a malformed `op` fails immediately and
    /// nothing is queued. The handler must not make blocking calls on
    /// this session; the worker is busy running it.
    pub fn submit<O, F>(&self, op: O, handler: F) -> Result<()>
    where
        O: Operation + 'static,
        O::Output: Send + 'static,
        F: FnOnce(Result<O::Output>) + Send + 'static,
    {
        let request = encode_request(&op).map_err(RpcError::Encode)?;
        let call = Call {
            opcode: O::OPCODE,
            name: O::NAME,
            request,
            expects_response: O::EXPECTS_RESPONSE,
            complete: Box::new(move |raw| handler(raw.and_then(finish::<O>))),
        };
        let call_tx = self.call_tx.as_ref().ok_or(RpcError::SessionClosed)?;
        call_tx.send(call).map_err(|_| RpcError::SessionClosed)
    }

    /// Queue `op` and return a handle to its eventual result.
    pub fn request<O>(&self, op: O) -> Result<PendingReply<O::Output>>
    where
        O: Operation + 'static,
        O::Output: Send + 'static,
    {
        let (tx, reply) = pending();
        self.submit(op, move |result| {
            // The caller may have dropped its reply; the result is discarded.
            let _ = tx.send(result);
        })?;
        Ok(reply)
    }

    /// Run `op` and block until it completes.
    pub fn call<O>(&self, op: O) -> Result<O::Output>
    where
        O: Operation + 'static,
        O::Output: Send + 'static,
    {
        self.request(op)?.wait()
    }

    /// Run `op` without blocking the async runtime while it waits.
    #[cfg(feature = "async")]
    pub async fn call_async<O>(&self, op: O) -> Result<O::Output>
    where
        O: Operation + 'static,
        O::Output: Send + 'static,
    {
        self.request(op)?.await
    }

    /// Register a callback for every event, run on the event thread.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&EventRecord) + Send + 'static,
    {
        self.dispatcher.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// A new receiver of every event from now on.
    pub fn events(&self) -> Receiver<EventRecord> {
        self.dispatcher.channel()
    }

    /// A new async stream of every event from now on.
    #[cfg(feature = "async")]
    pub fn event_stream(&self) -> EventStream {
        EventStream {
            rx: self.dispatcher.async_channel(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.counters.snapshot()
    }

    pub fn security(&self) -> &Arc<SecurityContextStore> {
        &self.security
    }

    /// True once the reader has seen the link close.
    pub fn is_link_down(&self) -> bool {
        self.shared.link_down.load(Ordering::Acquire)
    }

    /// Stop the session. Queued calls fail with `SessionClosed`.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.shared.stop.store(true, Ordering::Release);
        self.call_tx.take();
        if let Err(err) = self.link.shutdown() {
            debug!(error = %err, "link shutdown failed");
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("session thread panicked");
            }
        }
        info!("session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("link", &self.link)
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Turn the raw response of a finished call into the operation's result.
fn finish<O: Operation>(raw: Option<Bytes>) -> Result<O::Output> {
    let Some(payload) = raw else {
        // No-reply operation: the output is empty.
        return O::decode_output(&mut WireReader::new(&[])).map_err(RpcError::Decode);
    };
    match decode_response::<O>(&payload).map_err(RpcError::Decode)? {
        Outcome::Success(output) => Ok(output),
        Outcome::Failed(status) => Err(RpcError::Firmware {
            name: O::NAME,
            status,
        }),
    }
}

fn run_worker(
    mut writer: FrameWriter<LinkStream>,
    calls: Receiver<Call>,
    shared: Arc<Shared>,
    timeout: Duration,
) {
    for call in calls.iter() {
        let Call {
            opcode,
            name,
            request,
            expects_response,
            complete,
        } = call;

        let result = if shared.stop.load(Ordering::Acquire) || shared.link_down.load(Ordering::Acquire) {
            Err(RpcError::SessionClosed)
        } else {
            exchange(&mut writer, &shared, opcode, name, &request, expects_response, timeout)
        };
        if let Err(err) = &result {
            debug!(opcode, name, error = %err, "call failed");
        }
        complete(result);
    }
    debug!("worker stopped");
}

/// Write one command and wait for its response.
fn exchange(
    writer: &mut FrameWriter<LinkStream>,
    shared: &Shared,
    opcode: u8,
    name: &'static str,
    request: &[u8],
    expects_response: bool,
    timeout: Duration,
) -> Result<Option<Bytes>> {
    if !expects_response {
        writer.send(PacketType::Command, request)?;
        debug!(opcode, name, "command sent, no response expected");
        return Ok(None);
    }

    // Install the slot before writing so a fast response is not missed.
    let (tx, rx) = crossbeam_channel::bounded(1);
    *shared.slot() = Some(tx);

    if let Err(err) = writer.send(PacketType::Command, request) {
        shared.slot().take();
        return Err(err.into());
    }
    debug!(opcode, name, len = request.len(), "command sent");

    match rx.recv_timeout(timeout) {
        Ok(response) => Ok(Some(response)),
        Err(RecvTimeoutError::Timeout) => {
            // The reader sends while holding the slot lock, so an empty
            // slot here means the response is already in the channel.
            if shared.slot().take().is_none() {
                if let Ok(response) = rx.try_recv() {
                    return Ok(Some(response));
                }
            }
            if shared.link_down.load(Ordering::Acquire) {
                debug!(opcode, name, "link went down while waiting for response");
                return Err(RpcError::SessionClosed);
            }
            warn!(opcode, name, ?timeout, "no response for command");
            Err(RpcError::Timeout(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => Err(RpcError::SessionClosed),
    }
}

fn run_reader(
    mut reader: FrameReader<LinkStream>,
    shared: Arc<Shared>,
    security: Arc<SecurityContextStore>,
    events: Sender<(SystemTime, Bytes)>,
) {
    loop {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(err) if err.is_timeout() => continue,
            Err(FrameError::EmptyFrame) => {
                Counters::bump(&shared.counters.frames_dropped_unknown);
                warn!("dropping empty frame");
                continue;
            }
            Err(FrameError::PayloadTooLarge { size, max }) => {
                // The frame reader skips the body, so the stream stays in sync.
                Counters::bump(&shared.counters.frames_dropped_unknown);
                warn!(size, max, "dropping oversized frame");
                continue;
            }
            Err(FrameError::ConnectionClosed) => {
                debug!("link closed by peer");
                break;
            }
            Err(err) => {
                error!(error = %err, "link read failed");
                break;
            }
        };

        match frame.packet_type {
            PacketType::Response => {
                let mut slot = shared.slot();
                match slot.take() {
                    Some(tx) => {
                        debug!(len = frame.payload.len(), "response received");
                        // The worker only drops its receiver after clearing the slot.
                        let _ = tx.send(frame.payload);
                    }
                    None => {
                        Counters::bump(&shared.counters.late_responses);
                        warn!(
                            opcode = frame.payload.first().copied(),
                            "dropping response with no call waiting"
                        );
                    }
                }
            }
            PacketType::Event => {
                observe_security(&security, &frame.payload);
                match events.try_send((SystemTime::now(), frame.payload)) {
                    Ok(()) => {}
                    Err(TrySendError::Full((_, payload))) => {
                        Counters::bump(&shared.counters.events_dropped_queue_full);
                        warn!(event_id = peek_event_id(&payload), "event queue full, dropping event");
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
            other => {
                Counters::bump(&shared.counters.frames_dropped_unknown);
                warn!(
                    packet_type = other.as_u8(),
                    name = other.name(),
                    "dropping unexpected frame"
                );
            }
        }
    }

    shared.link_down.store(true, Ordering::Release);
    // Wakes a waiting call with `SessionClosed`.
    shared.slot().take();
    debug!("reader stopped");
}

/// Decode pairing and disconnect events early and apply them to the store.
/// Decode failures are left for the event thread to count.
fn observe_security(security: &SecurityContextStore, payload: &[u8]) {
    if !matches!(peek_event_id(payload), Some(AUTH_STATUS | DISCONNECTED)) {
        return;
    }
    if let Ok(record) = decode_event(payload) {
        security.observe(&record);
    }
}

fn run_events(events: Receiver<(SystemTime, Bytes)>, dispatcher: Arc<Dispatcher>, shared: Arc<Shared>) {
    for (arrived, payload) in events.iter() {
        match decode_event(&payload) {
            Ok(mut record) => {
                record.timestamp = arrived;
                debug!(
                    event = record.name(),
                    conn_handle = record.conn_handle,
                    "event received"
                );
                dispatcher.dispatch(&record);
            }
            Err(err) => {
                Counters::bump(&shared.counters.event_decode_failures);
                error!(
                    event_id = peek_event_id(&payload),
                    len = payload.len(),
                    error = %err,
                    "dropping undecodable event"
                );
            }
        }
    }
    debug!("event thread stopped");
}

/// Events as an async stream, from [`Session::event_stream`].
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct EventStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<EventRecord>,
}

#[cfg(feature = "async")]
impl futures_core::Stream for EventStream {
    type Item = EventRecord;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shared() -> Shared {
        Shared {
            stop: AtomicBool::new(false),
            link_down: AtomicBool::new(false),
            response_slot: Mutex::new(None),
            counters: Arc::new(Counters::default()),
        }
    }

    #[test]
    fn timeout_without_response_is_timeout() {
        let (host, _device) = LinkStream::pair().unwrap();
        let mut writer = FrameWriter::new(host);
        let shared = shared();

        let timeout = Duration::from_millis(20);
        let err = exchange(&mut writer, &shared, 0x01, "test", &[0x01], true, timeout).unwrap_err();
        assert!(matches!(err, RpcError::Timeout(_)));
        assert!(shared.slot().is_none());
    }

    #[test]
    fn timeout_after_link_loss_is_session_closed() {
        let (host, _device) = LinkStream::pair().unwrap();
        let mut writer = FrameWriter::new(host);
        let shared = shared();
        // Reader has flagged the link down but not yet cleared the slot.
        shared.link_down.store(true, Ordering::Release);

        let timeout = Duration::from_millis(20);
        let err = exchange(&mut writer, &shared, 0x01, "test", &[0x01], true, timeout).unwrap_err();
        assert!(matches!(err, RpcError::SessionClosed));
        assert!(shared.slot().is_none());
    }

    #[test]
    fn security_events_update_the_store() {
        let store = SecurityContextStore::new();
        store.create(3, None).unwrap();

        let rssi = EventRecord::new(
            3,
            gaprpc_codec::GapEvent::RssiChanged(gaprpc_codec::events::RssiChanged { rssi: -20 }),
        );
        observe_security(&store, &rssi.encode().unwrap());
        assert!(store.contains(3));

        // Undecodable bodies are left alone.
        observe_security(&store, &DISCONNECTED.to_le_bytes());
        assert!(store.contains(3));

        let disconnected = EventRecord::new(
            3,
            gaprpc_codec::GapEvent::Disconnected(gaprpc_codec::events::Disconnected { reason: 0x08 }),
        );
        observe_security(&store, &disconnected.encode().unwrap());
        assert!(!store.contains(3));
    }
}
