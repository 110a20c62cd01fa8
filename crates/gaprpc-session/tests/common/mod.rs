//! In-process fake controller for session tests.
//!
//! Answers commands on the far end of a `LinkStream::pair` and records
//! whether a command ever arrived while an earlier one was unanswered.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use gaprpc_codec::{encode_response, EventRecord, Operation, Outcome, Status};
use gaprpc_frame::{FrameReader, FrameWriter, PacketType};
use gaprpc_session::{Session, SessionConfig};
use gaprpc_transport::LinkStream;

/// What the firmware does with one command.
pub enum Reply {
    /// Send this response body after `delay`.
    Respond { body: Bytes, delay: Duration },
    /// Never answer.
    Silent,
}

impl Reply {
    pub fn now(body: Bytes) -> Self {
        Reply::Respond {
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn after(body: Bytes, delay: Duration) -> Self {
        Reply::Respond { body, delay }
    }
}

pub fn success<O: Operation>(output: O::Output) -> Bytes {
    encode_response::<O>(&Outcome::Success(output)).unwrap()
}

pub fn failure<O: Operation>(status: Status) -> Bytes {
    encode_response::<O>(&Outcome::Failed(status)).unwrap()
}

type Handler = Box<dyn FnMut(&FakeFirmware, &[u8]) -> Reply + Send>;

struct Inner {
    writer: Mutex<FrameWriter<LinkStream>>,
    link: LinkStream,
    in_flight: AtomicUsize,
    overlap: AtomicBool,
    commands: Mutex<Vec<Bytes>>,
}

#[derive(Clone)]
pub struct FakeFirmware {
    inner: Arc<Inner>,
}

pub struct Running {
    pub firmware: FakeFirmware,
    threads: Vec<JoinHandle<()>>,
}

impl FakeFirmware {
    /// Start a fake controller and a session connected to it.
    pub fn start<F>(config: SessionConfig, handler: F) -> (Session, Running)
    where
        F: FnMut(&FakeFirmware, &[u8]) -> Reply + Send + 'static,
    {
        let (host, device) = LinkStream::pair().unwrap();
        let running = Self::serve(device, Box::new(handler));
        let session = Session::from_stream(host, config).unwrap();
        (session, running)
    }

    fn serve(link: LinkStream, mut handler: Handler) -> Running {
        let reader_link = link.try_clone().unwrap();
        let writer = FrameWriter::new(link.try_clone().unwrap());
        let firmware = FakeFirmware {
            inner: Arc::new(Inner {
                writer: Mutex::new(writer),
                link,
                in_flight: AtomicUsize::new(0),
                overlap: AtomicBool::new(false),
                commands: Mutex::new(Vec::new()),
            }),
        };

        let (reply_tx, reply_rx) = crossbeam_channel::unbounded::<(Bytes, Duration)>();

        let responder = {
            let firmware = firmware.clone();
            thread::spawn(move || {
                for (body, delay) in reply_rx.iter() {
                    thread::sleep(delay);
                    firmware.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
                    if firmware.send(PacketType::Response, &body).is_err() {
                        break;
                    }
                }
            })
        };

        let reader = {
            let firmware = firmware.clone();
            thread::spawn(move || {
                let mut reader = FrameReader::new(reader_link);
                while let Ok(frame) = reader.read_frame() {
                    if frame.packet_type != PacketType::Command {
                        continue;
                    }
                    if firmware.inner.in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                        firmware.inner.overlap.store(true, Ordering::SeqCst);
                    }
                    firmware.inner.commands.lock().unwrap().push(frame.payload.clone());
                    match handler(&firmware, &frame.payload) {
                        Reply::Respond { body, delay } => {
                            if reply_tx.send((body, delay)).is_err() {
                                break;
                            }
                        }
                        Reply::Silent => {
                            firmware.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
                        }
                    }
                }
            })
        };

        Running {
            firmware,
            threads: vec![reader, responder],
        }
    }

    pub fn send(&self, packet_type: PacketType, body: &[u8]) -> gaprpc_frame::Result<()> {
        self.inner.writer.lock().unwrap().send(packet_type, body)
    }

    pub fn emit(&self, record: &EventRecord) {
        self.send(PacketType::Event, &record.encode().unwrap()).unwrap();
    }

    /// Command bodies received so far.
    pub fn commands(&self) -> Vec<Bytes> {
        self.inner.commands.lock().unwrap().clone()
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.commands().iter().map(|body| body[0]).collect()
    }

    pub fn saw_overlap(&self) -> bool {
        self.inner.overlap.load(Ordering::SeqCst)
    }

    /// Close the controller's end of the link.
    pub fn hang_up(&self) {
        let _ = self.inner.link.shutdown();
    }
}

impl Running {
    pub fn stop(mut self) {
        self.firmware.hang_up();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub fn fast_config() -> SessionConfig {
    SessionConfig {
        response_timeout: Duration::from_millis(500),
        poll_interval: Duration::from_millis(10),
        ..SessionConfig::default()
    }
}
