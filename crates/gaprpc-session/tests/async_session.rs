#![cfg(feature = "async")]

mod common;

use std::future::poll_fn;
use std::pin::Pin;
use std::time::Duration;

use common::{fast_config, success, FakeFirmware, Reply};
use futures_core::Stream;
use gaprpc_codec::ble::{Version, VersionGet};
use gaprpc_codec::events::{Timeout, TimeoutSource};
use gaprpc_codec::{EventRecord, GapEvent};

fn version() -> Version {
    Version {
        version_number: 9,
        company_id: 0x0059,
        subversion_number: 0x0100,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn call_async_resolves_with_the_output() {
    let (session, firmware) =
        FakeFirmware::start(fast_config(), |_, _| Reply::now(success::<VersionGet>(version())));

    let got = session.call_async(VersionGet {}).await.unwrap();
    assert_eq!(got, version());

    let pending = session.request(VersionGet {}).unwrap();
    assert_eq!(pending.await.unwrap(), version());
    drop(session);
    firmware.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn event_stream_yields_records() {
    let (session, firmware) = FakeFirmware::start(fast_config(), |_, _| Reply::Silent);
    let mut events = session.event_stream();

    firmware.firmware.emit(&EventRecord::new(
        0xFFFF,
        GapEvent::Timeout(Timeout {
            src: TimeoutSource::Scan,
        }),
    ));

    let record = tokio::time::timeout(
        Duration::from_secs(2),
        poll_fn(|cx| Pin::new(&mut events).poll_next(cx)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(record.name(), "timeout");
    assert_eq!(record.conn_handle, 0xFFFF);
    drop(session);
    firmware.stop();
}
