use std::time::Duration;

use shared::{domain::AutoMode, protocol::RequestBody};
use tokio::{task::JoinHandle, time::timeout};

use super::*;
use crate::{list::List, Controller, ControllerConfig};

const WAIT: Duration = Duration::from_secs(1);

struct Harness {
    root: Client,
    io: AdapterIo,
    cancel: CancellationToken,
    adapter: JoinHandle<AdapterExit>,
}

async fn harness() -> Harness {
    let list = List::from_payloads(["a", "b", "c"], AutoMode::Off);
    let (controller, root) = Controller::new(list, ControllerConfig::default());
    tokio::spawn(controller.run());
    let client = root.copy().await.expect("copy");
    let (adapter, io) = Adapter::new(client, 16);
    let cancel = CancellationToken::new();
    let adapter = tokio::spawn(adapter.run(cancel.clone()));
    Harness {
        root,
        io,
        cancel,
        adapter,
    }
}

impl Harness {
    async fn send_line(&self, raw: &str) {
        let message = Message::from_line(raw).expect("line");
        self.io.inbound.send(message).await.expect("adapter alive");
    }

    async fn next_line(&mut self) -> String {
        timeout(WAIT, self.io.outbound.recv())
            .await
            .expect("outbound timeout")
            .expect("outbound closed")
            .pack()
    }
}

#[tokio::test]
async fn dump_request_is_answered_with_tagged_lines() {
    let mut h = harness().await;
    h.send_line("t1 dump").await;

    assert_eq!(h.next_line().await, "t1 AUTOMODE off");
    assert_eq!(h.next_line().await, "t1 COUNT 3");
    for index in 0..3 {
        assert!(h.next_line().await.starts_with(&format!("t1 ITEM {index} ")));
    }
    assert!(h.next_line().await.starts_with("t1 SELECT 0 "));
    assert_eq!(h.next_line().await, "t1 ACK OK dump");
}

#[tokio::test]
async fn malformed_request_is_answered_locally_and_adapter_continues() {
    let mut h = harness().await;
    h.send_line("t2 explode").await;
    assert_eq!(
        h.next_line().await,
        r#"t2 ACK WHAT "unknown request word 'explode'""#
    );

    h.send_line("t3 next").await;
    assert!(h.next_line().await.starts_with("! SELECT 1 "));
    assert_eq!(h.next_line().await, "t3 ACK OK next");
}

#[tokio::test]
async fn broadcasts_from_other_clients_are_forwarded() {
    let mut h = harness().await;
    assert!(
        h.root
            .send(
                RequestBody::SetAutoMode {
                    auto_mode: AutoMode::Shuffle,
                },
                None,
            )
            .await
    );
    assert_eq!(h.next_line().await, "! AUTOMODE shuffle");
}

#[tokio::test]
async fn stops_when_cancelled() {
    let h = harness().await;
    h.cancel.cancel();
    let exit = timeout(WAIT, h.adapter).await.expect("exit").expect("join");
    assert_eq!(exit, AdapterExit::Cancelled);
}

#[tokio::test]
async fn stops_when_connection_side_hangs_up() {
    let h = harness().await;
    let Harness { io, adapter, .. } = h;
    drop(io.inbound);
    let exit = timeout(WAIT, adapter).await.expect("exit").expect("join");
    assert_eq!(exit, AdapterExit::ConnectionClosed);
}

#[tokio::test]
async fn stops_when_controller_shuts_down() {
    let h = harness().await;
    h.root.shutdown();
    let exit = timeout(WAIT, h.adapter).await.expect("exit").expect("join");
    assert_eq!(exit, AdapterExit::ClientDone);
}
