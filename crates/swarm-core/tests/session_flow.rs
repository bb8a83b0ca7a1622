//! End-to-end session behavior over channel-backed transport: handshake,
//! heartbeat, pose flush, and registry updates, with virtual time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::timeout;

use swarm_core::peers::PeerRegistry;
use swarm_core::pose::{Glyph, Pose};
use swarm_core::protocol::{PartyEvent, Session, TransportEvent};

async fn recv_frame(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("outbound channel closed")
}

/// Heartbeat pings interleave freely with event frames; skip them.
async fn recv_event_frame(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    loop {
        let frame = recv_frame(rx).await;
        if frame != "2" {
            return frame;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn session_handshakes_heartbeats_and_flushes_pose() {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (dispatch_tx, mut events) = mpsc::unbounded_channel();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let registry = Arc::new(RwLock::new(PeerRegistry::new()));
    let pose = Arc::new(Mutex::new(Pose::default()));

    let session = Session::new(out_tx, dispatch_tx, registry.clone(), pose.clone());
    let task = tokio::spawn(session.run(transport_rx));

    transport_tx.send(TransportEvent::Opened).unwrap();
    assert_eq!(recv_frame(&mut out_rx).await, "2probe");

    transport_tx
        .send(TransportEvent::Frame("3probe".into()))
        .unwrap();
    assert_eq!(recv_frame(&mut out_rx).await, "5");
    // The heartbeat starts with an immediate ping.
    assert_eq!(recv_frame(&mut out_rx).await, "2");

    let dispatched = timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(dispatched, PartyEvent::SelfJoined(_)));

    // First flush emits the initial pose.
    let first = recv_event_frame(&mut out_rx).await;
    assert!(first.starts_with(r#"42["mouse-coords""#), "got {first}");

    // A changed pose flushes again.
    pose.lock()
        .await
        .set_position(0.25, 0.75)
        .set_glyph(Glyph::Wait);
    let second = recv_event_frame(&mut out_rx).await;
    assert!(second.contains("0.25"), "got {second}");

    // Peer events mutate the shared registry while the session runs.
    transport_tx
        .send(TransportEvent::Frame(
            r#"42["partier-joined",{"id":"A"}]"#.into(),
        ))
        .unwrap();
    let mut count = registry.read().await.watch_count();
    timeout(Duration::from_secs(5), count.wait_for(|&n| n >= 1))
        .await
        .expect("registry never saw the peer")
        .unwrap();
    assert!(registry.read().await.contains("A"));

    transport_tx.send(TransportEvent::Closed).unwrap();
    timeout(Duration::from_secs(5), task)
        .await
        .expect("session did not stop on close")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn unchanged_pose_is_not_resent() {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (dispatch_tx, _events) = mpsc::unbounded_channel();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let registry = Arc::new(RwLock::new(PeerRegistry::new()));
    let pose = Arc::new(Mutex::new(Pose::default()));

    let session = Session::new(out_tx, dispatch_tx, registry, pose.clone());
    let task = tokio::spawn(session.run(transport_rx));

    transport_tx.send(TransportEvent::Opened).unwrap();
    transport_tx
        .send(TransportEvent::Frame("3probe".into()))
        .unwrap();

    // Drain handshake + first flush, then give the flush timer many periods.
    let mut mouse_frames = 0;
    for _ in 0..64 {
        match timeout(Duration::from_millis(150), out_rx.recv()).await {
            Ok(Some(frame)) if frame.starts_with("42") => mouse_frames += 1,
            Ok(Some(_)) => {}
            _ => {}
        }
    }
    assert_eq!(mouse_frames, 1, "identical pose must be sent exactly once");

    transport_tx.send(TransportEvent::Closed).unwrap();
    timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}
