//! Connection lifecycle: probe handshake, heartbeat, event dispatch, and the
//! pose-flush loop.
//!
//! The session owns no socket. The transport collaborator feeds it
//! [`TransportEvent`]s on a channel and drains raw outgoing frames from
//! another; frames are pushed in the order pose updates commit, so the
//! transport preserves per-connection ordering by draining FIFO.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::peers::PeerRegistry;
use crate::pose::Pose;
use crate::protocol::events::{MouseCoords, PartyEvent, PeerRef, SelfJoined};
use crate::protocol::frame::{decode_frame, encode_event, ControlSignal, Frame};
use crate::protocol::frame::{TOKEN_PING, TOKEN_PROBE, TOKEN_PROBE_CONFIRM};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(20);
pub const POSE_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// What the transport collaborator reports about the underlying connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    Errored(String),
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingProbeAck,
    Live,
    Closed,
}

/// Outcome of feeding one transport event through the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// The probe handshake just completed; the caller starts heartbeat and
    /// pose-flush and sends the first ping.
    WentLive,
    Stop,
}

pub struct Session {
    state: SessionState,
    outbound: mpsc::UnboundedSender<String>,
    dispatch: mpsc::UnboundedSender<PartyEvent>,
    registry: Arc<RwLock<PeerRegistry>>,
    pose: Arc<Mutex<Pose>>,
    last_sent_pose: Option<String>,
    last_ping_sent: Option<Instant>,
}

impl Session {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        dispatch: mpsc::UnboundedSender<PartyEvent>,
        registry: Arc<RwLock<PeerRegistry>>,
        pose: Arc<Mutex<Pose>>,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            outbound,
            dispatch,
            registry,
            pose,
            last_sent_pose: None,
            last_ping_sent: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == SessionState::Live
    }

    /// Drives the session until the transport closes. Heartbeat and
    /// pose-flush timers run only while live.
    pub async fn run(mut self, mut transport: mpsc::UnboundedReceiver<TransportEvent>) {
        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        let mut flush = interval(POSE_FLUSH_INTERVAL);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = transport.recv() => {
                    let Some(event) = event else { break };
                    match self.step(event, Instant::now()).await {
                        Step::Continue => {}
                        Step::WentLive => {
                            heartbeat.reset();
                            flush.reset();
                            self.send_ping(Instant::now());
                        }
                        Step::Stop => break,
                    }
                }
                _ = heartbeat.tick(), if self.is_live() => {
                    self.send_ping(Instant::now());
                }
                _ = flush.tick(), if self.is_live() => {
                    self.flush_pose().await;
                }
            }
        }
    }

    /// Feeds one transport event through the state machine. Exposed so the
    /// transitions can be tested without timers or sockets.
    pub async fn step(&mut self, event: TransportEvent, now: Instant) -> Step {
        match event {
            TransportEvent::Opened => {
                if self.state == SessionState::Idle {
                    self.send_raw(TOKEN_PROBE);
                    self.state = SessionState::AwaitingProbeAck;
                }
                Step::Continue
            }
            TransportEvent::Frame(raw) => self.handle_frame(&raw, now).await,
            TransportEvent::Errored(err) => {
                // Transport faults are reported, not acted on; the transport's
                // own close notification ends the session.
                warn!(%err, "transport error");
                Step::Continue
            }
            TransportEvent::Closed => {
                self.state = SessionState::Closed;
                info!("connection closed");
                Step::Stop
            }
        }
    }

    async fn handle_frame(&mut self, raw: &str, now: Instant) -> Step {
        match decode_frame(raw) {
            Frame::Control(signal) => self.handle_control(signal, now),
            Frame::Event { name, payload } => {
                if self.is_live() {
                    if let Some(event) = PartyEvent::from_wire(&name, payload) {
                        self.apply_registry(&event).await;
                        self.dispatch.send(event).ok();
                    }
                }
                Step::Continue
            }
            Frame::Unrecognized => Step::Continue,
        }
    }

    fn handle_control(&mut self, signal: ControlSignal, now: Instant) -> Step {
        match (self.state, signal) {
            (SessionState::AwaitingProbeAck, ControlSignal::ProbeAck) => {
                self.send_raw(TOKEN_PROBE_CONFIRM);
                self.state = SessionState::Live;
                self.dispatch
                    .send(PartyEvent::SelfJoined(SelfJoined::default()))
                    .ok();
                Step::WentLive
            }
            (SessionState::Live, ControlSignal::Pong) => {
                if let Some(sent) = self.last_ping_sent {
                    debug!(latency_ms = now.duration_since(sent).as_millis(), "pong");
                }
                Step::Continue
            }
            (_, ControlSignal::Open) => {
                // Session id confirmation; the probe is driven by the
                // transport's own open notification.
                debug!("open frame acknowledged");
                Step::Continue
            }
            _ => Step::Continue,
        }
    }

    /// Registry mutation happens only here, on the dispatch path.
    async fn apply_registry(&self, event: &PartyEvent) {
        match event {
            PartyEvent::PartierJoined(PeerRef { id }) => {
                self.registry.write().await.upsert(id.clone(), Pose::default());
            }
            PartyEvent::PartierLeft(PeerRef { id }) => {
                self.registry.write().await.remove(id);
            }
            PartyEvent::MouseCoords(MouseCoords { id, mouse }) => {
                // First observed pose from an unknown id also creates the peer.
                self.registry.write().await.upsert(id.clone(), mouse.clone());
            }
            PartyEvent::SelfJoined(_) => {}
        }
    }

    fn send_ping(&mut self, now: Instant) {
        self.send_raw(TOKEN_PING);
        self.last_ping_sent = Some(now);
        debug!("sent ping");
    }

    /// Sends the current pose only when its serialization changed since the
    /// last emission.
    async fn flush_pose(&mut self) {
        let pose = self.pose.lock().await.clone();
        let snapshot = match serde_json::to_string(&pose) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(%err, "failed to serialize pose");
                return;
            }
        };
        if self.last_sent_pose.as_deref() == Some(snapshot.as_str()) {
            return;
        }
        match encode_event(crate::protocol::events::EVENT_MOUSE_COORDS, &pose) {
            Ok(frame) => {
                self.send_raw_owned(frame);
                self.last_sent_pose = Some(snapshot);
            }
            Err(err) => warn!(%err, "failed to encode pose frame"),
        }
    }

    fn send_raw(&self, frame: &str) {
        self.send_raw_owned(frame.to_string());
    }

    fn send_raw_owned(&self, frame: String) {
        // The transport dropping its end means the connection is gone; the
        // close notification will follow.
        self.outbound.send(frame).ok();
    }
}
