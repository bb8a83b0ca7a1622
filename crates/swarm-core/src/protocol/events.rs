//! Typed inner-layer events.
//!
//! The party server keys events by name; we translate the fixed set into a
//! tagged enum so dispatch is checked at compile time. Names outside the set
//! are dropped without logging: unknown events are expected during rollout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::pose::Pose;

pub const EVENT_SELF_JOINED: &str = "self-joined";
pub const EVENT_PARTIER_JOINED: &str = "partier-joined";
pub const EVENT_PARTIER_LEFT: &str = "partier-left";
pub const EVENT_MOUSE_COORDS: &str = "mouse-coords";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelfJoined {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub mouse: Option<Pose>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseCoords {
    pub id: String,
    pub mouse: Pose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartyEvent {
    SelfJoined(SelfJoined),
    PartierJoined(PeerRef),
    PartierLeft(PeerRef),
    MouseCoords(MouseCoords),
}

impl PartyEvent {
    /// Translates a decoded `(name, payload)` pair into a typed event.
    /// Unknown names yield `None` silently; a known name with a payload that
    /// does not fit its shape is a decode fault: logged, then dropped.
    pub fn from_wire(name: &str, payload: Value) -> Option<PartyEvent> {
        match name {
            EVENT_SELF_JOINED => Some(PartyEvent::SelfJoined(
                serde_json::from_value(payload).unwrap_or_default(),
            )),
            EVENT_PARTIER_JOINED => match serde_json::from_value(payload) {
                Ok(peer) => Some(PartyEvent::PartierJoined(peer)),
                Err(err) => {
                    warn!(event = name, %err, "dropping event with bad payload");
                    None
                }
            },
            EVENT_PARTIER_LEFT => match serde_json::from_value(payload) {
                Ok(peer) => Some(PartyEvent::PartierLeft(peer)),
                Err(err) => {
                    warn!(event = name, %err, "dropping event with bad payload");
                    None
                }
            },
            EVENT_MOUSE_COORDS => match serde_json::from_value(payload) {
                Ok(coords) => Some(PartyEvent::MouseCoords(coords)),
                Err(err) => {
                    warn!(event = name, %err, "dropping event with bad payload");
                    None
                }
            },
            _ => None,
        }
    }
}
