//! Wire protocol: the frame codec, typed events, and the handshake session.

pub mod events;
pub mod frame;
pub mod session;

pub use events::{MouseCoords, PartyEvent, PeerRef, SelfJoined};
pub use frame::{decode_frame, encode_event, ControlSignal, Frame};
pub use session::{Session, SessionState, Step, TransportEvent};
