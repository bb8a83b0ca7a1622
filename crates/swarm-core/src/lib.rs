//! Core of the cursor swarm: wire protocol + handshake session, peer
//! registry, hypercube geometry, and the per-tick motion engine.
//!
//! The crate owns no sockets or timers beyond its own session loop; the
//! runner binary supplies the transport and drives the animation ticks.

pub mod config;
pub mod geometry;
pub mod motion;
pub mod peers;
pub mod pose;
pub mod protocol;
