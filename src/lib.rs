//! Deterministic simulation core and authoritative server for a multiplayer
//! 3D arena game
//!
//! The simulation is a pure function of an initial state and a tick-indexed
//! event log: replaying the same events over the same state always produces
//! byte-identical results. The server advances a lagged confirmed timeline
//! and broadcasts snapshots; clients predict ahead with the same code and
//! reconcile when snapshots arrive.

pub mod client;
pub mod config;
pub mod physics;
pub mod protocol;
pub mod server;
pub mod sim;
pub mod util;
pub mod world;
