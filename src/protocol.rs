//! Wire message definitions for client-server communication

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::sim::{InputFrame, PlayerId};
use crate::util::time::Tick;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// One tick of input, stamped with the client's estimated server tick
    Input { tick: Tick, frame: InputFrame },

    /// Change the player's display name
    SetName { name: String },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once after connecting
    Welcome {
        player_id: PlayerId,
        /// Current server tick, for initial clock sync
        tick: Tick,
    },

    /// Authoritative state capture, encoded with the snapshot codec
    Snapshot { tick: Tick, bytes: Bytes },

    /// Encoded match metadata: player names and terrain
    Metadata { bytes: Bytes },

    /// Periodic tick announcement for clock drift correction
    Tick { tick: Tick },

    /// Reply to a ping, echoing the client timestamp
    Pong { t: u64 },
}
