//! Fixed-capacity state serialization

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::GameState;
use crate::util::time::Tick;

/// Upper bound for one encoded state or metadata payload. Transport frames
/// are preallocated at this size, so anything larger is a hard error rather
/// than a reallocation.
pub const SNAPSHOT_CAPACITY: usize = 8192;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("encoded payload is {0} bytes, over the {SNAPSHOT_CAPACITY} byte frame capacity")]
    TooLarge(usize),
    #[error("encode failed: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("malformed payload: {0}")]
    Malformed(#[from] bincode::error::DecodeError),
}

/// One authoritative state capture, already encoded for the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: Tick,
    pub bytes: Bytes,
}

pub(crate) fn encode_bounded<T: Serialize>(value: &T) -> Result<Bytes, SnapshotError> {
    let encoded = bincode::serde::encode_to_vec(value, bincode::config::standard())?;
    if encoded.len() > SNAPSHOT_CAPACITY {
        return Err(SnapshotError::TooLarge(encoded.len()));
    }
    Ok(Bytes::from(encoded))
}

pub(crate) fn decode_bounded<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SnapshotError> {
    if bytes.len() > SNAPSHOT_CAPACITY {
        return Err(SnapshotError::TooLarge(bytes.len()));
    }
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(value)
}

pub fn encode_state(state: &GameState, tick: Tick) -> Result<Snapshot, SnapshotError> {
    Ok(Snapshot {
        tick,
        bytes: encode_bounded(state)?,
    })
}

pub fn decode_state(snapshot: &Snapshot) -> Result<GameState, SnapshotError> {
    decode_bounded(&snapshot.bytes)
}
