//! Slow-changing match context, broadcast on its own cadence

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::physics::Heightfield;
use crate::sim::snapshot::{decode_bounded, encode_bounded, SnapshotError};
use crate::sim::PlayerId;

/// Everything clients need that is not part of the replayed state: display
/// names and the terrain heightfield. Terrain is fixed for the lifetime of a
/// match; names change rarely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    player_names: BTreeMap<PlayerId, String>,
    terrain: Heightfield,
}

impl Metadata {
    pub fn new(terrain: Heightfield) -> Self {
        Self {
            player_names: BTreeMap::new(),
            terrain,
        }
    }

    pub fn terrain(&self) -> &Heightfield {
        &self.terrain
    }

    pub fn set_player_name(&mut self, player_id: PlayerId, name: String) {
        self.player_names.insert(player_id, name);
    }

    pub fn remove_player_name(&mut self, player_id: PlayerId) {
        self.player_names.remove(&player_id);
    }

    pub fn player_name(&self, player_id: PlayerId) -> Option<&str> {
        self.player_names.get(&player_id).map(String::as_str)
    }

    pub fn encode(&self) -> Result<Bytes, SnapshotError> {
        encode_bounded(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        decode_bounded(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_the_wire_encoding() {
        let mut metadata = Metadata::new(Heightfield::flat(0.0, 4, 4, 10.0));
        metadata.set_player_name(3, "ada".into());
        metadata.set_player_name(8, "grace".into());
        metadata.remove_player_name(3);

        let restored = Metadata::decode(&metadata.encode().unwrap()).unwrap();
        assert_eq!(restored, metadata);
        assert_eq!(restored.player_name(8), Some("grace"));
        assert_eq!(restored.player_name(3), None);
    }
}
