//! World state store: the single boundary between network and rendering.
//!
//! Holds exactly the latest authoritative snapshot. The snapshot
//! handler is the only writer; every inbound `game.state` replaces the
//! whole state atomically — never an incremental patch. Readers get
//! cloned values and must tolerate the player list changing identity
//! on every server tick.
//!
//! Delivery is assumed in-order and lossless at the transport layer;
//! there is no sequence numbering, so a late snapshot would simply
//! overwrite a newer one. Known limitation.

use shared::{Character, GameItem, GameSnapshot};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default, Clone)]
pub struct WorldState {
    pub remain_running_time: f32,
    pub players: Vec<Character>,
    pub map_items: Vec<GameItem>,
}

/// Cloneable handle to the shared world state. Exclusive-write /
/// shared-read; the lock matters only when a rendering host runs
/// readers on another thread.
#[derive(Clone, Default)]
pub struct WorldStore {
    inner: Arc<RwLock<WorldState>>,
}

impl WorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entire world state with `snapshot`. No partial
    /// visibility: readers observe either the previous state or the
    /// new one, never a mix.
    pub fn apply_snapshot(&self, snapshot: GameSnapshot) {
        let mut state = self.write();
        *state = WorldState {
            remain_running_time: snapshot.remain_running_time,
            players: snapshot.characters,
            map_items: snapshot.map_items,
        };
    }

    /// Clears the round state; used on explicit session teardown.
    pub fn clear(&self) {
        *self.write() = WorldState::default();
    }

    pub fn remaining_time(&self) -> f32 {
        self.read().remain_running_time
    }

    pub fn player(&self, id: &str) -> Option<Character> {
        self.read().players.iter().find(|p| p.id == id).cloned()
    }

    pub fn players(&self) -> Vec<Character> {
        self.read().players.clone()
    }

    pub fn player_count(&self) -> usize {
        self.read().players.len()
    }

    pub fn map_items(&self) -> Vec<GameItem> {
        self.read().map_items.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, WorldState> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, WorldState> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
