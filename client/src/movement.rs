//! Movement reconciliation: dead-zone thresholding plus a
//! cooldown-gated special action.
//!
//! Sampled once per render tick. The baseline is the last-transmitted
//! position and slides forward after every send, so deltas are always
//! measured against what the server last heard, not a fixed reference.

use log::debug;
use shared::{Character, MovementSample, Vec3, POSITION_THRESHOLD, SPECIAL_ACTION_COOLDOWN_MS};
use std::time::{Duration, Instant};

pub struct MovementTracker {
    baseline: Option<Vec3>,
    cooldown_until: Option<Instant>,
}

impl MovementTracker {
    pub fn new() -> Self {
        Self {
            baseline: None,
            cooldown_until: None,
        }
    }

    /// Clears the reconciliation baseline so the next tick
    /// re-initializes instead of computing a delta across a
    /// disconnection gap. The special-action cooldown deadline is
    /// wall-clock and survives the reset, keeping the emission
    /// invariant intact across reconnects.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    /// Samples one tick of local state. Returns a sample to transmit,
    /// or `None` when the movement is inside the dead zone and no
    /// special action is requested.
    ///
    /// The very first tick only records the baseline — a spurious
    /// zero-delta "movement" must never go out on the first frame.
    pub fn tick(
        &mut self,
        character: &Character,
        special_requested: bool,
        now: Instant,
    ) -> Option<MovementSample> {
        let baseline = match self.baseline {
            Some(baseline) => baseline,
            None => {
                self.baseline = Some(character.position);
                return None;
            }
        };

        let moved = character
            .position
            .exceeds_threshold(&baseline, POSITION_THRESHOLD);
        // Special actions always transmit: they may fire while stationary.
        if !moved && !special_requested {
            return None;
        }

        let cooling = self.cooldown_until.is_some_and(|until| now < until);
        let shift = special_requested && !cooling;
        if shift {
            self.cooldown_until =
                Some(now + Duration::from_millis(SPECIAL_ACTION_COOLDOWN_MS));
            debug!("special action fired, cooldown armed");
        }

        self.baseline = Some(character.position);
        Some(MovementSample {
            character: character.clone(),
            shift,
        })
    }
}

impl Default for MovementTracker {
    fn default() -> Self {
        Self::new()
    }
}
