//! Combination builder.
//!
//! Holds the five slots being filled for the current round. Before a match
//! the same builder is used to pick the player's own secret.

use crate::state::protocol::{is_complete, Colour, Combination, COMBINATION_LEN, EMPTY_COMBINATION};

/// Why a submission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("combination has empty slots")]
    Incomplete,
    #[error("already submitted this round")]
    AlreadySubmitted,
    #[error("no round is active")]
    NotInRound,
}

#[derive(Debug, Clone, Default)]
pub struct CombinationBuilder {
    slots: Combination,
    submitted: bool,
}

impl CombinationBuilder {
    pub fn new() -> Self {
        Self {
            slots: EMPTY_COMBINATION,
            submitted: false,
        }
    }

    pub fn slots(&self) -> &Combination {
        &self.slots
    }

    /// Copy of the current slots.
    pub fn snapshot(&self) -> Combination {
        self.slots
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn is_complete(&self) -> bool {
        is_complete(&self.slots)
    }

    /// Apply a placement event from the input surface.
    ///
    /// Out-of-range slots and colour ids outside 1..=8 are ignored. Returns
    /// whether the slot changed hands.
    pub fn place(&mut self, slot: usize, colour_id: u8) -> bool {
        match Colour::from_id(colour_id) {
            Some(colour) => self.place_colour(slot, colour),
            None => false,
        }
    }

    pub fn place_colour(&mut self, slot: usize, colour: Colour) -> bool {
        if slot >= COMBINATION_LEN || !colour.is_set() {
            return false;
        }
        self.slots[slot] = colour;
        true
    }

    pub fn clear(&mut self) {
        self.slots = EMPTY_COMBINATION;
    }

    /// Player-initiated submission.
    ///
    /// Refuses incomplete combinations. On success returns the frozen
    /// snapshot and resets the slots for the next round.
    pub fn submit(&mut self) -> Result<Combination, SubmitError> {
        if self.submitted {
            return Err(SubmitError::AlreadySubmitted);
        }
        if !self.is_complete() {
            return Err(SubmitError::Incomplete);
        }
        Ok(self.take())
    }

    /// Submission without player action (timeout or server directive).
    ///
    /// Sends whatever is in the slots, empty ones included. Returns `None`
    /// if this round was already submitted.
    pub fn force_submit(&mut self) -> Option<Combination> {
        if self.submitted {
            return None;
        }
        Some(self.take())
    }

    /// Reopen for a new round. The slots are left as they are.
    pub fn reset_round(&mut self) {
        self.submitted = false;
    }

    fn take(&mut self) -> Combination {
        let snapshot = self.snapshot();
        self.slots = EMPTY_COMBINATION;
        self.submitted = true;
        snapshot
    }
}
