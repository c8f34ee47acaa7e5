use std::{collections::VecDeque, str::FromStr};

use serde::{Deserialize, Serialize};

/// A player action queued for the next simulation step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "camelCase")]
pub enum InputAction {
    #[display("moveLeft")]
    MoveLeft,
    #[display("moveRight")]
    MoveRight,
    #[display("softDrop")]
    SoftDrop,
    #[display("hardDrop")]
    HardDrop,
    #[display("rotateCw")]
    RotateCw,
    #[display("rotateCcw")]
    RotateCcw,
    #[display("hold")]
    Hold,
    /// Toggles pause.
    #[display("pause")]
    Pause,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown input action {_0:?}")]
pub struct UnknownInputActionError(#[error(not(source))] pub String);

impl FromStr for InputAction {
    type Err = UnknownInputActionError;

    /// Accepts the camelCase names plus short aliases (`left`, `cw`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match s.to_ascii_lowercase().as_str() {
            "moveleft" | "left" => Self::MoveLeft,
            "moveright" | "right" => Self::MoveRight,
            "softdrop" | "soft" | "down" => Self::SoftDrop,
            "harddrop" | "hard" | "drop" => Self::HardDrop,
            "rotatecw" | "cw" => Self::RotateCw,
            "rotateccw" | "ccw" => Self::RotateCcw,
            "hold" => Self::Hold,
            "pause" => Self::Pause,
            _ => return Err(UnknownInputActionError(s.to_owned())),
        };
        Ok(action)
    }
}

/// Bounded FIFO of pending actions.
///
/// When full, pushing drops the oldest action.
#[derive(Debug, Clone)]
pub struct InputBuffer {
    actions: VecDeque<InputAction>,
    capacity: usize,
    dropped: u64,
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl InputBuffer {
    pub const DEFAULT_CAPACITY: usize = 3;

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            actions: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions dropped on overflow so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Queues `action`, returning the action evicted to make room.
    pub fn push(&mut self, action: InputAction) -> Option<InputAction> {
        let evicted = if self.actions.len() == self.capacity {
            let oldest = self.actions.pop_front();
            self.dropped += 1;
            log::debug!("input buffer full, dropped {oldest:?}");
            oldest
        } else {
            None
        };
        self.actions.push_back(action);
        evicted
    }

    pub fn pop(&mut self) -> Option<InputAction> {
        self.actions.pop_front()
    }

    /// Removes and returns the oldest action matching `predicate`, leaving
    /// the others queued in order.
    pub fn take_first(&mut self, predicate: impl Fn(InputAction) -> bool) -> Option<InputAction> {
        let index = self.actions.iter().position(|&action| predicate(action))?;
        self.actions.remove(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = InputAction> + '_ {
        self.actions.iter().copied()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }
}
