//! Game rules operating on a borrowed [`Board`](crate::Board).
//!
//! - [`CollisionDetector`] - placement validity, ground/wall probes and T-spin corners
//! - [`RotationSystem`] - SRS rotation with ordered wall kicks
//! - [`LineClearer`] - complete-row detection and the timed clear animation
//! - [`ScoreManager`] - clear classification, combo and back-to-back scoring
//! - [`LevelManager`] - level progression, gravity and lock delay
//!
//! None of these own the board; the engine lends it for each call.

pub use self::{collision::*, level::*, line_clear::*, rotation::*, scoring::*};

mod collision;
mod level;
mod line_clear;
mod rotation;
mod scoring;
