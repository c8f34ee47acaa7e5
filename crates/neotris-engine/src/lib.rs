//! Simulation core of a falling-block puzzle game.
//!
//! The crate is headless: it owns no window, clock or audio. Hosts drive a
//! [`GameEngine`] with timestamps and [`InputAction`]s and render from
//! [`GameSnapshot`]s and [`GameEvent`]s.

pub use self::{config::*, core::*, engine::*, rules::*, validate::Validation};

pub mod config;
pub mod core;
pub mod engine;
pub mod rules;
mod validate;
