//! Game orchestration on top of the core data and the rules.
//!
//! - [`GameEngine`] - fixed-timestep loop owning the board and every rule component
//! - [`PieceQueue`] - seeded 7-bag generation plus the hold slot
//! - [`InputBuffer`] - bounded queue of [`InputAction`]s between steps
//! - [`EventBus`] - fan-out of [`GameEvent`]s to isolated listeners
//! - [`GameSnapshot`] - read-only frame for renderers
//!
//! # Game Flow
//!
//! 1. The host calls [`GameEngine::frame`] with its clock; elapsed time runs
//!    as fixed steps, capped so a stall never replays as a burst
//! 2. Each step drains buffered input, applies gravity and the lock delay
//! 3. Locking scores the placement and, when rows are complete, starts the
//!    clear animation; the next piece spawns once it finishes
//! 4. A spawn that collides ends the game
//!
//! # Example
//!
//! ```
//! use neotris_engine::{EngineConfig, GameEngine, GameEvent, InputAction, PieceSeed};
//!
//! let mut engine = GameEngine::with_seed(EngineConfig::default(), PieceSeed::from(7_u64))?;
//! engine.subscribe(|event: &GameEvent| println!("{}", event.name()));
//!
//! engine.frame(0.0);
//! engine.queue_input(InputAction::RotateCw);
//! engine.queue_input(InputAction::HardDrop);
//! engine.frame(50.0);
//!
//! println!("{}", engine.snapshot().visible_rows_ascii().join("\n"));
//! # Ok::<(), neotris_engine::ConfigError>(())
//! ```

pub use self::{events::*, game::*, input::*, piece_queue::*, snapshot::*};

mod events;
mod game;
mod input;
mod piece_queue;
mod snapshot;
