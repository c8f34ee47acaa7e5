use rand::Rng as _;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::{
    config::{ConfigError, EngineConfig},
    core::{Board, CellState, Piece, PieceCommand, PieceKind, PiecePosition, RotationDirection, catalog},
    rules::{
        ClearPhase, CollisionDetector, DropKind, Feature, LevelManager, LineClearer,
        RotationSystem, ScoreContext, ScoreManager, TSpinKind,
    },
    validate::Validation,
};

use super::{
    events::{EventBus, GameEvent, GameEventListener, ListenerId},
    input::{InputAction, InputBuffer},
    piece_queue::{PieceQueue, PieceSeed},
    snapshot::GameSnapshot,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, derive_more::IsVariant,
)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    #[default]
    Playing,
    /// Clear animation running; piece actions wait in the input buffer.
    LineClearing,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeldPiece {
    pub kind: PieceKind,
    pub color: &'static str,
}

impl From<PieceKind> for HeldPiece {
    fn from(kind: PieceKind) -> Self {
        Self {
            kind,
            color: kind.color(),
        }
    }
}

/// Public view of the game, refreshed after every engine call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub status: GameStatus,
    pub active_piece: Option<Piece>,
    pub held_piece: Option<HeldPiece>,
    pub next_queue: Vec<PieceKind>,
    pub combo: u32,
    pub lines_cleared: u64,
    pub level: u32,
    pub hold_available: bool,
    pub paused: bool,
}

/// Per-piece timers.
#[derive(Debug, Clone, Copy, Default)]
struct PieceTimers {
    drop_ms: f64,
    lock_ms: f64,
    lock_resets: u32,
    grounded: bool,
    // T-spins only count when the last successful action was a rotation.
    rotated_last: bool,
}

/// Fixed-timestep orchestrator of a single game.
///
/// The engine owns the board and every rule component and lends the board to
/// them per call. Hosts feed time through [`frame`](Self::frame) or
/// [`advance`](Self::advance) and actions through
/// [`queue_input`](Self::queue_input); results come out as [`GameEvent`]s
/// and through [`state`](Self::state) and [`snapshot`](Self::snapshot).
///
/// # Example
///
/// ```
/// use neotris_engine::{EngineConfig, GameEngine, GameStatus, InputAction, PieceSeed};
///
/// let mut engine = GameEngine::with_seed(EngineConfig::default(), PieceSeed::from(1_u64))?;
/// engine.step();
/// assert!(engine.state().active_piece.is_some());
///
/// engine.queue_input(InputAction::HardDrop);
/// engine.step();
/// assert_eq!(engine.state().status, GameStatus::Playing);
/// assert!(engine.score().score() > 0);
/// # Ok::<(), neotris_engine::ConfigError>(())
/// ```
#[derive(Debug)]
pub struct GameEngine {
    config: EngineConfig,
    seed: PieceSeed,
    board: Board,
    detector: CollisionDetector,
    rotation: RotationSystem,
    clearer: LineClearer,
    score: ScoreManager,
    level: LevelManager,
    queue: PieceQueue,
    input: InputBuffer,
    events: EventBus,
    garbage_rng: Pcg32,
    state: GameState,
    timers: PieceTimers,
    accumulator_ms: f64,
    last_frame_ms: Option<f64>,
    elapsed_ms: f64,
    steps: u64,
}

const GARBAGE_STREAM: u64 = 1;

impl GameEngine {
    /// Creates an engine with a random seed.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_seed(config, rand::rng().random())
    }

    /// Creates an engine whose piece sequence and garbage holes follow `seed`.
    pub fn with_seed(config: EngineConfig, seed: PieceSeed) -> Result<Self, ConfigError> {
        config.validate()?;
        let board = Board::new(
            config.board.width,
            config.board.height,
            config.board.hidden_rows,
        );
        let level = LevelManager::new(config.level);
        let mut engine = Self {
            seed,
            board,
            detector: CollisionDetector::new(config.collision_cache_capacity),
            rotation: RotationSystem::default(),
            clearer: LineClearer::new(config.line_clear),
            score: ScoreManager::new(config.scoring),
            queue: PieceQueue::with_seed(seed),
            input: InputBuffer::new(config.timing.input_buffer_capacity),
            events: EventBus::default(),
            garbage_rng: seed.rng(GARBAGE_STREAM),
            state: GameState {
                status: GameStatus::Playing,
                active_piece: None,
                held_piece: None,
                next_queue: Vec::new(),
                combo: 0,
                lines_cleared: 0,
                level: level.level(),
                hold_available: config.timing.hold_enabled,
                paused: false,
            },
            level,
            timers: PieceTimers::default(),
            accumulator_ms: 0.0,
            last_frame_ms: None,
            elapsed_ms: 0.0,
            steps: 0,
            config,
        };
        engine.sync_state();
        Ok(engine)
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn seed(&self) -> PieceSeed {
        self.seed
    }

    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    #[must_use]
    pub fn status(&self) -> GameStatus {
        self.state.status
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[must_use]
    pub fn score(&self) -> &ScoreManager {
        &self.score
    }

    #[must_use]
    pub fn level(&self) -> &LevelManager {
        &self.level
    }

    #[must_use]
    pub fn line_clearer(&self) -> &LineClearer {
        &self.clearer
    }

    #[must_use]
    pub fn collision_detector(&self) -> &CollisionDetector {
        &self.detector
    }

    #[must_use]
    pub fn rotation_system(&self) -> &RotationSystem {
        &self.rotation
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[must_use]
    pub fn input(&self) -> &InputBuffer {
        &self.input
    }

    /// Simulation time run so far.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn subscribe(&mut self, listener: impl GameEventListener + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Buffers an action for the next step; the oldest is dropped when full.
    pub fn queue_input(&mut self, action: InputAction) {
        if self.state.status.is_game_over() {
            log::debug!("ignoring {action} after game over");
            return;
        }
        self.input.push(action);
    }

    /// Advances to the host timestamp `now_ms`, returning the steps run.
    ///
    /// The first call only records the timestamp.
    pub fn frame(&mut self, now_ms: f64) -> u32 {
        let delta = self
            .last_frame_ms
            .map_or(0.0, |last| (now_ms - last).max(0.0));
        self.last_frame_ms = Some(now_ms);
        self.advance(delta)
    }

    /// Adds `delta_ms` of real time and runs every fixed step now due.
    ///
    /// At most `max_catch_up_steps` steps run per call; older time is
    /// discarded. While paused, time is not accumulated and only a queued
    /// [`InputAction::Pause`] is looked at.
    pub fn advance(&mut self, delta_ms: f64) -> u32 {
        if self.state.status.is_game_over() {
            return 0;
        }
        if self.state.paused {
            if self.input.take_first(|a| a == InputAction::Pause).is_some() {
                self.resume();
            }
            return 0;
        }

        let step_ms = self.config.timing.fixed_step_ms;
        let budget = step_ms * f64::from(self.config.timing.max_catch_up_steps);
        self.accumulator_ms += delta_ms.max(0.0);
        if self.accumulator_ms > budget {
            log::debug!(
                "discarding {:.1} ms beyond the catch-up budget",
                self.accumulator_ms - budget
            );
            self.accumulator_ms = budget;
        }

        let mut steps = 0;
        while self.accumulator_ms >= step_ms {
            self.accumulator_ms -= step_ms;
            self.update(step_ms);
            steps += 1;
            if self.state.paused || self.state.status.is_game_over() {
                break;
            }
        }
        steps
    }

    /// Runs exactly one fixed step, ignoring the accumulator.
    pub fn step(&mut self) {
        self.update(self.config.timing.fixed_step_ms);
    }

    fn update(&mut self, dt_ms: f64) {
        if self.state.status.is_game_over() {
            return;
        }
        if self.state.paused {
            if self.input.take_first(|a| a == InputAction::Pause).is_some() {
                self.resume();
            }
            return;
        }
        self.steps += 1;
        self.elapsed_ms += dt_ms;

        match self.state.status {
            GameStatus::GameOver => {}
            GameStatus::LineClearing => self.update_line_clear(dt_ms),
            GameStatus::Playing => self.update_playing(dt_ms),
        }
        self.sync_state();
    }

    fn update_line_clear(&mut self, dt_ms: f64) {
        if self.input.take_first(|a| a == InputAction::Pause).is_some() {
            self.pause();
            return;
        }
        if let Some(phase) = self.clearer.update(dt_ms) {
            self.emit(GameEvent::ClearPhaseChanged { phase });
        }
        if self.clearer.phase().is_complete() {
            self.finish_line_clear();
        }
    }

    fn update_playing(&mut self, dt_ms: f64) {
        if self.state.active_piece.is_none() {
            self.spawn_next();
        }
        while let Some(action) = self.input.pop() {
            self.apply_action(action);
            if self.state.paused || !self.state.status.is_playing() {
                return;
            }
        }
        if self.state.active_piece.is_none() {
            return;
        }
        self.apply_gravity(dt_ms);
        self.apply_lock_delay(dt_ms);
    }

    fn apply_gravity(&mut self, dt_ms: f64) {
        let interval = self.level.drop_interval_ms();
        self.timers.drop_ms += dt_ms;
        while self.timers.drop_ms >= interval {
            self.timers.drop_ms -= interval;
            if !self.try_move(PieceCommand::MoveDown) {
                self.timers.drop_ms = 0.0;
                break;
            }
        }
    }

    fn apply_lock_delay(&mut self, dt_ms: f64) {
        let Some(piece) = &self.state.active_piece else {
            return;
        };
        if !self.detector.is_touching_ground(&self.board, piece) {
            self.timers.grounded = false;
            self.timers.lock_ms = 0.0;
            return;
        }
        if !self.timers.grounded {
            self.timers.grounded = true;
            self.timers.lock_ms = 0.0;
        }
        self.timers.lock_ms += dt_ms;
        if self.timers.lock_ms >= self.level.lock_delay_ms() {
            self.lock_piece();
        }
    }

    fn apply_action(&mut self, action: InputAction) {
        match action {
            InputAction::Pause => {
                self.pause();
            }
            InputAction::Hold => self.hold(),
            _ if self.state.active_piece.is_none() => {
                log::debug!("no active piece for {action}");
            }
            InputAction::MoveLeft => {
                if self.try_move(PieceCommand::MoveLeft) {
                    self.reset_lock_delay();
                }
            }
            InputAction::MoveRight => {
                if self.try_move(PieceCommand::MoveRight) {
                    self.reset_lock_delay();
                }
            }
            InputAction::SoftDrop => {
                if self.try_move(PieceCommand::MoveDown) {
                    self.timers.drop_ms = 0.0;
                    let delta = self.score.add_drop_score(1, DropKind::Soft);
                    self.emit_score(delta);
                }
            }
            InputAction::HardDrop => self.hard_drop(),
            InputAction::RotateCw => self.try_rotate(RotationDirection::Clockwise),
            InputAction::RotateCcw => self.try_rotate(RotationDirection::CounterClockwise),
        }
    }

    /// Applies a translation if the target fits.
    fn try_move(&mut self, command: PieceCommand) -> bool {
        let Some(piece) = &self.state.active_piece else {
            return false;
        };
        let moved = piece.apply(command);
        if !self.detector.fits(&self.board, &moved) {
            return false;
        }
        let event = GameEvent::PieceMoved {
            kind: moved.kind(),
            from: piece.position(),
            to: moved.position(),
        };
        self.state.active_piece = Some(moved);
        self.timers.rotated_last = false;
        self.emit(event);
        true
    }

    fn try_rotate(&mut self, direction: RotationDirection) {
        let Some(piece) = &self.state.active_piece else {
            return;
        };
        match self
            .rotation
            .rotate(&self.board, &mut self.detector, piece, direction)
        {
            Ok(outcome) => {
                let event = GameEvent::PieceRotated {
                    kind: outcome.piece.kind(),
                    rotation: outcome.piece.rotation(),
                    wall_kick_used: outcome.wall_kick_used(),
                    kick_offset: outcome.kick_offset,
                };
                self.state.active_piece = Some(outcome.piece);
                self.timers.rotated_last = true;
                self.reset_lock_delay();
                self.emit(event);
            }
            Err(err) => log::debug!("{err}"),
        }
    }

    /// Successful moves and rotations on the ground restart the lock timer,
    /// a bounded number of times per piece.
    fn reset_lock_delay(&mut self) {
        if !self.timers.grounded {
            return;
        }
        if self.timers.lock_resets < self.config.timing.max_lock_resets {
            self.timers.lock_resets += 1;
            self.timers.lock_ms = 0.0;
        }
    }

    fn hard_drop(&mut self) {
        let Some(piece) = &self.state.active_piece else {
            return;
        };
        let target = self.detector.find_drop_position(&self.board, piece);
        let distance = target.y - piece.position().y;
        if distance > 0 {
            let dropped = piece.moved_to(target);
            let event = GameEvent::PieceMoved {
                kind: dropped.kind(),
                from: piece.position(),
                to: target,
            };
            self.state.active_piece = Some(dropped);
            self.timers.rotated_last = false;
            self.emit(event);
            let delta = self
                .score
                .add_drop_score(distance.unsigned_abs(), DropKind::Hard);
            self.emit_score(delta);
        }
        self.lock_piece();
    }

    fn hold(&mut self) {
        if !self.config.timing.hold_enabled {
            log::warn!("hold is disabled");
            return;
        }
        let Some(current) = self.state.active_piece.as_ref().map(Piece::kind) else {
            log::debug!("no active piece to hold");
            return;
        };
        let Some(next) = self.queue.hold(current) else {
            return;
        };
        self.emit(GameEvent::PieceHeld {
            held: current,
            next,
        });
        self.spawn(next);
    }

    fn spawn_position(&self, kind: PieceKind) -> PiecePosition {
        let properties = catalog::properties(kind);
        let width = to_i32(self.board.width());
        let hidden_rows = to_i32(self.board.hidden_rows());
        PiecePosition::new(
            (width - properties.box_width) / 2 + properties.spawn_offset.0,
            hidden_rows - 2 + properties.spawn_offset.1,
        )
    }

    fn spawn_next(&mut self) {
        let kind = self.queue.pop_next();
        self.spawn(kind);
    }

    fn spawn(&mut self, kind: PieceKind) {
        let piece = Piece::new(kind, self.spawn_position(kind));
        self.timers = PieceTimers::default();
        if !self.detector.fits(&self.board, &piece) {
            log::info!("{kind} cannot spawn at {:?}", piece.position());
            self.state.active_piece = None;
            self.game_over();
            return;
        }
        let position = piece.position();
        self.state.active_piece = Some(piece);
        self.emit(GameEvent::PieceSpawned { kind, position });
    }

    fn lock_piece(&mut self) {
        let Some(piece) = self.state.active_piece.take() else {
            return;
        };
        let t_spin = if self.timers.rotated_last {
            self.detector
                .check_t_spin_conditions(&self.board, &piece)
                .kind
        } else {
            TSpinKind::None
        };
        let locked = piece.apply(PieceCommand::Lock);
        self.board.fill_piece(&locked, CellState::Locked);
        self.queue.enable_hold();
        self.emit(GameEvent::PieceLocked {
            kind: locked.kind(),
            position: locked.position(),
            rotation: locked.rotation(),
            t_spin,
        });

        let rows = self.clearer.find_complete_lines(&self.board);
        let context = ScoreContext {
            t_spin,
            perfect_clear: !rows.is_empty() && self.clearer.is_perfect_clear(&self.board, &rows),
        };
        let result = self
            .score
            .add_score(rows.len(), self.level.level(), context);

        if rows.is_empty() {
            self.emit_score(result.total);
            self.spawn_next();
            return;
        }

        self.emit(GameEvent::LinesClear {
            line_count: rows.len(),
            move_type: result.clear_type,
            is_special_move: result.is_special_move,
            cleared_rows: rows.clone(),
            points: result.total,
        });
        self.emit_score(result.total);
        self.apply_level_progress();

        if !self.clearer.mark_lines_for_clearing(&mut self.board, &rows) {
            return;
        }
        self.state.status = GameStatus::LineClearing;
        self.emit(GameEvent::ClearPhaseChanged {
            phase: self.clearer.phase(),
        });
        if self.clearer.phase().is_complete() {
            self.finish_line_clear();
        }
    }

    fn finish_line_clear(&mut self) {
        self.clearer.execute_line_clear(&mut self.board);
        self.state.status = GameStatus::Playing;
        self.emit(GameEvent::ClearPhaseChanged {
            phase: ClearPhase::Idle,
        });
        self.spawn_next();
    }

    fn apply_level_progress(&mut self) {
        let previous = self.level.level();
        let update = self.level.update(self.score.lines());
        if update.levels_gained > 0 {
            self.emit(GameEvent::LevelChanged {
                level: self.level.level(),
                previous,
            });
        }
        for feature in update.unlocked {
            self.emit(GameEvent::FeatureUnlocked {
                feature,
                level: self.level.level(),
            });
        }
        if update.goal_reached {
            self.emit(GameEvent::GoalReached {
                lines: self.level.total_lines(),
            });
        }
    }

    fn game_over(&mut self) {
        self.state.status = GameStatus::GameOver;
        self.state.active_piece = None;
        self.input.clear();
        log::info!(
            "game over: score {}, level {}, lines {}",
            self.score.score(),
            self.level.level(),
            self.score.lines()
        );
        self.emit(GameEvent::GameOver {
            score: self.score.score(),
            level: self.level.level(),
            lines: self.score.lines(),
        });
    }

    /// Freezes the game. Returns `false` if already paused or over.
    pub fn pause(&mut self) -> bool {
        if self.state.paused || self.state.status.is_game_over() {
            return false;
        }
        self.state.paused = true;
        self.emit(GameEvent::Paused);
        true
    }

    /// Continues a paused game where it stopped.
    pub fn resume(&mut self) -> bool {
        if !self.state.paused {
            return false;
        }
        self.state.paused = false;
        // the pause must not be replayed as elapsed time
        self.last_frame_ms = None;
        self.emit(GameEvent::Resumed);
        true
    }

    /// Pushes `count` garbage rows in from the bottom with one random hole.
    ///
    /// The active piece is lifted out of the way when possible; the game is
    /// over when it cannot be, or when blocks were pushed out the top.
    /// Returns `false` when garbage cannot be added right now.
    pub fn add_garbage(&mut self, count: usize) -> bool {
        if count == 0 || !self.state.status.is_playing() {
            log::warn!(
                "cannot add {count} garbage lines while {:?}",
                self.state.status
            );
            return false;
        }
        let hole = self.garbage_rng.random_range(0..self.board.width());
        let overflow = self.board.add_garbage_lines(count, &[hole]);
        self.emit(GameEvent::GarbageAdded {
            lines: count,
            overflow,
        });

        if overflow {
            self.game_over();
        } else if let Some(piece) = self.state.active_piece.take() {
            let lifted = (0..=to_i32(count))
                .map(|dy| piece.moved_to(piece.position().offset(0, -dy)))
                .find(|candidate| self.detector.fits(&self.board, candidate));
            match lifted {
                Some(lifted) => self.state.active_piece = Some(lifted),
                None => self.game_over(),
            }
        }
        self.sync_state();
        true
    }

    /// Landing preview of the active piece.
    #[must_use]
    pub fn ghost_piece(&self) -> Option<Piece> {
        let piece = self.state.active_piece.as_ref()?;
        let mut position = piece.position();
        while CollisionDetector::check_position(&self.board, piece, position.offset(0, 1)) {
            position = position.offset(0, 1);
        }
        Some(piece.moved_to(position))
    }

    /// Starts a new game with the same seed.
    pub fn reset(&mut self) {
        self.reset_with_seed(self.seed);
    }

    pub fn reset_with_seed(&mut self, seed: PieceSeed) {
        self.seed = seed;
        self.board.reset();
        self.detector.clear_cache();
        self.rotation = RotationSystem::default();
        self.clearer.reset();
        self.score.reset();
        self.level.reset();
        self.queue.reset(seed);
        self.input.clear();
        self.garbage_rng = seed.rng(GARBAGE_STREAM);
        self.state.status = GameStatus::Playing;
        self.state.active_piece = None;
        self.state.paused = false;
        self.timers = PieceTimers::default();
        self.accumulator_ms = 0.0;
        self.last_frame_ms = None;
        self.elapsed_ms = 0.0;
        self.steps = 0;
        log::info!("game reset with seed {seed}");
        self.emit(GameEvent::GameReset);
        self.sync_state();
    }

    fn preview_count(&self) -> usize {
        if self.level.is_unlocked(Feature::ExtendedPreview) {
            self.config.timing.extended_preview_count
        } else {
            self.config.timing.preview_count
        }
    }

    fn sync_state(&mut self) {
        self.state.held_piece = self.queue.held_piece().map(HeldPiece::from);
        self.state.next_queue = self.queue.preview(self.preview_count());
        self.state.combo = self.score.combo();
        self.state.lines_cleared = self.score.lines();
        self.state.level = self.level.level();
        self.state.hold_available = self.config.timing.hold_enabled && self.queue.hold_available();
    }

    fn emit(&mut self, event: GameEvent) {
        self.events.emit(&event);
    }

    fn emit_score(&mut self, delta: u64) {
        if delta > 0 {
            self.emit(GameEvent::ScoreChanged {
                score: self.score.score(),
                delta,
            });
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            status: self.state.status,
            paused: self.state.paused,
            board: self.board.clone(),
            active_piece: self.state.active_piece.clone(),
            ghost_piece: self.ghost_piece(),
            held_piece: self.state.held_piece,
            hold_available: self.state.hold_available,
            next_queue: self.state.next_queue.clone(),
            score: self.score.score(),
            level: self.level.level(),
            lines: self.score.lines(),
            combo: self.score.combo(),
            back_to_back: self.score.back_to_back(),
            clear_phase: self.clearer.phase(),
            clear_progress: self.clearer.progress(),
            clearing_rows: self.clearer.rows().to_vec(),
            drop_interval_ms: self.level.drop_interval_ms(),
            lock_delay_ms: self.level.lock_delay_ms(),
            elapsed_ms: self.elapsed_ms,
            steps: self.steps,
        }
    }

    #[must_use]
    pub fn validate(&self) -> Validation {
        let mut validation = Validation::new();
        validation.merge("board", self.board.validate());
        validation.merge("collision", self.detector.validate());
        validation.merge("lineClear", self.clearer.validate());
        validation.merge("score", self.score.validate());
        validation.merge("level", self.level.validate());

        if let Some(piece) = &self.state.active_piece {
            if !CollisionDetector::check_position(&self.board, piece, piece.position()) {
                validation.error(format!(
                    "active {} overlaps the board at {:?}",
                    piece.kind(),
                    piece.position()
                ));
            }
            if !self.state.status.is_playing() {
                validation.error("active piece outside of play");
            }
        }
        if self.state.status.is_line_clearing() != self.clearer.is_animating() {
            validation.error(format!(
                "status {:?} disagrees with clear phase {:?}",
                self.state.status,
                self.clearer.phase()
            ));
        }
        if self.state.level != self.level.level() || self.state.lines_cleared != self.score.lines() {
            validation.error("state counters out of sync");
        }
        if self.state.next_queue.len() != self.preview_count() {
            validation.error("preview length does not match configuration");
        }
        if self.input.len() > self.input.capacity() {
            validation.error("input buffer over capacity");
        }
        validation
    }
}

fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, ops::Range, rc::Rc};

    use crate::{ClearType, ProgressionType, Rotation};

    use super::*;

    fn engine() -> GameEngine {
        GameEngine::with_seed(EngineConfig::default(), PieceSeed::from(5_u64)).unwrap()
    }

    /// Engine with a 10 ms step so timer boundaries land on whole steps.
    fn coarse_engine(configure: impl FnOnce(&mut EngineConfig)) -> GameEngine {
        let mut config = EngineConfig::default();
        config.timing.fixed_step_ms = 10.0;
        configure(&mut config);
        GameEngine::with_seed(config, PieceSeed::from(5_u64)).unwrap()
    }

    fn record(engine: &mut GameEngine) -> Rc<RefCell<Vec<GameEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        engine.subscribe(move |event: &GameEvent| sink.borrow_mut().push(event.clone()));
        events
    }

    fn fill_rows_except(engine: &mut GameEngine, rows: Range<i32>, gap: Range<i32>) {
        for y in rows {
            for x in 0..10 {
                if !gap.contains(&x) {
                    engine.board.set_cell(x, y, CellState::Locked);
                }
            }
        }
    }

    fn set_active(engine: &mut GameEngine, piece: Piece) {
        engine.timers = PieceTimers::default();
        engine.state.active_piece = Some(piece);
    }

    fn vertical_i() -> Piece {
        // the left state occupies column 1 of its box
        Piece::with_rotation(PieceKind::I, Rotation::LEFT, PiecePosition::new(-1, 10))
    }

    /// T slot at columns 3..6 of the bottom two rows, covered at (3, 21).
    fn t_slot(engine: &mut GameEngine) {
        fill_rows_except(engine, 23..24, 4..5);
        fill_rows_except(engine, 22..23, 3..6);
        engine.board.set_cell(3, 21, CellState::Locked);
    }

    #[test]
    fn test_first_step_spawns() {
        let mut engine = engine();
        let events = record(&mut engine);
        assert!(engine.state().active_piece.is_none());
        engine.step();

        let piece = engine.state().active_piece.clone().unwrap();
        assert_eq!(piece.position(), engine.spawn_position(piece.kind()));
        assert_eq!(engine.state().next_queue.len(), 3);
        assert!(matches!(
            events.borrow()[0],
            GameEvent::PieceSpawned { kind, .. } if kind == piece.kind()
        ));
        assert!(engine.validate().valid, "{:?}", engine.validate().errors);
    }

    #[test]
    fn test_spawn_positions() {
        let engine = engine();
        assert_eq!(engine.spawn_position(PieceKind::T), PiecePosition::new(3, 2));
        assert_eq!(engine.spawn_position(PieceKind::I), PiecePosition::new(3, 1));
        assert_eq!(engine.spawn_position(PieceKind::O), PiecePosition::new(4, 2));
    }

    #[test]
    fn test_gravity_moves_piece_down() {
        let mut engine = coarse_engine(|_| {});
        engine.step();
        let start = engine.state().active_piece.as_ref().unwrap().position();
        // level 1 gravity is 800 ms; the spawning step already counted 10
        for _ in 0..78 {
            engine.step();
        }
        let piece = engine.state().active_piece.as_ref().unwrap();
        assert_eq!(piece.position(), start);
        engine.step();
        engine.step();
        let piece = engine.state().active_piece.as_ref().unwrap();
        assert_eq!(piece.position(), start.offset(0, 1));
    }

    #[test]
    fn test_hard_drop_locks_and_scores() {
        let mut engine = engine();
        engine.step();
        let piece = engine.state().active_piece.clone().unwrap();
        let target = engine.ghost_piece().unwrap().position();
        engine.queue_input(InputAction::HardDrop);
        engine.step();

        let distance = u64::try_from(target.y - piece.position().y).unwrap();
        assert_eq!(engine.score().score(), 2 * distance);
        let landed = piece.moved_to(target);
        assert!(landed.cells().all(|(x, y)| engine.board().cell(x, y) == CellState::Locked));
        let next = engine.state().active_piece.as_ref().unwrap();
        assert_eq!(next.position(), engine.spawn_position(next.kind()));
        assert!(engine.validate().valid, "{:?}", engine.validate().errors);
    }

    #[test]
    fn test_soft_drop_scores_per_cell() {
        let mut engine = engine();
        engine.step();
        let start = engine.state().active_piece.as_ref().unwrap().position();
        engine.queue_input(InputAction::SoftDrop);
        engine.queue_input(InputAction::SoftDrop);
        engine.step();
        let piece = engine.state().active_piece.as_ref().unwrap();
        assert_eq!(piece.position(), start.offset(0, 2));
        assert_eq!(engine.score().score(), 2);
    }

    #[test]
    fn test_lock_delay_expires_on_ground() {
        let mut engine = coarse_engine(|_| {});
        engine.step();
        let ground = engine.ghost_piece().unwrap();
        set_active(&mut engine, ground.clone());

        // 500 ms at level 1
        for _ in 0..49 {
            engine.step();
            assert_eq!(engine.state().active_piece.as_ref(), Some(&ground));
        }
        engine.step();
        assert_ne!(engine.state().active_piece.as_ref(), Some(&ground));
        assert!(ground.cells().all(|(x, y)| engine.board().cell(x, y) == CellState::Locked));
    }

    #[test]
    fn test_lock_resets_are_bounded() {
        let mut engine = coarse_engine(|config| config.timing.max_lock_resets = 2);
        engine.step();
        set_active(&mut engine, Piece::new(PieceKind::O, PiecePosition::new(4, 22)));

        let mut locked_at = None;
        for i in 0..200 {
            if i % 40 == 20 {
                let action = if (i / 40) % 2 == 0 {
                    InputAction::MoveLeft
                } else {
                    InputAction::MoveRight
                };
                engine.queue_input(action);
            }
            engine.step();
            let grounded_o = engine
                .state()
                .active_piece
                .as_ref()
                .is_some_and(|p| p.position().y == 22);
            if !grounded_o {
                locked_at = Some(i);
                break;
            }
        }
        // resets at steps 20 and 60; the move at step 100 no longer resets
        assert_eq!(locked_at, Some(109));
    }

    #[test]
    fn test_line_clear_cycle() {
        let mut engine = coarse_engine(|_| {});
        let events = record(&mut engine);
        engine.step();
        fill_rows_except(&mut engine, 20..24, 0..1);
        set_active(&mut engine, vertical_i());
        engine.queue_input(InputAction::HardDrop);
        engine.step();

        assert_eq!(engine.status(), GameStatus::LineClearing);
        assert!(engine.state().active_piece.is_none());
        assert_eq!(engine.score().lines(), 4);
        assert_eq!(engine.board().cell(5, 23), CellState::Clearing);
        assert!(engine.score().back_to_back());
        assert!(engine.validate().valid, "{:?}", engine.validate().errors);
        assert!(events.borrow().iter().any(|e| matches!(
            e,
            GameEvent::LinesClear { line_count: 4, cleared_rows, is_special_move: true, .. }
                if cleared_rows == &[20, 21, 22, 23]
        )));

        // piece actions wait in the buffer during the 400 ms animation
        engine.queue_input(InputAction::MoveLeft);
        for _ in 0..39 {
            engine.step();
            assert_eq!(engine.status(), GameStatus::LineClearing);
        }
        assert_eq!(engine.input().len(), 1);
        engine.step();
        assert_eq!(engine.status(), GameStatus::Playing);
        assert!(engine.board().is_row_empty(23));
        assert!(engine.state().active_piece.is_some());

        let phases: Vec<ClearPhase> = events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                GameEvent::ClearPhaseChanged { phase } => Some(*phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            [
                ClearPhase::Flash,
                ClearPhase::ParticleBurst,
                ClearPhase::Collapse,
                ClearPhase::Complete,
                ClearPhase::Idle
            ]
        );
    }

    #[test]
    fn test_zero_line_lock_resets_combo() {
        let mut engine = coarse_engine(|_| {});
        engine.step();
        fill_rows_except(&mut engine, 23..24, 0..1);
        set_active(&mut engine, vertical_i());
        engine.queue_input(InputAction::HardDrop);
        engine.step();
        while engine.status().is_line_clearing() {
            engine.step();
        }
        assert_eq!(engine.score().combo(), 1);

        engine.queue_input(InputAction::HardDrop);
        engine.step();
        assert_eq!(engine.score().combo(), 0);
        assert_eq!(engine.state().combo, 0);
    }

    #[test]
    fn test_hold_once_per_spawn() {
        let mut engine = engine();
        let events = record(&mut engine);
        engine.step();
        let first = engine.state().active_piece.as_ref().unwrap().kind();
        let upcoming = engine.state().next_queue[0];

        engine.queue_input(InputAction::Hold);
        engine.step();
        assert_eq!(engine.state().held_piece.map(|h| h.kind), Some(first));
        assert_eq!(engine.state().active_piece.as_ref().unwrap().kind(), upcoming);
        assert!(!engine.state().hold_available);

        engine.queue_input(InputAction::Hold);
        engine.step();
        assert_eq!(engine.state().active_piece.as_ref().unwrap().kind(), upcoming);
        let holds = events
            .borrow()
            .iter()
            .filter(|e| matches!(e, GameEvent::PieceHeld { .. }))
            .count();
        assert_eq!(holds, 1);

        engine.queue_input(InputAction::HardDrop);
        engine.step();
        assert!(engine.state().hold_available);
        engine.queue_input(InputAction::Hold);
        engine.step();
        assert_eq!(engine.state().active_piece.as_ref().unwrap().kind(), first);
    }

    #[test]
    fn test_hold_disabled() {
        let mut config = EngineConfig::default();
        config.timing.hold_enabled = false;
        let mut engine = GameEngine::with_seed(config, PieceSeed::from(5_u64)).unwrap();
        let events = record(&mut engine);
        engine.step();
        let active = engine.state().active_piece.clone();
        assert!(!engine.state().hold_available);
        engine.queue_input(InputAction::Hold);
        engine.step();
        assert_eq!(engine.state().active_piece, active);
        assert!(engine.state().held_piece.is_none());
        assert!(!events.borrow().iter().any(|e| matches!(e, GameEvent::PieceHeld { .. })));
    }

    #[test]
    fn test_wall_kick_reported() {
        let mut engine = engine();
        let events = record(&mut engine);
        engine.step();
        set_active(
            &mut engine,
            Piece::with_rotation(PieceKind::T, Rotation::RIGHT, PiecePosition::new(-1, 10)),
        );
        engine.queue_input(InputAction::RotateCcw);
        engine.step();
        let piece = engine.state().active_piece.as_ref().unwrap();
        assert_eq!(piece.rotation(), Rotation::SPAWN);
        assert_eq!(piece.position().x, 0);
        assert!(events.borrow().iter().any(|e| matches!(
            e,
            GameEvent::PieceRotated { wall_kick_used: true, kick_offset: (1, 0), .. }
        )));
    }

    #[test]
    fn test_rotation_into_slot_scores_t_spin() {
        let mut engine = engine();
        let events = record(&mut engine);
        engine.step();
        t_slot(&mut engine);
        set_active(
            &mut engine,
            Piece::new(PieceKind::T, PiecePosition::new(3, 21)),
        );
        engine.queue_input(InputAction::RotateCw);
        engine.queue_input(InputAction::RotateCw);
        engine.queue_input(InputAction::HardDrop);
        engine.step();

        assert!(events.borrow().iter().any(|e| matches!(
            e,
            GameEvent::PieceLocked { t_spin: TSpinKind::Full, rotation: Rotation::REVERSE, .. }
        )));
        assert!(events.borrow().iter().any(|e| matches!(
            e,
            GameEvent::LinesClear { line_count: 2, move_type: Some(ClearType::TSpinDouble), .. }
        )));
    }

    #[test]
    fn test_translated_t_is_not_a_t_spin() {
        let mut engine = engine();
        let events = record(&mut engine);
        engine.step();
        t_slot(&mut engine);
        let slot = Piece::with_rotation(PieceKind::T, Rotation::REVERSE, PiecePosition::new(3, 21));
        assert_eq!(
            engine.detector.check_t_spin_conditions(&engine.board, &slot).filled_corners,
            3
        );
        set_active(&mut engine, slot);
        engine.queue_input(InputAction::HardDrop);
        engine.step();

        assert!(events.borrow().iter().any(|e| matches!(
            e,
            GameEvent::PieceLocked { t_spin: TSpinKind::None, .. }
        )));
        assert!(events.borrow().iter().any(|e| matches!(
            e,
            GameEvent::LinesClear { line_count: 2, move_type: Some(ClearType::Double), .. }
        )));
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut engine = engine();
        let events = record(&mut engine);
        engine.step();
        let piece = engine.state().active_piece.clone();
        assert!(engine.pause());
        assert!(!engine.pause());
        assert_eq!(engine.advance(10_000.0), 0);
        assert_eq!(engine.state().active_piece, piece);

        engine.queue_input(InputAction::Pause);
        engine.advance(0.0);
        assert!(!engine.is_paused());
        assert_eq!(engine.advance(20.0), 1);
        let toggles: Vec<&str> = events
            .borrow()
            .iter()
            .map(GameEvent::name)
            .filter(|name| matches!(*name, "paused" | "resumed"))
            .collect();
        assert_eq!(toggles, ["paused", "resumed"]);
    }

    #[test]
    fn test_catch_up_is_capped() {
        let mut engine = coarse_engine(|_| {});
        assert_eq!(engine.advance(5_000.0), 3);
        assert_eq!(engine.steps(), 3);
        assert_eq!(engine.advance(5.0), 0);
        assert_eq!(engine.advance(5.0), 1);
    }

    #[test]
    fn test_frame_uses_timestamps() {
        let mut engine = coarse_engine(|_| {});
        assert_eq!(engine.frame(1_000.0), 0);
        assert_eq!(engine.frame(1_025.0), 2);
        assert_eq!(engine.frame(900.0), 0);
        assert_eq!(engine.frame(905.0), 1);
    }

    #[test]
    fn test_game_over_on_blocked_spawn() {
        let mut engine = engine();
        let events = record(&mut engine);
        fill_rows_except(&mut engine, 2..4, 9..10);
        engine.step();
        assert_eq!(engine.status(), GameStatus::GameOver);
        assert!(engine.state().active_piece.is_none());
        assert!(matches!(
            events.borrow().last(),
            Some(GameEvent::GameOver { score: 0, level: 1, lines: 0 })
        ));
        engine.queue_input(InputAction::HardDrop);
        assert!(engine.input().is_empty());
        assert_eq!(engine.advance(1000.0), 0);
        assert!(engine.validate().valid, "{:?}", engine.validate().errors);
    }

    #[test]
    fn test_garbage_lifts_active_piece() {
        let mut engine = engine();
        let events = record(&mut engine);
        engine.step();
        let ground = engine.ghost_piece().unwrap();
        set_active(&mut engine, ground.clone());
        assert!(engine.add_garbage(2));

        let lifted = engine.state().active_piece.as_ref().unwrap();
        assert_eq!(lifted.position(), ground.position().offset(0, -2));
        assert_eq!(engine.board().stats().garbage_lines, 2);
        assert!(events.borrow().iter().any(|e| matches!(
            e,
            GameEvent::GarbageAdded { lines: 2, overflow: false }
        )));
        assert!(engine.validate().valid, "{:?}", engine.validate().errors);
    }

    #[test]
    fn test_garbage_overflow_ends_game() {
        let mut engine = engine();
        engine.step();
        engine.board.set_cell(0, 0, CellState::Locked);
        assert!(engine.add_garbage(1));
        assert_eq!(engine.status(), GameStatus::GameOver);
        assert!(engine.state().active_piece.is_none());
        assert!(!engine.add_garbage(1));
    }

    #[test]
    fn test_reset_replays_same_sequence() {
        fn play(engine: &mut GameEngine) -> Vec<PieceKind> {
            (0..5)
                .map(|_| {
                    engine.step();
                    let kind = engine.state().active_piece.as_ref().unwrap().kind();
                    engine.queue_input(InputAction::HardDrop);
                    engine.step();
                    kind
                })
                .collect()
        }

        let mut engine = engine();
        let first = play(&mut engine);
        engine.reset();
        assert_eq!(engine.score().score(), 0);
        assert!(engine.board().highest_occupied_row().is_none());
        assert_eq!(play(&mut engine), first);
    }

    #[test]
    fn test_sprint_goal_event() {
        let mut engine = coarse_engine(|config| {
            config.level.progression = ProgressionType::Sprint;
            config.level.sprint_target_lines = 1;
        });
        let events = record(&mut engine);
        engine.step();
        fill_rows_except(&mut engine, 23..24, 0..1);
        set_active(&mut engine, vertical_i());
        engine.queue_input(InputAction::HardDrop);
        engine.step();
        assert!(events.borrow().iter().any(|e| matches!(e, GameEvent::GoalReached { lines: 1 })));
        assert!(engine.level().is_goal_reached());
    }

    #[test]
    fn test_snapshot() {
        let mut engine = engine();
        engine.step();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.level, 1);
        assert_eq!(snapshot.next_queue.len(), 3);
        assert_eq!(snapshot.clear_phase, ClearPhase::Idle);
        assert!((snapshot.drop_interval_ms - 800.0).abs() < 0.5);

        let rows = snapshot.visible_rows_ascii();
        assert_eq!(rows.len(), 20);
        assert!(rows.last().unwrap().contains('+'));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "playing");
        assert_eq!(json["board"]["hiddenRows"], 4);
        assert_eq!(json["nextQueue"].as_array().map(Vec::len), Some(3));
    }
}
