//! Engine configuration.
//!
//! Every section deserializes from camelCase JSON with all fields optional;
//! missing fields take the defaults below.
//!
//! ```
//! use neotris_engine::EngineConfig;
//!
//! let config = EngineConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.board.width, 10);
//! assert_eq!(config.timing.input_buffer_capacity, 3);
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    core::Board,
    rules::{CollisionDetector, LevelConfig, LineClearConfig, ScoringConfig},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardConfig {
    pub width: usize,
    pub height: usize,
    pub hidden_rows: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            width: Board::DEFAULT_WIDTH,
            height: Board::DEFAULT_HEIGHT,
            hidden_rows: Board::DEFAULT_HIDDEN_ROWS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    /// Length of one simulation step.
    pub fixed_step_ms: f64,
    /// Steps a single frame may run; older time is discarded.
    pub max_catch_up_steps: u32,
    /// Lock-delay resets allowed per piece while grounded.
    pub max_lock_resets: u32,
    pub input_buffer_capacity: usize,
    pub preview_count: usize,
    /// Preview length once the extended preview is unlocked.
    pub extended_preview_count: usize,
    pub hold_enabled: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fixed_step_ms: 1000.0 / 60.0,
            max_catch_up_steps: 3,
            max_lock_resets: 15,
            input_buffer_capacity: 3,
            preview_count: 3,
            extended_preview_count: 5,
            hold_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub board: BoardConfig,
    pub timing: TimingConfig,
    pub line_clear: LineClearConfig,
    pub level: LevelConfig,
    pub scoring: ScoringConfig,
    pub collision_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            timing: TimingConfig::default(),
            line_clear: LineClearConfig::default(),
            level: LevelConfig::default(),
            scoring: ScoringConfig::default(),
            collision_cache_capacity: CollisionDetector::DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("board must be at least 4 wide and 1 high, got {width}x{height}")]
    BoardTooSmall { width: usize, height: usize },
    #[display("at least 2 hidden rows are needed to spawn pieces, got {_0}")]
    TooFewHiddenRows(#[error(not(source))] usize),
    #[display("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },
    #[display("{name} must be non-zero")]
    Zero { name: &'static str },
    #[display("{name}: minimum {min} exceeds maximum {max}")]
    InvertedRange {
        name: &'static str,
        min: f64,
        max: f64,
    },
    #[display("start level {start} outside 1..={max}")]
    StartLevel { start: u32, max: u32 },
}

impl EngineConfig {
    /// Checks that the configuration describes a playable game.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let board = &self.board;
        if board.width < 4 || board.height == 0 {
            return Err(ConfigError::BoardTooSmall {
                width: board.width,
                height: board.height,
            });
        }
        if board.hidden_rows < 2 {
            return Err(ConfigError::TooFewHiddenRows(board.hidden_rows));
        }

        let timing = &self.timing;
        positive("fixedStepMs", timing.fixed_step_ms)?;
        non_zero("maxCatchUpSteps", timing.max_catch_up_steps as usize)?;
        non_zero("inputBufferCapacity", timing.input_buffer_capacity)?;
        non_zero("collisionCacheCapacity", self.collision_cache_capacity)?;

        let clear = &self.line_clear;
        for (name, value) in [
            ("flashMs", clear.flash_ms),
            ("particleMs", clear.particle_ms),
            ("collapseMs", clear.collapse_ms),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::NotPositive { name, value });
            }
        }

        let level = &self.level;
        non_zero("maxLevel", level.max_level as usize)?;
        non_zero("linesPerLevel", level.lines_per_level as usize)?;
        non_zero("sprintTargetLines", level.sprint_target_lines as usize)?;
        if level.start_level == 0
            || (!level.progression.is_endless() && level.start_level > level.max_level)
        {
            return Err(ConfigError::StartLevel {
                start: level.start_level,
                max: level.max_level,
            });
        }
        positive("minDropIntervalMs", level.min_drop_interval_ms)?;
        ordered(
            "dropInterval",
            level.min_drop_interval_ms,
            level.max_drop_interval_ms,
        )?;
        positive("minLockDelayMs", level.min_lock_delay_ms)?;
        ordered(
            "lockDelay",
            level.min_lock_delay_ms,
            level.base_lock_delay_ms,
        )?;
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

fn non_zero(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::Zero { name })
    } else {
        Ok(())
    }
}

fn ordered(name: &'static str, min: f64, max: f64) -> Result<(), ConfigError> {
    if min <= max {
        Ok(())
    } else {
        Err(ConfigError::InvertedRange { name, min, max })
    }
}
