use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::validate::Validation;

/// Policy deciding how many lines a level takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(rename_all = "camelCase")]
pub enum ProgressionType {
    /// Fixed `lines_per_level`.
    #[default]
    Classic,
    /// `5 × level` lines per level.
    Modern,
    /// `lines_per_level` scaled down for players clearing many lines at once.
    Adaptive,
    /// A single line target; the level never changes.
    Sprint,
    /// Classic requirement without a level cap.
    Endless,
}

/// Mapping from level to gravity interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpeedCurve {
    /// NES frame table.
    #[default]
    Classic,
    Linear,
    Exponential,
    Stepped,
    Smooth,
}

/// Gameplay feature unlocked on reaching a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    /// Next-queue preview grows to five pieces.
    #[display("extended preview")]
    ExtendedPreview,
    #[display("speed tier")]
    SpeedTier,
    #[display("master gravity")]
    MasterGravity,
}

impl Feature {
    pub const MILESTONES: [(u32, Feature); 3] = [
        (5, Feature::ExtendedPreview),
        (10, Feature::SpeedTier),
        (20, Feature::MasterGravity),
    ];

    #[must_use]
    pub fn unlock_level(self) -> u32 {
        match self {
            Feature::ExtendedPreview => 5,
            Feature::SpeedTier => 10,
            Feature::MasterGravity => 20,
        }
    }
}

const FRAME_MS: f64 = 1000.0 / 60.0;

// Frames per row on the NES, levels 1..=29.
const CLASSIC_FRAMES: [u8; 29] = [
    48, 43, 38, 33, 28, 23, 18, 13, 8, 6, 5, 5, 5, 4, 4, 4, 3, 3, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
];

// (first level, interval in ms)
const STEPPED_INTERVALS: [(u32, f64); 7] = [
    (1, 1000.0),
    (5, 750.0),
    (10, 500.0),
    (15, 300.0),
    (20, 150.0),
    (25, 80.0),
    (29, 40.0),
];

const EXPONENTIAL_DECAY: f64 = 0.85;
const SMOOTH_LEVEL_SCALE: f64 = 5.0;
const ADAPTIVE_WINDOW: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LevelConfig {
    pub progression: ProgressionType,
    pub speed_curve: SpeedCurve,
    pub start_level: u32,
    pub max_level: u32,
    pub lines_per_level: u32,
    pub sprint_target_lines: u32,
    pub min_drop_interval_ms: f64,
    pub max_drop_interval_ms: f64,
    pub base_lock_delay_ms: f64,
    pub min_lock_delay_ms: f64,
    pub lock_delay_step_ms: f64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            progression: ProgressionType::Classic,
            speed_curve: SpeedCurve::Classic,
            start_level: 1,
            max_level: 29,
            lines_per_level: 10,
            sprint_target_lines: 40,
            min_drop_interval_ms: FRAME_MS,
            max_drop_interval_ms: 1000.0,
            base_lock_delay_ms: 500.0,
            min_lock_delay_ms: 200.0,
            lock_delay_step_ms: 20.0,
        }
    }
}

impl LevelConfig {
    fn has_level_cap(&self) -> bool {
        !self.progression.is_endless()
    }
}

/// Result of feeding a new line total to [`LevelManager::update`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LevelUpdate {
    pub levels_gained: u32,
    pub unlocked: Vec<Feature>,
    /// Set on the update that first meets the sprint target.
    pub goal_reached: bool,
}

/// Maps cleared lines to a level and a level to gravity and lock delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "LevelRecord", try_from = "LevelRecord")]
pub struct LevelManager {
    config: LevelConfig,
    level: u32,
    total_lines: u64,
    lines_at_level: u64,
    recent_clears: VecDeque<u32>,
    unlocked: Vec<Feature>,
    goal_reached: bool,
    drop_interval_ms: f64,
    lock_delay_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelRecord {
    pub level: u32,
    pub total_lines: u64,
    pub lines_at_level: u64,
    #[serde(default)]
    pub recent_clears: Vec<u32>,
    #[serde(default)]
    pub unlocked_features: Vec<Feature>,
    #[serde(default)]
    pub goal_reached: bool,
    #[serde(default)]
    pub config: LevelConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum LevelRecordError {
    #[display("level {level} outside 1..={max_level}")]
    LevelOutOfRange { level: u32, max_level: u32 },
    #[display("{lines_at_level} lines at the current level exceed the total of {total_lines}")]
    LinesExceedTotal { lines_at_level: u64, total_lines: u64 },
}

impl From<LevelManager> for LevelRecord {
    fn from(manager: LevelManager) -> Self {
        Self {
            level: manager.level,
            total_lines: manager.total_lines,
            lines_at_level: manager.lines_at_level,
            recent_clears: manager.recent_clears.into(),
            unlocked_features: manager.unlocked,
            goal_reached: manager.goal_reached,
            config: manager.config,
        }
    }
}

impl TryFrom<LevelRecord> for LevelManager {
    type Error = LevelRecordError;

    fn try_from(record: LevelRecord) -> Result<Self, Self::Error> {
        let config = record.config;
        if record.level == 0 || (config.has_level_cap() && record.level > config.max_level) {
            return Err(LevelRecordError::LevelOutOfRange {
                level: record.level,
                max_level: config.max_level,
            });
        }
        if record.lines_at_level > record.total_lines {
            return Err(LevelRecordError::LinesExceedTotal {
                lines_at_level: record.lines_at_level,
                total_lines: record.total_lines,
            });
        }
        let mut manager = Self::new(config);
        manager.level = record.level;
        manager.total_lines = record.total_lines;
        manager.lines_at_level = record.lines_at_level;
        manager.recent_clears = record.recent_clears.into_iter().collect();
        manager.unlocked = record.unlocked_features;
        manager.goal_reached = record.goal_reached;
        manager.refresh_timings();
        Ok(manager)
    }
}

impl Default for LevelManager {
    fn default() -> Self {
        Self::new(LevelConfig::default())
    }
}

impl LevelManager {
    #[must_use]
    pub fn new(config: LevelConfig) -> Self {
        let level = if config.has_level_cap() {
            config.start_level.clamp(1, config.max_level.max(1))
        } else {
            config.start_level.max(1)
        };
        let mut manager = Self {
            config,
            level,
            total_lines: 0,
            lines_at_level: 0,
            recent_clears: VecDeque::with_capacity(ADAPTIVE_WINDOW),
            unlocked: Feature::MILESTONES
                .iter()
                .filter(|(at, _)| *at <= level)
                .map(|&(_, feature)| feature)
                .collect(),
            goal_reached: false,
            drop_interval_ms: 0.0,
            lock_delay_ms: 0.0,
        };
        manager.refresh_timings();
        manager
    }

    #[must_use]
    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }

    #[must_use]
    pub fn drop_interval_ms(&self) -> f64 {
        self.drop_interval_ms
    }

    #[must_use]
    pub fn lock_delay_ms(&self) -> f64 {
        self.lock_delay_ms
    }

    #[must_use]
    pub fn unlocked_features(&self) -> &[Feature] {
        &self.unlocked
    }

    #[must_use]
    pub fn is_unlocked(&self, feature: Feature) -> bool {
        self.unlocked.contains(&feature)
    }

    #[must_use]
    pub fn is_goal_reached(&self) -> bool {
        self.goal_reached
    }

    /// Rolling performance score used by [`ProgressionType::Adaptive`].
    ///
    /// Mean of `lines / 2` over the last clears, clamped to `0.5..=2.0`.
    #[must_use]
    pub fn performance(&self) -> f64 {
        if self.recent_clears.is_empty() {
            return 1.0;
        }
        let sum: f64 = self
            .recent_clears
            .iter()
            .map(|&lines| f64::from(lines) / 2.0)
            .sum();
        #[expect(clippy::cast_precision_loss)]
        let mean = sum / self.recent_clears.len() as f64;
        mean.clamp(0.5, 2.0)
    }

    /// Lines needed to leave `level`.
    #[must_use]
    pub fn calculate_lines_required(&self, level: u32) -> u64 {
        let lines_per_level = u64::from(self.config.lines_per_level.max(1));
        match self.config.progression {
            ProgressionType::Classic | ProgressionType::Endless => lines_per_level,
            ProgressionType::Modern => 5 * u64::from(level.max(1)),
            ProgressionType::Adaptive => {
                #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let required = (lines_per_level as f64 / self.performance()).ceil() as u64;
                required.max(1)
            }
            ProgressionType::Sprint => u64::from(self.config.sprint_target_lines.max(1)),
        }
    }

    /// Gravity interval at `level`, clamped to the configured range.
    #[must_use]
    pub fn calculate_drop_interval(&self, level: u32) -> f64 {
        let min = self.config.min_drop_interval_ms;
        let max = self.config.max_drop_interval_ms;
        let level = level.max(1);
        let steps = f64::from(level - 1);
        let interval = match self.config.speed_curve {
            SpeedCurve::Classic => {
                let frames = CLASSIC_FRAMES
                    .get(level as usize - 1)
                    .copied()
                    .unwrap_or(1);
                f64::from(frames) * FRAME_MS
            }
            SpeedCurve::Linear => {
                let span = f64::from(self.config.max_level.max(2) - 1);
                let t = (steps / span).clamp(0.0, 1.0);
                max - (max - min) * t
            }
            SpeedCurve::Exponential => max * EXPONENTIAL_DECAY.powf(steps),
            SpeedCurve::Stepped => STEPPED_INTERVALS
                .iter()
                .rev()
                .find(|(from, _)| *from <= level)
                .map_or(max, |&(_, ms)| ms),
            SpeedCurve::Smooth => min + (max - min) * (-steps / SMOOTH_LEVEL_SCALE).exp(),
        };
        interval.clamp(min.min(max), max)
    }

    /// Lock delay at `level`: shrinks per level down to the floor.
    #[must_use]
    pub fn calculate_lock_delay(&self, level: u32) -> f64 {
        let steps = f64::from(level.max(1) - 1);
        (self.config.base_lock_delay_ms - steps * self.config.lock_delay_step_ms)
            .max(self.config.min_lock_delay_ms)
    }

    #[must_use]
    pub fn lines_required(&self) -> u64 {
        self.calculate_lines_required(self.level)
    }

    /// Fraction of the current level (or the sprint target) completed.
    #[must_use]
    pub fn progress(&self) -> f64 {
        #[expect(clippy::cast_precision_loss)]
        let progress = self.lines_at_level as f64 / self.lines_required() as f64;
        progress.clamp(0.0, 1.0)
    }

    /// Feeds the cumulative line count, levelling up as requirements are met.
    pub fn update(&mut self, total_lines: u64) -> LevelUpdate {
        let mut update = LevelUpdate::default();
        let delta = total_lines.saturating_sub(self.total_lines);
        if delta == 0 {
            return update;
        }
        self.total_lines = total_lines;
        self.lines_at_level += delta;
        if self.recent_clears.len() == ADAPTIVE_WINDOW {
            self.recent_clears.pop_front();
        }
        self.recent_clears
            .push_back(u32::try_from(delta).unwrap_or(u32::MAX));

        if self.config.progression.is_sprint() {
            if !self.goal_reached && self.total_lines >= u64::from(self.config.sprint_target_lines) {
                self.goal_reached = true;
                update.goal_reached = true;
                log::info!("sprint target of {} lines reached", self.config.sprint_target_lines);
            }
            return update;
        }

        while self.can_level_up() {
            let required = self.lines_required();
            if self.lines_at_level < required {
                break;
            }
            self.lines_at_level -= required;
            update.unlocked.extend(self.level_up());
            update.levels_gained += 1;
        }
        update
    }

    fn can_level_up(&self) -> bool {
        !self.config.progression.is_sprint()
            && (!self.config.has_level_cap() || self.level < self.config.max_level)
    }

    /// Advances one level, returning the features it unlocks.
    pub fn level_up(&mut self) -> Vec<Feature> {
        if !self.can_level_up() {
            log::warn!("level {} is the last level", self.level);
            return Vec::new();
        }
        self.level += 1;
        self.refresh_timings();
        log::info!(
            "level up to {} (gravity {:.1} ms, lock delay {:.0} ms)",
            self.level,
            self.drop_interval_ms,
            self.lock_delay_ms
        );

        let unlocked: Vec<Feature> = Feature::MILESTONES
            .iter()
            .filter(|&&(at, feature)| at <= self.level && !self.unlocked.contains(&feature))
            .map(|&(_, feature)| feature)
            .collect();
        for feature in &unlocked {
            log::info!("unlocked {feature} at level {}", self.level);
        }
        self.unlocked.extend(&unlocked);
        unlocked
    }

    fn refresh_timings(&mut self) {
        self.drop_interval_ms = self.calculate_drop_interval(self.level);
        self.lock_delay_ms = self.calculate_lock_delay(self.level);
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }

    #[must_use]
    pub fn validate(&self) -> Validation {
        let mut validation = Validation::new();
        if self.level == 0 {
            validation.error("level is zero");
        }
        if self.config.has_level_cap() && self.level > self.config.max_level {
            validation.error(format!(
                "level {} above max level {}",
                self.level, self.config.max_level
            ));
        }
        if self.lines_at_level > self.total_lines {
            validation.error("lines at level exceed total lines");
        }
        let (min, max) = (self.config.min_drop_interval_ms, self.config.max_drop_interval_ms);
        if !(min.min(max)..=max).contains(&self.drop_interval_ms) {
            validation.error(format!(
                "drop interval {} ms outside {min}..={max}",
                self.drop_interval_ms
            ));
        }
        if self.lock_delay_ms < self.config.min_lock_delay_ms {
            validation.error("lock delay below its floor");
        }
        for &(at, feature) in &Feature::MILESTONES {
            if self.unlocked.contains(&feature) != (at <= self.level) {
                validation.error(format!("feature {feature} unlock state disagrees with level"));
            }
        }
        if self.recent_clears.len() > ADAPTIVE_WINDOW {
            validation.error("performance window overflow");
        }
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(progression: ProgressionType, speed_curve: SpeedCurve) -> LevelManager {
        LevelManager::new(LevelConfig {
            progression,
            speed_curve,
            ..LevelConfig::default()
        })
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 0.5, "{actual} != {expected}");
    }

    #[test]
    fn test_classic_curve_uses_frame_table() {
        let manager = LevelManager::default();
        assert_close(manager.calculate_drop_interval(1), 800.0);
        assert_close(manager.calculate_drop_interval(10), 100.0);
        assert_close(manager.calculate_drop_interval(29), 2.0 * FRAME_MS);
        assert_close(manager.calculate_drop_interval(40), FRAME_MS);
        assert_close(manager.drop_interval_ms(), 800.0);
    }

    #[test]
    fn test_curves_stay_within_bounds() {
        for curve in [
            SpeedCurve::Classic,
            SpeedCurve::Linear,
            SpeedCurve::Exponential,
            SpeedCurve::Stepped,
            SpeedCurve::Smooth,
        ] {
            let manager = manager(ProgressionType::Classic, curve);
            let mut previous = f64::INFINITY;
            for level in 1..=40 {
                let interval = manager.calculate_drop_interval(level);
                assert!(interval >= FRAME_MS - 1e-9 && interval <= 1000.0, "{curve:?} {level}");
                assert!(interval <= previous, "{curve:?} is not monotone at {level}");
                previous = interval;
            }
        }
    }

    #[test]
    fn test_linear_and_exponential_curves() {
        let linear = manager(ProgressionType::Classic, SpeedCurve::Linear);
        assert_close(linear.calculate_drop_interval(1), 1000.0);
        assert_close(linear.calculate_drop_interval(29), FRAME_MS);

        let exponential = manager(ProgressionType::Classic, SpeedCurve::Exponential);
        assert_close(exponential.calculate_drop_interval(2), 850.0);
        assert_close(exponential.calculate_drop_interval(3), 722.5);
    }

    #[test]
    fn test_classic_level_up() {
        let mut manager = LevelManager::default();
        let update = manager.update(9);
        assert_eq!(update.levels_gained, 0);
        let update = manager.update(12);
        assert_eq!(update.levels_gained, 1);
        assert_eq!(manager.level(), 2);
        assert_close(manager.progress() * 10.0, 2.0);
        assert_close(manager.lock_delay_ms(), 480.0);
    }

    #[test]
    fn test_multiple_levels_and_milestones() {
        let mut manager = LevelManager::default();
        let update = manager.update(45);
        assert_eq!(update.levels_gained, 4);
        assert_eq!(manager.level(), 5);
        assert_eq!(update.unlocked, [Feature::ExtendedPreview]);

        let update = manager.update(95);
        assert_eq!(manager.level(), 10);
        assert_eq!(update.unlocked, [Feature::SpeedTier]);
        assert!(manager.is_unlocked(Feature::ExtendedPreview));
        assert!(manager.validate().valid);
    }

    #[test]
    fn test_milestones_reported_once() {
        let mut manager = LevelManager::default();
        let mut unlocked = Vec::new();
        for level in 1..25 {
            unlocked.extend(manager.level_up());
            assert_eq!(manager.level(), level + 1);
        }
        assert_eq!(
            unlocked,
            [Feature::ExtendedPreview, Feature::SpeedTier, Feature::MasterGravity]
        );
    }

    #[test]
    fn test_lock_delay_floor() {
        let manager = LevelManager::default();
        assert_close(manager.calculate_lock_delay(1), 500.0);
        assert_close(manager.calculate_lock_delay(11), 300.0);
        assert_close(manager.calculate_lock_delay(16), 200.0);
        assert_close(manager.calculate_lock_delay(29), 200.0);
    }

    #[test]
    fn test_modern_progression() {
        let mut manager = manager(ProgressionType::Modern, SpeedCurve::Classic);
        assert_eq!(manager.calculate_lines_required(1), 5);
        assert_eq!(manager.calculate_lines_required(4), 20);
        manager.update(5);
        assert_eq!(manager.level(), 2);
        manager.update(14);
        assert_eq!(manager.level(), 2);
        manager.update(15);
        assert_eq!(manager.level(), 3);
    }

    #[test]
    fn test_adaptive_progression() {
        let mut manager = manager(ProgressionType::Adaptive, SpeedCurve::Classic);
        assert_eq!(manager.lines_required(), 10);
        // one tetris: performance 2.0, requirement halves
        manager.update(4);
        assert_close(manager.performance(), 2.0);
        assert_eq!(manager.lines_required(), 5);

        let mut singles = LevelManager::new(*manager.config());
        for total in 1..=3 {
            singles.update(total);
        }
        assert_close(singles.performance(), 0.5);
        assert_eq!(singles.lines_required(), 20);
    }

    #[test]
    fn test_sprint_never_levels() {
        let mut manager = manager(ProgressionType::Sprint, SpeedCurve::Classic);
        let update = manager.update(39);
        assert_eq!(update.levels_gained, 0);
        assert!(!update.goal_reached);
        let update = manager.update(41);
        assert!(update.goal_reached);
        assert!(manager.is_goal_reached());
        assert_eq!(manager.level(), 1);
        assert!(!manager.update(44).goal_reached);
        assert!(manager.level_up().is_empty());
    }

    #[test]
    fn test_level_cap() {
        let mut capped = LevelManager::new(LevelConfig {
            start_level: 28,
            ..LevelConfig::default()
        });
        capped.update(100);
        assert_eq!(capped.level(), 29);

        let mut endless = manager(ProgressionType::Endless, SpeedCurve::Classic);
        endless.update(400);
        assert_eq!(endless.level(), 41);
        assert!(endless.validate().valid);
    }

    #[test]
    fn test_start_level_unlocks_earlier_milestones() {
        let manager = LevelManager::new(LevelConfig {
            start_level: 12,
            ..LevelConfig::default()
        });
        assert_eq!(
            manager.unlocked_features(),
            [Feature::ExtendedPreview, Feature::SpeedTier]
        );
        assert!(manager.validate().valid);
    }

    #[test]
    fn test_serialization() {
        let mut manager = LevelManager::default();
        manager.update(23);
        let json = serde_json::to_value(&manager).unwrap();
        assert_eq!(json["level"], 3);
        assert_eq!(json["totalLines"], 23);
        assert_eq!(json["linesAtLevel"], 3);

        let restored: LevelManager = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(restored, manager);

        let mut bad = json;
        bad["level"] = 0.into();
        assert!(serde_json::from_value::<LevelManager>(bad).is_err());
    }
}
