use serde::{Deserialize, Serialize};

use crate::validate::Validation;

use super::collision::TSpinKind;

/// Kind of clear a lock produced, in scoring terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum ClearType {
    Single,
    Double,
    Triple,
    Tetris,
    #[display("T-Spin Mini")]
    TSpinMini,
    #[display("T-Spin Mini Single")]
    TSpinMiniSingle,
    #[display("T-Spin Mini Double")]
    TSpinMiniDouble,
    #[display("T-Spin")]
    TSpin,
    #[display("T-Spin Single")]
    TSpinSingle,
    #[display("T-Spin Double")]
    TSpinDouble,
    #[display("T-Spin Triple")]
    TSpinTriple,
    #[display("Perfect Clear Single")]
    PerfectClearSingle,
    #[display("Perfect Clear Double")]
    PerfectClearDouble,
    #[display("Perfect Clear Triple")]
    PerfectClearTriple,
    #[display("Perfect Clear Tetris")]
    PerfectClearTetris,
}

impl ClearType {
    /// Classifies a lock. Perfect clears win over T-spins, which win over
    /// the plain row count. Returns `None` for a plain zero-line lock.
    #[must_use]
    pub fn classify(line_count: usize, t_spin: TSpinKind, perfect_clear: bool) -> Option<Self> {
        if perfect_clear {
            let perfect = match line_count {
                1 => Some(Self::PerfectClearSingle),
                2 => Some(Self::PerfectClearDouble),
                3 => Some(Self::PerfectClearTriple),
                4 => Some(Self::PerfectClearTetris),
                _ => None,
            };
            if perfect.is_some() {
                return perfect;
            }
        }
        let t_spin = match (t_spin, line_count) {
            (TSpinKind::Mini, 0) => Some(Self::TSpinMini),
            (TSpinKind::Mini, 1) => Some(Self::TSpinMiniSingle),
            (TSpinKind::Mini, 2) => Some(Self::TSpinMiniDouble),
            (TSpinKind::Full, 0) => Some(Self::TSpin),
            (TSpinKind::Full, 1) => Some(Self::TSpinSingle),
            (TSpinKind::Full, 2) => Some(Self::TSpinDouble),
            (TSpinKind::Full, 3) => Some(Self::TSpinTriple),
            _ => None,
        };
        if t_spin.is_some() {
            return t_spin;
        }
        match line_count {
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            3 => Some(Self::Triple),
            4 => Some(Self::Tetris),
            _ => None,
        }
    }

    /// Points before the level multiplier.
    #[must_use]
    pub fn base_score(self) -> u64 {
        match self {
            Self::Single | Self::TSpinMini => 100,
            Self::TSpinMiniSingle => 200,
            Self::Double => 300,
            Self::TSpin | Self::TSpinMiniDouble => 400,
            Self::Triple => 500,
            Self::Tetris | Self::TSpinSingle | Self::PerfectClearSingle => 800,
            Self::TSpinDouble | Self::PerfectClearDouble => 1200,
            Self::TSpinTriple => 1600,
            Self::PerfectClearTriple => 1800,
            Self::PerfectClearTetris => 2000,
        }
    }

    #[must_use]
    pub fn line_count(self) -> usize {
        match self {
            Self::TSpinMini | Self::TSpin => 0,
            Self::Single | Self::TSpinMiniSingle | Self::TSpinSingle | Self::PerfectClearSingle => 1,
            Self::Double | Self::TSpinMiniDouble | Self::TSpinDouble | Self::PerfectClearDouble => 2,
            Self::Triple | Self::TSpinTriple | Self::PerfectClearTriple => 3,
            Self::Tetris | Self::PerfectClearTetris => 4,
        }
    }

    #[must_use]
    pub fn is_t_spin(self) -> bool {
        matches!(
            self,
            Self::TSpinMini
                | Self::TSpinMiniSingle
                | Self::TSpinMiniDouble
                | Self::TSpin
                | Self::TSpinSingle
                | Self::TSpinDouble
                | Self::TSpinTriple
        )
    }

    #[must_use]
    pub fn is_perfect_clear(self) -> bool {
        matches!(
            self,
            Self::PerfectClearSingle
                | Self::PerfectClearDouble
                | Self::PerfectClearTriple
                | Self::PerfectClearTetris
        )
    }

    /// Tetrises and T-spins that clear lines keep the back-to-back streak.
    #[must_use]
    pub fn is_difficult(self) -> bool {
        match self {
            Self::Tetris | Self::PerfectClearTetris => true,
            _ => self.is_t_spin() && self.line_count() > 0,
        }
    }
}

/// How the lock happened, as far as scoring is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreContext {
    pub t_spin: TSpinKind,
    pub perfect_clear: bool,
}

/// Points awarded for one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub clear_type: Option<ClearType>,
    pub base: u64,
    pub combo_bonus: u64,
    pub back_to_back_bonus: u64,
    pub total: u64,
    pub is_special_move: bool,
    pub is_back_to_back: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum DropKind {
    Soft,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    /// Combo count beyond which the combo bonus stops growing.
    pub max_combo_multiplier: u32,
    pub combo_bonus: u64,
    pub soft_drop_points: u64,
    pub hard_drop_points: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_combo_multiplier: 20,
            combo_bonus: 50,
            soft_drop_points: 1,
            hard_drop_points: 2,
        }
    }
}

/// Counts of clears by row count plus special moves.
///
/// `singles`..`tetrises` count every clear by its number of rows, whatever
/// its scoring type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreStatistics {
    pub singles: u64,
    pub doubles: u64,
    pub triples: u64,
    pub tetrises: u64,
    pub t_spins: u64,
    pub t_spin_minis: u64,
    pub perfect_clears: u64,
    pub back_to_backs: u64,
    pub max_combo: u32,
    pub soft_drop_cells: u64,
    pub hard_drop_cells: u64,
}

/// Points earned per category. Always sums to the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreBreakdown {
    pub lines: u64,
    pub t_spin: u64,
    pub perfect_clear: u64,
    pub combo: u64,
    pub back_to_back: u64,
    pub drops: u64,
}

impl ScoreBreakdown {
    #[must_use]
    pub fn sum(&self) -> u64 {
        self.lines + self.t_spin + self.perfect_clear + self.combo + self.back_to_back + self.drops
    }
}

/// Running score, combo and back-to-back state.
///
/// Combo counts consecutive locks that cleared at least one line; the
/// bonus uses the count from before the current lock. The back-to-back
/// streak survives zero-line locks and is only broken by a clear that is not
/// [difficult](ClearType::is_difficult).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "ScoreRecord", try_from = "ScoreRecord")]
pub struct ScoreManager {
    config: ScoringConfig,
    score: u64,
    lines: u64,
    combo: u32,
    back_to_back: bool,
    back_to_back_count: u32,
    statistics: ScoreStatistics,
    breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub score: u64,
    pub lines: u64,
    pub combo: u32,
    pub back_to_back: bool,
    #[serde(default)]
    pub back_to_back_count: u32,
    #[serde(default)]
    pub statistics: ScoreStatistics,
    #[serde(default)]
    pub breakdown: ScoreBreakdown,
    #[serde(default)]
    pub config: ScoringConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ScoreRecordError {
    #[display("score breakdown sums to {breakdown}, but the score is {score}")]
    BreakdownMismatch { score: u64, breakdown: u64 },
    #[display("combo {combo} exceeds the recorded max combo {max_combo}")]
    ComboAboveMax { combo: u32, max_combo: u32 },
}

impl From<ScoreManager> for ScoreRecord {
    fn from(manager: ScoreManager) -> Self {
        Self {
            score: manager.score,
            lines: manager.lines,
            combo: manager.combo,
            back_to_back: manager.back_to_back,
            back_to_back_count: manager.back_to_back_count,
            statistics: manager.statistics,
            breakdown: manager.breakdown,
            config: manager.config,
        }
    }
}

impl TryFrom<ScoreRecord> for ScoreManager {
    type Error = ScoreRecordError;

    fn try_from(record: ScoreRecord) -> Result<Self, Self::Error> {
        let breakdown = record.breakdown.sum();
        if breakdown != record.score {
            return Err(ScoreRecordError::BreakdownMismatch {
                score: record.score,
                breakdown,
            });
        }
        if record.combo > record.statistics.max_combo {
            return Err(ScoreRecordError::ComboAboveMax {
                combo: record.combo,
                max_combo: record.statistics.max_combo,
            });
        }
        Ok(Self {
            config: record.config,
            score: record.score,
            lines: record.lines,
            combo: record.combo,
            back_to_back: record.back_to_back,
            back_to_back_count: record.back_to_back_count,
            statistics: record.statistics,
            breakdown: record.breakdown,
        })
    }
}

impl ScoreManager {
    #[must_use]
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn score(&self) -> u64 {
        self.score
    }

    #[must_use]
    pub fn lines(&self) -> u64 {
        self.lines
    }

    #[must_use]
    pub fn combo(&self) -> u32 {
        self.combo
    }

    #[must_use]
    pub fn max_combo(&self) -> u32 {
        self.statistics.max_combo
    }

    #[must_use]
    pub fn back_to_back(&self) -> bool {
        self.back_to_back
    }

    #[must_use]
    pub fn back_to_back_count(&self) -> u32 {
        self.back_to_back_count
    }

    #[must_use]
    pub fn statistics(&self) -> &ScoreStatistics {
        &self.statistics
    }

    #[must_use]
    pub fn breakdown(&self) -> &ScoreBreakdown {
        &self.breakdown
    }

    /// Scores a lock that cleared `line_count` rows at `level`.
    pub fn add_score(&mut self, line_count: usize, level: u32, context: ScoreContext) -> ScoreResult {
        let level = u64::from(level.max(1));
        let clear_type = ClearType::classify(line_count, context.t_spin, context.perfect_clear);
        let base = clear_type.map_or(0, ClearType::base_score) * level;

        let mut result = ScoreResult {
            clear_type,
            base,
            is_special_move: clear_type.is_some_and(|c| c.is_difficult() || c.is_perfect_clear()),
            ..ScoreResult::default()
        };

        if line_count == 0 {
            // zero-line T-spins still score, but the lock breaks the combo
            self.reset_combo();
            if let Some(clear_type) = clear_type {
                self.record_clear_type(clear_type, base);
            }
            result.total = base;
            self.score += base;
            return result;
        }

        if self.combo > 0 {
            result.combo_bonus =
                self.config.combo_bonus * u64::from(self.combo.min(self.config.max_combo_multiplier)) * level;
        }

        // a perfect-clear label hides the T-spin behind it
        let difficult = clear_type.is_some_and(ClearType::is_difficult)
            || context.t_spin != TSpinKind::None;
        if difficult && self.back_to_back {
            result.back_to_back_bonus = base / 2;
            result.is_back_to_back = true;
            self.back_to_back_count += 1;
            self.statistics.back_to_backs += 1;
        }
        self.back_to_back = difficult;
        if !difficult {
            self.back_to_back_count = 0;
        }

        self.combo += 1;
        self.statistics.max_combo = self.statistics.max_combo.max(self.combo);

        match line_count {
            1 => self.statistics.singles += 1,
            2 => self.statistics.doubles += 1,
            3 => self.statistics.triples += 1,
            _ => self.statistics.tetrises += 1,
        }
        self.lines += line_count as u64;
        if let Some(clear_type) = clear_type {
            self.record_clear_type(clear_type, base);
        }
        self.breakdown.combo += result.combo_bonus;
        self.breakdown.back_to_back += result.back_to_back_bonus;

        result.total = result.base + result.combo_bonus + result.back_to_back_bonus;
        self.score += result.total;
        result
    }

    fn record_clear_type(&mut self, clear_type: ClearType, base: u64) {
        if clear_type.is_perfect_clear() {
            self.statistics.perfect_clears += 1;
            self.breakdown.perfect_clear += base;
        } else if clear_type.is_t_spin() {
            if matches!(
                clear_type,
                ClearType::TSpinMini | ClearType::TSpinMiniSingle | ClearType::TSpinMiniDouble
            ) {
                self.statistics.t_spin_minis += 1;
            } else {
                self.statistics.t_spins += 1;
            }
            self.breakdown.t_spin += base;
        } else {
            self.breakdown.lines += base;
        }
    }

    /// Awards drop points for `cells` rows travelled; returns the points.
    pub fn add_drop_score(&mut self, cells: u32, kind: DropKind) -> u64 {
        let cells = u64::from(cells);
        let points = match kind {
            DropKind::Soft => {
                self.statistics.soft_drop_cells += cells;
                cells * self.config.soft_drop_points
            }
            DropKind::Hard => {
                self.statistics.hard_drop_cells += cells;
                cells * self.config.hard_drop_points
            }
        };
        self.breakdown.drops += points;
        self.score += points;
        points
    }

    pub fn reset_combo(&mut self) {
        self.combo = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }

    #[must_use]
    pub fn validate(&self) -> Validation {
        let mut validation = Validation::new();
        let breakdown = self.breakdown.sum();
        if breakdown != self.score {
            validation.error(format!(
                "breakdown sums to {breakdown}, score is {}",
                self.score
            ));
        }
        let s = &self.statistics;
        let counted = s.singles + 2 * s.doubles + 3 * s.triples + 4 * s.tetrises;
        if counted != self.lines {
            validation.error(format!(
                "clear statistics account for {counted} lines, total is {}",
                self.lines
            ));
        }
        if self.combo > s.max_combo {
            validation.error(format!(
                "combo {} above max combo {}",
                self.combo, s.max_combo
            ));
        }
        if !self.back_to_back && self.back_to_back_count > 0 {
            validation.error("back-to-back count without an active streak");
        }
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: ScoreContext = ScoreContext {
        t_spin: TSpinKind::None,
        perfect_clear: false,
    };

    fn t_spin() -> ScoreContext {
        ScoreContext {
            t_spin: TSpinKind::Full,
            ..PLAIN
        }
    }

    #[test]
    fn test_double_at_level_three() {
        let mut manager = ScoreManager::default();
        let result = manager.add_score(2, 3, PLAIN);
        assert_eq!(result.clear_type, Some(ClearType::Double));
        assert_eq!(result.total, 900);
        assert_eq!(manager.score(), 900);
    }

    #[test]
    fn test_tetris_sets_back_to_back() {
        let mut manager = ScoreManager::default();
        let result = manager.add_score(4, 1, PLAIN);
        assert_eq!(result.total, 800);
        assert!(!result.is_back_to_back);
        assert!(result.is_special_move);
        assert!(manager.back_to_back());
    }

    #[test]
    fn test_back_to_back_bonus() {
        let mut manager = ScoreManager::default();
        manager.add_score(4, 1, PLAIN);
        manager.reset_combo();
        let result = manager.add_score(2, 2, t_spin());
        assert_eq!(result.clear_type, Some(ClearType::TSpinDouble));
        assert_eq!(result.base, 2400);
        assert_eq!(result.back_to_back_bonus, 1200);
        assert_eq!(result.combo_bonus, 0);
        assert_eq!(result.total, 3600);
        assert_eq!(manager.back_to_back_count(), 1);
        assert!(manager.validate().valid);
    }

    #[test]
    fn test_t_spin_perfect_clear_keeps_streak() {
        let mut manager = ScoreManager::default();
        manager.add_score(4, 1, PLAIN);
        manager.reset_combo();
        let result = manager.add_score(
            2,
            1,
            ScoreContext {
                perfect_clear: true,
                ..t_spin()
            },
        );
        assert_eq!(result.clear_type, Some(ClearType::PerfectClearDouble));
        assert_eq!(result.base, 1200);
        assert!(result.is_back_to_back);
        assert_eq!(result.back_to_back_bonus, 600);
        assert_eq!(result.total, 1800);
        assert!(manager.back_to_back());
        assert!(manager.validate().valid);
    }

    #[test]
    fn test_plain_clear_breaks_streak() {
        let mut manager = ScoreManager::default();
        manager.add_score(4, 1, PLAIN);
        manager.add_score(1, 1, PLAIN);
        assert!(!manager.back_to_back());
        let result = manager.add_score(4, 1, PLAIN);
        assert_eq!(result.back_to_back_bonus, 0);
    }

    #[test]
    fn test_zero_line_lock_keeps_streak_and_resets_combo() {
        let mut manager = ScoreManager::default();
        manager.add_score(4, 1, PLAIN);
        manager.add_score(1, 1, t_spin());
        assert_eq!(manager.combo(), 2);

        let result = manager.add_score(0, 1, PLAIN);
        assert_eq!(result.clear_type, None);
        assert_eq!(result.total, 0);
        assert_eq!(manager.combo(), 0);
        assert!(manager.back_to_back());

        let result = manager.add_score(4, 1, PLAIN);
        assert!(result.is_back_to_back);
        assert_eq!(result.back_to_back_bonus, 400);
    }

    #[test]
    fn test_zero_line_t_spin_scores_without_combo() {
        let mut manager = ScoreManager::default();
        manager.add_score(1, 1, PLAIN);
        let result = manager.add_score(0, 2, t_spin());
        assert_eq!(result.clear_type, Some(ClearType::TSpin));
        assert_eq!(result.total, 800);
        assert_eq!(manager.combo(), 0);
        assert!(!manager.back_to_back());
        assert_eq!(manager.statistics().t_spins, 1);
        assert!(manager.validate().valid);
    }

    #[test]
    fn test_combo_bonus_uses_previous_combo() {
        let mut manager = ScoreManager::default();
        assert_eq!(manager.add_score(1, 1, PLAIN).combo_bonus, 0);
        assert_eq!(manager.add_score(1, 1, PLAIN).combo_bonus, 50);
        assert_eq!(manager.add_score(1, 2, PLAIN).combo_bonus, 200);
        assert_eq!(manager.combo(), 3);
        assert_eq!(manager.max_combo(), 3);

        manager.add_score(0, 1, PLAIN);
        assert_eq!(manager.combo(), 0);
        assert_eq!(manager.max_combo(), 3);
    }

    #[test]
    fn test_combo_bonus_is_capped() {
        let mut manager = ScoreManager::new(ScoringConfig {
            max_combo_multiplier: 2,
            ..ScoringConfig::default()
        });
        for _ in 0..5 {
            manager.add_score(1, 1, PLAIN);
        }
        assert_eq!(manager.add_score(1, 1, PLAIN).combo_bonus, 100);
    }

    #[test]
    fn test_classification_priority() {
        assert_eq!(
            ClearType::classify(4, TSpinKind::None, true),
            Some(ClearType::PerfectClearTetris)
        );
        assert_eq!(
            ClearType::classify(2, TSpinKind::Full, true),
            Some(ClearType::PerfectClearDouble)
        );
        assert_eq!(
            ClearType::classify(2, TSpinKind::Mini, false),
            Some(ClearType::TSpinMiniDouble)
        );
        assert_eq!(
            ClearType::classify(3, TSpinKind::Mini, false),
            Some(ClearType::Triple)
        );
        assert_eq!(ClearType::classify(0, TSpinKind::None, false), None);
        assert_eq!(ClearType::TSpinTriple.to_string(), "T-Spin Triple");
    }

    #[test]
    fn test_difficult_clears() {
        assert!(ClearType::Tetris.is_difficult());
        assert!(ClearType::TSpinMiniSingle.is_difficult());
        assert!(ClearType::PerfectClearTetris.is_difficult());
        assert!(!ClearType::TSpin.is_difficult());
        assert!(!ClearType::Triple.is_difficult());
        assert!(!ClearType::PerfectClearSingle.is_difficult());
    }

    #[test]
    fn test_drop_score() {
        let mut manager = ScoreManager::default();
        assert_eq!(manager.add_drop_score(3, DropKind::Soft), 3);
        assert_eq!(manager.add_drop_score(10, DropKind::Hard), 20);
        assert_eq!(manager.score(), 23);
        assert_eq!(manager.breakdown().drops, 23);
        assert_eq!(manager.statistics().hard_drop_cells, 10);
    }

    #[test]
    fn test_serialization_round_trip_checks_breakdown() {
        let mut manager = ScoreManager::default();
        manager.add_score(4, 1, PLAIN);
        manager.add_score(2, 1, PLAIN);
        let json = serde_json::to_value(&manager).unwrap();
        assert_eq!(json["score"], 1150);
        assert_eq!(json["backToBack"], false);
        assert_eq!(json["statistics"]["maxCombo"], 2);

        let restored: ScoreManager = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(restored, manager);

        let mut tampered = json;
        tampered["score"] = 5.into();
        assert!(serde_json::from_value::<ScoreManager>(tampered).is_err());
    }

    #[test]
    fn test_reset() {
        let mut manager = ScoreManager::default();
        manager.add_score(4, 5, PLAIN);
        manager.reset();
        assert_eq!(manager, ScoreManager::default());
    }
}
