use serde::{Deserialize, Serialize};

use crate::{
    core::{Board, CellState},
    validate::Validation,
};

/// Animation phase of a line clear.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, derive_more::IsVariant,
)]
#[serde(rename_all = "camelCase")]
pub enum ClearPhase {
    #[default]
    Idle,
    Flash,
    ParticleBurst,
    Collapse,
    /// Animation over; rows are ready to be removed.
    Complete,
}

/// Phase durations of the clear animation, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineClearConfig {
    pub flash_ms: f64,
    pub particle_ms: f64,
    pub collapse_ms: f64,
}

impl Default for LineClearConfig {
    fn default() -> Self {
        Self {
            flash_ms: 100.0,
            particle_ms: 150.0,
            collapse_ms: 150.0,
        }
    }
}

impl LineClearConfig {
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.flash_ms + self.particle_ms + self.collapse_ms
    }

    fn phase_at(&self, elapsed_ms: f64) -> ClearPhase {
        if elapsed_ms < self.flash_ms {
            ClearPhase::Flash
        } else if elapsed_ms < self.flash_ms + self.particle_ms {
            ClearPhase::ParticleBurst
        } else if elapsed_ms < self.total_ms() {
            ClearPhase::Collapse
        } else {
            ClearPhase::Complete
        }
    }
}

/// Row-count classification of a clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum LineClearKind {
    Single,
    Double,
    Triple,
    Tetris,
}

impl LineClearKind {
    #[must_use]
    pub fn from_line_count(line_count: usize) -> Option<Self> {
        match line_count {
            1 => Some(Self::Single),
            2 => Some(Self::Double),
            3 => Some(Self::Triple),
            4 => Some(Self::Tetris),
            _ => None,
        }
    }

    #[must_use]
    pub fn line_count(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::Tetris => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineClearStats {
    pub clears: u64,
    pub lines: u64,
    pub singles: u64,
    pub doubles: u64,
    pub triples: u64,
    pub tetrises: u64,
    pub forced_completions: u64,
    pub rejected_marks: u64,
}

/// Detects complete rows and drives the timed clear animation.
///
/// A clear goes `Flash -> ParticleBurst -> Collapse -> Complete` as
/// simulation time is fed through [`update`](Self::update). The board is
/// only mutated by [`execute_line_clear`](Self::execute_line_clear), after
/// which the clearer is idle again.
#[derive(Debug, Clone, Default)]
pub struct LineClearer {
    config: LineClearConfig,
    phase: ClearPhase,
    elapsed_ms: f64,
    // descending, so lower rows are removed first
    rows: Vec<usize>,
    stats: LineClearStats,
}

impl LineClearer {
    #[must_use]
    pub fn new(config: LineClearConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &LineClearConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> ClearPhase {
        self.phase
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        !self.phase.is_idle()
    }

    /// Rows being cleared, bottom first.
    #[must_use]
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    #[must_use]
    pub fn stats(&self) -> &LineClearStats {
        &self.stats
    }

    /// Visible rows that are complete, top to bottom.
    #[must_use]
    pub fn find_complete_lines(&self, board: &Board) -> Vec<usize> {
        board
            .visible_row_range()
            .filter(|&row| board.is_row_complete(row))
            .collect()
    }

    /// Marks `rows` as [`CellState::Clearing`] and starts the animation.
    ///
    /// Returns `false` without touching the board while a clear is already
    /// in progress or when no valid row is given.
    pub fn mark_lines_for_clearing(&mut self, board: &mut Board, rows: &[usize]) -> bool {
        if self.is_animating() {
            log::warn!(
                "cannot mark rows {rows:?} for clearing: a clear is already in progress ({:?})",
                self.phase
            );
            self.stats.rejected_marks += 1;
            return false;
        }
        let mut rows: Vec<usize> = rows
            .iter()
            .copied()
            .filter(|&row| row < board.total_height())
            .collect();
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.dedup();
        if rows.is_empty() {
            log::warn!("no rows to clear");
            self.stats.rejected_marks += 1;
            return false;
        }

        for &row in &rows {
            board.fill_row(row, CellState::Clearing);
        }
        self.rows = rows;
        self.elapsed_ms = 0.0;
        self.phase = self.config.phase_at(0.0);
        true
    }

    /// Advances the animation clock, returning the new phase on a change.
    pub fn update(&mut self, dt_ms: f64) -> Option<ClearPhase> {
        if matches!(self.phase, ClearPhase::Idle | ClearPhase::Complete) {
            return None;
        }
        self.elapsed_ms += dt_ms.max(0.0);
        let phase = self.config.phase_at(self.elapsed_ms);
        if phase == self.phase {
            return None;
        }
        self.phase = phase;
        Some(phase)
    }

    /// Jumps straight to [`ClearPhase::Complete`]. Returns `false` when idle.
    pub fn force_complete(&mut self) -> bool {
        if !self.is_animating() {
            return false;
        }
        if !self.phase.is_complete() {
            self.stats.forced_completions += 1;
        }
        self.elapsed_ms = self.elapsed_ms.max(self.config.total_ms());
        self.phase = ClearPhase::Complete;
        true
    }

    /// Removes the marked rows and collapses the stack above them.
    ///
    /// Returns the number of rows removed and leaves the clearer idle.
    pub fn execute_line_clear(&mut self, board: &mut Board) -> usize {
        let rows = std::mem::take(&mut self.rows);
        // Each removal shifts everything above it down one row, so a row
        // still pending sits `cleared` rows lower than where it was marked.
        let mut cleared = 0;
        for row in &rows {
            let row = row + cleared;
            board.clear_row(row);
            board.shift_rows_down(row);
            cleared += 1;
        }

        if cleared > 0 {
            self.stats.clears += 1;
            self.stats.lines += cleared as u64;
            match LineClearKind::from_line_count(cleared) {
                Some(LineClearKind::Single) => self.stats.singles += 1,
                Some(LineClearKind::Double) => self.stats.doubles += 1,
                Some(LineClearKind::Triple) => self.stats.triples += 1,
                Some(LineClearKind::Tetris) => self.stats.tetrises += 1,
                None => {}
            }
        }
        self.phase = ClearPhase::Idle;
        self.elapsed_ms = 0.0;
        cleared
    }

    /// Whether clearing `rows` would leave no occupied cell on the board.
    #[must_use]
    pub fn is_perfect_clear(&self, board: &Board, rows: &[usize]) -> bool {
        board
            .rows()
            .enumerate()
            .filter(|(row, _)| !rows.contains(row))
            .all(|(_, cells)| cells.iter().all(|c| c.is_vacant()))
    }

    #[must_use]
    pub fn classify(&self, line_count: usize) -> Option<LineClearKind> {
        LineClearKind::from_line_count(line_count)
    }

    /// Fraction of the animation elapsed, in `0.0..=1.0`.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if !self.is_animating() {
            return 0.0;
        }
        let total = self.config.total_ms();
        if total <= 0.0 {
            return 1.0;
        }
        (self.elapsed_ms / total).clamp(0.0, 1.0)
    }

    /// Drops any in-flight clear without touching the board.
    pub fn reset(&mut self) {
        self.phase = ClearPhase::Idle;
        self.elapsed_ms = 0.0;
        self.rows.clear();
    }

    #[must_use]
    pub fn validate(&self) -> Validation {
        let mut validation = Validation::new();
        if self.phase.is_idle() && !self.rows.is_empty() {
            validation.error("idle clearer still holds rows");
        }
        if self.is_animating() && self.rows.is_empty() {
            validation.error("animating without rows");
        }
        if self.rows.windows(2).any(|w| w[0] <= w[1]) {
            validation.error("cleared rows are not strictly descending");
        }
        if self.elapsed_ms < 0.0 {
            validation.error("negative animation clock");
        }
        let s = &self.stats;
        if s.singles + 2 * s.doubles + 3 * s.triples + 4 * s.tetrises != s.lines {
            validation.error(format!(
                "line statistics ({} lines) disagree with clear kinds",
                s.lines
            ));
        }
        validation
    }
}
