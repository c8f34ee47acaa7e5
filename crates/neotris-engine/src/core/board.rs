use std::cell::Cell;

use serde::{Deserialize, Serialize};

use crate::validate::Validation;

use super::piece::Piece;

/// State of a single board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellState {
    #[default]
    Empty,
    /// Generic occupied cell; also what out-of-bounds reads report.
    Filled,
    /// Cell of a locked piece.
    Locked,
    /// Row scheduled for removal by the clear animation.
    Clearing,
    Garbage,
    /// Landing preview of the active piece.
    Ghost,
}

impl CellState {
    /// Whether a piece may not overlap this cell.
    #[must_use]
    pub fn is_solid(self) -> bool {
        matches!(self, CellState::Filled | CellState::Locked | CellState::Garbage)
    }

    /// Whether the cell counts as a hole for row completeness.
    #[must_use]
    pub fn is_vacant(self) -> bool {
        matches!(self, CellState::Empty | CellState::Ghost)
    }
}

/// Write and mutation counters kept by a [`Board`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardStats {
    pub writes: u64,
    pub rejected_writes: u64,
    pub rows_cleared: u64,
    pub rows_shifted: u64,
    pub garbage_lines: u64,
}

/// Cell grid of the playfield.
///
/// The grid is `width × (height + hidden_rows)` cells stored row-major. Row 0
/// is the top; the first `hidden_rows` rows form the spawn area above the
/// visible field.
///
/// The board is a passive store: out-of-bounds reads answer
/// [`CellState::Filled`] and out-of-bounds writes are ignored.
///
/// # Example
///
/// ```
/// use neotris_engine::{Board, CellState};
///
/// let mut board = Board::new(10, 20, 4);
/// assert!(board.set_cell(0, 23, CellState::Locked));
/// assert!(!board.set_cell(10, 0, CellState::Locked));
/// assert_eq!(board.cell(-1, 0), CellState::Filled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "BoardRecord", try_from = "BoardRecord")]
pub struct Board {
    width: usize,
    height: usize,
    hidden_rows: usize,
    grid: Vec<CellState>,
    complete_rows: Vec<Cell<Option<bool>>>,
    revision: u64,
    stats: BoardStats,
}

/// Plain-object layout of a [`Board`] used for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRecord {
    pub width: usize,
    pub height: usize,
    pub hidden_rows: usize,
    pub grid: Vec<CellState>,
    #[serde(default)]
    pub statistics: BoardStats,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum BoardRecordError {
    #[display("board width must be non-zero")]
    ZeroWidth,
    #[display("board grid has {actual} cells, expected {expected}")]
    GridSize { expected: usize, actual: usize },
}

impl From<Board> for BoardRecord {
    fn from(board: Board) -> Self {
        Self {
            width: board.width,
            height: board.height,
            hidden_rows: board.hidden_rows,
            grid: board.grid,
            statistics: board.stats,
        }
    }
}

impl TryFrom<BoardRecord> for Board {
    type Error = BoardRecordError;

    fn try_from(record: BoardRecord) -> Result<Self, Self::Error> {
        if record.width == 0 {
            return Err(BoardRecordError::ZeroWidth);
        }
        let expected = record.width * (record.height + record.hidden_rows);
        if record.grid.len() != expected {
            return Err(BoardRecordError::GridSize {
                expected,
                actual: record.grid.len(),
            });
        }
        let mut board = Self::new(record.width, record.height, record.hidden_rows);
        board.grid = record.grid;
        board.stats = record.statistics;
        Ok(board)
    }
}

impl Board {
    pub const DEFAULT_WIDTH: usize = 10;
    pub const DEFAULT_HEIGHT: usize = 20;
    pub const DEFAULT_HIDDEN_ROWS: usize = 4;

    /// Creates an empty board with `height` visible rows and `hidden_rows`
    /// spawn rows above them.
    #[must_use]
    pub fn new(width: usize, height: usize, hidden_rows: usize) -> Self {
        let total_height = height + hidden_rows;
        Self {
            width,
            height,
            hidden_rows,
            grid: vec![CellState::Empty; width * total_height],
            complete_rows: vec![Cell::new(None); total_height],
            revision: 0,
            stats: BoardStats::default(),
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of visible rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn hidden_rows(&self) -> usize {
        self.hidden_rows
    }

    #[must_use]
    pub fn total_height(&self) -> usize {
        self.height + self.hidden_rows
    }

    /// Row indices of the visible field.
    #[must_use]
    pub fn visible_row_range(&self) -> std::ops::Range<usize> {
        self.hidden_rows..self.total_height()
    }

    /// Counter bumped by every mutation; lets caches detect stale answers.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn stats(&self) -> &BoardStats {
        &self.stats
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        (x < self.width && y < self.total_height()).then(|| y * self.width + x)
    }

    #[must_use]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some()
    }

    /// Returns the cell at `(x, y)`, or [`CellState::Filled`] outside the grid.
    #[must_use]
    pub fn cell(&self, x: i32, y: i32) -> CellState {
        self.index(x, y).map_or(CellState::Filled, |i| self.grid[i])
    }

    /// Whether `(x, y)` is solid; out-of-bounds cells are.
    #[must_use]
    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        self.cell(x, y).is_solid()
    }

    /// Writes a cell, returning `false` (and changing nothing) out of bounds.
    pub fn set_cell(&mut self, x: i32, y: i32, state: CellState) -> bool {
        let Some(i) = self.index(x, y) else {
            self.stats.rejected_writes += 1;
            return false;
        };
        self.grid[i] = state;
        self.stats.writes += 1;
        self.touch_row(i / self.width);
        true
    }

    fn touch_row(&mut self, row: usize) {
        self.complete_rows[row].set(None);
        self.revision += 1;
    }

    /// Cells of `row`, or `None` when the row does not exist.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[CellState]> {
        (row < self.total_height()).then(|| &self.grid[row * self.width..][..self.width])
    }

    /// Iterates all rows top to bottom, hidden rows included.
    pub fn rows(&self) -> impl Iterator<Item = &[CellState]> {
        self.grid.chunks_exact(self.width)
    }

    /// Iterates the visible rows top to bottom.
    pub fn visible_rows(&self) -> impl Iterator<Item = &[CellState]> {
        self.rows().skip(self.hidden_rows)
    }

    /// A row is complete when none of its cells is empty or ghost.
    ///
    /// The answer is cached per row until the next write to that row.
    #[must_use]
    pub fn is_row_complete(&self, row: usize) -> bool {
        let Some(cells) = self.row(row) else {
            return false;
        };
        if let Some(complete) = self.complete_rows[row].get() {
            return complete;
        }
        let complete = cells.iter().all(|c| !c.is_vacant());
        self.complete_rows[row].set(Some(complete));
        complete
    }

    #[must_use]
    pub fn is_row_empty(&self, row: usize) -> bool {
        self.row(row)
            .is_some_and(|cells| cells.iter().all(|c| c.is_vacant()))
    }

    /// Topmost row holding a non-vacant cell.
    #[must_use]
    pub fn highest_occupied_row(&self) -> Option<usize> {
        (0..self.total_height()).find(|&row| !self.is_row_empty(row))
    }

    /// Empties every cell of `row`.
    pub fn clear_row(&mut self, row: usize) {
        if row >= self.total_height() {
            return;
        }
        self.grid[row * self.width..][..self.width].fill(CellState::Empty);
        self.stats.rows_cleared += 1;
        self.touch_row(row);
    }

    /// Overwrites every cell of `row` with `state`.
    pub fn fill_row(&mut self, row: usize, state: CellState) -> bool {
        if row >= self.total_height() {
            self.stats.rejected_writes += 1;
            return false;
        }
        self.grid[row * self.width..][..self.width].fill(state);
        self.stats.writes += self.width as u64;
        self.touch_row(row);
        true
    }

    /// Moves every row above `from_row` down by one, overwriting `from_row`,
    /// and empties the new top row.
    pub fn shift_rows_down(&mut self, from_row: usize) {
        if from_row >= self.total_height() {
            return;
        }
        let width = self.width;
        // rows 0..from_row move to 1..=from_row
        self.grid.copy_within(..from_row * width, width);
        self.grid[..width].fill(CellState::Empty);
        for row in 0..=from_row {
            self.touch_row(row);
        }
        self.stats.rows_shifted += from_row as u64;
    }

    /// Pushes the stack up by `count` rows and fills the bottom with garbage.
    ///
    /// Each garbage row is solid except for its hole column. Holes are taken
    /// from `hole_columns` in order, cycling when fewer than `count` are given
    /// (column 0 when none are); out-of-range holes are clamped to the last
    /// column.
    ///
    /// Returns `true` if occupied cells were pushed out through the top.
    pub fn add_garbage_lines(&mut self, count: usize, hole_columns: &[usize]) -> bool {
        let total_height = self.total_height();
        let count = count.min(total_height);
        if count == 0 {
            return false;
        }
        let width = self.width;
        let overflow = (0..count).any(|row| !self.is_row_empty(row));

        self.grid.copy_within(count * width.., 0);
        for i in 0..count {
            let row = total_height - count + i;
            let hole = if hole_columns.is_empty() {
                0
            } else {
                hole_columns[i % hole_columns.len()].min(width - 1)
            };
            let cells = &mut self.grid[row * width..][..width];
            cells.fill(CellState::Garbage);
            cells[hole] = CellState::Empty;
        }
        for row in 0..total_height {
            self.touch_row(row);
        }
        self.stats.garbage_lines += count as u64;
        overflow
    }

    /// Writes the piece's cells as `state`; cells outside the grid are skipped.
    ///
    /// Returns the number of cells written.
    pub fn fill_piece(&mut self, piece: &Piece, state: CellState) -> usize {
        piece
            .cells()
            .filter(|&(x, y)| self.set_cell(x, y, state))
            .count()
    }

    /// Empties the whole grid; statistics are kept.
    pub fn clear(&mut self) {
        self.grid.fill(CellState::Empty);
        for row in 0..self.total_height() {
            self.touch_row(row);
        }
    }

    /// Resets the grid and statistics.
    pub fn reset(&mut self) {
        self.clear();
        self.stats = BoardStats::default();
    }

    #[must_use]
    pub fn validate(&self) -> Validation {
        let mut validation = Validation::new();
        let expected = self.width * self.total_height();
        if self.grid.len() != expected {
            validation.error(format!(
                "grid has {} cells, expected {expected}",
                self.grid.len()
            ));
        }
        if self.complete_rows.len() != self.total_height() {
            validation.error(format!(
                "row cache has {} entries, expected {}",
                self.complete_rows.len(),
                self.total_height()
            ));
        }
        for (row, cached) in self.complete_rows.iter().enumerate() {
            if let (Some(cached), Some(cells)) = (cached.get(), self.row(row)) {
                if cached != cells.iter().all(|c| !c.is_vacant()) {
                    validation.error(format!("stale completeness cache for row {row}"));
                }
            }
        }
        validation
    }

    /// Creates a board from ASCII art for testing.
    ///
    /// `#` is a locked cell, `G` garbage, `.` empty. The art describes the
    /// bottom rows of a 10-wide, 20 + 4 board; its last line is the bottom row.
    #[must_use]
    pub fn from_ascii(art: &str) -> Self {
        let mut board = Self::new(
            Self::DEFAULT_WIDTH,
            Self::DEFAULT_HEIGHT,
            Self::DEFAULT_HIDDEN_ROWS,
        );
        let lines: Vec<&str> = art.lines().filter(|line| !line.trim().is_empty()).collect();
        let top = board.total_height() - lines.len();

        for (y, line) in lines.iter().enumerate() {
            let chars: Vec<char> = line
                .chars()
                .filter(|c| matches!(c, '#' | 'G' | '.'))
                .collect();
            assert_eq!(
                chars.len(),
                Self::DEFAULT_WIDTH,
                "Each row must have exactly {} cells, got {} at row {}",
                Self::DEFAULT_WIDTH,
                chars.len(),
                y
            );
            for (x, &ch) in chars.iter().enumerate() {
                let state = match ch {
                    '#' => CellState::Locked,
                    'G' => CellState::Garbage,
                    _ => continue,
                };
                board.grid[(top + y) * Self::DEFAULT_WIDTH + x] = state;
            }
        }
        board.stats = BoardStats::default();
        board
    }
}

#[cfg(test)]
mod tests {
    use crate::{PieceKind, PiecePosition};

    use super::*;

    fn fill_row(board: &mut Board, row: i32, state: CellState) {
        for x in 0..10 {
            board.set_cell(x, row, state);
        }
    }

    #[test]
    fn test_initial_board() {
        let board = Board::new(10, 20, 4);
        assert_eq!(board.total_height(), 24);
        assert_eq!(board.rows().count(), 24);
        assert_eq!(board.visible_rows().count(), 20);
        assert!(board.rows().flatten().all(|&c| c == CellState::Empty));
        assert!(board.validate().valid);
    }

    #[test]
    fn test_out_of_bounds_reads_are_filled() {
        let board = Board::new(10, 20, 4);
        assert_eq!(board.cell(-1, 5), CellState::Filled);
        assert_eq!(board.cell(10, 5), CellState::Filled);
        assert_eq!(board.cell(3, -1), CellState::Filled);
        assert_eq!(board.cell(3, 24), CellState::Filled);
        assert_eq!(board.cell(3, 23), CellState::Empty);
    }

    #[test]
    fn test_out_of_bounds_writes_are_ignored() {
        let mut board = Board::new(10, 20, 4);
        let revision = board.revision();
        assert!(!board.set_cell(10, 0, CellState::Locked));
        assert!(!board.set_cell(0, -1, CellState::Locked));
        assert_eq!(board.revision(), revision);
        assert_eq!(board.stats().rejected_writes, 2);
        assert_eq!(board.stats().writes, 0);
    }

    #[test]
    fn test_partial_row_is_not_complete() {
        let mut board = Board::new(10, 20, 4);
        let piece = Piece::new(PieceKind::I, PiecePosition::new(0, -1));
        assert_eq!(board.fill_piece(&piece, CellState::Locked), 4);
        assert!(!board.is_row_complete(0));
    }

    #[test]
    fn test_row_completeness_ignores_ghosts_as_filled() {
        let mut board = Board::new(10, 20, 4);
        fill_row(&mut board, 10, CellState::Locked);
        assert!(board.is_row_complete(10));

        board.set_cell(4, 10, CellState::Ghost);
        assert!(!board.is_row_complete(10));

        board.set_cell(4, 10, CellState::Garbage);
        assert!(board.is_row_complete(10));
    }

    #[test]
    fn test_completeness_cache_invalidated_on_write() {
        let mut board = Board::new(10, 20, 4);
        fill_row(&mut board, 23, CellState::Locked);
        assert!(board.is_row_complete(23));
        board.set_cell(0, 23, CellState::Empty);
        assert!(!board.is_row_complete(23));
        assert!(board.validate().valid);
    }

    #[test]
    fn test_shift_rows_down() {
        let mut board = Board::from_ascii(
            r"
            #.........
            .#........
            ##########
            ",
        );
        board.clear_row(23);
        board.shift_rows_down(23);

        assert_eq!(board.cell(0, 22), CellState::Locked);
        assert_eq!(board.cell(1, 23), CellState::Locked);
        assert_eq!(board.cell(0, 21), CellState::Empty);
        assert!(board.is_row_empty(0));
        assert_eq!(board.stats().rows_cleared, 1);
        assert_eq!(board.stats().rows_shifted, 23);
    }

    #[test]
    fn test_add_garbage_lines() {
        let mut board = Board::from_ascii(
            r"
            ####......
            ",
        );
        let overflow = board.add_garbage_lines(2, &[3, 7]);
        assert!(!overflow);

        assert_eq!(board.cell(0, 21), CellState::Locked);
        assert_eq!(board.cell(3, 22), CellState::Empty);
        assert_eq!(board.cell(0, 22), CellState::Garbage);
        assert_eq!(board.cell(7, 23), CellState::Empty);
        assert_eq!(board.cell(3, 23), CellState::Garbage);
        assert!(!board.is_row_complete(22));
        assert_eq!(board.stats().garbage_lines, 2);
    }

    #[test]
    fn test_add_garbage_lines_reports_overflow() {
        let mut board = Board::new(10, 20, 4);
        board.set_cell(5, 0, CellState::Locked);
        assert!(board.add_garbage_lines(1, &[]));
        assert_eq!(board.cell(0, 23), CellState::Empty);
        assert_eq!(board.cell(1, 23), CellState::Garbage);
    }

    #[test]
    fn test_highest_occupied_row() {
        let board = Board::from_ascii(
            r"
            ....#.....
            ##########
            ",
        );
        assert_eq!(board.highest_occupied_row(), Some(22));
        assert_eq!(Board::new(10, 20, 4).highest_occupied_row(), None);
    }

    #[test]
    fn test_board_serialization() {
        let mut board = Board::new(4, 2, 1);
        board.set_cell(1, 2, CellState::Garbage);

        let value = serde_json::to_value(&board).unwrap();
        assert_eq!(value["width"], 4);
        assert_eq!(value["height"], 2);
        assert_eq!(value["hiddenRows"], 1);
        assert_eq!(value["grid"].as_array().unwrap().len(), 12);
        assert_eq!(value["grid"][9], "garbage");
        assert_eq!(value["statistics"]["writes"], 1);

        let deserialized: Board = serde_json::from_value(value).unwrap();
        assert_eq!(deserialized.cell(1, 2), CellState::Garbage);
        assert_eq!(deserialized.stats(), board.stats());
    }

    #[test]
    fn test_board_deserialization_checks_grid_size() {
        let json = r#"{"width":4,"height":2,"hiddenRows":1,"grid":["empty"]}"#;
        assert!(serde_json::from_str::<Board>(json).is_err());
    }
}
