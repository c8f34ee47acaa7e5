use serde::Serialize;

use crate::{
    core::{Board, CellState, Piece, PieceKind},
    rules::ClearPhase,
};

use super::game::{GameStatus, HeldPiece};

/// Read-only copy of everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub status: GameStatus,
    pub paused: bool,
    pub board: Board,
    pub active_piece: Option<Piece>,
    pub ghost_piece: Option<Piece>,
    pub held_piece: Option<HeldPiece>,
    pub hold_available: bool,
    pub next_queue: Vec<PieceKind>,
    pub score: u64,
    pub level: u32,
    pub lines: u64,
    pub combo: u32,
    pub back_to_back: bool,
    pub clear_phase: ClearPhase,
    pub clear_progress: f64,
    pub clearing_rows: Vec<usize>,
    pub drop_interval_ms: f64,
    pub lock_delay_ms: f64,
    pub elapsed_ms: f64,
    pub steps: u64,
}

impl GameSnapshot {
    /// Visible rows as text, top first.
    ///
    /// `@` active piece, `+` ghost, `#` locked, `G` garbage, `=` clearing,
    /// `.` empty.
    #[must_use]
    pub fn visible_rows_ascii(&self) -> Vec<String> {
        let piece_cells = |piece: &Option<Piece>| -> Vec<(i32, i32)> {
            piece.iter().flat_map(Piece::cells).collect()
        };
        let active = piece_cells(&self.active_piece);
        let ghost = piece_cells(&self.ghost_piece);

        self.board
            .visible_row_range()
            .map(|row| {
                (0..self.board.width())
                    .map(|column| {
                        let (Ok(x), Ok(y)) = (i32::try_from(column), i32::try_from(row)) else {
                            return '?';
                        };
                        if active.contains(&(x, y)) {
                            return '@';
                        }
                        match self.board.cell(x, y) {
                            CellState::Locked | CellState::Filled => '#',
                            CellState::Garbage => 'G',
                            CellState::Clearing => '=',
                            CellState::Empty | CellState::Ghost if ghost.contains(&(x, y)) => '+',
                            CellState::Empty | CellState::Ghost => '.',
                        }
                    })
                    .collect()
            })
            .collect()
    }
}
