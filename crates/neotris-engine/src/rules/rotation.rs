use serde::Serialize;

use crate::core::{Board, Piece, PieceKind, RotationDirection, catalog};

use super::collision::CollisionDetector;

/// A successful rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    pub piece: Piece,
    /// Offset that was added to the position, `(0, 0)` without a kick.
    pub kick_offset: (i32, i32),
    /// Index of the kick candidate that validated.
    pub kick_index: usize,
}

impl RotationOutcome {
    #[must_use]
    pub fn wall_kick_used(&self) -> bool {
        self.kick_index > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("no wall-kick candidate fits for {kind} rotating {from} -> {to}")]
pub struct RotationError {
    pub kind: PieceKind,
    pub from: u8,
    pub to: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationStats {
    pub attempts: u64,
    pub successes: u64,
    pub kicks: u64,
    pub failures: u64,
}

/// Super Rotation System resolution.
///
/// A rotation request tests the catalog's kick candidates for the transition
/// in order and takes the first placement that fits. The O piece always
/// succeeds in place since all its states are identical.
///
/// # Example
///
/// ```
/// use neotris_engine::{
///     Board, CollisionDetector, Piece, PieceKind, PiecePosition, RotationDirection,
///     RotationSystem,
/// };
///
/// let board = Board::new(10, 20, 4);
/// let mut detector = CollisionDetector::default();
/// let mut rotation = RotationSystem::default();
///
/// let piece = Piece::new(PieceKind::T, PiecePosition::new(3, 10));
/// let outcome = rotation
///     .rotate(&board, &mut detector, &piece, RotationDirection::Clockwise)
///     .unwrap();
/// assert!(!outcome.wall_kick_used());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RotationSystem {
    stats: RotationStats,
}

impl RotationSystem {
    #[must_use]
    pub fn stats(&self) -> &RotationStats {
        &self.stats
    }

    /// Rotates `piece` one step in `direction`, applying wall kicks.
    ///
    /// On failure nothing is produced; the caller keeps the original piece.
    pub fn rotate(
        &mut self,
        board: &Board,
        detector: &mut CollisionDetector,
        piece: &Piece,
        direction: RotationDirection,
    ) -> Result<RotationOutcome, RotationError> {
        self.stats.attempts += 1;
        let from = piece.rotation();
        let to = from.rotated(direction);

        if piece.kind() == PieceKind::O {
            self.stats.successes += 1;
            return Ok(RotationOutcome {
                piece: piece.transformed(to, piece.position()),
                kick_offset: (0, 0),
                kick_index: 0,
            });
        }

        let rotated = piece.transformed(to, piece.position());
        for (kick_index, &(dx, dy)) in catalog::wall_kicks(piece.kind(), from, to)
            .iter()
            .enumerate()
        {
            let position = piece.position().offset(dx, dy);
            if detector.is_valid_position(board, &rotated, position) {
                self.stats.successes += 1;
                if kick_index > 0 {
                    self.stats.kicks += 1;
                }
                return Ok(RotationOutcome {
                    piece: piece.transformed(to, position),
                    kick_offset: (dx, dy),
                    kick_index,
                });
            }
        }

        self.stats.failures += 1;
        Err(RotationError {
            kind: piece.kind(),
            from: from.as_u8(),
            to: to.as_u8(),
        })
    }
}
