use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{
    core::{Board, Piece, PieceKind, PiecePosition},
    validate::Validation,
};

/// Diagonal corners of the T piece's 3×3 box, relative to its position.
const T_CORNERS: [(i32, i32); 4] = [(0, 0), (2, 0), (0, 2), (2, 2)];

/// T-spin grade derived from corner occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TSpinKind {
    #[default]
    None,
    Mini,
    Full,
}

/// Outcome of [`CollisionDetector::check_t_spin_conditions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TSpinCheck {
    pub kind: TSpinKind,
    pub filled_corners: u8,
}

impl TSpinCheck {
    #[must_use]
    pub fn is_t_spin(&self) -> bool {
        self.kind != TSpinKind::None
    }
}

/// Which sides of a piece are blocked one column away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WallContact {
    pub left: bool,
    pub right: bool,
}

impl WallContact {
    #[must_use]
    pub fn any(self) -> bool {
        self.left || self.right
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Times the cache was emptied because the board changed.
    pub flushes: u64,
}

/// Placement validation against board bounds and solid cells.
///
/// Answers are memoized per `(kind, rotation, x, y)` in a bounded FIFO cache.
/// The cache remembers the [`Board::revision`] it was filled against and
/// empties itself as soon as it is queried with a different revision, so a
/// lock or line clear can never be answered from a stale board.
#[derive(Debug, Clone)]
pub struct CollisionDetector {
    capacity: usize,
    entries: HashMap<u64, bool>,
    order: VecDeque<u64>,
    board_revision: Option<u64>,
    stats: CacheStats,
}

impl Default for CollisionDetector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CACHE_CAPACITY)
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cache_key(kind: PieceKind, rotation: u8, position: PiecePosition) -> u64 {
    (kind.index() as u64) << 40
        | u64::from(rotation) << 32
        | u64::from(position.x as u16) << 16
        | u64::from(position.y as u16)
}

impl CollisionDetector {
    pub const DEFAULT_CACHE_CAPACITY: usize = 256;

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            board_revision: None,
            stats: CacheStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear_cache(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.board_revision = None;
    }

    fn sync_revision(&mut self, board: &Board) {
        if self.board_revision == Some(board.revision()) {
            return;
        }
        if !self.entries.is_empty() {
            self.entries.clear();
            self.order.clear();
            self.stats.flushes += 1;
        }
        self.board_revision = Some(board.revision());
    }

    fn remember(&mut self, key: u64, valid: bool) {
        if self.capacity == 0 {
            return;
        }
        while self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
            }
        }
        self.entries.insert(key, valid);
        self.order.push_back(key);
    }

    /// Whether `piece` may stand at `position`.
    ///
    /// A placement is invalid iff one of its blocks lies outside
    /// `[0, width) × [0, total_height)` or on a solid cell.
    pub fn is_valid_position(
        &mut self,
        board: &Board,
        piece: &Piece,
        position: PiecePosition,
    ) -> bool {
        self.sync_revision(board);
        let key = cache_key(piece.kind(), piece.rotation().as_u8(), position);
        if let Some(&valid) = self.entries.get(&key) {
            self.stats.hits += 1;
            return valid;
        }
        self.stats.misses += 1;

        let valid = Self::check_position(board, piece, position);
        self.remember(key, valid);
        valid
    }

    /// Uncached placement check behind [`is_valid_position`](Self::is_valid_position).
    #[must_use]
    pub fn check_position(board: &Board, piece: &Piece, position: PiecePosition) -> bool {
        piece
            .cells_at(position)
            .all(|(x, y)| board.in_bounds(x, y) && !board.cell(x, y).is_solid())
    }

    /// Whether `piece` may stand where it is.
    pub fn fits(&mut self, board: &Board, piece: &Piece) -> bool {
        self.is_valid_position(board, piece, piece.position())
    }

    /// Whether moving the piece down one row would collide.
    pub fn is_touching_ground(&mut self, board: &Board, piece: &Piece) -> bool {
        !self.is_valid_position(board, piece, piece.position().offset(0, 1))
    }

    pub fn is_touching_wall(&mut self, board: &Board, piece: &Piece) -> WallContact {
        WallContact {
            left: !self.is_valid_position(board, piece, piece.position().offset(-1, 0)),
            right: !self.is_valid_position(board, piece, piece.position().offset(1, 0)),
        }
    }

    /// Lowest position the piece can fall to from where it stands.
    pub fn find_drop_position(&mut self, board: &Board, piece: &Piece) -> PiecePosition {
        let mut position = piece.position();
        while self.is_valid_position(board, piece, position.offset(0, 1)) {
            position = position.offset(0, 1);
        }
        position
    }

    /// Counts occupied diagonal corners around a T piece.
    ///
    /// Three or four occupied corners grade a full T-spin, exactly two a mini.
    /// Front and back corners are not distinguished. Out-of-bounds corners
    /// count as occupied. Other kinds always report [`TSpinKind::None`].
    #[must_use]
    pub fn check_t_spin_conditions(&self, board: &Board, piece: &Piece) -> TSpinCheck {
        if piece.kind() != PieceKind::T {
            return TSpinCheck::default();
        }
        let position = piece.position();
        let filled_corners: u8 = T_CORNERS
            .iter()
            .map(|&(dx, dy)| u8::from(board.is_occupied(position.x + dx, position.y + dy)))
            .sum();
        let kind = match filled_corners {
            3.. => TSpinKind::Full,
            2 => TSpinKind::Mini,
            _ => TSpinKind::None,
        };
        TSpinCheck {
            kind,
            filled_corners,
        }
    }

    #[must_use]
    pub fn validate(&self) -> Validation {
        let mut validation = Validation::new();
        if self.entries.len() > self.capacity {
            validation.error(format!(
                "cache holds {} entries, capacity is {}",
                self.entries.len(),
                self.capacity
            ));
        }
        if self.entries.len() != self.order.len() {
            validation.error(format!(
                "cache map has {} entries but eviction queue has {}",
                self.entries.len(),
                self.order.len()
            ));
        }
        if self.order.iter().any(|key| !self.entries.contains_key(key)) {
            validation.error("eviction queue references evicted keys");
        }
        validation
    }
}
