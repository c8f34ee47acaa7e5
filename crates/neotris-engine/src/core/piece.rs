use std::str::FromStr;

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};

use super::catalog;

/// A tetromino at a specific location and orientation.
///
/// Pieces are immutable values: every movement or rotation returns a new
/// `Piece`, which keeps failed attempts free of side effects. The block
/// offsets are derived from the catalog and recomputed whenever a new
/// rotation is produced.
///
/// # Example
///
/// ```
/// use neotris_engine::{Piece, PieceCommand, PieceKind, PiecePosition};
///
/// let piece = Piece::new(PieceKind::T, PiecePosition::new(3, 2));
/// let moved = piece.apply(PieceCommand::MoveRight);
/// assert_eq!(moved.position(), PiecePosition::new(4, 2));
/// assert_eq!(piece.position(), PiecePosition::new(3, 2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "PieceRecord", try_from = "PieceRecord")]
pub struct Piece {
    kind: PieceKind,
    rotation: Rotation,
    position: PiecePosition,
    blocks: ArrayVec<(i32, i32), 4>,
    is_locked: bool,
    move_count: u32,
    rotation_count: u32,
}

/// Plain-object layout of a [`Piece`] used for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceRecord {
    #[serde(rename = "type")]
    pub kind: PieceKind,
    pub rotation: u8,
    pub position: PiecePosition,
    pub is_locked: bool,
    pub move_count: u32,
    pub rotation_count: u32,
}

impl From<Piece> for PieceRecord {
    fn from(piece: Piece) -> Self {
        Self {
            kind: piece.kind,
            rotation: piece.rotation.as_u8(),
            position: piece.position,
            is_locked: piece.is_locked,
            move_count: piece.move_count,
            rotation_count: piece.rotation_count,
        }
    }
}

impl TryFrom<PieceRecord> for Piece {
    type Error = InvalidRotationError;

    fn try_from(record: PieceRecord) -> Result<Self, Self::Error> {
        let rotation = Rotation::new(record.rotation)?;
        Ok(Self {
            kind: record.kind,
            rotation,
            position: record.position,
            blocks: catalog::block_offsets(record.kind, rotation),
            is_locked: record.is_locked,
            move_count: record.move_count,
            rotation_count: record.rotation_count,
        })
    }
}

/// A transform that can be applied to a [`Piece`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceCommand {
    MoveLeft,
    MoveRight,
    MoveDown,
    MoveUp,
    /// Naive rotation in place, without wall kicks.
    Rotate(RotationDirection),
    Translate { dx: i32, dy: i32 },
    MoveTo(PiecePosition),
    Lock,
}

impl Piece {
    /// Creates an unlocked piece in its spawn orientation.
    #[must_use]
    pub fn new(kind: PieceKind, position: PiecePosition) -> Self {
        Self::with_rotation(kind, Rotation::SPAWN, position)
    }

    #[must_use]
    pub fn with_rotation(kind: PieceKind, rotation: Rotation, position: PiecePosition) -> Self {
        Self {
            kind,
            rotation,
            position,
            blocks: catalog::block_offsets(kind, rotation),
            is_locked: false,
            move_count: 0,
            rotation_count: 0,
        }
    }

    #[must_use]
    pub fn kind(&self) -> PieceKind {
        self.kind
    }

    #[must_use]
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    #[must_use]
    pub fn position(&self) -> PiecePosition {
        self.position
    }

    /// Occupied cells relative to the piece position.
    #[must_use]
    pub fn blocks(&self) -> &[(i32, i32)] {
        &self.blocks
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    #[must_use]
    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    #[must_use]
    pub fn rotation_count(&self) -> u32 {
        self.rotation_count
    }

    /// Occupied cells in board coordinates.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.cells_at(self.position)
    }

    /// Occupied cells in board coordinates if the piece stood at `position`.
    pub fn cells_at(&self, position: PiecePosition) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.blocks
            .iter()
            .map(move |&(dx, dy)| (position.x + dx, position.y + dy))
    }

    /// Returns the piece produced by `command`.
    #[must_use]
    pub fn apply(&self, command: PieceCommand) -> Self {
        match command {
            PieceCommand::MoveLeft => self.moved_to(self.position.offset(-1, 0)),
            PieceCommand::MoveRight => self.moved_to(self.position.offset(1, 0)),
            PieceCommand::MoveDown => self.moved_to(self.position.offset(0, 1)),
            PieceCommand::MoveUp => self.moved_to(self.position.offset(0, -1)),
            PieceCommand::Rotate(direction) => {
                self.transformed(self.rotation.rotated(direction), self.position)
            }
            PieceCommand::Translate { dx, dy } => self.moved_to(self.position.offset(dx, dy)),
            PieceCommand::MoveTo(position) => self.moved_to(position),
            PieceCommand::Lock => Self {
                is_locked: true,
                ..self.clone()
            },
        }
    }

    /// Returns the piece at `position`, counting it as one move.
    #[must_use]
    pub fn moved_to(&self, position: PiecePosition) -> Self {
        self.transformed(self.rotation, position)
    }

    /// Returns the piece with a new rotation and position.
    ///
    /// Block offsets are recomputed when the rotation differs.
    #[must_use]
    pub fn transformed(&self, rotation: Rotation, position: PiecePosition) -> Self {
        let rotated = rotation != self.rotation;
        Self {
            kind: self.kind,
            rotation,
            position,
            blocks: if rotated {
                catalog::block_offsets(self.kind, rotation)
            } else {
                self.blocks.clone()
            },
            is_locked: self.is_locked,
            move_count: self.move_count + u32::from(position != self.position),
            rotation_count: self.rotation_count + u32::from(rotated),
        }
    }
}

/// Position of a piece's 4×4 box on the board.
///
/// The anchor is the top-left corner of the box; y grows downward and may be
/// negative while part of the box hangs above the board.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PiecePosition {
    pub x: i32,
    pub y: i32,
}

impl PiecePosition {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Rotation state of a piece, always normalized modulo 4.
///
/// - `0`: spawn orientation
/// - `1`: 90° clockwise
/// - `2`: 180°
/// - `3`: 270° clockwise (90° counterclockwise)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct Rotation(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("rotation must be 0-3, got {_0}")]
pub struct InvalidRotationError(#[error(not(source))] pub u8);

impl TryFrom<u8> for Rotation {
    type Error = InvalidRotationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rotation> for u8 {
    fn from(rotation: Rotation) -> Self {
        rotation.0
    }
}

impl Rotation {
    pub const SPAWN: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const REVERSE: Self = Self(2);
    pub const LEFT: Self = Self(3);
    pub const ALL: [Self; 4] = [Self::SPAWN, Self::RIGHT, Self::REVERSE, Self::LEFT];

    pub const fn new(value: u8) -> Result<Self, InvalidRotationError> {
        if value > 3 {
            return Err(InvalidRotationError(value));
        }
        Ok(Self(value))
    }

    /// Builds a rotation from any number of clockwise quarter turns.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn from_steps(steps: i32) -> Self {
        Self(steps.rem_euclid(4) as u8)
    }

    #[must_use]
    pub const fn rotated(self, direction: RotationDirection) -> Self {
        Self::from_steps(self.0 as i32 + direction.steps())
    }

    #[must_use]
    pub const fn rotated_right(self) -> Self {
        self.rotated(RotationDirection::Clockwise)
    }

    #[must_use]
    pub const fn rotated_left(self) -> Self {
        self.rotated(RotationDirection::CounterClockwise)
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RotationDirection {
    Clockwise,
    CounterClockwise,
}

impl RotationDirection {
    #[must_use]
    pub const fn steps(self) -> i32 {
        match self {
            RotationDirection::Clockwise => 1,
            RotationDirection::CounterClockwise => -1,
        }
    }
}

/// Enum representing the type of piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[repr(u8)]
pub enum PieceKind {
    I = 0,
    O = 1,
    T = 2,
    S = 3,
    Z = 4,
    J = 5,
    L = 6,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown piece kind: {_0:?}")]
pub struct UnknownPieceKindError(#[error(not(source))] pub String);

impl FromStr for PieceKind {
    type Err = UnknownPieceKindError;

    /// Parses a single-letter piece name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c.to_ascii_uppercase()),
            _ => None,
        }
        .ok_or_else(|| UnknownPieceKindError(s.to_owned()))
    }
}

impl PieceKind {
    /// Number of piece types (7).
    pub const LEN: usize = 7;

    pub const ALL: [Self; Self::LEN] = [
        PieceKind::I,
        PieceKind::O,
        PieceKind::T,
        PieceKind::S,
        PieceKind::Z,
        PieceKind::J,
        PieceKind::L,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Guideline colour of the piece.
    #[must_use]
    pub fn color(self) -> &'static str {
        catalog::properties(self).color
    }

    /// Returns the single character representation of this piece kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use neotris_engine::PieceKind;
    ///
    /// assert_eq!(PieceKind::I.as_char(), 'I');
    /// assert_eq!(PieceKind::T.as_char(), 'T');
    /// ```
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            PieceKind::I => 'I',
            PieceKind::O => 'O',
            PieceKind::T => 'T',
            PieceKind::S => 'S',
            PieceKind::Z => 'Z',
            PieceKind::J => 'J',
            PieceKind::L => 'L',
        }
    }

    /// Parses a piece kind from a single character.
    ///
    /// # Examples
    ///
    /// ```
    /// use neotris_engine::PieceKind;
    ///
    /// assert_eq!(PieceKind::from_char('I'), Some(PieceKind::I));
    /// assert_eq!(PieceKind::from_char('X'), None);
    /// ```
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'I' => Some(PieceKind::I),
            'O' => Some(PieceKind::O),
            'T' => Some(PieceKind::T),
            'S' => Some(PieceKind::S),
            'Z' => Some(PieceKind::Z),
            'J' => Some(PieceKind::J),
            'L' => Some(PieceKind::L),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_closure() {
        for kind in PieceKind::ALL {
            for start in Rotation::ALL {
                let piece = Piece::with_rotation(kind, start, PiecePosition::new(3, 3));
                let mut rotated = piece.clone();
                for _ in 0..4 {
                    rotated = rotated.apply(PieceCommand::Rotate(RotationDirection::Clockwise));
                }
                assert_eq!(rotated.rotation(), start);
                assert_eq!(rotated.blocks(), piece.blocks());
                assert_eq!(rotated.rotation_count(), 4);
            }
        }
    }

    #[test]
    fn test_rotation_normalization() {
        assert_eq!(Rotation::from_steps(-1), Rotation::LEFT);
        assert_eq!(Rotation::from_steps(9), Rotation::RIGHT);
        assert_eq!(Rotation::SPAWN.rotated_left(), Rotation::LEFT);
        assert_eq!(Rotation::LEFT.rotated_right(), Rotation::SPAWN);
        assert_eq!(Rotation::new(4), Err(InvalidRotationError(4)));
    }

    #[test]
    fn test_blocks_recomputed_on_rotation() {
        let piece = Piece::new(PieceKind::I, PiecePosition::new(0, 0));
        assert_eq!(piece.blocks(), &[(0, 1), (1, 1), (2, 1), (3, 1)]);
        let rotated = piece.apply(PieceCommand::Rotate(RotationDirection::Clockwise));
        assert_eq!(rotated.blocks(), &[(2, 0), (2, 1), (2, 2), (2, 3)]);
    }

    #[test]
    fn test_apply_is_pure() {
        let piece = Piece::new(PieceKind::S, PiecePosition::new(4, 0));
        let moved = piece
            .apply(PieceCommand::MoveLeft)
            .apply(PieceCommand::MoveDown)
            .apply(PieceCommand::Translate { dx: 2, dy: 3 });
        assert_eq!(piece.position(), PiecePosition::new(4, 0));
        assert_eq!(piece.move_count(), 0);
        assert_eq!(moved.position(), PiecePosition::new(5, 4));
        assert_eq!(moved.move_count(), 3);

        let locked = moved.apply(PieceCommand::Lock);
        assert!(locked.is_locked());
        assert!(!moved.is_locked());
    }

    #[test]
    fn test_cells_are_world_coordinates() {
        let piece = Piece::new(PieceKind::O, PiecePosition::new(4, 10));
        let cells: Vec<_> = piece.cells().collect();
        assert_eq!(cells, [(4, 10), (5, 10), (4, 11), (5, 11)]);
    }

    #[test]
    fn test_piece_serialization() {
        let piece = Piece::new(PieceKind::T, PiecePosition::new(4, 18))
            .apply(PieceCommand::Rotate(RotationDirection::Clockwise));
        let value = serde_json::to_value(&piece).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "T",
                "rotation": 1,
                "position": { "x": 4, "y": 18 },
                "isLocked": false,
                "moveCount": 0,
                "rotationCount": 1,
            })
        );

        let deserialized: Piece = serde_json::from_value(value).unwrap();
        assert_eq!(deserialized, piece);
    }

    #[test]
    fn test_piece_deserialization_rejects_bad_rotation() {
        let json = r#"{"type":"S","rotation":4,"position":{"x":0,"y":0},
            "isLocked":false,"moveCount":0,"rotationCount":0}"#;
        assert!(serde_json::from_str::<Piece>(json).is_err());
        let json = r#"{"type":"X","rotation":0,"position":{"x":0,"y":0},
            "isLocked":false,"moveCount":0,"rotationCount":0}"#;
        assert!(serde_json::from_str::<Piece>(json).is_err());
    }

    #[test]
    fn test_piece_kind_parsing() {
        assert_eq!("t".parse::<PieceKind>(), Ok(PieceKind::T));
        assert_eq!("L".parse::<PieceKind>(), Ok(PieceKind::L));
        assert!("X".parse::<PieceKind>().is_err());
        assert!("TT".parse::<PieceKind>().is_err());
        assert!("".parse::<PieceKind>().is_err());
    }

    #[test]
    fn test_piece_kind_char_conversion() {
        for kind in PieceKind::ALL {
            assert_eq!(PieceKind::from_char(kind.as_char()), Some(kind));
        }
        assert_eq!(PieceKind::from_char('x'), None);
    }
}
