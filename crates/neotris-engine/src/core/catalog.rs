//! Static tetromino data: rotation matrices, SRS wall-kick tables and
//! per-kind spawn properties.
//!
//! Everything here is computed at compile time and consumed read-only by the
//! rest of the engine.
//!
//! # Coordinates
//!
//! Every piece lives in a 4×4 box addressed as `matrix[row][column]`. Row 0 is
//! the top of the box and y grows downward, matching the board. Kick offsets
//! are stored in the same y-down convention, so a kick `(dx, dy)` is added
//! to the piece position unchanged.

use arrayvec::ArrayVec;

use super::piece::{PieceKind, Rotation};

/// Occupancy of a piece's 4×4 bounding box.
pub type Matrix = [[bool; 4]; 4];

/// Ordered `(dx, dy)` candidates tried when resolving a rotation.
pub type KickOffsets = &'static [(i32, i32)];

/// Generates all 4 rotation states of a matrix by rotating 90° clockwise.
///
/// `size` is the side of the square the piece actually rotates in: 4 for I,
/// 2 for O and 3 for the rest. Rotating inside that square (rather than the
/// full 4×4 box) yields the SRS spawn-relative states.
const fn matrix_rotations(size: usize, matrix: Matrix) -> [Matrix; 4] {
    let mut rotations = [matrix; 4];
    let mut i = 1;
    while i < 4 {
        let mut rotated = [[false; 4]; 4];
        let mut y = 0;
        while y < size {
            let mut x = 0;
            while x < size {
                rotated[y][x] = rotations[i - 1][size - 1 - x][y];
                x += 1;
            }
            y += 1;
        }
        rotations[i] = rotated;
        i += 1;
    }
    rotations
}

const MATRICES: [[Matrix; 4]; PieceKind::LEN] = {
    const C: bool = true;
    const E: bool = false;
    const EEEE: [bool; 4] = [E; 4];
    [
        // I-piece
        matrix_rotations(4, [EEEE, [C, C, C, C], EEEE, EEEE]),
        // O-piece
        matrix_rotations(2, [[C, C, E, E], [C, C, E, E], EEEE, EEEE]),
        // T-piece
        matrix_rotations(3, [[E, C, E, E], [C, C, C, E], EEEE, EEEE]),
        // S-piece
        matrix_rotations(3, [[E, C, C, E], [C, C, E, E], EEEE, EEEE]),
        // Z-piece
        matrix_rotations(3, [[C, C, E, E], [E, C, C, E], EEEE, EEEE]),
        // J-piece
        matrix_rotations(3, [[C, E, E, E], [C, C, C, E], EEEE, EEEE]),
        // L-piece
        matrix_rotations(3, [[E, E, C, E], [C, C, C, E], EEEE, EEEE]),
    ]
};

// Transition order shared by both kick tables:
// 0->1, 1->0, 1->2, 2->1, 2->3, 3->2, 3->0, 0->3
const TRANSITIONS: [(u8, u8); 8] = [
    (0, 1),
    (1, 0),
    (1, 2),
    (2, 1),
    (2, 3),
    (3, 2),
    (3, 0),
    (0, 3),
];

const STANDARD_KICKS: [[(i32, i32); 5]; 8] = [
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
];

const I_KICKS: [[(i32, i32); 5]; 8] = [
    [(0, 0), (-2, 0), (1, 0), (-2, 1), (1, -2)],
    [(0, 0), (2, 0), (-1, 0), (2, -1), (-1, 2)],
    [(0, 0), (-1, 0), (2, 0), (-1, -2), (2, 1)],
    [(0, 0), (1, 0), (-2, 0), (1, 2), (-2, -1)],
    [(0, 0), (2, 0), (-1, 0), (2, -1), (-1, 2)],
    [(0, 0), (-2, 0), (1, 0), (-2, 1), (1, -2)],
    [(0, 0), (1, 0), (-2, 0), (1, 2), (-2, -1)],
    [(0, 0), (-1, 0), (2, 0), (-1, -2), (2, 1)],
];

const NO_KICK: [(i32, i32); 1] = [(0, 0)];

/// Spawn and rendering metadata for a piece kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieceProperties {
    /// Adjustment applied to the generic spawn anchor.
    pub spawn_offset: (i32, i32),
    /// Rotation centre inside the 4×4 box, in cells.
    pub center_offset: (f32, f32),
    /// Width of the square the piece rotates in.
    pub box_width: i32,
    /// Guideline colour as `#rrggbb`.
    pub color: &'static str,
}

const PROPERTIES: [PieceProperties; PieceKind::LEN] = [
    // I-piece: its cells sit on row 1 of the box
    PieceProperties {
        spawn_offset: (0, -1),
        center_offset: (1.5, 1.5),
        box_width: 4,
        color: "#00f0f0",
    },
    PieceProperties {
        spawn_offset: (0, 0),
        center_offset: (0.5, 0.5),
        box_width: 2,
        color: "#f0f000",
    },
    PieceProperties {
        spawn_offset: (0, 0),
        center_offset: (1.0, 1.0),
        box_width: 3,
        color: "#a000f0",
    },
    PieceProperties {
        spawn_offset: (0, 0),
        center_offset: (1.0, 1.0),
        box_width: 3,
        color: "#00f000",
    },
    PieceProperties {
        spawn_offset: (0, 0),
        center_offset: (1.0, 1.0),
        box_width: 3,
        color: "#f00000",
    },
    PieceProperties {
        spawn_offset: (0, 0),
        center_offset: (1.0, 1.0),
        box_width: 3,
        color: "#0000f0",
    },
    PieceProperties {
        spawn_offset: (0, 0),
        center_offset: (1.0, 1.0),
        box_width: 3,
        color: "#f0a000",
    },
];

/// Returns the 4×4 occupancy matrix of `kind` at `rotation`.
#[must_use]
pub fn matrix(kind: PieceKind, rotation: Rotation) -> &'static Matrix {
    &MATRICES[kind.index()][rotation.as_usize()]
}

/// Returns the `(dx, dy)` offsets of the occupied cells, row-major.
#[must_use]
pub fn block_offsets(kind: PieceKind, rotation: Rotation) -> ArrayVec<(i32, i32), 4> {
    let mut blocks = ArrayVec::new();
    for (dy, row) in (0..).zip(matrix(kind, rotation)) {
        for (dx, &cell) in (0..).zip(row) {
            if cell {
                blocks.push((dx, dy));
            }
        }
    }
    blocks
}

/// Returns the ordered wall-kick candidates for `from -> to`.
///
/// The first candidate is always `(0, 0)`. The O piece and non-adjacent
/// transitions only get the no-kick candidate.
#[must_use]
pub fn wall_kicks(kind: PieceKind, from: Rotation, to: Rotation) -> KickOffsets {
    let Some(index) = TRANSITIONS
        .iter()
        .position(|&(f, t)| f == from.as_u8() && t == to.as_u8())
    else {
        return &NO_KICK;
    };
    match kind {
        PieceKind::O => &NO_KICK,
        PieceKind::I => &I_KICKS[index],
        _ => &STANDARD_KICKS[index],
    }
}

/// Returns the spawn and rendering properties of `kind`.
#[must_use]
pub fn properties(kind: PieceKind) -> &'static PieceProperties {
    &PROPERTIES[kind.index()]
}
