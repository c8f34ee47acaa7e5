pub use self::{board::*, catalog::PieceProperties, piece::*};

pub(crate) mod board;
pub mod catalog;
pub(crate) mod piece;
