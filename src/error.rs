//! Failure values returned by session operations.

use serde::Serialize;

use crate::tiles::TileId;

/// How a caller should present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    /// The request itself was invalid ("that's not a match").
    UserInput,
    /// A finite resource ran out ("no hints left", "no moves").
    Exhausted,
}

/// A rejected session operation. The session is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("tile {0} not found")]
    UnknownTile(TileId),
    #[error("same tile selected twice")]
    SameTile,
    #[error("tiles do not match")]
    KindMismatch,
    #[error("tile {0} already removed")]
    AlreadyRemoved(TileId),
    #[error("tile {0} is blocked")]
    Blocked(TileId),
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("no hints left")]
    NoHintsLeft,
    #[error("no moves")]
    NoMoves,
    #[error("no tiles left")]
    NoTilesLeft,
}

impl GameError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownTile(_)
            | Self::SameTile
            | Self::KindMismatch
            | Self::AlreadyRemoved(_)
            | Self::Blocked(_) => ErrorCategory::UserInput,
            Self::NothingToUndo | Self::NoHintsLeft | Self::NoMoves | Self::NoTilesLeft => {
                ErrorCategory::Exhausted
            }
        }
    }
}
