//! Mahjong Solitaire Engine Library
//!
//! Game state and solvability engine for Shanghai-style tile matching: fixed
//! 3D layouts, freeness, seeded dealing, match/undo/hint/shuffle with combo
//! scoring, and a bounded backtracking solver that keeps new deals and
//! shuffles winnable.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod game;
pub mod layout;
pub mod solver;
pub mod tiles;
pub mod topology;

pub use error::{ErrorCategory, GameError};
pub use game::{Game, GameOptions, GameState};
pub use layout::{get_layout, Layout, Position};
pub use tiles::{Kind, Tile, TileId};

/// Starts a session on a catalog layout, optionally seeded for a reproducible deal.
///
/// The session gets a private in-memory shuffle cache. To reuse verified
/// shuffles across sessions, build them with [`Game::with_options`] and one
/// shared [`cache::ShuffleStore`] in [`GameOptions::store`].
pub fn create_game(layout_name: &str, seed: Option<&str>) -> Game {
    Game::new(layout_name, seed)
}
