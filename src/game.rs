//! Game session: one deal and everything a player does to it.
//!
//! The board's progress is the removed-set alone. Free flags, remaining count,
//! score and the win condition are all derived from it together with the
//! dealt kinds, so `undo` only has to pop one record to restore them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::cache::{CachedShuffle, MemoryStore, ShuffleStore, Signature};
use crate::clock::{Clock, SystemClock};
use crate::config::GameConfig;
use crate::error::GameError;
use crate::layout::{get_layout, Layout, Position};
use crate::solver::{self, SolveReport, SolverBudget};
use crate::tiles::{self, Kind, Tile, TileId};
use crate::topology::{TileMask, Topology};

/// Collaborators and tunables for a session.
#[derive(Clone)]
pub struct GameOptions {
    pub config: GameConfig,
    pub clock: Arc<dyn Clock>,
    /// Shared across sessions to reuse verified shuffles.
    pub store: Arc<dyn ShuffleStore>,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            config: GameConfig::default(),
            clock: Arc::new(SystemClock::new()),
            store: Arc::new(MemoryStore::default()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct MatchRecord {
    slots: (usize, usize),
    combo: u32,
    score: u32,
    at: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchOutcome {
    pub tile_a: TileId,
    pub tile_b: TileId,
    pub score: u32,
    pub combo: u32,
    /// The previous streak timed out before this match.
    pub combo_broken: bool,
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HintOutcome {
    pub tile_a: TileId,
    pub tile_b: TileId,
    pub hints_remaining: u32,
}

/// Where a shuffle's assignment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShuffleSource {
    /// A verified assignment reused from the shuffle cache.
    Cache,
    /// A fresh permutation the solver proved clearable.
    Search,
    /// No permutation was proven within budget; applied unverified.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShuffleOutcome {
    pub guaranteed_solvable: bool,
    pub source: ShuffleSource,
    pub penalty_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileView {
    pub id: TileId,
    pub kind: Kind,
    pub position: Position,
    pub free: bool,
}

/// Read-only projection of a session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameState {
    pub layout: String,
    pub seed: Option<String>,
    /// Remaining tiles in catalog order.
    pub tiles: Vec<TileView>,
    pub remaining: usize,
    pub elapsed_secs: u64,
    pub score: u32,
    pub won: bool,
    /// Tiles remain but no legal match exists.
    pub stuck: bool,
    pub valid_matches: usize,
    pub hints_remaining: u32,
    pub can_undo: bool,
    pub combo: u32,
    pub combo_millis_left: u64,
    pub deal_verified: bool,
    /// Verification flag of the latest shuffle, if any.
    pub shuffle_verified: Option<bool>,
}

/// Result of dealing a board for a new session.
struct Deal {
    tiles: Vec<Tile>,
    verified: bool,
}

pub struct Game {
    topology: Topology,
    tiles: Vec<Tile>,
    removed: TileMask,
    history: Vec<MatchRecord>,
    combo: u32,
    last_match_at: Option<Duration>,
    hints_used: u32,
    started_at: Duration,
    penalty: Duration,
    deal_verified: bool,
    shuffle_verified: Option<bool>,
    seed: Option<String>,
    rng: ChaCha8Rng,
    config: GameConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn ShuffleStore>,
}

impl Game {
    /// Deals a catalog layout with default collaborators.
    pub fn new(layout_name: &str, seed: Option<&str>) -> Self {
        Self::with_options(get_layout(layout_name), seed, GameOptions::default())
    }

    /// Deals `layout`, retrying until the solver proves the deal clearable or
    /// the attempt and time limits run out.
    ///
    /// A seeded deal ignores wall-clock limits so every client gets the same
    /// board; the per-attempt step cap still bounds the work.
    pub fn with_options(layout: Layout, seed: Option<&str>, options: GameOptions) -> Self {
        let topology = Topology::new(layout);
        let deal = deal_board(&topology, seed, &options.config);
        log::info!(
            "dealt {} ({} tiles, seed {:?}, verified: {})",
            topology.layout().name,
            topology.len(),
            seed,
            deal.verified
        );
        Self::assemble(topology, deal, seed, options)
    }

    /// Builds a session from explicit kinds in catalog order, without retries.
    ///
    /// Panics if `kinds` does not cover the layout or a kind appears an odd
    /// number of times.
    pub fn from_kinds(layout: Layout, kinds: Vec<Kind>, seed: Option<&str>, options: GameOptions) -> Self {
        assert_eq!(
            kinds.len(),
            layout.len(),
            "kind count must match position count"
        );
        let mut counts: FxHashMap<Kind, usize> = FxHashMap::default();
        for &kind in &kinds {
            *counts.entry(kind).or_insert(0) += 1;
        }
        if let Some((kind, count)) = counts.iter().find(|(_, count)| **count % 2 != 0) {
            panic!("kind {kind} appears {count} times; kinds must come in pairs");
        }

        let topology = Topology::new(layout);
        let tiles: Vec<Tile> = topology
            .layout()
            .positions
            .iter()
            .zip(kinds)
            .enumerate()
            .map(|(slot, (&position, kind))| Tile {
                id: TileId(slot as u32),
                position,
                kind,
            })
            .collect();
        let budget = deal_budget(&options.config, seed);
        let verified = solver::is_solvable(&topology, &tiles, &topology.empty_mask(), budget);
        Self::assemble(topology, Deal { tiles, verified }, seed, options)
    }

    fn assemble(topology: Topology, deal: Deal, seed: Option<&str>, options: GameOptions) -> Self {
        let started_at = options.clock.now();
        Self {
            removed: topology.empty_mask(),
            topology,
            tiles: deal.tiles,
            history: Vec::new(),
            combo: 0,
            last_match_at: None,
            hints_used: 0,
            started_at,
            penalty: Duration::ZERO,
            deal_verified: deal.verified,
            shuffle_verified: None,
            seed: seed.map(str::to_string),
            rng: tiles::rng_for(seed.map(|s| format!("{s}#shuffle")).as_deref()),
            config: options.config,
            clock: options.clock,
            store: options.store,
        }
    }

    pub fn layout(&self) -> &Layout {
        self.topology.layout()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Every dealt tile, removed or not, indexed by slot.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.slot())
    }

    pub fn removed(&self) -> &TileMask {
        &self.removed
    }

    pub fn seed(&self) -> Option<&str> {
        self.seed.as_deref()
    }

    pub fn is_removed(&self, id: TileId) -> bool {
        self.removed.contains(id.slot())
    }

    pub fn is_free(&self, id: TileId) -> bool {
        id.slot() < self.tiles.len() && self.topology.is_free(&self.removed, id.slot())
    }

    pub fn remaining(&self) -> usize {
        self.tiles.len() - self.removed.len()
    }

    pub fn is_won(&self) -> bool {
        self.remaining() == 0
    }

    pub fn score(&self) -> u32 {
        self.history.iter().map(|record| record.score).sum()
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn hints_remaining(&self) -> u32 {
        self.config.hint_limit.saturating_sub(self.hints_used)
    }

    pub fn deal_verified(&self) -> bool {
        self.deal_verified
    }

    /// Every legal match right now.
    pub fn valid_matches(&self) -> Vec<(TileId, TileId)> {
        solver::valid_matches(&self.topology, &self.tiles, &self.removed)
            .into_iter()
            .map(|(a, b)| (self.tiles[a].id, self.tiles[b].id))
            .collect()
    }

    /// Runs the solver from the current removed-set.
    pub fn solve(&self, budget: SolverBudget) -> SolveReport {
        solver::solve(&self.topology, &self.tiles, &self.removed, budget)
    }

    /// A clearing sequence from the current position, if one is found.
    pub fn solution(&self, budget: SolverBudget) -> Option<Vec<(TileId, TileId)>> {
        match self.solve(budget).verdict {
            solver::Verdict::Solvable(line) => Some(
                line.into_iter()
                    .map(|(a, b)| (self.tiles[a].id, self.tiles[b].id))
                    .collect(),
            ),
            _ => None,
        }
    }

    fn slot(&self, id: TileId) -> Result<usize, GameError> {
        let slot = id.slot();
        if slot < self.tiles.len() {
            Ok(slot)
        } else {
            Err(GameError::UnknownTile(id))
        }
    }

    /// Removes a matching pair of free tiles and scores it.
    ///
    /// The combo grows by one per match; if the previous match is older than
    /// the combo window the streak restarts at one and `combo_broken` is set.
    pub fn match_tiles(&mut self, a: TileId, b: TileId) -> Result<MatchOutcome, GameError> {
        let slot_a = self.slot(a)?;
        let slot_b = self.slot(b)?;
        if slot_a == slot_b {
            return Err(GameError::SameTile);
        }
        if !self.tiles[slot_a].kind.matches(self.tiles[slot_b].kind) {
            return Err(GameError::KindMismatch);
        }
        for (slot, id) in [(slot_a, a), (slot_b, b)] {
            if self.removed.contains(slot) {
                return Err(GameError::AlreadyRemoved(id));
            }
        }
        for (slot, id) in [(slot_a, a), (slot_b, b)] {
            if !self.topology.is_free(&self.removed, slot) {
                return Err(GameError::Blocked(id));
            }
        }

        let now = self.clock.now();
        let combo_broken = self.combo > 0
            && self
                .last_match_at
                .is_some_and(|at| now.saturating_sub(at) > self.config.combo_window);
        if combo_broken {
            self.combo = 0;
        }
        self.combo += 1;
        let score = self.config.base_points * self.combo;

        self.removed.insert(slot_a);
        self.removed.insert(slot_b);
        self.last_match_at = Some(now);
        self.history.push(MatchRecord {
            slots: (slot_a, slot_b),
            combo: self.combo,
            score,
            at: now,
        });

        Ok(MatchOutcome {
            tile_a: a,
            tile_b: b,
            score,
            combo: self.combo,
            combo_broken,
            won: self.is_won(),
        })
    }

    /// Restores the most recently matched pair.
    pub fn undo(&mut self) -> Result<(), GameError> {
        let record = self.history.pop().ok_or(GameError::NothingToUndo)?;
        self.removed.remove(record.slots.0);
        self.removed.remove(record.slots.1);
        let previous = self.history.last();
        self.combo = previous.map_or(0, |r| r.combo);
        self.last_match_at = previous.map(|r| r.at);
        Ok(())
    }

    /// Suggests a legal match, preferring pairs that reach the highest layers.
    pub fn hint(&mut self) -> Result<HintOutcome, GameError> {
        if self.hints_used >= self.config.hint_limit {
            return Err(GameError::NoHintsLeft);
        }
        let layer = |slot: usize| self.tiles[slot].position.layer;
        let best = solver::valid_matches(&self.topology, &self.tiles, &self.removed)
            .into_iter()
            .max_by_key(|&(a, b)| {
                (
                    layer(a).max(layer(b)),
                    layer(a).min(layer(b)),
                    std::cmp::Reverse((a, b)),
                )
            })
            .ok_or(GameError::NoMoves)?;

        self.hints_used += 1;
        Ok(HintOutcome {
            tile_a: self.tiles[best.0].id,
            tile_b: self.tiles[best.1].id,
            hints_remaining: self.hints_remaining(),
        })
    }

    /// Redistributes the kinds of the remaining tiles.
    ///
    /// Reuses a cached verified assignment when one fits the live board,
    /// otherwise searches permutations until the solver proves one clearable.
    /// When none is proven in budget a permutation is still applied, preferring
    /// one with a legal move, and reported as not guaranteed. Forfeits the combo
    /// and adds the shuffle penalty to the clock.
    pub fn shuffle(&mut self) -> Result<ShuffleOutcome, GameError> {
        let remaining: Vec<usize> = self.topology.remaining_slots(&self.removed).collect();
        if remaining.is_empty() {
            return Err(GameError::NoTilesLeft);
        }
        let ids: Vec<TileId> = remaining.iter().map(|&slot| self.tiles[slot].id).collect();
        let positions: Vec<Position> = remaining.iter().map(|&slot| self.tiles[slot].position).collect();
        let live_kinds: Vec<Kind> = remaining.iter().map(|&slot| self.tiles[slot].kind).collect();
        let signature = Signature::of(ids.iter().copied());
        let layout_name = self.topology.layout().name.clone();

        let cached = match self.store.lookup(&layout_name, &signature) {
            Some(entry) if entry.fits(&ids, &positions, &live_kinds) => {
                log::debug!("shuffle cache hit for {layout_name} ({} tiles)", ids.len());
                Some(entry.kinds)
            }
            Some(_) => {
                log::debug!("discarding stale shuffle cache entry for {layout_name}");
                None
            }
            None => None,
        };

        let (kinds, source) = match cached {
            Some(kinds) => (kinds, ShuffleSource::Cache),
            None => {
                let (kinds, verified) = self.search_shuffle(&remaining, &live_kinds);
                if verified {
                    self.store.save(
                        &layout_name,
                        signature,
                        CachedShuffle {
                            remaining: ids,
                            positions,
                            kinds: kinds.clone(),
                        },
                    );
                    (kinds, ShuffleSource::Search)
                } else {
                    log::warn!(
                        "no verified shuffle for {layout_name} with {} tiles left; applying unverified",
                        remaining.len()
                    );
                    (kinds, ShuffleSource::Fallback)
                }
            }
        };

        for (&slot, kind) in remaining.iter().zip(kinds) {
            self.tiles[slot].kind = kind;
        }
        let guaranteed_solvable = source != ShuffleSource::Fallback;
        self.combo = 0;
        self.penalty += self.config.shuffle_penalty;
        self.shuffle_verified = Some(guaranteed_solvable);

        Ok(ShuffleOutcome {
            guaranteed_solvable,
            source,
            penalty_secs: self.config.shuffle_penalty.as_secs(),
        })
    }

    /// Tries random permutations of `live_kinds` over `remaining`; returns the
    /// chosen permutation and whether the solver proved it.
    fn search_shuffle(&mut self, remaining: &[usize], live_kinds: &[Kind]) -> (Vec<Kind>, bool) {
        let started = Instant::now();
        let mut trial = self.tiles.clone();
        let mut fallback: Option<Vec<Kind>> = None;
        let mut last = live_kinds.to_vec();

        for _ in 0..self.config.shuffle_attempts.max(1) {
            let mut kinds = live_kinds.to_vec();
            kinds.shuffle(&mut self.rng);
            for (&slot, &kind) in remaining.iter().zip(&kinds) {
                trial[slot].kind = kind;
            }
            if solver::is_solvable(&self.topology, &trial, &self.removed, self.config.shuffle_budget) {
                return (kinds, true);
            }
            if fallback.is_none()
                && !solver::valid_matches(&self.topology, &trial, &self.removed).is_empty()
            {
                fallback = Some(kinds.clone());
            }
            last = kinds;
            if started.elapsed() >= self.config.shuffle_time_box {
                break;
            }
        }

        (fallback.unwrap_or(last), false)
    }

    /// Snapshot of everything the presentation layer shows.
    pub fn state(&self) -> GameState {
        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.started_at) + self.penalty;
        let combo_left = match self.last_match_at {
            Some(at) if self.combo > 0 => self.config.combo_window.saturating_sub(now.saturating_sub(at)),
            _ => Duration::ZERO,
        };
        let tiles: Vec<TileView> = self
            .topology
            .remaining_slots(&self.removed)
            .map(|slot| TileView {
                id: self.tiles[slot].id,
                kind: self.tiles[slot].kind,
                position: self.tiles[slot].position,
                free: self.topology.is_free(&self.removed, slot),
            })
            .collect();
        let valid_matches = solver::valid_matches(&self.topology, &self.tiles, &self.removed).len();
        let remaining = tiles.len();

        GameState {
            layout: self.topology.layout().name.clone(),
            seed: self.seed.clone(),
            tiles,
            remaining,
            elapsed_secs: elapsed.as_secs(),
            score: self.score(),
            won: remaining == 0,
            stuck: remaining > 0 && valid_matches == 0,
            valid_matches,
            hints_remaining: self.hints_remaining(),
            can_undo: !self.history.is_empty(),
            combo: self.combo,
            combo_millis_left: combo_left.as_millis() as u64,
            deal_verified: self.deal_verified,
            shuffle_verified: self.shuffle_verified,
        }
    }

    /// Renders each layer as a grid of kind codes; `..` marks an empty or
    /// cleared cell and `*` follows a free tile.
    pub fn render(&self) -> String {
        let layout = self.topology.layout();
        let (rows, cols) = layout.bounds();
        let mut output = String::new();
        for layer in 0..layout.depth() {
            output.push_str(&format!("L{layer}\n"));
            for row in 0..rows {
                let mut line = String::new();
                for col in 0..cols {
                    let position = Position::new(layer as i32, row as i32, col as i32);
                    let cell = match self.topology.slot_of(position) {
                        Some(slot) if !self.removed.contains(slot) => {
                            let marker = if self.topology.is_free(&self.removed, slot) { '*' } else { ' ' };
                            format!("{:<2}{marker}", self.tiles[slot].kind.to_string())
                        }
                        _ => ".. ".to_string(),
                    };
                    line.push_str(&cell);
                    line.push(' ');
                }
                output.push_str(line.trim_end());
                output.push('\n');
            }
        }
        output
    }
}

fn deal_budget(config: &GameConfig, seed: Option<&str>) -> SolverBudget {
    match seed {
        Some(_) => config.deal_budget.without_time_limit(),
        None => config.deal_budget,
    }
}

/// Seed for the `attempt`-th deal of a seeded game.
fn attempt_seed(seed: &str, attempt: u32) -> String {
    if attempt == 0 {
        seed.to_string()
    } else {
        format!("{seed}#{attempt}")
    }
}

fn deal_board(topology: &Topology, seed: Option<&str>, config: &GameConfig) -> Deal {
    let started = Instant::now();
    let budget = deal_budget(config, seed);
    let empty = topology.empty_mask();
    let positions = &topology.layout().positions;

    let mut attempt = 0;
    loop {
        let tiles = match seed {
            Some(seed) => tiles::deal(positions, Some(&attempt_seed(seed, attempt))),
            None => tiles::deal(positions, None),
        };
        let verified = solver::is_solvable(topology, &tiles, &empty, budget);
        attempt += 1;

        let out_of_time = seed.is_none() && started.elapsed() >= config.deal_time_box;
        if verified || attempt >= config.deal_attempts || out_of_time {
            if !verified {
                log::warn!(
                    "no deal for {} proven solvable after {attempt} attempts; accepting last",
                    topology.layout().name
                );
            }
            return Deal { tiles, verified };
        }
    }
}
