//! Bounded backtracking solvability search.
//!
//! The search runs over sequences of matches. Each node lists the free tiles,
//! pairs them by kind, and tries each pair in turn on one shared working
//! removed-set, reverting the trial removal on the way back out.
//!
//! Key optimizations:
//! - O(1) freeness through the precomputed [`Topology`] neighbour index
//! - Kinds interned to small integers with per-kind remaining counts
//! - Forced moves: when every remaining tile of a kind is free, those tiles are
//!   matched without branching (removal never blocks another tile)
//! - FxHashSet of removed-sets already proven dead
//! - Candidate pairs ordered by descending layer, clearing tall stacks first
//!
//! Both guards are mandatory: a cap on visited nodes and an optional wall-clock
//! deadline. Hitting either yields [`Verdict::Unproven`], which callers must
//! not read as "unsolvable".

use std::time::{Duration, Instant};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::tiles::{Kind, Tile};
use crate::topology::{TileMask, Topology};

/// Deadline is polled once per this many visited nodes.
const DEADLINE_POLL_INTERVAL: usize = 128;

/// Limits for one solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverBudget {
    /// Maximum number of search nodes visited.
    pub max_steps: usize,
    /// Wall-clock limit, measured from the start of the run.
    pub time_limit: Option<Duration>,
}

impl SolverBudget {
    pub const fn steps(max_steps: usize) -> Self {
        Self {
            max_steps,
            time_limit: None,
        }
    }

    pub const fn with_time_limit(self, limit: Duration) -> Self {
        Self {
            time_limit: Some(limit),
            ..self
        }
    }

    /// The same step cap with no wall-clock limit.
    pub const fn without_time_limit(self) -> Self {
        Self {
            time_limit: None,
            ..self
        }
    }
}

impl Default for SolverBudget {
    fn default() -> Self {
        Self::steps(200_000).with_time_limit(Duration::from_millis(250))
    }
}

/// Outcome of a solver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// A full clearing sequence, as pairs of slots in play order.
    Solvable(Vec<(usize, usize)>),
    /// Every match sequence was explored and none clears the board.
    Unsolvable,
    /// A budget ran out first; solvability is unknown.
    Unproven,
}

impl Verdict {
    pub fn is_solvable(&self) -> bool {
        matches!(self, Verdict::Solvable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveReport {
    pub verdict: Verdict,
    /// Search nodes visited.
    pub steps: usize,
}

/// Searches for a sequence of legal matches that clears every tile.
///
/// `tiles` is indexed by slot; `removed` is the starting removed-set and is
/// never modified.
pub fn solve(
    topology: &Topology,
    tiles: &[Tile],
    removed: &TileMask,
    budget: SolverBudget,
) -> SolveReport {
    assert_eq!(
        tiles.len(),
        topology.len(),
        "tile count must match layout size"
    );
    let started = Instant::now();
    let mut search = Search::new(topology, tiles, removed, budget, started);
    let verdict = match search.run() {
        Flow::Solved => Verdict::Solvable(search.line),
        Flow::Dead => Verdict::Unsolvable,
        Flow::Aborted => Verdict::Unproven,
    };
    log::debug!(
        "solver: {} in {} steps ({:?})",
        match &verdict {
            Verdict::Solvable(_) => "solvable",
            Verdict::Unsolvable => "unsolvable",
            Verdict::Unproven => "unproven",
        },
        search.steps,
        started.elapsed()
    );
    SolveReport {
        verdict,
        steps: search.steps,
    }
}

/// `true` only when a clearing sequence was found within `budget`.
pub fn is_solvable(
    topology: &Topology,
    tiles: &[Tile],
    removed: &TileMask,
    budget: SolverBudget,
) -> bool {
    solve(topology, tiles, removed, budget).verdict.is_solvable()
}

/// Every currently legal match as an unordered slot pair `(a, b)` with `a < b`.
pub fn valid_matches(topology: &Topology, tiles: &[Tile], removed: &TileMask) -> Vec<(usize, usize)> {
    let free: Vec<usize> = topology.free_slots(removed).collect();
    let mut matches = Vec::new();
    for (i, &a) in free.iter().enumerate() {
        for &b in &free[i + 1..] {
            if tiles[a].kind.matches(tiles[b].kind) {
                matches.push((a, b));
            }
        }
    }
    matches
}

enum Flow {
    Solved,
    Dead,
    Aborted,
}

/// Working state for one run. The removed-set is mutated in place with a
/// strict remove/recurse/restore discipline; nothing here escapes `solve`.
struct Search<'a> {
    topology: &'a Topology,
    /// Interned kind per slot.
    kinds: Vec<u16>,
    /// Layer per slot, for candidate ordering.
    layers: Vec<i32>,
    /// Remaining tiles per interned kind.
    remaining_per_kind: Vec<u16>,
    removed: TileMask,
    removed_count: usize,
    line: Vec<(usize, usize)>,
    dead: FxHashSet<TileMask>,
    steps: usize,
    max_steps: usize,
    deadline: Option<Instant>,
}

impl<'a> Search<'a> {
    fn new(
        topology: &'a Topology,
        tiles: &[Tile],
        removed: &TileMask,
        budget: SolverBudget,
        started: Instant,
    ) -> Self {
        let mut interned: FxHashMap<Kind, u16> = FxHashMap::default();
        let kinds: Vec<u16> = tiles
            .iter()
            .map(|tile| {
                let next = interned.len() as u16;
                *interned.entry(tile.kind).or_insert(next)
            })
            .collect();

        let mut working = topology.empty_mask();
        let mut remaining_per_kind = vec![0u16; interned.len()];
        let mut removed_count = 0;
        for slot in 0..topology.len() {
            if removed.contains(slot) {
                working.insert(slot);
                removed_count += 1;
            } else {
                remaining_per_kind[kinds[slot] as usize] += 1;
            }
        }

        Self {
            topology,
            kinds,
            layers: topology.layout().positions.iter().map(|p| p.layer).collect(),
            remaining_per_kind,
            removed: working,
            removed_count,
            line: Vec::new(),
            dead: FxHashSet::default(),
            steps: 0,
            max_steps: budget.max_steps,
            deadline: budget.time_limit.map(|limit| started + limit),
        }
    }

    fn run(&mut self) -> Flow {
        let flow = self.search();
        debug_assert!(
            !matches!(flow, Flow::Solved) || self.removed_count == self.topology.len(),
            "solved flow must leave every tile removed"
        );
        flow
    }

    fn out_of_budget(&self) -> bool {
        if self.steps > self.max_steps {
            return true;
        }
        match self.deadline {
            Some(deadline) if self.steps % DEADLINE_POLL_INTERVAL == 0 => Instant::now() >= deadline,
            _ => false,
        }
    }

    fn apply(&mut self, (a, b): (usize, usize)) {
        self.removed.insert(a);
        self.removed.insert(b);
        self.removed_count += 2;
        self.remaining_per_kind[self.kinds[a] as usize] -= 2;
        self.line.push((a, b));
    }

    fn revert(&mut self) {
        if let Some((a, b)) = self.line.pop() {
            self.removed.remove(a);
            self.removed.remove(b);
            self.removed_count -= 2;
            self.remaining_per_kind[self.kinds[a] as usize] += 2;
        }
    }

    fn search(&mut self) -> Flow {
        if self.removed_count == self.topology.len() {
            return Flow::Solved;
        }
        self.steps += 1;
        if self.out_of_budget() {
            return Flow::Aborted;
        }
        if self.dead.contains(&self.removed) {
            return Flow::Dead;
        }

        let free: Vec<usize> = self.topology.free_slots(&self.removed).collect();

        let forced = self.forced_pairs(&free);
        if !forced.is_empty() {
            let applied = forced.len();
            for &pair in &forced {
                self.apply(pair);
            }
            let flow = self.search();
            if matches!(flow, Flow::Solved) {
                return flow;
            }
            for _ in 0..applied {
                self.revert();
            }
            if matches!(flow, Flow::Dead) {
                self.dead.insert(self.removed.clone());
            }
            return flow;
        }

        for pair in self.candidate_pairs(&free) {
            self.apply(pair);
            let flow = self.search();
            match flow {
                Flow::Solved => return flow,
                Flow::Aborted => {
                    self.revert();
                    return flow;
                }
                Flow::Dead => self.revert(),
            }
        }

        self.dead.insert(self.removed.clone());
        Flow::Dead
    }

    /// Pairs for kinds whose remaining tiles are all free right now.
    fn forced_pairs(&self, free: &[usize]) -> Vec<(usize, usize)> {
        let mut free_by_kind: FxHashMap<u16, Vec<usize>> = FxHashMap::default();
        for &slot in free {
            free_by_kind.entry(self.kinds[slot]).or_default().push(slot);
        }
        let mut pairs = Vec::new();
        for (kind, slots) in free_by_kind {
            if slots.len() == self.remaining_per_kind[kind as usize] as usize {
                pairs.extend(slots.chunks_exact(2).map(|chunk| (chunk[0], chunk[1])));
            }
        }
        pairs.sort_unstable();
        pairs
    }

    /// Every matching free pair, highest layers first.
    fn candidate_pairs(&self, free: &[usize]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for (i, &a) in free.iter().enumerate() {
            for &b in &free[i + 1..] {
                if self.kinds[a] == self.kinds[b] {
                    pairs.push((a, b));
                }
            }
        }
        pairs.sort_by_key(|&(a, b)| {
            let (high, low) = if self.layers[a] >= self.layers[b] {
                (self.layers[a], self.layers[b])
            } else {
                (self.layers[b], self.layers[a])
            };
            (std::cmp::Reverse(high), std::cmp::Reverse(low), a, b)
        });
        pairs
    }
}
