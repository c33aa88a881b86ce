//! Session tunables.

use std::time::Duration;

use crate::solver::SolverBudget;

/// Points for a match before the combo multiplier.
pub const BASE_POINTS: u32 = 10;

/// Hints available per deal.
pub const HINT_LIMIT: u32 = 20;

/// Matches further apart than this break the combo.
pub const COMBO_WINDOW: Duration = Duration::from_secs(10);

/// Time added to the clock for every shuffle.
pub const SHUFFLE_PENALTY: Duration = Duration::from_secs(5);

/// Entries kept per layout by the in-memory shuffle cache.
pub const CACHE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub base_points: u32,
    pub hint_limit: u32,
    pub combo_window: Duration,
    pub shuffle_penalty: Duration,
    /// Deals tried before accepting an unproven board.
    pub deal_attempts: u32,
    /// Total wall-clock allowance across all deal attempts.
    pub deal_time_box: Duration,
    /// Solver budget for each deal attempt.
    pub deal_budget: SolverBudget,
    /// Permutations tried before falling back to an unverified shuffle.
    pub shuffle_attempts: u32,
    pub shuffle_time_box: Duration,
    pub shuffle_budget: SolverBudget,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            base_points: BASE_POINTS,
            hint_limit: HINT_LIMIT,
            combo_window: COMBO_WINDOW,
            shuffle_penalty: SHUFFLE_PENALTY,
            deal_attempts: 12,
            deal_time_box: Duration::from_secs(2),
            deal_budget: SolverBudget::steps(200_000).with_time_limit(Duration::from_millis(250)),
            shuffle_attempts: 24,
            shuffle_time_box: Duration::from_millis(1500),
            shuffle_budget: SolverBudget::steps(50_000).with_time_limit(Duration::from_millis(150)),
        }
    }
}

impl GameConfig {
    /// Step budgets only, so results never depend on machine speed.
    pub fn deterministic() -> Self {
        let config = Self::default();
        Self {
            deal_time_box: Duration::MAX,
            deal_budget: config.deal_budget.without_time_limit(),
            shuffle_time_box: Duration::MAX,
            shuffle_budget: config.shuffle_budget.without_time_limit(),
            ..config
        }
    }
}
