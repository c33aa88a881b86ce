//! Mahjong Solitaire Engine
//!
//! Developer tool for the engine: inspects layouts, deals boards, runs the
//! solvability search and plays games to the end using hints and shuffles.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};

use shanghai::cache::{FileStore, MemoryStore, ShuffleStore};
use shanghai::config::{GameConfig, CACHE_CAPACITY};
use shanghai::game::{Game, GameOptions};
use shanghai::layout::{self, format_layout};
use shanghai::solver::{SolverBudget, Verdict};
use shanghai::GameError;

/// Deals, solves and plays Mahjong Solitaire boards.
#[derive(Parser)]
#[command(name = "shanghai")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List every catalog layout with its shape.
    Layouts,
    /// Deal a board and print it.
    Deal(DealArgs),
    /// Deal a board and run the solver on it.
    Solve {
        #[command(flatten)]
        deal: DealArgs,
        /// Maximum search nodes.
        #[arg(long, default_value_t = 1_000_000)]
        steps: usize,
        /// Wall-clock limit in milliseconds.
        #[arg(long)]
        millis: Option<u64>,
    },
    /// Play a board to the end with hints, shuffling when stuck.
    Autoplay {
        #[command(flatten)]
        deal: DealArgs,
        /// Shuffle cache file; defaults to the user cache directory.
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Keep the shuffle cache in memory only.
        #[arg(long)]
        no_cache_file: bool,
        /// Give up after this many shuffles.
        #[arg(long, default_value_t = 10)]
        max_shuffles: u32,
    },
}

#[derive(Args)]
struct DealArgs {
    /// Layout name.
    #[arg(short, long, default_value = layout::DEFAULT_LAYOUT)]
    layout: String,
    /// Seed for a reproducible deal.
    #[arg(short, long)]
    seed: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Layouts) => run_layouts(),
        Some(Command::Deal(args)) => run_deal(&args),
        Some(Command::Solve {
            deal,
            steps,
            millis,
        }) => run_solve(&deal, steps, millis),
        Some(Command::Autoplay {
            deal,
            cache,
            no_cache_file,
            max_shuffles,
        }) => run_autoplay(&deal, cache, no_cache_file, max_shuffles),
        None => run_layouts(),
    }
}

/// Prints every catalog layout.
fn run_layouts() {
    for name in layout::names() {
        let layout = layout::get_layout(name);
        println!("{} ({} tiles)", layout.name, layout.len());
        println!("{}", format_layout(&layout));
    }
}

fn deal(args: &DealArgs, options: GameOptions) -> Game {
    if layout::lookup(&args.layout).is_none() {
        eprintln!(
            "Unknown layout '{}', using {}",
            args.layout,
            layout::DEFAULT_LAYOUT
        );
    }
    Game::with_options(
        layout::get_layout(&args.layout),
        args.seed.as_deref(),
        options,
    )
}

/// Deals and prints one board.
fn run_deal(args: &DealArgs) {
    let game = deal(args, GameOptions::default());
    let state = game.state();
    println!(
        "{}: {} tiles, {} moves available, deal verified: {}",
        state.layout, state.remaining, state.valid_matches, state.deal_verified
    );
    print!("{}", game.render());
}

/// Runs the solver on a fresh deal and prints the verdict.
fn run_solve(args: &DealArgs, steps: usize, millis: Option<u64>) {
    let game = deal(args, GameOptions::default());
    let mut budget = SolverBudget::steps(steps);
    if let Some(millis) = millis {
        budget = budget.with_time_limit(Duration::from_millis(millis));
    }

    let started = Instant::now();
    let report = game.solve(budget);
    let elapsed = started.elapsed();

    match report.verdict {
        Verdict::Solvable(line) => {
            println!(
                "Solvable: {} matches found in {} steps ({:?})",
                line.len(),
                report.steps,
                elapsed
            );
            for (a, b) in line {
                let tile_a = &game.tiles()[a];
                let tile_b = &game.tiles()[b];
                println!("  {} {} + {}", tile_a.kind, tile_a.id, tile_b.id);
            }
        }
        Verdict::Unsolvable => println!(
            "Unsolvable: search exhausted after {} steps ({:?})",
            report.steps, elapsed
        ),
        Verdict::Unproven => println!(
            "Unproven: budget ran out after {} steps ({:?})",
            report.steps, elapsed
        ),
    }
}

fn open_store(path: Option<PathBuf>, memory_only: bool) -> Arc<dyn ShuffleStore> {
    if memory_only {
        return Arc::new(MemoryStore::default());
    }
    match path.or_else(FileStore::default_path) {
        Some(path) => Arc::new(FileStore::open(path, CACHE_CAPACITY)),
        None => {
            eprintln!("No cache directory available; keeping shuffles in memory");
            Arc::new(MemoryStore::default())
        }
    }
}

/// Plays a deal to the end, following hints and shuffling when stuck.
fn run_autoplay(args: &DealArgs, cache: Option<PathBuf>, memory_only: bool, max_shuffles: u32) {
    let options = GameOptions {
        config: GameConfig {
            hint_limit: u32::MAX,
            ..GameConfig::default()
        },
        store: open_store(cache, memory_only),
        ..GameOptions::default()
    };
    let mut game = deal(args, options);
    let mut shuffles = 0;
    let mut matches = 0;

    loop {
        match game.hint() {
            Ok(hint) => {
                if let Err(e) = game.match_tiles(hint.tile_a, hint.tile_b) {
                    eprintln!("Hinted match rejected: {e}");
                    break;
                }
                matches += 1;
            }
            Err(GameError::NoMoves) => {
                if shuffles == max_shuffles {
                    println!("Stuck after {shuffles} shuffles");
                    break;
                }
                match game.shuffle() {
                    Ok(outcome) => {
                        shuffles += 1;
                        println!(
                            "Shuffle {shuffles}: {:?}, guaranteed solvable: {}",
                            outcome.source, outcome.guaranteed_solvable
                        );
                    }
                    Err(e) => {
                        eprintln!("Shuffle failed: {e}");
                        break;
                    }
                }
            }
            Err(e) => {
                eprintln!("Hint failed: {e}");
                break;
            }
        }
        if game.is_won() {
            break;
        }
    }

    let state = game.state();
    println!(
        "{}: {} matches, {} shuffles, score {}, {} tiles left, won: {}",
        state.layout, matches, shuffles, state.score, state.remaining, state.won
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_solve_flags() {
        let cli = Cli::try_parse_from([
            "shanghai", "solve", "--layout", "pyramid", "--seed", "daily", "--steps", "500",
        ])
        .unwrap();
        let Some(Command::Solve { deal, steps, millis }) = cli.command else {
            panic!("expected solve subcommand");
        };
        assert_eq!(deal.layout, "pyramid");
        assert_eq!(deal.seed.as_deref(), Some("daily"));
        assert_eq!(steps, 500);
        assert_eq!(millis, None);
    }

    #[test]
    fn test_cli_defaults_to_turtle() {
        let cli = Cli::try_parse_from(["shanghai", "deal"]).unwrap();
        let Some(Command::Deal(args)) = cli.command else {
            panic!("expected deal subcommand");
        };
        assert_eq!(args.layout, "turtle");
        assert!(args.seed.is_none());
    }
}
