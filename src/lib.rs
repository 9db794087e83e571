//! Sokoban solving by exhaustive and bidirectional state-space search.
//!
//! - [`puzzle`]: grids, parsing and validation
//! - [`core`]: packed bitmaps and grid coordinates
//! - [`analysis`]: per-puzzle static maps and dead-square detection
//! - [`arena`]: the append-only node store shared by the workers of one direction
//! - [`index`]: concurrent duplicate detection over arena nodes
//! - [`search`]: forward pushes, reverse pulls, the work queue
//! - [`solver`]: single- and multi-threaded coordination, statistics, path rendering
//! - [`solution`]: replay verification and reports
//!
//! ```no_run
//! use sokoban_search::{config::SolverConfig, puzzle::Puzzle, solver};
//!
//! let puzzle = Puzzle::parse("#######/#@ $ .#/#######").unwrap();
//! let result = solver::solve(&puzzle, &SolverConfig::default()).unwrap();
//! println!("{}", result.solutions[0].moves);
//! ```

pub mod analysis;
pub mod arena;
pub mod config;
pub mod core;
pub mod index;
pub mod puzzle;
pub mod scenarios;
pub mod search;
pub mod solution;
pub mod solver;

pub use config::{SolverConfig, SolverError};
pub use puzzle::Puzzle;
pub use solver::{solve, ExitResult, Solution, SolverResult};
