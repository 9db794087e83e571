//! Solution replay and reporting.
//!
//! [`replay`] plays a LURD string on a fresh [`Board`] and rejects any illegal move, so a
//! rendered solution can be checked independently of the search that produced it.
//! [`SolutionReport`] is the serializable summary the command-line tool prints.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SolverConfig;
use crate::core::bitmap::{Bitmap, BitmapError};
use crate::core::coord::{Coord, Dir};
use crate::puzzle::{Cell, Puzzle, PuzzleError};
use crate::solver::{Solution, SolverResult, Statistics};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("unknown move {ch:?} at index {index}")]
    UnknownMove { index: usize, ch: char },
    #[error("move {index} ({ch}) runs into a wall")]
    Blocked { index: usize, ch: char },
    #[error("move {index} ({ch}) walks into a crate without pushing")]
    StepIntoCrate { index: usize, ch: char },
    #[error("move {index} ({ch}) pushes but there is no crate")]
    NothingToPush { index: usize, ch: char },
    #[error("move {index} ({ch}) pushes a crate into an obstacle")]
    PushBlocked { index: usize, ch: char },
    #[error("moves end with {remaining} crate(s) off goal")]
    Unsolved { remaining: usize },
    #[error(transparent)]
    Puzzle(#[from] PuzzleError),
    #[error(transparent)]
    Bitmap(#[from] BitmapError),
}

/// Mutable game position used for replay.
#[derive(Debug, Clone)]
pub struct Board {
    wall: Bitmap,
    goal: Bitmap,
    crates: Bitmap,
    player: Coord,
}

impl Board {
    pub fn new(puzzle: &Puzzle) -> Result<Self, ReplayError> {
        puzzle.validate()?;
        Ok(Self {
            wall: puzzle.map_of(Cell::is_wall)?,
            goal: puzzle.map_of(Cell::is_goal)?,
            crates: puzzle.map_of(Cell::is_crate)?,
            player: puzzle.player(),
        })
    }

    #[inline]
    pub fn player(&self) -> Coord {
        self.player
    }

    #[inline]
    pub fn crates(&self) -> &Bitmap {
        &self.crates
    }

    pub fn is_solved(&self) -> bool {
        self.crates == self.goal
    }

    fn open(&self, c: Coord) -> bool {
        self.wall.in_bounds(c) && !self.wall.get(c)
    }

    /// Apply move number `index`.
    pub fn apply(&mut self, index: usize, ch: char) -> Result<(), ReplayError> {
        let (dir, push) = Dir::from_lurd(ch).ok_or(ReplayError::UnknownMove { index, ch })?;
        let next = self.player.step(dir);
        if !self.open(next) {
            return Err(ReplayError::Blocked { index, ch });
        }
        match (push, self.crates.get(next)) {
            (false, true) => return Err(ReplayError::StepIntoCrate { index, ch }),
            (true, false) => return Err(ReplayError::NothingToPush { index, ch }),
            (true, true) => {
                let land = next.step(dir);
                if !self.open(land) || self.crates.get(land) {
                    return Err(ReplayError::PushBlocked { index, ch });
                }
                self.crates.move_bit(next, land)?;
            }
            (false, false) => {}
        }
        self.player = next;
        Ok(())
    }
}

/// Play `moves` from the puzzle's start position.
pub fn replay(puzzle: &Puzzle, moves: &str) -> Result<Board, ReplayError> {
    let mut board = Board::new(puzzle)?;
    for (index, ch) in moves.chars().enumerate() {
        board.apply(index, ch)?;
    }
    Ok(board)
}

/// Play `moves` and require every crate to end on a goal.
pub fn verify(puzzle: &Puzzle, moves: &str) -> Result<(), ReplayError> {
    let board = replay(puzzle, moves)?;
    if board.is_solved() {
        Ok(())
    } else {
        Err(ReplayError::Unsolved {
            remaining: board.crates.subtract(&board.goal).count(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionReport {
    pub puzzle: String,
    pub width: usize,
    pub height: usize,
    pub crates: usize,
    pub mode: String,
    pub index: String,
    pub exit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub solutions: Vec<Solution>,
    /// Every solution replays to a solved board.
    pub verified: bool,
    pub statistics: Statistics,
}

impl SolutionReport {
    pub fn new(name: &str, puzzle: &Puzzle, config: &SolverConfig, result: &SolverResult) -> Self {
        let verified = result
            .solutions
            .iter()
            .all(|s| verify(puzzle, &s.moves).is_ok());
        Self {
            puzzle: name.to_string(),
            width: puzzle.width(),
            height: puzzle.height(),
            crates: puzzle.crates().count(),
            mode: config.mode.to_string(),
            index: config.index.to_string(),
            exit: result.exit.label().to_string(),
            error: result.exit.error().map(|e| e.to_string()),
            solutions: result.solutions.clone(),
            verified,
            statistics: result.statistics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> Puzzle {
        Puzzle::parse("#######/#@ $ .#/#######").unwrap()
    }

    #[test]
    fn valid_solution_verifies() {
        assert_eq!(verify(&corridor(), "rRR"), Ok(()));
    }

    #[test]
    fn lowercase_step_into_crate_is_rejected() {
        assert_eq!(
            replay(&corridor(), "rr").unwrap_err(),
            ReplayError::StepIntoCrate { index: 1, ch: 'r' }
        );
    }

    #[test]
    fn pushing_into_wall_is_rejected() {
        assert_eq!(
            replay(&corridor(), "rRRR").unwrap_err(),
            ReplayError::PushBlocked { index: 3, ch: 'R' }
        );
    }

    #[test]
    fn incomplete_solution_is_unsolved() {
        assert_eq!(
            verify(&corridor(), "rR"),
            Err(ReplayError::Unsolved { remaining: 1 })
        );
        assert!(matches!(
            replay(&corridor(), "x"),
            Err(ReplayError::UnknownMove { index: 0, ch: 'x' })
        ));
        assert!(matches!(
            replay(&corridor(), "U"),
            Err(ReplayError::Blocked { index: 0, .. })
        ));
    }
}
