//! Puzzle grids: cell kinds, text parsing and validation.
//!
//! A [`Puzzle`] is the immutable input to a solve. It is parsed from the usual Sokoban text
//! alphabet (`#`, ` `, `.`, `$`, `*`, `@`, `+`) or the letter alphabet (`O` goal, `X` crate,
//! `P` player). `~` is void in both. Rows are separated by newlines or `/`.
//!
//! A grid containing any of `O`, `X` or `P` is read in the letter alphabet, where `.` is plain
//! floor instead of a goal.
//!
//! Parsing only checks the shape of the text. [`Puzzle::validate`] checks the semantic
//! invariants a search relies on and is called by the solver before any state is built.

use thiserror::Error;

use crate::core::bitmap::{Bitmap, BitmapError, MAX_HEIGHT, MAX_WIDTH};
use crate::core::coord::Coord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Void,
    Wall,
    Floor,
    Goal,
    Crate,
    CrateOnGoal,
    Player,
    PlayerOnGoal,
}

impl Cell {
    pub fn from_char(ch: char) -> Option<Cell> {
        let cell = match ch {
            '#' => Cell::Wall,
            ' ' | '-' | '_' => Cell::Floor,
            '.' | 'O' => Cell::Goal,
            '$' | 'X' => Cell::Crate,
            '*' => Cell::CrateOnGoal,
            '@' | 'P' => Cell::Player,
            '+' => Cell::PlayerOnGoal,
            '~' => Cell::Void,
            _ => return None,
        };
        Some(cell)
    }

    /// Letter-alphabet reading: `.` is floor.
    pub fn from_letter(ch: char) -> Option<Cell> {
        match ch {
            '.' => Some(Cell::Floor),
            _ => Cell::from_char(ch),
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Cell::Void => '~',
            Cell::Wall => '#',
            Cell::Floor => ' ',
            Cell::Goal => '.',
            Cell::Crate => '$',
            Cell::CrateOnGoal => '*',
            Cell::Player => '@',
            Cell::PlayerOnGoal => '+',
        }
    }

    #[inline]
    pub fn is_goal(self) -> bool {
        matches!(self, Cell::Goal | Cell::CrateOnGoal | Cell::PlayerOnGoal)
    }

    #[inline]
    pub fn is_crate(self) -> bool {
        matches!(self, Cell::Crate | Cell::CrateOnGoal)
    }

    #[inline]
    pub fn is_player(self) -> bool {
        matches!(self, Cell::Player | Cell::PlayerOnGoal)
    }

    #[inline]
    pub fn is_wall(self) -> bool {
        self == Cell::Wall
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PuzzleError {
    #[error("puzzle has no rows")]
    Empty,
    #[error("puzzle is {width}x{height}; at most {MAX_WIDTH}x{MAX_HEIGHT} is supported")]
    TooLarge { width: usize, height: usize },
    #[error("unknown character {ch:?} at {cell}")]
    UnknownCharacter { ch: char, cell: Coord },
    #[error("puzzle has no player")]
    NoPlayer,
    #[error("puzzle has {count} players")]
    MultiplePlayers { count: usize },
    #[error("puzzle has no crates")]
    NoCrates,
    #[error("puzzle has more goals ({goals}) than crates ({crates})")]
    MoreGoalsThanCrates { goals: usize, crates: usize },
    #[error("puzzle has more crates ({crates}) than goals ({goals})")]
    MoreCratesThanGoals { goals: usize, crates: usize },
    #[error("the player can walk off the grid at {cell}; the puzzle must be enclosed by walls")]
    OpenBoundary { cell: Coord },
    #[error(transparent)]
    Bitmap(#[from] BitmapError),
}

/// An immutable rectangular grid of [`Cell`]s. Ragged text rows are padded with [`Cell::Void`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Puzzle {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl Puzzle {
    /// Parse rows separated by `\n` or `/`. Trailing blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self, PuzzleError> {
        let rows: Vec<&str> = text
            .split(['\n', '/'])
            .map(|r| r.trim_end_matches('\r'))
            .collect();
        let end = rows
            .iter()
            .rposition(|r| !r.trim().is_empty())
            .ok_or(PuzzleError::Empty)?;
        Self::from_rows(&rows[..=end])
    }

    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, PuzzleError> {
        let height = rows.len();
        let width = rows
            .iter()
            .map(|r| r.as_ref().chars().count())
            .max()
            .unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(PuzzleError::Empty);
        }
        if width > MAX_WIDTH || height > MAX_HEIGHT {
            return Err(PuzzleError::TooLarge { width, height });
        }

        let letters = rows.iter().any(|r| r.as_ref().contains(['O', 'X', 'P']));
        let decode: fn(char) -> Option<Cell> = if letters {
            Cell::from_letter
        } else {
            Cell::from_char
        };
        let mut cells = vec![Cell::Void; width * height];
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.as_ref().chars().enumerate() {
                let cell = Coord::new(x as i32, y as i32);
                cells[y * width + x] =
                    decode(ch).ok_or(PuzzleError::UnknownCharacter { ch, cell })?;
            }
        }

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cells outside the grid read as [`Cell::Void`].
    pub fn cell(&self, c: Coord) -> Cell {
        if c.x < 0 || c.y < 0 || c.x as usize >= self.width || c.y as usize >= self.height {
            return Cell::Void;
        }
        self.cells[c.y as usize * self.width + c.x as usize]
    }

    /// All cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, Cell)> + '_ {
        self.cells.iter().enumerate().map(move |(i, &cell)| {
            let c = Coord::new((i % self.width) as i32, (i / self.width) as i32);
            (c, cell)
        })
    }

    pub fn players(&self) -> impl Iterator<Item = Coord> + '_ {
        self.iter().filter(|(_, c)| c.is_player()).map(|(p, _)| p)
    }

    /// The player start. Falls back to the origin for unvalidated puzzles without a player.
    pub fn player(&self) -> Coord {
        self.players().next().unwrap_or(Coord::ORIGIN)
    }

    pub fn crates(&self) -> impl Iterator<Item = Coord> + '_ {
        self.iter().filter(|(_, c)| c.is_crate()).map(|(p, _)| p)
    }

    pub fn goals(&self) -> impl Iterator<Item = Coord> + '_ {
        self.iter().filter(|(_, c)| c.is_goal()).map(|(p, _)| p)
    }

    pub fn map_of(&self, pred: impl Fn(Cell) -> bool) -> Result<Bitmap, BitmapError> {
        Bitmap::from_coords(
            self.width,
            self.height,
            self.iter().filter(|(_, c)| pred(*c)).map(|(p, _)| p),
        )
    }

    /// True when every crate already sits on a goal.
    pub fn is_solved(&self) -> bool {
        self.crates().all(|c| self.cell(c) == Cell::CrateOnGoal)
    }

    /// Check the invariants every search relies on. Intended to run before any search state is
    /// built; a failing puzzle is never reported as "no solution".
    pub fn validate(&self) -> Result<(), PuzzleError> {
        let players = self.players().count();
        match players {
            0 => return Err(PuzzleError::NoPlayer),
            1 => {}
            count => return Err(PuzzleError::MultiplePlayers { count }),
        }

        let crates = self.crates().count();
        let goals = self.goals().count();
        if crates == 0 {
            return Err(PuzzleError::NoCrates);
        }
        if goals > crates {
            return Err(PuzzleError::MoreGoalsThanCrates { goals, crates });
        }
        if crates > goals {
            return Err(PuzzleError::MoreCratesThanGoals { goals, crates });
        }

        // Everything the player can walk to (ignoring crates) must be enclosed.
        let walls = self.map_of(Cell::is_wall)?;
        let reach = Bitmap::flood_fill(&walls, self.player())?;
        for c in reach.true_positions() {
            let on_edge = c.x == 0
                || c.y == 0
                || c.x as usize == self.width - 1
                || c.y as usize == self.height - 1;
            if on_edge || self.cell(c) == Cell::Void {
                return Err(PuzzleError::OpenBoundary { cell: c });
            }
        }

        Ok(())
    }
}
