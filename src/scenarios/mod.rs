//! Built-in puzzles (compile-time grids) for demos and tests.
//!
//! Grids use the letter alphabet: `#` wall, ` ` floor, `O` goal, `X` crate, `P` player.

use crate::puzzle::{Puzzle, PuzzleError};

/// One crate pushed along a short corridor. Solved by `rRR`.
pub const CORRIDOR: &str = "#######/#P X O#/#######";

/// Three crates lined up against three goals on two rows.
pub const TWO_ROWS: &str = "##########/#O...X...#/#O..XPX.O#/##########";

/// Three crates that can only be pushed away from the goals.
pub const WALLED_IN: &str = "##########/#O....X..#/#O..P..X.#/#O....X..#/##########";

/// A 5×5 room with a goal in the middle of every wall. Only the four corners are dead.
pub const CROSS_ROOM: &str = "#######/#  O  #/#  X  #/#OXPXO#/#  X  #/#  O  #/#######";

const BUILT_INS: &[(&str, &str)] = &[
    ("corridor", CORRIDOR),
    ("two_rows", TWO_ROWS),
    ("walled_in", WALLED_IN),
    ("cross_room", CROSS_ROOM),
];

/// Return a puzzle by name.
pub fn by_name(name: &str) -> Result<Option<Puzzle>, PuzzleError> {
    match BUILT_INS.iter().find(|(n, _)| *n == name) {
        Some((_, text)) => Ok(Some(Puzzle::parse(text)?)),
        None => Ok(None),
    }
}

/// Names of all built-in puzzles.
pub fn names() -> Vec<&'static str> {
    BUILT_INS.iter().map(|(n, _)| *n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_built_in_parses_and_validates() {
        for name in names() {
            let p = by_name(name).unwrap().unwrap();
            p.validate().unwrap_or_else(|e| panic!("{name}: {e}"));
        }
        assert!(by_name("nope").unwrap().is_none());
    }
}
