//! Layout-dependent deadlock checks applied while generating successors.

use crate::core::bitmap::Bitmap;
use crate::core::coord::Coord;

/// Top-left offsets of the four 2×2 blocks that contain a given cell.
const BLOCK_ORIGINS: [Coord; 4] = [
    Coord { x: -1, y: -1 },
    Coord { x: 0, y: -1 },
    Coord { x: -1, y: 0 },
    Coord { x: 0, y: 0 },
];

const BLOCK_CELLS: [Coord; 4] = [
    Coord { x: 0, y: 0 },
    Coord { x: 1, y: 0 },
    Coord { x: 0, y: 1 },
    Coord { x: 1, y: 1 },
];

/// Freeze check after a crate lands on `land`.
///
/// A 2×2 block made entirely of walls and crates can never be broken up: no crate in it has a
/// free cell on both sides of any axis. If such a block contains a crate off goal, the layout is
/// unsolvable. This covers the classic L of two crates against two walls.
pub fn is_frozen_block(wall: &Bitmap, goal: &Bitmap, crates: &Bitmap, land: Coord) -> bool {
    BLOCK_ORIGINS.iter().any(|&o| {
        let tl = land + o;
        let mut stray_crate = false;
        for d in BLOCK_CELLS {
            let c = tl + d;
            let is_crate = crates.get(c);
            if !(is_crate || wall.get(c)) {
                return false;
            }
            stray_crate |= is_crate && !goal.get(c);
        }
        stray_crate
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&str]) -> (Bitmap, Bitmap, Bitmap) {
        let h = rows.len();
        let w = rows[0].len();
        let mut wall = Bitmap::new(w, h).unwrap();
        let mut goal = wall.cleared();
        let mut crates = wall.cleared();
        for (y, r) in rows.iter().enumerate() {
            for (x, ch) in r.chars().enumerate() {
                let c = Coord::new(x as i32, y as i32);
                match ch {
                    '#' => wall.set(c, true).unwrap(),
                    '$' => crates.set(c, true).unwrap(),
                    '.' => goal.set(c, true).unwrap(),
                    '*' => {
                        crates.set(c, true).unwrap();
                        goal.set(c, true).unwrap();
                    }
                    _ => {}
                }
            }
        }
        (wall, goal, crates)
    }

    #[test]
    fn two_crates_against_a_wall_freeze() {
        let (wall, goal, crates) = grid(&["######", "# $$ #", "#    #", "######"]);
        assert!(is_frozen_block(&wall, &goal, &crates, Coord::new(3, 1)));
    }

    #[test]
    fn frozen_block_on_goals_is_fine() {
        let (wall, goal, crates) = grid(&["######", "# ** #", "#    #", "######"]);
        assert!(!is_frozen_block(&wall, &goal, &crates, Coord::new(3, 1)));
    }

    #[test]
    fn loose_crates_do_not_freeze() {
        let (wall, goal, crates) = grid(&["######", "#    #", "# $$ #", "#    #", "######"]);
        assert!(!is_frozen_block(&wall, &goal, &crates, Coord::new(3, 2)));
    }
}
