//! Per-puzzle static analysis, computed once per solve.
//!
//! [`StaticMaps`] holds the immutable maps every evaluator reads: walls, floor, goals, the
//! crate start layout and the derived corner/side/door/recess maps. The headline product is
//! `dead_square`: floor cells where a crate can never again reach a goal.
//!
//! - A **corner** is a floor cell with two orthogonal walls.
//! - A **recess** is a straight run of floor cells between two corners whose every cell has a
//!   wall on the same side. A crate pushed into a recess can only slide along it.
//! - A floor cell is **dead** when it is not a goal and it is either a corner or part of a recess
//!   that contains no goal.
//!
//! Dynamic freeze checks that depend on the crate layout live in [`deadlock`].

pub mod deadlock;

use crate::core::bitmap::{Bitmap, BitmapError};
use crate::core::coord::{Coord, Dir};
use crate::puzzle::{Cell, Puzzle};

/// Immutable per-puzzle maps. Shared read-only by all workers of a solve.
#[derive(Debug, Clone)]
pub struct StaticMaps {
    pub width: usize,
    pub height: usize,
    pub wall: Bitmap,
    /// Cells the player can ever stand on (reachable from the start ignoring crates).
    pub floor: Bitmap,
    pub goal: Bitmap,
    pub crate_start: Bitmap,
    pub player_start: Coord,
    pub corner: Bitmap,
    pub side: Bitmap,
    pub door: Bitmap,
    pub recess: Bitmap,
    pub dead_square: Bitmap,
}

impl StaticMaps {
    /// Build the maps for a puzzle. The puzzle should already have passed
    /// [`Puzzle::validate`]; analysis itself only fails on grid-size violations.
    pub fn new(puzzle: &Puzzle) -> Result<Self, BitmapError> {
        let wall = puzzle.map_of(Cell::is_wall)?;
        let goal = puzzle.map_of(Cell::is_goal)?;
        let crate_start = puzzle.map_of(Cell::is_crate)?;
        let player_start = puzzle.player();

        let floor = if puzzle.players().next().is_some() {
            Bitmap::flood_fill(&wall, player_start)?
        } else {
            // Analysis of a bare room (no player) treats every non-wall, non-void cell as floor.
            puzzle.map_of(|c| !matches!(c, Cell::Wall | Cell::Void))?
        };

        let corner = corner_map(&wall, &floor)?;
        let side = side_map(&wall, &floor)?;
        let door = door_map(&wall, &floor)?;
        let recess = recess_map(&wall, &floor, &corner)?;

        let mut dead_square = corner.subtract(&goal);
        for run in recess_runs(&wall, &floor, &corner) {
            if run.iter().any(|&c| goal.get(c)) {
                continue;
            }
            for c in run {
                dead_square.set(c, true)?;
            }
        }
        let dead_square = dead_square.subtract(&goal);

        Ok(Self {
            width: puzzle.width(),
            height: puzzle.height(),
            wall,
            floor,
            goal,
            crate_start,
            player_start,
            corner,
            side,
            door,
            recess,
            dead_square,
        })
    }

    #[inline]
    pub fn is_floor(&self, c: Coord) -> bool {
        self.floor.get(c)
    }

    #[inline]
    pub fn is_dead(&self, c: Coord) -> bool {
        self.dead_square.get(c)
    }

    /// Player region in the solved configuration for every distinct area around the goals.
    ///
    /// Each region seeds one reverse-search root. Regions are returned in row-major order of
    /// their first cell together with that cell.
    pub fn goal_regions(&self) -> Result<Vec<(Coord, Bitmap)>, BitmapError> {
        let boundary = self.wall.or(&self.goal);
        let mut seen = self.floor.cleared();
        let mut out = Vec::new();
        for c in self.floor.subtract(&self.goal).true_positions() {
            if seen.get(c) {
                continue;
            }
            let region = Bitmap::flood_fill(&boundary, c)?;
            seen = seen.or(&region);
            out.push((c, region));
        }
        Ok(out)
    }
}

fn corner_map(wall: &Bitmap, floor: &Bitmap) -> Result<Bitmap, BitmapError> {
    let mut out = floor.cleared();
    for c in floor.true_positions() {
        if is_corner(wall, c) {
            out.set(c, true)?;
        }
    }
    Ok(out)
}

#[inline]
fn is_corner(wall: &Bitmap, c: Coord) -> bool {
    let up = wall.get(c.step(Dir::Up));
    let down = wall.get(c.step(Dir::Down));
    let left = wall.get(c.step(Dir::Left));
    let right = wall.get(c.step(Dir::Right));
    (up || down) && (left || right)
}

fn side_map(wall: &Bitmap, floor: &Bitmap) -> Result<Bitmap, BitmapError> {
    let mut out = floor.cleared();
    for c in floor.true_positions() {
        if wall.neighbours_set(c) > 0 {
            out.set(c, true)?;
        }
    }
    Ok(out)
}

fn door_map(wall: &Bitmap, floor: &Bitmap) -> Result<Bitmap, BitmapError> {
    let mut out = floor.cleared();
    for c in floor.true_positions() {
        let vertical = wall.get(c.step(Dir::Up)) && wall.get(c.step(Dir::Down));
        let horizontal = wall.get(c.step(Dir::Left)) && wall.get(c.step(Dir::Right));
        if vertical || horizontal {
            out.set(c, true)?;
        }
    }
    Ok(out)
}

fn recess_map(wall: &Bitmap, floor: &Bitmap, corner: &Bitmap) -> Result<Bitmap, BitmapError> {
    let mut out = floor.cleared();
    for run in recess_runs(wall, floor, corner) {
        for c in run {
            out.set(c, true)?;
        }
    }
    Ok(out)
}

/// Straight corner-to-corner runs hugging a wall. Each run includes its two end corners.
///
/// From every corner we walk right and down (so each run is found once from its top/left end)
/// while the cell stays floor and the wall on one fixed side stays unbroken. The walk succeeds
/// when it reaches another corner.
fn recess_runs(wall: &Bitmap, floor: &Bitmap, corner: &Bitmap) -> Vec<Vec<Coord>> {
    let mut runs = Vec::new();
    for start in corner.true_positions() {
        for (along, sides) in [
            (Dir::Right, [Dir::Up, Dir::Down]),
            (Dir::Down, [Dir::Left, Dir::Right]),
        ] {
            for side in sides {
                if !wall.get(start.step(side)) {
                    continue;
                }
                let mut run = vec![start];
                let mut c = start.step(along);
                let mut closed = false;
                while floor.get(c) && wall.get(c.step(side)) {
                    run.push(c);
                    if corner.get(c) && wall.get(c.step(along)) {
                        closed = true;
                        break;
                    }
                    c = c.step(along);
                }
                if closed && run.len() > 2 {
                    runs.push(run);
                }
            }
        }
    }
    runs
}
