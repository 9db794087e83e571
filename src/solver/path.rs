//! Turning node chains into LURD move strings.
//!
//! A solution is the forward chain from the start root to some forward node, followed by the
//! reverse chain from some reverse node up to its root. Between pushes the player walks along a
//! shortest path (breadth-first, `Dir::ALL` order) around walls and crates.

use std::collections::VecDeque;

use crate::analysis::StaticMaps;
use crate::arena::{Arena, NodeId};
use crate::config::SolverError;
use crate::core::bitmap::Bitmap;
use crate::core::coord::{Coord, Dir};

/// Shortest walk from `from` to `to` avoiding `boundary`. `None` when `to` is unreachable.
pub fn walk(boundary: &Bitmap, from: Coord, to: Coord) -> Option<Vec<Dir>> {
    if from == to {
        return Some(Vec::new());
    }
    if !boundary.in_bounds(to) || boundary.get(to) {
        return None;
    }
    let width = boundary.width();
    let idx = |c: Coord| c.y as usize * width + c.x as usize;
    let mut came: Vec<Option<Dir>> = vec![None; width * boundary.height()];
    let mut seen = boundary.cleared();
    seen.set(from, true).ok()?;
    let mut queue = VecDeque::from([from]);

    while let Some(c) = queue.pop_front() {
        for d in Dir::ALL {
            let n = c.step(d);
            if !boundary.in_bounds(n) || boundary.get(n) || seen.get(n) {
                continue;
            }
            seen.set(n, true).ok()?;
            came[idx(n)] = Some(d);
            if n == to {
                let mut steps = Vec::new();
                let mut cur = n;
                while cur != from {
                    let d = came[idx(cur)]?;
                    steps.push(d);
                    cur = cur.step(d.opposite());
                }
                steps.reverse();
                return Some(steps);
            }
            queue.push_back(n);
        }
    }
    None
}

/// Player and crates while a path is being rendered.
struct Replay<'a> {
    maps: &'a StaticMaps,
    crates: Bitmap,
    player: Coord,
    moves: String,
}

impl Replay<'_> {
    fn walk_to(&mut self, target: Coord) -> Result<(), SolverError> {
        let boundary = self.maps.wall.or(&self.crates);
        let steps = walk(&boundary, self.player, target).ok_or_else(|| SolverError::Stitch {
            reason: format!("no walk from {} to {}", self.player, target),
        })?;
        self.moves.extend(steps.iter().map(|d| d.lurd(false)));
        self.player = target;
        Ok(())
    }

    /// Push from `stand` towards `dir`.
    fn push(&mut self, stand: Coord, dir: Dir) -> Result<(), SolverError> {
        self.walk_to(stand)?;
        let crate_cell = stand.step(dir);
        self.crates.move_bit(crate_cell, crate_cell.step(dir))?;
        self.moves.push(dir.lurd(true));
        self.player = crate_cell;
        Ok(())
    }
}

/// LURD string for the forward chain ending at `forward` and then the reverse chain starting
/// at `reverse`. Either half may be absent.
pub fn render(
    maps: &StaticMaps,
    forward: Option<(&Arena, NodeId)>,
    reverse: Option<(&Arena, NodeId)>,
) -> Result<String, SolverError> {
    let mut r = Replay {
        maps,
        crates: maps.crate_start,
        player: maps.player_start,
        moves: String::new(),
    };

    if let Some((arena, id)) = forward {
        let chain = arena.path_to_root(id)?;
        for &n in chain.iter().rev().skip(1) {
            let node = arena.node(n)?;
            let dir = node.push.ok_or_else(|| SolverError::Stitch {
                reason: format!("forward node {n} has no push"),
            })?;
            r.push(node.player.step(dir.opposite()), dir)?;
            if r.crates != node.crate_map {
                return Err(SolverError::Stitch {
                    reason: format!("forward node {n} does not follow from its parent"),
                });
            }
        }
    }

    if let Some((arena, id)) = reverse {
        let chain = arena.path_to_root(id)?;
        for pair in chain.windows(2) {
            let node = arena.node(pair[0])?;
            let parent = arena.node(pair[1])?;
            let dir = node.push.ok_or_else(|| SolverError::Stitch {
                reason: format!("reverse node {} has no push", pair[0]),
            })?;
            if r.crates != node.crate_map {
                return Err(SolverError::Stitch {
                    reason: format!("reverse node {} does not match the replayed layout", pair[0]),
                });
            }
            r.push(node.player, dir)?;
            if r.crates != parent.crate_map {
                return Err(SolverError::Stitch {
                    reason: format!("push from reverse node {} misses its parent", pair[0]),
                });
            }
        }
    }

    if r.crates != maps.goal {
        return Err(SolverError::Stitch {
            reason: "rendered path does not end on the goals".into(),
        });
    }
    Ok(r.moves)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(w: usize, h: usize) -> Bitmap {
        Bitmap::new(w, h).unwrap()
    }

    #[test]
    fn walk_goes_around_obstacles() {
        let mut b = open(3, 3);
        b.set(Coord::new(1, 0), true).unwrap();
        b.set(Coord::new(1, 1), true).unwrap();
        let steps = walk(&b, Coord::new(0, 0), Coord::new(2, 0)).unwrap();
        assert_eq!(
            steps,
            vec![Dir::Down, Dir::Down, Dir::Right, Dir::Right, Dir::Up, Dir::Up]
        );
    }

    #[test]
    fn walk_to_blocked_cell_fails() {
        let mut b = open(3, 1);
        b.set(Coord::new(1, 0), true).unwrap();
        assert_eq!(walk(&b, Coord::new(0, 0), Coord::new(2, 0)), None);
        assert_eq!(walk(&b, Coord::new(0, 0), Coord::new(1, 0)), None);
        assert_eq!(walk(&b, Coord::new(2, 0), Coord::new(2, 0)), Some(vec![]));
    }
}
