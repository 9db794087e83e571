use std::sync::Arc;

use crate::analysis::deadlock::is_frozen_block;
use crate::analysis::StaticMaps;
use crate::arena::{SearchDirection, SearchNode};
use crate::core::bitmap::{Bitmap, BitmapError};
use crate::core::coord::Dir;

use super::evaluator::{Expander, Move, MoveList, Successor};

/// Crate pushes from the start layout towards the goals.
pub struct ForwardExpander {
    maps: Arc<StaticMaps>,
    dynamic_deadlocks: bool,
}

impl ForwardExpander {
    pub fn new(maps: Arc<StaticMaps>, dynamic_deadlocks: bool) -> Self {
        Self {
            maps,
            dynamic_deadlocks,
        }
    }
}

impl Expander for ForwardExpander {
    fn direction(&self) -> SearchDirection {
        SearchDirection::Forward
    }

    fn roots(&self) -> Result<Vec<Successor>, BitmapError> {
        let m = &self.maps;
        let boundary = m.wall.or(&m.crate_start);
        Ok(vec![Successor {
            crate_map: m.crate_start,
            move_map: Bitmap::flood_fill(&boundary, m.player_start)?,
            player: m.player_start,
            push: None,
        }])
    }

    /// Row-major over the reachable region, then `Dir::ALL` order.
    ///
    /// A push from `p` towards `d` is valid when `p+d` holds a crate and `p+2d` is crate-free
    /// floor. Landing on a dead square, or freezing a 2×2 block when dynamic checks are on,
    /// counts as pruned.
    fn moves(&self, node: &SearchNode) -> Result<MoveList, BitmapError> {
        let m = &self.maps;
        let crates = &node.crate_map;
        let mut out = MoveList::default();
        for p in node.move_map.true_positions() {
            for d in Dir::ALL {
                let from = p.step(d);
                if !crates.get(from) {
                    continue;
                }
                let land = from.step(d);
                if !m.is_floor(land) || crates.get(land) {
                    continue;
                }
                if m.is_dead(land) {
                    out.pruned += 1;
                    continue;
                }
                if self.dynamic_deadlocks {
                    let mut moved = *crates;
                    moved.move_bit(from, land)?;
                    if is_frozen_block(&m.wall, &m.goal, &moved, land) {
                        out.pruned += 1;
                        continue;
                    }
                }
                out.moves.push(Move { from: p, dir: d });
            }
        }
        Ok(out)
    }

    fn apply(&self, node: &SearchNode, mv: Move) -> Result<Successor, BitmapError> {
        let crate_cell = mv.from.step(mv.dir);
        let mut crate_map = node.crate_map;
        crate_map.move_bit(crate_cell, crate_cell.step(mv.dir))?;
        let boundary = self.maps.wall.or(&crate_map);
        Ok(Successor {
            crate_map,
            move_map: Bitmap::flood_fill(&boundary, crate_cell)?,
            player: crate_cell,
            push: Some(mv.dir),
        })
    }

    fn is_solution(&self, crate_map: &Bitmap, _move_map: &Bitmap) -> bool {
        *crate_map == self.maps.goal
    }
}
