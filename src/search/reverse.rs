use std::sync::Arc;

use crate::analysis::StaticMaps;
use crate::arena::{SearchDirection, SearchNode};
use crate::core::bitmap::{Bitmap, BitmapError};
use crate::core::coord::Dir;

use super::evaluator::{Expander, Move, MoveList, Successor};

/// Crate pulls from the solved layout back towards the start.
///
/// A pull from `p` towards `d` takes the crate on `p+d` onto `p` while the player steps back to
/// `p-d`. The node records the player on `p-d` and `push = d`: replaying that push forward undoes
/// the pull.
pub struct ReverseExpander {
    maps: Arc<StaticMaps>,
}

impl ReverseExpander {
    pub fn new(maps: Arc<StaticMaps>) -> Self {
        Self { maps }
    }
}

impl Expander for ReverseExpander {
    fn direction(&self) -> SearchDirection {
        SearchDirection::Reverse
    }

    /// One root per player region of the solved layout.
    fn roots(&self) -> Result<Vec<Successor>, BitmapError> {
        let m = &self.maps;
        Ok(m.goal_regions()?
            .into_iter()
            .map(|(player, move_map)| Successor {
                crate_map: m.goal,
                move_map,
                player,
                push: None,
            })
            .collect())
    }

    fn moves(&self, node: &SearchNode) -> Result<MoveList, BitmapError> {
        let m = &self.maps;
        let crates = &node.crate_map;
        let mut out = MoveList::default();
        for p in node.move_map.true_positions() {
            for d in Dir::ALL {
                if !crates.get(p.step(d)) {
                    continue;
                }
                let back = p.step(d.opposite());
                if m.is_floor(back) && !crates.get(back) {
                    out.moves.push(Move { from: p, dir: d });
                }
            }
        }
        Ok(out)
    }

    fn apply(&self, node: &SearchNode, mv: Move) -> Result<Successor, BitmapError> {
        let mut crate_map = node.crate_map;
        crate_map.move_bit(mv.from.step(mv.dir), mv.from)?;
        let player = mv.from.step(mv.dir.opposite());
        let boundary = self.maps.wall.or(&crate_map);
        Ok(Successor {
            crate_map,
            move_map: Bitmap::flood_fill(&boundary, player)?,
            player,
            push: Some(mv.dir),
        })
    }

    fn is_solution(&self, crate_map: &Bitmap, move_map: &Bitmap) -> bool {
        *crate_map == self.maps.crate_start && move_map.get(self.maps.player_start)
    }
}
