use std::collections::VecDeque;

use proptest::prelude::*;
use sokoban_search::core::bitmap::Bitmap;
use sokoban_search::core::coord::{Coord, Dir};

/// A random grid of up to 32×32 with roughly a third of the cells blocked, plus a start cell.
fn grid() -> impl Strategy<Value = (Bitmap, Coord)> {
    (1usize..=32, 1usize..=32).prop_flat_map(|(w, h)| {
        (
            proptest::collection::vec(prop::bool::weighted(0.35), w * h),
            0..w,
            0..h,
        )
            .prop_map(move |(cells, sx, sy)| {
                let blocked = cells
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| **b)
                    .map(|(i, _)| Coord::new((i % w) as i32, (i / w) as i32));
                let boundary = Bitmap::from_coords(w, h, blocked).unwrap();
                (boundary, Coord::new(sx as i32, sy as i32))
            })
    })
}

fn bfs(boundary: &Bitmap, start: Coord) -> Bitmap {
    let mut seen = boundary.cleared();
    if boundary.get(start) {
        return seen;
    }
    seen.set(start, true).unwrap();
    let mut queue = VecDeque::from([start]);
    while let Some(c) = queue.pop_front() {
        for d in Dir::ALL {
            let n = c.step(d);
            if boundary.in_bounds(n) && !boundary.get(n) && !seen.get(n) {
                seen.set(n, true).unwrap();
                queue.push_back(n);
            }
        }
    }
    seen
}

proptest! {
    #[test]
    fn flood_fill_matches_breadth_first_search((boundary, start) in grid()) {
        let filled = Bitmap::flood_fill(&boundary, start).unwrap();
        prop_assert_eq!(filled, bfs(&boundary, start));
    }

    #[test]
    fn flood_fill_avoids_the_boundary_and_is_idempotent((boundary, start) in grid()) {
        let filled = Bitmap::flood_fill(&boundary, start).unwrap();
        prop_assert!(!filled.intersects(&boundary));
        prop_assert_eq!(filled.get(start), !boundary.get(start));
        for c in filled.true_positions().take(16) {
            prop_assert_eq!(Bitmap::flood_fill(&boundary, c).unwrap(), filled);
        }
    }

    #[test]
    fn copies_hash_alike_and_double_inversion_is_identity((boundary, _start) in grid()) {
        let copy = boundary;
        prop_assert_eq!(copy.hash32(), boundary.hash32());
        prop_assert_eq!(boundary.invert().invert(), boundary);
    }
}
