//! Low-level, allocation-free primitives.
//!
//! - [`coord`]: integer grid coordinates and the four cardinal [`coord::Dir`]s.
//! - [`bitmap`]: a fixed-capacity bit grid (one `u32` per row) with flood fill.

pub mod bitmap;
pub mod coord;
