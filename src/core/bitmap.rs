use std::fmt;
use std::ops::{BitAnd, BitOr, Not, Sub};

use thiserror::Error;

use crate::core::coord::{Coord, Dir};

/// Widest grid a bitmap can hold: one row per `u32`.
pub const MAX_WIDTH: usize = 32;
/// Tallest grid a bitmap can hold.
pub const MAX_HEIGHT: usize = 32;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BitmapError {
    #[error("cell {cell} is outside the {width}x{height} grid")]
    OutOfRange { cell: Coord, width: u8, height: u8 },
    #[error("grid {width}x{height} exceeds the {MAX_WIDTH}x{MAX_HEIGHT} bitmap limit")]
    TooLarge { width: usize, height: usize },
}

/// A fixed-capacity boolean grid, one bit per cell and one `u32` per row.
///
/// Bit `x` of `rows[y]` is cell `(x, y)`. Bits outside `width`/`height` are always clear, so
/// equality and hashing only ever see the live grid.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bitmap {
    width: u8,
    height: u8,
    rows: [u32; MAX_HEIGHT],
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Result<Self, BitmapError> {
        if width > MAX_WIDTH || height > MAX_HEIGHT {
            return Err(BitmapError::TooLarge { width, height });
        }
        Ok(Self {
            width: width as u8,
            height: height as u8,
            rows: [0; MAX_HEIGHT],
        })
    }

    /// Same dimensions as `self`, all cells clear.
    #[inline]
    pub fn cleared(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            rows: [0; MAX_HEIGHT],
        }
    }

    pub fn from_coords(
        width: usize,
        height: usize,
        cells: impl IntoIterator<Item = Coord>,
    ) -> Result<Self, BitmapError> {
        let mut map = Self::new(width, height)?;
        for c in cells {
            map.set(c, true)?;
        }
        Ok(map)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width as usize
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height as usize
    }

    #[inline]
    pub fn rows(&self) -> &[u32] {
        &self.rows[..self.height()]
    }

    /// Bits of row `y`, or `None` below the last row.
    #[inline]
    pub fn row(&self, y: usize) -> Option<u32> {
        self.rows().get(y).copied()
    }

    #[inline]
    fn row_mask(&self) -> u32 {
        if self.width() == MAX_WIDTH {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }

    #[inline]
    pub fn in_bounds(&self, c: Coord) -> bool {
        c.x >= 0 && c.y >= 0 && (c.x as usize) < self.width() && (c.y as usize) < self.height()
    }

    /// Cells outside the grid read as clear.
    #[inline]
    pub fn get(&self, c: Coord) -> bool {
        self.in_bounds(c) && (self.rows[c.y as usize] >> c.x) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, c: Coord, value: bool) -> Result<(), BitmapError> {
        if !self.in_bounds(c) {
            return Err(BitmapError::OutOfRange {
                cell: c,
                width: self.width,
                height: self.height,
            });
        }
        let bit = 1u32 << c.x;
        let row = &mut self.rows[c.y as usize];
        if value {
            *row |= bit;
        } else {
            *row &= !bit;
        }
        Ok(())
    }

    /// Move a set bit from `from` to `to`. Both cells must be inside the grid.
    pub fn move_bit(&mut self, from: Coord, to: Coord) -> Result<(), BitmapError> {
        self.set(from, false)?;
        self.set(to, true)
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.rows().iter().map(|r| r.count_ones() as usize).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows().iter().all(|&r| r == 0)
    }

    #[inline]
    pub fn is_subset_of(&self, other: &Bitmap) -> bool {
        self.rows()
            .iter()
            .zip(other.rows())
            .all(|(&a, &b)| a & !b == 0)
    }

    #[inline]
    pub fn intersects(&self, other: &Bitmap) -> bool {
        self.rows()
            .iter()
            .zip(other.rows())
            .any(|(&a, &b)| a & b != 0)
    }

    fn zip_with(&self, other: &Bitmap, f: impl Fn(u32, u32) -> u32) -> Bitmap {
        debug_assert_eq!(self.width, other.width);
        debug_assert_eq!(self.height, other.height);
        let mut out = self.cleared();
        for y in 0..self.height() {
            out.rows[y] = f(self.rows[y], other.rows[y]);
        }
        out
    }

    pub fn or(&self, other: &Bitmap) -> Bitmap {
        self.zip_with(other, |a, b| a | b)
    }

    pub fn and(&self, other: &Bitmap) -> Bitmap {
        self.zip_with(other, |a, b| a & b)
    }

    pub fn subtract(&self, other: &Bitmap) -> Bitmap {
        self.zip_with(other, |a, b| a & !b)
    }

    pub fn invert(&self) -> Bitmap {
        let mask = self.row_mask();
        let mut out = self.cleared();
        for y in 0..self.height() {
            out.rows[y] = !self.rows[y] & mask;
        }
        out
    }

    /// Row-weighted 32-bit hash. Equal maps hash equal; the converse does not hold.
    pub fn hash32(&self) -> u32 {
        let mut h: u32 = 0x811c_9dc5;
        for (y, &row) in self.rows().iter().enumerate() {
            let weight = 0x9e37_79b9u32.wrapping_add((y as u32).wrapping_mul(0x85eb_ca6b));
            h = h.rotate_left(5) ^ row.wrapping_mul(weight | 1);
        }
        fmix32(h)
    }

    /// Set cells in row-major order.
    pub fn true_positions(&self) -> TruePositions<'_> {
        TruePositions {
            map: self,
            y: 0,
            bits: self.rows.first().copied().unwrap_or(0),
        }
    }

    /// The maximal 4-connected region containing `start` that avoids `boundary`.
    ///
    /// Returns an empty map when `start` itself is in `boundary`. The expansion is bit-parallel:
    /// every pass dilates each row horizontally to saturation, then spreads one row up and down.
    pub fn flood_fill(boundary: &Bitmap, start: Coord) -> Result<Bitmap, BitmapError> {
        let mut region = boundary.cleared();
        if !boundary.in_bounds(start) {
            return Err(BitmapError::OutOfRange {
                cell: start,
                width: boundary.width,
                height: boundary.height,
            });
        }
        if boundary.get(start) {
            return Ok(region);
        }

        let mask = boundary.row_mask();
        let h = boundary.height();
        let mut free = [0u32; MAX_HEIGHT];
        for y in 0..h {
            free[y] = !boundary.rows[y] & mask;
        }

        region.rows[start.y as usize] = 1u32 << start.x;
        let mut changed = true;
        while changed {
            changed = false;
            for y in 0..h {
                let mut r = region.rows[y];
                if y > 0 {
                    r |= region.rows[y - 1];
                }
                if y + 1 < h {
                    r |= region.rows[y + 1];
                }
                r &= free[y];
                loop {
                    let next = (r | (r << 1) | (r >> 1)) & free[y];
                    if next == r {
                        break;
                    }
                    r = next;
                }
                if r != region.rows[y] {
                    region.rows[y] = r;
                    changed = true;
                }
            }
        }
        Ok(region)
    }

    /// Number of orthogonal neighbours of `c` that are set.
    pub fn neighbours_set(&self, c: Coord) -> usize {
        Dir::ALL.iter().filter(|&&d| self.get(c.step(d))).count()
    }
}

#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

impl BitOr for &Bitmap {
    type Output = Bitmap;

    fn bitor(self, rhs: &Bitmap) -> Bitmap {
        self.or(rhs)
    }
}

impl BitAnd for &Bitmap {
    type Output = Bitmap;

    fn bitand(self, rhs: &Bitmap) -> Bitmap {
        self.and(rhs)
    }
}

impl Sub for &Bitmap {
    type Output = Bitmap;

    fn sub(self, rhs: &Bitmap) -> Bitmap {
        self.subtract(rhs)
    }
}

impl Not for &Bitmap {
    type Output = Bitmap;

    fn not(self) -> Bitmap {
        self.invert()
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bitmap {}x{}", self.width, self.height)?;
        for &row in self.rows() {
            for x in 0..self.width() {
                f.write_str(if (row >> x) & 1 == 1 { "#" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub struct TruePositions<'a> {
    map: &'a Bitmap,
    y: usize,
    bits: u32,
}

impl Iterator for TruePositions<'_> {
    type Item = Coord;

    fn next(&mut self) -> Option<Coord> {
        loop {
            if self.y >= self.map.height() {
                return None;
            }
            if self.bits != 0 {
                let x = self.bits.trailing_zeros();
                self.bits &= self.bits - 1;
                return Some(Coord::new(x as i32, self.y as i32));
            }
            self.y += 1;
            if self.y < self.map.height() {
                self.bits = self.map.rows[self.y];
            }
        }
    }
}
