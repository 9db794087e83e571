use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A grid cell. `y` grows downwards, matching puzzle text rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const ORIGIN: Coord = Coord { x: 0, y: 0 };

    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn step(self, d: Dir) -> Coord {
        self + d.delta()
    }

    #[inline]
    pub fn manhattan(self, other: Coord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

impl Add for Coord {
    type Output = Coord;

    #[inline]
    fn add(self, rhs: Coord) -> Self::Output {
        Coord::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Coord {
    type Output = Coord;

    #[inline]
    fn sub(self, rhs: Coord) -> Self::Output {
        Coord::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Coord {
    type Output = Coord;

    #[inline]
    fn neg(self) -> Self::Output {
        Coord::new(-self.x, -self.y)
    }
}

impl Mul<i32> for Coord {
    type Output = Coord;

    #[inline]
    fn mul(self, rhs: i32) -> Coord {
        Coord {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// A cardinal direction for steps, pushes and pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dir {
    Up,
    Down,
    Left,
    Right,
}

impl Dir {
    /// Successor generation order. Changing it changes node numbering, not results.
    pub const ALL: [Dir; 4] = [Dir::Up, Dir::Down, Dir::Left, Dir::Right];

    #[inline]
    pub const fn delta(self) -> Coord {
        match self {
            Dir::Up => Coord { x: 0, y: -1 },
            Dir::Down => Coord { x: 0, y: 1 },
            Dir::Left => Coord { x: -1, y: 0 },
            Dir::Right => Coord { x: 1, y: 0 },
        }
    }

    #[inline]
    pub const fn opposite(self) -> Dir {
        match self {
            Dir::Up => Dir::Down,
            Dir::Down => Dir::Up,
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }

    /// LURD character: lowercase for a plain step, uppercase for a push.
    pub const fn lurd(self, push: bool) -> char {
        match (self, push) {
            (Dir::Up, false) => 'u',
            (Dir::Down, false) => 'd',
            (Dir::Left, false) => 'l',
            (Dir::Right, false) => 'r',
            (Dir::Up, true) => 'U',
            (Dir::Down, true) => 'D',
            (Dir::Left, true) => 'L',
            (Dir::Right, true) => 'R',
        }
    }

    /// Inverse of [`Dir::lurd`]: returns the direction and whether it is a push.
    pub fn from_lurd(c: char) -> Option<(Dir, bool)> {
        let d = match c.to_ascii_lowercase() {
            'u' => Dir::Up,
            'd' => Dir::Down,
            'l' => Dir::Left,
            'r' => Dir::Right,
            _ => return None,
        };
        Some((d, c.is_ascii_uppercase()))
    }
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dir::Up => "up",
            Dir::Down => "down",
            Dir::Left => "left",
            Dir::Right => "right",
        };
        f.write_str(name)
    }
}
