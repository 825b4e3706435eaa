//! Approach directions and direction-indexed tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// One approach of the intersection. The ordinal doubles as the rotation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North = 0,
    South = 1,
    East = 2,
    West = 3,
}

impl Direction {
    pub const COUNT: usize = 4;
    pub const ALL: [Direction; Direction::COUNT] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Direction for an arbitrary ordinal, wrapping modulo 4.
    pub fn from_ordinal(ordinal: usize) -> Self {
        Self::ALL[ordinal % Self::COUNT]
    }

    /// Next direction in the N → S → E → W → N rotation.
    pub fn next(self) -> Self {
        Self::from_ordinal(self.index() + 1)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LightColor {
    Red,
    Yellow,
    Green,
}

/// Fixed-size table holding exactly one entry per [`Direction`].
///
/// Construction always goes through a value for every variant, so lookups
/// never miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DirectionMap<T>([T; Direction::COUNT]);

impl<T> DirectionMap<T> {
    pub fn from_fn(mut f: impl FnMut(Direction) -> T) -> Self {
        Self(Direction::ALL.map(&mut f))
    }

    /// Like [`DirectionMap::from_fn`], stopping at the first error.
    pub fn try_from_fn<E>(mut f: impl FnMut(Direction) -> Result<T, E>) -> Result<Self, E> {
        let [north, south, east, west] = Direction::ALL;
        Ok(Self([f(north)?, f(south)?, f(east)?, f(west)?]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn map<U>(&self, mut f: impl FnMut(Direction, &T) -> U) -> DirectionMap<U> {
        DirectionMap::from_fn(|direction| f(direction, &self.0[direction.index()]))
    }
}

impl<T: Copy> DirectionMap<T> {
    pub fn splat(value: T) -> Self {
        Self([value; Direction::COUNT])
    }
}

impl<T> Index<Direction> for DirectionMap<T> {
    type Output = T;

    fn index(&self, direction: Direction) -> &T {
        &self.0[direction.index()]
    }
}

impl<T> IndexMut<Direction> for DirectionMap<T> {
    fn index_mut(&mut self, direction: Direction) -> &mut T {
        &mut self.0[direction.index()]
    }
}
