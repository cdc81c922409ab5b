use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::Point;

/// Identifier of a sequencer tile, e.g. `lane1tile2114`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileKey(String);

/// Byte offset of the surface digit in `laneNtileSXYZ`.
const SIDE_DIGIT: usize = 9;

impl TileKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_lane_tile(lane: &str, tile: &str) -> Self {
        Self(format!("lane{lane}tile{tile}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The same tile position on the chip's first surface.
    ///
    /// Keys too short to carry a surface digit are returned unchanged.
    pub fn on_side_one(&self) -> Self {
        match self.0.get(..SIDE_DIGIT).zip(self.0.get(SIDE_DIGIT + 1..)) {
            Some((head, tail)) => Self(format!("{head}1{tail}")),
            None => self.clone(),
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TileKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// One sequenced read and its position in native sequencer coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Read {
    pub name: String,
    pub position: Point,
}

impl Read {
    pub fn new(name: impl Into<String>, position: Point) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_one_remap() {
        assert_eq!(TileKey::new("lane1tile2114").on_side_one(), TileKey::new("lane1tile1114"));
        assert_eq!(TileKey::new("lane1tile1101").on_side_one(), TileKey::new("lane1tile1101"));
        assert_eq!(TileKey::new("short").on_side_one(), TileKey::new("short"));
    }

    #[test]
    fn test_from_lane_tile() {
        assert_eq!(TileKey::from_lane_tile("1", "2107").as_str(), "lane1tile2107");
    }
}
