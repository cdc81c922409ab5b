//! Serializable alignment results.
//!
//! The text form is line oriented and tab separated:
//!
//! ```text
//! tile	lane1tile2114	scale=0.0187	width=935	rotation=180.2	offset=-12.5,440.75
//! hits	exclusive=812	good_mutual=97	bad_mutual=40	non_mutual=1203
//! ```
//!
//! Floats are written in shortest round-trip form, so parsing a record
//! returns exactly the values that were written.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AlignError;
use crate::geometry::{Point, SimilarityTransform};
use crate::tiles::TileKey;

/// Number of hits in each category after the final classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitCounts {
    pub exclusive: usize,
    pub good_mutual: usize,
    pub bad_mutual: usize,
    pub non_mutual: usize,
}

impl HitCounts {
    pub fn total(&self) -> usize {
        self.exclusive + self.good_mutual + self.bad_mutual + self.non_mutual
    }

    /// Hits trusted enough to fit against.
    pub fn score(&self) -> usize {
        self.exclusive + self.good_mutual
    }
}

/// Solved transform for one tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileAlignment {
    pub key: TileKey,
    pub scale: f64,
    /// Nominal tile width the shared mapping was built with, in microns.
    pub tile_width: f64,
    pub rotation_degrees: f64,
    pub offset: Point,
}

impl TileAlignment {
    pub fn new(key: TileKey, transform: &SimilarityTransform, tile_width: f64) -> Self {
        Self {
            key,
            scale: transform.scale,
            tile_width,
            rotation_degrees: transform.rotation_degrees(),
            offset: transform.offset,
        }
    }

    pub fn transform(&self) -> SimilarityTransform {
        SimilarityTransform::from_degrees(self.scale, self.rotation_degrees, self.offset)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub tiles: Vec<TileAlignment>,
    pub hits: HitCounts,
}

impl AlignmentRecord {
    pub fn score(&self) -> usize {
        self.hits.score()
    }

    pub fn is_better_than(&self, other: &AlignmentRecord) -> bool {
        self.score() > other.score()
    }

    pub fn tile(&self, key: &TileKey) -> Option<&TileAlignment> {
        self.tiles.iter().find(|tile| &tile.key == key)
    }
}

impl fmt::Display for TileAlignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tile\t{}\tscale={}\twidth={}\trotation={}\toffset={},{}",
            self.key, self.scale, self.tile_width, self.rotation_degrees, self.offset.0, self.offset.1
        )
    }
}

impl fmt::Display for HitCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits\texclusive={}\tgood_mutual={}\tbad_mutual={}\tnon_mutual={}",
            self.exclusive, self.good_mutual, self.bad_mutual, self.non_mutual
        )
    }
}

impl fmt::Display for AlignmentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tile in &self.tiles {
            writeln!(f, "{}", tile)?;
        }
        writeln!(f, "{}", self.hits)
    }
}

/// Splits `name=value` fields and checks them off in order.
struct Fields<'a> {
    line: usize,
    fields: std::str::Split<'a, char>,
}

impl<'a> Fields<'a> {
    fn malformed(&self, reason: impl Into<String>) -> AlignError {
        AlignError::MalformedRecord {
            line: self.line,
            reason: reason.into(),
        }
    }

    fn raw(&mut self, name: &str) -> Result<&'a str, AlignError> {
        let field = self
            .fields
            .next()
            .ok_or_else(|| self.malformed(format!("missing {name}")))?;
        field
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
            .ok_or_else(|| self.malformed(format!("expected {name}=, found {field:?}")))
    }

    fn parse<T: FromStr>(&mut self, name: &str) -> Result<T, AlignError>
    where
        T::Err: fmt::Display,
    {
        let raw = self.raw(name)?;
        raw.parse()
            .map_err(|e| self.malformed(format!("bad {name} {raw:?}: {e}")))
    }

    fn finish(mut self) -> Result<(), AlignError> {
        match self.fields.next() {
            Some(extra) => Err(self.malformed(format!("unexpected field {extra:?}"))),
            None => Ok(()),
        }
    }
}

impl FromStr for AlignmentRecord {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tiles = Vec::new();
        let mut hits = None;

        for (idx, line) in s.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let mut fields = Fields {
                line: idx + 1,
                fields: line.split('\t'),
            };
            match fields.fields.next() {
                Some("tile") => {
                    let key = fields
                        .fields
                        .next()
                        .filter(|key| !key.is_empty())
                        .ok_or_else(|| fields.malformed("missing tile key"))?;
                    let scale = fields.parse::<f64>("scale")?;
                    let tile_width = fields.parse::<f64>("width")?;
                    let rotation_degrees = fields.parse::<f64>("rotation")?;
                    let offset = fields.raw("offset")?;
                    let offset = offset
                        .split_once(',')
                        .and_then(|(r, c)| Some((r.parse::<f64>().ok()?, c.parse::<f64>().ok()?)))
                        .ok_or_else(|| fields.malformed(format!("bad offset {offset:?}")))?;
                    fields.finish()?;
                    tiles.push(TileAlignment {
                        key: TileKey::new(key),
                        scale,
                        tile_width,
                        rotation_degrees,
                        offset,
                    });
                }
                Some("hits") => {
                    if hits.is_some() {
                        return Err(fields.malformed("duplicate hits line"));
                    }
                    let counts = HitCounts {
                        exclusive: fields.parse("exclusive")?,
                        good_mutual: fields.parse("good_mutual")?,
                        bad_mutual: fields.parse("bad_mutual")?,
                        non_mutual: fields.parse("non_mutual")?,
                    };
                    fields.finish()?;
                    hits = Some(counts);
                }
                Some(other) => {
                    return Err(fields.malformed(format!("unknown line kind {other:?}")));
                }
                None => continue,
            }
        }

        let hits = hits.ok_or(AlignError::MalformedRecord {
            line: s.lines().count(),
            reason: "missing hits line".to_string(),
        })?;
        Ok(Self { tiles, hits })
    }
}

/// One aligned read inside the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadPosition {
    pub name: String,
    pub row: f64,
    pub column: f64,
}

impl fmt::Display for ReadPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{:.6}\t{:.6}", self.name, self.row, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_unknown_lines() {
        let err = "tile\tk\tscale=1\twidth=2\trotation=3\toffset=4,5\nfoo\n"
            .parse::<AlignmentRecord>()
            .unwrap_err();
        assert!(matches!(err, AlignError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_parse_requires_hits() {
        let err = "tile\tk\tscale=1\twidth=2\trotation=3\toffset=4,5\n"
            .parse::<AlignmentRecord>()
            .unwrap_err();
        assert!(matches!(err, AlignError::MalformedRecord { .. }));
    }

    #[test]
    fn test_score_ordering() {
        let mut better = AlignmentRecord::default();
        better.hits.exclusive = 10;
        let mut worse = AlignmentRecord::default();
        worse.hits.bad_mutual = 50;
        assert!(better.is_better_than(&worse));
        assert!(!worse.is_better_than(&better));
    }

    #[test]
    fn test_read_position_line() {
        let pos = ReadPosition {
            name: "M0:1:FC:1:2104:10:20".to_string(),
            row: 1.5,
            column: 2.0,
        };
        assert_eq!(pos.to_string(), "M0:1:FC:1:2104:10:20\t1.500000\t2.000000");
    }
}
