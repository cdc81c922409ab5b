use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::BufRead;
use std::sync::Arc;

use super::key::{Read, TileKey};
use crate::geometry::Point;

/// Axis-aligned bounding rectangle in native coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    fn of<'a>(points: impl Iterator<Item = &'a Point>) -> Option<Self> {
        points.fold(None, |acc, &(r, c)| {
            Some(match acc {
                None => Bounds {
                    min: (r, c),
                    max: (r, c),
                },
                Some(b) => Bounds {
                    min: (b.min.0.min(r), b.min.1.min(c)),
                    max: (b.max.0.max(r), b.max.1.max(c)),
                },
            })
        })
    }
}

/// Immutable tile key → reads mapping shared by every alignment session.
#[derive(Debug, Clone, Default)]
pub struct ReadCatalog {
    tiles: BTreeMap<TileKey, Arc<[Read]>>,
    bounds: Option<Bounds>,
}

impl ReadCatalog {
    pub fn from_tiles<I>(tiles: I) -> Self
    where
        I: IntoIterator<Item = (TileKey, Vec<Read>)>,
    {
        let tiles: BTreeMap<TileKey, Arc<[Read]>> = tiles
            .into_iter()
            .map(|(key, reads)| (key, Arc::from(reads)))
            .collect();
        let bounds = Bounds::of(tiles.values().flat_map(|reads| reads.iter().map(|r| &r.position)));
        Self { tiles, bounds }
    }

    /// Group Illumina read names (`...:<lane>:<tile>:<x>:<y>`) by tile.
    ///
    /// Reads keep their input order. Blank lines are ignored; lines without
    /// the five trailing fields are logged and skipped. A repeated name
    /// within a tile is kept at its first occurrence.
    pub fn from_read_names<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut grouped: HashMap<TileKey, (Vec<Read>, HashSet<String>)> = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            let name = match line.split_whitespace().next() {
                Some(name) => name,
                None => continue,
            };
            match parse_read_name(name) {
                Some((key, position)) => {
                    let (reads, seen) = grouped.entry(key).or_default();
                    if seen.insert(name.to_string()) {
                        reads.push(Read::new(name, position));
                    } else {
                        tracing::debug!(read = name, "Duplicate read name, skipping");
                    }
                }
                None => tracing::warn!(line = %line, "Invalid read name, skipping"),
            }
        }

        Ok(Self::from_tiles(
            grouped.into_iter().map(|(key, (reads, _))| (key, reads)),
        ))
    }

    /// Restrict the catalog to the given keys.
    pub fn subset<'a>(&self, keys: impl IntoIterator<Item = &'a TileKey>) -> Self {
        let mut tiles = Vec::new();
        for key in keys {
            if let Some(reads) = self.tiles.get(key) {
                tiles.push((key.clone(), reads.to_vec()));
            }
        }
        Self::from_tiles(tiles)
    }

    pub fn get(&self, key: &TileKey) -> Option<&Arc<[Read]>> {
        self.tiles.get(key)
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.tiles.contains_key(key)
    }

    /// Tiles in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&TileKey, &Arc<[Read]>)> {
        self.tiles.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TileKey> {
        self.tiles.keys()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn read_count(&self) -> usize {
        self.tiles.values().map(|reads| reads.len()).sum()
    }

    /// Bounding box over every read of every tile.
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }
}

fn parse_read_name(name: &str) -> Option<(TileKey, Point)> {
    let mut fields = name.rsplitn(5, ':');
    let y = fields.next()?.parse::<f64>().ok()?;
    let x = fields.next()?.parse::<f64>().ok()?;
    let tile = fields.next()?;
    let lane = fields.next()?;
    fields.next()?;
    if lane.is_empty() || tile.is_empty() {
        return None;
    }
    Some((TileKey::from_lane_tile(lane, tile), (x, y)))
}
