use std::io::BufRead;

use crate::error::{AlignError, Result};
use crate::geometry::Point;

/// Anything that can hand the engine observed cluster centroids, in
/// (row, column) pixel coordinates.
pub trait ClusterSource: Send + Sync {
    fn centroids(&self) -> &[Point];

    fn len(&self) -> usize {
        self.centroids().len()
    }

    fn is_empty(&self) -> bool {
        self.centroids().is_empty()
    }
}

/// Cluster detections held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterSet {
    points: Vec<Point>,
}

impl ClusterSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Parse a whitespace-separated detection catalog.
    ///
    /// Lines starting with `#` are comments. The first two columns are the
    /// 1-based X (column) and Y (row) centroid; further columns are ignored.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut points = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut fields = trimmed.split_whitespace();
            let mut next_coord = |name: &str| -> Result<f64> {
                fields
                    .next()
                    .ok_or_else(|| AlignError::MalformedClusters {
                        line: idx + 1,
                        reason: format!("missing {name} column"),
                    })?
                    .parse::<f64>()
                    .map_err(|e| AlignError::MalformedClusters {
                        line: idx + 1,
                        reason: format!("bad {name} value: {e}"),
                    })
            };
            let x = next_coord("x")?;
            let y = next_coord("y")?;
            points.push((y - 1.0, x - 1.0));
        }
        Ok(Self { points })
    }
}

impl ClusterSource for ClusterSet {
    fn centroids(&self) -> &[Point] {
        &self.points
    }
}
