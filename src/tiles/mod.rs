//! Sequencer tiles and the capability contract the alignment engine uses
//! to project, correlate and transform them.

pub mod catalog;
pub mod key;
pub mod read_tile;

pub use catalog::{Bounds, ReadCatalog};
pub use key::{Read, TileKey};
pub use read_tile::ReadTile;

use ndarray::Array2;
use std::sync::Arc;

use crate::error::{AlignError, Result};
use crate::geometry::{Point, SimilarityTransform};
use crate::imaging::ImageSurface;

/// Parameters for rasterizing projected reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterParams {
    pub microns_per_pixel: f64,
    /// Physical standard deviation of a cluster's footprint.
    pub cluster_sigma_um: f64,
}

impl RasterParams {
    pub fn sigma_pixels(&self) -> f64 {
        self.cluster_sigma_um / self.microns_per_pixel
    }
}

/// Native-to-pixel mapping shared by every tile of one catalog, so tiles
/// stay positioned relative to each other after projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SharedMapping {
    /// Added to native coordinates before scaling (the negated min corner).
    pub offset: Point,
    /// Pixels per native coordinate unit.
    pub scale: f64,
    /// Extent of the scaled bounding box, in pixels.
    pub scaled_dims: (usize, usize),
    /// Nominal physical tile width, in microns.
    pub tile_width: f64,
}

impl SharedMapping {
    pub fn from_catalog(catalog: &ReadCatalog, tile_width: f64, microns_per_pixel: f64) -> Result<Self> {
        let bounds = catalog.bounds().ok_or(AlignError::EmptyCatalog)?;
        let span_r = bounds.max.0 - bounds.min.0;
        let span_c = bounds.max.1 - bounds.min.1;
        if span_r <= 0.0 {
            return Err(AlignError::DegenerateCatalog);
        }
        let scale = (tile_width / span_r) / microns_per_pixel;
        Ok(Self {
            offset: (-bounds.min.0, -bounds.min.1),
            scale,
            scaled_dims: ((scale * span_r + 1.0) as usize, (scale * span_c + 1.0) as usize),
            tile_width,
        })
    }

    pub fn project(&self, point: Point) -> Point {
        (
            self.scale * (point.0 + self.offset.0),
            self.scale * (point.1 + self.offset.1),
        )
    }
}

/// Peak of an FFT cross-correlation and the shift that achieves it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub peak: f64,
    /// Shift from projected raster coordinates into image pixels.
    pub translation: Point,
}

/// What the alignment engine needs from a tile.
pub trait Tile: Clone + Send + Sync {
    fn new(key: TileKey, reads: Arc<[Read]>, raster: RasterParams) -> Self
    where
        Self: Sized;

    fn key(&self) -> &TileKey;

    fn reads(&self) -> &[Read];

    fn read_count(&self) -> usize {
        self.reads().len()
    }

    /// Bind the tile to the session's mapping, discarding any alignment.
    fn establish_shared_mapping(&mut self, mapping: &SharedMapping);

    /// Nominal width taken from the bound mapping.
    fn tile_width(&self) -> Option<f64>;

    /// Rotate the projected raster and return its bounding shape.
    fn rotate(&mut self, degrees: f64) -> (usize, usize);

    /// Adopt the canvas shared by every tile for correlation.
    fn set_canvas_shape(&mut self, shape: (usize, usize));

    fn canvas_shape(&self) -> (usize, usize);

    /// FFT cross-correlation against an image whose spectrum was prepared
    /// with this tile's canvas as padding.
    fn correlate_with(&self, surface: &ImageSurface) -> Result<Correlation>;

    /// Place the projected raster into image space by a rough shift.
    fn apply_translation(&mut self, translation: Point);

    /// Map native coordinates through `transform`, replacing any previous
    /// alignment.
    fn apply_transform(&mut self, transform: SimilarityTransform);

    fn transform(&self) -> Option<&SimilarityTransform>;

    /// Read positions in image space, once roughly or precisely aligned.
    fn aligned_positions(&self) -> Option<&[Point]>;

    /// Sum of `pixels` under the aligned reads; stored as the correlation.
    fn measure_correlation(&mut self, pixels: &Array2<f64>) -> f64;

    fn correlation(&self) -> Option<f64>;

    fn set_score(&mut self, correlation: f64, snr: Option<f64>);

    fn snr(&self) -> Option<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(points: &[Point]) -> ReadCatalog {
        let reads = points
            .iter()
            .enumerate()
            .map(|(i, &p)| Read::new(format!("r{i}"), p))
            .collect();
        ReadCatalog::from_tiles(vec![(TileKey::new("lane1tile2101"), reads)])
    }

    #[test]
    fn test_shared_mapping_scale_and_offset() {
        let mapping = SharedMapping::from_catalog(&catalog(&[(100.0, 50.0), (300.0, 450.0)]), 50.0, 0.5).unwrap();
        assert_eq!(mapping.scale, 0.5);
        assert_eq!(mapping.offset, (-100.0, -50.0));
        assert_eq!(mapping.scaled_dims, (101, 201));
        assert_eq!(mapping.project((100.0, 50.0)), (0.0, 0.0));
        assert_eq!(mapping.project((300.0, 450.0)), (100.0, 200.0));
    }

    #[test]
    fn test_shared_mapping_rejects_degenerate_catalogs() {
        assert!(matches!(
            SharedMapping::from_catalog(&ReadCatalog::default(), 935.0, 0.25),
            Err(AlignError::EmptyCatalog)
        ));
        assert!(matches!(
            SharedMapping::from_catalog(&catalog(&[(10.0, 0.0), (10.0, 90.0)]), 935.0, 0.25),
            Err(AlignError::DegenerateCatalog)
        ));
    }
}
