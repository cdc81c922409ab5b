use ndarray::{s, Array2};
use rustfft::num_complex::Complex;
use std::sync::Arc;

use super::{Correlation, RasterParams, Read, SharedMapping, Tile, TileKey};
use crate::error::{AlignError, Result};
use crate::geometry::{Point, SimilarityTransform};
use crate::imaging::fft::{fft_2d, ifft_2d, peak_magnitude, to_complex};
use crate::imaging::{gaussian_filter, ImageSurface};

/// Tile backed by an in-memory list of reads.
#[derive(Debug, Clone)]
pub struct ReadTile {
    key: TileKey,
    reads: Arc<[Read]>,
    raster: RasterParams,
    tile_width: Option<f64>,
    projected: Vec<Point>,
    rotation_degrees: f64,
    canvas_shape: (usize, usize),
    aligned: Option<Vec<Point>>,
    transform: Option<SimilarityTransform>,
    correlation: Option<f64>,
    snr: Option<f64>,
}

impl ReadTile {
    /// Cumulative rough rotation applied to the projected raster.
    pub fn rough_rotation_degrees(&self) -> f64 {
        self.rotation_degrees
    }

    pub fn projected(&self) -> &[Point] {
        &self.projected
    }

    /// Projected reads splatted onto the canvas and smoothed to cluster size.
    pub fn raster(&self) -> Array2<f64> {
        let (rows, cols) = self.canvas_shape;
        let mut canvas = Array2::zeros((rows, cols));
        for &(r, c) in &self.projected {
            if r < 0.0 || c < 0.0 {
                continue;
            }
            let (r, c) = (r as usize, c as usize);
            if r < rows && c < cols {
                canvas[[r, c]] = 1.0;
            }
        }
        gaussian_filter(&canvas, self.raster.sigma_pixels())
    }

    fn native_positions(&self) -> impl Iterator<Item = Point> + '_ {
        self.reads.iter().map(|read| read.position)
    }
}

impl Tile for ReadTile {
    fn new(key: TileKey, reads: Arc<[Read]>, raster: RasterParams) -> Self {
        Self {
            key,
            reads,
            raster,
            tile_width: None,
            projected: Vec::new(),
            rotation_degrees: 0.0,
            canvas_shape: (0, 0),
            aligned: None,
            transform: None,
            correlation: None,
            snr: None,
        }
    }

    fn key(&self) -> &TileKey {
        &self.key
    }

    fn reads(&self) -> &[Read] {
        &self.reads
    }

    fn establish_shared_mapping(&mut self, mapping: &SharedMapping) {
        self.projected = self.native_positions().map(|p| mapping.project(p)).collect();
        self.canvas_shape = mapping.scaled_dims;
        self.tile_width = Some(mapping.tile_width);
        self.rotation_degrees = 0.0;
        self.aligned = None;
        self.transform = None;
        self.correlation = None;
        self.snr = None;
    }

    fn tile_width(&self) -> Option<f64> {
        self.tile_width
    }

    fn rotate(&mut self, degrees: f64) -> (usize, usize) {
        self.rotation_degrees += degrees;
        if self.projected.is_empty() {
            return (0, 0);
        }

        let (sin, cos) = degrees.to_radians().sin_cos();
        let mut min = (f64::INFINITY, f64::INFINITY);
        let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in self.projected.iter_mut() {
            *p = (cos * p.0 - sin * p.1, sin * p.0 + cos * p.1);
            min = (min.0.min(p.0), min.1.min(p.1));
        }
        for p in self.projected.iter_mut() {
            *p = (p.0 - min.0, p.1 - min.1);
            max = (max.0.max(p.0), max.1.max(p.1));
        }

        self.canvas_shape = ((max.0 + 1.0) as usize, (max.1 + 1.0) as usize);
        self.canvas_shape
    }

    fn set_canvas_shape(&mut self, shape: (usize, usize)) {
        self.canvas_shape = shape;
    }

    fn canvas_shape(&self) -> (usize, usize) {
        self.canvas_shape
    }

    fn correlate_with(&self, surface: &ImageSurface) -> Result<Correlation> {
        let spectrum = surface
            .spectrum()
            .filter(|spectrum| spectrum.padding == self.canvas_shape)
            .ok_or_else(|| AlignError::SpectrumMismatch {
                expected: self.canvas_shape,
                actual: surface.spectrum().map(|spectrum| spectrum.padding),
            })?;

        let raster = self.raster();
        let (rows, cols) = raster.dim();
        let mut padded = Array2::zeros((spectrum.side, spectrum.side));
        padded.slice_mut(s![..rows, ..cols]).assign(&raster);
        let tile_fft = fft_2d(&to_complex(&padded));

        let cross: Array2<Complex<f64>> = ndarray::Zip::from(&tile_fft)
            .and(&spectrum.data)
            .map_collect(|t, im| t.conj() * *im);
        let surface_corr = ifft_2d(&cross);
        let ((peak_r, peak_c), peak) = peak_magnitude(&surface_corr);

        Ok(Correlation {
            peak,
            translation: (
                peak_r as f64 - self.canvas_shape.0 as f64,
                peak_c as f64 - self.canvas_shape.1 as f64,
            ),
        })
    }

    fn apply_translation(&mut self, translation: Point) {
        self.aligned = Some(
            self.projected
                .iter()
                .map(|&(r, c)| (r + translation.0, c + translation.1))
                .collect(),
        );
    }

    fn apply_transform(&mut self, transform: SimilarityTransform) {
        self.aligned = Some(self.native_positions().map(|p| transform.apply(p)).collect());
        self.transform = Some(transform);
    }

    fn transform(&self) -> Option<&SimilarityTransform> {
        self.transform.as_ref()
    }

    fn aligned_positions(&self) -> Option<&[Point]> {
        self.aligned.as_deref()
    }

    fn measure_correlation(&mut self, pixels: &Array2<f64>) -> f64 {
        let (rows, cols) = pixels.dim();
        let total: f64 = self
            .aligned
            .iter()
            .flatten()
            .filter(|&&(r, c)| r >= 0.0 && c >= 0.0 && r < rows as f64 && c < cols as f64)
            .map(|&(r, c)| pixels[[r as usize, c as usize]])
            .sum();
        self.correlation = Some(total);
        total
    }

    fn correlation(&self) -> Option<f64> {
        self.correlation
    }

    fn set_score(&mut self, correlation: f64, snr: Option<f64>) {
        self.correlation = Some(correlation);
        self.snr = snr;
    }

    fn snr(&self) -> Option<f64> {
        self.snr
    }
}
