use ndarray::{s, Array2};

use super::fft::{fft_2d, to_complex, Spectrum};
use crate::error::{AlignError, Result};
use crate::utils::median;

/// Frequency-domain image padded for one particular correlation window.
#[derive(Debug, Clone)]
pub struct PreparedSpectrum {
    pub padding: (usize, usize),
    pub side: usize,
    pub data: Spectrum,
}

/// A median-normalized microscope image plus its cached spectrum.
#[derive(Debug, Clone)]
pub struct ImageSurface {
    pixels: Array2<f64>,
    microns_per_pixel: f64,
    spectrum: Option<PreparedSpectrum>,
}

impl ImageSurface {
    /// Build a surface from raw intensities, normalizing on the way in.
    pub fn new(pixels: Array2<f64>, microns_per_pixel: f64) -> Result<Self> {
        if !(microns_per_pixel.is_finite() && microns_per_pixel > 0.0) {
            return Err(AlignError::InvalidImage(format!(
                "pixel size must be positive, got {microns_per_pixel}"
            )));
        }
        let mut surface = Self {
            pixels,
            microns_per_pixel,
            spectrum: None,
        };
        surface.normalize()?;
        Ok(surface)
    }

    /// Divide every pixel by the median, then subtract one.
    pub fn normalize(&mut self) -> Result<()> {
        if self.pixels.is_empty() {
            return Err(AlignError::InvalidImage("empty pixel grid".into()));
        }
        let values: Vec<f64> = self.pixels.iter().copied().collect();
        let med = median(&values)
            .ok_or_else(|| AlignError::InvalidImage("pixel grid contains NaN".into()))?;
        if med == 0.0 || !med.is_finite() {
            return Err(AlignError::InvalidImage(format!(
                "cannot normalize by median {med}"
            )));
        }
        self.pixels.mapv_inplace(|p| p / med - 1.0);
        self.spectrum = None;
        Ok(())
    }

    /// Zero-pad into the smallest power-of-two square that fits the image
    /// offset by `padding`, and cache its 2-D DFT.
    ///
    /// The cached spectrum is reused only while `padding` stays the same.
    pub fn prepare_correlation(&mut self, padding: (usize, usize)) -> Result<&PreparedSpectrum> {
        let stale = self
            .spectrum
            .as_ref()
            .map_or(true, |spectrum| spectrum.padding != padding);
        if stale {
            let side = padded_side(self.shape(), padding);
            let padded = pad_to_square(&self.pixels, padding, side)?;
            self.spectrum = Some(PreparedSpectrum {
                padding,
                side,
                data: fft_2d(&to_complex(&padded)),
            });
        }
        self.spectrum.as_ref().ok_or(AlignError::NoImage)
    }

    pub fn spectrum(&self) -> Option<&PreparedSpectrum> {
        self.spectrum.as_ref()
    }

    pub fn pixels(&self) -> &Array2<f64> {
        &self.pixels
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    pub fn microns_per_pixel(&self) -> f64 {
        self.microns_per_pixel
    }

    /// Physical extent in microns, (rows, columns).
    pub fn physical_dims(&self) -> (f64, f64) {
        let (h, w) = self.shape();
        (
            h as f64 * self.microns_per_pixel,
            w as f64 * self.microns_per_pixel,
        )
    }

    /// Whether a (row, column) position lies inside the pixel grid.
    pub fn contains(&self, point: (f64, f64)) -> bool {
        let (h, w) = self.shape();
        point.0 >= 0.0 && point.0 < h as f64 && point.1 >= 0.0 && point.1 < w as f64
    }
}

/// Smallest power of two covering both padded axes.
pub fn padded_side(shape: (usize, usize), padding: (usize, usize)) -> usize {
    let total_r = shape.0 + padding.0;
    let total_c = shape.1 + padding.1;
    total_r.next_power_of_two().max(total_c.next_power_of_two())
}

/// Place `image` at offset `padding` inside a zeroed `side`×`side` square.
pub fn pad_to_square(
    image: &Array2<f64>,
    padding: (usize, usize),
    side: usize,
) -> Result<Array2<f64>> {
    let (h, w) = image.dim();
    let required = padded_side((h, w), padding);
    if side != required {
        return Err(AlignError::PaddingViolation {
            side: required,
            actual: (side, side),
        });
    }

    let mut padded = Array2::zeros((side, side));
    padded
        .slice_mut(s![padding.0..padding.0 + h, padding.1..padding.1 + w])
        .assign(image);
    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_side() {
        assert_eq!(padded_side((512, 512), (300, 200)), 1024);
        assert_eq!(padded_side((100, 30), (28, 2)), 128);
        assert_eq!(padded_side((100, 30), (29, 2)), 256);
    }
}
