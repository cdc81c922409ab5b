use anyhow::Result;
use image::{DynamicImage, ImageBuffer, Luma};
use ndarray::Array2;
use std::path::Path;

/// Convert a 16-bit grayscale buffer into a row-major `f64` grid.
pub fn luma16_to_array(image: &ImageBuffer<Luma<u16>, Vec<u16>>) -> Array2<f64> {
    let (width, height) = image.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        image.get_pixel(c as u32, r as u32)[0] as f64
    })
}

/// Load a microscope image from disk as a grid of raw intensities.
///
/// Color images are collapsed to luminance; 8-bit data is widened to 16 bits
/// without rescaling so median normalization sees the original counts.
pub fn load_image(path: &Path) -> Result<Array2<f64>> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Image file does not exist: {}",
            path.display()
        ));
    }

    let img = image::open(path)?;
    let grid = match img {
        DynamicImage::ImageLuma8(buf) => {
            let (width, height) = buf.dimensions();
            Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
                buf.get_pixel(c as u32, r as u32)[0] as f64
            })
        }
        other => luma16_to_array(&other.to_luma16()),
    };

    validate_image_size(&grid)?;
    Ok(grid)
}

/// Validate that image has reasonable dimensions
pub fn validate_image_size(grid: &Array2<f64>) -> Result<()> {
    validate_image_size_with_limits(grid, 16, 16384)
}

/// Validate image size with custom limits
pub fn validate_image_size_with_limits(
    grid: &Array2<f64>,
    min_size: usize,
    max_size: usize,
) -> Result<()> {
    let (height, width) = grid.dim();

    if width < min_size || height < min_size {
        return Err(anyhow::anyhow!(
            "Image too small: {}x{}, minimum: {}x{}",
            width,
            height,
            min_size,
            min_size
        ));
    }

    if width > max_size || height > max_size {
        return Err(anyhow::anyhow!(
            "Image too large: {}x{}, maximum: {}x{}",
            width,
            height,
            max_size,
            max_size
        ));
    }

    Ok(())
}
