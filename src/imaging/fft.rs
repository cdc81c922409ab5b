//! Separable 2-D FFT helpers over `ndarray` grids.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};

pub type Spectrum = Array2<Complex<f64>>;

/// Lift a real grid into the complex plane.
pub fn to_complex(input: &Array2<f64>) -> Spectrum {
    input.mapv(|v| Complex::new(v, 0.0))
}

/// Forward 2-D DFT, rows first then columns.
pub fn fft_2d(input: &Spectrum) -> Spectrum {
    transform_2d(input, false)
}

/// Inverse 2-D DFT normalized by the number of samples.
pub fn ifft_2d(input: &Spectrum) -> Spectrum {
    let (height, width) = input.dim();
    let scale = (height * width) as f64;
    let mut result = transform_2d(input, true);
    result.mapv_inplace(|v| v / scale);
    result
}

fn transform_2d(input: &Spectrum, inverse: bool) -> Spectrum {
    let (height, width) = input.dim();
    let mut result = input.clone();
    let mut planner = FftPlanner::new();

    let row_fft = if inverse {
        planner.plan_fft_inverse(width)
    } else {
        planner.plan_fft_forward(width)
    };
    let mut buffer = vec![Complex::new(0.0, 0.0); width];
    for mut row in result.rows_mut() {
        for (dst, src) in buffer.iter_mut().zip(row.iter()) {
            *dst = *src;
        }
        row_fft.process(&mut buffer);
        for (dst, src) in row.iter_mut().zip(buffer.iter()) {
            *dst = *src;
        }
    }

    let col_fft = if inverse {
        planner.plan_fft_inverse(height)
    } else {
        planner.plan_fft_forward(height)
    };
    let mut buffer = vec![Complex::new(0.0, 0.0); height];
    for mut col in result.columns_mut() {
        for (dst, src) in buffer.iter_mut().zip(col.iter()) {
            *dst = *src;
        }
        col_fft.process(&mut buffer);
        for (dst, src) in col.iter_mut().zip(buffer.iter()) {
            *dst = *src;
        }
    }

    result
}

/// Location and magnitude of the largest value, in row-major scan order.
pub fn peak_magnitude(surface: &Spectrum) -> ((usize, usize), f64) {
    let mut best = ((0, 0), f64::NEG_INFINITY);
    for ((r, c), value) in surface.indexed_iter() {
        let magnitude = value.norm();
        if magnitude > best.1 {
            best = ((r, c), magnitude);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fft_roundtrip() {
        let grid = Array2::from_shape_fn((8, 8), |(r, c)| (r * 8 + c) as f64);
        let back = ifft_2d(&fft_2d(&to_complex(&grid)));
        for ((r, c), v) in back.indexed_iter() {
            assert!((v.re - grid[[r, c]]).abs() < 1e-9);
            assert!(v.im.abs() < 1e-9);
        }
    }

    #[test]
    fn test_peak_magnitude() {
        let mut grid = Array2::zeros((4, 4));
        grid[[2, 3]] = -5.0;
        grid[[1, 1]] = 3.0;
        let (idx, value) = peak_magnitude(&to_complex(&grid));
        assert_eq!(idx, (2, 3));
        assert!((value - 5.0).abs() < 1e-12);
    }
}
