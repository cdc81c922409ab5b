use ndarray::{Array2, Axis};

/// Truncation of the Gaussian kernel, in standard deviations.
const TRUNCATE: f64 = 4.0;

/// Normalized 1-D Gaussian kernel of radius `round(TRUNCATE * sigma)`.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as usize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Separable Gaussian blur with mirror-reflect boundaries (`dcba|abcd|dcba`).
///
/// A non-positive sigma leaves the grid unchanged.
pub fn gaussian_filter(input: &Array2<f64>, sigma: f64) -> Array2<f64> {
    if sigma <= 0.0 || input.is_empty() {
        return input.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let rows = convolve_axis(input, &kernel, Axis(0));
    convolve_axis(&rows, &kernel, Axis(1))
}

fn convolve_axis(input: &Array2<f64>, kernel: &[f64], axis: Axis) -> Array2<f64> {
    let radius = (kernel.len() / 2) as isize;
    let mut output = Array2::zeros(input.dim());
    let len = input.len_of(axis) as isize;

    for (src, mut dst) in input.lanes(axis).into_iter().zip(output.lanes_mut(axis)) {
        for i in 0..len {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let j = reflect(i + k as isize - radius, len);
                acc += weight * src[j];
            }
            dst[i as usize] = acc;
        }
    }
    output
}

fn reflect(mut idx: isize, len: isize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * len;
    idx = idx.rem_euclid(period);
    if idx >= len {
        idx = period - 1 - idx;
    }
    idx as usize
}
