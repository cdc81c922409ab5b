pub mod fft;
pub mod filter;
pub mod surface;

pub use filter::gaussian_filter;
pub use surface::{pad_to_square, padded_side, ImageSurface, PreparedSpectrum};
