pub mod image_conversion;
pub mod stats;

pub use image_conversion::*;
pub use stats::*;
