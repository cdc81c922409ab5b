pub mod kdtree;
pub mod similarity;

pub use kdtree::{distance, KdTree};
pub use similarity::SimilarityTransform;

/// A (row, column) position.
pub type Point = (f64, f64);
