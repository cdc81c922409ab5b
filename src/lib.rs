//! Alignment of microscope fields of view to sequencing read coordinates.
//!
//! A field is aligned in two phases. Rough alignment rotates every tile's
//! projected reads, FFT-correlates them against the image and keeps tiles
//! whose peak clears a noise floor measured on control tiles. Precision
//! alignment then matches reads to detected clusters by mutual nearest
//! neighbors and solves a least-squares similarity transform per tile.

pub mod clusters;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod imaging;
pub mod logging;
pub mod record;
pub mod tiles;
pub mod utils;

pub use clusters::{ClusterSet, ClusterSource};
pub use config::{AlignConfig, ChipSide, HitThresholdPolicy};
pub use engine::{AlignmentEngine, AlignmentState, HitCategory, HitClassification};
pub use error::{AlignError, Result};
pub use geometry::{Point, SimilarityTransform};
pub use imaging::ImageSurface;
pub use record::{AlignmentRecord, HitCounts, ReadPosition, TileAlignment};
pub use tiles::{Read, ReadCatalog, ReadTile, Tile, TileKey};
