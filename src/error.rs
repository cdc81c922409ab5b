use thiserror::Error;

use crate::tiles::TileKey;

/// Errors raised by the alignment core.
///
/// Expected negative outcomes (no hitting tiles, a tile whose hit pool is
/// too small) are not errors and never show up here.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("padded image is {actual:?}, expected a {side}x{side} power-of-two square")]
    PaddingViolation { side: usize, actual: (usize, usize) },

    #[error("no image loaded into the alignment session")]
    NoImage,

    #[error("no cluster detections loaded into the alignment session")]
    NoClusters,

    #[error("no reads loaded")]
    EmptyCatalog,

    #[error("read coordinates span zero width, cannot derive a pixel scale")]
    DegenerateCatalog,

    #[error("image spectrum prepared for padding {actual:?}, tile canvas is {expected:?}")]
    SpectrumMismatch {
        expected: (usize, usize),
        actual: Option<(usize, usize)>,
    },

    #[error("unknown tile {0}")]
    UnknownTile(TileKey),

    #[error("alignment not found: no hitting tiles")]
    NotRoughAligned,

    #[error("could not precision align")]
    PrecisionFailed,

    #[error("hit categories do not partition the nearest-neighbor relation: {0}")]
    PartitionViolation(String),

    #[error("least squares system is singular")]
    SingularSystem,

    #[error("malformed alignment record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("malformed cluster catalog at line {line}: {reason}")]
    MalformedClusters { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AlignError {
    /// Failures the caller should log and skip rather than surface.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AlignError::NotRoughAligned | AlignError::PrecisionFailed)
    }
}

pub type Result<T> = std::result::Result<T, AlignError>;
