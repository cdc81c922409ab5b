//! Fan-out of independent field alignments across a rayon pool.
//!
//! Every field runs on its own fork of a template engine. Failures stay
//! with the field that produced them and never cancel sibling work.

use ndarray::Array2;
use rayon::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::clusters::ClusterSource;
use crate::engine::AlignmentEngine;
use crate::error::{AlignError, Result};
use crate::logging::FieldSpan;
use crate::record::{AlignmentRecord, ReadPosition};
use crate::tiles::{ReadCatalog, Tile, TileKey};

/// One microscope image awaiting alignment.
#[derive(Clone)]
pub struct FieldOfView {
    pub id: String,
    /// Grid column the image was taken at, used by the boundary scan.
    pub column: usize,
    pub pixels: Arc<Array2<f64>>,
    pub clusters: Arc<dyn ClusterSource>,
    /// Tiles this field is expected to overlap.
    pub candidates: Vec<TileKey>,
}

#[derive(Debug)]
pub enum FieldOutcome {
    Aligned {
        record: AlignmentRecord,
        positions: Vec<ReadPosition>,
    },
    /// Expected negative: nothing hit, or too few hits to fit.
    Skipped { reason: String },
    /// An invariant broke while processing this field.
    Failed(AlignError),
}

impl FieldOutcome {
    pub fn is_aligned(&self) -> bool {
        matches!(self, FieldOutcome::Aligned { .. })
    }
}

#[derive(Debug)]
pub struct FieldReport {
    pub id: String,
    pub correlation_id: Uuid,
    pub outcome: FieldOutcome,
}

/// First field found to align while scanning columns in order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryHit {
    pub field_id: String,
    pub column: usize,
    pub tiles: Vec<TileKey>,
}

/// Rough and precision align one field on a fork of `template`.
///
/// With `all_reads`, read positions are projected from that expanded
/// catalog using the transforms solved on the template's reads.
pub fn align_field<T: Tile>(
    template: &AlignmentEngine<T>,
    field: &FieldOfView,
    all_reads: Option<&ReadCatalog>,
) -> FieldReport {
    let span = FieldSpan::start(&field.id);
    let _guard = span.span().enter();

    let outcome = match run_field(template, field, all_reads, &span) {
        Ok(outcome) => outcome,
        Err(e) if e.is_recoverable() => FieldOutcome::Skipped {
            reason: e.to_string(),
        },
        Err(e) => {
            tracing::error!(error = %e, "Field alignment failed");
            FieldOutcome::Failed(e)
        }
    };

    match &outcome {
        FieldOutcome::Aligned { record, .. } => {
            span.record_result(true, &format!("score {}", record.score()))
        }
        FieldOutcome::Skipped { reason } => span.record_result(false, reason),
        FieldOutcome::Failed(e) => span.record_result(false, &e.to_string()),
    }

    FieldReport {
        id: field.id.clone(),
        correlation_id: span.correlation_id(),
        outcome,
    }
}

fn run_field<T: Tile>(
    template: &AlignmentEngine<T>,
    field: &FieldOfView,
    all_reads: Option<&ReadCatalog>,
    span: &FieldSpan,
) -> Result<FieldOutcome> {
    let mut engine = template.fork();
    engine.set_image(field.pixels.as_ref().clone())?;
    engine.set_shared_clusters(Arc::clone(&field.clusters));

    let hitting = engine.rough_align(&field.candidates)?.len();
    span.record_rough(hitting, engine.control_correlation());
    if hitting == 0 {
        return Ok(FieldOutcome::Skipped {
            reason: "no tile cleared the noise floor".to_string(),
        });
    }

    let counts = engine.precision_align()?.counts();
    span.record_precision(counts.exclusive, counts.good_mutual);

    let record = engine.alignment_record();
    let positions = match all_reads {
        Some(catalog) => AlignmentEngine::<T>::from_aligned(&engine, catalog)?
            .read_positions()
            .collect(),
        None => engine.read_positions().collect(),
    };
    Ok(FieldOutcome::Aligned { record, positions })
}

/// Align every field in parallel. Reports come back in input order.
pub fn align_fields<T: Tile>(
    template: &AlignmentEngine<T>,
    fields: &[FieldOfView],
    all_reads: Option<&ReadCatalog>,
) -> Vec<FieldReport> {
    let reports: Vec<FieldReport> = fields
        .par_iter()
        .map(|field| align_field(template, field, all_reads))
        .collect();

    let aligned = reports.iter().filter(|r| r.outcome.is_aligned()).count();
    let failed = reports
        .iter()
        .filter(|r| matches!(r.outcome, FieldOutcome::Failed(_)))
        .count();
    tracing::info!(
        fields = reports.len(),
        aligned,
        skipped = reports.len() - aligned - failed,
        failed,
        "Batch alignment finished"
    );
    reports
}

/// Walk `columns` in order and return the first field that rough aligns
/// against `candidates`.
///
/// Fields within a column race; whichever hit is found first is kept.
pub fn scan_for_boundary<T: Tile>(
    template: &AlignmentEngine<T>,
    columns: &[Vec<FieldOfView>],
    candidates: &[TileKey],
) -> Option<BoundaryHit> {
    columns.iter().find_map(|column| {
        column.par_iter().find_map_any(|field| {
            let mut engine = template.fork();
            let attempt = engine
                .set_image(field.pixels.as_ref().clone())
                .and_then(|_| {
                    engine.set_shared_clusters(Arc::clone(&field.clusters));
                    engine.rough_align(candidates).map(|tiles| tiles.to_vec())
                });
            match attempt {
                Ok(tiles) if !tiles.is_empty() => {
                    tracing::debug!(field = %field.id, column = field.column, "Boundary field aligned");
                    Some(BoundaryHit {
                        field_id: field.id.clone(),
                        column: field.column,
                        tiles,
                    })
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(field = %field.id, error = %e, "Boundary scan attempt failed");
                    None
                }
            }
        })
    })
}
