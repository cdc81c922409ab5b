//! Per-field spans carrying an explicit correlation id.

use instant::Instant;
use tracing::{field, span, Level, Span};
use uuid::Uuid;

/// Span covering the alignment of one field of view.
///
/// The correlation id is passed in by the caller rather than read from
/// thread-local state, so it stays correct under rayon work stealing.
pub struct FieldSpan {
    span: Span,
    start_time: Instant,
    correlation_id: Uuid,
    field_id: String,
}

impl FieldSpan {
    pub fn new(field_id: &str, correlation_id: Uuid) -> Self {
        let span = span!(
            Level::INFO,
            "field_alignment",
            field = field_id,
            correlation_id = %correlation_id,
            hitting_tiles = field::Empty,
            control_correlation = field::Empty,
            exclusive_hits = field::Empty,
            good_mutual_hits = field::Empty,
            success = field::Empty,
            execution_time_ms = field::Empty,
        );

        Self {
            span,
            start_time: Instant::now(),
            correlation_id,
            field_id: field_id.to_string(),
        }
    }

    /// Start a span with a fresh random correlation id.
    pub fn start(field_id: &str) -> Self {
        Self::new(field_id, Uuid::new_v4())
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    pub fn record_rough(&self, hitting_tiles: usize, control_correlation: f64) {
        self.span.record("hitting_tiles", hitting_tiles);
        self.span.record("control_correlation", control_correlation);
        tracing::debug!(
            parent: &self.span,
            hitting_tiles,
            control_correlation,
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            "Rough alignment completed"
        );
    }

    pub fn record_precision(&self, exclusive: usize, good_mutual: usize) {
        self.span.record("exclusive_hits", exclusive);
        self.span.record("good_mutual_hits", good_mutual);
        tracing::debug!(
            parent: &self.span,
            exclusive,
            good_mutual,
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            "Precision alignment completed"
        );
    }

    /// Close out the field with its final status.
    pub fn record_result(&self, success: bool, description: &str) {
        let duration = self.start_time.elapsed();
        self.span.record("success", success);
        self.span.record("execution_time_ms", duration.as_millis() as u64);

        if success {
            tracing::info!(
                parent: &self.span,
                execution_time_ms = duration.as_millis() as u64,
                description,
                "Field aligned"
            );
        } else {
            tracing::info!(
                parent: &self.span,
                execution_time_ms = duration.as_millis() as u64,
                description,
                "Field not aligned"
            );
        }
    }
}
