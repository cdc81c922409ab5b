use instant::Instant;

use super::hits::{Hit, HitCategory};
use super::{AlignmentEngine, AlignmentState};
use crate::error::{AlignError, Result};
use crate::geometry::{distance, SimilarityTransform};
use crate::tiles::{Tile, TileKey};
use crate::utils::percentile;

impl<T: Tile> AlignmentEngine<T> {
    /// Refine every hitting tile with a least-squares similarity fit over
    /// its trusted hits, then reclassify hits across all hitting tiles.
    ///
    /// Tiles whose trimmed hit pool is smaller than `min_hits` keep their
    /// rough placement. Fails with [`AlignError::PrecisionFailed`] when no
    /// tile could be fitted.
    pub fn precision_align(&mut self) -> Result<&super::HitClassification> {
        let start_time = Instant::now();
        if self.hitting.is_empty() {
            return Err(AlignError::NotRoughAligned);
        }

        let mut fitted = 0;
        for key in self.hitting.clone() {
            if let Some(transform) = self.fit_tile(&key)? {
                self.install_transform(&key, transform)?;
                fitted += 1;
            }
        }

        if fitted == 0 {
            self.state = AlignmentState::PrecisionFailed;
            return Err(AlignError::PrecisionFailed);
        }
        tracing::debug!(
            fitted,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Precision alignment completed"
        );

        let start_time = Instant::now();
        self.find_hits(None)?;
        self.state = AlignmentState::PrecisionAligned;
        tracing::debug!(
            counts = ?self.hits.counts(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Hit finding completed"
        );
        Ok(&self.hits)
    }

    /// Fit one tile's native read coordinates onto its matched clusters.
    ///
    /// `None` when the trimmed pool is too small or degenerate.
    fn fit_tile(&mut self, key: &TileKey) -> Result<Option<SimilarityTransform>> {
        self.find_hits(Some(key))?;
        let counts = self.hits.counts();
        tracing::debug!(
            tile = %key,
            exclusive = counts.exclusive,
            good_mutual = counts.good_mutual,
            bad_mutual = counts.bad_mutual,
            non_mutual = counts.non_mutual,
            "Tile hits"
        );

        let pool = self.hits.pooled(&HitCategory::FIT_POOL);
        let hits = self.trim_longest(pool);
        let min_hits = self.config.precision.min_hits;
        if hits.len() < min_hits {
            tracing::debug!(tile = %key, hits = hits.len(), min_hits, "Too few hits, skipping tile");
            return Ok(None);
        }

        let tile = self
            .tiles
            .get(key)
            .ok_or_else(|| AlignError::UnknownTile(key.clone()))?;
        let (source, target): (Vec<_>, Vec<_>) = hits
            .iter()
            .map(|&(cluster, read)| {
                let (_, read_idx) = self.in_frame.origins[read];
                (tile.reads()[read_idx].position, self.in_frame.clusters[cluster])
            })
            .unzip();

        match SimilarityTransform::fit(&source, &target) {
            Ok(transform) => {
                tracing::debug!(
                    tile = %key,
                    scale = transform.scale,
                    rotation_degrees = transform.rotation_degrees(),
                    offset = ?transform.offset,
                    residual = transform.rms_residual(&source, &target),
                    "Least squares fit"
                );
                Ok(Some(transform))
            }
            Err(AlignError::SingularSystem) => {
                tracing::warn!(tile = %key, hits = hits.len(), "Degenerate hit pool, skipping tile");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the longest `outlier_trim` fraction of hits by distance.
    fn trim_longest(&self, hits: Vec<Hit>) -> Vec<Hit> {
        let dist = |&(cluster, read): &Hit| {
            distance(self.in_frame.clusters[cluster], self.in_frame.reads[read])
        };
        let distances: Vec<f64> = hits.iter().map(dist).collect();
        let keep = (1.0 - self.config.precision.outlier_trim) * 100.0;
        match percentile(&distances, keep) {
            Some(cutoff) => hits.into_iter().filter(|hit| dist(hit) <= cutoff).collect(),
            None => hits,
        }
    }

    /// Apply a fitted transform and rescore the tile against the image.
    fn install_transform(&mut self, key: &TileKey, transform: SimilarityTransform) -> Result<()> {
        let image = self.image.as_ref().ok_or(AlignError::NoImage)?;
        let tile = self
            .tiles
            .get_mut(key)
            .ok_or_else(|| AlignError::UnknownTile(key.clone()))?;
        tile.apply_transform(transform);
        let correlation = tile.measure_correlation(image.pixels());
        let snr = (self.control_correlation > 0.0).then(|| correlation / self.control_correlation);
        tile.set_score(correlation, snr);
        Ok(())
    }
}
