use instant::Instant;
use std::collections::BTreeSet;

use super::{AlignmentEngine, AlignmentState};
use crate::config::ChipSide;
use crate::error::{AlignError, Result};
use crate::tiles::{Tile, TileKey};

/// Number of non-candidate tiles whose correlation sets the noise floor.
const CONTROL_TILES: usize = 2;

impl<T: Tile> AlignmentEngine<T> {
    /// FFT-correlate candidate tiles against the loaded image and keep those
    /// that beat the noise floor by the configured signal-to-noise ratio.
    ///
    /// An empty result is an ordinary outcome: the image does not overlap
    /// any candidate tile, or every loaded tile was a candidate and no
    /// control tile is left to set the noise floor.
    pub fn rough_align(&mut self, candidates: &[TileKey]) -> Result<&[TileKey]> {
        let start_time = Instant::now();
        if self.image.is_none() {
            return Err(AlignError::NoImage);
        }
        self.reset_session();
        self.remap(self.config.engine.tile_width_um)?;
        self.bind_mapping();

        let degrees = self.config.rough.rotation_degrees();
        let canvas = self
            .tiles
            .values_mut()
            .map(|tile| tile.rotate(degrees))
            .fold((0, 0), |acc, shape| (acc.0.max(shape.0), acc.1.max(shape.1)));
        for tile in self.tiles.values_mut() {
            tile.set_canvas_shape(canvas);
        }

        let candidates = self.candidate_keys(candidates);
        let controls = self.control_keys(&candidates);
        if controls.is_empty() {
            tracing::warn!(
                candidates = candidates.len(),
                tiles = self.tiles.len(),
                "No control tiles outside the candidates, cannot measure a noise floor"
            );
            self.state = AlignmentState::RoughAligned;
            return Ok(&self.hitting);
        }

        let image = self.image.as_mut().ok_or(AlignError::NoImage)?;
        image.prepare_correlation(canvas)?;
        let image = &*image;

        let mut control_correlation: f64 = 0.0;
        for key in &controls {
            if let Some(tile) = self.tiles.get(key) {
                let peak = tile.correlate_with(image)?.peak;
                tracing::trace!(tile = %key, peak, "Control correlation");
                control_correlation = control_correlation.max(peak);
            }
        }

        let snr_threshold = self.config.rough.snr_threshold;
        for key in candidates {
            let Some(tile) = self.tiles.get_mut(&key) else {
                continue;
            };
            let correlation = tile.correlate_with(image)?;
            if correlation.peak > snr_threshold * control_correlation {
                let snr = (control_correlation > 0.0).then(|| correlation.peak / control_correlation);
                tile.apply_translation(correlation.translation);
                tile.set_score(correlation.peak, snr);
                tracing::debug!(
                    tile = %key,
                    peak = correlation.peak,
                    snr,
                    translation = ?correlation.translation,
                    "Tile hit"
                );
                self.hitting.push(key);
            }
        }

        self.control_correlation = control_correlation;
        self.state = AlignmentState::RoughAligned;
        tracing::debug!(
            canvas = ?canvas,
            control_correlation,
            hitting = self.hitting.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Rough alignment completed"
        );
        Ok(&self.hitting)
    }

    /// Requested keys moved to the configured chip side, deduplicated and
    /// restricted to loaded tiles.
    fn candidate_keys(&self, requested: &[TileKey]) -> Vec<TileKey> {
        let side = self.config.rough.side;
        let mut seen = BTreeSet::new();
        requested
            .iter()
            .map(|key| match side {
                ChipSide::One => key.on_side_one(),
                ChipSide::Two => key.clone(),
            })
            .filter(|key| self.tiles.contains_key(key))
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    /// The non-candidate tiles with the most reads, ties broken by key.
    fn control_keys(&self, candidates: &[TileKey]) -> Vec<TileKey> {
        let mut others: Vec<&T> = self
            .tiles
            .values()
            .filter(|tile| !candidates.contains(tile.key()))
            .collect();
        others.sort_by(|a, b| {
            b.read_count()
                .cmp(&a.read_count())
                .then_with(|| a.key().cmp(b.key()))
        });
        others
            .into_iter()
            .take(CONTROL_TILES)
            .map(|tile| tile.key().clone())
            .collect()
    }
}
