//! The alignment engine: one session per field of view.
//!
//! A template engine is built once per read catalog. Every image gets its
//! own [`AlignmentEngine::fork`], which shares the immutable catalog and
//! starts from a clean session, so tile transforms and hit sets from one
//! image never reach another.

pub mod hits;
pub mod precision;
pub mod rough;

pub use hits::{classify, good_hit_threshold, Hit, HitCategory, HitClassification};

use ndarray::Array2;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::clusters::ClusterSource;
use crate::config::AlignConfig;
use crate::error::{AlignError, Result};
use crate::geometry::Point;
use crate::imaging::ImageSurface;
use crate::record::{AlignmentRecord, ReadPosition, TileAlignment};
use crate::tiles::{RasterParams, ReadCatalog, ReadTile, SharedMapping, Tile, TileKey};

/// Where a session stands for the current image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentState {
    Unaligned,
    RoughAligned,
    PrecisionAligned,
    PrecisionFailed,
}

/// Clusters and aligned reads inside the image, as seen by the last
/// classification pass. Hit indices point into these vectors.
#[derive(Debug, Clone, Default)]
pub struct InFrame {
    pub clusters: Vec<Point>,
    pub reads: Vec<Point>,
    /// Tile and read index each entry of `reads` came from.
    pub origins: Vec<(TileKey, usize)>,
}

#[derive(Clone)]
pub struct AlignmentEngine<T: Tile = ReadTile> {
    catalog: Arc<ReadCatalog>,
    tiles: BTreeMap<TileKey, T>,
    config: AlignConfig,
    mapping: SharedMapping,
    image: Option<ImageSurface>,
    clusters: Option<Arc<dyn ClusterSource>>,
    control_correlation: f64,
    hitting: Vec<TileKey>,
    hits: HitClassification,
    in_frame: InFrame,
    state: AlignmentState,
}

impl<T: Tile> AlignmentEngine<T> {
    /// Build a template engine and derive its shared mapping.
    pub fn new(catalog: Arc<ReadCatalog>, config: AlignConfig) -> Result<Self> {
        let mapping = SharedMapping::from_catalog(
            &catalog,
            config.engine.tile_width_um,
            config.engine.microns_per_pixel,
        )?;
        tracing::debug!(
            tiles = catalog.len(),
            reads = catalog.read_count(),
            scale = mapping.scale,
            "Alignment engine created"
        );
        Ok(Self::with_mapping(catalog, config, mapping))
    }

    fn with_mapping(catalog: Arc<ReadCatalog>, config: AlignConfig, mapping: SharedMapping) -> Self {
        let raster = RasterParams {
            microns_per_pixel: config.engine.microns_per_pixel,
            cluster_sigma_um: config.engine.cluster_sigma_um,
        };
        let tiles = catalog
            .iter()
            .map(|(key, reads)| (key.clone(), T::new(key.clone(), Arc::clone(reads), raster)))
            .collect();
        Self {
            catalog,
            tiles,
            config,
            mapping,
            image: None,
            clusters: None,
            control_correlation: 0.0,
            hitting: Vec::new(),
            hits: HitClassification::default(),
            in_frame: InFrame::default(),
            state: AlignmentState::Unaligned,
        }
    }

    /// Fresh session sharing this engine's catalog and configuration.
    pub fn fork(&self) -> Self {
        Self::with_mapping(Arc::clone(&self.catalog), self.config.clone(), self.mapping)
    }

    /// Build an engine over `all_reads` restricted to `aligned`'s hitting
    /// tiles, reusing their solved transforms instead of correlating again.
    ///
    /// Hitting tiles that never acquired a transform are skipped.
    pub fn from_aligned(aligned: &Self, all_reads: &ReadCatalog) -> Result<Self> {
        if aligned.hitting.is_empty() {
            return Err(AlignError::NotRoughAligned);
        }
        let catalog = Arc::new(all_reads.subset(&aligned.hitting));
        let mapping = SharedMapping::from_catalog(
            &catalog,
            aligned.mapping.tile_width,
            aligned.config.engine.microns_per_pixel,
        )?;

        let mut engine = Self::with_mapping(catalog, aligned.config.clone(), mapping);
        engine.image = aligned.image.clone();
        engine.clusters = aligned.clusters.clone();
        engine.control_correlation = aligned.control_correlation;
        engine.bind_mapping();

        for key in &aligned.hitting {
            let Some(tile) = engine.tiles.get_mut(key) else {
                tracing::debug!(tile = %key, "Hitting tile missing from expanded catalog");
                continue;
            };
            engine.hitting.push(key.clone());
            match aligned.tiles.get(key).and_then(|t| t.transform()) {
                Some(&transform) => tile.apply_transform(transform),
                None => tracing::debug!(tile = %key, "Skipping tile that lacks a transform"),
            }
        }
        engine.state = aligned.state;
        Ok(engine)
    }

    /// Install the per-tile transforms of a stored record.
    ///
    /// Listed tiles become the hitting set; `precision_align` can then
    /// refine them against the loaded image.
    pub fn apply_record(&mut self, record: &AlignmentRecord) -> Result<()> {
        if let Some(entry) = record.tiles.iter().find(|e| !self.tiles.contains_key(&e.key)) {
            return Err(AlignError::UnknownTile(entry.key.clone()));
        }
        self.reset_session();
        if let Some(first) = record.tiles.first() {
            self.remap(first.tile_width)?;
        }
        self.bind_mapping();

        for entry in &record.tiles {
            if let Some(tile) = self.tiles.get_mut(&entry.key) {
                tile.apply_transform(entry.transform());
            }
            if !self.hitting.contains(&entry.key) {
                self.hitting.push(entry.key.clone());
            }
        }
        if !self.hitting.is_empty() {
            self.state = AlignmentState::RoughAligned;
        }
        Ok(())
    }

    /// Load raw pixels for the next image, discarding the previous session.
    pub fn set_image(&mut self, pixels: Array2<f64>) -> Result<()> {
        let surface = ImageSurface::new(pixels, self.config.engine.microns_per_pixel)?;
        self.set_surface(surface);
        Ok(())
    }

    pub fn set_surface(&mut self, surface: ImageSurface) {
        self.image = Some(surface);
        self.reset_session();
    }

    pub fn set_clusters<C: ClusterSource + 'static>(&mut self, clusters: C) {
        self.clusters = Some(Arc::new(clusters));
    }

    pub fn set_shared_clusters(&mut self, clusters: Arc<dyn ClusterSource>) {
        self.clusters = Some(clusters);
    }

    pub fn catalog(&self) -> &Arc<ReadCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AlignConfig {
        &mut self.config
    }

    pub fn mapping(&self) -> &SharedMapping {
        &self.mapping
    }

    pub fn image(&self) -> Option<&ImageSurface> {
        self.image.as_ref()
    }

    pub fn state(&self) -> AlignmentState {
        self.state
    }

    pub fn tile(&self, key: &TileKey) -> Option<&T> {
        self.tiles.get(key)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &T> {
        self.tiles.values()
    }

    /// Tiles that passed the rough signal-to-noise test, in candidate order.
    pub fn hitting_tiles(&self) -> &[TileKey] {
        &self.hitting
    }

    pub fn control_correlation(&self) -> f64 {
        self.control_correlation
    }

    pub fn hits(&self) -> &HitClassification {
        &self.hits
    }

    pub fn in_frame(&self) -> &InFrame {
        &self.in_frame
    }

    /// Classify correspondences for one hitting tile, or all of them.
    pub fn find_hits(&mut self, consider: Option<&TileKey>) -> Result<&HitClassification> {
        let image = self.image.as_ref().ok_or(AlignError::NoImage)?;
        let clusters = self.clusters.as_ref().ok_or(AlignError::NoClusters)?;

        let considered: Vec<&TileKey> = match consider {
            Some(key) => vec![key],
            None => self.hitting.iter().collect(),
        };

        let mut in_frame = InFrame {
            clusters: clusters
                .centroids()
                .iter()
                .copied()
                .filter(|&p| image.contains(p))
                .collect(),
            ..InFrame::default()
        };
        for key in considered {
            let tile = self
                .tiles
                .get(key)
                .ok_or_else(|| AlignError::UnknownTile(key.clone()))?;
            let Some(aligned) = tile.aligned_positions() else {
                continue;
            };
            for (idx, &p) in aligned.iter().enumerate() {
                if image.contains(p) {
                    in_frame.reads.push(p);
                    in_frame.origins.push((key.clone(), idx));
                }
            }
        }

        self.hits = classify(
            &in_frame.clusters,
            &in_frame.reads,
            self.config.precision.hit_threshold,
            self.config.engine.microns_per_pixel,
        )?;
        self.in_frame = in_frame;
        Ok(&self.hits)
    }

    /// Aligned reads of every transformed hitting tile that land inside
    /// the image.
    pub fn read_positions(&self) -> impl Iterator<Item = ReadPosition> + '_ {
        let image = self.image.as_ref();
        self.hitting
            .iter()
            .filter_map(|key| self.tiles.get(key))
            .filter(|tile| tile.transform().is_some())
            .filter_map(|tile| Some((tile, tile.aligned_positions()?)))
            .flat_map(move |(tile, aligned)| {
                tile.reads()
                    .iter()
                    .zip(aligned)
                    .filter(move |(_, &p)| image.map_or(false, |image| image.contains(p)))
                    .map(|(read, &(row, column))| ReadPosition {
                        name: read.name.clone(),
                        row,
                        column,
                    })
            })
    }

    /// Transforms of the hitting tiles plus the current hit counts.
    pub fn alignment_record(&self) -> AlignmentRecord {
        let tiles = self
            .hitting
            .iter()
            .filter_map(|key| {
                let tile = self.tiles.get(key)?;
                let transform = tile.transform()?;
                let width = tile.tile_width().unwrap_or(self.mapping.tile_width);
                Some(TileAlignment::new(key.clone(), transform, width))
            })
            .collect();
        AlignmentRecord {
            tiles,
            hits: self.hits.counts(),
        }
    }

    fn reset_session(&mut self) {
        self.control_correlation = 0.0;
        self.hitting.clear();
        self.hits = HitClassification::default();
        self.in_frame = InFrame::default();
        self.state = AlignmentState::Unaligned;
    }

    /// Rebuild the shared mapping if the nominal tile width changed.
    fn remap(&mut self, tile_width: f64) -> Result<()> {
        if self.mapping.tile_width != tile_width {
            self.mapping = SharedMapping::from_catalog(
                &self.catalog,
                tile_width,
                self.config.engine.microns_per_pixel,
            )?;
        }
        Ok(())
    }

    fn bind_mapping(&mut self) {
        for tile in self.tiles.values_mut() {
            tile.establish_shared_mapping(&self.mapping);
        }
    }
}
