//! Synthetic fields shared by the integration tests.
//!
//! Four tiles span native coordinates [20, 980]. With 1 µm pixels and a
//! nominal tile width of 480 µm the shared mapping scale is exactly 0.5.
//! Only the target tile's reads are planted in the image, as Gaussian
//! blobs at `planted().apply(native)` plus coordinate jitter.

#![allow(dead_code)]

use fov_align::*;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub const TARGET: &str = "lane1tile2114";
pub const SIDE_ONE_TARGET: &str = "lane1tile1114";
pub const CONTROLS: [&str; 3] = ["lane1tile2101", "lane1tile2102", "lane1tile2103"];
pub const IMAGE_SIDE: usize = 512;
pub const ROTATION_DEGREES: f64 = 1.5;
pub const JITTER_SIGMA: f64 = 0.2;

pub fn planted() -> SimilarityTransform {
    SimilarityTransform::from_degrees(0.5, ROTATION_DEGREES, (10.0, 4.0))
}

pub fn config() -> AlignConfig {
    let mut config = AlignConfig::default();
    config.engine.microns_per_pixel = 1.0;
    config.engine.tile_width_um = 480.0;
    config.rough.rotation_estimate_degrees = ROTATION_DEGREES;
    config
}

fn random_reads(rng: &mut StdRng, tile: &str, n: usize, lo: f64, hi: f64) -> Vec<Read> {
    (0..n)
        .map(|i| {
            let position = (rng.gen_range(lo..hi), rng.gen_range(lo..hi));
            Read::new(format!("M0:1:FC:1:{}:{}:{}", &tile[9..], i, n), position)
        })
        .collect()
}

pub fn catalog(seed: u64) -> ReadCatalog {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut first = random_reads(&mut rng, CONTROLS[0], 498, 20.0, 980.0);
    first.push(Read::new("corner-min", (20.0, 20.0)));
    first.push(Read::new("corner-max", (980.0, 980.0)));

    ReadCatalog::from_tiles(vec![
        (TileKey::new(CONTROLS[0]), first),
        (TileKey::new(CONTROLS[1]), random_reads(&mut rng, CONTROLS[1], 500, 20.0, 980.0)),
        (TileKey::new(CONTROLS[2]), random_reads(&mut rng, CONTROLS[2], 60, 20.0, 980.0)),
        (TileKey::new(TARGET), random_reads(&mut rng, TARGET, 400, 100.0, 900.0)),
    ])
}

/// `catalog(seed)` plus the side-one twin of the target tile, holding more
/// reads than any other tile.
pub fn two_sided_catalog(seed: u64) -> ReadCatalog {
    let mut rng = StdRng::seed_from_u64(seed + 1000);
    let mut tiles: Vec<(TileKey, Vec<Read>)> = catalog(seed)
        .iter()
        .map(|(key, reads)| (key.clone(), reads.to_vec()))
        .collect();
    tiles.push((
        TileKey::new(SIDE_ONE_TARGET),
        random_reads(&mut rng, SIDE_ONE_TARGET, 600, 100.0, 900.0),
    ));
    ReadCatalog::from_tiles(tiles)
}

/// Background of 100 ± 2 with a bright Gaussian blob at every point.
pub fn render(points: &[Point], seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pixels = Array2::from_shape_fn((IMAGE_SIDE, IMAGE_SIDE), |_| 100.0 + rng.gen_range(-2.0..2.0));
    for &(r, c) in points {
        let (r0, c0) = (r.round() as i64, c.round() as i64);
        for dr in -3..=3 {
            for dc in -3..=3 {
                let (pr, pc) = (r0 + dr, c0 + dc);
                if pr < 0 || pc < 0 || pr >= IMAGE_SIDE as i64 || pc >= IMAGE_SIDE as i64 {
                    continue;
                }
                let d2 = (pr as f64 - r).powi(2) + (pc as f64 - c).powi(2);
                pixels[[pr as usize, pc as usize]] += 1000.0 * (-d2 / 2.0).exp();
            }
        }
    }
    pixels
}

fn in_image(p: Point) -> bool {
    let side = IMAGE_SIDE as f64;
    p.0 >= 0.0 && p.1 >= 0.0 && p.0 < side && p.1 < side
}

pub struct Field {
    pub pixels: Array2<f64>,
    pub clusters: ClusterSet,
}

/// Plant `tile`'s reads under `planted()`, plus a few spurious detections.
pub fn field_for(catalog: &ReadCatalog, tile: &str, seed: u64) -> Field {
    let mut rng = StdRng::seed_from_u64(seed);
    let jitter = Normal::new(0.0, JITTER_SIGMA).unwrap();
    let transform = planted();

    let reads = catalog.get(&TileKey::new(tile)).unwrap();
    let mut points: Vec<Point> = reads
        .iter()
        .map(|read| {
            let (r, c) = transform.apply(read.position);
            (r + jitter.sample(&mut rng), c + jitter.sample(&mut rng))
        })
        .filter(|&p| in_image(p))
        .collect();
    for _ in 0..30 {
        let side = IMAGE_SIDE as f64;
        points.push((rng.gen_range(0.0..side), rng.gen_range(0.0..side)));
    }

    Field {
        pixels: render(&points, seed + 1),
        clusters: ClusterSet::new(points),
    }
}

pub fn target_field(catalog: &ReadCatalog, seed: u64) -> Field {
    field_for(catalog, TARGET, seed)
}

pub fn engine(catalog: ReadCatalog) -> AlignmentEngine {
    AlignmentEngine::new(std::sync::Arc::new(catalog), config()).unwrap()
}

pub fn candidates() -> Vec<TileKey> {
    vec![TileKey::new(TARGET)]
}
