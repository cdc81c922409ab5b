mod common;

use common::*;
use fov_align::engine::AlignmentState;
use fov_align::*;
use std::sync::Arc;

fn aligned_engine(seed: u64) -> AlignmentEngine {
    let catalog = catalog(seed);
    let field = target_field(&catalog, seed);
    let mut engine = engine(catalog);
    engine.set_image(field.pixels).unwrap();
    engine.set_clusters(field.clusters);
    engine.rough_align(&candidates()).unwrap();
    engine.precision_align().unwrap();
    engine
}

#[test]
fn test_end_to_end_recovers_planted_transform() {
    let engine = aligned_engine(42);
    assert_eq!(engine.state(), AlignmentState::PrecisionAligned);
    assert!(engine.hitting_tiles().contains(&TileKey::new(TARGET)));

    let tile = engine.tile(&TileKey::new(TARGET)).unwrap();
    let transform = tile.transform().expect("target tile should be transformed");
    let planted = planted();
    assert!(
        (transform.rotation_degrees() - ROTATION_DEGREES).abs() < 0.05,
        "rotation {}",
        transform.rotation_degrees()
    );
    assert!((transform.scale - planted.scale).abs() < 1e-3, "scale {}", transform.scale);
    assert!((transform.offset.0 - planted.offset.0).abs() < 0.5);
    assert!((transform.offset.1 - planted.offset.1).abs() < 0.5);

    let record = engine.alignment_record();
    assert!(record.score() >= engine.config().precision.min_hits);
    assert_eq!(record.hits.total(), engine.hits().len());
    assert!(tile.snr().unwrap() > 1.0);
}

#[test]
fn test_hitting_tiles_clear_snr_threshold() {
    let catalog = catalog(7);
    let field = target_field(&catalog, 7);
    let mut engine = engine(catalog);
    engine.set_image(field.pixels).unwrap();
    engine.set_clusters(field.clusters);

    // Every tile is a candidate except the two largest, which set the floor.
    let all: Vec<TileKey> = vec![TileKey::new(TARGET), TileKey::new(CONTROLS[2])];
    let hitting = engine.rough_align(&all).unwrap().to_vec();
    let control = engine.control_correlation();
    let threshold = engine.config().rough.snr_threshold * control;
    assert!(control > 0.0);

    let image = engine.image().unwrap();
    for key in &all {
        let peak = engine.tile(key).unwrap().correlate_with(image).unwrap().peak;
        assert_eq!(hitting.contains(key), peak > threshold, "tile {key} peak {peak}");
    }
    assert!(hitting.contains(&TileKey::new(TARGET)));
}

#[test]
fn test_no_hits_is_not_an_error() {
    let catalog = catalog(3);
    let field = target_field(&catalog, 3);
    let mut engine = engine(catalog);
    engine.config_mut().rough.snr_threshold = 1e9;
    engine.set_image(field.pixels).unwrap();
    engine.set_clusters(field.clusters);

    assert!(engine.rough_align(&candidates()).unwrap().is_empty());
    assert_eq!(engine.state(), AlignmentState::RoughAligned);

    let err = engine.precision_align().unwrap_err();
    assert!(matches!(err, AlignError::NotRoughAligned));
    assert!(err.is_recoverable());
    assert_eq!(engine.read_positions().count(), 0);
    assert!(engine.alignment_record().tiles.is_empty());
}

#[test]
fn test_too_few_hits_fails_precision() {
    let catalog = catalog(5);
    let field = target_field(&catalog, 5);
    let mut engine = engine(catalog);
    engine.config_mut().precision.min_hits = 100_000;
    engine.set_image(field.pixels).unwrap();
    engine.set_clusters(field.clusters);

    assert!(!engine.rough_align(&candidates()).unwrap().is_empty());
    let err = engine.precision_align().unwrap_err();
    assert!(matches!(err, AlignError::PrecisionFailed));
    assert_eq!(engine.state(), AlignmentState::PrecisionFailed);
    // Rough placement alone never counts as aligned.
    assert_eq!(engine.read_positions().count(), 0);
}

#[test]
fn test_rough_align_without_control_tiles_finds_nothing() {
    let catalog = catalog(19);
    let field = target_field(&catalog, 19);
    let all: Vec<TileKey> = catalog.keys().cloned().collect();
    let mut engine = engine(catalog);
    engine.set_image(field.pixels).unwrap();
    engine.set_clusters(field.clusters);

    assert!(engine.rough_align(&all).unwrap().is_empty());
    assert_eq!(engine.control_correlation(), 0.0);
    assert_eq!(engine.state(), AlignmentState::RoughAligned);
    assert!(engine.tiles().all(|tile| tile.correlation().is_none()));
    assert!(matches!(engine.precision_align(), Err(AlignError::NotRoughAligned)));
}

#[test]
fn test_side_one_candidates_are_remapped() {
    let catalog = two_sided_catalog(17);
    let field = field_for(&catalog, SIDE_ONE_TARGET, 17);
    let mut engine = engine(catalog);
    engine.config_mut().rough.side = ChipSide::One;
    engine.config_mut().rough.rotation_estimate_degrees = 1.0;
    engine.config_mut().rough.rotation_adjustment_degrees = 0.5;
    engine.set_image(field.pixels).unwrap();
    engine.set_clusters(field.clusters);

    // The side-one tile has the most reads. Were it a control, the noise
    // floor would swallow its own peak and nothing would hit.
    let hitting = engine.rough_align(&candidates()).unwrap().to_vec();
    assert_eq!(hitting, vec![TileKey::new(SIDE_ONE_TARGET)]);
    assert!(engine.control_correlation() > 0.0);
    assert!(engine.tile(&TileKey::new(TARGET)).unwrap().correlation().is_none());

    let side_one = engine.tile(&TileKey::new(SIDE_ONE_TARGET)).unwrap();
    assert!(side_one.snr().unwrap() > engine.config().rough.snr_threshold);

    engine.precision_align().unwrap();
    let transform = *engine
        .tile(&TileKey::new(SIDE_ONE_TARGET))
        .unwrap()
        .transform()
        .unwrap();
    assert!((transform.rotation_degrees() - ROTATION_DEGREES).abs() < 0.05);
    assert_eq!(engine.alignment_record().tiles[0].key, TileKey::new(SIDE_ONE_TARGET));
}

#[test]
fn test_rough_align_requires_image() {
    let mut engine = engine(catalog(1));
    assert!(matches!(
        engine.rough_align(&candidates()),
        Err(AlignError::NoImage)
    ));
}

#[test]
fn test_forks_do_not_share_session_state() {
    let catalog = catalog(11);
    let field = target_field(&catalog, 11);
    let template = engine(catalog);

    let mut first = template.fork();
    first.set_image(field.pixels).unwrap();
    first.set_clusters(field.clusters);
    first.rough_align(&candidates()).unwrap();
    first.precision_align().unwrap();

    let second = template.fork();
    assert_eq!(second.state(), AlignmentState::Unaligned);
    assert!(second.hitting_tiles().is_empty());
    assert!(second.tiles().all(|tile| tile.transform().is_none()));
    assert!(template.tiles().all(|tile| tile.transform().is_none()));
    assert!(Arc::ptr_eq(first.catalog(), second.catalog()));
}

#[test]
fn test_read_positions_match_transform() {
    let engine = aligned_engine(42);
    let tile = engine.tile(&TileKey::new(TARGET)).unwrap();
    let transform = *tile.transform().unwrap();
    let image = engine.image().unwrap();

    let positions: Vec<ReadPosition> = engine.read_positions().collect();
    assert!(positions.len() > 300);
    for position in &positions {
        let read = tile.reads().iter().find(|r| r.name == position.name).unwrap();
        let (r, c) = transform.apply(read.position);
        assert_eq!((position.row, position.column), (r, c));
        assert!(image.contains((r, c)));
    }
}

#[test]
fn test_record_round_trip_reproduces_positions() {
    let engine = aligned_engine(42);
    let record = engine.alignment_record();
    let parsed: AlignmentRecord = record.to_string().parse().unwrap();
    assert_eq!(parsed.hits, record.hits);
    assert_eq!(parsed.tiles.len(), record.tiles.len());

    let mut replay = engine.fork();
    replay.set_surface(engine.image().unwrap().clone());
    replay.apply_record(&parsed).unwrap();
    assert_eq!(replay.hitting_tiles(), engine.hitting_tiles());

    let original: Vec<ReadPosition> = engine.read_positions().collect();
    let replayed: Vec<ReadPosition> = replay.read_positions().collect();
    assert_eq!(original.len(), replayed.len());
    for (a, b) in original.iter().zip(&replayed) {
        assert_eq!(a.name, b.name);
        assert!((a.row - b.row).abs() < 1e-9);
        assert!((a.column - b.column).abs() < 1e-9);
    }
}

#[test]
fn test_apply_record_rejects_unknown_tile() {
    let mut engine = engine(catalog(2));
    let record = AlignmentRecord {
        tiles: vec![TileAlignment {
            key: TileKey::new("lane9tile9999"),
            scale: 0.5,
            tile_width: 480.0,
            rotation_degrees: 0.0,
            offset: (0.0, 0.0),
        }],
        hits: HitCounts::default(),
    };
    assert!(matches!(
        engine.apply_record(&record),
        Err(AlignError::UnknownTile(_))
    ));
}

#[test]
fn test_applied_record_can_be_refined() {
    let catalog = catalog(42);
    let field = target_field(&catalog, 42);
    let mut engine = engine(catalog);
    engine.set_image(field.pixels).unwrap();
    engine.set_clusters(field.clusters);

    // Start from the planted transform perturbed by half a pixel.
    let mut start = planted();
    start.offset.0 += 0.5;
    let record = AlignmentRecord {
        tiles: vec![TileAlignment::new(TileKey::new(TARGET), &start, 480.0)],
        hits: HitCounts::default(),
    };
    engine.apply_record(&record).unwrap();
    assert_eq!(engine.state(), AlignmentState::RoughAligned);

    engine.precision_align().unwrap();
    let refined = engine.tile(&TileKey::new(TARGET)).unwrap().transform().unwrap();
    assert!((refined.offset.0 - planted().offset.0).abs() < 0.2);
}

#[test]
fn test_reconstruction_projects_expanded_catalog() {
    let engine = aligned_engine(42);
    let base = engine.catalog();

    // The expanded catalog carries extra reads for the target tile.
    let mut target_reads = base.get(&TileKey::new(TARGET)).unwrap().to_vec();
    for i in 0..50 {
        let offset = 120.0 + 10.0 * i as f64;
        target_reads.push(Read::new(format!("extra-{i}"), (offset, 500.0)));
    }
    let mut tiles: Vec<(TileKey, Vec<Read>)> = base
        .iter()
        .filter(|(key, _)| key.as_str() != TARGET)
        .map(|(key, reads)| (key.clone(), reads.to_vec()))
        .collect();
    tiles.push((TileKey::new(TARGET), target_reads));
    let all_reads = ReadCatalog::from_tiles(tiles);

    let full = AlignmentEngine::from_aligned(&engine, &all_reads).unwrap();
    assert_eq!(full.catalog().len(), engine.hitting_tiles().len());
    assert_eq!(full.hitting_tiles(), engine.hitting_tiles());

    let transform = *engine.tile(&TileKey::new(TARGET)).unwrap().transform().unwrap();
    let positions: Vec<ReadPosition> = full.read_positions().collect();
    let extras: Vec<&ReadPosition> = positions.iter().filter(|p| p.name.starts_with("extra-")).collect();
    assert_eq!(extras.len(), 50);
    for (i, position) in extras.iter().enumerate() {
        let expected = transform.apply((120.0 + 10.0 * i as f64, 500.0));
        assert_eq!((position.row, position.column), expected);
    }
    assert_eq!(positions.len(), engine.read_positions().count() + 50);
}
