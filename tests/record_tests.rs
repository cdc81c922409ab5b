use fov_align::*;

fn sample_record() -> AlignmentRecord {
    AlignmentRecord {
        tiles: vec![
            TileAlignment::new(
                TileKey::new("lane1tile2114"),
                &SimilarityTransform::new(0.018_734_512_3, 3.145_1, (-12.25, 440.756_1)),
                935.0,
            ),
            TileAlignment::new(
                TileKey::new("lane1tile2115"),
                &SimilarityTransform::from_degrees(0.0187, -179.999, (1e-7, 2.5e3)),
                935.0,
            ),
        ],
        hits: HitCounts {
            exclusive: 812,
            good_mutual: 97,
            bad_mutual: 40,
            non_mutual: 1203,
        },
    }
}

#[test]
fn test_record_text_round_trip() {
    let record = sample_record();
    let text = record.to_string();
    assert_eq!(text.lines().count(), 3);
    assert!(text.starts_with("tile\tlane1tile2114\tscale="));

    let parsed: AlignmentRecord = text.parse().unwrap();
    assert_eq!(parsed, record);
    assert_eq!(parsed.score(), 909);
}

#[test]
fn test_reparsed_transform_reproduces_positions() {
    let record = sample_record();
    let parsed: AlignmentRecord = record.to_string().parse().unwrap();
    let natives = [(0.0, 0.0), (1500.0, 2200.0), (29000.0, 31000.0), (17.5, 8123.25)];

    for (original, reparsed) in record.tiles.iter().zip(&parsed.tiles) {
        let a = original.transform();
        let b = reparsed.transform();
        for &p in &natives {
            let (pa, pb) = (a.apply(p), b.apply(p));
            assert!((pa.0 - pb.0).abs() < 1e-9 && (pa.1 - pb.1).abs() < 1e-9);
        }
    }
}

#[test]
fn test_record_json_round_trip() {
    let record = sample_record();
    let json = serde_json::to_string(&record).unwrap();
    let parsed: AlignmentRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, record);
}

#[test]
fn test_malformed_records_report_line() {
    let cases = [
        ("tile\tk\tscale=x\twidth=1\trotation=0\toffset=0,0\nhits\texclusive=0\tgood_mutual=0\tbad_mutual=0\tnon_mutual=0\n", 1),
        ("hits\texclusive=0\tgood_mutual=0\tbad_mutual=0\tnon_mutual=0\ntile\tk\tscale=1\twidth=1\trotation=0\toffset=0\n", 2),
        ("hits\texclusive=0\tgood_mutual=0\tbad_mutual=0\n", 1),
        ("hits\texclusive=0\tgood_mutual=0\tbad_mutual=0\tnon_mutual=0\nhits\texclusive=0\tgood_mutual=0\tbad_mutual=0\tnon_mutual=0\n", 2),
    ];
    for (text, expected_line) in cases {
        match text.parse::<AlignmentRecord>() {
            Err(AlignError::MalformedRecord { line, .. }) => assert_eq!(line, expected_line, "{text:?}"),
            other => panic!("expected malformed record for {text:?}, got {other:?}"),
        }
    }
}
