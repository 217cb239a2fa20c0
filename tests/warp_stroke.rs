//! End-to-end behavior of the warp operation and its stroke processor.

use proptest::prelude::*;
use std::sync::Arc;
use tilework::operations::warp::{Behavior, CacheState, StrokeProcessor, WarpParams};
use tilework::prelude::*;

fn blank_field(width: i32, height: i32) -> SharedBuffer {
    Arc::new(Buffer::new(
        Rectangle::new(0, 0, width, height),
        PixelFormat::vector2(),
    ))
}

fn stroke(points: &[(f64, f64)]) -> Stroke {
    Stroke::from(points.to_vec())
}

fn warp_with(params: &[(&str, Value)]) -> WarpOperation {
    let mut warp = WarpOperation::new();
    for (name, value) in params {
        warp.set_parameter(name, value.clone()).unwrap();
    }
    warp
}

/// Prepare and process the whole field, returning the output pixels.
fn run(warp: &mut WarpOperation, field: &SharedBuffer) -> Vec<f32> {
    let extent = field.extent();
    warp.prepare(Some(PixelFormat::vector2()));
    let mut ctx = ProcessContext::default().with_input(INPUT_PORT, Arc::clone(field));
    ctx.run(warp, &extent).unwrap();
    ctx.take_output(OUTPUT_PORT).unwrap().to_vec()
}

#[test]
fn collinear_stroke_stamps_every_five_pixels() {
    let field = blank_field(30, 10);
    let mut warp = warp_with(&[
        ("size", Value::Float(4.0)),
        // Relative to the size: 4 * 1.25 = 5 pixels
        ("spacing", Value::Float(1.25)),
        ("behavior", Value::Choice("move".into())),
        (
            "stroke",
            Value::Path(stroke(&[(0.0, 0.0), (10.0, 0.0), (20.0, 0.0)])),
        ),
    ]);

    let out = run(&mut warp, &field);
    let report = warp.last_report().unwrap();

    // One stamp for the first point, then three per segment
    assert_eq!(report.points, 3);
    assert_eq!(report.stamps, 1 + 3 + 3);

    for stamp in &report.applied {
        assert!(stamp.area.x as f32 >= stamp.x - 2.0);
        assert!(stamp.area.right() as f32 <= stamp.x + 2.0);
        assert!(stamp.area.y as f32 >= stamp.y - 2.0);
        assert!(stamp.area.bottom() as f32 <= stamp.y + 2.0);
    }

    // Nothing below the stamp footprint is touched
    let region = report.region.unwrap();
    assert!(region.bottom() <= 2);
    for (i, v) in out.chunks_exact(2).enumerate() {
        let (x, y) = ((i % 30) as i32, (i / 30) as i32);
        if !region.contains_point(x, y) {
            assert_eq!(v, [0.0, 0.0]);
        }
    }
}

#[test]
fn edited_stroke_replays_from_scratch() {
    let field = blank_field(24, 24);
    let params = [("size", Value::Float(16.0)), ("spacing", Value::Float(0.25))];

    let mut warp = warp_with(&params);
    warp.set_parameter("stroke", Value::Path(stroke(&[(4.0, 4.0), (12.0, 4.0), (12.0, 12.0)])))
        .unwrap();
    run(&mut warp, &field);
    assert_eq!(warp.cache_state(), CacheState::Valid);

    // Same first point, different second point
    let edited = stroke(&[(4.0, 4.0), (8.0, 10.0), (12.0, 12.0), (16.0, 4.0)]);
    warp.set_parameter("stroke", Value::Path(edited.clone())).unwrap();
    assert_eq!(warp.cache_state(), CacheState::Stale);
    let replayed = run(&mut warp, &field);
    assert_eq!(warp.last_report().unwrap().points, 4);

    let mut fresh = warp_with(&params);
    fresh.set_parameter("stroke", Value::Path(edited)).unwrap();
    assert_eq!(replayed, run(&mut fresh, &field));
}

#[test]
fn zero_strength_leaves_cache_untouched() {
    let ctx = ProcessContext::default();
    let field = blank_field(32, 32);
    let mut processor = StrokeProcessor::new();
    let params = WarpParams {
        size: 12.0,
        spacing: 0.2,
        ..WarpParams::default()
    };

    let first = stroke(&[(8.0, 8.0), (20.0, 16.0)]);
    let (cached, _) = processor.process(&ctx, &field, &first, &params).unwrap();
    let before = cached.to_vec();
    assert!(before.iter().any(|&v| v != 0.0));

    let extended = first.extended([PathPoint::new(24.0, 24.0)]);
    processor.stroke_changed(&extended);
    let idle = WarpParams {
        strength: 0.0,
        ..params
    };
    let (output, report) = processor.process(&ctx, &field, &extended, &idle).unwrap();

    assert_eq!(report.stamps, 0);
    assert_eq!(output.to_vec(), before);
    assert_eq!(processor.cached().unwrap().to_vec(), before);
}

#[test]
fn stamps_at_the_border_stay_in_bounds() {
    let field = blank_field(16, 12);

    for behavior in Behavior::ALL {
        let mut warp = warp_with(&[
            ("size", Value::Float(30.0)),
            ("strength", Value::Float(100.0)),
            ("hardness", Value::Float(1.0)),
            ("behavior", Value::Choice(behavior.name().into())),
            (
                "stroke",
                Value::Path(stroke(&[(-3.0, -3.0), (0.0, 11.5), (15.5, 12.0), (40.0, -20.0)])),
            ),
        ]);

        let out = run(&mut warp, &field);
        assert_eq!(out.len(), 16 * 12 * 2);
        assert!(out.iter().all(|v| v.is_finite()), "{:?}", behavior);
    }
}

#[test]
fn blank_field_border_samples_read_zero() {
    // A single move stamp on a zero field: every written vector is exactly
    // the stamp's own displacement, including the pixels whose samples fall
    // past the field edge.
    let field = blank_field(8, 8);
    let mut warp = warp_with(&[
        ("size", Value::Float(6.0)),
        ("spacing", Value::Float(10.0)),
        ("hardness", Value::Float(1.0)),
        ("strength", Value::Float(100.0)),
        ("stroke", Value::Path(stroke(&[(7.0, 4.0), (1.0, 4.0)]))),
    ]);

    let out = run(&mut warp, &field);
    let report = warp.last_report().unwrap();
    assert_eq!(report.applied.len(), 1);

    // hardness 1: full force inside the stamp, motion (+6, 0)
    let area = report.applied[0].area;
    for y in area.y..area.bottom() {
        for x in area.x..area.right() {
            let i = ((y * 8 + x) * 2) as usize;
            let v = [out[i], out[i + 1]];
            assert!(v == [6.0, 0.0] || v == [0.0, 0.0], "({}, {}): {:?}", x, y, v);
        }
    }
}

#[test]
fn stroke_outside_the_field_changes_nothing() {
    let field = blank_field(10, 10);
    let mut warp = warp_with(&[(
        "stroke",
        Value::Path(stroke(&[(500.0, 500.0), (600.0, 520.0)])),
    )]);

    let out = run(&mut warp, &field);
    assert!(out.iter().all(|&v| v == 0.0));
    assert!(warp.last_report().unwrap().applied.is_empty());
}

fn behavior_strategy() -> impl Strategy<Value = Behavior> {
    prop::sample::select(Behavior::ALL.to_vec())
}

/// Grow a stroke point by point from `split` points on, then process the
/// finished stroke at once, returning both final fields.
fn incremental_and_batch(
    points: &[(f64, f64)],
    split: usize,
    field: &SharedBuffer,
    params: &[(&str, Value)],
) -> (Vec<f32>, Vec<f32>) {
    let mut incremental = warp_with(params);
    let mut last = Vec::new();
    for end in split..=points.len() {
        incremental
            .set_parameter("stroke", Value::Path(stroke(&points[..end])))
            .unwrap();
        last = run(&mut incremental, field);
    }

    let mut batch = warp_with(params);
    batch.set_parameter("stroke", Value::Path(stroke(points))).unwrap();
    (last, run(&mut batch, field))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Stamps larger than the field, so every call works on all of it.
    #[test]
    fn incremental_matches_batch(
        points in prop::collection::vec((0i32..24, 0i32..24), 2..7),
        split in 1usize..6,
        behavior in behavior_strategy(),
    ) {
        let points: Vec<(f64, f64)> =
            points.into_iter().map(|(x, y)| (x as f64, y as f64)).collect();
        let split = split.min(points.len() - 1);
        let params = [
            ("size", Value::Float(52.0)),
            ("spacing", Value::Float(0.1)),
            ("behavior", Value::Choice(behavior.name().into())),
        ];

        let (incremental, batch) =
            incremental_and_batch(&points, split, &blank_field(24, 24), &params);
        prop_assert_eq!(incremental, batch);
    }

    /// Small stamps on a larger field, so each call only touches the
    /// working area around its new points.
    #[test]
    fn incremental_matches_batch_with_small_stamps(
        points in prop::collection::vec((0i32..64, 0i32..64), 2..7),
        split in 1usize..6,
        behavior in behavior_strategy(),
    ) {
        let points: Vec<(f64, f64)> =
            points.into_iter().map(|(x, y)| (x as f64, y as f64)).collect();
        let split = split.min(points.len() - 1);
        let params = [
            ("size", Value::Float(12.0)),
            ("spacing", Value::Float(0.25)),
            ("behavior", Value::Choice(behavior.name().into())),
        ];

        let (incremental, batch) =
            incremental_and_batch(&points, split, &blank_field(64, 64), &params);
        prop_assert_eq!(incremental, batch);
    }
}
