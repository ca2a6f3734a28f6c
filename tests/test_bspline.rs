// tests/test_bspline.rs - Integration tests for GPU curve evaluation.
//
// The reference below is plain matrix math on the host, written without
// looking at the kernel: blend weights are the row vector [t^3, t^2, t, 1]
// times the uniform B-spline basis matrix, and the sample is the weighted
// sum of the four control points.
//
// Tests that need an adapter are `#[ignore]`d so `cargo test` passes on
// machines without a GPU. Run them with:
//   cargo test -- --include-ignored

use bspline_gpu::gpu::bspline::{sample_count_for, PARAMETER_STEP, SAMPLES_PER_SEGMENT};
use bspline_gpu::{ControlPointStore, CubicBSpline, CurveKind, GpuDevice, Point};

const TOLERANCE: f32 = 1e-4;

/// Uniform cubic B-spline basis, rows indexed by power of t (t^3 .. t^0),
/// columns by control point.
const BASIS: [[f32; 4]; 4] = [
    [-1.0, 3.0, -3.0, 1.0],
    [3.0, -6.0, 3.0, 0.0],
    [-3.0, 0.0, 3.0, 0.0],
    [1.0, 4.0, 1.0, 0.0],
];

fn reference_weights(t: f32) -> [f32; 4] {
    let powers = [t * t * t, t * t, t, 1.0];
    let mut w = [0.0f32; 4];
    for (k, wk) in w.iter_mut().enumerate() {
        *wk = (0..4).map(|j| powers[j] * BASIS[j][k]).sum::<f32>() / 6.0;
    }
    w
}

fn reference_sample(window: &[Point], t: f32) -> Point {
    let w = reference_weights(t);
    let mut out = Point::new(0.0, 0.0, 0.0, 0.0);
    for (p, wk) in window.iter().zip(w) {
        out.x += wk * p.x;
        out.y += wk * p.y;
        out.z += wk * p.z;
        out.w += wk * p.w;
    }
    out
}

fn reference_curve(points: &[Point]) -> Vec<Point> {
    points
        .windows(4)
        .flat_map(|window| {
            (0..SAMPLES_PER_SEGMENT).map(move |i| reference_sample(window, i as f32 * PARAMETER_STEP))
        })
        .collect()
}

fn scenario_points() -> Vec<Point> {
    vec![
        Point::new(0.0, 0.0, 0.0, 1.0),
        Point::new(1.0, 2.0, 0.0, 1.0),
        Point::new(2.0, 2.0, 0.0, 1.0),
        Point::new(3.0, 0.0, 0.0, 1.0),
    ]
}

/// Deterministic wiggly polygon with `n` points.
fn polygon(n: usize) -> Vec<Point> {
    (0..n)
        .map(|i| {
            let f = i as f32;
            Point::new(f, (f * 0.7).sin() * 3.0, (f * 0.3).cos(), 1.0)
        })
        .collect()
}

fn assert_close(actual: &Point, expected: &Point, what: &str) {
    let d = actual.max_abs_diff(expected);
    assert!(d < TOLERANCE, "{what}: got {actual}, expected {expected} (diff {d})");
}

fn gpu() -> GpuDevice {
    GpuDevice::new().expect("need a GPU adapter")
}

// ===== Reference math (no GPU) =====

#[test]
fn basis_weights_partition_unity() {
    for i in 0..SAMPLES_PER_SEGMENT {
        let t = i as f32 * PARAMETER_STEP;
        let w = reference_weights(t);
        assert!((w.iter().sum::<f32>() - 1.0).abs() < 1e-5, "t = {t}: {w:?}");
        assert!(w.iter().all(|&wk| wk >= -1e-6), "negative weight at t = {t}: {w:?}");
    }
}

#[test]
fn basis_weights_at_knots() {
    let w0 = reference_weights(0.0);
    let w1 = reference_weights(1.0);
    let expected0 = [1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0, 0.0];
    let expected1 = [0.0, 1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0];
    for k in 0..4 {
        assert!((w0[k] - expected0[k]).abs() < 1e-6);
        assert!((w1[k] - expected1[k]).abs() < 1e-6);
    }
}

#[test]
fn reference_scenario_endpoints() {
    let pts = scenario_points();
    let start = reference_sample(&pts, 0.0);
    let end = reference_sample(&pts, 1.0);
    assert_close(&start, &Point::new(1.0, 5.0 / 3.0, 0.0, 1.0), "t = 0");
    assert_close(&end, &Point::new(2.0, 5.0 / 3.0, 0.0, 1.0), "t = 1");
}

#[test]
fn reference_segments_join_at_knot() {
    let pts = polygon(5);
    let end0 = reference_sample(&pts[0..4], 1.0);
    let start1 = reference_sample(&pts[1..5], 0.0);
    assert_close(&end0, &start1, "knot");
}

#[test]
fn sample_count_formula() {
    assert_eq!(sample_count_for(0), 0);
    assert_eq!(sample_count_for(3), 0);
    assert_eq!(sample_count_for(4), 101);
    assert_eq!(sample_count_for(5), 202);
    assert_eq!(sample_count_for(100), 97 * 101);
}

// ===== GPU evaluation =====

#[test]
#[ignore = "requires a GPU adapter"]
fn too_few_points_dispatch_nothing() {
    let gpu = gpu();
    let mut spline = CubicBSpline::<Point>::new(&gpu).unwrap();
    for n in 0..4 {
        let store = ControlPointStore::with_points(&gpu, &polygon(n));
        let eval = spline.evaluate_curve(&gpu, &store).unwrap();
        assert_eq!(eval.sample_count(), 0);
        assert!(eval.is_empty());
        assert!(eval.extract_points().unwrap().is_empty());
        // No output buffer was ever allocated, so nothing was dispatched.
        assert_eq!(spline.output_capacity(), 0);
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn sample_count_matches_segments() {
    let gpu = gpu();
    let mut spline = CubicBSpline::<Point>::new(&gpu).unwrap();
    for n in [4usize, 5, 6, 9, 17] {
        let store = ControlPointStore::with_points(&gpu, &polygon(n));
        let eval = spline.evaluate_curve(&gpu, &store).unwrap();
        assert_eq!(eval.sample_count() as usize, (n - 3) * 101);
        assert_eq!(eval.segment_count() as usize, n - 3);
        assert_eq!(eval.extract_points().unwrap().len(), (n - 3) * 101);
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn scenario_single_segment() {
    let gpu = gpu();
    let store = ControlPointStore::with_points(&gpu, &scenario_points());
    let mut spline = CubicBSpline::new(&gpu).unwrap();
    let samples = spline.evaluate_curve(&gpu, &store).unwrap().extract_points().unwrap();

    assert_eq!(samples.len(), 101);
    assert_close(&samples[0], &Point::new(1.0, 5.0 / 3.0, 0.0, 1.0), "sample 0");
    assert_close(&samples[100], &Point::new(2.0, 5.0 / 3.0, 0.0, 1.0), "sample 100");
}

#[test]
#[ignore = "requires a GPU adapter"]
fn single_segment_endpoints_match_reference() {
    let gpu = gpu();
    let pts = polygon(4);
    let store = ControlPointStore::with_points(&gpu, &pts);
    let mut spline = CubicBSpline::new(&gpu).unwrap();
    let samples = spline.evaluate_curve(&gpu, &store).unwrap().extract_points().unwrap();

    assert_close(&samples[0], &reference_sample(&pts, 0.0), "t = 0");
    assert_close(&samples[100], &reference_sample(&pts, 1.0), "t = 1");
}

#[test]
#[ignore = "requires a GPU adapter"]
fn every_sample_matches_reference() {
    let gpu = gpu();
    let pts = polygon(12);
    let store = ControlPointStore::with_points(&gpu, &pts);
    let mut spline = CubicBSpline::new(&gpu).unwrap();
    let samples = spline.evaluate_curve(&gpu, &store).unwrap().extract_points().unwrap();
    let expected = reference_curve(&pts);

    assert_eq!(samples.len(), expected.len());
    for (i, (got, want)) in samples.iter().zip(&expected).enumerate() {
        assert_close(got, want, &format!("sample {i}"));
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn two_segments_are_continuous() {
    let gpu = gpu();
    let pts = polygon(5);
    let store = ControlPointStore::with_points(&gpu, &pts);
    let mut spline = CubicBSpline::new(&gpu).unwrap();
    let samples = spline.evaluate_curve(&gpu, &store).unwrap().extract_points().unwrap();

    let end0 = samples[100];
    let start1 = samples[101];
    assert_close(&end0, &start1, "knot between segments");

    // Both equal (P1 + 4 P2 + P3) / 6.
    let knot = Point::new(
        (pts[1].x + 4.0 * pts[2].x + pts[3].x) / 6.0,
        (pts[1].y + 4.0 * pts[2].y + pts[3].y) / 6.0,
        (pts[1].z + 4.0 * pts[2].z + pts[3].z) / 6.0,
        (pts[1].w + 4.0 * pts[2].w + pts[3].w) / 6.0,
    );
    assert_close(&start1, &knot, "closed-form knot");
}

#[test]
#[ignore = "requires a GPU adapter"]
fn repeated_evaluation_is_bit_identical() {
    let gpu = gpu();
    let store = ControlPointStore::with_points(&gpu, &polygon(20));
    let mut spline = CubicBSpline::<Point>::new(&gpu).unwrap();

    let first = spline.evaluate_curve(&gpu, &store).unwrap().extract_points().unwrap();
    let second = spline.evaluate_curve(&gpu, &store).unwrap().extract_points().unwrap();

    let first_bits: Vec<[u32; 4]> = first.iter().map(|p| p.to_array().map(f32::to_bits)).collect();
    let second_bits: Vec<[u32; 4]> = second.iter().map(|p| p.to_array().map(f32::to_bits)).collect();
    assert_eq!(first_bits, second_bits);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn extract_twice_reads_same_samples() {
    let gpu = gpu();
    let store = ControlPointStore::with_points(&gpu, &polygon(6));
    let mut spline = CubicBSpline::<Point>::new(&gpu).unwrap();
    let eval = spline.evaluate_curve(&gpu, &store).unwrap();

    let a = eval.extract_canonical().unwrap();
    let b = eval.extract_canonical().unwrap();
    assert_eq!(a, b);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn output_follows_control_point_changes() {
    let gpu = gpu();
    let mut store = ControlPointStore::with_points(&gpu, &polygon(8));
    let mut spline = CubicBSpline::<Point>::new(&gpu).unwrap();

    let long = spline.evaluate_curve(&gpu, &store).unwrap().extract_points().unwrap();
    assert_eq!(long.len(), 5 * 101);
    assert_eq!(spline.output_capacity(), 5 * 101);

    // Shrink, then drop below four points: the stale, larger output must not
    // leak through the empty evaluation.
    store.set_points(&gpu, &scenario_points());
    let short = spline.evaluate_curve(&gpu, &store).unwrap().extract_points().unwrap();
    assert_eq!(short.len(), 101);
    assert_close(&short[0], &Point::new(1.0, 5.0 / 3.0, 0.0, 1.0), "after shrink");

    store.set_points(&gpu, &scenario_points()[..2]);
    let none = spline.evaluate_curve(&gpu, &store).unwrap();
    assert!(none.extract_points().unwrap().is_empty());
}

#[test]
#[ignore = "requires a GPU adapter"]
fn domain_point_types_round_trip_through_gpu() {
    let gpu = gpu();
    let pts: Vec<[f32; 2]> = vec![[0.0, 0.0], [1.0, 2.0], [2.0, 2.0], [3.0, 0.0]];
    let store = ControlPointStore::with_points(&gpu, &pts);
    assert_eq!(store.points()[1], Point::new(1.0, 2.0, 0.0, 1.0));

    let mut spline = CubicBSpline::<[f32; 2]>::new(&gpu).unwrap();
    let samples = spline.evaluate_curve(&gpu, &store).unwrap().extract_points().unwrap();
    assert_eq!(samples.len(), 101);
    assert!((samples[0][0] - 1.0).abs() < TOLERANCE);
    assert!((samples[0][1] - 5.0 / 3.0).abs() < TOLERANCE);
}

// ===== Store and registry =====

#[test]
#[ignore = "requires a GPU adapter"]
fn store_buffer_size_tracks_point_count() {
    let gpu = gpu();
    let mut store = ControlPointStore::<[f32; 3]>::new(&gpu);
    assert_eq!(store.point_count(), 0);
    assert_eq!(store.byte_size(), 0);

    store.set_points(&gpu, &[[1.0, 2.0, 3.0]; 7]);
    assert_eq!(store.point_count(), 7);
    assert_eq!(store.byte_size(), 7 * 16);
    assert!(store.points().iter().all(|p| *p == Point::new(1.0, 2.0, 3.0, 1.0)));

    store.set_points(&gpu, &[[0.0; 3]; 2]);
    assert_eq!(store.byte_size(), 2 * 16);
    assert_eq!(store.buffer().usage(), wgpu::BufferUsages::STORAGE);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn kernel_compiles_once() {
    let gpu = gpu();
    assert!(!gpu.kernels().is_compiled(CurveKind::CubicBSpline));

    let _spline = CubicBSpline::<Point>::new(&gpu).unwrap();
    assert!(gpu.kernels().is_compiled(CurveKind::CubicBSpline));

    let first = gpu.kernel(CurveKind::CubicBSpline) as *const _;
    let second = gpu.kernel(CurveKind::CubicBSpline) as *const _;
    assert_eq!(first, second, "registry handed out a different kernel");
}
