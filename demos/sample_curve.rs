// demos/sample_curve.rs - sample a zig-zag control polygon on the GPU.
//
// USAGE
// ─────
//   cargo run --example sample_curve            # 8 control points
//   cargo run --example sample_curve -- 32      # 32 control points
//   RUST_LOG=bspline_gpu=debug cargo run --example sample_curve
//
// Prints every 25th sample of the curve; the knots between segments are at
// multiples of 101.

use bspline_gpu::{ControlPointStore, CubicBSpline, GpuDevice, SAMPLES_PER_SEGMENT};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();

    let count: usize = std::env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(8);

    // Zig-zag in the xy plane.
    let control: Vec<[f32; 2]> = (0..count)
        .map(|i| [i as f32, if i % 2 == 0 { 0.0 } else { 2.0 }])
        .collect();

    let gpu = GpuDevice::new()?;
    tracing::info!("{gpu}");

    let store = ControlPointStore::with_points(&gpu, &control);
    let mut spline = CubicBSpline::new(&gpu)?;
    let eval = spline.evaluate_curve(&gpu, &store)?;
    tracing::info!(
        control_points = count,
        segments = eval.segment_count(),
        samples = eval.sample_count(),
        "curve evaluated"
    );

    let samples = eval.extract_points()?;
    for (i, [x, y]) in samples.iter().enumerate().step_by(25) {
        let segment = i as u32 / SAMPLES_PER_SEGMENT;
        println!("segment {segment:3}  sample {i:5}  ({x:8.4}, {y:8.4})");
    }

    Ok(())
}
