// bspline-gpu: uniform cubic B-spline sampling on the GPU.
//
// Control points are uploaded once per change, every curve segment is
// sampled by its own compute workgroup, and the samples are read back in
// curve order as the caller's own point type.
//
//   let gpu = GpuDevice::new()?;
//   let store = ControlPointStore::with_points(&gpu, &points);
//   let mut spline = CubicBSpline::new(&gpu)?;
//   let samples: Vec<[f32; 3]> = spline.evaluate_curve(&gpu, &store)?.extract_points()?;

pub mod error;
pub mod gpu;
pub mod point;

pub use error::CurveError;
pub use gpu::bspline::{CubicBSpline, DispatchGeometry, Evaluation, SAMPLES_PER_SEGMENT};
pub use gpu::control_points::ControlPointStore;
pub use gpu::device::{DeviceConfig, DeviceProfile, GpuDevice, GpuError};
pub use gpu::kernels::CurveKind;
pub use point::{CurvePoint, Point};
