// gpu/mod.rs - GPU curve evaluation.
//
// Data flow for one frame:
//
//   &[P] --to_canonical--> ControlPointStore (STORAGE, binding 0)
//                               |
//                     CubicBSpline::evaluate_curve
//                  (one workgroup per segment, 101 samples each)
//                               |
//                   output buffer (STORAGE, binding 1)
//                               |
//                  Evaluation::extract_points (copy -> map -> unmap)
//                               |
//                    Vec<P> <--from_canonical--
//
// The host drives everything from one thread. It blocks only while mapping
// the readback buffer; the dispatch itself is submitted and left running.

pub mod bspline;
pub mod control_points;
pub mod device;
pub mod kernels;
pub mod mapping;
