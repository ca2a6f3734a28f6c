// error.rs - errors surfaced by curve evaluation.
//
// Fewer than four control points is deliberately absent: it yields an empty
// `Evaluation`, not an error. Failures inside wgpu itself (shader compile
// errors, out-of-memory, device loss) go through wgpu's uncaptured-error
// handler and are not represented here.

use thiserror::Error;

use crate::gpu::device::GpuError;

/// Errors from building or reading back a curve evaluation.
#[derive(Error, Debug)]
pub enum CurveError {
    /// Device initialisation or configuration failed.
    #[error(transparent)]
    Device(#[from] GpuError),

    /// One workgroup per segment would exceed the device's dispatch limit.
    #[error("{segments} curve segments exceed the device limit of {max} workgroups per dispatch")]
    TooManySegments { segments: u32, max: u32 },

    /// The readback buffer could not be mapped.
    #[error("readback mapping failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),

    /// The map callback was dropped without reporting a result.
    #[error("readback map callback never fired")]
    MapCallbackDropped,
}
