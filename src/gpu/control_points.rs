// gpu/control_points.rs - device-resident control points.
//
// `ControlPointStore<P>` keeps two copies of the control polygon:
//   - host:   `Vec<Point>`, exactly what was last uploaded (never read back)
//   - device: one STORAGE buffer of `len * 16` bytes, bound at binding 0 of
//             the curve kernel
//
// UPLOAD STRATEGY: invalidate and rewrite
// ────────────────────────────────────────
// wgpu buffers cannot be resized, and a STORAGE buffer cannot carry
// MAP_WRITE usage. Every `set_points` therefore allocates a fresh buffer
// with `mapped_at_creation: true`, fills it through a `MappedWrite` guard
// and unmaps it before returning. The previous buffer is dropped; wgpu keeps
// it alive until any dispatch already submitted against it has finished.
// No dispatch can ever observe a half-written buffer: a mapped buffer cannot
// be bound, and `&mut self` keeps evaluations from borrowing the store while
// it is being rewritten.

use std::marker::PhantomData;

use crate::gpu::device::GpuDevice;
use crate::gpu::mapping::MappedWrite;
use crate::point::{CurvePoint, Point};

/// Control points of one curve, uploaded to the GPU.
///
/// `P` is the caller's point type; it is converted to [`Point`] on upload.
pub struct ControlPointStore<P> {
    points: Vec<Point>,
    buffer: wgpu::Buffer,
    _point: PhantomData<fn(&P)>,
}

impl<P: CurvePoint> ControlPointStore<P> {
    /// An empty store. The device buffer holds zero points.
    pub fn new(gpu: &GpuDevice) -> Self {
        ControlPointStore {
            points: Vec::new(),
            buffer: create_point_buffer(gpu, 0, false),
            _point: PhantomData,
        }
    }

    /// A store initialised with `points`.
    pub fn with_points(gpu: &GpuDevice, points: &[P]) -> Self {
        let mut store = Self::new(gpu);
        store.set_points(gpu, points);
        store
    }

    /// Replace the control polygon and rewrite the device buffer.
    ///
    /// Any point count is accepted; fewer than four points simply evaluate
    /// to an empty curve.
    pub fn set_points(&mut self, gpu: &GpuDevice, points: &[P]) {
        self.points.clear();
        self.points.extend(points.iter().map(P::to_canonical));

        let mapped = !self.points.is_empty();
        self.buffer = create_point_buffer(gpu, self.points.len(), mapped);
        if mapped {
            let mut guard = MappedWrite::new(&self.buffer);
            guard.points_mut().copy_from_slice(&self.points);
        }

        tracing::debug!(
            points = self.points.len(),
            bytes = self.buffer.size(),
            "control points uploaded"
        );
    }
}

impl<P> ControlPointStore<P> {
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Host copy of the last upload, in curve order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Device buffer holding the control points (kernel binding 0).
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Size of the device buffer in bytes; always `point_count() * 16`.
    pub fn byte_size(&self) -> u64 {
        self.buffer.size()
    }
}

/// Control points are only ever bound as a read-only storage buffer and
/// written through the initial mapping.
pub(crate) const POINT_BUFFER_USAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE;

fn create_point_buffer(gpu: &GpuDevice, len: usize, mapped_at_creation: bool) -> wgpu::Buffer {
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("control points"),
        size: point_bytes(len),
        usage: POINT_BUFFER_USAGE,
        mapped_at_creation,
    })
}

/// Byte size of `len` canonical points.
#[inline]
pub(crate) fn point_bytes(len: usize) -> u64 {
    len as u64 * Point::SIZE
}
