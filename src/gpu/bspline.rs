// gpu/bspline.rs - uniform cubic B-spline evaluation on the GPU.
//
// DISPATCH GEOMETRY
// ──────────────────
// n control points define n - 3 segments (sliding window of 4, overlapping
// by 3). Each segment is one workgroup of SAMPLES_PER_SEGMENT invocations;
// invocation i samples t = i * PARAMETER_STEP, so t covers [0, 1] inclusive.
//
//   control points   P0  P1  P2  P3  P4  P5
//   workgroup 0      [P0  P1  P2  P3]
//   workgroup 1          [P1  P2  P3  P4]
//   workgroup 2              [P2  P3  P4  P5]
//
//   output           [ wg0: 101 samples | wg1: 101 samples | wg2: ... ]
//
// Sample (g, i) lands at g * 101 + i: segment-major, then parameter order,
// which is the natural traversal of the curve. Last sample of segment g and
// first sample of segment g + 1 describe the same knot.
//
// SYNCHRONISATION
// ────────────────
// Inside a workgroup, invocation 0 stages the geometry and basis matrices in
// workgroup memory and `workgroupBarrier()` publishes them. Workgroups never
// talk to each other: each reads its own 4-point window and writes its own
// 101-slot range. On the host side wgpu inserts the storage -> copy barrier
// between the compute pass and the readback copy automatically.
//
// BUFFER OWNERSHIP
// ─────────────────
// `CubicBSpline` owns the output buffer (STORAGE | COPY_SRC) and a readback
// buffer (MAP_READ | COPY_DST) of the same size. `Evaluation` only borrows
// them, and `evaluate_curve` takes `&mut self`, so an evaluation cannot
// outlive the evaluator or survive the next evaluation.

use std::marker::PhantomData;

use crate::error::CurveError;
use crate::gpu::control_points::{point_bytes, ControlPointStore};
use crate::gpu::device::GpuDevice;
use crate::gpu::kernels::CurveKind;
use crate::gpu::mapping::map_read;
use crate::point::{CurvePoint, Point};

/// Samples per curve segment; also the kernel's workgroup size.
pub const SAMPLES_PER_SEGMENT: u32 = 101;

/// Parameter increment between consecutive samples of a segment.
pub const PARAMETER_STEP: f32 = 0.01;

/// Control points blended by one segment.
pub const CONTROL_POINTS_PER_SEGMENT: usize = 4;

// ---------------------------------------------------------------------------
// Dispatch geometry
// ---------------------------------------------------------------------------

/// Workgroup layout for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchGeometry {
    /// Number of segments, equal to the number of workgroups.
    pub segment_count: u32,
    /// Invocations per workgroup.
    pub samples_per_segment: u32,
}

impl DispatchGeometry {
    /// Geometry for `n` control points, or `None` if there are fewer than
    /// four and therefore no complete segment.
    pub fn for_control_points(n: usize) -> Option<Self> {
        if n < CONTROL_POINTS_PER_SEGMENT {
            return None;
        }
        let segment_count = u32::try_from(n - (CONTROL_POINTS_PER_SEGMENT - 1)).unwrap_or(u32::MAX);
        Some(DispatchGeometry { segment_count, samples_per_segment: SAMPLES_PER_SEGMENT })
    }

    /// Total samples written by the kernel. Saturates instead of wrapping;
    /// anything that large is rejected by the dispatch limit anyway.
    pub fn sample_count(&self) -> u32 {
        self.segment_count.saturating_mul(self.samples_per_segment)
    }

    /// `dispatch_workgroups` arguments.
    pub fn workgroups(&self) -> (u32, u32, u32) {
        (self.segment_count, 1, 1)
    }

    /// Reject a dispatch wider than `max` workgroups per dimension.
    ///
    /// # Errors
    /// [`CurveError::TooManySegments`] if `segment_count > max`.
    pub fn check_dispatch_limit(&self, max: u32) -> Result<(), CurveError> {
        if self.segment_count > max {
            return Err(CurveError::TooManySegments { segments: self.segment_count, max });
        }
        Ok(())
    }

    /// Output slot of sample `sample` in segment `segment`.
    #[cfg(test)]
    fn output_index(&self, segment: u32, sample: u32) -> u32 {
        segment * self.samples_per_segment + sample
    }

    #[cfg(test)]
    fn parameter(sample: u32) -> f32 {
        sample as f32 * PARAMETER_STEP
    }
}

/// Number of samples produced for `n` control points:
/// `max(0, n - 3) * SAMPLES_PER_SEGMENT`.
pub fn sample_count_for(n: usize) -> u32 {
    DispatchGeometry::for_control_points(n).map_or(0, |g| g.sample_count())
}

// ---------------------------------------------------------------------------
// CubicBSpline
// ---------------------------------------------------------------------------

/// Output and readback buffers, sized for one sample count.
struct OutputBuffers {
    output: wgpu::Buffer,
    readback: wgpu::Buffer,
    sample_count: u32,
}

impl OutputBuffers {
    fn new(gpu: &GpuDevice, sample_count: u32) -> Self {
        let size = point_bytes(sample_count as usize);
        let output = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("curve points"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("curve points readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        OutputBuffers { output, readback, sample_count }
    }
}

/// Uniform cubic B-spline evaluator.
///
/// Create once per curve and call [`evaluate_curve`](Self::evaluate_curve)
/// whenever the control points change (typically every frame). The output
/// buffer is reused across evaluations and only reallocated when the
/// number of segments changes.
pub struct CubicBSpline<P> {
    buffers: Option<OutputBuffers>,
    _point: PhantomData<fn() -> P>,
}

impl<P: CurvePoint> CubicBSpline<P> {
    /// Prepare an evaluator, compiling the kernel on first use.
    ///
    /// # Errors
    /// [`CurveError::Device`] if the device cannot run a workgroup of
    /// `SAMPLES_PER_SEGMENT` invocations.
    pub fn new(gpu: &GpuDevice) -> Result<Self, CurveError> {
        gpu.validate_workgroup_size(CurveKind::CubicBSpline.workgroup_size())?;
        gpu.kernel(CurveKind::CubicBSpline);
        Ok(CubicBSpline { buffers: None, _point: PhantomData })
    }

    /// Points the output buffer currently holds (0 before the first
    /// non-empty evaluation).
    pub fn output_capacity(&self) -> u32 {
        self.buffers.as_ref().map_or(0, |b| b.sample_count)
    }

    /// Sample the curve defined by `points`.
    ///
    /// Fewer than four control points return an empty [`Evaluation`] and
    /// issue no dispatch. Otherwise one workgroup per segment is dispatched
    /// and submitted before this returns; the samples are read back by
    /// [`Evaluation::extract_points`].
    ///
    /// # Errors
    /// [`CurveError::TooManySegments`] if the segment count exceeds the
    /// device's workgroup-per-dimension limit.
    pub fn evaluate_curve<'a>(
        &'a mut self,
        gpu: &'a GpuDevice,
        points: &ControlPointStore<P>,
    ) -> Result<Evaluation<'a, P>, CurveError> {
        let Some(geometry) = DispatchGeometry::for_control_points(points.point_count()) else {
            tracing::debug!(points = points.point_count(), "too few control points, empty evaluation");
            return Ok(Evaluation::empty(gpu));
        };

        geometry.check_dispatch_limit(gpu.max_workgroups_per_dimension())?;

        let sample_count = geometry.sample_count();
        if self.output_capacity() != sample_count {
            self.buffers = None;
        }
        let buffers: &'a OutputBuffers = self.buffers.get_or_insert_with(|| {
            tracing::debug!(
                samples = sample_count,
                bytes = point_bytes(sample_count as usize),
                "allocating curve output"
            );
            OutputBuffers::new(gpu, sample_count)
        });

        let kernel = gpu.kernel(CurveKind::CubicBSpline);
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cubic bspline BG"),
            layout: &kernel.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: points.buffer().as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: buffers.output.as_entire_binding() },
            ],
        });

        let (wg_x, wg_y, wg_z) = geometry.workgroups();
        tracing::trace!(workgroups = wg_x, samples = sample_count, "dispatching cubic bspline");

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("cubic bspline dispatch"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("evaluate_segment"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(wg_x, wg_y, wg_z);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));

        Ok(Evaluation {
            gpu,
            buffers: Some(buffers),
            sample_count,
            _point: PhantomData,
        })
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Result of one [`CubicBSpline::evaluate_curve`] call.
///
/// Borrows the evaluator's output buffer; owns no GPU memory. An empty
/// evaluation (fewer than four control points) has no buffer at all.
pub struct Evaluation<'a, P> {
    gpu: &'a GpuDevice,
    buffers: Option<&'a OutputBuffers>,
    sample_count: u32,
    _point: PhantomData<fn() -> P>,
}

impl<'a, P: CurvePoint> Evaluation<'a, P> {
    fn empty(gpu: &'a GpuDevice) -> Self {
        Evaluation { gpu, buffers: None, sample_count: 0, _point: PhantomData }
    }

    /// Number of samples: `(control points - 3) * 101`, or 0.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    pub fn segment_count(&self) -> u32 {
        self.sample_count / SAMPLES_PER_SEGMENT
    }

    /// Read the samples back and convert them to `P`.
    ///
    /// Samples come in curve order: segment 0 from t = 0 to t = 1, then
    /// segment 1, and so on. Every call copies the output buffer again and
    /// blocks until the copy is mapped; nothing is cached.
    pub fn extract_points(&self) -> Result<Vec<P>, CurveError> {
        self.read(P::from_canonical)
    }

    /// Like [`extract_points`](Self::extract_points) without conversion.
    pub fn extract_canonical(&self) -> Result<Vec<Point>, CurveError> {
        self.read(|p| p)
    }

    fn read<T>(&self, convert: impl Fn(Point) -> T) -> Result<Vec<T>, CurveError> {
        let Some(buffers) = self.buffers.filter(|_| self.sample_count > 0) else {
            return Ok(Vec::new());
        };
        let bytes = point_bytes(self.sample_count as usize);

        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("cubic bspline readback"),
        });
        encoder.copy_buffer_to_buffer(&buffers.output, 0, &buffers.readback, 0, bytes);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        let mapped = map_read(self.gpu, &buffers.readback, bytes)?;
        Ok(mapped.points().iter().copied().map(convert).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
