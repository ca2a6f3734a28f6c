// gpu/kernels.rs - compiled curve kernels, one per curve algorithm.
//
// The set of algorithms is fixed at compile time (`CurveKind`), so the cache
// is a fixed array of `OnceLock` slots indexed by tag rather than a map.
// A slot is filled the first time its kernel is requested and never
// evicted; it is dropped together with the owning `GpuDevice`.
//
// Concurrent first use is safe: `OnceLock::get_or_init` runs the compile
// closure on exactly one thread, others block until the kernel is ready.
//
// Shader compilation errors are not caught here. wgpu reports them through
// the device's uncaptured-error handler, which panics by default.

use std::sync::OnceLock;

use crate::gpu::bspline::{PARAMETER_STEP, SAMPLES_PER_SEGMENT};

/// Curve algorithms with a GPU kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveKind {
    /// Uniform cubic B-spline, sampled at 101 points per segment.
    CubicBSpline,
}

impl CurveKind {
    /// Number of tags; size of the registry.
    pub const COUNT: usize = 1;

    pub const ALL: [CurveKind; CurveKind::COUNT] = [CurveKind::CubicBSpline];

    fn index(self) -> usize {
        match self {
            CurveKind::CubicBSpline => 0,
        }
    }

    /// Debug label for the shader module and pipeline.
    pub fn label(self) -> &'static str {
        match self {
            CurveKind::CubicBSpline => "cubic_bspline.wgsl",
        }
    }

    /// WGSL entry point.
    pub fn entry_point(self) -> &'static str {
        match self {
            CurveKind::CubicBSpline => "evaluate_segment",
        }
    }

    /// Invocations per workgroup baked into the kernel.
    pub fn workgroup_size(self) -> u32 {
        match self {
            CurveKind::CubicBSpline => SAMPLES_PER_SEGMENT,
        }
    }

    /// Kernel source with every template constant substituted.
    ///
    /// naga does not accept `override` expressions in `@workgroup_size`, so
    /// the sample count is baked into the text. The Rust constants stay the
    /// single source of truth for host-side dispatch arithmetic.
    pub fn source(self) -> String {
        match self {
            CurveKind::CubicBSpline => include_str!("../shaders/cubic_bspline.wgsl")
                .replace("{{SAMPLES_PER_SEGMENT}}", &SAMPLES_PER_SEGMENT.to_string())
                .replace("{{PARAMETER_STEP}}", &PARAMETER_STEP.to_string()),
        }
    }
}

/// A compiled compute pipeline and the bind group layout it was built with.
///
/// Bind group layout, `@group(0)`:
///   0: control points, `array<vec4<f32>>`, storage read-only
///   1: curve points,   `array<vec4<f32>>`, storage read-write
#[derive(Debug)]
pub struct CurveKernel {
    pub kind: CurveKind,
    pub pipeline: wgpu::ComputePipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CurveKernel {
    fn compile(device: &wgpu::Device, kind: CurveKind) -> Self {
        tracing::info!(kernel = kind.label(), "compiling curve kernel");

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(kind.label()),
            source: wgpu::ShaderSource::Wgsl(kind.source().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("curve kernel BGL"),
            entries: &[
                // 0: control points
                storage_entry(0, true),
                // 1: curve points
                storage_entry(1, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("curve kernel pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(kind.entry_point()),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: kind.entry_point(),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        CurveKernel { kind, pipeline, bind_group_layout }
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Lazily compiled kernels, one slot per [`CurveKind`].
///
/// Owned by `GpuDevice`; use [`GpuDevice::kernel`](crate::gpu::device::GpuDevice::kernel).
#[derive(Debug)]
pub struct KernelRegistry {
    slots: [OnceLock<CurveKernel>; CurveKind::COUNT],
}

impl Default for KernelRegistry {
    fn default() -> Self {
        KernelRegistry {
            slots: std::array::from_fn(|_| OnceLock::new()),
        }
    }
}

impl KernelRegistry {
    /// The kernel for `kind`, compiling it on `device` if this is the first
    /// request for that tag.
    ///
    /// `device` must be the device that owns this registry; a pipeline is
    /// only valid on the device that created it.
    pub fn get(&self, device: &wgpu::Device, kind: CurveKind) -> &CurveKernel {
        self.slots[kind.index()].get_or_init(|| CurveKernel::compile(device, kind))
    }

    /// Whether `kind` has been compiled yet.
    pub fn is_compiled(&self, kind: CurveKind) -> bool {
        self.slots[kind.index()].get().is_some()
    }
}
