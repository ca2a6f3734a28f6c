// gpu/device.rs - wgpu device context.
//
// Responsibilities:
//   - Enumerate adapters for the configured backends and pick the first
//     hardware one, falling back to a software adapter only if allowed.
//   - Expose a `DeviceProfile` for simulating conservative device limits on
//     a development machine.
//   - Own the `KernelRegistry`, so compiled curve kernels live exactly as
//     long as the device that compiled them.
//
// ADAPTER SELECTION:
// wgpu's default `request_adapter` uses power-preference heuristics that may
// grab llvmpipe/lavapipe when a software Vulkan driver is installed next to
// a real GPU. We enumerate explicitly and rank by `DeviceType`.
//
// DEVICE LIMITS:
// Under `DeviceProfile::Downlevel` we request *lower* limits than the
// hardware supports. wgpu validates every pipeline and dispatch against the
// requested limits, so a kernel that would not run on a downlevel GPU fails
// on the workstation too.
//
// NEW RUST CONCEPTS
// ──────────────────
// - `pollster::block_on` runs an async fn to completion on the current
//   thread. wgpu's adapter/device API is async because on WebGPU it maps to
//   JS Promises; natively we just block.
// - Struct fields drop in declaration order. `_instance` is declared last
//   so the `wgpu::Instance` outlives `device` and `queue`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::gpu::kernels::{CurveKernel, CurveKind, KernelRegistry};

/// Environment variable selecting the [`DeviceProfile`] in
/// [`DeviceConfig::from_env`].
pub const PROFILE_ENV: &str = "BSPLINE_GPU_PROFILE";

/// Hardware profile controlling the device limits we request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceProfile {
    /// `wgpu::Limits::default()`. No artificial caps.
    #[default]
    Native,
    /// `wgpu::Limits::downlevel_defaults()`: 256 invocations per workgroup,
    /// 16 KiB of workgroup memory. Useful to check that kernels stay within
    /// what GLES-class and mobile GPUs offer.
    Downlevel,
}

impl DeviceProfile {
    /// Limits requested from the adapter for this profile.
    pub fn limits(self) -> wgpu::Limits {
        match self {
            DeviceProfile::Native => wgpu::Limits::default(),
            DeviceProfile::Downlevel => wgpu::Limits::downlevel_defaults(),
        }
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceProfile::Native => write!(f, "Native"),
            DeviceProfile::Downlevel => write!(f, "Downlevel (simulated limits)"),
        }
    }
}

impl FromStr for DeviceProfile {
    type Err = GpuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(DeviceProfile::Native),
            "downlevel" => Ok(DeviceProfile::Downlevel),
            _ => Err(GpuError::UnknownProfile(s.to_string())),
        }
    }
}

/// Options for [`GpuDevice::with_config`].
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub profile: DeviceProfile,
    /// Backend APIs to enumerate adapters from.
    pub backends: wgpu::Backends,
    /// Accept a CPU (software) adapter when no hardware adapter exists.
    /// Slow, but keeps headless CI machines with lavapipe usable.
    pub allow_software: bool,
    /// Debug label attached to the wgpu device.
    pub label: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            profile: DeviceProfile::Native,
            backends: wgpu::Backends::PRIMARY,
            allow_software: true,
            label: "bspline-gpu".to_string(),
        }
    }
}

impl DeviceConfig {
    /// Defaults overridden by the environment:
    ///
    /// - `WGPU_BACKEND` (e.g. `vulkan`, `metal`, `dx12`, `gl`) restricts the
    ///   backends, parsed by wgpu itself.
    /// - `BSPLINE_GPU_PROFILE` = `native` | `downlevel`.
    ///
    /// An unparseable profile is logged and ignored.
    pub fn from_env() -> Self {
        let mut config = DeviceConfig::default();

        if let Some(backends) = wgpu::util::backend_bits_from_env() {
            config.backends = backends;
        }

        if let Ok(value) = std::env::var(PROFILE_ENV) {
            match value.parse::<DeviceProfile>() {
                Ok(profile) => config.profile = profile,
                Err(e) => tracing::warn!(%e, env = PROFILE_ENV, "ignoring invalid profile"),
            }
        }

        config
    }
}

/// Cached adapter information for logging and debugging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// The GPU context: device, queue, active profile and compiled kernels.
///
/// Hold one `GpuDevice` for the lifetime of the application. It is
/// expensive to create, and every kernel compiled through it is cached in
/// its [`KernelRegistry`] until it is dropped.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub profile: DeviceProfile,
    pub adapter_info: AdapterInfo,
    kernels: KernelRegistry,
    /// Keeps the `wgpu::Instance` alive until `device` and `queue` are
    /// dropped. Never read.
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Create a device from [`DeviceConfig::from_env`].
    ///
    /// # Errors
    /// Returns `Err` if no suitable adapter is found or the device request
    /// fails.
    pub fn new() -> Result<Self, GpuError> {
        Self::with_config(DeviceConfig::from_env())
    }

    /// Create a device with an explicit configuration.
    pub fn with_config(config: DeviceConfig) -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async(config))
    }

    async fn init_async(config: DeviceConfig) -> Result<Self, GpuError> {
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::empty()
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: config.backends,
            flags,
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(config.backends);
        for a in &adapters {
            let info = a.get_info();
            tracing::debug!(
                adapter = %info.name,
                backend = ?info.backend,
                device_type = ?info.device_type,
                "found adapter"
            );
        }

        let adapter = select_adapter(adapters, config.allow_software)
            .ok_or(GpuError::NoSuitableAdapter)?;

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name.clone(),
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };
        tracing::info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            profile = %config.profile,
            "GPU adapter selected"
        );

        // wgpu 22: request_device returns (Device, Queue) directly; the tuple
        // type must be spelled out to help the type inferencer.
        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some(config.label.as_str()),
                    required_features: wgpu::Features::empty(),
                    required_limits: config.profile.limits(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        Ok(GpuDevice {
            device,
            queue,
            profile: config.profile,
            adapter_info,
            kernels: KernelRegistry::default(),
            _instance: instance,
        })
    }

    /// The compiled kernel for `kind`, compiling it on first use.
    pub fn kernel(&self, kind: CurveKind) -> &CurveKernel {
        self.kernels.get(&self.device, kind)
    }

    /// Kernel cache of this device.
    pub fn kernels(&self) -> &KernelRegistry {
        &self.kernels
    }

    /// Check a workgroup invocation count against the device's limits.
    pub fn validate_workgroup_size(&self, total: u32) -> Result<(), GpuError> {
        check_workgroup_size(&self.device.limits(), total)
    }

    /// Maximum number of workgroups in a single dispatch dimension.
    pub fn max_workgroups_per_dimension(&self) -> u32 {
        self.device.limits().max_compute_workgroups_per_dimension
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, profile: {} }}",
            self.adapter_info, self.profile
        )
    }
}

// ============================================================
// Adapter and limits helpers
// ============================================================

/// Rank adapters: real hardware first, software last (or never).
///
///   DiscreteGpu / IntegratedGpu  -> 0
///   VirtualGpu / Other           -> 1
///   Cpu                          -> 2, only with `allow_software`
fn adapter_rank(device_type: wgpu::DeviceType, allow_software: bool) -> Option<u8> {
    match device_type {
        wgpu::DeviceType::DiscreteGpu | wgpu::DeviceType::IntegratedGpu => Some(0),
        wgpu::DeviceType::VirtualGpu | wgpu::DeviceType::Other => Some(1),
        wgpu::DeviceType::Cpu if allow_software => Some(2),
        wgpu::DeviceType::Cpu => None,
    }
}

fn select_adapter(adapters: Vec<wgpu::Adapter>, allow_software: bool) -> Option<wgpu::Adapter> {
    adapters
        .into_iter()
        .filter_map(|a| adapter_rank(a.get_info().device_type, allow_software).map(|r| (r, a)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, a)| a)
}

fn check_workgroup_size(limits: &wgpu::Limits, total: u32) -> Result<(), GpuError> {
    let max = limits
        .max_compute_invocations_per_workgroup
        .min(limits.max_compute_workgroup_size_x);
    if total > max {
        return Err(GpuError::WorkgroupTooLarge { total, max });
    }
    Ok(())
}

// ============================================================
// Error type
// ============================================================

/// Errors from GPU device initialisation and configuration.
#[derive(Error, Debug)]
pub enum GpuError {
    /// No adapter passed the selection filter.
    #[error(
        "no suitable GPU adapter found; check that a Vulkan/Metal/DX12 driver is installed \
         or set WGPU_BACKEND"
    )]
    NoSuitableAdapter,

    /// wgpu device request failed (driver issue, unsupported limits, etc.).
    #[error("device request failed: {0}")]
    DeviceRequest(#[source] wgpu::RequestDeviceError),

    /// A workgroup needs more invocations than the device allows.
    #[error("workgroup size {total} exceeds device limit of {max} invocations")]
    WorkgroupTooLarge { total: u32, max: u32 },

    /// `BSPLINE_GPU_PROFILE` held something other than `native`/`downlevel`.
    #[error("unknown device profile {0:?} (expected \"native\" or \"downlevel\")")]
    UnknownProfile(String),
}

// ============================================================
// Tests
// ============================================================
