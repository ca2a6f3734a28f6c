// gpu/mapping.rs - scoped host access to mapped buffers.
//
// A mapped wgpu buffer cannot be used by the GPU until it is unmapped, and
// every `BufferView` must be dropped before `unmap()` is called. The guards
// below pair the two: constructing one acquires the mapping, dropping it
// releases the view and then unmaps, on every exit path including `?` and
// panics. Host code only ever sees a bounds-checked `&[Point]` /
// `&mut [Point]` over the mapped region.
//
// WRITE PATH:
//   Buffers created with `mapped_at_creation: true` are mapped immediately,
//   whatever their usage flags. `MappedWrite` wraps that initial mapping.
//
// READ PATH:
//   `map_read` requests an async read mapping of a MAP_READ buffer, blocks on
//   `device.poll(Maintain::Wait)` until the callback fires, and hands back a
//   `MappedRead`.

use crate::error::CurveError;
use crate::gpu::device::GpuDevice;
use crate::point::Point;

/// Exclusive write access to a buffer created with `mapped_at_creation`.
pub struct MappedWrite<'a> {
    buffer: &'a wgpu::Buffer,
    view: Option<wgpu::BufferViewMut<'a>>,
}

impl<'a> MappedWrite<'a> {
    /// Take the initial mapping of `buffer`.
    ///
    /// # Panics
    /// If `buffer` is not currently mapped (wgpu validation).
    pub fn new(buffer: &'a wgpu::Buffer) -> Self {
        let view = buffer.slice(..).get_mapped_range_mut();
        MappedWrite { buffer, view: Some(view) }
    }

    /// The whole mapped range viewed as points.
    pub fn points_mut(&mut self) -> &mut [Point] {
        match self.view.as_mut() {
            Some(view) => bytemuck::cast_slice_mut(&mut view[..]),
            None => &mut [],
        }
    }
}

impl Drop for MappedWrite<'_> {
    fn drop(&mut self) {
        // The view must be gone before unmap.
        drop(self.view.take());
        self.buffer.unmap();
    }
}

/// Shared read access to the first `len` bytes of a mapped buffer.
pub struct MappedRead<'a> {
    buffer: &'a wgpu::Buffer,
    view: Option<wgpu::BufferView<'a>>,
}

impl MappedRead<'_> {
    /// The mapped range viewed as points.
    pub fn points(&self) -> &[Point] {
        match self.view.as_ref() {
            Some(view) => bytemuck::cast_slice(&view[..]),
            None => &[],
        }
    }
}

impl Drop for MappedRead<'_> {
    fn drop(&mut self) {
        drop(self.view.take());
        self.buffer.unmap();
    }
}

/// Map the first `len` bytes of `buffer` for reading and block until the
/// mapping is ready.
///
/// `buffer` must have `MAP_READ` usage, and every command writing to it must
/// already be submitted. `len` must be non-zero and a multiple of
/// `wgpu::MAP_ALIGNMENT`.
pub fn map_read<'a>(
    gpu: &GpuDevice,
    buffer: &'a wgpu::Buffer,
    len: u64,
) -> Result<MappedRead<'a>, CurveError> {
    let slice = buffer.slice(..len);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        // The receiver only disappears if the caller already gave up.
        let _ = tx.send(result);
    });

    gpu.device.poll(wgpu::Maintain::Wait);
    rx.recv().map_err(|_| CurveError::MapCallbackDropped)??;

    Ok(MappedRead { buffer, view: Some(slice.get_mapped_range()) })
}
