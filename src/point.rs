// point.rs - canonical curve point and the per-type adapter trait.
//
// Every point that reaches the GPU is a `Point`: four f32 components laid
// out exactly like a WGSL `vec4<f32>` element of a storage array (16 bytes,
// 16-byte stride, no padding). Caller-side point types never touch device
// memory; they go through `CurvePoint` on the way in and on the way out.
//
// NEW RUST CONCEPTS
// ──────────────────
// - A trait with an associated constructor (`from_canonical`) lets the
//   evaluator build the caller's type without knowing anything about it.
//   The impl is selected at compile time from the type parameter of
//   `ControlPointStore<P>` / `CubicBSpline<P>`.
// - `bytemuck::Pod` on a `#[repr(C)]` struct makes `&[Point]` <-> `&[u8]`
//   casts safe, which is how mapped GPU memory is viewed.

use std::fmt;

/// Device-side point: four scalar components (x, y, z, w).
///
/// Matches `vec4<f32>` in `cubic_bspline.wgsl`. Homogeneous control points
/// usually carry `w = 1.0`; the kernel blends `w` like any other component.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Point {
    /// Size in bytes of one point in a storage buffer.
    pub const SIZE: u64 = std::mem::size_of::<Point>() as u64;

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Point { x, y, z, w }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Largest per-component absolute difference. Handy for tolerance
    /// checks against reference values.
    pub fn max_abs_diff(&self, other: &Point) -> f32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
            .max((self.w - other.w).abs())
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4}, {:.4}, {:.4})", self.x, self.y, self.z, self.w)
    }
}

/// Conversion between a caller's point type and the canonical [`Point`].
///
/// Implement this for every point type you want to feed into a
/// `ControlPointStore` or read back out of an `Evaluation`. Conversions must
/// be pure, and lossless for every field they map:
/// `P::from_canonical(p.to_canonical()) == p` on the mapped fields.
///
/// ```
/// use bspline_gpu::point::{CurvePoint, Point};
///
/// #[derive(Debug, PartialEq)]
/// struct Waypoint { east: f32, north: f32 }
///
/// impl CurvePoint for Waypoint {
///     fn to_canonical(&self) -> Point {
///         Point::new(self.east, self.north, 0.0, 1.0)
///     }
///     fn from_canonical(p: Point) -> Self {
///         Waypoint { east: p.x, north: p.y }
///     }
/// }
///
/// let w = Waypoint { east: 3.0, north: -1.5 };
/// assert_eq!(Waypoint::from_canonical(w.to_canonical()), w);
/// ```
pub trait CurvePoint: Sized {
    fn to_canonical(&self) -> Point;
    fn from_canonical(p: Point) -> Self;
}

impl CurvePoint for Point {
    #[inline]
    fn to_canonical(&self) -> Point {
        *self
    }

    #[inline]
    fn from_canonical(p: Point) -> Self {
        p
    }
}

impl CurvePoint for [f32; 4] {
    #[inline]
    fn to_canonical(&self) -> Point {
        Point::new(self[0], self[1], self[2], self[3])
    }

    #[inline]
    fn from_canonical(p: Point) -> Self {
        p.to_array()
    }
}

/// 3D points enter with `w = 1.0`; `w` is dropped on readback.
impl CurvePoint for [f32; 3] {
    #[inline]
    fn to_canonical(&self) -> Point {
        Point::new(self[0], self[1], self[2], 1.0)
    }

    #[inline]
    fn from_canonical(p: Point) -> Self {
        [p.x, p.y, p.z]
    }
}

/// 2D points live in the z = 0 plane with `w = 1.0`.
impl CurvePoint for [f32; 2] {
    #[inline]
    fn to_canonical(&self) -> Point {
        Point::new(self[0], self[1], 0.0, 1.0)
    }

    #[inline]
    fn from_canonical(p: Point) -> Self {
        [p.x, p.y]
    }
}
