//! Plain-old-data blocks shared with the kernels.
//!
//! These mirror the `Params` and `ColourStop` structs declared in every WGSL file, so
//! field order and padding must not change independently of the shaders.

use bytemuck::{Pod, Zeroable};

/// Uniform parameter block bound to every kernel
///
/// `rotation` and `offset_strength` are only read by generators. `values` carries the
/// kernel-specific parameters; the per-kernel layout is documented at the top of each
/// WGSL file. Boolean flags are encoded as `0.0` or `1.0`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct KernelParams {
    pub rotation: [f32; 3],
    pub offset_strength: f32,
    pub values: [[f32; 4]; 3],
}

impl KernelParams {
    /// Parameters with only the first `values` row set
    pub fn with_values(values: [f32; 4]) -> Self {
        Self {
            values: [values, [0.0; 4], [0.0; 4]],
            ..Self::default()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Encodes a flag for a `values` slot
pub fn flag(value: bool) -> f32 {
    if value { 1.0 } else { 0.0 }
}

/// One colour-ramp stop as laid out in the storage buffer (32-byte stride)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ColourStopData {
    pub colour: [f32; 4],
    pub position: f32,
    pub intensity: f32,
    pub _pad: [f32; 2],
}
