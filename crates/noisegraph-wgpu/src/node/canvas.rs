use super::{Compute, DEFAULT_SIZE, Kind, TextureOp, ensure, ensure_finite, ensure_size};
use crate::{Result, uniforms::KernelParams};

/// Places its single input on a canvas of explicit size
///
/// `anchor` is where the input's top-left corner lands, as a fraction of the canvas, and
/// `scale` resizes the input relative to its own pixel size. The rest of the canvas is
/// transparent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleCanvas {
    pub width: u32,
    pub height: u32,
    pub anchor: [f32; 2],
    pub scale: [f32; 2],
}

impl Default for ScaleCanvas {
    fn default() -> Self {
        Self {
            width: DEFAULT_SIZE.0,
            height: DEFAULT_SIZE.1,
            anchor: [0.0, 0.0],
            scale: [1.0, 1.0],
        }
    }
}

impl ScaleCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, ..Self::default() }
    }
}

impl TextureOp for ScaleCanvas {
    fn kind(&self) -> Kind {
        Kind::ScaleCanvas
    }

    fn compute(&self) -> Compute {
        Compute::Kernel("scale_canvas")
    }

    fn params(&self) -> KernelParams {
        KernelParams::with_values([self.anchor[0], self.anchor[1], self.scale[0], self.scale[1]])
    }

    fn explicit_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn validate(&self) -> Result<()> {
        ensure_size("canvas", self.width, self.height)?;
        ensure_finite("canvas anchor", &self.anchor)?;
        ensure(self.scale.iter().all(|s| s.is_finite() && *s > 0.0), || format!("canvas scale must be positive, got {:?}", self.scale))
    }
}
