use super::{Compute, Kind, TextureOp, ensure, ensure_finite};
use crate::{Result, uniforms::KernelParams};

/// A node choosing between two providers using the red channel of a third input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selector {
    /// Linear interpolation from provider to provider2 by the selector value
    Blend,
    /// Provider below `boundary - transition / 2`, provider2 above `boundary + transition / 2`,
    /// interpolated in between. With no transition, a selector value exactly at the
    /// boundary picks provider2.
    Select { boundary: f32, transition: f32 },
}

impl Selector {
    pub fn select() -> Self {
        Self::Select { boundary: 0.5, transition: 0.0 }
    }
}

impl TextureOp for Selector {
    fn kind(&self) -> Kind {
        Kind::Selector
    }

    fn compute(&self) -> Compute {
        Compute::Kernel(match self {
            Self::Blend => "blend_selector",
            Self::Select { .. } => "select_selector",
        })
    }

    fn params(&self) -> KernelParams {
        match *self {
            Self::Blend => KernelParams::default(),
            Self::Select { boundary, transition } => KernelParams::with_values([boundary, transition, 0.0, 0.0]),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Self::Select { boundary, transition } = *self {
            ensure_finite("select boundary", &[boundary, transition])?;
            ensure(transition >= 0.0, || format!("select transition must not be negative, got {transition}"))?;
        }
        Ok(())
    }
}
