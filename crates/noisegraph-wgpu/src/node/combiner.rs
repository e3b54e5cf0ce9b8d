use super::{Compute, Kind, TextureOp};
use crate::{
    Result,
    uniforms::{KernelParams, flag},
};

/// A node merging [`super::Port::Provider`] and [`super::Port::Provider2`] pixel by pixel
///
/// With `a` the provider and `b` the second provider, the arithmetic variants compute
/// per colour channel and keep `max(a.alpha, b.alpha)`. Results are clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combiner {
    /// `a + b`, or `(a + b) / 2` when normalised
    Add { normalise: bool },
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`; dividing by zero gives 1 for a positive `a` and 0 otherwise
    Divide,
    /// `a ^ b`
    Power,
    /// Whichever pixel has the lower mean of rgb, unchanged; `a` wins ties
    Min,
    /// Whichever pixel has the higher mean of rgb, unchanged; `a` wins ties
    Max,
}

impl TextureOp for Combiner {
    fn kind(&self) -> Kind {
        Kind::Combiner
    }

    fn compute(&self) -> Compute {
        Compute::Kernel(match self {
            Self::Add { .. } => "add_combiner",
            Self::Subtract => "subtract_combiner",
            Self::Multiply => "multiply_combiner",
            Self::Divide => "divide_combiner",
            Self::Power => "power_combiner",
            Self::Min => "min_combiner",
            Self::Max => "max_combiner",
        })
    }

    fn params(&self) -> KernelParams {
        let normalise = matches!(self, Self::Add { normalise: true });
        KernelParams::with_values([flag(normalise), 0.0, 0.0, 0.0])
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
