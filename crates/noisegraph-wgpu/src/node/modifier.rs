use super::{Compute, Kind, TextureOp, ensure, ensure_finite};
use crate::{
    Error, Result,
    backend::ImageFilter,
    uniforms::{ColourStopData, KernelParams, flag},
};

/// What geometric modifiers write where the transformed input does not reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeMode {
    /// Transparent
    #[default]
    Clip,
    /// Opaque black
    Fill,
}

/// One colour of a [`ColourRamp`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColourStop {
    pub colour: [f32; 4],
    /// Input value the stop sits at
    pub position: f32,
    /// How strongly the colour replaces the input (0 keeps the input)
    pub intensity: f32,
}

/// Stops sorted by position; never empty
#[derive(Debug, Clone, PartialEq)]
pub struct ColourRamp {
    stops: Vec<ColourStop>,
}

impl Default for ColourRamp {
    fn default() -> Self {
        Self {
            stops: vec![ColourStop {
                colour: [1.0; 4],
                position: 0.5,
                intensity: 0.0,
            }],
        }
    }
}

impl ColourRamp {
    /// Builds a ramp from stops in any order; an empty list gives the default ramp
    pub fn new(mut stops: Vec<ColourStop>) -> Result<Self> {
        if stops.is_empty() {
            return Ok(Self::default());
        }
        for stop in &stops {
            ensure_finite("colour stop", &stop.colour)?;
            ensure_finite("colour stop", &[stop.position, stop.intensity])?;
        }
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        Ok(Self { stops })
    }

    /// Builds a ramp from parallel lists of colours, positions and intensities
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] when the lists differ in length.
    pub fn from_parts(colours: &[[f32; 4]], positions: &[f32], intensities: &[f32]) -> Result<Self> {
        if colours.len() != positions.len() || colours.len() != intensities.len() {
            return Err(Error::InvalidArgument(format!(
                "colour ramp needs one position and one intensity per colour, got {} colours, {} positions, {} intensities",
                colours.len(),
                positions.len(),
                intensities.len()
            )));
        }
        let stops = colours
            .iter()
            .zip(positions)
            .zip(intensities)
            .map(|((&colour, &position), &intensity)| ColourStop { colour, position, intensity })
            .collect();
        Self::new(stops)
    }

    pub fn stops(&self) -> &[ColourStop] {
        &self.stops
    }
}

/// A node with one input that transforms it pointwise or geometrically
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    /// Folds values around mid-grey: `|2v - 1|`, or `(|2v - 1| + 1) / 2` unless normalised
    Absolute { normalise: bool },
    /// Clamps to `[minimum, maximum]`, optionally stretching that range to `[0, 1]`
    Clamp { minimum: f32, maximum: f32, normalise: bool },
    /// `v * scale + bias`
    ScaleBias { scale: f32, bias: f32 },
    /// Rounds to the nearest multiple of `step`
    Round { step: f32 },
    /// `low` below `boundary`, `high` at or above it
    Step { low: f32, high: f32, boundary: f32 },
    /// `1 - v`
    Invert,
    /// Wraps values at `boundary`, optionally stretching `[0, boundary)` to `[0, 1)`
    Loop { boundary: f32, normalise: bool },
    /// Tints by a colour ramp indexed by the red channel
    Colour(ColourRamp),
    /// Rotates by `angle` radians about `anchor` (fractions of the texture size)
    Rotate { anchor: [f32; 2], angle: f32, edges: EdgeMode },
    /// Scales by `factor` about `anchor`
    Stretch { factor: [f32; 2], anchor: [f32; 2] },
    /// Twists around `anchor`, strongest at the anchor
    Swirl { anchor: [f32; 2], intensity: f32, edges: EdgeMode },
    /// Foreshortens the input as if receding into the distance
    Perspective { x_compression: f32, y_scale: f32, direction: f32 },
    /// Gaussian blur; runs as an image filter rather than a kernel
    Blur { radius: f32 },
    /// Normal map from the red channel; runs as an image filter rather than a kernel
    NormalMap { intensity: f32, smoothing: f32 },
}

impl Modifier {
    pub fn absolute() -> Self {
        Self::Absolute { normalise: false }
    }

    pub fn clamp() -> Self {
        Self::Clamp {
            minimum: 0.0,
            maximum: 1.0,
            normalise: false,
        }
    }

    pub fn scale_bias() -> Self {
        Self::ScaleBias { scale: 1.0, bias: 0.0 }
    }

    pub fn round() -> Self {
        Self::Round { step: 1.0 }
    }

    pub fn step() -> Self {
        Self::Step {
            low: 0.0,
            high: 1.0,
            boundary: 0.5,
        }
    }

    pub fn looped() -> Self {
        Self::Loop { boundary: 0.5, normalise: false }
    }

    pub fn colour(ramp: ColourRamp) -> Self {
        Self::Colour(ramp)
    }

    pub fn rotate() -> Self {
        Self::Rotate {
            anchor: [0.5, 0.5],
            angle: 0.0,
            edges: EdgeMode::Clip,
        }
    }

    pub fn stretch() -> Self {
        Self::Stretch {
            factor: [1.0, 1.0],
            anchor: [0.5, 0.5],
        }
    }

    pub fn swirl() -> Self {
        Self::Swirl {
            anchor: [0.5, 0.5],
            intensity: 0.5,
            edges: EdgeMode::Clip,
        }
    }

    pub fn perspective() -> Self {
        Self::Perspective {
            x_compression: 2.0,
            y_scale: 0.5,
            direction: 0.0,
        }
    }

    pub fn blur() -> Self {
        Self::Blur { radius: 3.0 }
    }

    pub fn normal_map() -> Self {
        Self::NormalMap { intensity: 1.0, smoothing: 0.0 }
    }

    fn values(&self) -> [f32; 4] {
        match *self {
            Self::Absolute { normalise } => [flag(normalise), 0.0, 0.0, 0.0],
            Self::Clamp { minimum, maximum, normalise } => [minimum, maximum, flag(normalise), 0.0],
            Self::ScaleBias { scale, bias } => [scale, bias, 0.0, 0.0],
            Self::Round { step } => [step, 0.0, 0.0, 0.0],
            Self::Step { low, high, boundary } => [low, high, boundary, 0.0],
            Self::Loop { boundary, normalise } => [boundary, flag(normalise), 0.0, 0.0],
            Self::Rotate { anchor, angle, edges } => [anchor[0], anchor[1], angle, flag(edges == EdgeMode::Clip)],
            Self::Stretch { factor, anchor } => [factor[0], factor[1], anchor[0], anchor[1]],
            Self::Swirl { anchor, intensity, edges } => [anchor[0], anchor[1], intensity, flag(edges == EdgeMode::Clip)],
            Self::Perspective { x_compression, y_scale, direction } => [x_compression, y_scale, direction, 0.0],
            Self::Blur { radius } => [radius, 0.0, 0.0, 0.0],
            Self::NormalMap { intensity, smoothing } => [intensity, smoothing, 0.0, 0.0],
            Self::Invert | Self::Colour(_) => [0.0; 4],
        }
    }
}

impl TextureOp for Modifier {
    fn kind(&self) -> Kind {
        Kind::Modifier
    }

    fn compute(&self) -> Compute {
        Compute::Kernel(match self {
            Self::Absolute { .. } => "absolute_modifier",
            Self::Clamp { .. } => "clamp_modifier",
            Self::ScaleBias { .. } => "scale_bias_modifier",
            Self::Round { .. } => "round_modifier",
            Self::Step { .. } => "step_modifier",
            Self::Invert => "invert_modifier",
            Self::Loop { .. } => "loop_modifier",
            Self::Colour(_) => "colour_modifier",
            Self::Rotate { .. } => "rotate_modifier",
            Self::Stretch { .. } => "stretch_modifier",
            Self::Swirl { .. } => "swirl_modifier",
            Self::Perspective { .. } => "perspective_modifier",
            Self::Blur { radius } => return Compute::Filter(ImageFilter::GaussianBlur { sigma: *radius }),
            Self::NormalMap { intensity, smoothing } => {
                return Compute::Filter(ImageFilter::NormalMap {
                    intensity: *intensity,
                    smoothing: *smoothing,
                });
            }
        })
    }

    fn params(&self) -> KernelParams {
        KernelParams::with_values(self.values())
    }

    fn stops(&self) -> Option<Vec<ColourStopData>> {
        let Self::Colour(ramp) = self else {
            return None;
        };
        Some(
            ramp.stops()
                .iter()
                .map(|stop| ColourStopData {
                    colour: stop.colour,
                    position: stop.position,
                    intensity: stop.intensity,
                    _pad: [0.0; 2],
                })
                .collect(),
        )
    }

    fn validate(&self) -> Result<()> {
        ensure_finite("modifier parameters", &self.values())?;
        match *self {
            Self::Clamp { minimum, maximum, .. } => ensure(minimum <= maximum, || format!("clamp minimum {minimum} exceeds maximum {maximum}")),
            Self::Round { step } => ensure(step > 0.0, || format!("round step must be positive, got {step}")),
            Self::Loop { boundary, .. } => ensure(boundary > 0.0, || format!("loop boundary must be positive, got {boundary}")),
            Self::Stretch { factor, .. } => ensure(factor[0] != 0.0 && factor[1] != 0.0, || format!("stretch factor must be non-zero, got {factor:?}")),
            Self::Perspective { y_scale, .. } => ensure(y_scale > 0.0, || format!("perspective y scale must be positive, got {y_scale}")),
            Self::Blur { radius } => ensure(radius >= 0.0, || format!("blur radius must not be negative, got {radius}")),
            Self::NormalMap { smoothing, .. } => ensure(smoothing >= 0.0, || format!("normal map smoothing must not be negative, got {smoothing}")),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colour_ramp_from_parts() {
        let ramp = ColourRamp::from_parts(&[[1.0, 0.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]], &[0.8, 0.2], &[1.0, 0.5]).unwrap();
        // Sorted by position
        assert_eq!(ramp.stops()[0].position, 0.2);
        assert_eq!(ramp.stops()[0].colour, [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(ramp.stops()[1].intensity, 1.0);
    }

    #[test]
    fn test_colour_ramp_mismatched_lengths() {
        let err = ColourRamp::from_parts(&[[1.0; 4], [0.0; 4]], &[0.1, 0.9], &[1.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_ramp_uses_default() {
        let ramp = ColourRamp::new(Vec::new()).unwrap();
        assert_eq!(ramp, ColourRamp::default());
        assert_eq!(Modifier::colour(ramp).stops().unwrap().len(), 1);
    }

    #[test]
    fn test_filters_bypass_kernels() {
        assert_eq!(Modifier::blur().compute(), Compute::Filter(ImageFilter::GaussianBlur { sigma: 3.0 }));
        assert!(matches!(Modifier::normal_map().compute(), Compute::Filter(ImageFilter::NormalMap { .. })));
        assert_eq!(Modifier::Invert.compute(), Compute::Kernel("invert_modifier"));
    }

    #[test]
    fn test_validation() {
        assert!(Modifier::Round { step: 0.0 }.validate().is_err());
        assert!(
            Modifier::Clamp {
                minimum: 0.8,
                maximum: 0.2,
                normalise: false
            }
            .validate()
            .is_err()
        );
        assert!(
            Modifier::Stretch {
                factor: [0.0, 1.0],
                anchor: [0.5, 0.5]
            }
            .validate()
            .is_err()
        );
        assert!(
            Modifier::Perspective {
                x_compression: 2.0,
                y_scale: 0.0,
                direction: 0.0
            }
            .validate()
            .is_err()
        );
        assert!(Modifier::Blur { radius: -1.0 }.validate().is_err());
        assert!(Modifier::Loop { boundary: 0.0, normalise: true }.validate().is_err());
        assert!(Modifier::ScaleBias { scale: f32::NAN, bias: 0.0 }.validate().is_err());
        assert!(Modifier::rotate().validate().is_ok());
    }
}
