use super::{Compute, DEFAULT_SIZE, Kind, TextureOp, ensure, ensure_finite, ensure_size};
use crate::{
    Result,
    uniforms::{KernelParams, flag},
};

/// Highest octave count a coherent generator accepts
pub const MAX_OCTAVES: u32 = 16;

/// Fractal summation settings shared by the coherent-noise generators
///
/// Octave `o` samples the noise at `frequency * lacunarity^o` and weighs it by
/// `persistence^o`; the sum is normalised by the total weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coherent {
    /// Number of summed layers (1 to 16)
    pub octaves: u32,
    /// Amplitude multiplier between octaves
    pub persistence: f32,
    /// Frequency of the first octave
    pub frequency: f32,
    /// Frequency multiplier between octaves
    pub lacunarity: f32,
    /// Offset of the noise domain; moving it slides or animates the texture
    pub origin: [f32; 4],
    /// Sample 4D noise, using `origin[3]` as the fourth coordinate
    pub use_4d: bool,
    /// Warp the texture to wrap a UV sphere; ignores rotation
    pub sphere_map: bool,
    /// Make the texture tile seamlessly; ignores rotation
    pub seamless: bool,
}

impl Default for Coherent {
    fn default() -> Self {
        Self {
            octaves: 6,
            persistence: 0.5,
            frequency: 1.0,
            lacunarity: 2.0,
            origin: [1.0; 4],
            use_4d: false,
            sphere_map: false,
            seamless: false,
        }
    }
}

/// The function a generator samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeneratorFunction {
    /// Fractal simplex noise
    Simplex(Coherent),
    /// Fractal simplex noise with each octave folded to `2|n| - 1`
    Billow(Coherent),
    /// Fractal simplex noise with each octave turned into a ridge, `2(1 - |n|)^2 - 1`
    RidgedMulti(Coherent),
    /// Fractal cellular noise (distance to the nearest feature point)
    Voronoi(Coherent),
    /// Parallel sine bands along x
    Wave { frequency: f32 },
    /// Slice through a field of alternating cubes
    Checker { frequency: f32, z: f32 },
    /// Slice through concentric spheres around `centre`
    Sphere { frequency: f32, offset: f32, centre: [f32; 2], z: f32 },
    /// Ramp from `start` (black) to `end` (white)
    LinearGradient { start: [f32; 2], end: [f32; 2] },
    /// Bright at `centre`, fading to black; a falloff of 1 reaches black at the edges
    RadialGradient { centre: [f32; 2], falloff: [f32; 2] },
    /// Black at the four edges, ramping to white; a falloff of 0 peaks at the centre
    BoxGradient { falloff: [f32; 2] },
    /// A single colour
    Constant { colour: [f32; 4] },
}

impl GeneratorFunction {
    pub fn simplex() -> Self {
        Self::Simplex(Coherent::default())
    }

    pub fn billow() -> Self {
        Self::Billow(Coherent::default())
    }

    pub fn ridged_multi() -> Self {
        Self::RidgedMulti(Coherent::default())
    }

    pub fn voronoi() -> Self {
        Self::Voronoi(Coherent::default())
    }

    pub fn wave() -> Self {
        Self::Wave { frequency: 1.0 }
    }

    pub fn checker() -> Self {
        Self::Checker { frequency: 1.0, z: 0.0 }
    }

    pub fn sphere() -> Self {
        Self::Sphere {
            frequency: 1.0,
            offset: 0.0,
            centre: [0.5, 0.5],
            z: 0.0,
        }
    }

    pub fn linear_gradient() -> Self {
        Self::LinearGradient { start: [0.0, 0.0], end: [1.0, 1.0] }
    }

    pub fn radial_gradient() -> Self {
        Self::RadialGradient {
            centre: [0.5, 0.5],
            falloff: [1.0, 1.0],
        }
    }

    pub fn box_gradient() -> Self {
        Self::BoxGradient { falloff: [0.0, 0.0] }
    }

    pub fn constant() -> Self {
        Self::Constant { colour: [0.5, 0.5, 0.5, 1.0] }
    }

    /// Fractal settings of the coherent-noise functions
    pub fn coherent(&self) -> Option<&Coherent> {
        match self {
            Self::Simplex(c) | Self::Billow(c) | Self::RidgedMulti(c) | Self::Voronoi(c) => Some(c),
            _ => None,
        }
    }

    pub fn coherent_mut(&mut self) -> Option<&mut Coherent> {
        match self {
            Self::Simplex(c) | Self::Billow(c) | Self::RidgedMulti(c) | Self::Voronoi(c) => Some(c),
            _ => None,
        }
    }

    pub fn kernel_name(&self) -> &'static str {
        match self {
            Self::Simplex(_) => "simplex_generator",
            Self::Billow(_) => "billow_generator",
            Self::RidgedMulti(_) => "ridged_multi_generator",
            Self::Voronoi(_) => "voronoi_generator",
            Self::Wave { .. } => "wave_generator",
            Self::Checker { .. } => "checker_generator",
            Self::Sphere { .. } => "sphere_generator",
            Self::LinearGradient { .. } => "linear_gradient_generator",
            Self::RadialGradient { .. } => "radial_gradient_generator",
            Self::BoxGradient { .. } => "box_gradient_generator",
            Self::Constant { .. } => "constant_generator",
        }
    }

    fn values(&self) -> [[f32; 4]; 3] {
        let zero = [0.0; 4];
        match *self {
            Self::Simplex(c) | Self::Billow(c) | Self::RidgedMulti(c) | Self::Voronoi(c) => [
                c.origin,
                [c.octaves as f32, c.persistence, c.frequency, c.lacunarity],
                [flag(c.use_4d), flag(c.sphere_map), flag(c.seamless), 0.0],
            ],
            Self::Wave { frequency } => [[frequency, 0.0, 0.0, 0.0], zero, zero],
            Self::Checker { frequency, z } => [[frequency, z, 0.0, 0.0], zero, zero],
            Self::Sphere { frequency, offset, centre, z } => [[frequency, offset, z, 0.0], [centre[0], centre[1], 0.0, 0.0], zero],
            Self::LinearGradient { start, end } => [[start[0], start[1], end[0], end[1]], zero, zero],
            Self::RadialGradient { centre, falloff } => [[centre[0], centre[1], falloff[0], falloff[1]], zero, zero],
            Self::BoxGradient { falloff } => [[falloff[0], falloff[1], 0.0, 0.0], zero, zero],
            Self::Constant { colour } => [colour, zero, zero],
        }
    }
}

/// A node with no required inputs that renders a function over a 2D slice
///
/// The optional [`super::Port::OffsetX`] and [`super::Port::OffsetY`] inputs displace the
/// sample point by `(red - 0.5) * offset_strength`; an unconnected port reads as mid-grey,
/// which is no displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Generator {
    pub function: GeneratorFunction,
    pub width: u32,
    pub height: u32,
    /// Rotation of the slice about x, y and z, in radians
    pub rotation: [f32; 3],
    pub offset_strength: f32,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new(GeneratorFunction::simplex())
    }
}

impl Generator {
    pub fn new(function: GeneratorFunction) -> Self {
        Self {
            function,
            width: DEFAULT_SIZE.0,
            height: DEFAULT_SIZE.1,
            rotation: [0.0; 3],
            offset_strength: 0.2,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

impl TextureOp for Generator {
    fn kind(&self) -> Kind {
        Kind::Generator
    }

    fn compute(&self) -> Compute {
        Compute::Kernel(self.function.kernel_name())
    }

    fn params(&self) -> KernelParams {
        KernelParams {
            rotation: self.rotation,
            offset_strength: self.offset_strength,
            values: self.function.values(),
        }
    }

    fn explicit_size(&self) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }

    fn validate(&self) -> Result<()> {
        ensure_size("generator", self.width, self.height)?;
        ensure_finite("rotation", &self.rotation)?;
        ensure_finite("offset strength", &[self.offset_strength])?;
        if let Some(c) = self.function.coherent() {
            ensure((1..=MAX_OCTAVES).contains(&c.octaves), || format!("octaves must be between 1 and {MAX_OCTAVES}, got {}", c.octaves))?;
            ensure_finite("coherent noise settings", &[c.persistence, c.frequency, c.lacunarity])?;
            ensure_finite("origin", &c.origin)?;
        }
        self.function.values().iter().try_for_each(|row| ensure_finite("generator parameters", row))
    }
}
