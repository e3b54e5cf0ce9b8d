//! Per-pixel reference implementations of every library kernel.
//!
//! Each entry mirrors the WGSL entry point of the same name; the functions receive the
//! decoded parameter block, the bound inputs and the output pixel, and return the
//! unclamped colour the kernel would store.

use std::f32::consts::{PI, TAU};

use glam::{UVec2, Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};
use image::RgbaImage;

use super::noise;
use crate::uniforms::{ColourStopData, KernelParams};

const NEUTRAL: f32 = 128.0 / 255.0;
const CLEAR: Vec4 = Vec4::ZERO;
const BLACK: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

/// Everything a pixel function can read
pub(crate) struct KernelArgs<'a> {
    pub params: KernelParams,
    pub stops: Vec<ColourStopData>,
    pub inputs: Vec<&'a RgbaImage>,
    pub dims: UVec2,
}

impl KernelArgs<'_> {
    fn value(&self, row: usize) -> Vec4 {
        Vec4::from_array(self.params.values[row])
    }

    fn input_dims(&self, input: usize) -> UVec2 {
        let image = self.inputs[input];
        UVec2::new(image.width(), image.height())
    }

    /// Texel of an input, transparent black outside its bounds
    fn load(&self, input: usize, texel: UVec2) -> Vec4 {
        let image = self.inputs[input];
        if texel.x >= image.width() || texel.y >= image.height() {
            return CLEAR;
        }
        let pixel = image.get_pixel(texel.x, texel.y).0;
        Vec4::new(pixel[0] as f32, pixel[1] as f32, pixel[2] as f32, pixel[3] as f32) / 255.0
    }

    fn load_transformed(&self, pos: Vec2, cut_edges: bool) -> Vec4 {
        let dims = self.input_dims(0).as_vec2();
        if pos.x < 0.0 || pos.y < 0.0 || pos.x >= dims.x || pos.y >= dims.y {
            return if cut_edges { CLEAR } else { BLACK };
        }
        self.load(0, pos.floor().as_uvec2())
    }
}

pub(crate) type PixelFn = fn(&KernelArgs<'_>, UVec2) -> Vec4;

pub(crate) struct CpuKernel {
    pub name: &'static str,
    pub inputs: usize,
    pub run: PixelFn,
}

macro_rules! kernel_table {
    ($($name:ident: $inputs:expr),* $(,)?) => {
        pub(crate) const CPU_KERNELS: &[CpuKernel] = &[
            $(CpuKernel { name: stringify!($name), inputs: $inputs, run: $name },)*
        ];
    };
}

kernel_table! {
    simplex_generator: 2,
    billow_generator: 2,
    ridged_multi_generator: 2,
    voronoi_generator: 2,
    wave_generator: 2,
    checker_generator: 2,
    sphere_generator: 2,
    linear_gradient_generator: 2,
    radial_gradient_generator: 2,
    box_gradient_generator: 2,
    constant_generator: 2,
    absolute_modifier: 1,
    clamp_modifier: 1,
    scale_bias_modifier: 1,
    round_modifier: 1,
    step_modifier: 1,
    invert_modifier: 1,
    loop_modifier: 1,
    rotate_modifier: 1,
    stretch_modifier: 1,
    swirl_modifier: 1,
    perspective_modifier: 1,
    colour_modifier: 1,
    scale_canvas: 1,
    add_combiner: 2,
    subtract_combiner: 2,
    multiply_combiner: 2,
    divide_combiner: 2,
    power_combiner: 2,
    min_combiner: 2,
    max_combiner: 2,
    blend_selector: 3,
    select_selector: 3,
}

fn grey(value: f32) -> Vec4 {
    Vec3::splat(value).extend(1.0)
}

fn with_alpha(rgb: Vec3, source: Vec4) -> Vec4 {
    rgb.extend(source.w)
}

fn rotate2(d: Vec2, angle: f32) -> Vec2 {
    let (s, c) = angle.sin_cos();
    Vec2::new(d.x * c - d.y * s, d.x * s + d.y * c)
}

// Generators

struct SlicePoint {
    uv: Vec2,
    p: Vec3,
}

fn displacement(args: &KernelArgs<'_>, input: usize, uv: Vec2) -> f32 {
    let dims = args.input_dims(input);
    let texel = (uv * dims.as_vec2()).as_uvec2().min(dims - 1);
    (args.load(input, texel).x - NEUTRAL) * args.params.offset_strength
}

fn rotate_slice(args: &KernelArgs<'_>, p: Vec3) -> Vec3 {
    let rotation = Vec3::from_array(args.params.rotation);
    let c = Vec3::new(rotation.x.cos(), rotation.y.cos(), rotation.z.cos());
    let s = Vec3::new(rotation.x.sin(), rotation.y.sin(), rotation.z.sin());
    let q = Vec3::new(p.x, p.y * c.x - p.z * s.x, p.y * s.x + p.z * c.x);
    let q = Vec3::new(q.x * c.y + q.z * s.y, q.y, q.z * c.y - q.x * s.y);
    Vec3::new(q.x * c.z - q.y * s.z, q.x * s.z + q.y * c.z, q.z)
}

fn slice_at(args: &KernelArgs<'_>, gid: UVec2) -> SlicePoint {
    let centre = (gid.as_vec2() + 0.5) / args.dims.as_vec2();
    let uv = centre + Vec2::new(displacement(args, 0, centre), displacement(args, 1, centre));
    SlicePoint { uv, p: rotate_slice(args, (uv - 0.5).extend(0.0)) }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Family {
    Simplex,
    Billow,
    Ridged,
    Voronoi,
}

fn noise3(v: Vec3, cellular: bool) -> f32 {
    if cellular { noise::cellular3(v) } else { noise::simplex3(v) }
}

fn noise4(v: Vec4, cellular: bool) -> f32 {
    if cellular { noise::cellular4(v) } else { noise::simplex4(v) }
}

// Sphere mapping wins over seamless tiling, which wins over 4D.
fn sample_noise(args: &KernelArgs<'_>, at: &SlicePoint, frequency: f32, cellular: bool) -> f32 {
    let origin = args.value(0);
    let flags = args.value(2);
    if flags.y > 0.5 {
        let lon = at.uv.x * TAU;
        let lat = (at.uv.y - 0.5) * PI;
        let q = Vec3::new(lat.cos() * lon.cos(), lat.sin(), lat.cos() * lon.sin()) * (frequency / TAU);
        return noise3(q + origin.xyz(), cellular);
    }
    if flags.z > 0.5 {
        let a = at.uv * TAU;
        let q = Vec4::new(a.x.cos(), a.x.sin(), a.y.cos(), a.y.sin()) * (frequency / TAU);
        return noise4(q + origin, cellular);
    }
    if flags.x > 0.5 {
        return noise4((at.p * frequency).extend(0.0) + origin, cellular);
    }
    noise3(at.p * frequency + origin.xyz(), cellular)
}

fn fractal(args: &KernelArgs<'_>, gid: UVec2, family: Family) -> Vec4 {
    let at = slice_at(args, gid);
    let settings = args.value(1);
    let octaves = settings.x as u32;

    let mut frequency = settings.z;
    let mut amplitude = 1.0;
    let mut sum = 0.0;
    let mut total = 0.0;
    for _ in 0..octaves {
        let mut n = sample_noise(args, &at, frequency, family == Family::Voronoi);
        match family {
            Family::Billow => n = n.abs() * 2.0 - 1.0,
            Family::Ridged => {
                let ridge = 1.0 - n.abs();
                n = ridge * ridge * 2.0 - 1.0;
            }
            Family::Simplex | Family::Voronoi => {}
        }
        sum += n * amplitude;
        total += amplitude;
        amplitude *= settings.y;
        frequency *= settings.w;
    }

    let value = if total > 0.0 { sum / total } else { 0.0 };
    grey(value * 0.5 + 0.5)
}

fn simplex_generator(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    fractal(args, gid, Family::Simplex)
}

fn billow_generator(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    fractal(args, gid, Family::Billow)
}

fn ridged_multi_generator(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    fractal(args, gid, Family::Ridged)
}

fn voronoi_generator(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    fractal(args, gid, Family::Voronoi)
}

fn wave_generator(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let at = slice_at(args, gid);
    grey(0.5 + 0.5 * (TAU * args.value(0).x * at.p.x).sin())
}

fn checker_generator(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let at = slice_at(args, gid);
    let settings = args.value(0);
    let cell = ((at.p + Vec3::new(0.0, 0.0, settings.y)) * settings.x).floor().as_ivec3();
    let parity = (cell.x + cell.y + cell.z) & 1;
    grey(if parity == 0 { 1.0 } else { 0.0 })
}

fn sphere_generator(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let at = slice_at(args, gid);
    let settings = args.value(0);
    let centre = args.value(1).xy() - 0.5;
    let rel = (at.p.xy() - centre).extend(at.p.z + settings.z);
    grey(0.5 + 0.5 * (TAU * (rel.length() * settings.x - settings.y)).cos())
}

fn linear_gradient_generator(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let g = slice_at(args, gid).p.xy() + 0.5;
    let start = args.value(0).xy();
    let direction = args.value(0).zw() - start;
    let length2 = direction.dot(direction);
    grey(if length2 > 0.0 { (g - start).dot(direction) / length2 } else { 0.0 })
}

fn radial_gradient_generator(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let g = slice_at(args, gid).p.xy() + 0.5;
    let settings = args.value(0);
    grey(1.0 - ((g - settings.xy()) * settings.zw() * 2.0).length())
}

fn box_gradient_generator(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let g = slice_at(args, gid).p.xy() + 0.5;
    let edge = g.min(1.0 - g);
    let ramp = (edge * 2.0 * (1.0 + args.value(0).xy())).clamp(Vec2::ZERO, Vec2::ONE);
    grey(ramp.x.min(ramp.y))
}

fn constant_generator(args: &KernelArgs<'_>, _gid: UVec2) -> Vec4 {
    args.value(0)
}

// Modifiers

fn absolute_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let c = args.load(0, gid);
    let mut n = (c.xyz() * 2.0 - 1.0).abs();
    if args.value(0).x <= 0.5 {
        n = (n + 1.0) * 0.5;
    }
    with_alpha(n, c)
}

fn clamp_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let settings = args.value(0);
    let c = args.load(0, gid);
    let mut v = c.xyz().clamp(Vec3::splat(settings.x), Vec3::splat(settings.y));
    if settings.z > 0.5 {
        let range = settings.y - settings.x;
        v = if range > 0.0 { (v - settings.x) / range } else { Vec3::ZERO };
    }
    with_alpha(v, c)
}

fn scale_bias_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let c = args.load(0, gid);
    with_alpha(c.xyz() * args.value(0).x + args.value(0).y, c)
}

fn round_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let c = args.load(0, gid);
    let step = args.value(0).x;
    with_alpha((c.xyz() / step + 0.5).floor() * step, c)
}

fn step_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let settings = args.value(0);
    let c = args.load(0, gid);
    let v = Vec3::select(c.xyz().cmpge(Vec3::splat(settings.z)), Vec3::splat(settings.y), Vec3::splat(settings.x));
    with_alpha(v, c)
}

fn invert_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let c = args.load(0, gid);
    with_alpha(1.0 - c.xyz(), c)
}

fn loop_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let boundary = args.value(0).x;
    let c = args.load(0, gid);
    let mut v = c.xyz() - boundary * (c.xyz() / boundary).floor();
    if args.value(0).y > 0.5 {
        v /= boundary;
    }
    with_alpha(v, c)
}

fn rotate_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let settings = args.value(0);
    let anchor = settings.xy() * args.dims.as_vec2();
    let pos = gid.as_vec2() + 0.5;
    args.load_transformed(anchor + rotate2(pos - anchor, -settings.z), settings.w > 0.5)
}

fn stretch_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let settings = args.value(0);
    let anchor = settings.zw() * args.dims.as_vec2();
    let pos = gid.as_vec2() + 0.5;
    args.load_transformed(anchor + (pos - anchor) / settings.xy(), true)
}

fn swirl_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let settings = args.value(0);
    let size = args.dims.as_vec2();
    let anchor = settings.xy() * size;
    let d = gid.as_vec2() + 0.5 - anchor;
    let radius = (d / size).length();
    let angle = settings.z * TAU * (0.5 - radius).max(0.0) * 2.0;
    args.load_transformed(anchor + rotate2(d, -angle), settings.w > 0.5)
}

fn perspective_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let settings = args.value(0);
    let size = args.dims.as_vec2();
    let uv = (gid.as_vec2() + 0.5) / size;
    let depth = (1.0 - uv.y) / settings.y;
    let squeeze = 1.0 + settings.x * depth;
    let source = Vec2::new(0.5 + (uv.x - 0.5) * squeeze - settings.z * depth, 1.0 - depth);
    args.load_transformed(source * size, true)
}

fn colour_modifier(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let c = args.load(0, gid);
    let stops = &args.stops;
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return c;
    };

    let v = c.x;
    let mut tint = Vec4::from_array(first.colour);
    let mut intensity = first.intensity;
    if v >= last.position {
        tint = Vec4::from_array(last.colour);
        intensity = last.intensity;
    } else if v > first.position {
        if let Some(i) = (1..stops.len()).find(|&i| v <= stops[i].position) {
            let (lower, upper) = (&stops[i - 1], &stops[i]);
            let span = upper.position - lower.position;
            let t = if span > 0.0 { (v - lower.position) / span } else { 1.0 };
            tint = Vec4::from_array(lower.colour).lerp(Vec4::from_array(upper.colour), t);
            intensity = lower.intensity + (upper.intensity - lower.intensity) * t;
        }
    }

    with_alpha(c.xyz().lerp(tint.xyz(), intensity), c)
}

fn scale_canvas(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let settings = args.value(0);
    let origin = settings.xy() * args.dims.as_vec2();
    let local = (gid.as_vec2() + 0.5 - origin) / settings.zw();
    let input_size = args.input_dims(0).as_vec2();
    if local.cmpge(Vec2::ZERO).all() && local.cmplt(input_size).all() {
        args.load(0, local.floor().as_uvec2())
    } else {
        CLEAR
    }
}

// Combiners

fn pair(args: &KernelArgs<'_>, gid: UVec2) -> (Vec4, Vec4) {
    (args.load(0, gid), args.load(1, gid))
}

fn arithmetic(a: Vec4, b: Vec4, rgb: Vec3) -> Vec4 {
    rgb.extend(a.w.max(b.w))
}

fn luminance(c: Vec4) -> f32 {
    (c.x + c.y + c.z) / 3.0
}

fn add_combiner(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let (a, b) = pair(args, gid);
    let mut rgb = a.xyz() + b.xyz();
    if args.value(0).x > 0.5 {
        rgb *= 0.5;
    }
    arithmetic(a, b, rgb)
}

fn subtract_combiner(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let (a, b) = pair(args, gid);
    arithmetic(a, b, a.xyz() - b.xyz())
}

fn multiply_combiner(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let (a, b) = pair(args, gid);
    arithmetic(a, b, a.xyz() * b.xyz())
}

fn divide_channel(a: f32, b: f32) -> f32 {
    if b == 0.0 {
        if a > 0.0 { 1.0 } else { 0.0 }
    } else {
        a / b
    }
}

fn divide_combiner(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let (a, b) = pair(args, gid);
    let rgb = Vec3::new(divide_channel(a.x, b.x), divide_channel(a.y, b.y), divide_channel(a.z, b.z));
    arithmetic(a, b, rgb)
}

fn power_channel(a: f32, b: f32) -> f32 {
    if a == 0.0 {
        if b == 0.0 { 1.0 } else { 0.0 }
    } else {
        a.powf(b)
    }
}

fn power_combiner(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let (a, b) = pair(args, gid);
    let rgb = Vec3::new(power_channel(a.x, b.x), power_channel(a.y, b.y), power_channel(a.z, b.z));
    arithmetic(a, b, rgb)
}

fn min_combiner(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let (a, b) = pair(args, gid);
    if luminance(a) <= luminance(b) { a } else { b }
}

fn max_combiner(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let (a, b) = pair(args, gid);
    if luminance(a) >= luminance(b) { a } else { b }
}

// Selectors

fn blend_selector(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let (a, b) = pair(args, gid);
    a.lerp(b, args.load(2, gid).x)
}

fn select_selector(args: &KernelArgs<'_>, gid: UVec2) -> Vec4 {
    let (a, b) = pair(args, gid);
    let s = args.load(2, gid).x;
    let boundary = args.value(0).x;
    let transition = args.value(0).y;
    if transition <= 0.0 {
        return if s >= boundary { b } else { a };
    }
    let lower = boundary - transition * 0.5;
    a.lerp(b, ((s - lower) / transition).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn find(name: &str) -> Option<&'static CpuKernel> {
        CPU_KERNELS.iter().find(|kernel| kernel.name == name)
    }

    #[test]
    fn test_table_matches_library_kernels() {
        assert_eq!(CPU_KERNELS.len(), crate::kernels::KERNELS.len());
        for source in crate::kernels::KERNELS {
            let kernel = find(source.name).unwrap_or_else(|| panic!("no CPU kernel for {}", source.name));
            assert_eq!(kernel.inputs, source.inputs as usize, "{}", source.name);
        }
        let names: HashSet<_> = CPU_KERNELS.iter().map(|kernel| kernel.name).collect();
        assert_eq!(names.len(), CPU_KERNELS.len());
    }

    #[test]
    fn test_divide_and_power_edge_cases() {
        assert_eq!(divide_channel(0.5, 0.0), 1.0);
        assert_eq!(divide_channel(0.0, 0.0), 0.0);
        assert_eq!(divide_channel(0.2, 0.4), 0.5);
        assert_eq!(power_channel(0.0, 0.0), 1.0);
        assert_eq!(power_channel(0.0, 0.5), 0.0);
        assert!((power_channel(0.25, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_rotate2_quarter_turn() {
        let r = rotate2(Vec2::X, std::f32::consts::FRAC_PI_2);
        assert!((r - Vec2::Y).length() < 1e-6);
    }
}
