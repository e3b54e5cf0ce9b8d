//! Hash-based gradient and cellular noise.
//!
//! Same arithmetic as `wgsl/generators.wgsl`: a lowbias32 integer hash seeds bit-trick
//! gradients (no permutation tables), so the CPU and GPU backends agree up to float
//! rounding.

use glam::{IVec3, IVec4, Vec3, Vec4};

const F3: f32 = 1.0 / 3.0;
const G3: f32 = 1.0 / 6.0;
const F4: f32 = 0.309016994;
const G4: f32 = 0.138196601;

pub fn hash(x: u32) -> u32 {
    let mut h = x;
    h ^= h >> 16;
    h = h.wrapping_mul(0x7feb352d);
    h ^= h >> 15;
    h = h.wrapping_mul(0x846ca68b);
    h ^= h >> 16;
    h
}

fn hash3(c: IVec3) -> u32 {
    hash(c.x as u32 ^ hash(c.y as u32 ^ hash(c.z as u32)))
}

fn hash4(c: IVec4) -> u32 {
    hash(c.x as u32 ^ hash(c.y as u32 ^ hash(c.z as u32 ^ hash(c.w as u32))))
}

fn signed(value: f32, negate: bool) -> f32 {
    if negate { -value } else { value }
}

fn grad3(hashed: u32, d: Vec3) -> f32 {
    let h = hashed & 15;
    let u = if h < 8 { d.x } else { d.y };
    let v = if h < 4 {
        d.y
    } else if h == 12 || h == 14 {
        d.x
    } else {
        d.z
    };
    signed(u, h & 1 != 0) + signed(v, h & 2 != 0)
}

fn grad4(hashed: u32, d: Vec4) -> f32 {
    let h = hashed & 31;
    let u = if h < 24 { d.x } else { d.y };
    let v = if h < 16 { d.y } else { d.z };
    let w = if h < 8 { d.z } else { d.w };
    signed(u, h & 1 != 0) + signed(v, h & 2 != 0) + signed(w, h & 4 != 0)
}

fn corner3(d: Vec3, h: u32) -> f32 {
    let t = 0.6 - d.dot(d);
    if t <= 0.0 {
        return 0.0;
    }
    let t2 = t * t;
    t2 * t2 * grad3(h, d)
}

fn corner4(d: Vec4, h: u32) -> f32 {
    let t = 0.6 - d.dot(d);
    if t <= 0.0 {
        return 0.0;
    }
    let t2 = t * t;
    t2 * t2 * grad4(h, d)
}

/// 3D simplex noise in roughly `[-1, 1]`
pub fn simplex3(v: Vec3) -> f32 {
    let s = (v.x + v.y + v.z) * F3;
    let i = (v + s).floor();
    let t = (i.x + i.y + i.z) * G3;
    let x0 = v - (i - t);

    let (i1, i2) = if x0.x >= x0.y {
        if x0.y >= x0.z {
            (Vec3::X, Vec3::new(1.0, 1.0, 0.0))
        } else if x0.x >= x0.z {
            (Vec3::X, Vec3::new(1.0, 0.0, 1.0))
        } else {
            (Vec3::Z, Vec3::new(1.0, 0.0, 1.0))
        }
    } else if x0.y < x0.z {
        (Vec3::Z, Vec3::new(0.0, 1.0, 1.0))
    } else if x0.x < x0.z {
        (Vec3::Y, Vec3::new(0.0, 1.0, 1.0))
    } else {
        (Vec3::Y, Vec3::new(1.0, 1.0, 0.0))
    };

    let c = i.as_ivec3();
    let n = corner3(x0, hash3(c))
        + corner3(x0 - i1 + G3, hash3(c + i1.as_ivec3()))
        + corner3(x0 - i2 + 2.0 * G3, hash3(c + i2.as_ivec3()))
        + corner3(x0 - 1.0 + 3.0 * G3, hash3(c + IVec3::ONE));
    32.0 * n
}

fn at_least(rank: Vec4, edge: f32) -> Vec4 {
    Vec4::select(rank.cmpge(Vec4::splat(edge)), Vec4::ONE, Vec4::ZERO)
}

/// 4D simplex noise in roughly `[-1, 1]`
pub fn simplex4(v: Vec4) -> f32 {
    let s = (v.x + v.y + v.z + v.w) * F4;
    let i = (v + s).floor();
    let t = (i.x + i.y + i.z + i.w) * G4;
    let x0 = v - (i - t);

    // Magnitude ordering picks the simplex containing the point
    let mut rank = Vec4::ZERO;
    for (a, b) in [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)] {
        if x0[a] > x0[b] {
            rank[a] += 1.0;
        } else {
            rank[b] += 1.0;
        }
    }
    let i1 = at_least(rank, 3.0);
    let i2 = at_least(rank, 2.0);
    let i3 = at_least(rank, 1.0);

    let c = i.as_ivec4();
    let n = corner4(x0, hash4(c))
        + corner4(x0 - i1 + G4, hash4(c + i1.as_ivec4()))
        + corner4(x0 - i2 + 2.0 * G4, hash4(c + i2.as_ivec4()))
        + corner4(x0 - i3 + 3.0 * G4, hash4(c + i3.as_ivec4()))
        + corner4(x0 - 1.0 + 4.0 * G4, hash4(c + IVec4::ONE));
    27.0 * n
}

fn jitter3(h: u32) -> Vec3 {
    Vec3::new((h & 1023) as f32, ((h >> 10) & 1023) as f32, ((h >> 20) & 1023) as f32) / 1023.0
}

fn cellular_value(best: f32) -> f32 {
    best.sqrt().clamp(0.0, 1.0) * 2.0 - 1.0
}

/// Distance to the nearest jittered feature point, remapped to `[-1, 1]`
pub fn cellular3(v: Vec3) -> f32 {
    let cell = v.floor();
    let f = v - cell;
    let c = cell.as_ivec3();
    let mut best = 8.0_f32;
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let offset = IVec3::new(dx, dy, dz);
                let r = offset.as_vec3() + jitter3(hash3(c + offset)) - f;
                best = best.min(r.dot(r));
            }
        }
    }
    cellular_value(best)
}

pub fn cellular4(v: Vec4) -> f32 {
    let cell = v.floor();
    let f = v - cell;
    let c = cell.as_ivec4();
    let mut best = 8.0_f32;
    for dw in -1..=1 {
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let offset = IVec4::new(dx, dy, dz, dw);
                    let h = hash4(c + offset);
                    let jitter = jitter3(h).extend((hash(h) & 1023) as f32 / 1023.0);
                    let r = offset.as_vec4() + jitter - f;
                    best = best.min(r.dot(r));
                }
            }
        }
    }
    cellular_value(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(step: f32) -> impl Iterator<Item = Vec3> {
        (0..12).flat_map(move |x| (0..12).map(move |y| Vec3::new(x as f32 * step - 3.1, y as f32 * step + 0.7, 0.37)))
    }

    #[test]
    fn test_hash_is_deterministic_and_mixes() {
        assert_eq!(hash(12345), hash(12345));
        assert_ne!(hash(0), hash(1));
        assert_ne!(hash3(IVec3::new(1, 2, 3)), hash3(IVec3::new(3, 2, 1)));
    }

    #[test]
    fn test_simplex_range() {
        let values: Vec<f32> = grid(0.37).map(simplex3).collect();
        assert!(values.iter().all(|v| (-1.05..=1.05).contains(v)));
        // Not degenerate
        let spread = values.iter().cloned().fold(f32::MIN, f32::max) - values.iter().cloned().fold(f32::MAX, f32::min);
        assert!(spread > 0.5, "spread {spread}");

        let values4: Vec<f32> = grid(0.37).map(|p| simplex4(p.extend(1.5))).collect();
        assert!(values4.iter().all(|v| (-1.05..=1.05).contains(v)));
    }

    #[test]
    fn test_simplex_vanishes_on_lattice() {
        // Every corner contribution is zero at an integer lattice point
        assert_eq!(simplex3(Vec3::ZERO), 0.0);
        assert_eq!(simplex4(Vec4::ZERO), 0.0);
    }

    #[test]
    fn test_cellular_range() {
        for p in grid(0.53) {
            let v = cellular3(p);
            assert!((-1.0..=1.0).contains(&v));
            let v4 = cellular4(p.extend(-0.4));
            assert!((-1.0..=1.0).contains(&v4));
        }
    }
}
