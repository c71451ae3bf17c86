//! Hash-based value noise and fractal sums used for turbulence, dart gating
//! and warm-up seeding. Everything here is pure and deterministic.

use eframe::egui::{vec2, Vec2};

pub const TURBULENCE_OCTAVES: u32 = 4;

/// Integer avalanche hash (lowbias32).
#[inline]
pub fn hash_u32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7FEB_352D);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846C_A68B);
    x ^= x >> 16;
    x
}

/// Lattice hash in `[0, 1)`.
#[inline]
pub fn hash3(x: i32, y: i32, z: i32, seed: u32) -> f32 {
    let mut h = hash_u32(seed ^ 0x9E37_79B9);
    h = hash_u32(h ^ x as u32);
    h = hash_u32(h ^ (y as u32).wrapping_mul(0x85EB_CA6B));
    h = hash_u32(h ^ (z as u32).wrapping_mul(0xC2B2_AE35));
    (h >> 8) as f32 / (1u32 << 24) as f32
}

/// Hash of an entry index in `[0, 1)`; `salt` selects independent streams.
#[inline]
pub fn hash_index(index: u32, salt: u32, seed: u32) -> f32 {
    hash3(index as i32, salt as i32, 0, seed)
}

#[inline]
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Trilinear value noise in `[0, 1]`.
pub fn value_noise3(x: f32, y: f32, z: f32, seed: u32) -> f32 {
    let (xf, yf, zf) = (x.floor(), y.floor(), z.floor());
    let (xi, yi, zi) = (xf as i32, yf as i32, zf as i32);
    let (u, v, w) = (smoothstep(x - xf), smoothstep(y - yf), smoothstep(z - zf));

    let corner = |dx: i32, dy: i32, dz: i32| hash3(xi + dx, yi + dy, zi + dz, seed);

    let x00 = lerp(corner(0, 0, 0), corner(1, 0, 0), u);
    let x10 = lerp(corner(0, 1, 0), corner(1, 1, 0), u);
    let x01 = lerp(corner(0, 0, 1), corner(1, 0, 1), u);
    let x11 = lerp(corner(0, 1, 1), corner(1, 1, 1), u);

    lerp(lerp(x00, x10, v), lerp(x01, x11, v), w)
}

/// Fractal sum of value noise, recentred to roughly `[-1, 1]`.
pub fn fbm3(x: f32, y: f32, z: f32, octaves: u32, seed: u32) -> f32 {
    let mut sum = 0.0;
    let mut norm = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;

    for octave in 0..octaves {
        let (fx, fy, fz) = (x * frequency, y * frequency, z * frequency);
        let n = value_noise3(fx, fy, fz, seed.wrapping_add(octave));
        sum += (n * 2.0 - 1.0) * amplitude;
        norm += amplitude;
        amplitude *= 0.5;
        frequency *= 2.03;
    }

    if norm > 0.0 {
        sum / norm
    } else {
        0.0
    }
}

/// Smooth 2D vector field; components in roughly `[-1, 1]`.
pub fn turbulence(p: Vec2, t: f32, seed: u32) -> Vec2 {
    vec2(
        fbm3(p.x, p.y, t, TURBULENCE_OCTAVES, seed),
        fbm3(p.x + 31.416, p.y - 17.231, t + 5.7, TURBULENCE_OCTAVES, seed ^ 0xA53A_9B17),
    )
}
