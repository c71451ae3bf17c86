//! Shading, particle splatting and trail accumulation.
//!
//! Each mode's body is shaded with that mode's own table row and the two
//! finished colours are mixed by the blend factor (shade, then blend). The
//! per-frame contribution is folded into the accumulation buffer and the
//! result is tone mapped for display.

use std::f32::consts::TAU;

use eframe::egui::{vec2, Vec2};
use rayon::prelude::*;
use tracing::info;

use crate::field::{self, Particle, MAX_SPEED};
use crate::frame::{FrameContext, Viewport};
use crate::mode_table;
use crate::types::{lerp_rgb, Mode, ModeParams, Rgb};

/// Frames for which the accumulation buffer is held at black.
pub const ACCUM_WARMUP_FRAMES: u64 = 6;

const BLACK: Rgb = [0.0; 3];
const SPLAT_GAIN: f32 = 0.35;
const EDGE_SOFTNESS: f32 = 0.012;

/// Persistent trail image, decayed by `trail_fade` every frame.
pub struct AccumulationBuffer {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl AccumulationBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![BLACK; width * height],
        }
    }

    pub fn dimensions(&self) -> [usize; 2] {
        [self.width, self.height]
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    pub fn clear(&mut self) {
        self.pixels.fill(BLACK);
    }

    /// `accum = (contribution + accum) * fade`.
    pub fn accumulate(&mut self, contribution: &[Rgb], fade: f32) {
        self.pixels
            .par_iter_mut()
            .zip(contribution.par_iter())
            .for_each(|(acc, add)| {
                for c in 0..3 {
                    acc[c] = (add[c] + acc[c]) * fade;
                }
            });
    }
}

pub struct Compositor {
    viewport: Viewport,
    accum: AccumulationBuffer,
    contribution: Vec<Rgb>,
    display: Vec<Rgb>,
}

impl Compositor {
    pub fn new(width: usize, height: usize) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self {
            viewport: Viewport::new(width, height),
            accum: AccumulationBuffer::new(width, height),
            contribution: vec![BLACK; width * height],
            display: vec![BLACK; width * height],
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn dimensions(&self) -> [usize; 2] {
        self.accum.dimensions()
    }

    pub fn accumulation(&self) -> &AccumulationBuffer {
        &self.accum
    }

    /// Tone-mapped colours of the last rendered frame, each channel in `[0, 1]`.
    pub fn display(&self) -> &[Rgb] {
        &self.display
    }

    /// Reallocates every image buffer for a new surface size. Trails restart
    /// from black.
    pub fn resize(&mut self, width: usize, height: usize) {
        let (width, height) = (width.max(1), height.max(1));
        if self.dimensions() == [width, height] {
            return;
        }
        info!(width, height, "reallocating compositor buffers");
        *self = Self::new(width, height);
    }

    pub fn render(&mut self, field: &[Particle], ctx: &FrameContext) -> &[Rgb] {
        if ctx.frame_index < ACCUM_WARMUP_FRAMES {
            self.accum.clear();
            self.display.fill(BLACK);
            return &self.display;
        }

        let viewport = self.viewport;
        let center = field::swarm_center(field);
        let width = viewport.width;

        self.contribution
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let p = viewport.pixel_to_field(x as f32 + 0.5, y as f32 + 0.5);
                    *out = style_color(ctx, p - center);
                }
            });

        splat_particles(&mut self.contribution, viewport, field, ctx);

        let params = &ctx.params;
        let weight = 1.0 - params.trail_fade;
        self.contribution
            .par_iter_mut()
            .for_each(|c| *c = c.map(|v| v * weight));
        self.accum.accumulate(&self.contribution, params.trail_fade);

        let exposure = 0.5 + params.glow_intensity;
        self.display
            .par_iter_mut()
            .zip(self.accum.pixels().par_iter())
            .for_each(|(out, acc)| *out = tone_map(*acc, exposure));

        &self.display
    }
}

/// Reinhard-style `c / (c + 1)` compression, clamped to display range.
#[inline]
pub fn tone_map(color: Rgb, exposure: f32) -> Rgb {
    color.map(|c| {
        let c = (c * exposure).max(0.0);
        (c / (c + 1.0)).clamp(0.0, 1.0)
    })
}

/// Final body colour at `rel` (field position relative to the swarm center):
/// both modes are shaded independently, then mixed by the blend factor.
pub fn style_color(ctx: &FrameContext, rel: Vec2) -> Rgb {
    let current = shade_mode(ctx.current_mode, ctx, rel);
    if ctx.current_mode == ctx.target_mode {
        return current;
    }
    let target = shade_mode(ctx.target_mode, ctx, rel);
    lerp_rgb(current, target, ctx.blend_factor)
}

/// Shades the body of a single mode using only that mode's table row.
pub fn shade_mode(mode: Mode, ctx: &FrameContext, rel: Vec2) -> Rgb {
    let row = mode_table::params(mode);
    let t = ctx.time;
    let breath = 1.0 + 0.06 * (TAU * row.pulse_rate * t).sin();
    let radius = row.body_radius * ctx.scale * breath;

    let d = body_distance(mode, row, rel, radius, t);
    let core = smoothstep(EDGE_SOFTNESS, -EDGE_SOFTNESS, d);
    let halo = (-d.max(0.0) / (radius * 0.6)).exp() * (0.6 + 0.4 * ctx.intensity);

    let mut color = [0.0; 3];
    for c in 0..3 {
        color[c] = row.core_color[c] * core + row.halo_color[c] * halo;
    }
    shift_hue(color, row.color_shift)
}

/// Signed distance to the outline of `mode`'s body; negative inside.
fn body_distance(mode: Mode, row: &ModeParams, rel: Vec2, radius: f32, t: f32) -> f32 {
    let q = vec2(rel.x, rel.y / row.squash);
    let angle = q.y.atan2(q.x);
    let spin = TAU * row.pulse_rate * t * 0.5;

    match mode {
        Mode::Idle => q.length() - radius * (1.0 + row.wobble * (angle * 3.0 + spin).sin()),
        Mode::Curious => {
            // Off-centre pupil that sweeps with the probe cadence.
            let look = Vec2::angled(spin) * (radius * 0.35);
            let outer = q.length() - radius * (1.0 + row.wobble * (row.lobes * angle).cos());
            let pupil = (q - look).length() - radius * 0.3;
            outer.max(-pupil).min(pupil.abs() - radius * 0.05)
        }
        Mode::Focused => {
            let disc = q.length() - radius * 0.6;
            let ring = (q.length() - radius).abs() - radius * 0.08;
            disc.min(ring)
        }
        Mode::Amused => {
            q.length() - radius * (1.0 + row.wobble * (row.lobes * angle + spin * 2.0).sin().abs())
        }
        Mode::Alert => {
            let spikes = (row.lobes * angle + spin).cos().abs().powf(4.0);
            q.length() - radius * (1.0 + row.wobble * 2.0 * spikes)
        }
        Mode::Sleepy => {
            let droop = vec2(q.x, q.y - radius * 0.15 * (spin * 0.5).sin());
            droop.length() - radius * (1.0 + row.wobble * (angle + spin).sin())
        }
    }
}

fn splat_particles(target: &mut [Rgb], viewport: Viewport, field: &[Particle], ctx: &FrameContext) {
    let current = mode_table::params(ctx.current_mode).particle_color;
    let tint = if ctx.current_mode == ctx.target_mode {
        current
    } else {
        lerp_rgb(current, mode_table::params(ctx.target_mode).particle_color, ctx.blend_factor)
    };
    let gain = SPLAT_GAIN * (0.5 + 0.5 * ctx.intensity);
    let (w, h) = (viewport.width as i64, viewport.height as i64);

    for particle in field {
        let px = viewport.field_to_pixel(particle.position) - vec2(0.5, 0.5);
        if !(px.x.is_finite() && px.y.is_finite()) {
            continue;
        }
        let (x0, y0) = (px.x.floor(), px.y.floor());
        let (fx, fy) = (px.x - x0, px.y - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);

        let energy = gain * (0.6 + 0.8 * (particle.velocity.length() / MAX_SPEED).min(1.0));
        let taps = [
            (x0, y0, (1.0 - fx) * (1.0 - fy)),
            (x0 + 1, y0, fx * (1.0 - fy)),
            (x0, y0 + 1, (1.0 - fx) * fy),
            (x0 + 1, y0 + 1, fx * fy),
        ];
        for (x, y, weight) in taps {
            if x < 0 || y < 0 || x >= w || y >= h {
                continue;
            }
            let pixel = &mut target[(y * w + x) as usize];
            for c in 0..3 {
                pixel[c] += tint[c] * energy * weight;
            }
        }
    }
}

/// Positive shift warms (red up, blue down), negative cools.
fn shift_hue(color: Rgb, shift: f32) -> Rgb {
    [
        color[0] * (1.0 + 0.3 * shift),
        color[1],
        color[2] * (1.0 - 0.3 * shift),
    ]
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
