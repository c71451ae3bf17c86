//! Double-buffered particle field and its per-frame recurrence.

use eframe::egui::{vec2, Vec2};
use rayon::prelude::*;
use std::f32::consts::TAU;

use crate::forces::{self, ForceInput, NORMALIZE_EPSILON};
use crate::frame::FrameContext;
use crate::noise;

/// Frames whose output comes from the seeded hash path instead of the
/// recurrence.
pub const INIT_FRAMES: u64 = 4;

/// Field units (short screen side = 1) per second.
pub const MAX_SPEED: f32 = 0.9;

/// Distance from the goal beyond which the push-back force engages, before
/// entity scale.
pub const BOUNDARY_RADIUS: f32 = 0.38;
const BOUNDARY_STIFFNESS: f32 = 6.0;

/// Size of the fixed-stride subsample used for the swarm center.
pub const SWARM_SAMPLES: usize = 64;

const REFERENCE_FPS: f32 = 60.0;
const TURBULENCE_GAIN: f32 = 0.6;
const SWARM_GAIN: f32 = 1.5;
const GOAL_GAIN: f32 = 1.0;
const WARMUP_SPREAD: f32 = 0.22;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Two equally sized entry arrays. One is read-only for the frame, the other
/// write-only; `swap` flips the roles once the write is complete.
pub struct FieldState {
    buffers: [Vec<Particle>; 2],
    front: usize,
}

impl FieldState {
    pub fn new(len: usize) -> Self {
        Self {
            buffers: [vec![Particle::default(); len], vec![Particle::default(); len]],
            front: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recently completed generation.
    pub fn previous(&self) -> &[Particle] {
        &self.buffers[self.front]
    }

    /// `(previous, next)` for the frame about to be computed.
    fn split(&mut self) -> (&[Particle], &mut [Particle]) {
        let (first, second) = self.buffers.split_at_mut(1);
        if self.front == 0 {
            (first[0].as_slice(), second[0].as_mut_slice())
        } else {
            (second[0].as_slice(), first[0].as_mut_slice())
        }
    }

    fn swap(&mut self) {
        self.front ^= 1;
    }
}

pub struct FieldSimulator {
    state: FieldState,
    seed: u32,
}

impl FieldSimulator {
    pub fn new(entries: usize, seed: u32) -> Self {
        Self {
            state: FieldState::new(entries),
            seed,
        }
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Latest completed generation of the field.
    pub fn particles(&self) -> &[Particle] {
        self.state.previous()
    }

    /// Advances the field by one frame and publishes the result.
    pub fn step(&mut self, ctx: &FrameContext) {
        let seed = self.seed;
        let (prev, next) = self.state.split();
        step(prev, next, ctx, seed);
        self.state.swap();
    }
}

/// Mean position of a fixed-stride subsample of `field`.
pub fn swarm_center(field: &[Particle]) -> Vec2 {
    if field.is_empty() {
        return Vec2::ZERO;
    }
    let stride = (field.len() / SWARM_SAMPLES).max(1);
    let (sum, count) = field
        .iter()
        .step_by(stride)
        .take(SWARM_SAMPLES)
        .fold((Vec2::ZERO, 0usize), |(sum, count), p| (sum + p.position, count + 1));
    sum / count as f32
}

/// Computes `next` from `prev` without touching `prev`.
///
/// During the first `INIT_FRAMES` frames `prev` is ignored entirely and
/// `next` is filled from the seeded hash path.
pub fn step(prev: &[Particle], next: &mut [Particle], ctx: &FrameContext, seed: u32) {
    if ctx.frame_index < INIT_FRAMES {
        let width = grid_width(next.len());
        next.par_iter_mut()
            .enumerate()
            .for_each(|(index, out)| *out = seeded_entry(index, width, ctx, seed));
        return;
    }

    let center = swarm_center(prev);
    next.par_iter_mut()
        .zip(prev.par_iter())
        .enumerate()
        .for_each(|(index, (out, entry))| {
            *out = advance_entry(index as u32, entry, center, ctx, seed);
        });
}

fn grid_width(len: usize) -> usize {
    ((len as f64).sqrt().ceil() as usize).max(1)
}

/// Pseudo-random entry hashed from its grid cell; independent of any prior
/// state.
fn seeded_entry(index: usize, width: usize, ctx: &FrameContext, seed: u32) -> Particle {
    let gx = (index % width) as i32;
    let gy = (index / width) as i32;
    let h = |salt: i32| noise::hash3(gx, gy, salt, seed);

    let radius = h(1).sqrt() * WARMUP_SPREAD * ctx.scale;
    let angle = h(2) * TAU;
    Particle {
        position: ctx.goal + Vec2::angled(angle) * radius,
        velocity: vec2(h(3) - 0.5, h(4) - 0.5) * (MAX_SPEED * 0.2),
    }
}

fn advance_entry(
    index: u32,
    entry: &Particle,
    center: Vec2,
    ctx: &FrameContext,
    seed: u32,
) -> Particle {
    let params = &ctx.params;
    let frames = ctx.dt * REFERENCE_FPS;

    let carried = entry.velocity * params.damping.powf(frames);

    let offset = entry.position - ctx.goal;
    let dist = offset.length();
    let radius = BOUNDARY_RADIUS * ctx.scale;

    let kinetic = (entry.velocity.length() / MAX_SPEED).min(1.0);
    let spatial = (dist / radius).min(1.5);
    let sample = entry.position * params.noise_scale + entry.velocity * 0.35;
    let gain = params.noise_strength * TURBULENCE_GAIN;
    let turbulence = noise::turbulence(sample, ctx.time * params.noise_speed, seed)
        * (gain * (0.35 + 0.65 * kinetic) * (0.6 + 0.4 * spatial));

    let swarm = (center - entry.position) * (params.swarm_attraction * SWARM_GAIN);
    let goal = (ctx.goal - entry.position) * (params.goal_attraction * GOAL_GAIN);

    let input = ForceInput {
        index,
        position: entry.position,
        velocity: entry.velocity,
        center,
        goal: ctx.goal,
        time: ctx.time,
        intensity: ctx.intensity,
        seed,
    };
    let mode = if ctx.current_mode == ctx.target_mode {
        forces::mode_force(ctx.current_mode, &input)
    } else {
        let from = forces::mode_force(ctx.current_mode, &input);
        let to = forces::mode_force(ctx.target_mode, &input);
        from + (to - from) * ctx.blend_factor
    };

    let boundary = if dist > radius {
        offset / (dist + NORMALIZE_EPSILON) * ((dist - radius) * BOUNDARY_STIFFNESS)
    } else {
        Vec2::ZERO
    };

    let accel = turbulence + swarm + goal + mode - boundary;
    let velocity = clamp_speed(carried + accel * ctx.dt, MAX_SPEED);
    Particle {
        position: entry.position + velocity * (ctx.dt * params.speed),
        velocity,
    }
}

#[inline]
pub fn clamp_speed(v: Vec2, max: f32) -> Vec2 {
    let len_sq = v.length_sq();
    if len_sq > max * max {
        v * (max / len_sq.sqrt())
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mode;
    use rstest::rstest;

    fn ctx(mode: Mode, frame_index: u64) -> FrameContext {
        FrameContext::at_rest(mode, frame_index)
    }

    #[test]
    fn warmup_ignores_prior_state() {
        let garbage = vec![
            Particle {
                position: vec2(f32::NAN, 1.0e30),
                velocity: vec2(f32::INFINITY, -3.0),
            };
            500
        ];
        let clean = vec![Particle::default(); 500];
        let mut from_garbage = vec![Particle::default(); 500];
        let mut from_clean = vec![Particle::default(); 500];

        for frame in 0..INIT_FRAMES {
            let c = ctx(Mode::Idle, frame);
            step(&garbage, &mut from_garbage, &c, 11);
            step(&clean, &mut from_clean, &c, 11);
            assert_eq!(from_garbage, from_clean);
            assert!(from_clean.iter().all(|p| p.position.x.is_finite()));
        }
    }

    #[test]
    fn warmup_is_deterministic_per_seed() {
        let prev = vec![Particle::default(); 64];
        let (mut a, mut b, mut c) = (prev.clone(), prev.clone(), prev.clone());
        step(&prev, &mut a, &ctx(Mode::Idle, 0), 1);
        step(&prev, &mut b, &ctx(Mode::Idle, 0), 1);
        step(&prev, &mut c, &ctx(Mode::Idle, 0), 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[rstest]
    #[case(Mode::Idle)]
    #[case(Mode::Curious)]
    #[case(Mode::Focused)]
    #[case(Mode::Amused)]
    #[case(Mode::Alert)]
    #[case(Mode::Sleepy)]
    fn velocity_never_exceeds_max_speed(#[case] mode: Mode) {
        let mut sim = FieldSimulator::new(1024, 5);
        for frame in 0..240 {
            let mut c = ctx(mode, frame);
            c.time = frame as f32 / 60.0;
            sim.step(&c);
            for p in sim.particles() {
                assert!(p.velocity.length() <= MAX_SPEED * (1.0 + 1.0e-5));
                assert!(p.position.x.is_finite() && p.position.y.is_finite());
            }
        }
    }

    #[test]
    fn coincident_entries_do_not_produce_nan() {
        let prev = vec![Particle::default(); 256];
        let mut next = vec![Particle::default(); 256];
        let c = ctx(Mode::Focused, INIT_FRAMES + 1);
        assert_eq!(swarm_center(&prev), c.goal);
        step(&prev, &mut next, &c, 3);
        for p in &next {
            assert!(p.velocity.x.is_finite() && p.velocity.y.is_finite());
        }
    }

    #[test]
    fn swarm_center_uses_a_sparse_sample() {
        let mut field = vec![Particle::default(); SWARM_SAMPLES * 4];
        // Entry 1 is never on the stride, so moving it changes nothing.
        field[1].position = vec2(1000.0, 1000.0);
        assert_eq!(swarm_center(&field), Vec2::ZERO);
        field[0].position = vec2(64.0, 0.0);
        assert_eq!(swarm_center(&field), vec2(1.0, 0.0));
    }

    #[test]
    fn boundary_pulls_strays_back() {
        let far = vec2(2.0, 0.0);
        let stray = Particle {
            position: far,
            velocity: Vec2::ZERO,
        };
        let prev = vec![stray; 8];
        let mut next = prev.clone();
        let c = ctx(Mode::Idle, INIT_FRAMES);
        step(&prev, &mut next, &c, 3);
        assert!(next.iter().all(|p| p.velocity.x < 0.0));
    }

    #[test]
    fn buffers_swap_roles_each_step() {
        let mut sim = FieldSimulator::new(16, 9);
        sim.step(&ctx(Mode::Idle, 0));
        let first = sim.particles().to_vec();
        sim.step(&ctx(Mode::Idle, INIT_FRAMES));
        assert_ne!(sim.particles(), first.as_slice());
        assert_eq!(sim.len(), 16);
    }

    #[test]
    fn clamp_speed_preserves_direction() {
        let v = clamp_speed(vec2(3.0, 4.0), 1.0);
        assert!((v.length() - 1.0).abs() < 1.0e-6);
        assert!((v.x / v.y - 0.75).abs() < 1.0e-6);
        assert_eq!(clamp_speed(vec2(0.1, 0.0), 1.0), vec2(0.1, 0.0));
    }
}
