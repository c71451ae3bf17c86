//! Static per-mode parameter bank.
//!
//! Rows are indexed by `Mode::index()`. Every row already lies inside the
//! ranges enforced by `ModeParams::sanitized`, so lookups can be used as-is.

use crate::types::{Mode, ModeParams};

const IDLE: ModeParams = ModeParams {
    damping: 0.97,
    noise_strength: 0.9,
    noise_scale: 3.0,
    noise_speed: 0.25,
    swarm_attraction: 0.6,
    goal_attraction: 0.8,
    speed: 1.0,
    force_strength: 0.4,
    pulse_rate: 0.25,
    trail_fade: 0.94,
    glow_intensity: 1.0,
    color_shift: 0.0,
    body_radius: 0.14,
    lobes: 0.0,
    wobble: 0.02,
    squash: 1.0,
    core_color: [0.55, 0.75, 1.0],
    halo_color: [0.12, 0.22, 0.45],
    particle_color: [0.35, 0.55, 0.95],
};

const CURIOUS: ModeParams = ModeParams {
    damping: 0.965,
    noise_strength: 1.2,
    noise_scale: 4.0,
    noise_speed: 0.4,
    swarm_attraction: 0.5,
    goal_attraction: 1.1,
    speed: 1.2,
    force_strength: 1.2,
    pulse_rate: 0.6,
    trail_fade: 0.93,
    glow_intensity: 1.3,
    color_shift: 0.15,
    body_radius: 0.13,
    lobes: 2.0,
    wobble: 0.06,
    squash: 0.85,
    core_color: [0.4, 1.0, 0.85],
    halo_color: [0.08, 0.35, 0.3],
    particle_color: [0.3, 0.95, 0.75],
};

const FOCUSED: ModeParams = ModeParams {
    damping: 0.955,
    noise_strength: 0.5,
    noise_scale: 2.5,
    noise_speed: 0.15,
    swarm_attraction: 1.2,
    goal_attraction: 1.4,
    speed: 0.9,
    force_strength: 1.5,
    pulse_rate: 0.4,
    trail_fade: 0.96,
    glow_intensity: 1.2,
    color_shift: -0.1,
    body_radius: 0.1,
    lobes: 0.0,
    wobble: 0.0,
    squash: 1.0,
    core_color: [0.95, 0.95, 1.0],
    halo_color: [0.25, 0.3, 0.6],
    particle_color: [0.75, 0.8, 1.0],
};

const AMUSED: ModeParams = ModeParams {
    damping: 0.975,
    noise_strength: 1.6,
    noise_scale: 3.5,
    noise_speed: 0.6,
    swarm_attraction: 0.5,
    goal_attraction: 0.7,
    speed: 1.3,
    force_strength: 1.8,
    pulse_rate: 1.4,
    trail_fade: 0.92,
    glow_intensity: 1.6,
    color_shift: 0.35,
    body_radius: 0.16,
    lobes: 5.0,
    wobble: 0.1,
    squash: 1.1,
    core_color: [1.0, 0.8, 0.35],
    halo_color: [0.5, 0.2, 0.35],
    particle_color: [1.0, 0.55, 0.75],
};

const ALERT: ModeParams = ModeParams {
    damping: 0.96,
    noise_strength: 2.2,
    noise_scale: 5.0,
    noise_speed: 1.2,
    swarm_attraction: 0.8,
    goal_attraction: 1.0,
    speed: 1.6,
    force_strength: 3.0,
    pulse_rate: 2.2,
    trail_fade: 0.9,
    glow_intensity: 2.0,
    color_shift: -0.3,
    body_radius: 0.12,
    lobes: 8.0,
    wobble: 0.14,
    squash: 1.0,
    core_color: [1.0, 0.35, 0.2],
    halo_color: [0.6, 0.08, 0.05],
    particle_color: [1.0, 0.45, 0.25],
};

const SLEEPY: ModeParams = ModeParams {
    damping: 0.985,
    noise_strength: 0.35,
    noise_scale: 1.8,
    noise_speed: 0.08,
    swarm_attraction: 0.4,
    goal_attraction: 0.5,
    speed: 0.6,
    force_strength: 0.6,
    pulse_rate: 0.12,
    trail_fade: 0.975,
    glow_intensity: 0.6,
    color_shift: 0.2,
    body_radius: 0.15,
    lobes: 0.0,
    wobble: 0.01,
    squash: 0.7,
    core_color: [0.45, 0.4, 0.75],
    halo_color: [0.1, 0.08, 0.25],
    particle_color: [0.35, 0.3, 0.65],
};

static MODE_TABLE: [ModeParams; Mode::COUNT] = [IDLE, CURIOUS, FOCUSED, AMUSED, ALERT, SLEEPY];

/// Parameter row for `mode`. Always the same `'static` reference.
#[inline]
pub fn params(mode: Mode) -> &'static ModeParams {
    &MODE_TABLE[mode.index()]
}
