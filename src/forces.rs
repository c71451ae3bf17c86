//! Mode-specific force shapes.
//!
//! Each mode contributes one acceleration per entry. The simulator evaluates
//! the current and target mode separately and blends the two results.

use std::f32::consts::TAU;

use eframe::egui::{vec2, Vec2};

use crate::mode_table;
use crate::noise;
use crate::types::{Mode, ModeParams};

/// Added to lengths before dividing so coincident points never yield NaN.
pub const NORMALIZE_EPSILON: f32 = 1.0e-4;

/// Noise level above which an alert entry darts.
pub const DART_THRESHOLD: f32 = 0.72;

const ORBIT_RADIUS: f32 = 0.12;

/// Everything a force shape may read about one entry.
#[derive(Clone, Copy, Debug)]
pub struct ForceInput {
    pub index: u32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub center: Vec2,
    pub goal: Vec2,
    pub time: f32,
    pub intensity: f32,
    pub seed: u32,
}

impl ForceInput {
    /// Stable per-entry phase in `[0, TAU)`.
    fn phase(&self) -> f32 {
        noise::hash_index(self.index, 7, self.seed) * TAU
    }
}

#[inline]
pub fn safe_normalize(v: Vec2) -> Vec2 {
    v / (v.length() + NORMALIZE_EPSILON)
}

/// Acceleration contributed by `mode` for one entry, scaled by the mode's
/// own force gain and the observed intensity.
pub fn mode_force(mode: Mode, input: &ForceInput) -> Vec2 {
    let row = mode_table::params(mode);
    let shape = match mode {
        Mode::Idle => breathe(input, row),
        Mode::Curious => probe(input, row),
        Mode::Focused => orbit(input, row),
        Mode::Amused => burst(input, row),
        Mode::Alert => dart(input, row),
        Mode::Sleepy => drift(input, row),
    };
    shape * (row.force_strength * (0.25 + 0.75 * input.intensity.clamp(0.0, 1.0)))
}

/// Slow radial in-out around the swarm center with a faint swirl.
fn breathe(input: &ForceInput, row: &ModeParams) -> Vec2 {
    let outward = safe_normalize(input.position - input.center);
    let cycle = (TAU * row.pulse_rate * input.time + input.phase() * 0.2).sin();
    outward * (0.25 * cycle) + outward.rot90() * 0.08
}

/// Leans toward the goal and back again, wobbling sideways.
fn probe(input: &ForceInput, row: &ModeParams) -> Vec2 {
    let toward = safe_normalize(input.goal - input.position);
    let beat = TAU * row.pulse_rate * input.time + input.phase();
    toward * (0.2 + 0.6 * beat.sin()) + toward.rot90() * (0.45 * (beat * 1.7).cos())
}

/// Tight orbit at a fixed radius, with extra drag on top of damping.
fn orbit(input: &ForceInput, _row: &ModeParams) -> Vec2 {
    let offset = input.position - input.center;
    let dist = offset.length();
    let radial = safe_normalize(offset);
    radial.rot90() * 0.7 + radial * ((ORBIT_RADIUS - dist) * 4.0) - input.velocity * 1.5
}

/// Synchronised outward bursts on each pulse peak.
fn burst(input: &ForceInput, row: &ModeParams) -> Vec2 {
    let outward = safe_normalize(input.position - input.center);
    let wave = (TAU * row.pulse_rate * input.time).sin().max(0.0);
    let envelope = wave.powi(6);
    let bounce = vec2(0.0, -(TAU * row.pulse_rate * 2.0 * input.time + input.phase()).cos());
    outward * (2.0 * envelope) + bounce * 0.3
}

/// Rare, strong darts in a random heading while the gating noise is above
/// `DART_THRESHOLD`; otherwise a light brake.
fn dart(input: &ForceInput, row: &ModeParams) -> Vec2 {
    let beat = input.time * row.pulse_rate;
    let gate = noise::value_noise3(
        input.phase() * 3.0,
        beat * 1.7,
        input.index as f32 * 0.013,
        input.seed,
    );
    if gate > DART_THRESHOLD {
        let epoch = beat.floor() as i32;
        let heading = noise::hash3(input.index as i32, epoch, 3, input.seed) * TAU;
        let strength = (gate - DART_THRESHOLD) / (1.0 - DART_THRESHOLD);
        Vec2::angled(heading) * (6.0 * strength)
    } else {
        -input.velocity * 0.5
    }
}

/// Downward settle with a lazy sideways sway.
fn drift(input: &ForceInput, row: &ModeParams) -> Vec2 {
    let sway = (TAU * row.pulse_rate * input.time + input.phase()).sin();
    vec2(sway * 0.08, 0.2) - input.velocity * 0.6
}
