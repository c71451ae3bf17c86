use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Linear RGB, unbounded above until tone mapping.
pub type Rgb = [f32; 3];

/// One of the six behavioural profiles the observer can report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Idle,
    Curious,
    Focused,
    Amused,
    Alert,
    Sleepy,
}

impl Mode {
    pub const COUNT: usize = 6;

    pub const ALL: [Mode; Mode::COUNT] = [
        Mode::Idle,
        Mode::Curious,
        Mode::Focused,
        Mode::Amused,
        Mode::Alert,
        Mode::Sleepy,
    ];

    pub const fn index(self) -> usize {
        match self {
            Mode::Idle => 0,
            Mode::Curious => 1,
            Mode::Focused => 2,
            Mode::Amused => 3,
            Mode::Alert => 4,
            Mode::Sleepy => 5,
        }
    }

    /// Unknown indices map to `Idle`.
    pub const fn from_index(index: u32) -> Mode {
        match index {
            1 => Mode::Curious,
            2 => Mode::Focused,
            3 => Mode::Amused,
            4 => Mode::Alert,
            5 => Mode::Sleepy,
            _ => Mode::Idle,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Curious => "curious",
            Mode::Focused => "focused",
            Mode::Amused => "amused",
            Mode::Alert => "alert",
            Mode::Sleepy => "sleepy",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown mode `{0}`")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    /// Accepts a mode name (any case) or its numeric index.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(index) = trimmed.parse::<u32>() {
            return Ok(Mode::from_index(index));
        }
        Mode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownMode(trimmed.to_owned()))
    }
}

/// Per-mode coefficients. One constant row per `Mode` lives in the mode table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeParams {
    /// Per-frame velocity carry-over (at 60 Hz).
    pub damping: f32,
    pub noise_strength: f32,
    /// Spatial frequency of the turbulence field.
    pub noise_scale: f32,
    /// Temporal drift of the turbulence field.
    pub noise_speed: f32,
    pub swarm_attraction: f32,
    pub goal_attraction: f32,
    /// Euler step multiplier.
    pub speed: f32,
    /// Gain of the mode-specific force.
    pub force_strength: f32,
    /// Hz; drives breathing, probing and burst cadence.
    pub pulse_rate: f32,
    pub trail_fade: f32,
    pub glow_intensity: f32,
    pub color_shift: f32,
    pub body_radius: f32,
    /// Angular lobe count of the body outline.
    pub lobes: f32,
    /// Radial amplitude of the lobes.
    pub wobble: f32,
    /// Vertical / horizontal aspect of the body.
    pub squash: f32,
    pub core_color: Rgb,
    pub halo_color: Rgb,
    pub particle_color: Rgb,
}

impl ModeParams {
    /// Component-wise linear interpolation of every field.
    pub fn lerp(&self, other: &ModeParams, t: f32) -> ModeParams {
        ModeParams {
            damping: lerp(self.damping, other.damping, t),
            noise_strength: lerp(self.noise_strength, other.noise_strength, t),
            noise_scale: lerp(self.noise_scale, other.noise_scale, t),
            noise_speed: lerp(self.noise_speed, other.noise_speed, t),
            swarm_attraction: lerp(self.swarm_attraction, other.swarm_attraction, t),
            goal_attraction: lerp(self.goal_attraction, other.goal_attraction, t),
            speed: lerp(self.speed, other.speed, t),
            force_strength: lerp(self.force_strength, other.force_strength, t),
            pulse_rate: lerp(self.pulse_rate, other.pulse_rate, t),
            trail_fade: lerp(self.trail_fade, other.trail_fade, t),
            glow_intensity: lerp(self.glow_intensity, other.glow_intensity, t),
            color_shift: lerp(self.color_shift, other.color_shift, t),
            body_radius: lerp(self.body_radius, other.body_radius, t),
            lobes: lerp(self.lobes, other.lobes, t),
            wobble: lerp(self.wobble, other.wobble, t),
            squash: lerp(self.squash, other.squash, t),
            core_color: lerp_rgb(self.core_color, other.core_color, t),
            halo_color: lerp_rgb(self.halo_color, other.halo_color, t),
            particle_color: lerp_rgb(self.particle_color, other.particle_color, t),
        }
    }

    /// Clamps every coefficient into the range the simulation and compositor
    /// are stable in. Non-finite values collapse to the lower bound.
    pub fn sanitized(&self) -> ModeParams {
        ModeParams {
            damping: clamp_finite(self.damping, 0.95, 0.99999),
            noise_strength: clamp_finite(self.noise_strength, 0.0, 25.0),
            noise_scale: clamp_finite(self.noise_scale, 0.1, 32.0),
            noise_speed: clamp_finite(self.noise_speed, 0.0, 8.0),
            swarm_attraction: clamp_finite(self.swarm_attraction, 0.0, 2.0),
            goal_attraction: clamp_finite(self.goal_attraction, 0.0, 2.0),
            speed: clamp_finite(self.speed, 0.0, 4.0),
            force_strength: clamp_finite(self.force_strength, 0.0, 8.0),
            pulse_rate: clamp_finite(self.pulse_rate, 0.0, 8.0),
            trail_fade: clamp_finite(self.trail_fade, 0.9, 0.99999),
            glow_intensity: clamp_finite(self.glow_intensity, 0.0, 4.0),
            color_shift: clamp_finite(self.color_shift, -1.0, 1.0),
            body_radius: clamp_finite(self.body_radius, 0.01, 0.5),
            lobes: clamp_finite(self.lobes, 0.0, 12.0),
            wobble: clamp_finite(self.wobble, 0.0, 0.5),
            squash: clamp_finite(self.squash, 0.25, 4.0),
            core_color: self.core_color.map(|c| clamp_finite(c, 0.0, 4.0)),
            halo_color: self.halo_color.map(|c| clamp_finite(c, 0.0, 4.0)),
            particle_color: self.particle_color.map(|c| clamp_finite(c, 0.0, 4.0)),
        }
    }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_rgb(a: Rgb, b: Rgb, t: f32) -> Rgb {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

#[inline]
pub fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        min
    }
}
