//! Time-domain blending between the active mode and the most recently
//! observed one.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::mode_table;
use crate::types::{clamp_finite, Mode, ModeParams};

pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(750);

/// Blend factors this close to 0 or 1 return the exact table row.
const BLEND_EPSILON: f32 = 1.0e-4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionState {
    pub current_mode: Mode,
    pub target_mode: Mode,
    pub blend_factor: f32,
    pub intensity: f32,
    pub transition_started_at: Option<Instant>,
    pub transition_duration: Duration,
}

pub struct TransitionController {
    state: TransitionState,
    /// Blend the running transition started from (non-zero after a reversal).
    start_blend: f32,
    target_intensity: f32,
    last_advance: Option<Instant>,
}

impl TransitionController {
    pub fn new(initial: Mode, intensity: f32, duration: Duration) -> Self {
        let intensity = clamp_finite(intensity, 0.0, 1.0);
        Self {
            state: TransitionState {
                current_mode: initial,
                target_mode: initial,
                blend_factor: 0.0,
                intensity,
                transition_started_at: None,
                transition_duration: duration,
            },
            start_blend: 0.0,
            target_intensity: intensity,
            last_advance: None,
        }
    }

    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    pub fn current_mode(&self) -> Mode {
        self.state.current_mode
    }

    pub fn target_mode(&self) -> Mode {
        self.state.target_mode
    }

    pub fn blend_factor(&self) -> f32 {
        self.state.blend_factor
    }

    /// Smoothed intensity.
    pub fn intensity(&self) -> f32 {
        self.state.intensity
    }

    pub fn is_transitioning(&self) -> bool {
        self.state.current_mode != self.state.target_mode
    }

    /// Records a newly observed mode. Returns `true` when the transition
    /// clock was (re)started, which only happens if `mode` differs from the
    /// current target.
    ///
    /// Mid-transition this may also rewrite `current_mode`. Heading back to
    /// the current mode swaps the two and seeds the blend with `1 - blend`, so
    /// the blend then runs from that offset rather than from zero. A third
    /// mode makes whichever side weighs more the new `current_mode`.
    pub fn observe(&mut self, mode: Mode, intensity: f32, now: Instant) -> bool {
        if intensity.is_finite() {
            self.target_intensity = intensity.clamp(0.0, 1.0);
        }

        if mode == self.state.target_mode {
            return false;
        }

        let state = &mut self.state;
        if state.current_mode == state.target_mode {
            state.target_mode = mode;
            self.start_blend = 0.0;
        } else if mode == state.current_mode {
            // Heading back where we came from: swap roles and keep the
            // on-screen mix where it is.
            std::mem::swap(&mut state.current_mode, &mut state.target_mode);
            self.start_blend = 1.0 - state.blend_factor;
        } else {
            if state.blend_factor >= 0.5 {
                state.current_mode = state.target_mode;
            }
            state.target_mode = mode;
            self.start_blend = 0.0;
        }

        state.blend_factor = self.start_blend;
        state.transition_started_at = Some(now);
        debug!(
            current = %state.current_mode,
            target = %state.target_mode,
            from_blend = self.start_blend,
            "transition started"
        );
        true
    }

    /// Recomputes the blend factor for `now` and commits the target once the
    /// blend reaches 1.
    pub fn advance(&mut self, now: Instant) {
        let dt = self
            .last_advance
            .map_or(0.0, |last| now.saturating_duration_since(last).as_secs_f32());
        self.last_advance = Some(now);

        let tau = (self.state.transition_duration.as_secs_f32() * 0.5).max(1.0e-3);
        let smoothing = 1.0 - (-dt / tau).exp();
        self.state.intensity += (self.target_intensity - self.state.intensity) * smoothing;

        if !self.is_transitioning() {
            self.state.blend_factor = 0.0;
            self.state.transition_started_at = None;
            return;
        }

        let started_at = *self.state.transition_started_at.get_or_insert(now);
        let duration = self.state.transition_duration.as_secs_f32();
        let blend = if duration <= 0.0 {
            1.0
        } else {
            let elapsed = now.saturating_duration_since(started_at).as_secs_f32();
            (self.start_blend + elapsed / duration).clamp(0.0, 1.0)
        };

        if blend >= 1.0 {
            self.state.current_mode = self.state.target_mode;
            self.state.blend_factor = 0.0;
            self.state.transition_started_at = None;
            self.start_blend = 0.0;
            debug!(mode = %self.state.current_mode, "transition complete");
        } else {
            self.state.blend_factor = blend;
        }
    }

    /// `lerp(table[current], table[target], blend)`, snapping to the exact
    /// rows at rest and near either end of the blend.
    pub fn blended_params(&self) -> ModeParams {
        let current = mode_table::params(self.state.current_mode);
        let target = mode_table::params(self.state.target_mode);
        let blend = self.state.blend_factor;

        if self.state.current_mode == self.state.target_mode || blend <= BLEND_EPSILON {
            *current
        } else if blend >= 1.0 - BLEND_EPSILON {
            *target
        } else {
            current.lerp(target, blend)
        }
    }
}

/// Debug driver that walks the target through every mode on a fixed dwell.
#[derive(Clone, Copy, Debug)]
pub struct AutoCycle {
    period: Duration,
    started_at: Instant,
}

impl AutoCycle {
    pub fn new(period: Duration, started_at: Instant) -> Self {
        Self { period, started_at }
    }

    pub fn mode_at(&self, now: Instant) -> Mode {
        let period = self.period.as_secs_f64();
        if period <= 0.0 {
            return Mode::Idle;
        }
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let slot = (elapsed / period).floor() as usize % Mode::COUNT;
        Mode::ALL[slot]
    }
}
