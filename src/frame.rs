//! Per-frame context and the stage sequencing of one frame:
//! transition → field → compositor. Presentation happens in the app host.

use std::time::Instant;

use eframe::egui::{vec2, Vec2};
use tracing::{debug, trace};

use crate::channel::ModeUpdate;
use crate::compositor::Compositor;
use crate::config::RendererConfig;
use crate::field::FieldSimulator;
use crate::mode_table;
use crate::transition::{AutoCycle, TransitionController, TransitionState};
use crate::types::{clamp_finite, Mode, ModeParams, Rgb};

/// Longest step the simulation will take, however late the frame is.
pub const MAX_DT: f32 = 0.1;
const NOMINAL_DT: f32 = 1.0 / 60.0;

/// Everything a stage may read for the current frame. Built once per frame
/// and passed by reference; no stage reaches for shared globals.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext {
    /// Seconds since the pipeline started.
    pub time: f32,
    pub dt: f32,
    pub frame_index: u64,
    pub current_mode: Mode,
    pub target_mode: Mode,
    pub blend_factor: f32,
    pub intensity: f32,
    pub scale: f32,
    /// Goal anchor in field space.
    pub goal: Vec2,
    /// Blended, sanitised mode parameters.
    pub params: ModeParams,
}

impl FrameContext {
    pub fn new(
        time: f32,
        dt: f32,
        frame_index: u64,
        transition: &TransitionState,
        params: &ModeParams,
        goal: Vec2,
        scale: f32,
    ) -> Self {
        let goal = if goal.x.is_finite() && goal.y.is_finite() {
            goal
        } else {
            Vec2::ZERO
        };
        Self {
            time: clamp_finite(time, 0.0, f32::MAX),
            dt: clamp_finite(dt, 0.0, MAX_DT),
            frame_index,
            current_mode: transition.current_mode,
            target_mode: transition.target_mode,
            blend_factor: clamp_finite(transition.blend_factor, 0.0, 1.0),
            intensity: clamp_finite(transition.intensity, 0.0, 1.0),
            scale: clamp_finite(scale, 0.35, 2.5),
            goal,
            params: params.sanitized(),
        }
    }

    /// A settled context for `mode` at the field origin. Handy for driving
    /// individual stages.
    pub fn at_rest(mode: Mode, frame_index: u64) -> Self {
        Self {
            time: 0.0,
            dt: NOMINAL_DT,
            frame_index,
            current_mode: mode,
            target_mode: mode,
            blend_factor: 0.0,
            intensity: 1.0,
            scale: 1.0,
            goal: Vec2::ZERO,
            params: *mode_table::params(mode),
        }
    }
}

/// Maps between pixels of the render target and field space, where the
/// shorter screen side spans one unit and the screen center is the origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    fn short_side(&self) -> f32 {
        self.width.min(self.height) as f32
    }

    fn half_extent(&self) -> Vec2 {
        vec2(self.width as f32, self.height as f32) * 0.5
    }

    /// Normalized screen coordinates (`[0, 1]²`, y down) to field space.
    pub fn uv_to_field(&self, uv: [f32; 2]) -> Vec2 {
        let uv = [clamp_finite(uv[0], 0.0, 1.0), clamp_finite(uv[1], 0.0, 1.0)];
        let pixel = vec2(uv[0] * self.width as f32, uv[1] * self.height as f32);
        self.pixel_to_field(pixel.x, pixel.y)
    }

    pub fn pixel_to_field(&self, x: f32, y: f32) -> Vec2 {
        (vec2(x, y) - self.half_extent()) / self.short_side()
    }

    pub fn field_to_pixel(&self, p: Vec2) -> Vec2 {
        p * self.short_side() + self.half_extent()
    }
}

/// Owns all per-frame state and runs the stages in dependency order.
pub struct EntityPipeline {
    transition: TransitionController,
    simulator: FieldSimulator,
    compositor: Compositor,
    auto_cycle: Option<AutoCycle>,
    started_at: Instant,
    last_frame: Option<Instant>,
    frame_index: u64,
    goal_uv: [f32; 2],
    scale: f32,
    last_context: Option<FrameContext>,
}

impl EntityPipeline {
    pub fn new(config: &RendererConfig, width: usize, height: usize, now: Instant) -> Self {
        let auto_cycle = config
            .auto_cycle
            .then(|| AutoCycle::new(config.auto_cycle_period(), now));
        Self {
            transition: TransitionController::new(
                config.initial_mode,
                config.initial_intensity,
                config.transition_duration(),
            ),
            simulator: FieldSimulator::new(config.field_entries, config.seed),
            compositor: Compositor::new(width, height),
            auto_cycle,
            started_at: now,
            last_frame: None,
            frame_index: 0,
            goal_uv: config.goal,
            scale: config.scale,
            last_context: None,
        }
    }

    pub fn transition(&self) -> &TransitionController {
        &self.transition
    }

    pub fn simulator(&self) -> &FieldSimulator {
        &self.simulator
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn last_context(&self) -> Option<&FrameContext> {
        self.last_context.as_ref()
    }

    pub fn is_auto_cycling(&self) -> bool {
        self.auto_cycle.is_some()
    }

    pub fn set_goal(&mut self, uv: [f32; 2]) {
        self.goal_uv = [clamp_finite(uv[0], 0.0, 1.0), clamp_finite(uv[1], 0.0, 1.0)];
    }

    pub fn goal(&self) -> [f32; 2] {
        self.goal_uv
    }

    /// Feeds an observer update into the transition controller and moves the
    /// goal anchor if the update carries one. Ignored while auto-cycling.
    pub fn observe(&mut self, update: ModeUpdate, now: Instant) -> bool {
        if self.auto_cycle.is_some() {
            trace!(mode = %update.mode, "auto-cycle active, ignoring observer update");
            return false;
        }
        if let Some(goal) = update.goal {
            self.set_goal(goal);
        }
        self.transition.observe(update.mode, update.intensity, now)
    }

    /// Reallocates image buffers for a new surface size. Field and
    /// transition state carry over untouched.
    pub fn resize(&mut self, width: usize, height: usize) {
        self.compositor.resize(width, height);
    }

    pub fn render_dimensions(&self) -> [usize; 2] {
        self.compositor.dimensions()
    }

    /// Runs one frame and returns the tone-mapped image.
    pub fn frame(&mut self, now: Instant) -> &[Rgb] {
        if let Some(cycle) = self.auto_cycle {
            let intensity = self.transition.intensity();
            if self.transition.observe(cycle.mode_at(now), intensity, now) {
                debug!(target_mode = %self.transition.target_mode(), "auto-cycle advanced");
            }
        }
        self.transition.advance(now);

        let dt = self
            .last_frame
            .map_or(NOMINAL_DT, |last| now.saturating_duration_since(last).as_secs_f32());
        self.last_frame = Some(now);

        let params = self.transition.blended_params();
        let goal = self.compositor.viewport().uv_to_field(self.goal_uv);
        let ctx = FrameContext::new(
            now.saturating_duration_since(self.started_at).as_secs_f32(),
            dt,
            self.frame_index,
            self.transition.state(),
            &params,
            goal,
            self.scale,
        );

        self.simulator.step(&ctx);
        self.last_context = Some(ctx);
        self.frame_index = self.frame_index.wrapping_add(1);
        self.compositor.render(self.simulator.particles(), &ctx)
    }
}
