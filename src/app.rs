use std::time::Instant;

use eframe::egui::{self, Color32, RichText};
use tracing::info;

use crate::channel::{LatestSlot, ModeListener};
use crate::config::RendererConfig;
use crate::frame::EntityPipeline;
use crate::presenter::{self, Presenter};

pub struct SentinelApp {
    pipeline: EntityPipeline,
    presenter: Presenter,
    slot: LatestSlot,
    render_scale: f32,
    max_render_dim: usize,
    show_overlay: bool,
    _listener: Option<ModeListener>,
}

impl SentinelApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: &RendererConfig,
        slot: LatestSlot,
        listener: Option<ModeListener>,
    ) -> Self {
        Self {
            // Sized for real on the first frame, once the surface is known.
            pipeline: EntityPipeline::new(config, 1, 1, Instant::now()),
            presenter: Presenter::new(),
            slot,
            render_scale: config.render_scale,
            max_render_dim: config.max_render_dim,
            show_overlay: false,
            _listener: listener,
        }
    }

    fn poll_channel(&mut self, now: Instant) {
        if let Some(update) = self.slot.take() {
            if self.pipeline.observe(update, now) {
                info!(mode = %update.mode, intensity = update.intensity, "mode change");
            }
        }
    }

    /// Matches the internal render target to the window. Returns `false`
    /// when there is nothing to draw into.
    fn sync_surface(&mut self, ctx: &egui::Context) -> bool {
        let surface = ctx.screen_rect().size() * ctx.pixels_per_point();
        let Some(size) = presenter::render_size(
            [surface.x, surface.y],
            self.render_scale,
            self.max_render_dim,
        ) else {
            return false;
        };
        if size != self.pipeline.render_dimensions() {
            self.pipeline.resize(size[0], size[1]);
        }
        true
    }

    fn draw_overlay(&self, ui: &mut egui::Ui) {
        let transition = self.pipeline.transition();
        let text = |s: String| RichText::new(s).color(Color32::from_gray(200)).monospace();
        ui.horizontal(|ui| {
            ui.label(text(format!(
                "mode: {} -> {}",
                transition.current_mode(),
                transition.target_mode()
            )));
            ui.separator();
            ui.label(text(format!("blend: {:.3}", transition.blend_factor())));
            ui.separator();
            ui.label(text(format!("intensity: {:.3}", transition.intensity())));
            ui.separator();
            ui.label(text(format!("frame: {}", self.pipeline.frame_index())));
            ui.separator();
            let [w, h] = self.pipeline.render_dimensions();
            ui.label(text(format!("render: {w}x{h}")));
            if self.pipeline.is_auto_cycling() {
                ui.separator();
                ui.label(text("auto-cycle".to_string()));
            }
        });
    }
}

impl eframe::App for SentinelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        if ctx.input(|i| i.key_pressed(egui::Key::F1)) {
            self.show_overlay = !self.show_overlay;
        }

        self.poll_channel(now);
        let visible = self.sync_surface(ctx);
        if visible {
            let size = self.pipeline.render_dimensions();
            let display = self.pipeline.frame(now);
            self.presenter.upload(ctx, size, display);
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(Color32::BLACK))
            .show(ctx, |ui| {
                if visible {
                    self.presenter.paint(ui.painter(), ui.max_rect());
                }
                if self.show_overlay {
                    self.draw_overlay(ui);
                }
            });

        ctx.request_repaint();
    }
}
