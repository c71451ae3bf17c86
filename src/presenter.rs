//! Uploads the compositor's image to an egui texture and stretches it over
//! the window.

use eframe::egui::{self, Color32, ColorImage, Rect, TextureHandle, TextureOptions};

use crate::types::Rgb;

/// Internal render size for a window surface of `surface` physical pixels.
/// `None` when the surface has no area.
pub fn render_size(surface: [f32; 2], render_scale: f32, max_dim: usize) -> Option<[usize; 2]> {
    let [w, h] = surface;
    if !(w.is_finite() && h.is_finite()) || w < 1.0 || h < 1.0 {
        return None;
    }
    let mut scale = if render_scale.is_finite() && render_scale > 0.0 {
        render_scale
    } else {
        1.0
    };
    let longest = w.max(h) * scale;
    let cap = max_dim.max(1) as f32;
    if longest > cap {
        scale *= cap / longest;
    }
    let width = ((w * scale).round() as usize).max(1);
    let height = ((h * scale).round() as usize).max(1);
    Some([width, height])
}

/// Packs tone-mapped linear colour into opaque RGBA8, reusing `out`.
pub fn to_rgba8(display: &[Rgb], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(display.len() * 4);
    for &[r, g, b] in display {
        out.extend_from_slice(&[channel_u8(r), channel_u8(g), channel_u8(b), 255]);
    }
}

#[inline]
fn channel_u8(value: f32) -> u8 {
    // NaN saturates to 0 through `as`.
    (value.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

#[derive(Default)]
pub struct Presenter {
    texture: Option<TextureHandle>,
    rgba: Vec<u8>,
}

impl Presenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the texture contents with `display` (`size` = `[w, h]`).
    pub fn upload(&mut self, ctx: &egui::Context, size: [usize; 2], display: &[Rgb]) {
        if size[0] * size[1] != display.len() || display.is_empty() {
            return;
        }
        to_rgba8(display, &mut self.rgba);
        let image = ColorImage::from_rgba_unmultiplied(size, &self.rgba);

        if let Some(texture) = &mut self.texture {
            texture.set(image, TextureOptions::LINEAR);
        } else {
            self.texture = Some(ctx.load_texture("sentinel-entity", image, TextureOptions::LINEAR));
        }
    }

    /// Draws the last uploaded frame stretched over `rect`.
    pub fn paint(&self, painter: &egui::Painter, rect: Rect) {
        if let Some(texture) = &self.texture {
            let uv = Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            painter.image(texture.id(), rect, uv, Color32::WHITE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_size_scales_and_caps() {
        assert_eq!(render_size([800.0, 600.0], 0.5, 512), Some([400, 300]));
        assert_eq!(render_size([3840.0, 2160.0], 0.5, 512), Some([512, 288]));
        assert_eq!(render_size([100.0, 50.0], f32::NAN, 512), Some([100, 50]));
    }

    #[test]
    fn zero_sized_surface_is_skipped() {
        assert_eq!(render_size([0.0, 600.0], 0.5, 512), None);
        assert_eq!(render_size([800.0, 0.0], 0.5, 512), None);
        assert_eq!(render_size([f32::NAN, 10.0], 0.5, 512), None);
    }

    #[test]
    fn rgba_packing_clamps_and_is_opaque() {
        let mut out = vec![9; 3];
        to_rgba8(&[[0.0, 0.5, 1.0], [2.0, -1.0, f32::NAN]], &mut out);
        assert_eq!(out, vec![0, 128, 255, 255, 255, 0, 0, 255]);
    }
}
