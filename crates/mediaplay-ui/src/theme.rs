// crates/mediaplay-ui/src/theme.rs
//
// A dark-palette-plus-accent theme, trimmed to what a single-view playback
// window actually needs.

use egui::{Color32, Context, Stroke, Style, Visuals};

pub const ACCENT: Color32 = Color32::from_rgb(255, 160, 50);
pub const DARK_BG_0: Color32 = Color32::from_rgb(14, 14, 16);
pub const DARK_BG_1: Color32 = Color32::from_rgb(20, 20, 24);
pub const DARK_BG_2: Color32 = Color32::from_rgb(28, 28, 34);
pub const DARK_TEXT_DIM: Color32 = Color32::from_rgb(120, 120, 138);
pub const DARK_BORDER: Color32 = Color32::from_rgb(55, 55, 68);

pub fn configure_style(ctx: &Context) {
    let mut style = Style::default();
    style.spacing.item_spacing = egui::vec2(6.0, 5.0);
    style.spacing.button_padding = egui::vec2(10.0, 5.0);

    let mut v = Visuals::dark();
    v.panel_fill = DARK_BG_1;
    v.window_fill = DARK_BG_2;
    v.faint_bg_color = DARK_BG_0;
    v.extreme_bg_color = DARK_BG_0;
    v.window_stroke = Stroke::new(1.0, DARK_BORDER);
    v.selection.bg_fill = ACCENT;
    v.override_text_color = Some(Color32::from_rgb(220, 220, 230));

    ctx.set_visuals(v);
    ctx.set_style(style);
}
