use eframe::egui::{self, TextureHandle, Ui, Vec2};
use egui_plot::{Legend, Line, Plot, PlotBounds, PlotImage, PlotPoint, PlotPoints};

use crate::color;
use crate::data::model::Channel;
use crate::data::storage::ChannelTrace;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Live plot (central panel)
// ---------------------------------------------------------------------------

/// Show the blitted surface inside fixed plot axes.
///
/// Returns the pixel size the surface should have to fill the plot frame.
pub fn live_plot(ui: &mut Ui, state: &AppState, texture: Option<&TextureHandle>) -> Option<[u32; 2]> {
    let view = state.acquisition.renderer().surface().view().clone();
    let (x0, x1) = view.x_range;
    let (y0, y1) = view.y_range;

    let response = Plot::new("live_plot")
        .x_axis_label(view.x_label)
        .y_axis_label(view.y_label)
        .show_grid(false)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .allow_double_click_reset(false)
        .show(ui, |plot_ui| {
            plot_ui.set_plot_bounds(PlotBounds::from_min_max([x0, y0], [x1, y1]));
            if let Some(texture) = texture {
                let center = PlotPoint::new((x0 + x1) / 2.0, (y0 + y1) / 2.0);
                let size = Vec2::new((x1 - x0) as f32, (y1 - y0) as f32);
                plot_ui.image(PlotImage::new(texture.id(), center, size));
            }
        });

    let frame = response.transform.frame().size() * ui.ctx().pixels_per_point();
    if frame.x < 1.0 || frame.y < 1.0 {
        return None;
    }
    Some([frame.x.round() as u32, frame.y.round() as u32])
}

// ---------------------------------------------------------------------------
// Loaded capture viewer
// ---------------------------------------------------------------------------

fn trace_line(trace: &ChannelTrace, channel: Channel) -> Line {
    let points: PlotPoints = trace
        .elapsed
        .iter()
        .zip(trace.values.iter())
        .map(|(&t, &v)| [t, v])
        .collect();
    let name = match trace.wavelength {
        Some(w) => format!("{} ({w:.3} nm)", channel.label()),
        None => channel.label().to_string(),
    };
    Line::new(points)
        .name(name)
        .color(color::channel_color(channel))
        .width(1.5)
}

/// Window plotting a capture read back from disk. Closing it drops the data.
pub fn loaded_capture_window(ctx: &egui::Context, state: &mut AppState) {
    let Some((path, capture)) = &state.loaded else {
        return;
    };
    let mut open = true;
    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Loaded capture".to_string());
    egui::Window::new(title)
        .open(&mut open)
        .default_size([520.0, 320.0])
        .show(ctx, |ui| {
            if let Some(model) = &capture.line.instrument_model {
                ui.label(format!("Spectrometer: {model}"));
            }
            Plot::new("loaded_capture")
                .legend(Legend::default())
                .x_axis_label("Time (s)")
                .y_axis_label("Intensity (counts)")
                .show(ui, |plot_ui| {
                    plot_ui.line(trace_line(&capture.line, Channel::Line));
                    plot_ui.line(trace_line(&capture.background, Channel::Background));
                    plot_ui.line(trace_line(&capture.baseline, Channel::Baseline));
                });
        });
    if !open {
        state.loaded = None;
    }
}
