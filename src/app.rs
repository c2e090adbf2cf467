use std::time::Duration;

use eframe::egui::{self, TextureHandle, TextureOptions};

use crate::state::AppState;
use crate::ui::{panels, plot};

/// Acquisition time spent per UI frame before handing control back to egui.
const FRAME_SLICE: Duration = Duration::from_millis(15);

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct SpectroliveApp {
    pub state: AppState,
    texture: Option<TextureHandle>,
}

impl SpectroliveApp {
    pub fn new(mut state: AppState) -> Self {
        state.refresh_ports();
        Self {
            state,
            texture: None,
        }
    }

    /// Copy the last presented surface frame into the GPU texture.
    fn upload_frame(&mut self, ctx: &egui::Context) -> bool {
        let surface = self.state.acquisition.renderer_mut().surface_mut();
        let Some(image) = surface.take_presented() else {
            return false;
        };
        match &mut self.texture {
            Some(texture) => texture.set(image, TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("live_surface", image, TextureOptions::LINEAR));
            }
        }
        true
    }

    /// Match the surface to the plot frame; a new size invalidates the background.
    fn fit_surface(&mut self, size: [u32; 2]) {
        let renderer = self.state.acquisition.renderer_mut();
        match renderer.surface_mut().resize(size[0], size[1]) {
            Ok(true) => {
                log::debug!("Plot surface resized to {}x{}", size[0], size[1]);
                renderer.on_surface_invalidated();
            }
            Ok(false) => {}
            Err(e) => log::warn!("{e:#}"),
        }
    }
}

impl eframe::App for SpectroliveApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let running = self.state.poll(FRAME_SLICE);
        self.upload_frame(ctx);

        // ---- Top panel: menu bar and run controls ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Bottom panel: status line ----
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            panels::status_bar(ui, &self.state);
        });

        // ---- Left side panel: spectrometer ----
        egui::SidePanel::left("spectrometer_panel")
            .default_width(230.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::spectrometer_panel(ui, &mut self.state);
            });

        // ---- Right side panel: power supply ----
        egui::SidePanel::right("supply_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::supply_panel(ui, &mut self.state);
            });

        // ---- Central panel: live plot ----
        let wanted = egui::CentralPanel::default()
            .show(ctx, |ui| plot::live_plot(ui, &self.state, self.texture.as_ref()))
            .inner;
        if let Some(size) = wanted {
            self.fit_surface(size);
        }

        plot::loaded_capture_window(ctx, &mut self.state);
        panels::save_prompt(ctx, &mut self.state);

        // Anything drawn by the panels this frame goes out on the next one.
        if self.upload_frame(ctx) || running {
            ctx.request_repaint();
        }

        if ctx.input(|i| i.viewport().close_requested()) {
            self.state.persist_settings();
        }
    }
}
