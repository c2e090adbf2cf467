use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::acquisition::DisplayMode;
use crate::color;
use crate::data::model::Channel;
use crate::device::Dialect;
use crate::state::{AppState, Status};

/// Single-line edit box that reports when the user commits the value.
fn commit_field(ui: &mut Ui, label: impl Into<RichText>, text: &mut String, enabled: bool) -> bool {
    ui.horizontal(|ui: &mut Ui| {
        let label: RichText = label.into();
        ui.label(label);
        let response = ui.add_enabled(enabled, egui::TextEdit::singleline(text).desired_width(80.0));
        response.lost_focus()
    })
    .inner
}

// ---------------------------------------------------------------------------
// Left side panel – spectrometer
// ---------------------------------------------------------------------------

pub fn spectrometer_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Spectrometer");
    ui.label(format!("Model: {}", state.acquisition.source().model()));
    ui.separator();

    let capturing = state.acquisition.mode() == DisplayMode::TimeSeries
        && state.acquisition.is_running();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.strong("Acquisition");
            if commit_field(ui, "Integration (ms)", &mut state.inputs.integration_ms, !capturing) {
                state.apply_integration();
            }
            if commit_field(ui, "Duration (s)", &mut state.inputs.duration_s, !capturing) {
                state.apply_duration();
            }
            ui.label(format!(
                "{} frames per capture",
                state.acquisition.planned_frame_budget()
            ));
            ui.separator();

            ui.strong("Channels");
            for channel in Channel::ALL {
                let label = RichText::new(format!("{} (nm)", channel.label()))
                    .color(color::channel_color(channel));
                if commit_field(ui, label, &mut state.inputs.channels[channel.index()], true) {
                    state.apply_channel(channel);
                }
            }
            let mut show_baseline = state.acquisition.show_baseline();
            if ui
                .add_enabled(
                    !capturing,
                    egui::Checkbox::new(&mut show_baseline, "Plot baseline"),
                )
                .changed()
            {
                state.set_show_baseline(show_baseline);
            }
            ui.separator();

            ui.strong("Wavelength view");
            let min_done = commit_field(ui, "Min (nm)", &mut state.inputs.wavelength_min, true);
            let max_done = commit_field(ui, "Max (nm)", &mut state.inputs.wavelength_max, true);
            if min_done || max_done {
                state.apply_wavelength_bounds();
            }
            ui.horizontal(|ui: &mut Ui| {
                if ui.button("Rescale Y").clicked() {
                    state.rescale_y();
                }
                if ui.button("Fullscale Y").clicked() {
                    state.fullscale_y();
                }
                if ui.button("Fullscale X").clicked() {
                    state.fullscale_x();
                }
            });
        });
}

// ---------------------------------------------------------------------------
// Right side panel – power supply
// ---------------------------------------------------------------------------

pub fn supply_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Power supply");
    ui.separator();

    let connected = state.channel.is_open();
    let current_dialect = state.channel.settings().dialect;
    ui.add_enabled_ui(!connected, |ui: &mut Ui| {
        egui::ComboBox::from_label("Model")
            .selected_text(current_dialect.name())
            .show_ui(ui, |ui: &mut Ui| {
                for dialect in [Dialect::BkPrecision, Dialect::Mastech] {
                    if ui
                        .selectable_label(current_dialect == dialect, dialect.name())
                        .clicked()
                    {
                        state.channel.set_dialect(dialect);
                    }
                }
            });

        let current_port = state.channel.settings().port.clone().unwrap_or_default();
        ui.horizontal(|ui: &mut Ui| {
            egui::ComboBox::from_id_salt("serial_port")
                .selected_text(current_port.as_str())
                .show_ui(ui, |ui: &mut Ui| {
                    for port in state.ports.clone() {
                        if ui.selectable_label(current_port == port, port.as_str()).clicked() {
                            state.channel.select_port(port);
                        }
                    }
                });
            if ui.small_button("⟳").on_hover_text("Rescan ports").clicked() {
                state.refresh_ports();
            }
        });
    });

    let toggle_text = if connected { "Disconnect" } else { "Connect" };
    if ui.selectable_label(connected, toggle_text).clicked() {
        state.toggle_connection();
    }
    ui.add_enabled_ui(connected, |ui: &mut Ui| {
        if ui.button("Query max ratings").clicked() {
            state.query_max_ratings();
        }
    });
    if ui
        .button(RichText::new("STOP supply").strong().color(Color32::RED))
        .on_hover_text("Send the stop command, connecting first if needed")
        .clicked()
    {
        state.emergency_stop();
    }
    ui.separator();

    ui.strong("Console");
    let sent = ui
        .horizontal(|ui: &mut Ui| {
            let edit = ui.add_enabled(
                connected,
                egui::TextEdit::singleline(&mut state.inputs.console).desired_width(140.0),
            );
            let enter = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            ui.add_enabled(connected, egui::Button::new("Send")).clicked() || enter
        })
        .inner;
    if sent {
        state.send_console();
    }
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui: &mut Ui| {
            for entry in state.channel.transcript() {
                ui.monospace(entry.to_string());
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Load capture…").clicked() {
                load_file_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.pending_save.is_some(), egui::Button::new("Save capture…"))
                .clicked()
            {
                save_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        let running = state.acquisition.is_running();
        let mode = state.acquisition.mode();
        if ui
            .add_enabled(
                !running,
                egui::Button::new(format!("Mode: {}", mode.label())),
            )
            .on_hover_text("Switch between spectrum and time series")
            .clicked()
        {
            state.toggle_mode();
        }
        let run_text = if running { "Stop" } else { "Start" };
        if ui.selectable_label(running, run_text).clicked() {
            state.start_stop();
        }
        if ui
            .add_enabled(!running, egui::Button::new("Measure"))
            .on_hover_text("Time series with the power-supply program")
            .clicked()
        {
            state.measure();
        }

        if running && mode == DisplayMode::TimeSeries {
            ui.separator();
            ui.label(format!(
                "{} / {} frames",
                state.acquisition.captured_len(),
                state.acquisition.planned_frame_budget()
            ));
        }
    });
}

/// Bottom status line.
pub fn status_bar(ui: &mut Ui, state: &AppState) {
    match &state.status {
        Some(Status::Info(msg)) => {
            ui.label(msg.as_str());
        }
        Some(Status::Error(msg)) => {
            ui.label(RichText::new(msg).color(Color32::RED));
        }
        None => {
            ui.label(format!(
                "{} ports found",
                state.ports.len()
            ));
        }
    }
}

/// Ask what to do with a capture that has not been written yet.
pub fn save_prompt(ctx: &egui::Context, state: &mut AppState) {
    let Some(report) = &state.pending_save else {
        return;
    };
    let summary = if report.is_complete() {
        format!("{} frames captured.", report.capture.len())
    } else {
        format!(
            "Partial capture: {} of {} frames.",
            report.capture.len(),
            report.frame_budget
        )
    };
    egui::Window::new("Save capture")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui: &mut Ui| {
            ui.label(summary);
            ui.horizontal(|ui: &mut Ui| {
                if ui.button("Save…").clicked() {
                    save_file_dialog(state);
                }
                if ui.button("Discard").clicked() {
                    state.discard_pending();
                }
            });
        });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn save_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Save capture (three files: …line, …bkg, …base)")
        .add_filter("Text", &["txt", "csv"])
        .set_file_name("capture.txt")
        .save_file();
    if let Some(path) = file {
        state.save_pending(&path);
    }
}

pub fn load_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Load capture (pick the base name, e.g. capture.txt)")
        .add_filter("Text", &["txt", "csv"])
        .pick_file();
    if let Some(path) = file {
        state.load_capture(&path);
    }
}
