use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::acquisition::{AcquisitionLoop, CaptureReport, DisplayMode, StepOutcome};
use crate::config::{CaptureDuration, IntegrationTime, Settings};
use crate::data::model::Channel;
use crate::data::storage::{LoadedCapture, capture_base, load_capture, save_capture};
use crate::device::{DeviceCommandChannel, PowerSupplyCommand};
use crate::error::ChannelError;
use crate::render::RasterSurface;
use crate::source::SpectrometerDriver;
use crate::view::ViewState;

/// The loop the window drives: any boxed driver onto the raster surface.
pub type LiveAcquisition = AcquisitionLoop<Box<dyn SpectrometerDriver>, RasterSurface>;

// ---------------------------------------------------------------------------
// Status line
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Info(String),
    Error(String),
}

/// Text currently typed into the edit boxes. Reverted to the applied value
/// whenever a parse or range check fails.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub integration_ms: String,
    pub duration_s: String,
    pub wavelength_min: String,
    pub wavelength_max: String,
    pub channels: [String; 3],
    pub console: String,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub acquisition: LiveAcquisition,
    pub channel: DeviceCommandChannel,
    pub view: ViewState,
    pub inputs: Inputs,

    /// Serial ports found by the last scan.
    pub ports: Vec<String>,

    /// Status / error message shown in the UI.
    pub status: Option<Status>,

    /// Capture waiting for the user to pick a file name.
    pub pending_save: Option<CaptureReport>,

    /// Capture read back from disk for inspection.
    pub loaded: Option<(PathBuf, LoadedCapture)>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        settings_path: PathBuf,
        acquisition: LiveAcquisition,
        channel: DeviceCommandChannel,
    ) -> Self {
        let source = acquisition.source();
        let view = ViewState::new(source.wavelengths(), source.max_intensity());
        let mut state = Self {
            settings,
            settings_path,
            acquisition,
            channel,
            view,
            inputs: Inputs::default(),
            ports: Vec::new(),
            status: None,
            pending_save: None,
            loaded: None,
        };
        state.revert_inputs();
        state.apply_view();
        state
    }

    fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::info!("{message}");
        self.status = Some(Status::Info(message));
    }

    fn report(&mut self, what: &str, error: impl Display) {
        log::warn!("{what}: {error}");
        self.status = Some(Status::Error(format!("{what}: {error}")));
    }

    /// Reset every edit box to the value actually in effect.
    pub fn revert_inputs(&mut self) {
        self.inputs.integration_ms = self.acquisition.integration_time().as_millis().to_string();
        self.inputs.duration_s = self.acquisition.duration().as_secs_f64().to_string();
        let (min, max) = self.view.wavelength_range;
        self.inputs.wavelength_min = format!("{min:.3}");
        self.inputs.wavelength_max = format!("{max:.3}");
        for channel in Channel::ALL {
            self.inputs.channels[channel.index()] =
                format!("{:.3}", self.acquisition.selection().wavelength(channel));
        }
    }

    /// Push the current axis limits to the surface and redraw the static layer.
    pub fn apply_view(&mut self) {
        let view = self
            .view
            .plot_view(self.acquisition.mode(), self.acquisition.duration());
        let renderer = self.acquisition.renderer_mut();
        renderer.surface_mut().set_view(view);
        renderer.on_surface_invalidated();
    }

    // -- run control --

    pub fn toggle_mode(&mut self) {
        let mode = self.acquisition.mode().toggled();
        let view = self.view.plot_view(mode, self.acquisition.duration());
        if let Err(e) = self
            .acquisition
            .set_mode_with(mode, |surface| surface.set_view(view))
        {
            self.report("Cannot switch mode", e);
        }
    }

    /// Start acquiring in the current mode, or stop the running acquisition.
    pub fn start_stop(&mut self) {
        if self.acquisition.is_running() {
            self.acquisition.request_stop();
            return;
        }
        match self.acquisition.start() {
            Ok(()) => self.status = None,
            Err(e) => self.report("Cannot start", e),
        }
    }

    /// Time series plus the power-supply program, started together.
    pub fn measure(&mut self) {
        if self.acquisition.is_running() {
            self.report("Cannot measure", "acquisition is running; stop it first");
            return;
        }
        if !self.channel.is_open() {
            self.report("Cannot measure", ChannelError::NotConnected);
            return;
        }
        if self.acquisition.mode() != DisplayMode::TimeSeries {
            self.toggle_mode();
        }
        if let Err(e) = self.channel.start_program() {
            self.report("Power supply did not start", e);
            return;
        }
        self.start_stop();
    }

    pub fn emergency_stop(&mut self) {
        match self.channel.emergency_stop() {
            Ok(()) => self.info("Stop sent to power supply"),
            Err(e) => self.report("Emergency stop failed", e),
        }
    }

    /// Run iterations for up to `slice`, then return so the window can repaint.
    /// Returns whether acquisition is still running.
    pub fn poll(&mut self, slice: Duration) -> bool {
        let started = Instant::now();
        while self.acquisition.is_running() {
            match self.acquisition.step() {
                StepOutcome::Continue => {
                    if started.elapsed() >= slice {
                        break;
                    }
                }
                outcome => {
                    self.handle_outcome(outcome);
                    break;
                }
            }
        }
        self.acquisition.is_running()
    }

    fn handle_outcome(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Idle | StepOutcome::Continue => {}
            StepOutcome::Finished(report) => {
                self.info(format!(
                    "Captured {} frames in {:.2} s",
                    report.capture.len(),
                    report.capture.span_seconds()
                ));
                self.pending_save = Some(report);
            }
            StepOutcome::Stopped(Some(report)) => {
                self.info(format!(
                    "Stopped after {} of {} frames",
                    report.capture.len(),
                    report.frame_budget
                ));
                self.pending_save = Some(report);
            }
            StepOutcome::Stopped(None) => self.info("Stopped"),
            StepOutcome::Failed { error, partial } => {
                let kept = partial.as_ref().map_or(0, |r| r.capture.len());
                self.report(&format!("Acquisition halted ({kept} frames kept)"), error);
                self.pending_save = partial;
            }
        }
    }

    // -- parameters --

    pub fn apply_integration(&mut self) {
        let result = IntegrationTime::parse_millis(&self.inputs.integration_ms)
            .map_err(|e| e.to_string())
            .and_then(|t| {
                self.acquisition
                    .set_integration_time(t)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            self.report("Integration time rejected", e);
        }
        self.revert_inputs();
    }

    pub fn apply_duration(&mut self) {
        let result = CaptureDuration::parse_seconds(&self.inputs.duration_s)
            .map_err(|e| e.to_string())
            .and_then(|d| self.acquisition.set_duration(d).map_err(|e| e.to_string()));
        match result {
            Ok(()) => {
                if self.acquisition.mode() == DisplayMode::TimeSeries {
                    self.apply_view();
                }
            }
            Err(e) => self.report("Duration rejected", e),
        }
        self.revert_inputs();
    }

    pub fn apply_wavelength_bounds(&mut self) {
        let axis = self.acquisition.wavelengths().clone();
        match self.view.set_wavelength_range(
            &self.inputs.wavelength_min,
            &self.inputs.wavelength_max,
            &axis,
        ) {
            Ok(_) => {
                if self.acquisition.mode() == DisplayMode::Spectrum {
                    self.apply_view();
                }
            }
            Err(e) => self.report("Wavelength bounds rejected", e),
        }
        self.revert_inputs();
    }

    pub fn apply_channel(&mut self, channel: Channel) {
        let text = self.inputs.channels[channel.index()].clone();
        let view = self.view.wavelength_range;
        if let Err(e) = self.acquisition.set_channel_wavelength(channel, &text, view) {
            self.report(&format!("{} wavelength rejected", channel.label()), e);
        }
        self.revert_inputs();
    }

    pub fn set_show_baseline(&mut self, show: bool) {
        if let Err(e) = self.acquisition.set_show_baseline(show) {
            self.report("Cannot change traces", e);
        }
    }

    // -- view --

    /// Fit the y axis of the current mode to a freshly read frame.
    pub fn rescale_y(&mut self) {
        let frame = match self.acquisition.source_mut().intensities() {
            Ok(frame) => frame,
            Err(e) => {
                self.report("Rescale failed", e);
                return;
            }
        };
        let mode = self.acquisition.mode();
        if self
            .view
            .rescale_y(mode, &frame, self.acquisition.selection())
        {
            self.apply_view();
        }
    }

    pub fn fullscale_y(&mut self) {
        let max = self.acquisition.source().max_intensity();
        self.view.fullscale_y(self.acquisition.mode(), max);
        self.apply_view();
    }

    pub fn fullscale_x(&mut self) {
        let axis = self.acquisition.wavelengths().clone();
        self.view.fullscale_x(&axis);
        self.revert_inputs();
        self.apply_view();
    }

    // -- power supply --

    pub fn refresh_ports(&mut self) {
        self.ports = DeviceCommandChannel::available_ports();
        if self.channel.settings().port.is_none() {
            if let Some(first) = self.ports.first().cloned() {
                self.channel.select_port(first);
            }
        }
    }

    pub fn toggle_connection(&mut self) {
        match self.channel.toggle() {
            Ok(true) => self.info("Power supply connected"),
            Ok(false) => self.info("Power supply disconnected"),
            Err(e) => self.report("Connection failed", e),
        }
    }

    pub fn query_max_ratings(&mut self) {
        match self.channel.max_ratings() {
            Ok(r) => self.info(format!("Supply maximum {} V, {} A", r.volts, r.amps)),
            Err(e) => self.report("Query failed", e),
        }
    }

    /// Send whatever is typed in the console box as a raw command.
    pub fn send_console(&mut self) {
        let text = std::mem::take(&mut self.inputs.console);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if let Err(e) = self.channel.issue(&PowerSupplyCommand::Raw(text.to_string())) {
            self.report("Send failed", e);
        }
    }

    // -- files --

    /// Write the pending capture as a channel triple next to `base`.
    pub fn save_pending(&mut self, base: &Path) {
        let Some(report) = self.pending_save.take() else {
            return;
        };
        match save_capture(
            base,
            &report.capture,
            &report.metadata,
            self.settings.output_decimals,
        ) {
            Ok(paths) => self.info(format!("Saved {} files", paths.len())),
            Err(e) => {
                self.report("Save failed", format!("{e:#}"));
                self.pending_save = Some(report);
            }
        }
    }

    pub fn discard_pending(&mut self) {
        if self.pending_save.take().is_some() {
            self.info("Capture discarded");
        }
    }

    /// Load a saved triple. Any of its three files, or the base name, works.
    pub fn load_capture(&mut self, path: &Path) {
        let base = capture_base(path);
        match load_capture(&base) {
            Ok(capture) => {
                self.info(format!(
                    "Loaded {} samples from {}",
                    capture.line.values.len(),
                    base.display()
                ));
                self.loaded = Some((base, capture));
            }
            Err(e) => self.report("Load failed", format!("{e:#}")),
        }
    }

    /// Copy the values in effect back into the settings and write them out.
    pub fn persist_settings(&mut self) {
        self.settings.integration_time_ms =
            self.acquisition.integration_time().as_millis() as u32;
        self.settings.capture_duration_s = self.acquisition.duration().as_secs_f64();
        self.settings.serial = self.channel.settings().clone();
        if let Err(e) = self.settings.save(&self.settings_path) {
            log::warn!("Could not save settings: {e:#}");
        }
    }
}
