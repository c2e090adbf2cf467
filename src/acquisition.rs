//! The acquisition-and-render loop.
//!
//! ```text
//!             start()                       budget reached / stop / error
//!   Idle ──────────────▶ RunningSpectrum ─────────────────────────────────▶ Idle
//!     │                                                                     ▲
//!     └────────────────▶ RunningTimeSeries ─────────────────────────────────┘
//!         (mode = TimeSeries)     │ finalize capture → StepOutcome
//! ```
//!
//! One call to [`AcquisitionLoop::step`] is one iteration: check the stop
//! flag, pull a frame, update overlays, blit. Sampling and rendering never
//! overlap. The caller decides how iterations interleave with its own event
//! handling, either by calling `step` from its frame callback or by using
//! [`AcquisitionLoop::run_blocking`] with a yield hook.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::color;
use crate::config::{CaptureDuration, IntegrationTime, frame_budget};
use crate::data::capture::{CaptureBuffer, FinalizedCapture};
use crate::data::model::{Channel, WavelengthAxis};
use crate::data::selection::ChannelSelection;
use crate::data::storage::CaptureMetadata;
use crate::error::{AcquisitionError, ValidationError};
use crate::render::{Overlay, OverlayStyle, RingRenderer, Surface};
use crate::source::{SampleSource, SpectrometerDriver};

/// Index of the whole-spectrum overlay in the spectrum overlay set.
const SPECTRUM_OVERLAY: usize = 0;
/// Marker overlays follow the spectrum, one per channel.
const FIRST_MARKER_OVERLAY: usize = 1;

// ---------------------------------------------------------------------------
// Modes, states, outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Continuous full-axis display, nothing captured.
    #[default]
    Spectrum,
    /// Fixed-duration capture of the three channels.
    TimeSeries,
}

impl DisplayMode {
    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::Spectrum => DisplayMode::TimeSeries,
            DisplayMode::TimeSeries => DisplayMode::Spectrum,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DisplayMode::Spectrum => "Spectrum",
            DisplayMode::TimeSeries => "Time Series",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    RunningSpectrum,
    RunningTimeSeries,
}

/// A finished (or cut short) time series, ready for storage.
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub capture: FinalizedCapture,
    pub metadata: CaptureMetadata,
    pub frame_budget: u64,
}

impl CaptureReport {
    /// Whether every budgeted frame was captured.
    pub fn is_complete(&self) -> bool {
        self.capture.len() as u64 == self.frame_budget
    }
}

/// What one iteration did.
#[derive(Debug)]
pub enum StepOutcome {
    /// Nothing is running.
    Idle,
    /// One frame was sampled and rendered; more to come.
    Continue,
    /// The time series reached its frame budget.
    Finished(CaptureReport),
    /// The stop signal was honoured. Carries the partial capture, if any.
    Stopped(Option<CaptureReport>),
    /// A device or buffer error halted the loop. Whatever was captured is kept.
    Failed {
        error: AcquisitionError,
        partial: Option<CaptureReport>,
    },
}

// ---------------------------------------------------------------------------
// Clock and stop signal
// ---------------------------------------------------------------------------

/// Monotonic time source for elapsed-time stamps.
pub trait Clock {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// [`Instant`]-based clock; unaffected by wall-clock adjustments.
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Cooperative cancellation flag, checked at the top of every iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// AcquisitionLoop
// ---------------------------------------------------------------------------

struct TimeSeriesRun {
    started: Duration,
    indices: [usize; 3],
    capture: CaptureBuffer,
    metadata: CaptureMetadata,
    budget: u64,
}

impl TimeSeriesRun {
    fn into_report(self) -> CaptureReport {
        CaptureReport {
            capture: self.capture.finalize(),
            metadata: self.metadata,
            frame_budget: self.budget,
        }
    }

    fn into_partial(self) -> Option<CaptureReport> {
        if self.capture.is_empty() {
            None
        } else {
            Some(self.into_report())
        }
    }
}

enum Run {
    Idle,
    Spectrum,
    TimeSeries(TimeSeriesRun),
}

pub struct AcquisitionLoop<D, S: Surface, C = MonotonicClock> {
    source: SampleSource<D>,
    renderer: RingRenderer<S>,
    clock: C,
    mode: DisplayMode,
    run: Run,
    selection: ChannelSelection,
    duration: CaptureDuration,
    show_baseline: bool,
    stop: StopHandle,
}

impl<D: SpectrometerDriver, S: Surface, C: Clock> AcquisitionLoop<D, S, C> {
    /// Wrap an opened source and a render surface. Starts idle in spectrum
    /// mode with the default channel picks.
    pub fn new(
        source: SampleSource<D>,
        surface: S,
        clock: C,
        duration: CaptureDuration,
    ) -> Self {
        let selection = ChannelSelection::with_defaults(source.wavelengths());
        let mut acquisition = Self {
            source,
            renderer: RingRenderer::new(surface),
            clock,
            mode: DisplayMode::Spectrum,
            run: Run::Idle,
            selection,
            duration,
            show_baseline: true,
            stop: StopHandle::default(),
        };
        let overlays = acquisition.overlay_set(DisplayMode::Spectrum);
        acquisition.renderer.reset(overlays);
        acquisition
    }

    // -- overlay sets --

    /// Fresh overlays for a mode. Always built whole, never patched across a
    /// mode switch.
    fn overlay_set(&self, mode: DisplayMode) -> Vec<Overlay> {
        let id = self.renderer.surface().id();
        match mode {
            DisplayMode::Spectrum => {
                let mut set = vec![Overlay::new(
                    id,
                    OverlayStyle::Line { width: 1.0 },
                    color::spectrum_color(),
                )];
                for channel in Channel::ALL {
                    let mut marker = Overlay::new(
                        id,
                        OverlayStyle::VerticalMarker { width: 2.0 },
                        color::marker_color(channel),
                    );
                    marker.set_points([[self.selection.wavelength(channel), 0.0]]);
                    set.push(marker);
                }
                set
            }
            DisplayMode::TimeSeries => Channel::ALL
                .into_iter()
                .take(if self.show_baseline { 3 } else { 2 })
                .map(|channel| {
                    Overlay::new(
                        id,
                        OverlayStyle::Markers { size: 2.0, every: 1 },
                        color::channel_color(channel),
                    )
                })
                .collect(),
        }
    }

    // -- state --

    pub fn state(&self) -> LoopState {
        match self.run {
            Run::Idle => LoopState::Idle,
            Run::Spectrum => LoopState::RunningSpectrum,
            Run::TimeSeries(_) => LoopState::RunningTimeSeries,
        }
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.run, Run::Idle)
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Switch display mode while idle, letting `configure` adjust the surface
    /// (axes, grid) before the new overlay set recaptures the background.
    pub fn set_mode_with(
        &mut self,
        mode: DisplayMode,
        configure: impl FnOnce(&mut S),
    ) -> Result<(), AcquisitionError> {
        if self.is_running() {
            return Err(AcquisitionError::Busy);
        }
        configure(self.renderer.surface_mut());
        self.mode = mode;
        let overlays = self.overlay_set(mode);
        self.renderer.reset(overlays);
        log::info!("Display mode: {}", mode.label());
        Ok(())
    }

    pub fn set_mode(&mut self, mode: DisplayMode) -> Result<(), AcquisitionError> {
        self.set_mode_with(mode, |_| {})
    }

    pub fn show_baseline(&self) -> bool {
        self.show_baseline
    }

    /// Draw the baseline channel during time series (it is always captured).
    pub fn set_show_baseline(&mut self, show: bool) -> Result<(), AcquisitionError> {
        if matches!(self.run, Run::TimeSeries(_)) {
            return Err(AcquisitionError::Busy);
        }
        self.show_baseline = show;
        if self.mode == DisplayMode::TimeSeries {
            let overlays = self.overlay_set(self.mode);
            self.renderer.reset(overlays);
        }
        Ok(())
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    // -- parameters --

    pub fn integration_time(&self) -> IntegrationTime {
        self.source.integration_time()
    }

    /// Change the exposure. Refused during a time series, whose frame budget
    /// was derived from the old value.
    pub fn set_integration_time(&mut self, integration: IntegrationTime) -> Result<(), AcquisitionError> {
        if matches!(self.run, Run::TimeSeries(_)) {
            return Err(AcquisitionError::Busy);
        }
        self.source.set_integration_time(integration)?;
        Ok(())
    }

    pub fn duration(&self) -> CaptureDuration {
        self.duration
    }

    pub fn set_duration(&mut self, duration: CaptureDuration) -> Result<(), AcquisitionError> {
        if matches!(self.run, Run::TimeSeries(_)) {
            return Err(AcquisitionError::Busy);
        }
        self.duration = duration;
        Ok(())
    }

    /// Frames the next time series will take with the current settings.
    pub fn planned_frame_budget(&self) -> u64 {
        frame_budget(self.duration, self.source.integration_time())
    }

    pub fn selection(&self) -> &ChannelSelection {
        &self.selection
    }

    pub fn wavelengths(&self) -> &WavelengthAxis {
        self.source.wavelengths()
    }

    /// Move one channel to the wavelength typed by the user. A running time
    /// series keeps the indices it started with.
    pub fn set_channel_wavelength(
        &mut self,
        channel: Channel,
        text: &str,
        view: (f64, f64),
    ) -> Result<f64, ValidationError> {
        let axis = self.source.wavelengths().clone();
        let wavelength = self.selection.set_from_text(&axis, channel, text, view)?;
        if self.mode == DisplayMode::Spectrum {
            if let Some(marker) = self
                .renderer
                .overlay_mut(FIRST_MARKER_OVERLAY + channel.index())
            {
                marker.set_points([[wavelength, 0.0]]);
            }
            if !self.is_running() {
                self.renderer.update();
            }
        }
        Ok(wavelength)
    }

    /// Samples held by the running time series; 0 otherwise.
    pub fn captured_len(&self) -> usize {
        match &self.run {
            Run::TimeSeries(run) => run.capture.len(),
            _ => 0,
        }
    }

    pub fn source(&self) -> &SampleSource<D> {
        &self.source
    }

    /// Direct source access for one-off reads (e.g. Y rescaling) while idle.
    pub fn source_mut(&mut self) -> &mut SampleSource<D> {
        &mut self.source
    }

    pub fn renderer(&self) -> &RingRenderer<S> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut RingRenderer<S> {
        &mut self.renderer
    }

    // -- running --

    /// Leave `Idle` for the run matching the current display mode.
    pub fn start(&mut self) -> Result<(), AcquisitionError> {
        if self.is_running() {
            return Err(AcquisitionError::Busy);
        }
        self.stop.clear();
        match self.mode {
            DisplayMode::Spectrum => {
                let overlays = self.overlay_set(DisplayMode::Spectrum);
                self.renderer.reset(overlays);
                self.run = Run::Spectrum;
                log::info!("Spectrum acquisition started");
            }
            DisplayMode::TimeSeries => {
                let budget = self.planned_frame_budget();
                let capture = CaptureBuffer::with_capacity(budget as usize)?;
                let mut overlays = self.overlay_set(DisplayMode::TimeSeries);
                for overlay in &mut overlays {
                    overlay.reserve(budget as usize);
                }
                self.renderer.reset(overlays);
                let metadata = CaptureMetadata {
                    instrument_model: self.source.model(),
                    wavelengths: Channel::ALL.map(|c| self.selection.wavelength(c)),
                };
                self.run = Run::TimeSeries(TimeSeriesRun {
                    started: self.clock.now(),
                    indices: self.selection.indices(),
                    capture,
                    metadata,
                    budget,
                });
                log::info!(
                    "Time series started: {} frames at {} ms over {} s",
                    budget,
                    self.source.integration_time().as_millis(),
                    self.duration.as_secs_f64()
                );
            }
        }
        Ok(())
    }

    /// Run one iteration.
    pub fn step(&mut self) -> StepOutcome {
        let run = std::mem::replace(&mut self.run, Run::Idle);
        if matches!(run, Run::Idle) {
            return StepOutcome::Idle;
        }
        if self.stop.take() {
            return self.halt_stopped(run);
        }
        match run {
            Run::Idle => StepOutcome::Idle,
            Run::Spectrum => self.step_spectrum(),
            Run::TimeSeries(ts) => self.step_time_series(ts),
        }
    }

    /// Iterate until the run ends, calling `yield_now` between iterations so
    /// the caller can service its event loop.
    pub fn run_blocking(&mut self, mut yield_now: impl FnMut()) -> StepOutcome {
        loop {
            match self.step() {
                StepOutcome::Continue => yield_now(),
                other => return other,
            }
        }
    }

    fn halt_stopped(&mut self, run: Run) -> StepOutcome {
        match run {
            Run::TimeSeries(ts) => {
                log::info!(
                    "Time series stopped after {} of {} frames",
                    ts.capture.len(),
                    ts.budget
                );
                StepOutcome::Stopped(ts.into_partial())
            }
            _ => {
                log::info!("Spectrum acquisition stopped");
                StepOutcome::Stopped(None)
            }
        }
    }

    fn step_spectrum(&mut self) -> StepOutcome {
        let frame = match self.source.intensities() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Spectrum acquisition halted: {e}");
                return StepOutcome::Failed {
                    error: e.into(),
                    partial: None,
                };
            }
        };
        if let Some(line) = self.renderer.overlay_mut(SPECTRUM_OVERLAY) {
            line.set_points(frame.points());
        }
        self.renderer.update();
        self.run = Run::Spectrum;
        StepOutcome::Continue
    }

    fn step_time_series(&mut self, mut run: TimeSeriesRun) -> StepOutcome {
        let frame = match self.source.intensities() {
            Ok(frame) => frame,
            Err(e) => return Self::fail(e.into(), run),
        };
        let elapsed = self.clock.now().saturating_sub(run.started).as_secs_f64();
        let values = run.indices.map(|i| frame.at(i));
        if let Err(e) = run.capture.append(elapsed, values[0], values[1], values[2]) {
            return Self::fail(e.into(), run);
        }
        for (i, &value) in values.iter().enumerate() {
            if let Some(overlay) = self.renderer.overlay_mut(i) {
                overlay.push([elapsed, value]);
            }
        }
        self.renderer.update();

        if run.capture.len() as u64 >= run.budget {
            let report = run.into_report();
            log::info!(
                "Time series finished: {} frames in {:.3} s",
                report.capture.len(),
                report.capture.span_seconds()
            );
            return StepOutcome::Finished(report);
        }
        self.run = Run::TimeSeries(run);
        StepOutcome::Continue
    }

    fn fail(error: AcquisitionError, run: TimeSeriesRun) -> StepOutcome {
        log::error!(
            "Time series halted after {} of {} frames: {error}",
            run.capture.len(),
            run.budget
        );
        StepOutcome::Failed {
            error,
            partial: run.into_partial(),
        }
    }
}
