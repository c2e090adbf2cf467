//! Windowless capture: one time series, straight to disk.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::acquisition::{AcquisitionLoop, DisplayMode, MonotonicClock, StepOutcome};
use crate::config::Settings;
use crate::data::storage::save_capture;
use crate::render::RasterSurface;
use crate::source::{SampleSource, SpectrometerDriver};
use crate::view::ViewState;

/// Offscreen surface size; the frames are never shown.
const SURFACE_SIZE: (u32, u32) = (320, 240);

/// Run one time series with `settings` and write the channel triple at
/// `output`. A run cut short by a device error still saves what it got and
/// then reports the error.
pub fn run_capture<D: SpectrometerDriver>(
    source: SampleSource<D>,
    settings: &Settings,
    output: &Path,
) -> Result<Vec<PathBuf>> {
    let duration = settings.capture_duration()?;
    let view = ViewState::new(source.wavelengths(), source.max_intensity());
    let surface = RasterSurface::new(
        SURFACE_SIZE.0,
        SURFACE_SIZE.1,
        view.plot_view(DisplayMode::TimeSeries, duration),
    )?;
    let mut acquisition = AcquisitionLoop::new(source, surface, MonotonicClock::default(), duration);
    acquisition.set_mode(DisplayMode::TimeSeries)?;
    acquisition.start()?;

    let budget = acquisition.planned_frame_budget();
    let mut frames = 0u64;
    let outcome = acquisition.run_blocking(|| {
        frames += 1;
        if frames % 100 == 0 {
            log::info!("{frames} / {budget} frames");
        }
    });

    let (report, error) = match outcome {
        StepOutcome::Finished(report) => (report, None),
        StepOutcome::Stopped(Some(report)) => (report, None),
        StepOutcome::Failed {
            error,
            partial: Some(report),
        } => (report, Some(error)),
        StepOutcome::Failed {
            error,
            partial: None,
        } => return Err(error).context("capture failed before the first frame"),
        StepOutcome::Stopped(None) | StepOutcome::Idle | StepOutcome::Continue => {
            bail!("capture ended without data")
        }
    };

    let written = save_capture(output, &report.capture, &report.metadata, settings.output_decimals)?;
    if let Some(error) = error {
        return Err(error).context(format!(
            "capture halted after {} of {} frames (partial data saved)",
            report.capture.len(),
            report.frame_budget
        ));
    }
    Ok(written)
}
