use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use eframe::egui;

use spectrolive::acquisition::{AcquisitionLoop, DisplayMode, MonotonicClock};
use spectrolive::app::SpectroliveApp;
use spectrolive::config::Settings;
use spectrolive::device::DeviceCommandChannel;
use spectrolive::headless;
use spectrolive::render::RasterSurface;
use spectrolive::source::{SampleSource, SimulatedSpectrometer, SpectrometerDriver};
use spectrolive::state::AppState;
use spectrolive::view::ViewState;

#[derive(Parser, Debug)]
#[command(version, about = "Live spectrometer display and time-series capture")]
struct Args {
    /// Settings file (created on exit if missing)
    #[arg(long, default_value = "spectrolive.json")]
    config: PathBuf,

    /// Serial port of the power supply
    #[arg(long)]
    port: Option<String>,

    /// Capture one time series without a window and exit
    #[arg(long)]
    headless: bool,

    /// Capture duration in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Integration time in milliseconds
    #[arg(long)]
    integration_ms: Option<u32>,

    /// Base path for headless output (`run.txt` → `runline.txt`, …)
    #[arg(long, default_value = "capture.txt")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut settings = Settings::load(&args.config)?;
    if let Some(port) = args.port {
        settings.serial.port = Some(port);
    }
    if let Some(ms) = args.integration_ms {
        settings.integration_time_ms = ms;
    }
    if let Some(seconds) = args.duration {
        settings.capture_duration_s = seconds;
    }
    let settings = settings.validated()?;

    let driver: Box<dyn SpectrometerDriver> = Box::new(
        SimulatedSpectrometer::new(settings.simulation.clone()).context("no spectrometer")?,
    );
    let source =
        SampleSource::open(driver, settings.integration_time()).context("no spectrometer")?;

    if args.headless {
        let written = headless::run_capture(source, &settings, &args.output)?;
        for path in written {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let duration = settings.capture_duration()?;
    let view = ViewState::new(source.wavelengths(), source.max_intensity());
    let surface = RasterSurface::new(800, 500, view.plot_view(DisplayMode::Spectrum, duration))?;
    let acquisition = AcquisitionLoop::new(source, surface, MonotonicClock::default(), duration);
    let channel = DeviceCommandChannel::new(settings.serial.clone());
    let state = AppState::new(settings, args.config, acquisition, channel);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 500.0]),
        vsync: false,
        ..Default::default()
    };

    eframe::run_native(
        "Spectrolive",
        options,
        Box::new(|_cc| Ok(Box::new(SpectroliveApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("window failed: {e}"))
}
