use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use spectrolive::acquisition::{AcquisitionLoop, DisplayMode, LoopState, MonotonicClock};
use spectrolive::config::{SerialSettings, Settings};
use spectrolive::device::{DeviceCommandChannel, Dialect, TranscriptEntry};
use spectrolive::error::ChannelError;
use spectrolive::render::RasterSurface;
use spectrolive::source::simulated::SimulationSettings;
use spectrolive::source::{SampleSource, SimulatedSpectrometer, SpectrometerDriver};
use spectrolive::state::{AppState, Status};
use spectrolive::view::ViewState;

/// Serial double: keeps what was written, answers from a script.
#[derive(Clone, Default)]
struct ScriptedLink {
    written: Arc<Mutex<Vec<u8>>>,
    replies: Arc<Mutex<VecDeque<u8>>>,
    broken: bool,
}

impl ScriptedLink {
    fn reply(&self, bytes: &[u8]) {
        self.replies.lock().unwrap().extend(bytes.iter().copied());
    }

    fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }
}

impl Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.replies.lock().unwrap().pop_front() {
            Some(b) => {
                buf[0] = b;
                Ok(1)
            }
            None => Err(io::Error::new(io::ErrorKind::TimedOut, "no reply")),
        }
    }
}

impl Write for ScriptedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.broken {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn app_state(dialect: Dialect) -> AppState {
    let dir = std::env::temp_dir();
    let settings = Settings {
        integration_time_ms: 5,
        capture_duration_s: 0.05,
        serial: SerialSettings {
            dialect,
            ..SerialSettings::default()
        },
        simulation: SimulationSettings {
            pixels: 64,
            paced: false,
            ..SimulationSettings::default()
        },
        ..Settings::default()
    };
    let driver: Box<dyn SpectrometerDriver> =
        Box::new(SimulatedSpectrometer::new(settings.simulation.clone()).unwrap());
    let source = SampleSource::open(driver, settings.integration_time()).unwrap();
    let duration = settings.capture_duration().unwrap();
    let view = ViewState::new(source.wavelengths(), source.max_intensity());
    let surface = RasterSurface::new(64, 48, view.plot_view(DisplayMode::Spectrum, duration)).unwrap();
    let acquisition = AcquisitionLoop::new(source, surface, MonotonicClock::default(), duration);
    let channel = DeviceCommandChannel::new(settings.serial.clone());
    AppState::new(
        settings,
        dir.join("spectrolive-test-settings.json"),
        acquisition,
        channel,
    )
}

#[test]
fn measure_starts_bk_program_then_capture() {
    let mut state = app_state(Dialect::BkPrecision);
    let link = ScriptedLink::default();
    link.reply(b"OK\rOK\r");
    state.channel.attach(Box::new(link.clone()));

    state.measure();

    assert_eq!(link.written(), b"SOUT000\rRUNP000001\r");
    assert_eq!(state.acquisition.mode(), DisplayMode::TimeSeries);
    assert_eq!(state.acquisition.state(), LoopState::RunningTimeSeries);
    let received = state
        .channel
        .transcript()
        .iter()
        .filter(|e| matches!(e, TranscriptEntry::Received(_)))
        .count();
    assert_eq!(received, 2);
}

#[test]
fn measure_on_mastech_runs_slot() {
    let mut state = app_state(Dialect::Mastech);
    let link = ScriptedLink::default();
    state.channel.attach(Box::new(link.clone()));
    state.measure();
    assert_eq!(link.written(), b"R 1\r");
    assert!(state.acquisition.is_running());
}

#[test]
fn failed_write_does_not_start_capture() {
    let mut state = app_state(Dialect::BkPrecision);
    state.channel.attach(Box::new(ScriptedLink {
        broken: true,
        ..ScriptedLink::default()
    }));
    state.measure();
    assert_eq!(state.acquisition.state(), LoopState::Idle);
    assert!(matches!(state.status, Some(Status::Error(_))));
}

#[test]
fn emergency_stop_uses_dialect_stop() {
    let mut state = app_state(Dialect::Mastech);
    let link = ScriptedLink::default();
    state.channel.attach(Box::new(link.clone()));
    state.emergency_stop();
    assert_eq!(link.written(), vec![0x1b]);
}

#[test]
fn emergency_stop_without_port_reports() {
    let mut channel = DeviceCommandChannel::new(SerialSettings::default());
    assert!(matches!(
        channel.emergency_stop(),
        Err(ChannelError::NoPortSelected)
    ));
}

#[test]
fn max_ratings_over_the_link() {
    let mut channel = DeviceCommandChannel::new(SerialSettings::default());
    let link = ScriptedLink::default();
    link.reply(b"300500\rOK\r");
    channel.attach(Box::new(link.clone()));
    let ratings = channel.max_ratings().unwrap();
    assert_eq!(ratings.volts, 30.0);
    assert_eq!(ratings.amps, 5.0);
    assert_eq!(link.written(), b"GMAX00\r");
}

#[test]
fn mastech_console_shows_supply_answer() {
    let mut state = app_state(Dialect::Mastech);
    let link = ScriptedLink::default();
    link.reply(b"V=12.0\r");
    state.channel.attach(Box::new(link.clone()));
    state.inputs.console = " V? ".into();

    state.send_console();

    assert_eq!(link.written(), b"V?\r");
    assert!(state.inputs.console.is_empty());
    let transcript: Vec<_> = state.channel.transcript().iter().cloned().collect();
    assert_eq!(
        transcript,
        vec![
            TranscriptEntry::Sent("V?\\r".into()),
            TranscriptEntry::Received("V=12.0\\r".into()),
        ]
    );
    assert!(link.replies.lock().unwrap().is_empty());
}
