use std::path::Path;

use spectrolive::config::Settings;
use spectrolive::data::capture::CaptureBuffer;
use spectrolive::data::model::Channel;
use spectrolive::data::storage::{CaptureMetadata, channel_path, load_capture, save_capture};
use spectrolive::headless;
use spectrolive::source::simulated::SimulationSettings;
use spectrolive::source::{SampleSource, SimulatedSpectrometer};

fn metadata() -> CaptureMetadata {
    CaptureMetadata {
        instrument_model: "SIM-128".into(),
        wavelengths: [656.281, 589.0, 500.125],
    }
}

#[test]
fn three_decimal_round_trip() {
    let mut buffer = CaptureBuffer::with_capacity(40).unwrap();
    for i in 0..40 {
        let t = 0.025 * (i + 1) as f64 + 0.000_123;
        buffer
            .append(t, 1000.0 + i as f64 * 1.2345, 500.5, 250.0 / (i + 1) as f64)
            .unwrap();
    }
    let capture = buffer.finalize();

    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("shot.txt");
    let written = save_capture(&base, &capture, &metadata(), 3).unwrap();
    assert_eq!(written.len(), 3);
    assert_eq!(written[0], dir.path().join("shotline.txt"));
    assert_eq!(written[1], dir.path().join("shotbkg.txt"));
    assert_eq!(written[2], dir.path().join("shotbase.txt"));

    let loaded = load_capture(&base).unwrap();
    let pairs = [
        (&loaded.line, Channel::Line),
        (&loaded.background, Channel::Background),
        (&loaded.baseline, Channel::Baseline),
    ];
    for (trace, channel) in pairs {
        assert_eq!(trace.instrument_model.as_deref(), Some("SIM-128"));
        assert_eq!(trace.values.len(), 40);
        for (got, want) in trace.values.iter().zip(capture.channel(channel)) {
            assert!((got - want).abs() <= 0.0005, "{channel}: {got} vs {want}");
        }
        for (got, want) in trace.elapsed.iter().zip(capture.elapsed.iter()) {
            assert!((got - want).abs() <= 0.0005);
        }
    }
    assert_eq!(loaded.line.wavelength, Some(656.281));
}

#[test]
fn file_header_layout() {
    let mut buffer = CaptureBuffer::with_capacity(1).unwrap();
    buffer.append(0.5, 12.0, 3.0, 1.0).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("h.csv");
    save_capture(&base, &buffer.finalize(), &metadata(), 2).unwrap();

    let text = std::fs::read_to_string(channel_path(&base, Channel::Background)).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "# Spectrometer = SIM-128");
    assert_eq!(lines[1], "# Wavelength (nm) = 589.000");
    assert_eq!(lines[2], "# Background data");
    assert_eq!(lines[3], "# Time (s), Count");
    assert_eq!(lines[4], "0.50,3.00");
    assert_eq!(lines.len(), 5);
}

fn count_rows(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.starts_with('#'))
        .count()
}

#[test]
fn headless_capture_writes_full_budget() {
    let settings = Settings {
        integration_time_ms: 10,
        capture_duration_s: 0.1,
        simulation: SimulationSettings {
            pixels: 128,
            paced: false,
            ..SimulationSettings::default()
        },
        ..Settings::default()
    };
    let driver = SimulatedSpectrometer::new(settings.simulation.clone()).unwrap();
    let source = SampleSource::open(driver, settings.integration_time()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("run.txt");
    let written = headless::run_capture(source, &settings, &base).unwrap();
    assert_eq!(written.len(), 3);
    for path in &written {
        assert_eq!(count_rows(path), 12);
    }
}
