//! User-facing parameters and the persisted settings file.
//!
//! Parameters are validated here, before anything reaches a device. A
//! rejected value leaves the previous one in place; the UI shows the error and
//! rewrites its input box from the kept value.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::storage::DEFAULT_DECIMALS;
use crate::device::Dialect;
use crate::error::ValidationError;
use crate::source::simulated::SimulationSettings;

/// Policy limits on the integration time, in ms.
pub const MIN_INTEGRATION_MS: u32 = 4;
pub const MAX_INTEGRATION_MS: u32 = 5000;

/// Capture duration must be strictly below this, in seconds.
pub const MAX_DURATION_S: f64 = 300.0;

/// Extra frames per time series to absorb the last partial interval.
pub const GUARD_FRAMES: u64 = 2;

// ---------------------------------------------------------------------------
// Integration time
// ---------------------------------------------------------------------------

/// Exposure per sample. Stored in µs, entered by the user in ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntegrationTime(u64);

impl IntegrationTime {
    pub const fn from_millis(ms: u32) -> Self {
        Self(ms as u64 * 1000)
    }

    pub const fn from_micros(us: u64) -> Self {
        Self(us)
    }

    pub fn as_micros(self) -> u64 {
        self.0
    }

    pub fn as_millis(self) -> u64 {
        self.0 / 1000
    }

    /// Validate an integer number of ms against the policy range.
    pub fn checked_millis(ms: i64) -> Result<Self, ValidationError> {
        if ms < MIN_INTEGRATION_MS as i64 || ms > MAX_INTEGRATION_MS as i64 {
            return Err(ValidationError::IntegrationTime {
                value: ms,
                min: MIN_INTEGRATION_MS,
                max: MAX_INTEGRATION_MS,
            });
        }
        Ok(Self::from_millis(ms as u32))
    }

    /// Parse the text of the integration-time box (whole ms).
    pub fn parse_millis(text: &str) -> Result<Self, ValidationError> {
        let ms: i64 = text
            .trim()
            .parse()
            .map_err(|_| ValidationError::NotANumber(text.to_string()))?;
        Self::checked_millis(ms)
    }
}

// ---------------------------------------------------------------------------
// Capture duration
// ---------------------------------------------------------------------------

/// Length of a time-series capture.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CaptureDuration(f64);

impl CaptureDuration {
    pub fn checked_seconds(seconds: f64) -> Result<Self, ValidationError> {
        if !(seconds > 0.0 && seconds < MAX_DURATION_S) {
            return Err(ValidationError::Duration {
                value: seconds,
                max: MAX_DURATION_S,
            });
        }
        Ok(Self(seconds))
    }

    pub fn parse_seconds(text: &str) -> Result<Self, ValidationError> {
        let seconds: f64 = text
            .trim()
            .parse()
            .map_err(|_| ValidationError::NotANumber(text.to_string()))?;
        Self::checked_seconds(seconds)
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0
    }
}

/// Number of iterations of a time-series run.
///
/// `duration * (1_000_000 / integration_µs) + GUARD_FRAMES`. The frame rate
/// is the whole number of exposures per second, and the product is truncated,
/// so 5 s at 30 ms is `5 * 33 + 2`. A duration shorter than one frame still
/// gets one frame before the guards.
pub fn frame_budget(duration: CaptureDuration, integration: IntegrationTime) -> u64 {
    let duration_us = (duration.as_secs_f64() * 1_000_000.0).round() as u64;
    let exposure_us = integration.as_micros().max(1);
    let frames_per_second = 1_000_000 / exposure_us;
    (duration_us * frames_per_second / 1_000_000).max(1) + GUARD_FRAMES
}

// ---------------------------------------------------------------------------
// Wavelength view bounds
// ---------------------------------------------------------------------------

/// Check a new wavelength view against the instrument extrema.
pub fn validate_wavelength_bounds(
    min: f64,
    max: f64,
    limits: (f64, f64),
) -> Result<(f64, f64), ValidationError> {
    let (limit_min, limit_max) = limits;
    if min >= limit_min && max <= limit_max && min < max {
        Ok((min, max))
    } else {
        Err(ValidationError::WavelengthBounds {
            min,
            max,
            limit_min,
            limit_max,
        })
    }
}

/// Parse both bound boxes; either failing rejects the pair.
pub fn parse_wavelength_bounds(
    min_text: &str,
    max_text: &str,
    limits: (f64, f64),
) -> Result<(f64, f64), ValidationError> {
    let parse = |text: &str| {
        text.trim()
            .parse::<f64>()
            .map_err(|_| ValidationError::NotANumber(text.to_string()))
    };
    validate_wavelength_bounds(parse(min_text)?, parse(max_text)?, limits)
}

// ---------------------------------------------------------------------------
// Persisted settings
// ---------------------------------------------------------------------------

/// Serial link to the auxiliary power supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port name, e.g. `COM3` or `/dev/ttyUSB0`. None until selected.
    pub port: Option<String>,
    pub baud_rate: u32,
    pub timeout_ms: u64,
    /// Supply address used in BK Precision commands.
    pub address: u8,
    /// Program slot started by the measure action.
    pub program_slot: u16,
    pub dialect: Dialect,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 9600,
            timeout_ms: 1000,
            address: 0,
            program_slot: 1,
            dialect: Dialect::BkPrecision,
        }
    }
}

/// Everything persisted between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub integration_time_ms: u32,
    pub capture_duration_s: f64,
    /// Decimal places in saved capture files.
    pub output_decimals: usize,
    pub serial: SerialSettings,
    pub simulation: SimulationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            integration_time_ms: 25,
            capture_duration_s: 5.0,
            output_decimals: DEFAULT_DECIMALS,
            serial: SerialSettings::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

impl Settings {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("parsing settings {}", path.display()))?;
        settings.validated()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("serializing settings")?;
        std::fs::write(path, text).with_context(|| format!("writing settings {}", path.display()))
    }

    /// Reject stored values the UI would never accept.
    pub fn validated(self) -> Result<Self> {
        IntegrationTime::checked_millis(self.integration_time_ms as i64)
            .context("settings: integration_time_ms")?;
        CaptureDuration::checked_seconds(self.capture_duration_s)
            .context("settings: capture_duration_s")?;
        Ok(self)
    }

    pub fn integration_time(&self) -> IntegrationTime {
        IntegrationTime::from_millis(self.integration_time_ms)
    }

    pub fn capture_duration(&self) -> Result<CaptureDuration, ValidationError> {
        CaptureDuration::checked_seconds(self.capture_duration_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integration_policy_edges() {
        assert!(IntegrationTime::parse_millis("3").is_err());
        assert!(IntegrationTime::parse_millis("5001").is_err());
        assert_eq!(
            IntegrationTime::parse_millis("4").unwrap().as_micros(),
            4_000
        );
        assert_eq!(
            IntegrationTime::parse_millis(" 5000 ").unwrap().as_micros(),
            5_000_000
        );
        assert_eq!(
            IntegrationTime::parse_millis("25ms"),
            Err(ValidationError::NotANumber("25ms".into()))
        );
    }

    #[test]
    fn duration_is_exclusive_at_both_ends() {
        assert!(CaptureDuration::parse_seconds("0").is_err());
        assert!(CaptureDuration::parse_seconds("300").is_err());
        assert!(CaptureDuration::parse_seconds("299.5").is_ok());
        assert!(CaptureDuration::parse_seconds("five").is_err());
    }

    #[test]
    fn frame_budget_for_reference_run() {
        let duration = CaptureDuration::checked_seconds(5.0).unwrap();
        let budget = frame_budget(duration, IntegrationTime::from_millis(25));
        assert_eq!(budget, 202);
    }

    #[test]
    fn frame_budget_truncates_uneven_exposures() {
        let duration = CaptureDuration::checked_seconds(5.0).unwrap();
        assert_eq!(frame_budget(duration, IntegrationTime::from_millis(30)), 167);
        assert_eq!(frame_budget(duration, IntegrationTime::from_millis(7)), 712);
    }

    #[test]
    fn short_duration_still_samples() {
        let duration = CaptureDuration::checked_seconds(0.01).unwrap();
        assert_eq!(frame_budget(duration, IntegrationTime::from_millis(25)), 3);
        let long_exposure = IntegrationTime::from_millis(5000);
        let one_second = CaptureDuration::checked_seconds(1.0).unwrap();
        assert_eq!(frame_budget(one_second, long_exposure), 3);
    }

    #[test]
    fn wavelength_bounds_rules() {
        let limits = (340.0, 1020.0);
        assert_eq!(
            parse_wavelength_bounds("400", "700", limits),
            Ok((400.0, 700.0))
        );
        assert!(parse_wavelength_bounds("700", "400", limits).is_err());
        assert!(parse_wavelength_bounds("300", "700", limits).is_err());
        assert!(parse_wavelength_bounds("400", "1100", limits).is_err());
        assert!(parse_wavelength_bounds("x", "700", limits).is_err());
    }

    #[test]
    fn settings_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.integration_time_ms = 40;
        settings.serial.port = Some("/dev/ttyUSB0".into());
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn missing_settings_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn out_of_policy_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "integration_time_ms": 1 }"#).unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
