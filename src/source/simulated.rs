use std::f64::consts::PI;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::SpectrometerDriver;
use crate::error::SourceError;

// ---------------------------------------------------------------------------
// Simulated spectrometer
// ---------------------------------------------------------------------------

/// One Gaussian emission line: centre (nm), width (nm), counts at 25 ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmissionLine {
    pub center_nm: f64,
    pub sigma_nm: f64,
    pub amplitude: f64,
}

/// Parameters for the simulated instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub pixels: usize,
    pub start_nm: f64,
    pub end_nm: f64,
    pub dark_counts: f64,
    pub noise_counts: f64,
    pub lines: Vec<EmissionLine>,
    /// Period of the slow intensity modulation, in seconds.
    pub modulation_period_s: f64,
    /// Sleep for the exposure time on every read.
    pub paced: bool,
    pub seed: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            pixels: 2048,
            start_nm: 339.4,
            end_nm: 1021.7,
            dark_counts: 1500.0,
            noise_counts: 25.0,
            lines: vec![
                EmissionLine {
                    center_nm: 400.9,
                    sigma_nm: 0.4,
                    amplitude: 9000.0,
                },
                EmissionLine {
                    center_nm: 589.0,
                    sigma_nm: 0.6,
                    amplitude: 14000.0,
                },
                EmissionLine {
                    center_nm: 656.3,
                    sigma_nm: 0.5,
                    amplitude: 20000.0,
                },
                EmissionLine {
                    center_nm: 850.0,
                    sigma_nm: 60.0,
                    amplitude: 3000.0,
                },
            ],
            modulation_period_s: 4.0,
            paced: true,
            seed: 7,
        }
    }
}

/// Intensity reference exposure for [`EmissionLine::amplitude`], in µs.
const REFERENCE_EXPOSURE_MICROS: f64 = 25_000.0;
const FULL_SCALE: f64 = 65535.0;
/// Limits reported by the simulated driver. Wider than anything usable,
/// as real drivers tend to report.
const LIMITS_MICROS: (u64, u64) = (1_000, 65_000_000);

/// A driver that synthesises spectra from Gaussian lines plus noise.
pub struct SimulatedSpectrometer {
    settings: SimulationSettings,
    axis: Vec<f64>,
    rng: StdRng,
    noise: Normal<f64>,
    integration_micros: u64,
    started: Instant,
}

impl SimulatedSpectrometer {
    pub fn new(settings: SimulationSettings) -> Result<Self, SourceError> {
        if settings.pixels < 2 || settings.end_nm <= settings.start_nm {
            return Err(SourceError::Unavailable(format!(
                "simulated axis {}–{} nm with {} pixels is not usable",
                settings.start_nm, settings.end_nm, settings.pixels
            )));
        }
        let noise = Normal::new(0.0, settings.noise_counts).map_err(|e| {
            SourceError::Unavailable(format!(
                "simulated noise of {} counts: {e}",
                settings.noise_counts
            ))
        })?;
        let step = (settings.end_nm - settings.start_nm) / (settings.pixels - 1) as f64;
        let axis = (0..settings.pixels)
            .map(|i| settings.start_nm + step * i as f64)
            .collect();
        Ok(Self {
            axis,
            rng: StdRng::seed_from_u64(settings.seed),
            noise,
            settings,
            integration_micros: REFERENCE_EXPOSURE_MICROS as u64,
            started: Instant::now(),
        })
    }
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

impl SpectrometerDriver for SimulatedSpectrometer {
    fn model(&self) -> String {
        format!("SIM-{}", self.settings.pixels)
    }

    fn read_wavelengths(&mut self) -> Result<Vec<f64>, SourceError> {
        Ok(self.axis.clone())
    }

    fn read_intensities(&mut self) -> Result<Vec<f64>, SourceError> {
        if self.settings.paced {
            std::thread::sleep(Duration::from_micros(self.integration_micros));
        }
        let exposure = self.integration_micros as f64 / REFERENCE_EXPOSURE_MICROS;
        let t = self.started.elapsed().as_secs_f64();
        let modulation = if self.settings.modulation_period_s > 0.0 {
            1.0 + 0.4 * (2.0 * PI * t / self.settings.modulation_period_s).sin()
        } else {
            1.0
        };
        let Self {
            settings,
            axis,
            rng,
            noise,
            ..
        } = self;
        let out = axis
            .iter()
            .map(|&wl| {
                let signal: f64 = settings
                    .lines
                    .iter()
                    .map(|l| gaussian(wl, l.center_nm, l.sigma_nm, l.amplitude))
                    .sum();
                let counts =
                    settings.dark_counts + signal * exposure * modulation + noise.sample(rng);
                counts.clamp(0.0, FULL_SCALE)
            })
            .collect();
        Ok(out)
    }

    fn integration_time_limits_micros(&self) -> (u64, u64) {
        LIMITS_MICROS
    }

    fn set_integration_time_micros(&mut self, micros: u64) -> Result<(), SourceError> {
        self.integration_micros = micros;
        Ok(())
    }

    fn max_intensity(&self) -> f64 {
        FULL_SCALE
    }
}
