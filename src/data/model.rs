use std::fmt;
use std::sync::Arc;

use crate::error::SourceError;

/// Decimal places kept on the wavelength axis.
pub const WAVELENGTH_DECIMALS: i32 = 3;

// ---------------------------------------------------------------------------
// Channel – the three wavelengths tracked during a time series
// ---------------------------------------------------------------------------

/// One of the three tracked wavelengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Analytical emission line.
    Line,
    /// Background reference next to the line.
    Background,
    /// Baseline reference.
    Baseline,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Line, Channel::Background, Channel::Baseline];

    pub fn index(self) -> usize {
        match self {
            Channel::Line => 0,
            Channel::Background => 1,
            Channel::Baseline => 2,
        }
    }

    /// Short label used in the side panel.
    pub fn label(self) -> &'static str {
        match self {
            Channel::Line => "Line",
            Channel::Background => "Bkg",
            Channel::Baseline => "Base",
        }
    }

    /// Suffix appended to the capture file stem.
    pub fn file_suffix(self) -> &'static str {
        match self {
            Channel::Line => "line",
            Channel::Background => "bkg",
            Channel::Baseline => "base",
        }
    }

    /// Column meaning written into the capture file header.
    pub fn description(self) -> &'static str {
        match self {
            Channel::Line => "Analytical Line data",
            Channel::Background => "Background data",
            Channel::Baseline => "Baseline data",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// WavelengthAxis – fixed x axis for the whole session
// ---------------------------------------------------------------------------

/// The instrument's wavelength axis, read once at startup.
///
/// Values are rounded to [`WAVELENGTH_DECIMALS`] and shared cheaply between
/// frames.
#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthAxis {
    values: Arc<[f64]>,
}

impl WavelengthAxis {
    /// Round the raw driver values and wrap them.
    pub fn from_raw(raw: Vec<f64>) -> Result<Self, SourceError> {
        if raw.is_empty() {
            return Err(SourceError::EmptyAxis);
        }
        let values: Arc<[f64]> = raw.into_iter().map(round_wavelength).collect();
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Shortest wavelength reported by the instrument.
    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Longest wavelength reported by the instrument.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Index of the last wavelength not greater than `value`.
    ///
    /// Values below the first entry resolve to index 0. The axis is assumed
    /// to be ascending, which is how spectrometers report it.
    pub fn nearest_left(&self, value: f64) -> usize {
        let after = self.values.partition_point(|&w| w <= value);
        after.saturating_sub(1)
    }

    /// Index sitting at `fraction` of the axis length (clamped).
    pub fn index_at_fraction(&self, fraction: f64) -> usize {
        let idx = (self.values.len() as f64 * fraction.clamp(0.0, 1.0)) as usize;
        idx.min(self.values.len() - 1)
    }

    /// Index range `[lo, hi)` covering the wavelengths in `[min, max]`.
    pub fn index_range(&self, min: f64, max: f64) -> std::ops::Range<usize> {
        let lo = self.values.partition_point(|&w| w < min);
        let hi = self.values.partition_point(|&w| w <= max);
        lo..hi.max(lo)
    }
}

/// Round a wavelength to the display precision.
pub fn round_wavelength(value: f64) -> f64 {
    let scale = 10f64.powi(WAVELENGTH_DECIMALS);
    (value * scale).round() / scale
}

// ---------------------------------------------------------------------------
// Frame – one sample pulled from the instrument
// ---------------------------------------------------------------------------

/// One full spectrum: the session axis plus this sample's intensities.
#[derive(Debug, Clone)]
pub struct Frame {
    pub axis: WavelengthAxis,
    pub intensities: Vec<f64>,
}

impl Frame {
    /// Pair intensities with the axis, enforcing equal length.
    pub fn new(axis: WavelengthAxis, intensities: Vec<f64>) -> Result<Self, SourceError> {
        if axis.len() != intensities.len() {
            return Err(SourceError::LengthMismatch {
                expected: axis.len(),
                got: intensities.len(),
            });
        }
        Ok(Self { axis, intensities })
    }

    /// Intensity at a resolved axis index.
    pub fn at(&self, index: usize) -> f64 {
        self.intensities[index]
    }

    /// `(min, max)` intensity over the axis index range.
    pub fn extrema(&self, range: std::ops::Range<usize>) -> Option<(f64, f64)> {
        let slice = self.intensities.get(range)?;
        if slice.is_empty() {
            return None;
        }
        let min = slice.iter().copied().fold(f64::INFINITY, f64::min);
        let max = slice.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }

    /// `[x, y]` pairs for plotting.
    pub fn points(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.axis
            .values()
            .iter()
            .zip(self.intensities.iter())
            .map(|(&x, &y)| [x, y])
    }
}
