/// Instrument access: driver seam and the pull-based sample source.
///
/// ```text
///   vendor driver / simulator
///        │  read_wavelengths / read_intensities / set_integration_time
///        ▼
///   ┌──────────────┐
///   │ SampleSource  │  fixed rounded axis, Frame per call, device limits
///   └──────────────┘
///        │
///        ▼
///   AcquisitionLoop
/// ```
pub mod simulated;

use crate::config::IntegrationTime;
use crate::data::model::{Frame, WavelengthAxis};
use crate::error::SourceError;

pub use simulated::SimulatedSpectrometer;

// ---------------------------------------------------------------------------
// Driver seam
// ---------------------------------------------------------------------------

/// The subset of a spectrometer driver the acquisition core needs.
pub trait SpectrometerDriver {
    /// Instrument model string, written into capture headers.
    fn model(&self) -> String;

    /// Raw wavelength axis in nm, ascending.
    fn read_wavelengths(&mut self) -> Result<Vec<f64>, SourceError>;

    /// One blocking exposure. Same length as the wavelength axis.
    fn read_intensities(&mut self) -> Result<Vec<f64>, SourceError>;

    /// `[min, max]` integration time the driver claims to support, in µs.
    fn integration_time_limits_micros(&self) -> (u64, u64);

    fn set_integration_time_micros(&mut self, micros: u64) -> Result<(), SourceError>;

    /// Detector full-scale count.
    fn max_intensity(&self) -> f64;
}

impl<D: SpectrometerDriver + ?Sized> SpectrometerDriver for Box<D> {
    fn model(&self) -> String {
        (**self).model()
    }

    fn read_wavelengths(&mut self) -> Result<Vec<f64>, SourceError> {
        (**self).read_wavelengths()
    }

    fn read_intensities(&mut self) -> Result<Vec<f64>, SourceError> {
        (**self).read_intensities()
    }

    fn integration_time_limits_micros(&self) -> (u64, u64) {
        (**self).integration_time_limits_micros()
    }

    fn set_integration_time_micros(&mut self, micros: u64) -> Result<(), SourceError> {
        (**self).set_integration_time_micros(micros)
    }

    fn max_intensity(&self) -> f64 {
        (**self).max_intensity()
    }
}

// ---------------------------------------------------------------------------
// SampleSource
// ---------------------------------------------------------------------------

/// Pull-based accessor over a driver.
///
/// The wavelength axis is read once in [`SampleSource::open`] and never
/// changes afterwards; every frame is checked against it.
pub struct SampleSource<D> {
    driver: D,
    axis: WavelengthAxis,
    integration: IntegrationTime,
}

impl<D: SpectrometerDriver> SampleSource<D> {
    /// Read the axis and apply the initial integration time.
    ///
    /// Any failure here means no acquisition is possible this session.
    pub fn open(mut driver: D, integration: IntegrationTime) -> Result<Self, SourceError> {
        let raw = driver
            .read_wavelengths()
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        let axis = WavelengthAxis::from_raw(raw)?;
        let mut source = Self {
            driver,
            axis,
            integration,
        };
        source.set_integration_time(integration)?;
        log::info!(
            "Opened {} with {} pixels ({:.3}–{:.3} nm), integration {} ms",
            source.driver.model(),
            source.axis.len(),
            source.axis.min(),
            source.axis.max(),
            integration.as_millis()
        );
        Ok(source)
    }

    pub fn wavelengths(&self) -> &WavelengthAxis {
        &self.axis
    }

    /// Block for one exposure and pair it with the axis.
    pub fn intensities(&mut self) -> Result<Frame, SourceError> {
        let raw = self.driver.read_intensities()?;
        Frame::new(self.axis.clone(), raw)
    }

    /// Forward a new exposure to the device if it is within the driver's limits.
    pub fn set_integration_time(&mut self, integration: IntegrationTime) -> Result<(), SourceError> {
        let requested = integration.as_micros();
        let (min, max) = self.driver.integration_time_limits_micros();
        if requested < min || requested > max {
            return Err(SourceError::OutOfRange {
                requested,
                min,
                max,
            });
        }
        self.driver.set_integration_time_micros(requested)?;
        self.integration = integration;
        log::debug!("Integration time set to {requested} µs");
        Ok(())
    }

    pub fn integration_time(&self) -> IntegrationTime {
        self.integration
    }

    pub fn model(&self) -> String {
        self.driver.model()
    }

    pub fn max_intensity(&self) -> f64 {
        self.driver.max_intensity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDriver {
        limits: (u64, u64),
        set_calls: Vec<u64>,
        short_frame: bool,
    }

    impl SpectrometerDriver for FixedDriver {
        fn model(&self) -> String {
            "FIXED".into()
        }
        fn read_wavelengths(&mut self) -> Result<Vec<f64>, SourceError> {
            Ok(vec![500.00049, 500.5, 501.0])
        }
        fn read_intensities(&mut self) -> Result<Vec<f64>, SourceError> {
            Ok(if self.short_frame {
                vec![1.0]
            } else {
                vec![1.0, 2.0, 3.0]
            })
        }
        fn integration_time_limits_micros(&self) -> (u64, u64) {
            self.limits
        }
        fn set_integration_time_micros(&mut self, micros: u64) -> Result<(), SourceError> {
            self.set_calls.push(micros);
            Ok(())
        }
        fn max_intensity(&self) -> f64 {
            65535.0
        }
    }

    fn driver() -> FixedDriver {
        FixedDriver {
            limits: (10_000, 100_000),
            set_calls: Vec::new(),
            short_frame: false,
        }
    }

    #[test]
    fn open_rounds_axis_and_applies_integration() {
        let source = SampleSource::open(driver(), IntegrationTime::from_millis(25)).unwrap();
        assert_eq!(source.wavelengths().values(), &[500.0, 500.5, 501.0]);
        assert_eq!(source.driver.set_calls, vec![25_000]);
    }

    #[test]
    fn device_limits_are_enforced() {
        let mut source = SampleSource::open(driver(), IntegrationTime::from_millis(25)).unwrap();
        let err = source
            .set_integration_time(IntegrationTime::from_millis(200))
            .unwrap_err();
        assert!(matches!(
            err,
            SourceError::OutOfRange {
                requested: 200_000,
                ..
            }
        ));
        assert_eq!(source.integration_time().as_millis(), 25);
        assert_eq!(source.driver.set_calls.len(), 1);
    }

    #[test]
    fn short_frame_is_rejected() {
        let mut source = SampleSource::open(driver(), IntegrationTime::from_millis(25)).unwrap();
        source.driver.short_frame = true;
        assert!(matches!(
            source.intensities(),
            Err(SourceError::LengthMismatch { expected: 3, got: 1 })
        ));
    }
}
