//! Error types for the acquisition core.
//!
//! Each concern gets its own enum so call sites can decide locally whether a
//! failure is recoverable:
//!
//! - **`ValidationError`**: a user-entered parameter was rejected before it
//!   reached any device. The caller restores the previous value.
//! - **`SourceError`**: the spectrometer could not be opened, refused a
//!   setting, or failed mid-read.
//! - **`CaptureError`**: the time-series buffer could not hold another sample.
//! - **`ChannelError`**: the power-supply serial link is closed or failed.
//! - **`AcquisitionError`**: a loop operation was refused in the current state,
//!   or one of the above surfaced from inside an iteration.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("integration time must be an integer between {min} and {max} ms, got {value}")]
    IntegrationTime { value: i64, min: u32, max: u32 },

    #[error("capture duration must be greater than 0 s and less than {max} s, got {value}")]
    Duration { value: f64, max: f64 },

    #[error(
        "wavelength bounds must lie within {limit_min} nm and {limit_max} nm with min < max, \
         got min = {min} nm and max = {max} nm"
    )]
    WavelengthBounds {
        min: f64,
        max: f64,
        limit_min: f64,
        limit_max: f64,
    },

    #[error("wavelength {value} nm is outside the current view ({min} nm, {max} nm)")]
    WavelengthOutsideView { value: f64, min: f64, max: f64 },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("no spectrometer attached: {0}")]
    Unavailable(String),

    #[error("integration time {requested} µs is outside the device limits [{min}, {max}] µs")]
    OutOfRange { requested: u64, min: u64, max: u64 },

    #[error("spectrometer read failed: {0}")]
    Read(String),

    #[error("spectrometer returned {got} intensities for a {expected}-point wavelength axis")]
    LengthMismatch { expected: usize, got: usize },

    #[error("spectrometer reported an empty wavelength axis")]
    EmptyAxis,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture buffer is full ({capacity} samples)")]
    Full { capacity: usize },

    #[error("elapsed time went from {previous} s to {next} s; capture timestamps must increase")]
    NonMonotonic { previous: f64, next: f64 },

    #[error("could not reserve memory for {samples} samples")]
    Alloc {
        samples: usize,
        #[source]
        source: std::collections::TryReserveError,
    },
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("serial port not connected")]
    NotConnected,

    #[error("no serial port selected")]
    NoPortSelected,

    #[error("failed to open serial port '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected response from power supply: {0:?}")]
    BadResponse(String),

    #[error("'{command}' is not supported by the {dialect} command set")]
    Unsupported {
        command: &'static str,
        dialect: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("acquisition is running; stop it first")]
    Busy,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}
