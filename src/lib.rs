//! Live spectrometer display with fixed-duration time-series capture and
//! control of an external power supply.
//!
//! ```text
//!   SpectrometerDriver ─▶ SampleSource ─▶ AcquisitionLoop ─▶ RingRenderer ─▶ Surface
//!                                              │
//!                                              ├──▶ CaptureBuffer ─▶ storage (CSV triple)
//!                                              │
//!   DeviceCommandChannel ◀── AppState (UI actions: Measure, Stop, console)
//! ```
pub mod acquisition;
pub mod app;
pub mod color;
pub mod config;
pub mod data;
pub mod device;
pub mod error;
pub mod headless;
pub mod render;
pub mod source;
pub mod state;
pub mod ui;
pub mod view;
