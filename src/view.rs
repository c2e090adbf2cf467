use crate::acquisition::DisplayMode;
use crate::config::{CaptureDuration, parse_wavelength_bounds};
use crate::data::model::{Frame, WavelengthAxis};
use crate::data::selection::ChannelSelection;
use crate::error::ValidationError;
use crate::render::{GridStyle, PlotView};

/// Lower edge of the full-scale intensity range, just below the dark floor.
const FULLSCALE_Y_MIN: f64 = -10.0;

// ---------------------------------------------------------------------------
// Axis presets
// ---------------------------------------------------------------------------

/// Axis limits for both display modes.
///
/// The spectrum x range is the wavelength view; the time-series x range
/// follows the capture duration.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub wavelength_range: (f64, f64),
    pub spectrum_y: (f64, f64),
    pub time_series_y: (f64, f64),
}

impl ViewState {
    /// Full instrument range on both axes.
    pub fn new(axis: &WavelengthAxis, max_intensity: f64) -> Self {
        Self {
            wavelength_range: fullscale_x(axis),
            spectrum_y: fullscale_y(max_intensity),
            time_series_y: fullscale_y(max_intensity),
        }
    }

    /// Describe what the static layer should draw for `mode`.
    pub fn plot_view(&self, mode: DisplayMode, duration: CaptureDuration) -> PlotView {
        match mode {
            DisplayMode::Spectrum => PlotView {
                x_range: self.wavelength_range,
                y_range: self.spectrum_y,
                x_label: "Wavelength (nm)".into(),
                y_label: "Intensity (counts)".into(),
                grid: GridStyle::Dotted,
            },
            DisplayMode::TimeSeries => PlotView {
                x_range: time_series_x(duration),
                y_range: self.time_series_y,
                x_label: "Time (s)".into(),
                y_label: "Intensity (counts)".into(),
                grid: GridStyle::Solid,
            },
        }
    }

    /// Fit the y range of `mode` to a fresh frame.
    ///
    /// Spectrum mode looks at every pixel inside the wavelength view; time
    /// series at the three selected channels. Returns `false` when there is
    /// nothing to fit (empty view).
    pub fn rescale_y(&mut self, mode: DisplayMode, frame: &Frame, selection: &ChannelSelection) -> bool {
        match mode {
            DisplayMode::Spectrum => {
                let range = frame
                    .axis
                    .index_range(self.wavelength_range.0, self.wavelength_range.1);
                let Some((min, max)) = frame.extrema(range) else {
                    return false;
                };
                self.spectrum_y = padded(min * 0.8, max * 1.1);
            }
            DisplayMode::TimeSeries => {
                let values = selection.indices().map(|i| frame.at(i));
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                self.time_series_y = padded(min * 0.8, max * 2.0);
            }
        }
        true
    }

    pub fn fullscale_y(&mut self, mode: DisplayMode, max_intensity: f64) {
        let range = fullscale_y(max_intensity);
        match mode {
            DisplayMode::Spectrum => self.spectrum_y = range,
            DisplayMode::TimeSeries => self.time_series_y = range,
        }
    }

    pub fn fullscale_x(&mut self, axis: &WavelengthAxis) {
        self.wavelength_range = fullscale_x(axis);
    }

    /// Apply typed wavelength bounds; on error the current view is kept.
    pub fn set_wavelength_range(
        &mut self,
        min_text: &str,
        max_text: &str,
        axis: &WavelengthAxis,
    ) -> Result<(f64, f64), ValidationError> {
        let range = parse_wavelength_bounds(min_text, max_text, (axis.min(), axis.max()))?;
        self.wavelength_range = range;
        Ok(range)
    }
}

pub fn fullscale_y(max_intensity: f64) -> (f64, f64) {
    (FULLSCALE_Y_MIN, max_intensity)
}

pub fn fullscale_x(axis: &WavelengthAxis) -> (f64, f64) {
    (axis.min(), axis.max())
}

/// One second of lead-in and 5 % of headroom after the capture.
pub fn time_series_x(duration: CaptureDuration) -> (f64, f64) {
    (-1.0, duration.as_secs_f64() * 1.05)
}

/// Flat or inverted ranges get a unit margin so the plot never collapses.
fn padded(low: f64, high: f64) -> (f64, f64) {
    if low < high {
        (low, high)
    } else {
        let (low, high) = (low.min(high), low.max(high));
        (low - 1.0, high + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> WavelengthAxis {
        WavelengthAxis::from_raw((0..11).map(|i| 400.0 + 10.0 * i as f64).collect()).unwrap()
    }

    fn frame(values: Vec<f64>) -> Frame {
        Frame::new(axis(), values).unwrap()
    }

    #[test]
    fn spectrum_rescale_only_looks_inside_view() {
        let mut view = ViewState::new(&axis(), 65535.0);
        view.wavelength_range = (420.0, 460.0);
        let mut values = vec![100.0; 11];
        values[0] = 50_000.0;
        values[3] = 1000.0;
        let f = frame(values);
        let sel = ChannelSelection::with_defaults(&axis());
        assert!(view.rescale_y(DisplayMode::Spectrum, &f, &sel));
        assert_eq!(view.spectrum_y, (80.0, 1100.0));
    }

    #[test]
    fn time_series_rescale_uses_channels() {
        let mut view = ViewState::new(&axis(), 65535.0);
        let values: Vec<f64> = (0..11).map(|i| 100.0 * i as f64).collect();
        let sel = ChannelSelection::with_defaults(&axis());
        view.rescale_y(DisplayMode::TimeSeries, &frame(values), &sel);
        // picks at indices 8, 7, 6
        assert_eq!(view.time_series_y, (480.0, 1600.0));
    }

    #[test]
    fn flat_frame_still_gives_a_range() {
        let mut view = ViewState::new(&axis(), 65535.0);
        let sel = ChannelSelection::with_defaults(&axis());
        view.rescale_y(DisplayMode::Spectrum, &frame(vec![0.0; 11]), &sel);
        assert_eq!(view.spectrum_y, (-1.0, 1.0));
    }

    #[test]
    fn presets() {
        let mut view = ViewState::new(&axis(), 4095.0);
        assert_eq!(view.wavelength_range, (400.0, 500.0));
        assert_eq!(view.spectrum_y, (-10.0, 4095.0));
        let d = CaptureDuration::checked_seconds(20.0).unwrap();
        let ts = view.plot_view(DisplayMode::TimeSeries, d);
        assert_eq!(ts.x_range, (-1.0, 21.0));
        assert_eq!(ts.grid, GridStyle::Solid);
        view.wavelength_range = (420.0, 430.0);
        view.fullscale_x(&axis());
        assert_eq!(view.wavelength_range, (400.0, 500.0));
    }

    #[test]
    fn bad_bounds_keep_view() {
        let mut view = ViewState::new(&axis(), 4095.0);
        assert!(view.set_wavelength_range("450", "x", &axis()).is_err());
        assert!(view.set_wavelength_range("350", "450", &axis()).is_err());
        assert!(view.set_wavelength_range("460", "450", &axis()).is_err());
        assert_eq!(view.wavelength_range, (400.0, 500.0));
        assert_eq!(
            view.set_wavelength_range("410", "450", &axis()).unwrap(),
            (410.0, 450.0)
        );
    }
}
