use crate::error::ValidationError;

use super::model::{Channel, WavelengthAxis};

// ---------------------------------------------------------------------------
// Channel selection: user wavelength → resolved axis index
// ---------------------------------------------------------------------------

/// Axis fractions used for the initial line / background / baseline picks.
const DEFAULT_FRACTIONS: [f64; 3] = [0.8, 0.7, 0.6];

/// The three tracked wavelengths and their resolved axis indices.
///
/// Indices always point into the axis they were last resolved against; call
/// [`ChannelSelection::reresolve`] whenever the axis changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSelection {
    requested: [f64; 3],
    indices: [usize; 3],
    wavelengths: [f64; 3],
}

impl ChannelSelection {
    /// Pick the default wavelengths at 80 %, 70 % and 60 % of the axis.
    pub fn with_defaults(axis: &WavelengthAxis) -> Self {
        let requested = DEFAULT_FRACTIONS.map(|f| axis.values()[axis.index_at_fraction(f)]);
        Self::resolve(axis, requested)
    }

    /// Resolve all three requested wavelengths against `axis`.
    pub fn resolve(axis: &WavelengthAxis, requested: [f64; 3]) -> Self {
        let indices = requested.map(|w| axis.nearest_left(w));
        let wavelengths = indices.map(|i| axis.values()[i]);
        Self {
            requested,
            indices,
            wavelengths,
        }
    }

    /// Re-resolve the stored requests against a new axis.
    pub fn reresolve(&mut self, axis: &WavelengthAxis) {
        *self = Self::resolve(axis, self.requested);
    }

    /// Change one channel to the wavelength closest (from the left) to `value`.
    ///
    /// The value must lie strictly inside the current view `(view_min,
    /// view_max)`; otherwise the selection is left untouched.
    pub fn set(
        &mut self,
        axis: &WavelengthAxis,
        channel: Channel,
        value: f64,
        view: (f64, f64),
    ) -> Result<f64, ValidationError> {
        let (min, max) = view;
        if !(value > min && value < max) {
            return Err(ValidationError::WavelengthOutsideView { value, min, max });
        }
        let i = channel.index();
        let index = axis.nearest_left(value);
        self.indices[i] = index;
        self.wavelengths[i] = axis.values()[index];
        self.requested[i] = self.wavelengths[i];
        Ok(self.wavelengths[i])
    }

    /// Parse and apply a wavelength typed by the user.
    pub fn set_from_text(
        &mut self,
        axis: &WavelengthAxis,
        channel: Channel,
        text: &str,
        view: (f64, f64),
    ) -> Result<f64, ValidationError> {
        let value: f64 = text
            .trim()
            .parse()
            .map_err(|_| ValidationError::NotANumber(text.to_string()))?;
        self.set(axis, channel, value, view)
    }

    pub fn index(&self, channel: Channel) -> usize {
        self.indices[channel.index()]
    }

    pub fn indices(&self) -> [usize; 3] {
        self.indices
    }

    /// Resolved wavelength for a channel.
    pub fn wavelength(&self, channel: Channel) -> f64 {
        self.wavelengths[channel.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> WavelengthAxis {
        WavelengthAxis::from_raw((0..100).map(|i| 300.0 + i as f64 * 0.5).collect()).unwrap()
    }

    #[test]
    fn defaults_sit_at_fractions() {
        let axis = axis();
        let sel = ChannelSelection::with_defaults(&axis);
        assert_eq!(sel.indices(), [80, 70, 60]);
        assert_eq!(sel.wavelength(Channel::Line), 340.0);
    }

    #[test]
    fn set_snaps_left_and_stays_in_axis() {
        let axis = axis();
        let mut sel = ChannelSelection::with_defaults(&axis);
        let got = sel
            .set(&axis, Channel::Background, 310.3, (300.0, 349.5))
            .unwrap();
        assert_eq!(got, 310.0);
        assert_eq!(sel.index(Channel::Background), 20);
    }

    #[test]
    fn set_outside_view_keeps_previous() {
        let axis = axis();
        let mut sel = ChannelSelection::with_defaults(&axis);
        let before = sel.clone();
        let err = sel
            .set(&axis, Channel::Line, 300.0, (300.0, 349.5))
            .unwrap_err();
        assert!(matches!(err, ValidationError::WavelengthOutsideView { .. }));
        assert_eq!(sel, before);
    }

    #[test]
    fn non_numeric_text_is_rejected() {
        let axis = axis();
        let mut sel = ChannelSelection::with_defaults(&axis);
        let err = sel
            .set_from_text(&axis, Channel::Baseline, "abc", (300.0, 349.5))
            .unwrap_err();
        assert_eq!(err, ValidationError::NotANumber("abc".into()));
    }

    #[test]
    fn reresolve_tracks_new_axis() {
        let axis = axis();
        let mut sel = ChannelSelection::with_defaults(&axis);
        let coarse = WavelengthAxis::from_raw((0..50).map(|i| 300.0 + i as f64).collect()).unwrap();
        sel.reresolve(&coarse);
        for i in sel.indices() {
            assert!(i < coarse.len());
        }
        assert_eq!(sel.wavelength(Channel::Line), 340.0);
    }
}
