use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::Channel;

// ---------------------------------------------------------------------------
// Trace colours
// ---------------------------------------------------------------------------

/// Alpha of the wavelength markers drawn over the spectrum.
const MARKER_ALPHA: u8 = 128;

fn hsl(hue: f32, saturation: f32, lightness: f32) -> Color32 {
    let rgb: Srgb = Hsl::new(hue, saturation, lightness).into_color();
    Color32::from_rgb(
        (rgb.red * 255.0).round() as u8,
        (rgb.green * 255.0).round() as u8,
        (rgb.blue * 255.0).round() as u8,
    )
}

fn channel_hue(channel: Channel) -> f32 {
    match channel {
        Channel::Line => 0.0,
        Channel::Background => 120.0,
        Channel::Baseline => 285.0,
    }
}

/// The live whole-spectrum trace.
pub fn spectrum_color() -> Color32 {
    hsl(215.0, 0.8, 0.45)
}

/// Time-series points of one channel.
pub fn channel_color(channel: Channel) -> Color32 {
    hsl(channel_hue(channel), 0.85, 0.45)
}

/// Translucent vertical marker showing where a channel sits on the spectrum.
pub fn marker_color(channel: Channel) -> Color32 {
    let [r, g, b, _] = hsl(channel_hue(channel), 0.85, 0.6).to_array();
    Color32::from_rgba_unmultiplied(r, g, b, MARKER_ALPHA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_distinct() {
        let colors: Vec<Color32> = Channel::ALL.into_iter().map(channel_color).collect();
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
        assert_ne!(colors[0], colors[2]);
    }

    #[test]
    fn line_channel_is_red() {
        let [r, g, b, _] = channel_color(Channel::Line).to_array();
        assert!(r > 200 && g < 40 && b < 40);
    }

    #[test]
    fn markers_are_translucent() {
        for channel in Channel::ALL {
            assert!(marker_color(channel).a() < 255);
        }
    }
}
