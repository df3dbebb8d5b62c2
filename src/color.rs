use image::Rgba;
use serde::{Serialize, Serializer};
use std::fmt;

const NEUTRAL_HEX: &str = "#3B82F6";
const SATURATION_PCT: u8 = 70;
const LIGHTNESS_PCT: u8 = 50;

/// Fill colour of a choropleth cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillColor {
    /// Used when every value in view is the same.
    Neutral,
    /// Hue in degrees at fixed 70% saturation and 50% lightness.
    Hsl { hue: f64 },
}

/// Linear green (min) to red (max) scale.
pub fn color_for_value(value: u64, min: u64, max: u64) -> FillColor {
    if max == min {
        return FillColor::Neutral;
    }
    let ratio = (value as f64 - min as f64) / (max as f64 - min as f64);
    FillColor::Hsl {
        hue: (1.0 - ratio) * 120.0,
    }
}

impl FillColor {
    pub fn to_rgba(self) -> Rgba<u8> {
        match self {
            FillColor::Neutral => hex_to_rgba(NEUTRAL_HEX),
            FillColor::Hsl { hue } => {
                let (r, g, b) = hsl_to_rgb(
                    hue,
                    f64::from(SATURATION_PCT) / 100.0,
                    f64::from(LIGHTNESS_PCT) / 100.0,
                );
                Rgba([r, g, b, 255])
            }
        }
    }
}

impl fmt::Display for FillColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillColor::Neutral => f.write_str(NEUTRAL_HEX),
            FillColor::Hsl { hue } => {
                write!(f, "hsl({}, {}%, {}%)", hue, SATURATION_PCT, LIGHTNESS_PCT)
            }
        }
    }
}

impl Serialize for FillColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn hex_to_rgba(hex: &str) -> Rgba<u8> {
    let hex = hex.trim_start_matches('#');
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
    Rgba([r, g, b, 255])
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (u8, u8, u8) {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let h = hue.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let to_byte = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_byte(r), to_byte(g), to_byte(b))
}
