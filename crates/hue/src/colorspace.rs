//! Color conversions used to preview Hue lights.
//!
//! xy chromaticity is converted through the Wide RGB D65 matrices published
//! for Hue bulbs, with sRGB gamma applied on top.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize, Serializer};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Xy {
    pub x: f64,
    pub y: f64,
}

/// Quantize a unit channel value the way a 16-bit color store does before
/// reducing it to 8 bits.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantize(value: f64) -> u8 {
    let wide = (value.clamp(0.0, 1.0) * f64::from(u16::MAX)).round() as u32;
    ((wide - (wide >> 8) + 0x80) >> 8) as u8
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub fn from_unit(r: f64, g: f64, b: f64) -> Self {
        Self::new(quantize(r), quantize(g), quantize(b))
    }

    #[must_use]
    pub fn to_unit(self) -> [f64; 3] {
        [
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        ]
    }

    /// Display name in `#rrggbb` form
    #[must_use]
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Hue angle in degrees, or `None` for grays
    #[must_use]
    pub fn hue(&self) -> Option<f64> {
        let [r, g, b] = self.to_unit();
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        if delta <= 0.0 {
            return None;
        }
        let sector = if (max - r).abs() < f64::EPSILON {
            ((g - b) / delta).rem_euclid(6.0)
        } else if (max - g).abs() < f64::EPSILON {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };
        Some(sector * 60.0)
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn reverse_gamma(value: f64) -> f64 {
    if value <= 0.003_130_8 {
        12.92 * value
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

fn gamma(value: f64) -> f64 {
    if value > 0.040_45 {
        ((value + 0.055) / 1.055).powf(2.4)
    } else {
        value / 12.92
    }
}

/// Convert CIE xy chromaticity to a displayable color at full brightness.
///
/// Negative channels are clamped to zero first, then all channels are
/// rescaled if any exceeds 1.0. Swapping these steps shifts the hue.
#[must_use]
pub fn xy_to_rgb(x: f64, y: f64) -> Option<Rgb> {
    if !x.is_finite() || !y.is_finite() || y == 0.0 {
        return None;
    }

    let cy = 1.0;
    let cx = (cy / y) * x;
    let cz = (cy / y) * (1.0 - x - y);

    let r = cx * 1.656_492 - cy * 0.354_851 - cz * 0.255_038;
    let g = -cx * 0.707_196 + cy * 1.655_397 + cz * 0.036_152;
    let b = cx * 0.051_713 - cy * 0.121_364 + cz * 1.011_530;

    let r = reverse_gamma(r).max(0.0);
    let g = reverse_gamma(g).max(0.0);
    let b = reverse_gamma(b).max(0.0);

    let max = r.max(g).max(b);
    let (r, g, b) = if max > 1.0 {
        (r / max, g / max, b / max)
    } else {
        (r, g, b)
    };

    if !(r.is_finite() && g.is_finite() && b.is_finite()) {
        return None;
    }

    Some(Rgb::from_unit(r, g, b))
}

/// Convert a color to CIE xy chromaticity, or `None` for black.
#[must_use]
pub fn rgb_to_xy(color: Rgb) -> Option<Xy> {
    let [r, g, b] = color.to_unit().map(gamma);

    let cx = r * 0.664_511 + g * 0.154_324 + b * 0.162_028;
    let cy = r * 0.283_881 + g * 0.668_433 + b * 0.047_685;
    let cz = r * 0.000_088 + g * 0.072_310 + b * 0.986_039;

    let sum = cx + cy + cz;
    if sum <= 0.0 {
        return None;
    }

    Some(Xy {
        x: cx / sum,
        y: cy / sum,
    })
}

/// HSV to RGB, with `hue` in degrees and `saturation`/`value` in `0.0..=1.0`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb {
    let s = saturation.clamp(0.0, 1.0);
    let v = value.clamp(0.0, 1.0);
    if s == 0.0 {
        return Rgb::from_unit(v, v, v);
    }

    let h = hue.rem_euclid(360.0) / 60.0;
    let sector = h.floor() as u8;
    let f = h - h.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    Rgb::from_unit(r, g, b)
}

/// Fully saturated, full value color for a hue in `0..=359` degrees.
#[must_use]
pub fn hue_to_rgb(hue: u16) -> Option<Rgb> {
    (hue <= 359).then(|| hsv_to_rgb(f64::from(hue), 1.0, 1.0))
}

/// Calibrated display swatches for white ambiance color temperatures,
/// in 100 K steps.
const COLOR_TEMPERATURE_MAP: [(u32, Rgb); 46] = [
    (2000, Rgb::new(240, 219, 131)),
    (2100, Rgb::new(241, 221, 137)),
    (2200, Rgb::new(242, 222, 142)),
    (2300, Rgb::new(243, 224, 148)),
    (2400, Rgb::new(243, 225, 153)),
    (2500, Rgb::new(243, 228, 158)),
    (2600, Rgb::new(244, 230, 164)),
    (2700, Rgb::new(245, 231, 169)),
    (2800, Rgb::new(246, 233, 176)),
    (2900, Rgb::new(246, 233, 180)),
    (3000, Rgb::new(247, 235, 186)),
    (3100, Rgb::new(247, 236, 191)),
    (3200, Rgb::new(248, 238, 197)),
    (3300, Rgb::new(249, 240, 203)),
    (3400, Rgb::new(249, 242, 208)),
    (3500, Rgb::new(250, 244, 215)),
    (3600, Rgb::new(250, 245, 220)),
    (3700, Rgb::new(251, 246, 225)),
    (3800, Rgb::new(252, 248, 232)),
    (3900, Rgb::new(252, 249, 237)),
    (4000, Rgb::new(253, 251, 243)),
    (4100, Rgb::new(254, 252, 249)),
    (4200, Rgb::new(254, 254, 254)),
    (4300, Rgb::new(252, 253, 254)),
    (4400, Rgb::new(250, 253, 254)),
    (4500, Rgb::new(247, 252, 254)),
    (4600, Rgb::new(245, 252, 253)),
    (4700, Rgb::new(243, 251, 253)),
    (4800, Rgb::new(240, 250, 253)),
    (4900, Rgb::new(238, 250, 253)),
    (5000, Rgb::new(236, 250, 253)),
    (5100, Rgb::new(233, 249, 253)),
    (5200, Rgb::new(231, 247, 252)),
    (5300, Rgb::new(228, 247, 252)),
    (5400, Rgb::new(226, 246, 252)),
    (5500, Rgb::new(224, 247, 252)),
    (5600, Rgb::new(221, 245, 251)),
    (5700, Rgb::new(219, 244, 251)),
    (5800, Rgb::new(217, 244, 251)),
    (5900, Rgb::new(215, 243, 250)),
    (6000, Rgb::new(213, 243, 250)),
    (6100, Rgb::new(210, 242, 250)),
    (6200, Rgb::new(208, 242, 250)),
    (6300, Rgb::new(206, 241, 250)),
    (6400, Rgb::new(204, 241, 250)),
    (6500, Rgb::new(203, 241, 250)),
];

/// Swatch for the nearest 100 K bucket (remainders of 50 round up).
#[must_use]
pub fn ambient_color(kelvin: u32) -> Option<Rgb> {
    let remainder = kelvin % 100;
    let mut reference = kelvin - remainder;
    if remainder >= 50 {
        reference += 100;
    }
    COLOR_TEMPERATURE_MAP
        .iter()
        .find(|(k, _)| *k == reference)
        .map(|(_, rgb)| *rgb)
}
