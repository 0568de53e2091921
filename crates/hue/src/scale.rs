//! Conversions between human units (percent, kelvin) and Hue wire units
//! (brightness steps, mirek).

use std::ops::RangeInclusive;

use crate::{
    COLDEST_CAPABLE_MIREK, MAX_CAPABLE_BRIGHTNESS, MIN_CAPABLE_BRIGHTNESS, WARMEST_CAPABLE_MIREK,
};

const BRIGHTNESS_SPAN: f64 = (MAX_CAPABLE_BRIGHTNESS - MIN_CAPABLE_BRIGHTNESS) as f64;

#[must_use]
pub fn brightness_from_wire(bri: f64) -> f64 {
    ((bri - f64::from(MIN_CAPABLE_BRIGHTNESS)) / BRIGHTNESS_SPAN) * 100.0
}

/// Scale a brightness percentage to wire steps, or `None` if the percentage
/// is not within `0..=100`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn brightness_to_wire(percent: f64) -> Option<u8> {
    if percent.is_nan() || !(0.0..=100.0).contains(&percent) {
        return None;
    }
    let steps = ((percent / 100.0) * BRIGHTNESS_SPAN + f64::from(MIN_CAPABLE_BRIGHTNESS)).round();
    Some(steps as u8)
}

/// Reciprocal megakelvin conversion, rounded to the nearest integer.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn mirek_to_kelvin(mirek: f64) -> Option<u32> {
    if !mirek.is_finite() || mirek <= 0.0 {
        return None;
    }
    Some((1.0e6 / mirek).round() as u32)
}

#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn kelvin_to_mirek(kelvin: u32) -> Option<u16> {
    if kelvin == 0 {
        return None;
    }
    Some((1.0e6 / f64::from(kelvin)).round() as u16)
}

/// Kelvin range an ambiance light accepts, derived from its mirek endpoints.
#[must_use]
pub fn kelvin_range() -> RangeInclusive<u32> {
    let min = mirek_to_kelvin(f64::from(WARMEST_CAPABLE_MIREK)).unwrap_or_default();
    let max = mirek_to_kelvin(f64::from(COLDEST_CAPABLE_MIREK)).unwrap_or_default();
    min..=max
}

#[cfg(test)]
mod tests {
    use crate::scale::{
        brightness_from_wire, brightness_to_wire, kelvin_range, kelvin_to_mirek, mirek_to_kelvin,
    };
    use crate::{COLDEST_CAPABLE_MIREK, WARMEST_CAPABLE_MIREK};

    #[test]
    fn brightness_endpoints() {
        assert_eq!(brightness_to_wire(0.0), Some(1));
        assert_eq!(brightness_to_wire(100.0), Some(254));
        assert_eq!(brightness_to_wire(60.0), Some(153));

        assert!((brightness_from_wire(1.0) - 0.0).abs() < f64::EPSILON);
        assert!((brightness_from_wire(254.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn brightness_rejects_invalid() {
        assert_eq!(brightness_to_wire(f64::NAN), None);
        assert_eq!(brightness_to_wire(-0.1), None);
        assert_eq!(brightness_to_wire(100.1), None);
    }

    #[test]
    fn brightness_round_trip_is_stable() {
        for bri in 1..=254u8 {
            let pct = brightness_from_wire(f64::from(bri));
            assert_eq!(brightness_to_wire(pct), Some(bri));
        }
    }

    #[test]
    fn kelvin_range_endpoints() {
        assert_eq!(kelvin_range(), 2000..=6536);
    }

    #[test]
    fn mirek_round_trip_is_exact() {
        for mirek in COLDEST_CAPABLE_MIREK..=WARMEST_CAPABLE_MIREK {
            let kelvin = mirek_to_kelvin(f64::from(mirek)).unwrap();
            assert_eq!(kelvin_to_mirek(kelvin), Some(mirek));
        }
    }

    #[test]
    fn kelvin_round_trip_within_one_wire_step() {
        // one mirek is ~k^2/1e6 kelvin wide
        for kelvin in kelvin_range() {
            let mirek = kelvin_to_mirek(kelvin).unwrap();
            let back = mirek_to_kelvin(f64::from(mirek)).unwrap();
            let step = (f64::from(kelvin).powi(2) / 1.0e6).max(1.0);
            let diff = f64::from(back.abs_diff(kelvin));
            assert!(diff <= step, "{kelvin} -> {mirek} -> {back}");
        }
    }

    #[test]
    fn kelvin_round_trip_is_coarse_at_the_cold_end() {
        let mirek = kelvin_to_mirek(6431).unwrap();
        let back = mirek_to_kelvin(f64::from(mirek)).unwrap();
        assert_eq!(mirek, 155);
        assert_eq!(back, 6452);
    }

    #[test]
    fn invalid_mirek() {
        assert_eq!(mirek_to_kelvin(0.0), None);
        assert_eq!(mirek_to_kelvin(f64::NAN), None);
        assert_eq!(kelvin_to_mirek(0), None);
    }
}
