//! Conversions between device units and HomeKit units.
//!
//! Every conversion rounds to the nearest integer, so round trips may be off
//! by one. Nothing here panics: out-of-domain input produces an out-of-range
//! result which the proxy's range checks reject.

use serde::Serialize;

const RGB_MAX: f64 = 254.0;
const ZIGBEE_HUE_MAX: f64 = 65535.0;
const DEGREES_MAX: f64 = 360.0;
const MIRED_KELVIN_FACTOR: f64 = 1_000_000.0;

pub fn rgb_to_percent(value: i64) -> i64 {
    (value as f64 / RGB_MAX * 100.0).round() as i64
}

pub fn percent_to_rgb(percent: i64) -> i64 {
    (percent as f64 * RGB_MAX / 100.0).round() as i64
}

pub fn zigbee_to_degrees(value: i64) -> i64 {
    (value as f64 / ZIGBEE_HUE_MAX * DEGREES_MAX).round() as i64
}

pub fn degrees_to_zigbee(degrees: i64) -> i64 {
    (degrees as f64 / DEGREES_MAX * ZIGBEE_HUE_MAX).round() as i64
}

/// Non-positive input maps to 0.
pub fn mired_to_kelvin(mired: i64) -> i64 {
    reciprocal(mired)
}

/// Non-positive input maps to 0.
pub fn kelvin_to_mired(kelvin: i64) -> i64 {
    reciprocal(kelvin)
}

fn reciprocal(value: i64) -> i64 {
    if value <= 0 {
        return 0;
    }
    (MIRED_KELVIN_FACTOR / value as f64).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hsv {
    /// Degrees, 0-360.
    pub hue: u16,
    /// Percent, 0-100.
    pub saturation: u8,
    /// Percent, 0-100.
    pub value: u8,
}

/// Approximates the color of a black body at the given temperature.
///
/// Uses the usual empirical curve fit on `kelvin / 100`, with separate
/// logarithmic and power-law branches around 66 (and 19 for blue).
pub fn temperature_to_rgb(mired: i64) -> Rgb {
    let temperature = mired_to_kelvin(mired) as f64 / 100.0;

    let red = if temperature <= 66.0 {
        255.0
    } else {
        329.698727446 * (temperature - 60.0).powf(-0.1332047592)
    };

    let green = if temperature <= 66.0 {
        99.4708025861 * temperature.ln() - 161.1195681661
    } else {
        288.1221695283 * (temperature - 60.0).powf(-0.0755148492)
    };

    let blue = if temperature >= 66.0 {
        255.0
    } else if temperature <= 19.0 {
        0.0
    } else {
        138.5177312231 * (temperature - 10.0).ln() - 305.0447927307
    };

    Rgb {
        red: channel(red),
        green: channel(green),
        blue: channel(blue),
    }
}

fn channel(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 255.0).round() as u8
}

pub fn rgb_to_hsv(rgb: Rgb) -> Hsv {
    let red = f64::from(rgb.red) / 255.0;
    let green = f64::from(rgb.green) / 255.0;
    let blue = f64::from(rgb.blue) / 255.0;

    let max = red.max(green).max(blue);
    let min = red.min(green).min(blue);
    let delta = max - min;

    let mut hue = if delta == 0.0 {
        0.0
    } else if max == red {
        60.0 * (((green - blue) / delta) % 6.0)
    } else if max == green {
        60.0 * ((blue - red) / delta + 2.0)
    } else {
        60.0 * ((red - green) / delta + 4.0)
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    let saturation = if max == 0.0 { 0.0 } else { delta / max * 100.0 };

    Hsv {
        hue: hue.round() as u16,
        saturation: saturation.round() as u8,
        value: (max * 100.0).round() as u8,
    }
}

pub fn temperature_to_hsv(mired: i64) -> Hsv {
    rgb_to_hsv(temperature_to_rgb(mired))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brightness_round_trips_within_one() {
        for percent in 0..=100 {
            let back = rgb_to_percent(percent_to_rgb(percent));
            assert!((back - percent).abs() <= 1, "{percent} -> {back}");
        }
        assert_eq!(rgb_to_percent(254), 100);
        assert_eq!(rgb_to_percent(127), 50);
        assert_eq!(percent_to_rgb(100), 254);
    }

    #[test]
    fn hue_round_trips_within_one() {
        for degrees in 0..=360 {
            let back = zigbee_to_degrees(degrees_to_zigbee(degrees));
            assert!((back - degrees).abs() <= 1, "{degrees} -> {back}");
        }
        assert_eq!(zigbee_to_degrees(65535), 360);
        assert_eq!(degrees_to_zigbee(180), 32768);
    }

    #[test]
    fn mired_kelvin_round_trips() {
        for mired in 50..=400 {
            let back = kelvin_to_mired(mired_to_kelvin(mired));
            assert!((back - mired).abs() <= 1, "{mired} -> {back}");
        }
        assert_eq!(mired_to_kelvin(154), 6494);
        assert_eq!(kelvin_to_mired(2700), 370);
    }

    #[test]
    fn reciprocal_of_zero_is_zero() {
        assert_eq!(mired_to_kelvin(0), 0);
        assert_eq!(kelvin_to_mired(-5), 0);
    }

    #[test]
    fn daylight_is_nearly_white() {
        let rgb = temperature_to_rgb(154);
        assert_eq!(rgb.red, 255);
        assert!(rgb.green >= 250, "{rgb:?}");
        assert!(rgb.blue >= 245, "{rgb:?}");

        let hsv = rgb_to_hsv(rgb);
        assert!(hsv.saturation <= 2, "{hsv:?}");
        assert_eq!(hsv.value, 100);
    }

    #[test]
    fn warm_white_is_orange() {
        let rgb = temperature_to_rgb(370);
        assert_eq!(rgb.red, 255);
        assert!((160..=172).contains(&rgb.green), "{rgb:?}");
        assert!((80..=95).contains(&rgb.blue), "{rgb:?}");

        let hsv = temperature_to_hsv(370);
        assert!((25..=32).contains(&hsv.hue), "{hsv:?}");
        assert!(hsv.saturation > 50, "{hsv:?}");
    }

    #[test]
    fn cold_white_leans_blue() {
        let rgb = temperature_to_rgb(100);
        assert_eq!(rgb.blue, 255);
        assert!(rgb.red < rgb.green && rgb.green < rgb.blue, "{rgb:?}");

        let hsv = rgb_to_hsv(rgb);
        assert!((215..=230).contains(&hsv.hue), "{hsv:?}");
    }

    #[test]
    fn degenerate_temperature_does_not_panic() {
        let rgb = temperature_to_rgb(0);
        assert_eq!(rgb, Rgb { red: 255, green: 0, blue: 0 });
    }

    #[test]
    fn hsv_of_primaries() {
        let red = rgb_to_hsv(Rgb { red: 255, green: 0, blue: 0 });
        let green = rgb_to_hsv(Rgb { red: 0, green: 255, blue: 0 });
        let blue = rgb_to_hsv(Rgb { red: 0, green: 0, blue: 255 });
        assert_eq!((red.hue, red.saturation, red.value), (0, 100, 100));
        assert_eq!(green.hue, 120);
        assert_eq!(blue.hue, 240);
        assert_eq!(rgb_to_hsv(Rgb { red: 0, green: 0, blue: 0 }).saturation, 0);
    }
}
