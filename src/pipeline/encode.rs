use super::layers::Rgba;

// Hand-tuned shading constants; changing them re-balances the whole map.
pub const SHADE_EXPONENT: f64 = 0.3;
pub const SHADE_GAIN: f64 = 0.5;
pub const SHADE_FLOOR: f64 = 0.08;
pub const LINE_DARKEN: f64 = 0.8;

/// Radii below this render as zero to avoid sub-pixel artifacts.
pub const MIN_CIRCLE_RADIUS: f64 = 0.01;

pub const TRANSPARENT: Rgba = [255, 255, 255, 0];
pub const CIRCLE_FILL: Rgba = [255, 0, 0, 51];
pub const CIRCLE_LINE: Rgba = [255, 0, 0, 204];
pub const STATE_LINE: Rgba = [128, 128, 128, 255];
pub const LABEL_COLOR: Rgba = [0, 0, 0, 100];

pub const LABEL_WEIGHT_THRESHOLD: f64 = 50.0;
/// Weight given to state short-code labels when circle weights are
/// normalized; keeps them above the density threshold regardless of data.
pub const STATE_LABEL_WEIGHT: f64 = 100.0;

/// Power-law shade with a floor, in `[SHADE_FLOOR, 1]` for positive values.
/// Zero is the caller's business: zero-valued entities render fully
/// transparent to distinguish "no data" from "small value".
fn shade(value: u64, max_value: u64) -> f64 {
    let normalized = if max_value == 0 {
        0.0
    } else {
        value as f64 / max_value as f64
    };
    (normalized.powf(SHADE_EXPONENT) * SHADE_GAIN).max(SHADE_FLOOR)
}

pub fn region_fill(value: u64, max_value: u64) -> Rgba {
    if value == 0 {
        return TRANSPARENT;
    }
    let lightness = to_lightness(shade(value, max_value));
    [255, lightness, lightness, 255]
}

pub fn region_line(value: u64, max_value: u64) -> Rgba {
    if value == 0 {
        return TRANSPARENT;
    }
    let lightness = to_lightness(shade(value, max_value));
    let darkened = if lightness == 255 {
        255
    } else {
        ((lightness as f64 * LINE_DARKEN).min(255.0)) as u8
    };
    [darkened, darkened, darkened, darkened]
}

fn to_lightness(shade: f64) -> u8 {
    (255.0 - (shade * 255.0)).clamp(0.0, 255.0) as u8
}

/// Square-root scaling keeps perceived circle area, not radius,
/// proportional to the underlying quantity.
pub fn circle_radius(value: u64) -> f64 {
    let radius = (value as f64).sqrt();
    if radius < MIN_CIRCLE_RADIUS { 0.0 } else { radius }
}

pub fn label_weight(value: u64) -> f64 {
    (value as f64).sqrt()
}

pub fn zoom_scale(initial_zoom: f64, zoom: f64) -> f64 {
    let initial = 2f64.powf(initial_zoom);
    let current = 2f64.powf(zoom);
    (initial / current).min(1.0)
}
