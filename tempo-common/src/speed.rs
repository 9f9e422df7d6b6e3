//! Speed arithmetic and display formatting
//!
//! One authoritative playback speed exists per page context. Every write
//! goes through [`clamp_round`] before storage or application, so the rest
//! of the system only ever sees values in `[0.25, 16]` at two-decimal
//! precision.

/// Lowest accepted playback speed.
pub const SPEED_MIN: f64 = 0.25;

/// Highest accepted playback speed.
pub const SPEED_MAX: f64 = 16.0;

/// Increment applied by the step commands (keyboard, overlay buttons).
pub const SPEED_STEP: f64 = 0.25;

/// Finer increment for shift-modified stepping in the control panel.
pub const SPEED_FINE_STEP: f64 = 0.1;

/// Speed applied when no preference exists or input is unusable.
pub const DEFAULT_SPEED: f64 = 1.0;

/// Drift past this tolerance from the authoritative value is treated as
/// an external rate reset and triggers a self-heal reapplication.
pub const DRIFT_TOLERANCE: f64 = 0.01;

/// Canonicalize a raw speed value.
///
/// Non-finite input maps to [`DEFAULT_SPEED`], then the value is clamped
/// to `[SPEED_MIN, SPEED_MAX]` and rounded to two decimals. Idempotent:
/// `clamp_round(clamp_round(x)) == clamp_round(x)` for all inputs.
pub fn clamp_round(raw: f64) -> f64 {
    let speed = if raw.is_finite() { raw } else { DEFAULT_SPEED };
    let speed = speed.clamp(SPEED_MIN, SPEED_MAX);
    (speed * 100.0).round() / 100.0
}

/// Format a speed for display, dropping trailing zero decimals.
///
/// `1.0 -> "1"`, `1.5 -> "1.5"`, `1.25 -> "1.25"`.
pub fn format_speed(speed: f64) -> String {
    let speed = (speed * 100.0).round() / 100.0;
    if speed == speed.trunc() {
        return format!("{}", speed as i64);
    }
    let two = format!("{:.2}", speed);
    if two.ends_with('0') {
        format!("{:.1}", speed)
    } else {
        two
    }
}

/// Display classification of a speed value, used by the overlay and the
/// control panel to pick a color class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedTone {
    Slow,
    Normal,
    Fast,
    Extreme,
}

impl SpeedTone {
    /// Classify a (canonical) speed value.
    pub fn of(speed: f64) -> Self {
        if speed < 1.0 {
            SpeedTone::Slow
        } else if speed == 1.0 {
            SpeedTone::Normal
        } else if speed <= 2.0 {
            SpeedTone::Fast
        } else {
            SpeedTone::Extreme
        }
    }
}
