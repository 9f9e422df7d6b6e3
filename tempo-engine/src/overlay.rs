//! On-page floating control
//!
//! A pure view plus input adapter: its display strictly mirrors the
//! authoritative speed and it never holds divergent state. Inputs
//! translate to speed actions the engine executes through the registry.
//! Also hosts the in-page keyboard shortcut interceptor.

use tempo_common::speed::{clamp_round, format_speed, SpeedTone, SPEED_MIN};

use crate::dom::KeyPress;

/// The overlay slider covers the common range only; higher speeds pin
/// the slider to its maximum while the label shows the true value.
pub const SLIDER_MAX: f64 = 4.0;
pub const SLIDER_MIN: f64 = SPEED_MIN;
pub const SLIDER_STEP: f64 = 0.05;

/// A speed action requested through an input surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedAction {
    Increase,
    Decrease,
    Reset,
    Set(f64),
}

/// Inputs the overlay can receive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayInput {
    BadgeClicked,
    Increase,
    Decrease,
    Reset,
    Slider(f64),
}

/// View state of the floating control.
#[derive(Debug)]
pub struct Overlay {
    created: bool,
    visible: bool,
    controls_expanded: bool,
    label: String,
    tone: SpeedTone,
    slider_pos: f64,
}

impl Overlay {
    /// A not-yet-created overlay; creation is deferred until the page has
    /// settled.
    pub fn new() -> Self {
        Self {
            created: false,
            visible: false,
            controls_expanded: false,
            label: format_speed(1.0),
            tone: SpeedTone::Normal,
            slider_pos: 1.0,
        }
    }

    /// Materialize the overlay. Idempotent.
    pub fn create(&mut self) {
        self.created = true;
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Mirror the authoritative state. Visible only while media is
    /// tracked.
    pub fn refresh(&mut self, speed: f64, media_count: usize) {
        self.label = format_speed(speed);
        self.tone = SpeedTone::of(speed);
        self.slider_pos = speed.min(SLIDER_MAX);
        self.visible = self.created && media_count > 0;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tone(&self) -> SpeedTone {
        self.tone
    }

    pub fn slider_pos(&self) -> f64 {
        self.slider_pos
    }

    pub fn controls_expanded(&self) -> bool {
        self.controls_expanded
    }

    /// Translate an input into a speed action. Badge clicks only toggle
    /// the expanded controls and produce no action.
    pub fn handle_input(&mut self, input: OverlayInput) -> Option<SpeedAction> {
        match input {
            OverlayInput::BadgeClicked => {
                self.controls_expanded = !self.controls_expanded;
                None
            }
            OverlayInput::Increase => Some(SpeedAction::Increase),
            OverlayInput::Decrease => Some(SpeedAction::Decrease),
            OverlayInput::Reset => Some(SpeedAction::Reset),
            OverlayInput::Slider(raw) => Some(SpeedAction::Set(clamp_round(raw))),
        }
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}

/// In-page keyboard shortcuts: modifier (alt or shift) plus `d`/`.` for
/// faster, `s`/`,` for slower, `r` for reset. Never intercepts while
/// focus is in a text-input context.
pub fn intercept_key(press: &KeyPress) -> Option<SpeedAction> {
    if press.in_text_input {
        return None;
    }
    if !press.alt && !press.shift {
        return None;
    }
    match press.key.to_ascii_lowercase() {
        'd' | '.' => Some(SpeedAction::Increase),
        's' | ',' => Some(SpeedAction::Decrease),
        'r' => Some(SpeedAction::Reset),
        _ => None,
    }
}
