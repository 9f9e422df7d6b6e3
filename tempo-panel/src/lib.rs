//! # Tempo Control Panel
//!
//! Popup-style controller for one page's discovery engine. The panel
//! holds only display state; the engine owns the truth. Every control
//! is optimistic: the displayed speed updates immediately, then the
//! engine's acknowledgement (or a later change notice) reconciles it.
//!
//! A panel can open before the page's engine has finished initializing,
//! so the initial connection retries a few times before declaring the
//! page inactive.

use std::fmt;

use sqlx::{Pool, Sqlite};
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use tempo_common::api::{Notice, Request, Response};
use tempo_common::config::PanelTiming;
use tempo_common::speed::{
    clamp_round, format_speed, DEFAULT_SPEED, SPEED_FINE_STEP, SPEED_STEP,
};
use tempo_common::{db, MessageBus, PageId};

/// One-click speeds shown as a button row.
pub const PRESETS: [f64; 7] = [0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

/// Tolerance for deciding which preset button to highlight.
const PRESET_EPSILON: f64 = 0.001;

/// What the status line under the speed display reads.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelStatus {
    Connecting,
    /// The page has no responding engine; it predates us or never
    /// initialized.
    Unavailable,
    MediaFound(usize),
    NoMedia,
    /// Confirmation after "remember for this site".
    Saved { speed: f64, hostname: String },
}

impl fmt::Display for PanelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelStatus::Connecting => write!(f, "Connecting..."),
            PanelStatus::Unavailable => write!(f, "Refresh page to activate"),
            PanelStatus::MediaFound(1) => write!(f, "1 media element found"),
            PanelStatus::MediaFound(n) => write!(f, "{n} media elements found"),
            PanelStatus::NoMedia => write!(f, "No media detected on this page"),
            PanelStatus::Saved { speed, hostname } => {
                write!(f, "\u{2713} Saved {}\u{00d7} for {hostname}", format_speed(*speed))
            }
        }
    }
}

pub struct ControlPanel {
    bus: MessageBus,
    page: PageId,
    prefs: Pool<Sqlite>,
    hostname: String,
    timing: PanelTiming,
    speed: f64,
    media_count: usize,
    status: PanelStatus,
}

impl ControlPanel {
    /// Open a panel against a page. Call [`connect`](Self::connect)
    /// next; until then the panel displays defaults.
    pub fn open(
        bus: MessageBus,
        page: PageId,
        prefs: Pool<Sqlite>,
        hostname: impl Into<String>,
        timing: PanelTiming,
    ) -> Self {
        ControlPanel {
            bus,
            page,
            prefs,
            hostname: hostname.into(),
            timing,
            speed: DEFAULT_SPEED,
            media_count: 0,
            status: PanelStatus::Connecting,
        }
    }

    /// Fetch initial state from the page's engine, retrying while it
    /// may still be initializing. Returns false when every attempt
    /// failed and the page must be considered inactive.
    pub async fn connect(&mut self) -> bool {
        let attempts = 1 + self.timing.max_retries;
        for attempt in 1..=attempts {
            match self.bus.request(self.page, Request::GetState).await {
                Ok(Response::State { speed, media_count }) => {
                    self.adopt(speed, media_count);
                    return true;
                }
                Ok(other) => {
                    debug!(page = %self.page, "unexpected state reply: {other:?}");
                }
                Err(e) => {
                    debug!(page = %self.page, attempt, "engine not responding: {e}");
                }
            }
            if attempt < attempts {
                sleep(Duration::from_millis(self.timing.retry_delay_ms)).await;
            }
        }
        warn!(page = %self.page, "engine never responded; page inactive");
        self.status = PanelStatus::Unavailable;
        false
    }

    /// Request a new speed. The display updates immediately; the
    /// engine's acknowledgement reconciles it afterwards.
    pub async fn set_speed(&mut self, raw: f64) {
        self.speed = clamp_round(raw);
        match self
            .bus
            .request(self.page, Request::SetSpeed { speed: self.speed })
            .await
        {
            Ok(Response::Ack {
                speed, media_count, ..
            }) => self.adopt(speed, media_count),
            Ok(other) => debug!(page = %self.page, "unexpected ack: {other:?}"),
            Err(e) => {
                debug!(page = %self.page, "set speed failed: {e}");
                self.status = PanelStatus::Unavailable;
            }
        }
    }

    /// Step the speed by the coarse or fine increment.
    pub async fn step(&mut self, up: bool, fine: bool) {
        let step = if fine { SPEED_FINE_STEP } else { SPEED_STEP };
        let delta = if up { step } else { -step };
        self.set_speed(self.speed + delta).await;
    }

    /// Back to normal speed.
    pub async fn reset(&mut self) {
        match self.bus.request(self.page, Request::ResetSpeed).await {
            Ok(Response::Ack {
                speed, media_count, ..
            }) => self.adopt(speed, media_count),
            Ok(other) => debug!(page = %self.page, "unexpected ack: {other:?}"),
            Err(e) => {
                debug!(page = %self.page, "reset failed: {e}");
                self.status = PanelStatus::Unavailable;
            }
        }
    }

    /// Whether a preset button should render highlighted.
    pub fn preset_active(&self, preset: f64) -> bool {
        (self.speed - preset).abs() < PRESET_EPSILON
    }

    /// Explicitly pin the current speed for this site.
    pub async fn remember(&mut self) {
        match db::remember_site(&self.prefs, &self.hostname, self.speed).await {
            Ok(()) => {
                self.status = PanelStatus::Saved {
                    speed: self.speed,
                    hostname: self.hostname.clone(),
                };
            }
            Err(e) => warn!("could not save site preference: {e}"),
        }
    }

    /// Fold a broadcast change notice into the display. Anyone may have
    /// changed the speed (shortcuts, another panel, self-healing).
    pub fn handle_notice(&mut self, notice: Notice) {
        let Notice::SpeedChanged {
            speed, media_count, ..
        } = notice;
        self.adopt(speed, media_count);
    }

    fn adopt(&mut self, speed: f64, media_count: usize) {
        self.speed = speed;
        self.media_count = media_count;
        self.status = if media_count == 0 {
            PanelStatus::NoMedia
        } else {
            PanelStatus::MediaFound(media_count)
        };
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn media_count(&self) -> usize {
        self.media_count
    }

    pub fn status(&self) -> &PanelStatus {
        &self.status
    }

    /// The big speed readout, e.g. `1.5×`.
    pub fn speed_label(&self) -> String {
        format!("{}\u{00d7}", format_speed(self.speed))
    }
}
