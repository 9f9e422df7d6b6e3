//! # Tempo Coordinator
//!
//! The always-on side of the system: tracks which page currently has
//! focus, forwards global speed shortcuts to that page's engine, and
//! mirrors the authoritative speed onto a toolbar-style badge.
//!
//! Commands aimed at a page without a responding engine are dropped
//! silently; the user simply sees nothing happen, which matches a
//! shortcut pressed on a page we never activated on.

use std::str::FromStr;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info};

use tempo_common::api::{Notice, Request, Response};
use tempo_common::speed::{format_speed, DEFAULT_SPEED};
use tempo_common::{Error, MessageBus, PageId};

/// Global commands, as bound in the shortcut settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SpeedUp,
    SpeedDown,
    ResetSpeed,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "speed-up" => Ok(Command::SpeedUp),
            "speed-down" => Ok(Command::SpeedDown),
            "reset-speed" => Ok(Command::ResetSpeed),
            other => Err(Error::InvalidInput(format!("unknown command: {other}"))),
        }
    }
}

/// Badge text for a speed: blank at normal speed, `1.5×` style otherwise.
pub fn badge_text(speed: f64) -> String {
    if speed == DEFAULT_SPEED {
        String::new()
    } else {
        format!("{}\u{00d7}", format_speed(speed))
    }
}

pub struct Coordinator {
    bus: MessageBus,
    active: Option<PageId>,
    badge: watch::Sender<String>,
}

impl Coordinator {
    /// Build a coordinator plus the badge observers watch.
    pub fn new(bus: MessageBus) -> (Coordinator, watch::Receiver<String>) {
        let (badge, badge_rx) = watch::channel(String::new());
        (
            Coordinator {
                bus,
                active: None,
                badge,
            },
            badge_rx,
        )
    }

    /// Focus moved to a page (or away from everything). Primes the
    /// badge from the page's current state; a page without an engine
    /// clears it.
    pub async fn set_active_page(&mut self, page: Option<PageId>) {
        self.active = page;
        let Some(page) = page else {
            self.set_badge(DEFAULT_SPEED);
            return;
        };
        match self.bus.request(page, Request::GetState).await {
            Ok(Response::State { speed, .. }) => self.set_badge(speed),
            Ok(other) => debug!(%page, "unexpected state reply: {other:?}"),
            Err(e) => {
                debug!(%page, "no engine on active page: {e}");
                self.set_badge(DEFAULT_SPEED);
            }
        }
    }

    /// Forward one command to the active page's engine.
    pub async fn handle_command(&mut self, command: Command) {
        let Some(page) = self.active else {
            debug!(?command, "no active page; command dropped");
            return;
        };
        let request = match command {
            Command::SpeedUp => Request::IncreaseSpeed,
            Command::SpeedDown => Request::DecreaseSpeed,
            Command::ResetSpeed => Request::ResetSpeed,
        };
        match self.bus.request(page, request).await {
            Ok(Response::Ack { speed, .. }) => {
                info!(%page, speed, ?command, "command applied");
                self.set_badge(speed);
            }
            Ok(other) => debug!(%page, "command not acknowledged: {other:?}"),
            // Inactive pages swallow commands; that is the contract
            Err(e) => debug!(%page, ?command, "command dropped: {e}"),
        }
    }

    /// Fold a speed change notice into the badge, whoever caused it.
    pub fn handle_notice(&mut self, notice: Notice) {
        let Notice::SpeedChanged { speed, .. } = notice;
        self.set_badge(speed);
    }

    fn set_badge(&self, speed: f64) {
        // Send fails only with no observers, which is fine
        let _ = self.badge.send(badge_text(speed));
    }

    /// Drive the coordinator until the command source closes.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut notices = self.bus.subscribe();
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                notice = notices.recv() => match notice {
                    Ok(notice) => self.handle_notice(notice),
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }
}
