//! Playable element state and lifecycle signals

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use thiserror::Error;

use super::node::{NodeId, NodeRef};

/// Rate write rejected by the host element.
#[derive(Debug, Error)]
#[error("playback rate is not settable on this element")]
pub struct RateWriteError;

/// Host-side behavior knobs for a media element, used to model the
/// uncooperative players found in the wild.
#[derive(Debug, Clone, Copy)]
pub struct MediaOptions {
    /// Name under which the host exposes pitch preservation, if at all.
    /// Vendor-prefixed variants exist on older hosts.
    pub pitch_flag: Option<&'static str>,
    /// Host rejects playback-rate writes entirely.
    pub rate_locked: bool,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            pitch_flag: Some("preservesPitch"),
            rate_locked: false,
        }
    }
}

pub(crate) struct MediaState {
    rate: Mutex<f64>,
    pitch_flag: Option<&'static str>,
    preserves_pitch: AtomicBool,
    rate_locked: AtomicBool,
}

impl MediaState {
    pub(crate) fn new(options: MediaOptions) -> Self {
        Self {
            rate: Mutex::new(1.0),
            pitch_flag: options.pitch_flag,
            preserves_pitch: AtomicBool::new(false),
            rate_locked: AtomicBool::new(options.rate_locked),
        }
    }
}

/// Lifecycle signals emitted by a media element. Third-party players
/// commonly reset playback rate around these, so the engine re-asserts
/// the authoritative speed when they fire for a tracked element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEventKind {
    LoadedMetadata,
    LoadedData,
    CanPlay,
    Playing,
    Seeked,
    /// The element's rate changed, by anyone. Fires for the engine's own
    /// writes too, exactly like the host platform.
    RateChanged { rate: f64 },
}

/// A lifecycle signal attributed to a specific element.
#[derive(Debug, Clone, Copy)]
pub struct MediaEvent {
    pub node: NodeId,
    pub kind: MediaEventKind,
}

/// Handle to a playable element. Obtained via [`NodeRef::as_media`],
/// which guarantees the node carries media state.
#[derive(Clone)]
pub struct MediaRef {
    node: NodeRef,
}

impl fmt::Debug for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaRef")
            .field("id", &self.node.id())
            .field("tag", &self.node.tag())
            .finish()
    }
}

impl MediaRef {
    pub(crate) fn new(node: NodeRef) -> Self {
        Self { node }
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    pub fn tag(&self) -> &str {
        self.node.tag()
    }

    pub fn node(&self) -> &NodeRef {
        &self.node
    }

    pub fn is_connected(&self) -> bool {
        self.node.is_connected()
    }

    /// Current playback rate.
    pub fn playback_rate(&self) -> f64 {
        match self.state() {
            Some(state) => *state.rate.lock().unwrap(),
            None => 1.0,
        }
    }

    /// Write the playback rate, emitting a rate-change signal on success.
    /// Hosts may reject the write.
    pub fn set_playback_rate(&self, rate: f64) -> Result<(), RateWriteError> {
        let state = self.state().ok_or(RateWriteError)?;
        if state.rate_locked.load(Ordering::Relaxed) {
            return Err(RateWriteError);
        }
        *state.rate.lock().unwrap() = rate;
        self.fire(MediaEventKind::RateChanged { rate });
        Ok(())
    }

    /// Name of the pitch-preservation flag the host exposes, if any.
    pub fn pitch_flag(&self) -> Option<&'static str> {
        self.state().and_then(|s| s.pitch_flag)
    }

    /// Enable or disable pitch preservation. Returns false when the host
    /// exposes no such flag under any name.
    pub fn set_preserves_pitch(&self, preserve: bool) -> bool {
        match self.state() {
            Some(state) if state.pitch_flag.is_some() => {
                state.preserves_pitch.store(preserve, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    pub fn preserves_pitch(&self) -> bool {
        self.state()
            .map(|s| s.preserves_pitch.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Make further rate writes fail, modeling a host that rejects them.
    pub fn lock_rate(&self) {
        if let Some(state) = self.state() {
            state.rate_locked.store(true, Ordering::Relaxed);
        }
    }

    /// Emit a lifecycle signal from the host side.
    pub fn fire(&self, kind: MediaEventKind) {
        if let Some(doc) = self.node.0.doc.upgrade() {
            let _ = doc.media_tx.send(MediaEvent {
                node: self.node.id(),
                kind,
            });
        }
    }

    fn state(&self) -> Option<&MediaState> {
        self.node.0.media.as_ref()
    }
}
