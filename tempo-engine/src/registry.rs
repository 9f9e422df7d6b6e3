//! Tracked media set
//!
//! The authoritative collection of playable elements under the engine's
//! control, keyed by object identity. Registration is idempotent and
//! immediately pins the element to the current speed. Membership is
//! pruned lazily by a liveness check before each reconciliation pass,
//! since detach events are not reliable across all removal paths.

use std::collections::HashMap;

use tracing::debug;

use tempo_common::speed::clamp_round;

use crate::dom::{MediaRef, NodeId};

pub struct MediaRegistry {
    tracked: HashMap<NodeId, MediaRef>,
}

impl MediaRegistry {
    pub fn new() -> Self {
        Self {
            tracked: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.tracked.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<MediaRef> {
        self.tracked.get(&id).cloned()
    }

    /// Track an element and apply the current speed to it. Re-registering
    /// a tracked element is a no-op; returns whether the element was
    /// newly tracked.
    pub fn register(&mut self, media: MediaRef, speed: f64) -> bool {
        if self.tracked.contains_key(&media.id()) {
            return false;
        }
        Self::apply(&media, speed);
        debug!(node = %media.id(), tag = media.tag(), "registered media element");
        self.tracked.insert(media.id(), media);
        true
    }

    /// Apply a speed to one element: set the rate and enable pitch
    /// preservation where the host exposes a flag for it. Failures are
    /// discarded per element; an uncooperative element must never break
    /// the caller or abort a batch.
    pub fn apply(media: &MediaRef, speed: f64) {
        let speed = clamp_round(speed);
        if let Err(e) = media.set_playback_rate(speed) {
            debug!(node = %media.id(), "could not set playback rate: {e}");
        }
        if media.pitch_flag().is_some() {
            media.set_preserves_pitch(true);
        }
    }

    /// Prune members no longer reachable from the page, then apply the
    /// speed to every survivor. Returns the live count.
    pub fn reconcile(&mut self, speed: f64) -> usize {
        let before = self.tracked.len();
        self.tracked.retain(|_, media| media.is_connected());
        let pruned = before - self.tracked.len();
        if pruned > 0 {
            debug!(pruned, remaining = self.tracked.len(), "pruned dead media elements");
        }
        for media in self.tracked.values() {
            Self::apply(media, speed);
        }
        self.tracked.len()
    }
}

impl Default for MediaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, MediaOptions};

    #[test]
    fn register_is_idempotent() {
        let doc = Document::new("example.com");
        let video = doc.create_media("video");
        doc.root().append_child(&video);
        let media = video.as_media().unwrap();

        let mut registry = MediaRegistry::new();
        assert!(registry.register(media.clone(), 1.5));
        assert!(!registry.register(media.clone(), 1.5));
        assert_eq!(registry.len(), 1);
        assert_eq!(media.playback_rate(), 1.5);
    }

    #[test]
    fn register_applies_speed_and_pitch_preservation() {
        let doc = Document::new("example.com");
        let video = doc.create_media("video");
        doc.root().append_child(&video);
        let media = video.as_media().unwrap();

        let mut registry = MediaRegistry::new();
        registry.register(media.clone(), 2.0);
        assert_eq!(media.playback_rate(), 2.0);
        assert!(media.preserves_pitch());
    }

    #[test]
    fn reconcile_prunes_exactly_the_dead() {
        let doc = Document::new("example.com");
        let staying = doc.create_media("video");
        let leaving = doc.create_media("video");
        doc.root().append_child(&staying);
        doc.root().append_child(&leaving);

        let mut registry = MediaRegistry::new();
        registry.register(staying.as_media().unwrap(), 1.0);
        registry.register(leaving.as_media().unwrap(), 1.0);
        assert_eq!(registry.len(), 2);

        doc.root().remove_child(&leaving);
        let count = registry.reconcile(1.0);
        assert_eq!(count, 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(staying.id()));
    }

    #[test]
    fn apply_failure_does_not_abort_the_batch() {
        let doc = Document::new("example.com");
        let stubborn = doc.create_media_with(
            "video",
            MediaOptions {
                rate_locked: true,
                ..MediaOptions::default()
            },
        );
        let normal = doc.create_media("video");
        doc.root().append_child(&stubborn);
        doc.root().append_child(&normal);

        let mut registry = MediaRegistry::new();
        registry.register(stubborn.as_media().unwrap(), 1.0);
        registry.register(normal.as_media().unwrap(), 1.0);

        let count = registry.reconcile(1.75);
        assert_eq!(count, 2);
        assert_eq!(normal.as_media().unwrap().playback_rate(), 1.75);
        // The stubborn element keeps its host rate, silently
        assert_eq!(stubborn.as_media().unwrap().playback_rate(), 1.0);
    }

    #[test]
    fn speeds_are_canonicalized_on_apply() {
        let doc = Document::new("example.com");
        let video = doc.create_media("video");
        doc.root().append_child(&video);
        let media = video.as_media().unwrap();

        let mut registry = MediaRegistry::new();
        registry.register(media.clone(), 99.0);
        assert_eq!(media.playback_rate(), 16.0);
    }
}
