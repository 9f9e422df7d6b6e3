//! Host document model
//!
//! The seam where a real page would sit: a tree of nodes with shadow
//! roots, nested frames, and playable elements, plus the three event
//! streams the engine consumes (mutations, media lifecycle signals, key
//! input). Subframe documents share the page's media event channel, so
//! element signals surface page-wide, but they keep their own mutation
//! channel; the engine deliberately observes only the top document and
//! relies on its scans for nested content.

mod media;
mod node;

pub use media::{MediaEvent, MediaEventKind, MediaOptions, MediaRef, RateWriteError};
pub use node::{Mutation, NodeId, NodeRef};

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::broadcast;

use media::MediaState;
use node::{FrameContent, NodeInner};

/// Buffer for each of the document's event streams.
const EVENT_CAPACITY: usize = 256;

/// A key press dispatched at the document, as seen by the in-page
/// shortcut interceptor.
#[derive(Debug, Clone, Copy)]
pub struct KeyPress {
    pub key: char,
    pub alt: bool,
    pub shift: bool,
    /// Focus is inside a text-input context; shortcuts must not fire.
    pub in_text_input: bool,
}

pub(crate) struct DocInner {
    pub(crate) hostname: String,
    pub(crate) root: NodeRef,
    /// True for the top-level page document; subframe documents are
    /// connected through their host iframe instead.
    pub(crate) is_page: bool,
    /// The iframe node hosting this document, for subframes.
    pub(crate) host: Mutex<Weak<NodeInner>>,
    pub(crate) mutation_tx: broadcast::Sender<Mutation>,
    pub(crate) media_tx: broadcast::Sender<MediaEvent>,
    pub(crate) key_tx: broadcast::Sender<KeyPress>,
}

/// Handle to a document. Clones refer to the same tree.
#[derive(Clone)]
pub struct Document {
    pub(crate) inner: Arc<DocInner>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("hostname", &self.inner.hostname)
            .field("is_page", &self.inner.is_page)
            .finish()
    }
}

impl Document {
    /// Create a top-level page document.
    pub fn new(hostname: &str) -> Document {
        let (media_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self::build(hostname, true, media_tx)
    }

    /// Create a subframe document sharing the page's media channel.
    fn new_subframe(hostname: &str, media_tx: broadcast::Sender<MediaEvent>) -> Document {
        Self::build(hostname, false, media_tx)
    }

    fn build(
        hostname: &str,
        is_page: bool,
        media_tx: broadcast::Sender<MediaEvent>,
    ) -> Document {
        let (mutation_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (key_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let hostname = hostname.to_string();
        let inner = Arc::new_cyclic(|weak: &Weak<DocInner>| {
            let root = NodeRef::construct(weak.clone(), "#document", true, false, None);
            DocInner {
                hostname,
                root,
                is_page,
                host: Mutex::new(Weak::new()),
                mutation_tx,
                media_tx,
                key_tx,
            }
        });
        Document { inner }
    }

    pub fn hostname(&self) -> &str {
        &self.inner.hostname
    }

    pub fn root(&self) -> NodeRef {
        self.inner.root.clone()
    }

    /// Create a detached element owned by this document.
    pub fn create_element(&self, tag: &str) -> NodeRef {
        NodeRef::construct(Arc::downgrade(&self.inner), tag, false, false, None)
    }

    /// Create a detached playable element with default host behavior.
    pub fn create_media(&self, tag: &str) -> NodeRef {
        self.create_media_with(tag, MediaOptions::default())
    }

    /// Create a detached playable element with explicit host behavior.
    pub fn create_media_with(&self, tag: &str, options: MediaOptions) -> NodeRef {
        NodeRef::construct(
            Arc::downgrade(&self.inner),
            tag,
            false,
            false,
            Some(MediaState::new(options)),
        )
    }

    /// Create a detached iframe whose nested document is same-origin
    /// accessible.
    pub fn create_frame_same_origin(&self, hostname: &str) -> NodeRef {
        let node = self.create_element("iframe");
        let sub = Document::new_subframe(hostname, self.inner.media_tx.clone());
        *sub.inner.host.lock().unwrap() = Arc::downgrade(&node.0);
        *node.0.frame.lock().unwrap() = Some(FrameContent::SameOrigin(sub));
        node
    }

    /// Create a detached iframe whose nested document is opaque.
    pub fn create_frame_cross_origin(&self) -> NodeRef {
        let node = self.create_element("iframe");
        *node.0.frame.lock().unwrap() = Some(FrameContent::CrossOrigin);
        node
    }

    /// Observe tree changes (top document only; shadow trees and
    /// subframes are blind spots by design).
    pub fn subscribe_mutations(&self) -> broadcast::Receiver<Mutation> {
        self.inner.mutation_tx.subscribe()
    }

    /// Observe media lifecycle signals, page-wide.
    pub fn subscribe_media_events(&self) -> broadcast::Receiver<MediaEvent> {
        self.inner.media_tx.subscribe()
    }

    /// Observe key input dispatched at the document.
    pub fn subscribe_keys(&self) -> broadcast::Receiver<KeyPress> {
        self.inner.key_tx.subscribe()
    }

    /// Dispatch a key press at the document.
    pub fn dispatch_key(&self, press: KeyPress) {
        let _ = self.inner.key_tx.send(press);
    }
}
