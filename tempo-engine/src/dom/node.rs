//! Node tree primitives for the host document model

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use uuid::Uuid;

use super::media::{MediaRef, MediaState};
use super::{DocInner, Document};

/// Object identity of one node. Two handles refer to the same element
/// exactly when their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Uuid);

impl NodeId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Content behind an `iframe` node.
pub(crate) enum FrameContent {
    /// Same-origin frame: the nested document is accessible.
    SameOrigin(Document),
    /// Cross-origin frame: the nested document is opaque.
    CrossOrigin,
}

pub(crate) struct NodeInner {
    pub(crate) id: NodeId,
    pub(crate) tag: String,
    pub(crate) is_root: bool,
    pub(crate) is_shadow_root: bool,
    pub(crate) doc: Weak<DocInner>,
    pub(crate) parent: Mutex<Weak<NodeInner>>,
    pub(crate) children: Mutex<Vec<NodeRef>>,
    pub(crate) attrs: Mutex<HashMap<String, String>>,
    pub(crate) shadow: Mutex<Option<NodeRef>>,
    pub(crate) frame: Mutex<Option<FrameContent>>,
    pub(crate) media: Option<MediaState>,
}

/// Shared handle to one node. Clones refer to the same element.
#[derive(Clone)]
pub struct NodeRef(pub(crate) Arc<NodeInner>);

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.0.id)
            .field("tag", &self.0.tag)
            .finish()
    }
}

impl NodeRef {
    pub(crate) fn construct(
        doc: Weak<DocInner>,
        tag: &str,
        is_root: bool,
        is_shadow_root: bool,
        media: Option<MediaState>,
    ) -> Self {
        NodeRef(Arc::new(NodeInner {
            id: NodeId::new(),
            tag: tag.to_string(),
            is_root,
            is_shadow_root,
            doc,
            parent: Mutex::new(Weak::new()),
            children: Mutex::new(Vec::new()),
            attrs: Mutex::new(HashMap::new()),
            shadow: Mutex::new(None),
            frame: Mutex::new(None),
            media,
        }))
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    /// `video` and `audio` elements are playable.
    pub fn is_playable(&self) -> bool {
        matches!(self.0.tag.as_str(), "video" | "audio")
    }

    /// Media view of this node, if it carries playable state.
    pub fn as_media(&self) -> Option<MediaRef> {
        self.0.media.as_ref().map(|_| MediaRef::new(self.clone()))
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.attrs.lock().unwrap().get(name).cloned()
    }

    /// Set an attribute. Observable as an attribute mutation when the
    /// node sits in the observed (non-shadow) document tree.
    pub fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .attrs
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        if self.is_connected() && !self.in_shadow_tree() {
            if let Some(doc) = self.0.doc.upgrade() {
                let _ = doc.mutation_tx.send(Mutation::AttributeChanged {
                    node: self.clone(),
                    name: name.to_string(),
                });
            }
        }
    }

    /// Snapshot of the current child list.
    pub fn children(&self) -> Vec<NodeRef> {
        self.0.children.lock().unwrap().clone()
    }

    /// Append a child node.
    ///
    /// Emits a child-insertion mutation only when the insertion point is
    /// part of the observed document tree; building a detached subtree is
    /// invisible until the subtree root is attached, and shadow trees are
    /// never observed (the scans cover those).
    pub fn append_child(&self, child: &NodeRef) {
        *child.0.parent.lock().unwrap() = Arc::downgrade(&self.0);
        self.0.children.lock().unwrap().push(child.clone());
        if self.is_connected() && !self.in_shadow_tree() {
            if let Some(doc) = self.0.doc.upgrade() {
                let _ = doc.mutation_tx.send(Mutation::ChildInserted {
                    node: child.clone(),
                });
            }
        }
    }

    /// Detach a child. No mutation is emitted: removal paths are not
    /// reliably observable, which is why liveness is checked lazily.
    pub fn remove_child(&self, child: &NodeRef) {
        self.0
            .children
            .lock()
            .unwrap()
            .retain(|c| !Arc::ptr_eq(&c.0, &child.0));
        *child.0.parent.lock().unwrap() = Weak::new();
    }

    /// The node's shadow root, if one was attached.
    pub fn shadow_root(&self) -> Option<NodeRef> {
        self.0.shadow.lock().unwrap().clone()
    }

    /// Attach a shadow root to this node and return it.
    pub fn attach_shadow(&self) -> NodeRef {
        let shadow = NodeRef::construct(self.0.doc.clone(), "#shadow-root", false, true, None);
        *shadow.0.parent.lock().unwrap() = Arc::downgrade(&self.0);
        *self.0.shadow.lock().unwrap() = Some(shadow.clone());
        shadow
    }

    /// The nested document of a same-origin frame. `None` for non-frame
    /// nodes and for cross-origin frames (those are opaque).
    pub fn content_document(&self) -> Option<Document> {
        match &*self.0.frame.lock().unwrap() {
            Some(FrameContent::SameOrigin(doc)) => Some(doc.clone()),
            _ => None,
        }
    }

    /// Liveness check: is this node still reachable from the page root,
    /// crossing shadow-host and frame-host boundaries on the way up.
    pub fn is_connected(&self) -> bool {
        let mut current = self.0.clone();
        loop {
            let parent = current.parent.lock().unwrap().upgrade();
            match parent {
                Some(p) => current = p,
                None => {
                    // Top of this tree: a document root or a detached subtree
                    if !current.is_root {
                        return false;
                    }
                    let doc = match current.doc.upgrade() {
                        Some(doc) => doc,
                        None => return false,
                    };
                    let host = doc.host.lock().unwrap().upgrade();
                    match host {
                        Some(host) => current = host,
                        None => return doc.is_page,
                    }
                }
            }
        }
    }

    /// Whether the node lives inside a shadow tree (which mutation
    /// observation does not reach into).
    fn in_shadow_tree(&self) -> bool {
        let mut current = self.0.clone();
        loop {
            if current.is_shadow_root {
                return true;
            }
            let parent = current.parent.lock().unwrap().upgrade();
            match parent {
                Some(p) => current = p,
                None => return false,
            }
        }
    }
}

/// Observable document change.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// A node was inserted somewhere in the observed tree.
    ChildInserted { node: NodeRef },
    /// An attribute changed on an existing node.
    AttributeChanged { node: NodeRef, name: String },
}
