//! Discovery scans
//!
//! A full scan walks the main document, every shadow tree, and every
//! same-origin-accessible subframe document. Cross-origin frames fail
//! the accessibility check and are skipped without error. No single
//! notification mechanism is reliable on real pages, so these scans are
//! also re-run periodically and after interesting mutations; the registry
//! they feed is idempotent, so overlap is free.

use crate::dom::{Document, MediaRef, NodeRef};

/// Attributes that define an element's media source. A change to one of
/// these on a playable element is treated as the element (re)appearing.
pub fn is_source_attr(name: &str) -> bool {
    matches!(name, "src" | "currentSrc")
}

/// Collect every playable element reachable from the document.
pub fn collect_media(doc: &Document) -> Vec<MediaRef> {
    let mut found = Vec::new();
    walk(&doc.root(), &mut found);
    found
}

/// Collect playable elements within one subtree (used for the local
/// sub-query after a non-playable subtree insertion).
pub fn collect_media_in(node: &NodeRef) -> Vec<MediaRef> {
    let mut found = Vec::new();
    walk(node, &mut found);
    found
}

fn walk(node: &NodeRef, found: &mut Vec<MediaRef>) {
    if let Some(media) = node.as_media() {
        found.push(media);
    }
    if let Some(shadow) = node.shadow_root() {
        walk(&shadow, found);
    }
    if let Some(content) = node.content_document() {
        // Same-origin frame; cross-origin frames return no document
        walk(&content.root(), found);
    }
    for child in node.children() {
        walk(&child, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn full_scan_reaches_shadow_and_frames() {
        let page = Document::new("example.com");
        let root = page.root();

        let video = page.create_media("video");
        root.append_child(&video);

        let host = page.create_element("div");
        root.append_child(&host);
        host.attach_shadow().append_child(&page.create_media("audio"));

        let iframe = page.create_frame_same_origin("cdn.example.com");
        root.append_child(&iframe);
        let sub = iframe.content_document().unwrap();
        sub.root().append_child(&sub.create_media("video"));

        // Opaque frame contributes nothing and raises no error
        root.append_child(&page.create_frame_cross_origin());

        assert_eq!(collect_media(&page).len(), 3);
    }

    #[test]
    fn subtree_query_is_local() {
        let page = Document::new("example.com");
        let container = page.create_element("div");
        let inner = page.create_element("section");
        container.append_child(&inner);
        inner.append_child(&page.create_media("video"));

        page.root().append_child(&page.create_media("audio"));

        assert_eq!(collect_media_in(&container).len(), 1);
    }

    #[test]
    fn source_attr_filter() {
        assert!(is_source_attr("src"));
        assert!(is_source_attr("currentSrc"));
        assert!(!is_source_attr("class"));
        assert!(!is_source_attr("controls"));
    }
}
