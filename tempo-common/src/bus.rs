//! In-process message bus connecting the three execution contexts
//!
//! Fire-and-forget request/response over an unreliable channel: the
//! addressed page may have no engine yet, may go away before replying, or
//! may reply after the caller stopped waiting. The bus enforces no
//! timeout; callers apply their own bounded retry where they need one.
//!
//! Notifications are a separate lossy broadcast: sending with no
//! listeners is not an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use crate::api::{Notice, Request, Response};

/// Identifies one page context on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Delivery failures a caller can observe.
#[derive(Debug, Error)]
pub enum BusError {
    /// No engine has registered for the page (not yet initialized, or the
    /// page does not exist). Callers treat this the same as "no answer".
    #[error("no responder registered for page {0}")]
    NoResponder(PageId),

    /// The responder existed but went away before producing a reply.
    #[error("responder for page {0} dropped the request")]
    NoReply(PageId),
}

/// A request paired with its one-shot reply channel.
#[derive(Debug)]
pub struct Envelope {
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}

struct BusInner {
    endpoints: Mutex<HashMap<PageId, mpsc::Sender<Envelope>>>,
    notice_tx: broadcast::Sender<Notice>,
}

/// Shared handle to the bus. Cheap to clone.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Create a new bus.
    ///
    /// `capacity` bounds both per-endpoint request queues and the
    /// notification buffer (100 is a reasonable default).
    pub fn new(capacity: usize) -> Self {
        let (notice_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                endpoints: Mutex::new(HashMap::new()),
                notice_tx,
            }),
        }
    }

    /// Register a request endpoint for a page, replacing any previous one.
    ///
    /// An engine calls this once it is initialized and able to answer;
    /// before that, senders observe [`BusError::NoResponder`].
    pub fn register(&self, page: PageId) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(32);
        let previous = self
            .inner
            .endpoints
            .lock()
            .unwrap()
            .insert(page, tx);
        if previous.is_some() {
            debug!(%page, "replaced existing bus endpoint");
        }
        rx
    }

    /// Remove a page's endpoint. Requests sent afterwards fail with
    /// [`BusError::NoResponder`].
    pub fn unregister(&self, page: PageId) {
        self.inner.endpoints.lock().unwrap().remove(&page);
    }

    /// Send a request to a page's engine and wait for its reply.
    ///
    /// No timeout is applied here; an absent endpoint or a dropped reply
    /// surfaces as an error immediately, but a live endpoint that never
    /// answers will block the caller until it drops the envelope.
    pub async fn request(&self, page: PageId, request: Request) -> Result<Response, BusError> {
        let endpoint = {
            let endpoints = self.inner.endpoints.lock().unwrap();
            endpoints.get(&page).cloned()
        };
        let endpoint = endpoint.ok_or(BusError::NoResponder(page))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        endpoint
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| BusError::NoResponder(page))?;

        reply_rx.await.map_err(|_| BusError::NoReply(page))
    }

    /// Broadcast a notification, ignoring the absence of listeners.
    pub fn notify(&self, notice: Notice) {
        let _ = self.inner.notice_tx.send(notice);
    }

    /// Subscribe to the notification stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.inner.notice_tx.subscribe()
    }

    /// Number of live notification listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.notice_tx.receiver_count()
    }
}
