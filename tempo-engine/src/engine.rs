//! Engine task
//!
//! One task per page owns all authoritative state: the tracked media
//! set, the current speed, and the overlay view. Requests from the bus,
//! document mutations, media lifecycle signals, key input, periodic
//! rescans, and deferred timer firings all interleave on this single
//! logical thread of control, so no intra-component race exists.
//!
//! Deferred work (debounced self-heal, post-mutation rescan, overlay
//! settle) is scheduled as sleep-then-send onto an internal channel;
//! timers are not cancelable once scheduled, which is safe because every
//! operation they trigger is idempotent.

use std::time::Duration;

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use tempo_common::api::{Notice, Request, Response};
use tempo_common::bus::{Envelope, MessageBus, PageId};
use tempo_common::config::EngineTiming;
use tempo_common::db;
use tempo_common::speed::{DEFAULT_SPEED, DRIFT_TOLERANCE, SPEED_STEP};

use crate::discovery;
use crate::dom::{Document, KeyPress, MediaEvent, MediaEventKind, Mutation, NodeId};
use crate::overlay::{intercept_key, Overlay, OverlayInput, SpeedAction};
use crate::registry::MediaRegistry;

/// Work items produced by the engine's own timers.
enum Deferred {
    /// Full scan after a subtree insertion (players often attach the
    /// real media element a beat after the placeholder).
    FullScan,
    /// Debounced self-heal reapplication for one element.
    Heal(NodeId),
    /// Materialize the overlay once the page has settled.
    CreateOverlay,
}

/// Handle to a running engine. Dropping it shuts the engine down.
pub struct EngineHandle {
    page_id: PageId,
    overlay_tx: mpsc::Sender<OverlayInput>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Feed an interaction with the on-page overlay to the engine.
    pub async fn overlay_input(&self, input: OverlayInput) {
        let _ = self.overlay_tx.send(input).await;
    }

    /// Stop the engine and wait for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

/// Initialize and start a discovery engine for one page.
///
/// Loads the persisted speed preference (per-site override, then global,
/// then 1.0), runs the initial scan, and only then registers the bus
/// endpoint, so callers cannot distinguish an uninitialized page from an
/// absent one, which is the contract.
pub async fn spawn(
    page: Document,
    bus: MessageBus,
    prefs: Pool<Sqlite>,
    timing: EngineTiming,
) -> EngineHandle {
    let page_id = PageId::new();
    let speed = db::load_speed(&prefs, page.hostname()).await;

    let (internal_tx, internal_rx) = mpsc::channel(64);
    let (overlay_tx, overlay_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    // Subscribe before anything else can mutate the page, so no event
    // emitted after spawn returns is missed.
    let streams = EventStreams {
        mutations: page.subscribe_mutations(),
        media: page.subscribe_media_events(),
        keys: page.subscribe_keys(),
    };

    let mut engine = Engine {
        page: page.clone(),
        page_id,
        bus: bus.clone(),
        prefs,
        timing,
        registry: MediaRegistry::new(),
        speed,
        overlay: Overlay::new(),
        internal_tx,
    };

    engine.scan();
    engine.reconcile_and_publish().await;
    engine.schedule(
        Deferred::CreateOverlay,
        Duration::from_millis(engine.timing.overlay_settle_delay_ms),
    );

    let request_rx = bus.register(page_id);
    info!(
        page = %page_id,
        host = page.hostname(),
        speed = engine.speed,
        media = engine.registry.len(),
        "discovery engine active"
    );

    let task = tokio::spawn(engine.run(request_rx, internal_rx, overlay_rx, shutdown_rx, streams));
    EngineHandle {
        page_id,
        overlay_tx,
        shutdown_tx,
        task,
    }
}

struct EventStreams {
    mutations: broadcast::Receiver<Mutation>,
    media: broadcast::Receiver<MediaEvent>,
    keys: broadcast::Receiver<KeyPress>,
}

struct Engine {
    page: Document,
    page_id: PageId,
    bus: MessageBus,
    prefs: Pool<Sqlite>,
    timing: EngineTiming,
    registry: MediaRegistry,
    speed: f64,
    overlay: Overlay,
    internal_tx: mpsc::Sender<Deferred>,
}

impl Engine {
    async fn run(
        mut self,
        mut request_rx: mpsc::Receiver<Envelope>,
        mut internal_rx: mpsc::Receiver<Deferred>,
        mut overlay_rx: mpsc::Receiver<OverlayInput>,
        mut shutdown_rx: mpsc::Receiver<()>,
        mut streams: EventStreams,
    ) {
        let rescan_period = Duration::from_millis(self.timing.rescan_interval_ms.max(1));
        let mut rescan = interval_at(Instant::now() + rescan_period, rescan_period);
        rescan.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                envelope = request_rx.recv() => match envelope {
                    Some(envelope) => self.handle_request(envelope).await,
                    None => break,
                },
                deferred = internal_rx.recv() => {
                    if let Some(deferred) = deferred {
                        self.handle_deferred(deferred).await;
                    }
                },
                input = overlay_rx.recv() => match input {
                    Some(input) => {
                        if let Some(action) = self.overlay.handle_input(input) {
                            self.apply_action(action).await;
                        }
                    }
                    None => break,
                },
                mutation = streams.mutations.recv() => match mutation {
                    Ok(mutation) => self.handle_mutation(mutation).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "mutation stream lagged; scheduling a full scan");
                        self.schedule(Deferred::FullScan, Duration::ZERO);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = streams.media.recv() => match event {
                    Ok(event) => self.handle_media_event(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!(missed, "media event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                press = streams.keys.recv() => match press {
                    Ok(press) => self.handle_key(press).await,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = rescan.tick() => {
                    // Fallback for players that rebuild their media
                    // element outside any observable mutation boundary
                    self.scan();
                    self.reconcile_and_publish().await;
                },
                _ = shutdown_rx.recv() => break,
            }
        }

        self.bus.unregister(self.page_id);
        debug!(page = %self.page_id, "discovery engine stopped");
    }

    /// Change the authoritative speed: canonicalize, reconcile every
    /// tracked element, refresh the overlay, notify listeners, persist.
    async fn set_speed(&mut self, raw: f64) {
        let speed = tempo_common::speed::clamp_round(raw);
        self.speed = speed;
        self.reconcile_and_publish().await;
        if let Err(e) = db::save_speed(&self.prefs, self.page.hostname(), speed).await {
            // Storage loss degrades persistence, never playback
            warn!("could not persist speed preference: {e}");
        }
    }

    async fn reconcile_and_publish(&mut self) {
        let count = self.registry.reconcile(self.speed);
        self.overlay.refresh(self.speed, count);
        self.notify(count);
    }

    fn notify(&self, media_count: usize) {
        self.bus.notify(Notice::SpeedChanged {
            speed: self.speed,
            media_count,
            timestamp: Utc::now(),
        });
    }

    /// Full discovery scan; registers anything new at the current speed.
    fn scan(&mut self) {
        let mut newly = 0usize;
        for media in discovery::collect_media(&self.page) {
            if self.registry.register(media, self.speed) {
                newly += 1;
            }
        }
        if newly > 0 {
            debug!(newly, total = self.registry.len(), "scan registered new media");
            self.overlay.refresh(self.speed, self.registry.len());
            self.notify(self.registry.len());
        }
    }

    async fn handle_request(&mut self, envelope: Envelope) {
        let response = match envelope.request {
            Request::SetSpeed { speed } => {
                info!(page = %self.page_id, speed, "set speed request");
                self.set_speed(speed).await;
                self.ack()
            }
            Request::GetState => {
                // Fresh scan so the answer reflects current page content
                self.scan();
                Response::State {
                    speed: self.speed,
                    media_count: self.registry.len(),
                }
            }
            Request::IncreaseSpeed => {
                self.set_speed(self.speed + SPEED_STEP).await;
                self.ack()
            }
            Request::DecreaseSpeed => {
                self.set_speed(self.speed - SPEED_STEP).await;
                self.ack()
            }
            Request::ResetSpeed => {
                self.set_speed(DEFAULT_SPEED).await;
                self.ack()
            }
            Request::Unknown => Response::Rejected { success: false },
        };
        // The requester may already be gone; that is not our problem
        let _ = envelope.reply.send(response);
    }

    fn ack(&self) -> Response {
        Response::Ack {
            success: true,
            speed: self.speed,
            media_count: self.registry.len(),
        }
    }

    async fn handle_mutation(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::ChildInserted { node } => {
                if let Some(media) = node.as_media() {
                    if self.registry.register(media, self.speed) {
                        self.overlay.refresh(self.speed, self.registry.len());
                        self.notify(self.registry.len());
                    }
                    return;
                }
                // Non-playable subtree: sub-query it, and schedule a
                // deferred full scan to catch media attached
                // asynchronously after this mutation (placeholder-then-
                // swap players).
                let found = discovery::collect_media_in(&node);
                if found.is_empty() {
                    return;
                }
                let mut newly = 0usize;
                for media in found {
                    if self.registry.register(media, self.speed) {
                        newly += 1;
                    }
                }
                if newly > 0 {
                    self.overlay.refresh(self.speed, self.registry.len());
                    self.notify(self.registry.len());
                }
                self.schedule(
                    Deferred::FullScan,
                    Duration::from_millis(self.timing.deferred_scan_delay_ms),
                );
            }
            Mutation::AttributeChanged { node, name } => {
                if node.is_playable() && discovery::is_source_attr(&name) {
                    if let Some(media) = node.as_media() {
                        if self.registry.register(media.clone(), self.speed) {
                            self.overlay.refresh(self.speed, self.registry.len());
                            self.notify(self.registry.len());
                        } else {
                            // Source swaps reset the effective rate on
                            // real hosts; re-pin the tracked element
                            MediaRegistry::apply(&media, self.speed);
                        }
                    }
                }
            }
        }
    }

    /// Self-healing reapplication. Lifecycle signals reapply
    /// unconditionally; rate changes reapply only on drift past the
    /// tolerance, debounced so we do not fight a transition the page
    /// itself is mid-way through.
    fn handle_media_event(&mut self, event: MediaEvent) {
        if !self.registry.contains(event.node) {
            return;
        }
        match event.kind {
            MediaEventKind::RateChanged { rate } => {
                if (rate - self.speed).abs() > DRIFT_TOLERANCE {
                    self.schedule(
                        Deferred::Heal(event.node),
                        Duration::from_millis(self.timing.heal_debounce_ms),
                    );
                }
            }
            _ => {
                if let Some(media) = self.registry.get(event.node) {
                    MediaRegistry::apply(&media, self.speed);
                }
            }
        }
    }

    async fn handle_key(&mut self, press: KeyPress) {
        if let Some(action) = intercept_key(&press) {
            self.apply_action(action).await;
        }
    }

    async fn apply_action(&mut self, action: SpeedAction) {
        match action {
            SpeedAction::Increase => self.set_speed(self.speed + SPEED_STEP).await,
            SpeedAction::Decrease => self.set_speed(self.speed - SPEED_STEP).await,
            SpeedAction::Reset => self.set_speed(DEFAULT_SPEED).await,
            SpeedAction::Set(value) => self.set_speed(value).await,
        }
    }

    async fn handle_deferred(&mut self, deferred: Deferred) {
        match deferred {
            Deferred::FullScan => self.scan(),
            Deferred::CreateOverlay => {
                self.overlay.create();
                self.overlay.refresh(self.speed, self.registry.len());
            }
            Deferred::Heal(id) => {
                let Some(media) = self.registry.get(id) else {
                    return;
                };
                if (media.playback_rate() - self.speed).abs() > DRIFT_TOLERANCE {
                    debug!(node = %id, "healing externally reset playback rate");
                    MediaRegistry::apply(&media, self.speed);
                    // The observable applied rate changed; broadcast it
                    self.notify(self.registry.len());
                }
            }
        }
    }

    /// Sleep-then-send onto the internal channel. Fire-and-forget: the
    /// timer cannot be canceled, and the eventual operation is
    /// idempotent.
    fn schedule(&self, deferred: Deferred, delay: Duration) {
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = tx.send(deferred).await;
        });
    }
}
