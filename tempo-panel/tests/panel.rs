//! Panel-against-engine tests over the message bus.

use tempo_common::api::Response;
use tempo_common::config::{EngineTiming, PanelTiming};
use tempo_common::{db, MessageBus, PageId};
use tempo_engine::dom::Document;
use tempo_panel::{ControlPanel, PanelStatus};

fn quiet_engine_timing() -> EngineTiming {
    EngineTiming {
        rescan_interval_ms: 3_600_000,
        deferred_scan_delay_ms: 10,
        heal_debounce_ms: 10,
        overlay_settle_delay_ms: 10,
    }
}

fn fast_panel_timing() -> PanelTiming {
    PanelTiming {
        max_retries: 3,
        retry_delay_ms: 20,
    }
}

#[tokio::test]
async fn connect_adopts_engine_state() {
    let page = Document::new("watch.example");
    page.root().append_child(&page.create_media("video"));

    let prefs = db::connect(None).await.unwrap();
    let bus = MessageBus::new(16);
    let engine =
        tempo_engine::spawn(page, bus.clone(), prefs.clone(), quiet_engine_timing()).await;

    let mut panel = ControlPanel::open(
        bus,
        engine.page_id(),
        prefs,
        "watch.example",
        fast_panel_timing(),
    );
    assert!(panel.connect().await);
    assert_eq!(panel.speed(), 1.0);
    assert_eq!(panel.media_count(), 1);
    assert_eq!(*panel.status(), PanelStatus::MediaFound(1));

    engine.shutdown().await;
}

#[tokio::test]
async fn exhausted_retries_mark_the_page_inactive() {
    let bus = MessageBus::new(16);
    let prefs = db::connect(None).await.unwrap();

    // No engine ever registers this page id
    let mut panel = ControlPanel::open(
        bus,
        PageId::new(),
        prefs,
        "dead.example",
        fast_panel_timing(),
    );
    assert!(!panel.connect().await);
    assert_eq!(*panel.status(), PanelStatus::Unavailable);
    assert_eq!(panel.status().to_string(), "Refresh page to activate");
}

#[tokio::test]
async fn connect_retries_until_the_engine_answers() {
    let bus = MessageBus::new(16);
    let prefs = db::connect(None).await.unwrap();
    let id = PageId::new();

    // Endpoint that drops its first two requests, the way a page mid-
    // initialization does, then starts answering.
    let mut rx = bus.register(id);
    tokio::spawn(async move {
        let mut seen = 0u32;
        while let Some(envelope) = rx.recv().await {
            seen += 1;
            if seen <= 2 {
                continue;
            }
            let _ = envelope.reply.send(Response::State {
                speed: 2.0,
                media_count: 1,
            });
        }
    });

    let mut panel = ControlPanel::open(
        bus,
        id,
        prefs,
        "slow.example",
        PanelTiming {
            max_retries: 5,
            retry_delay_ms: 20,
        },
    );
    assert!(panel.connect().await);
    assert_eq!(panel.speed(), 2.0);
    assert_eq!(panel.media_count(), 1);
}

#[tokio::test]
async fn set_speed_is_optimistic_then_reconciled() {
    let page = Document::new("opt.example");
    let video = page.create_media("video");
    page.root().append_child(&video);

    let prefs = db::connect(None).await.unwrap();
    let bus = MessageBus::new(16);
    let engine =
        tempo_engine::spawn(page, bus.clone(), prefs.clone(), quiet_engine_timing()).await;

    let mut panel = ControlPanel::open(
        bus,
        engine.page_id(),
        prefs,
        "opt.example",
        fast_panel_timing(),
    );
    assert!(panel.connect().await);

    // Raw input is canonicalized the same way on both sides
    panel.set_speed(1.847).await;
    assert_eq!(panel.speed(), 1.85);
    assert_eq!(video.as_media().unwrap().playback_rate(), 1.85);

    panel.step(true, true).await;
    assert_eq!(panel.speed(), 1.95);

    panel.step(false, false).await;
    assert_eq!(panel.speed(), 1.7);

    panel.reset().await;
    assert_eq!(panel.speed(), 1.0);
    assert_eq!(video.as_media().unwrap().playback_rate(), 1.0);

    engine.shutdown().await;
}

#[tokio::test]
async fn remember_pins_only_this_site() {
    let page = Document::new("pin.example");
    page.root().append_child(&page.create_media("video"));

    let prefs = db::connect(None).await.unwrap();
    let bus = MessageBus::new(16);
    let engine =
        tempo_engine::spawn(page, bus.clone(), prefs.clone(), quiet_engine_timing()).await;

    let mut panel = ControlPanel::open(
        bus,
        engine.page_id(),
        prefs.clone(),
        "pin.example",
        fast_panel_timing(),
    );
    assert!(panel.connect().await);

    panel.set_speed(2.0).await;
    panel.remember().await;
    assert_eq!(
        *panel.status(),
        PanelStatus::Saved {
            speed: 2.0,
            hostname: "pin.example".into()
        }
    );

    assert_eq!(db::load_speed(&prefs, "pin.example").await, 2.0);
    // set_speed also wrote the global fallback; remember adds nothing
    // beyond the site key, so an unrelated host sees only the global.
    assert_eq!(db::load_speed(&prefs, "unrelated.example").await, 2.0);

    engine.shutdown().await;
}

#[tokio::test]
async fn notices_from_elsewhere_update_the_display() {
    let page = Document::new("shared.example");
    page.root().append_child(&page.create_media("video"));

    let prefs = db::connect(None).await.unwrap();
    let bus = MessageBus::new(16);
    let engine =
        tempo_engine::spawn(page.clone(), bus.clone(), prefs.clone(), quiet_engine_timing()).await;

    let mut panel = ControlPanel::open(
        bus.clone(),
        engine.page_id(),
        prefs,
        "shared.example",
        fast_panel_timing(),
    );
    assert!(panel.connect().await);
    let mut notices = bus.subscribe();

    // Someone else changes the speed (in-page keyboard shortcut)
    page.dispatch_key(tempo_engine::dom::KeyPress {
        key: 'd',
        alt: true,
        shift: false,
        in_text_input: false,
    });
    let notice = notices.recv().await.unwrap();
    panel.handle_notice(notice);
    assert_eq!(panel.speed(), 1.25);
    assert_eq!(*panel.status(), PanelStatus::MediaFound(1));

    engine.shutdown().await;
}
