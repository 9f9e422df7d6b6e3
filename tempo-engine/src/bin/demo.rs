//! Demo driver for the discovery engine
//!
//! Builds a synthetic page with a couple of media elements, spawns a
//! discovery engine against it, and walks the request surface once so
//! the whole pipeline (scan, reconcile, persist, notify) can be watched
//! under `RUST_LOG=tempo_engine=debug`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tempo_common::api::Request;
use tempo_common::config::EngineTiming;
use tempo_common::{db, MessageBus};
use tempo_engine::dom::Document;

/// Command-line arguments for the demo driver
#[derive(Parser, Debug)]
#[command(name = "tempo-demo")]
#[command(about = "Synthetic-page demo for the tempo discovery engine")]
#[command(version)]
struct Args {
    /// Hostname the synthetic page claims to be served from
    #[arg(long, default_value = "demo.example", env = "TEMPO_HOSTNAME")]
    hostname: String,

    /// Preference database path (in-memory when omitted)
    #[arg(long, env = "TEMPO_PREFS")]
    prefs: Option<PathBuf>,

    /// Speed to request once the engine is up
    #[arg(long, default_value = "1.5")]
    speed: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempo_engine=debug,tempo_common=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let prefs = db::connect(args.prefs.as_deref())
        .await
        .context("Failed to open preference store")?;

    // A page with one visible video and one inside a shadow root, the
    // shape most custom players take.
    let page = Document::new(&args.hostname);
    let video = page.create_media("video");
    page.root().append_child(&video);
    let host = page.create_element("div");
    page.root().append_child(&host);
    let shadow = host.attach_shadow();
    let hidden = page.create_media("audio");
    shadow.append_child(&hidden);

    let bus = MessageBus::new(16);
    let mut notices = bus.subscribe();
    let engine = tempo_engine::spawn(page, bus.clone(), prefs, EngineTiming::default()).await;
    info!("engine running as page {}", engine.page_id());

    let state = bus.request(engine.page_id(), Request::GetState).await?;
    info!("initial state: {state:?}");

    let ack = bus
        .request(engine.page_id(), Request::SetSpeed { speed: args.speed })
        .await?;
    info!("set speed: {ack:?}");

    if let Ok(notice) = notices.recv().await {
        info!("notice: {notice:?}");
    }

    info!("Press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    engine.shutdown().await;
    info!("shut down cleanly");
    Ok(())
}
