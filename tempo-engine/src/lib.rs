//! # Tempo Discovery Engine
//!
//! Per-page engine that discovers playable elements in a host document,
//! keeps every one of them pinned to the single authoritative playback
//! speed, and answers requests from the coordinator and the control
//! panel over the message bus.
//!
//! The host page is uncontrolled: players appear and disappear
//! asynchronously, rebuild their media elements outside any observable
//! mutation, and reset playback rate on internal lifecycle events. The
//! engine therefore runs three redundant discovery producers (full scan,
//! mutation-driven scan, periodic fallback scan) feeding one idempotent
//! registry, and re-asserts the speed whenever an element drifts.

pub mod discovery;
pub mod dom;
pub mod engine;
pub mod overlay;
pub mod registry;

pub use engine::{spawn, EngineHandle};
pub use registry::MediaRegistry;
