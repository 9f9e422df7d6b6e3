//! Message contract shared by all tempo execution contexts
//!
//! Every message is a tagged record with a `type` discriminant. Requests
//! travel from the coordinator or the control panel to a page's discovery
//! engine; each request type has exactly one response shape. State-change
//! notifications are unsolicited and carry no response.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::speed::DEFAULT_SPEED;

// ========================================
// Requests
// ========================================

/// Request messages handled by a page's discovery engine.
///
/// Unrecognized `type` values deserialize to [`Request::Unknown`] and are
/// answered with `{ "success": false }` rather than dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Set the authoritative speed to an absolute value.
    #[serde(rename = "SET_SPEED")]
    SetSpeed {
        /// Raw requested speed. A missing, unparseable, or non-numeric
        /// payload is treated as 1.0; out-of-range values are clamped by
        /// the engine.
        #[serde(default = "default_speed", deserialize_with = "lenient_speed")]
        speed: f64,
    },

    /// Read the current speed and tracked-element count.
    ///
    /// Forces a full discovery scan before the response is produced, so
    /// the answer reflects current page content.
    #[serde(rename = "GET_STATE")]
    GetState,

    /// Step the speed up by one increment.
    #[serde(rename = "INCREASE_SPEED")]
    IncreaseSpeed,

    /// Step the speed down by one increment.
    #[serde(rename = "DECREASE_SPEED")]
    DecreaseSpeed,

    /// Return to 1x.
    #[serde(rename = "RESET_SPEED")]
    ResetSpeed,

    /// Any request type this engine does not understand.
    #[serde(other)]
    Unknown,
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

/// Accept a speed as a JSON number or numeric string; anything else
/// becomes [`DEFAULT_SPEED`].
fn lenient_speed<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(DEFAULT_SPEED),
        Value::String(s) => s.trim().parse().unwrap_or(DEFAULT_SPEED),
        _ => DEFAULT_SPEED,
    })
}

// ========================================
// Responses
// ========================================

/// Response messages produced by a discovery engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Acknowledgment of a speed-changing request. Always reports the
    /// resulting (clamped, rounded) speed, even when the raw input was
    /// invalid.
    #[serde(rename_all = "camelCase")]
    Ack {
        success: bool,
        speed: f64,
        media_count: usize,
    },

    /// Answer to `GET_STATE`.
    #[serde(rename_all = "camelCase")]
    State { speed: f64, media_count: usize },

    /// Answer to an unrecognized request.
    Rejected { success: bool },
}

// ========================================
// Notifications
// ========================================

/// Unsolicited state-change notifications broadcast by a discovery
/// engine. No response is expected; delivery is best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notice {
    /// The authoritative speed changed for any reason, including a
    /// self-healing reapplication that altered the applied rate.
    #[serde(rename = "SPEED_CHANGED", rename_all = "camelCase")]
    SpeedChanged {
        speed: f64,
        media_count: usize,
        /// When the change was observed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}
