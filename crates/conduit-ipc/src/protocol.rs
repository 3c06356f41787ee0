//! Channel names and payload shapes crossing the browser/renderer boundary.
//!
//! Renderer requests arrive as positional argument lists; each request type
//! here is a tuple struct so it deserializes straight from that list.

use conduit_common::{ContentsId, IpcError, RequestId, Size};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// CHANNELS
// =============================================================================

/// Renderer -> browser: enumerate capture sources.
pub const DESKTOP_CAPTURER_GET_SOURCES: &str = "CONDUIT_BROWSER_DESKTOP_CAPTURER_GET_SOURCES";

/// Renderer -> browser (synchronous): open a guest window.
pub const GUEST_WINDOW_MANAGER_WINDOW_OPEN: &str = "CONDUIT_GUEST_WINDOW_MANAGER_WINDOW_OPEN";

/// Renderer -> browser (synchronous): close a guest this renderer opened.
pub const GUEST_WINDOW_MANAGER_WINDOW_CLOSE: &str = "CONDUIT_GUEST_WINDOW_MANAGER_WINDOW_CLOSE";

/// Browser -> renderer: result of a capture-sources request.
pub fn capturer_result_channel(id: &RequestId) -> String {
    format!("CONDUIT_RENDERER_DESKTOP_CAPTURER_RESULT_{id}")
}

/// Browser -> opener: the guest was closed.
pub fn guest_window_closed_channel(guest: ContentsId) -> String {
    format!("CONDUIT_GUEST_WINDOW_MANAGER_WINDOW_CLOSED_{guest}")
}

// =============================================================================
// REQUESTS
// =============================================================================

/// `(captureWindow, captureScreen, thumbnailSize, requestId)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetSourcesArgs(pub bool, pub bool, pub Size, pub RequestId);

/// `(url, referrer, frameName, disposition, options)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowOpenArgs(pub String, pub Value, pub String, pub String, pub Value);

/// `(guestId)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowCloseArgs(pub ContentsId);

/// Decode a positional argument list into a request type.
pub fn parse_args<T: DeserializeOwned>(channel: &str, args: &[Value]) -> Result<T, IpcError> {
    serde_json::from_value(Value::Array(args.to_vec())).map_err(|e| IpcError::InvalidArguments {
        channel: channel.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// REPLIES
// =============================================================================

/// One capturable screen or window, as sent to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub name: String,
    /// `data:image/png;base64,...`
    pub thumbnail: String,
    pub display_id: String,
}

/// Reply to a capture-sources request: the source list, or a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaptureReply {
    Sources(Vec<SourceDescriptor>),
    Failed { error: String },
}

impl CaptureReply {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
