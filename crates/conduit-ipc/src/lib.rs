//! Message-passing primitives shared by the browser process.
//!
//! Provides:
//! - `EventEmitter`, a small ordered publish/subscribe table that isolates
//!   listener panics and dispatches over a snapshot
//! - `ChannelRegistry`, the process-wide named-channel router with
//!   inbound message filters
//! - `protocol`, the channel names and payload shapes that cross the
//!   browser/renderer boundary

pub mod emitter;
pub mod event;
pub mod protocol;
pub mod registry;

pub use emitter::{listener, EventEmitter, Listener, Listeners};
pub use event::{lifecycle, IpcEvent, IpcSender};
pub use registry::{filter, ChannelRegistry, IpcFilter};
