//! Inbound message envelope handed to channel handlers.

use std::cell::RefCell;
use std::rc::Rc;

use conduit_common::{ContentsId, IpcError};
use serde_json::Value;

use crate::emitter::EventEmitter;

/// Lifecycle notification names emitted by content handles and windows.
pub mod lifecycle {
    /// The renderer-side contents has been destroyed.
    pub const DESTROYED: &str = "destroyed";
    /// The contents' current render view went away (navigation or teardown).
    pub const RENDER_VIEW_DELETED: &str = "current-render-view-deleted";
    /// A window has been closed, by the user or programmatically.
    pub const CLOSED: &str = "closed";
}

/// The process-side endpoint a message came from and replies go to.
pub trait IpcSender {
    fn id(&self) -> ContentsId;

    /// Deliver `payload` to the renderer on `channel`.
    fn send(&self, channel: &str, payload: Value) -> Result<(), IpcError>;

    /// One-shot lifecycle notifications (`destroyed`, ...) for this endpoint.
    fn lifecycle(&self) -> &EventEmitter<()>;
}

/// A message routed to a channel handler.
///
/// Handlers answer asynchronous requests with [`IpcEvent::reply`] and
/// synchronous ones by setting a return value.
pub struct IpcEvent<S: ?Sized> {
    sender: Rc<S>,
    channel: String,
    args: Vec<Value>,
    return_value: RefCell<Option<Value>>,
}

impl<S: ?Sized> IpcEvent<S> {
    pub fn new(sender: Rc<S>, channel: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sender,
            channel: channel.into(),
            args,
            return_value: RefCell::new(None),
        }
    }

    pub fn sender(&self) -> &Rc<S> {
        &self.sender
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Set the reply of a synchronous request. Last writer wins.
    pub fn set_return_value(&self, value: Value) {
        *self.return_value.borrow_mut() = Some(value);
    }

    pub fn take_return_value(&self) -> Option<Value> {
        self.return_value.borrow_mut().take()
    }
}

impl<S: IpcSender + ?Sized> IpcEvent<S> {
    /// Send an asynchronous reply back to the frame that sent this message.
    pub fn reply(&self, channel: &str, payload: Value) -> Result<(), IpcError> {
        self.sender.send(channel, payload)
    }
}
