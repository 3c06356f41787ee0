//! Process-wide named-channel router.
//!
//! `ChannelRegistry` maps channel names to handlers and is the single entry
//! point for messages arriving from renderers. It is an explicit instance,
//! created empty and passed to whatever installs handlers on it.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use conduit_common::IpcError;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::emitter::{listener, panic_message, EventEmitter, Listener, Listeners};
use crate::event::IpcEvent;

/// Channel name that always has a no-op listener installed.
pub const ERROR_CHANNEL: &str = "error";

/// Predicate consulted for each inbound message when filtering is enabled.
/// Returning `false` drops the message.
pub type IpcFilter<S> = Rc<dyn Fn(&IpcEvent<S>) -> bool>;

/// Wrap a closure as an `IpcFilter`, inferring the sender type.
pub fn filter<S, F>(f: F) -> IpcFilter<S>
where
    S: ?Sized,
    F: Fn(&IpcEvent<S>) -> bool + 'static,
{
    Rc::new(f)
}

pub struct ChannelRegistry<S: ?Sized> {
    emitter: EventEmitter<IpcEvent<S>>,
    filters: RefCell<Vec<IpcFilter<S>>>,
    filters_enabled: bool,
}

impl<S: ?Sized + 'static> ChannelRegistry<S> {
    /// Create an empty registry.
    ///
    /// `filters_enabled` selects whether registered filters are consulted on
    /// dispatch (instrumented builds) or only stored.
    pub fn new(filters_enabled: bool) -> Self {
        let registry = Self {
            emitter: EventEmitter::new(),
            filters: RefCell::new(Vec::new()),
            filters_enabled,
        };
        // A message on a channel named "error" must never be treated as an
        // unhandled failure.
        registry
            .emitter
            .on(ERROR_CHANNEL, listener(|_: &IpcEvent<S>| {}));
        registry
    }

    pub fn filters_enabled(&self) -> bool {
        self.filters_enabled
    }

    pub fn on(&self, channel: &str, handler: Listener<IpcEvent<S>>) {
        self.emitter.on(channel, handler);
    }

    pub fn once(&self, channel: &str, handler: Listener<IpcEvent<S>>) {
        self.emitter.once(channel, handler);
    }

    pub fn prepend_listener(&self, channel: &str, handler: Listener<IpcEvent<S>>) {
        self.emitter.prepend_listener(channel, handler);
    }

    pub fn prepend_once_listener(&self, channel: &str, handler: Listener<IpcEvent<S>>) {
        self.emitter.prepend_once_listener(channel, handler);
    }

    pub fn off(&self, channel: &str, handler: &Listener<IpcEvent<S>>) {
        self.emitter.off(channel, handler);
    }

    /// Remove every handler on `channel`.
    ///
    /// Fails with `InvalidUsage` when no channel is named: clearing every
    /// channel would also drop the registry's own handlers.
    pub fn remove_all_listeners(&self, channel: Option<&str>) -> Result<(), IpcError> {
        let Some(channel) = channel else {
            return Err(IpcError::InvalidUsage(
                "removing every channel's listeners would break internal channels; \
                 name a channel"
                    .into(),
            ));
        };
        self.emitter.remove_all_listeners(Some(channel));
        Ok(())
    }

    pub fn listeners(&self, channel: &str) -> Listeners<IpcEvent<S>> {
        self.emitter.listeners(channel)
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.emitter.listener_count(channel)
    }

    /// Number of channels with at least one handler or a held listener view.
    pub fn channel_count(&self) -> usize {
        self.emitter.event_count()
    }

    /// Add `f` unless the very same predicate is already registered.
    pub fn add_filter(&self, f: IpcFilter<S>) {
        let mut filters = self.filters.borrow_mut();
        if !filters.iter().any(|existing| Rc::ptr_eq(existing, &f)) {
            filters.push(f);
        }
    }

    pub fn remove_filter(&self, f: &IpcFilter<S>) {
        self.filters
            .borrow_mut()
            .retain(|existing| !Rc::ptr_eq(existing, f));
    }

    /// Point-in-time copy of the filter set.
    pub fn filters(&self) -> Rc<[IpcFilter<S>]> {
        self.filters.borrow().iter().cloned().collect()
    }

    /// Route an inbound message to the handlers of `channel`.
    ///
    /// Returns the synchronous reply value set by a handler, if any. When
    /// filtering is enabled and a filter rejects the message, no handler runs
    /// and `None` is returned. A panicking filter counts as a rejection.
    pub fn dispatch(&self, sender: Rc<S>, channel: &str, args: Vec<Value>) -> Option<Value> {
        let event = IpcEvent::new(sender, channel, args);

        if self.filters_enabled {
            let filters = self.filters();
            if let Some(index) = filters.iter().position(|f| !admits(f, &event)) {
                debug!(channel, filter = index, "IPC message rejected by filter");
                return None;
            }
        }

        let handled = self.emitter.emit(channel, &event);
        trace!(channel, handled, "IPC message dispatched");
        event.take_return_value()
    }
}

fn admits<S: ?Sized>(f: &IpcFilter<S>, event: &IpcEvent<S>) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| f(event))) {
        Ok(admitted) => admitted,
        Err(payload) => {
            warn!(
                channel = event.channel(),
                reason = panic_message(payload.as_ref()),
                "filter panicked; rejecting message"
            );
            false
        }
    }
}
