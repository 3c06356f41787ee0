//! Capture request coalescing.
//!
//! Renderers ask for the list of capturable screens and windows. The native
//! capture is expensive and serialized, so requests wait in a FIFO queue and
//! only the head's options are ever being captured. When a capture finishes,
//! the head and every other queued request with equal options get the same
//! result, and the next distinct request starts.
//!
//! A requester that is destroyed while waiting keeps its queue slot; only its
//! reply is suppressed.

mod source;

#[cfg(test)]
mod tests;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use conduit_common::{CaptureError, RequestId, Size};
use conduit_ipc::protocol::{
    capturer_result_channel, parse_args, CaptureReply, GetSourcesArgs,
    DESKTOP_CAPTURER_GET_SOURCES,
};
use conduit_ipc::{lifecycle, listener, ChannelRegistry, IpcEvent, IpcSender, Listener};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::window::WebContents;

pub use source::{CapturedSource, Thumbnail};

/// Parameters of one native capture. Equality is field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CaptureOptions {
    pub capture_window: bool,
    pub capture_screen: bool,
    pub thumbnail_size: Size,
}

impl From<&GetSourcesArgs> for CaptureOptions {
    fn from(args: &GetSourcesArgs) -> Self {
        Self {
            capture_window: args.0,
            capture_screen: args.1,
            thumbnail_size: args.2,
        }
    }
}

/// The native capture backend.
pub trait CaptureService {
    /// Begin one capture. The outcome is reported later through
    /// [`DesktopCapturer::on_capture_complete`], never from inside this call.
    fn start_capture(&self, options: &CaptureOptions);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
}

/// Reply capability of a queued request, cleared when the requester dies.
struct ReplyTarget {
    sender: Weak<dyn WebContents>,
    alive: Rc<Cell<bool>>,
    destroyed_hook: Listener<()>,
}

impl ReplyTarget {
    fn live(&self) -> Option<Rc<dyn WebContents>> {
        if self.alive.get() {
            self.sender.upgrade()
        } else {
            None
        }
    }
}

struct CaptureRequest {
    id: RequestId,
    options: CaptureOptions,
    target: ReplyTarget,
}

pub struct DesktopCapturer {
    native: Rc<dyn CaptureService>,
    queue: RefCell<VecDeque<CaptureRequest>>,
    max_thumbnail_edge: u32,
}

impl DesktopCapturer {
    pub fn new(native: Rc<dyn CaptureService>, max_thumbnail_edge: u32) -> Self {
        Self {
            native,
            queue: RefCell::new(VecDeque::new()),
            max_thumbnail_edge,
        }
    }

    /// Route capture-source requests from `registry` to this capturer.
    pub fn install(self: &Rc<Self>, registry: &ChannelRegistry<dyn WebContents>) {
        let capturer = Rc::downgrade(self);
        registry.on(
            DESKTOP_CAPTURER_GET_SOURCES,
            listener(move |event: &IpcEvent<dyn WebContents>| {
                if let Some(capturer) = capturer.upgrade() {
                    capturer.handle_get_sources(event);
                }
            }),
        );
        info!(channel = DESKTOP_CAPTURER_GET_SOURCES, "desktop capturer installed");
    }

    fn handle_get_sources(&self, event: &IpcEvent<dyn WebContents>) {
        let args: GetSourcesArgs = match parse_args(event.channel(), event.args()) {
            Ok(args) => args,
            Err(e) => {
                warn!(contents_id = %event.sender().id(), error = %e, "capture request rejected");
                return;
            }
        };
        let options = CaptureOptions::from(&args);
        let id = args.3;

        let size = options.thumbnail_size;
        if size.width > self.max_thumbnail_edge || size.height > self.max_thumbnail_edge {
            let err = CaptureError::Rejected(format!(
                "thumbnail {}x{} exceeds {} pixels per edge",
                size.width, size.height, self.max_thumbnail_edge
            ));
            warn!(request_id = %id, error = %err, "capture request rejected");
            let reply = CaptureReply::Failed {
                error: err.to_string(),
            };
            if let Err(e) = event.reply(&capturer_result_channel(&id), reply.to_value()) {
                warn!(request_id = %id, error = %e, "failed to send capture rejection");
            }
            return;
        }

        self.submit(id, options, event.sender());
    }

    /// Queue a request. Starts a native capture if nothing else is pending.
    pub fn submit(&self, id: RequestId, options: CaptureOptions, requester: &Rc<dyn WebContents>) {
        let alive = Rc::new(Cell::new(true));
        let destroyed_hook = {
            let alive = Rc::clone(&alive);
            listener(move |_: &()| alive.set(false))
        };
        requester
            .lifecycle()
            .once(lifecycle::DESTROYED, Rc::clone(&destroyed_hook));

        debug!(request_id = %id, contents_id = %requester.id(), ?options, "capture request queued");
        let request = CaptureRequest {
            id,
            options,
            target: ReplyTarget {
                sender: Rc::downgrade(requester),
                alive,
                destroyed_hook,
            },
        };

        let first = {
            let mut queue = self.queue.borrow_mut();
            queue.push_back(request);
            queue.len() == 1
        };
        if first {
            self.native.start_capture(&options);
        }
    }

    /// Resolve the in-flight capture.
    ///
    /// The head request and every queued request with equal options receive
    /// the same reply; the rest keep their order and the next head's capture
    /// starts.
    ///
    /// # Panics
    ///
    /// Panics if no request is pending: a completion without a started
    /// capture means the native backend broke its contract.
    pub fn on_capture_complete(&self, outcome: Result<Vec<CapturedSource>, CaptureError>) {
        let (handled, batch, next) = {
            let mut queue = self.queue.borrow_mut();
            let handled = queue
                .pop_front()
                .expect("capture completed with no pending request");
            let (batch, rest): (VecDeque<_>, VecDeque<_>) = queue
                .drain(..)
                .partition(|request| request.options == handled.options);
            *queue = rest;
            let next = queue.front().map(|request| request.options);
            (handled, batch, next)
        };

        let reply = build_reply(outcome);
        if let CaptureReply::Failed { error } = &reply {
            warn!(request_id = %handled.id, error = %error, "capture failed");
        }
        debug!(
            request_id = %handled.id,
            coalesced = batch.len(),
            "capture complete"
        );

        deliver(handled, &reply);
        for request in batch {
            deliver(request, &reply);
        }

        if let Some(options) = next {
            self.native.start_capture(&options);
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn state(&self) -> CaptureState {
        if self.queue.borrow().is_empty() {
            CaptureState::Idle
        } else {
            CaptureState::Capturing
        }
    }

    /// Options of the capture currently in flight.
    pub fn in_flight(&self) -> Option<CaptureOptions> {
        self.queue.borrow().front().map(|request| request.options)
    }
}

fn build_reply(outcome: Result<Vec<CapturedSource>, CaptureError>) -> CaptureReply {
    let encoded = outcome.and_then(|sources| {
        sources
            .iter()
            .map(CapturedSource::to_descriptor)
            .collect::<Result<Vec<_>, _>>()
    });
    match encoded {
        Ok(descriptors) => CaptureReply::Sources(descriptors),
        Err(e) => CaptureReply::Failed {
            error: e.to_string(),
        },
    }
}

fn deliver(request: CaptureRequest, reply: &CaptureReply) {
    let CaptureRequest { id, target, .. } = request;
    let Some(sender) = target.live() else {
        debug!(request_id = %id, "requester destroyed before reply; skipping");
        return;
    };
    sender
        .lifecycle()
        .off(lifecycle::DESTROYED, &target.destroyed_hook);
    if let Err(e) = sender.send(&capturer_result_channel(&id), reply.to_value()) {
        warn!(request_id = %id, error = %e, "failed to deliver capture result");
    }
}
