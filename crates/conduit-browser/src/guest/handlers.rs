use std::cell::{Cell, RefCell};
use std::rc::Rc;

use conduit_common::{ConduitError, ContentsId};
use conduit_ipc::protocol::{
    parse_args, WindowCloseArgs, WindowOpenArgs, GUEST_WINDOW_MANAGER_WINDOW_CLOSE,
    GUEST_WINDOW_MANAGER_WINDOW_OPEN,
};
use conduit_ipc::{listener, ChannelRegistry, IpcEvent, IpcSender};
use serde_json::Value;
use tracing::{info, warn};

use super::{GuestWindowManager, DISABLE_POPUPS};
use crate::options::OptionsObject;
use crate::window::{BrowserWindow, WebContents};

/// Emitted on [`GuestWindowManager::events`] before a guest is created.
pub const NEW_WINDOW: &str = "new-window";

/// A window-open request as seen by the application.
///
/// Calling [`prevent_default`](Self::prevent_default) suppresses creation. A
/// listener that suppresses the request may hand over a window it built
/// itself with [`set_new_guest`](Self::set_new_guest); that window is then
/// bound to the opener like any other guest.
pub struct NewWindowEvent {
    pub opener: Rc<dyn WebContents>,
    pub url: String,
    pub referrer: Value,
    pub frame_name: String,
    pub disposition: String,
    /// Effective options, already merged from the opener.
    pub options: OptionsObject,
    default_prevented: Cell<bool>,
    new_guest: RefCell<Option<Rc<dyn BrowserWindow>>>,
}

impl NewWindowEvent {
    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn set_new_guest(&self, guest: Rc<dyn BrowserWindow>) {
        *self.new_guest.borrow_mut() = Some(guest);
    }

    fn take_new_guest(&self) -> Option<Rc<dyn BrowserWindow>> {
        self.new_guest.borrow_mut().take()
    }
}

// =============================================================================
// CHANNEL HANDLERS
// =============================================================================

impl GuestWindowManager {
    /// Route guest window requests from `registry` to this manager.
    pub fn install(self: &Rc<Self>, registry: &ChannelRegistry<dyn WebContents>) {
        let manager = Rc::downgrade(self);
        registry.on(
            GUEST_WINDOW_MANAGER_WINDOW_OPEN,
            listener(move |event: &IpcEvent<dyn WebContents>| {
                if let Some(manager) = manager.upgrade() {
                    manager.handle_window_open(event);
                }
            }),
        );

        let manager = Rc::downgrade(self);
        registry.on(
            GUEST_WINDOW_MANAGER_WINDOW_CLOSE,
            listener(move |event: &IpcEvent<dyn WebContents>| {
                if let Some(manager) = manager.upgrade() {
                    manager.handle_window_close(event);
                }
            }),
        );
        info!(allow_popups = self.allow_popups, "guest window manager installed");
    }

    /// Synchronous reply: the guest id, or `null` when nothing was opened.
    fn handle_window_open(&self, event: &IpcEvent<dyn WebContents>) {
        let reply = match self.window_open(event) {
            Ok(Some(guest_id)) => Value::from(guest_id.0),
            Ok(None) => Value::Null,
            Err(e) => {
                warn!(contents_id = %event.sender().id(), error = %e, "window open failed");
                Value::Null
            }
        };
        event.set_return_value(reply);
    }

    fn window_open(
        &self,
        event: &IpcEvent<dyn WebContents>,
    ) -> Result<Option<ContentsId>, ConduitError> {
        let WindowOpenArgs(url, referrer, frame_name, disposition, options) =
            parse_args(event.channel(), event.args())?;
        let opener = event.sender();

        let options = OptionsObject::from_json(&options);
        self.merge_browser_window_options(opener.as_ref(), &options);

        let notice = NewWindowEvent {
            opener: Rc::clone(opener),
            url,
            referrer,
            frame_name,
            disposition,
            options,
            default_prevented: Cell::new(false),
            new_guest: RefCell::new(None),
        };
        self.events.emit(NEW_WINDOW, &notice);

        let popups_disabled = opener.is_guest()
            && opener
                .last_web_preferences()
                .get_bool(DISABLE_POPUPS)
                .unwrap_or(false);

        if !self.allow_popups || popups_disabled || notice.default_prevented() {
            return match notice.take_new_guest() {
                Some(guest) => Ok(Some(self.setup_guest(opener, &notice.frame_name, &guest))),
                None => {
                    info!(
                        contents_id = %opener.id(),
                        url = %notice.url,
                        "window open suppressed"
                    );
                    Ok(None)
                }
            };
        }

        let guest_id = self.create_guest(opener, &notice.url, &notice.frame_name, &notice.options)?;
        Ok(Some(guest_id))
    }

    /// Synchronous reply: whether the guest was closed.
    fn handle_window_close(&self, event: &IpcEvent<dyn WebContents>) {
        let closed = match parse_args::<WindowCloseArgs>(event.channel(), event.args()) {
            Ok(WindowCloseArgs(guest_id)) => self.close_guest(event.sender().as_ref(), guest_id),
            Err(e) => {
                warn!(contents_id = %event.sender().id(), error = %e, "window close rejected");
                false
            }
        };
        event.set_return_value(Value::Bool(closed));
    }
}
