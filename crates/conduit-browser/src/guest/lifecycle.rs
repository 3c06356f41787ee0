use std::cell::RefCell;
use std::rc::{Rc, Weak};

use conduit_common::{ContentsId, WindowError};
use conduit_ipc::protocol::guest_window_closed_channel;
use conduit_ipc::{lifecycle, listener, IpcSender};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::GuestWindowManager;
use crate::options::{OptionsObject, WEB_CONTENTS, WEB_PREFERENCES};
use crate::window::{BrowserWindow, WebContents};

// =============================================================================
// BINDINGS
// =============================================================================

impl GuestWindowManager {
    /// Bind `guest` to `opener` and, if `frame_name` is non-empty, register it
    /// for reuse under that name. Returns the guest's id.
    ///
    /// Two one-shot hooks are installed. When the opener's render view goes
    /// away the guest is destroyed, after detaching the guest-side hook so the
    /// opener is not told about a close it caused. When the guest is closed
    /// first the opener is notified and the opener-side hook is detached.
    pub fn setup_guest(
        &self,
        opener: &Rc<dyn WebContents>,
        frame_name: &str,
        guest: &Rc<dyn BrowserWindow>,
    ) -> ContentsId {
        let guest_id = guest.id();
        let opener_id = opener.id();
        self.openers.borrow_mut().insert(guest_id, opener_id);

        // Filled in once the opener-side hook exists.
        let embedder_hook: Rc<RefCell<Option<Weak<dyn Fn(&())>>>> = Rc::default();

        let closed_by_user = {
            let opener = Rc::downgrade(opener);
            let embedder_hook = Rc::clone(&embedder_hook);
            listener(move |_: &()| {
                let Some(opener) = opener.upgrade() else {
                    return;
                };
                if let Some(hook) = embedder_hook.borrow().as_ref().and_then(Weak::upgrade) {
                    opener.lifecycle().off(lifecycle::RENDER_VIEW_DELETED, &hook);
                }
                debug!(guest_id = %guest_id, contents_id = %opener_id, "guest closed; notifying opener");
                if let Err(e) = opener.send(&guest_window_closed_channel(guest_id), Value::Null) {
                    warn!(guest_id = %guest_id, error = %e, "failed to notify opener");
                }
            })
        };

        let closed_by_embedder = {
            let guest = Rc::clone(guest);
            let user_hook = Rc::downgrade(&closed_by_user);
            listener(move |_: &()| {
                if let Some(hook) = user_hook.upgrade() {
                    guest.lifecycle().off(lifecycle::CLOSED, &hook);
                }
                debug!(guest_id = %guest_id, contents_id = %opener_id, "opener gone; destroying guest");
                guest.destroy();
            })
        };
        *embedder_hook.borrow_mut() = Some(Rc::downgrade(&closed_by_embedder));

        opener
            .lifecycle()
            .once(lifecycle::RENDER_VIEW_DELETED, closed_by_embedder);
        guest.lifecycle().once(lifecycle::CLOSED, closed_by_user);

        let forget = {
            let openers = Rc::downgrade(&self.openers);
            let frame_to_guest = Rc::downgrade(&self.frame_to_guest);
            let frame_name = frame_name.to_string();
            listener(move |_: &()| {
                if let Some(openers) = openers.upgrade() {
                    openers.borrow_mut().remove(&guest_id);
                }
                if frame_name.is_empty() {
                    return;
                }
                let Some(frames) = frame_to_guest.upgrade() else {
                    return;
                };
                let mut frames = frames.borrow_mut();
                // The name may already point at a newer guest.
                if frames.get(&frame_name).map(|g| g.id()) == Some(guest_id) {
                    frames.remove(&frame_name);
                    debug!(frame_name = %frame_name, guest_id = %guest_id, "named guest unregistered");
                }
            })
        };
        guest.lifecycle().once(lifecycle::CLOSED, forget);

        if !frame_name.is_empty() {
            self.frame_to_guest
                .borrow_mut()
                .insert(frame_name.to_string(), Rc::clone(guest));
        }

        info!(guest_id = %guest_id, contents_id = %opener_id, frame_name, "guest window bound");
        guest_id
    }

    /// Open `url` in a guest for `opener`.
    ///
    /// A live guest already registered under `frame_name` is navigated and
    /// reused. Otherwise a window is created from `options`; it is navigated
    /// unless the options carry an existing content handle.
    pub fn create_guest(
        &self,
        opener: &Rc<dyn WebContents>,
        url: &str,
        frame_name: &str,
        options: &OptionsObject,
    ) -> Result<ContentsId, WindowError> {
        if !frame_name.is_empty() {
            if let Some(guest) = self.named_guest(frame_name) {
                guest.load_url(url)?;
                debug!(frame_name, guest_id = %guest.id(), url, "named guest reused");
                return Ok(guest.id());
            }
        }

        options.ensure_object(WEB_PREFERENCES);
        let guest = self.windows.create(options)?;
        if !options.contains_key(WEB_CONTENTS) {
            if let Err(e) = guest.load_url(url) {
                guest.destroy();
                return Err(e);
            }
        }
        Ok(self.setup_guest(opener, frame_name, &guest))
    }

    /// Close `guest_id` on behalf of `requester`. Only the guest's opener may
    /// close it.
    pub fn close_guest(&self, requester: &dyn WebContents, guest_id: ContentsId) -> bool {
        let opener = self.opener_of(guest_id);
        if opener != Some(requester.id()) {
            warn!(
                guest_id = %guest_id,
                contents_id = %requester.id(),
                "guest close refused: requester is not the opener"
            );
            return false;
        }
        let window = self
            .windows
            .contents_from_id(guest_id)
            .and_then(|contents| self.get_guest_window(contents.as_ref()));
        match window {
            Some(window) => {
                window.close();
                true
            }
            None => false,
        }
    }
}
