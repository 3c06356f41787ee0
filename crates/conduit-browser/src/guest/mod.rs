//! Guest window management.
//!
//! A renderer may ask the browser to open a new top-level window (a guest).
//! `GuestWindowManager` computes the guest's options from the opener's,
//! creates or reuses the window, and binds the two lifetimes: tearing down
//! the opener destroys the guest, and a guest closed first tells its opener.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use conduit_common::ContentsId;
use conduit_ipc::{EventEmitter, IpcSender};
use tracing::trace;

use crate::options::{merge_options, OptionsObject, SHOW, WEB_PREFERENCES};
use crate::window::{BrowserWindow, WebContents, WindowService};

pub mod handlers;
mod lifecycle;


pub use handlers::{NewWindowEvent, NEW_WINDOW};

/// Security preferences a guest always inherits when its opener holds the
/// listed value, whatever the guest asked for.
pub const INHERITED_WEB_PREFERENCES: &[(&str, bool)] = &[
    ("contextIsolation", true),
    ("javascript", false),
    ("nodeIntegration", false),
    ("enableRemoteModule", false),
    ("sandbox", true),
    ("webviewTag", false),
    ("nodeIntegrationInSubFrames", false),
];

/// Preference that makes an embedded opener's window-open requests
/// suppressed.
pub const DISABLE_POPUPS: &str = "disablePopups";

pub struct GuestWindowManager {
    windows: Rc<dyn WindowService>,
    /// Named guests, reusable as navigation targets.
    frame_to_guest: Rc<RefCell<HashMap<String, Rc<dyn BrowserWindow>>>>,
    /// Guest id -> opener id, for close permission checks.
    openers: Rc<RefCell<HashMap<ContentsId, ContentsId>>>,
    events: EventEmitter<NewWindowEvent>,
    allow_popups: bool,
}

impl GuestWindowManager {
    pub fn new(windows: Rc<dyn WindowService>, allow_popups: bool) -> Self {
        Self {
            windows,
            frame_to_guest: Rc::default(),
            openers: Rc::default(),
            events: EventEmitter::new(),
            allow_popups,
        }
    }

    /// Application-level notifications. Listeners of [`NEW_WINDOW`] may cancel
    /// a window-open request or supply their own guest.
    pub fn events(&self) -> &EventEmitter<NewWindowEvent> {
        &self.events
    }

    /// Fill in `options` from the opener, then force-inherit the opener's
    /// safe security preferences.
    ///
    /// An opener backed by a top-level window passes on its creation options,
    /// with `show` reflecting whether it is visible now. An embedded opener
    /// only passes on its current preferences.
    pub fn merge_browser_window_options(&self, opener: &dyn WebContents, options: &OptionsObject) {
        let web_preferences = options.ensure_object(WEB_PREFERENCES);

        match opener.browser_window_options() {
            Some(parent) => {
                let parent = match self.windows.from_contents(opener) {
                    Some(win) => {
                        let adjusted = parent.shallow_clone();
                        adjusted.insert(SHOW, win.is_visible());
                        adjusted
                    }
                    None => parent,
                };
                merge_options(options, &parent);
            }
            None => merge_options(&web_preferences, &opener.last_web_preferences()),
        }

        // Merging may have replaced a non-object value.
        let web_preferences = options.ensure_object(WEB_PREFERENCES);
        let opener_preferences = opener.last_web_preferences();
        for &(name, safe) in INHERITED_WEB_PREFERENCES {
            if opener_preferences.get_bool(name) == Some(safe) {
                web_preferences.insert(name, safe);
            }
        }
        trace!(contents_id = %opener.id(), options = ?options, "merged guest options");
    }

    /// The top-level window owning `contents`, or the one owning its host
    /// when `contents` is embedded.
    pub fn get_guest_window(&self, contents: &dyn WebContents) -> Option<Rc<dyn BrowserWindow>> {
        self.windows.from_contents(contents).or_else(|| {
            let host = contents.host_contents()?;
            self.windows.from_contents(host.as_ref())
        })
    }

    /// The live guest registered under `frame_name`.
    pub fn named_guest(&self, frame_name: &str) -> Option<Rc<dyn BrowserWindow>> {
        self.frame_to_guest
            .borrow()
            .get(frame_name)
            .filter(|guest| !guest.is_destroyed())
            .cloned()
    }

    /// The opener recorded for a live guest.
    pub fn opener_of(&self, guest: ContentsId) -> Option<ContentsId> {
        self.openers.borrow().get(&guest).copied()
    }
}
