//! Collaborator interfaces the browser side is written against.
//!
//! Real windowing and rendering live behind these traits. The
//! [`crate::headless`] module provides an in-memory implementation.

use std::rc::Rc;

use conduit_common::{ContentsId, WindowError};
use conduit_ipc::{EventEmitter, IpcSender};

use crate::options::OptionsObject;

/// A renderer's content handle as seen from the browser process.
pub trait WebContents: IpcSender {
    /// Preferences currently in effect for this contents.
    fn last_web_preferences(&self) -> OptionsObject;

    /// Options the owning top-level window was created with, if this
    /// contents belongs to one.
    fn browser_window_options(&self) -> Option<OptionsObject>;

    /// Whether this contents is embedded inside another view.
    fn is_guest(&self) -> bool;

    /// The contents this one is embedded in, if any.
    fn host_contents(&self) -> Option<Rc<dyn WebContents>>;
}

/// A top-level window.
pub trait BrowserWindow {
    fn contents(&self) -> Rc<dyn WebContents>;

    /// Guests are identified by their contents' id.
    fn id(&self) -> ContentsId {
        self.contents().id()
    }

    fn load_url(&self, url: &str) -> Result<(), WindowError>;

    fn is_visible(&self) -> bool;

    fn is_destroyed(&self) -> bool;

    /// Close as if by the user. Emits `closed`.
    fn close(&self);

    /// Tear down immediately. Also emits `closed`.
    fn destroy(&self);

    /// Window lifecycle notifications (`closed`).
    fn lifecycle(&self) -> &EventEmitter<()>;
}

/// Constructs and resolves windows.
pub trait WindowService {
    /// Create a window from `options`. When the options carry a
    /// `webContents` handle, the window adopts that contents.
    fn create(&self, options: &OptionsObject) -> Result<Rc<dyn BrowserWindow>, WindowError>;

    /// The top-level window directly owning `contents`.
    fn from_contents(&self, contents: &dyn WebContents) -> Option<Rc<dyn BrowserWindow>>;

    fn contents_from_id(&self, id: ContentsId) -> Option<Rc<dyn WebContents>>;
}
