//! In-memory windows, contents and capture backend.
//!
//! Nothing is rendered. Contents record what the browser sends them, windows
//! track their URL and visibility, and the capturer records which captures
//! were started so a driver can complete them on a later turn. Used by the
//! `conduit replay` driver and by tests.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use conduit_common::{ContentsId, IpcError, WindowError};
use conduit_ipc::{lifecycle, EventEmitter, IpcSender};
use serde_json::Value;
use tracing::debug;

use crate::capturer::{CaptureOptions, CaptureService, CapturedSource, Thumbnail};
use crate::options::{OptionValue, OptionsObject, SHOW, WEB_CONTENTS, WEB_PREFERENCES};
use crate::window::{BrowserWindow, WebContents, WindowService};

/// A message the browser delivered to a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub to: ContentsId,
    pub channel: String,
    pub payload: Value,
}

// =============================================================================
// CONTENTS
// =============================================================================

pub struct HeadlessContents {
    id: ContentsId,
    lifecycle: EventEmitter<()>,
    preferences: OptionsObject,
    window_options: RefCell<Option<OptionsObject>>,
    host: RefCell<Option<Weak<dyn WebContents>>>,
    outbox: RefCell<Vec<SentMessage>>,
    destroyed: Cell<bool>,
}

impl HeadlessContents {
    fn new(id: ContentsId, preferences: OptionsObject) -> Self {
        Self {
            id,
            lifecycle: EventEmitter::new(),
            preferences,
            window_options: RefCell::new(None),
            host: RefCell::new(None),
            outbox: RefCell::new(Vec::new()),
            destroyed: Cell::new(false),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Everything sent to this contents so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.outbox.borrow().clone()
    }

    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.outbox.borrow_mut())
    }

    /// Payloads sent on `channel`, in order.
    pub fn sent_on(&self, channel: &str) -> Vec<Value> {
        self.outbox
            .borrow()
            .iter()
            .filter(|m| m.channel == channel)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Tear down the renderer. Emits `current-render-view-deleted` then
    /// `destroyed`, once.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        debug!(contents_id = %self.id, "contents destroyed");
        self.lifecycle.emit(lifecycle::RENDER_VIEW_DELETED, &());
        self.lifecycle.emit(lifecycle::DESTROYED, &());
    }
}

impl IpcSender for HeadlessContents {
    fn id(&self) -> ContentsId {
        self.id
    }

    fn send(&self, channel: &str, payload: Value) -> Result<(), IpcError> {
        if self.destroyed.get() {
            return Err(IpcError::SendFailed {
                channel: channel.to_string(),
                reason: format!("contents {} is destroyed", self.id),
            });
        }
        self.outbox.borrow_mut().push(SentMessage {
            to: self.id,
            channel: channel.to_string(),
            payload,
        });
        Ok(())
    }

    fn lifecycle(&self) -> &EventEmitter<()> {
        &self.lifecycle
    }
}

impl WebContents for HeadlessContents {
    fn last_web_preferences(&self) -> OptionsObject {
        self.preferences.clone()
    }

    fn browser_window_options(&self) -> Option<OptionsObject> {
        self.window_options.borrow().clone()
    }

    fn is_guest(&self) -> bool {
        self.host.borrow().is_some()
    }

    fn host_contents(&self) -> Option<Rc<dyn WebContents>> {
        self.host.borrow().as_ref().and_then(Weak::upgrade)
    }
}

// =============================================================================
// WINDOWS
// =============================================================================

pub struct HeadlessWindow {
    contents: Rc<HeadlessContents>,
    lifecycle: EventEmitter<()>,
    visible: Cell<bool>,
    url: RefCell<Option<String>>,
    loads: Cell<u32>,
    closed: Cell<bool>,
}

impl HeadlessWindow {
    pub fn headless_contents(&self) -> &Rc<HeadlessContents> {
        &self.contents
    }

    pub fn url(&self) -> Option<String> {
        self.url.borrow().clone()
    }

    /// How many times `load_url` was called.
    pub fn load_count(&self) -> u32 {
        self.loads.get()
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }

    fn shut(&self, reason: &str) {
        if self.closed.replace(true) {
            return;
        }
        debug!(window_id = %self.contents.id, reason, "window closed");
        self.lifecycle.emit(lifecycle::CLOSED, &());
        self.contents.destroy();
    }
}

impl BrowserWindow for HeadlessWindow {
    fn contents(&self) -> Rc<dyn WebContents> {
        self.contents.clone()
    }

    fn load_url(&self, url: &str) -> Result<(), WindowError> {
        if self.closed.get() {
            return Err(WindowError::LoadFailed {
                url: url.to_string(),
                reason: "window is closed".into(),
            });
        }
        *self.url.borrow_mut() = Some(url.to_string());
        self.loads.set(self.loads.get() + 1);
        Ok(())
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn is_destroyed(&self) -> bool {
        self.closed.get()
    }

    fn close(&self) {
        self.shut("close");
    }

    fn destroy(&self) {
        self.shut("destroy");
    }

    fn lifecycle(&self) -> &EventEmitter<()> {
        &self.lifecycle
    }
}

// =============================================================================
// WINDOW SERVICE
// =============================================================================

#[derive(Default)]
pub struct HeadlessWindowService {
    next_id: Cell<u32>,
    windows: RefCell<Vec<Rc<HeadlessWindow>>>,
    contents: RefCell<Vec<Rc<HeadlessContents>>>,
    fail_creates: Cell<bool>,
}

impl HeadlessWindowService {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> ContentsId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        ContentsId(id)
    }

    /// Make every later `create` fail.
    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.set(fail);
    }

    /// Contents not (yet) owned by a window.
    pub fn create_contents(&self, preferences: OptionsObject) -> Rc<HeadlessContents> {
        let contents = Rc::new(HeadlessContents::new(self.allocate_id(), preferences));
        self.contents.borrow_mut().push(Rc::clone(&contents));
        contents
    }

    /// Contents embedded inside `host` rather than owning a window.
    pub fn create_embedded_contents(
        &self,
        host: &Rc<dyn WebContents>,
        preferences: OptionsObject,
    ) -> Rc<HeadlessContents> {
        let contents = self.create_contents(preferences);
        *contents.host.borrow_mut() = Some(Rc::downgrade(host));
        contents
    }

    /// Open a top-level window directly, as the application would.
    pub fn open_window(&self, options: &OptionsObject) -> Rc<HeadlessWindow> {
        let adopted = match options.get(WEB_CONTENTS) {
            Some(OptionValue::Contents(id)) => self.headless_contents(id),
            _ => None,
        };
        let contents = adopted.unwrap_or_else(|| {
            let preferences = options
                .get_object(WEB_PREFERENCES)
                .map(|p| p.shallow_clone())
                .unwrap_or_default();
            self.create_contents(preferences)
        });
        *contents.window_options.borrow_mut() = Some(options.clone());

        let window = Rc::new(HeadlessWindow {
            contents,
            lifecycle: EventEmitter::new(),
            visible: Cell::new(options.get_bool(SHOW).unwrap_or(true)),
            url: RefCell::new(None),
            loads: Cell::new(0),
            closed: Cell::new(false),
        });
        self.windows.borrow_mut().push(Rc::clone(&window));
        debug!(window_id = %window.contents.id, "window opened");
        window
    }

    pub fn window(&self, id: ContentsId) -> Option<Rc<HeadlessWindow>> {
        self.windows
            .borrow()
            .iter()
            .find(|w| w.contents.id == id && !w.closed.get())
            .cloned()
    }

    pub fn headless_contents(&self, id: ContentsId) -> Option<Rc<HeadlessContents>> {
        self.contents
            .borrow()
            .iter()
            .find(|c| c.id == id && !c.is_destroyed())
            .cloned()
    }

    /// Windows that are still open.
    pub fn open_windows(&self) -> Vec<Rc<HeadlessWindow>> {
        self.windows
            .borrow()
            .iter()
            .filter(|w| !w.closed.get())
            .cloned()
            .collect()
    }

    /// Drain what the browser sent to every contents, in id order.
    pub fn take_outbox(&self) -> Vec<SentMessage> {
        self.contents
            .borrow()
            .iter()
            .flat_map(|c| c.take_sent())
            .collect()
    }
}

impl WindowService for HeadlessWindowService {
    fn create(&self, options: &OptionsObject) -> Result<Rc<dyn BrowserWindow>, WindowError> {
        if self.fail_creates.get() {
            return Err(WindowError::CreateFailed("window creation disabled".into()));
        }
        if let Some(OptionValue::Contents(id)) = options.get(WEB_CONTENTS) {
            if self.headless_contents(id).is_none() {
                return Err(WindowError::NotFound(id));
            }
        }
        let window: Rc<dyn BrowserWindow> = self.open_window(options);
        Ok(window)
    }

    fn from_contents(&self, contents: &dyn WebContents) -> Option<Rc<dyn BrowserWindow>> {
        let window: Rc<dyn BrowserWindow> = self.window(contents.id())?;
        Some(window)
    }

    fn contents_from_id(&self, id: ContentsId) -> Option<Rc<dyn WebContents>> {
        let contents: Rc<dyn WebContents> = self.headless_contents(id)?;
        Some(contents)
    }
}

// =============================================================================
// CAPTURER
// =============================================================================

/// Records started captures; a driver completes them with `sources_for`.
#[derive(Default)]
pub struct HeadlessCapturer {
    started: RefCell<Vec<CaptureOptions>>,
}

impl HeadlessCapturer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures started since the last call, oldest first.
    pub fn take_started(&self) -> Vec<CaptureOptions> {
        std::mem::take(&mut *self.started.borrow_mut())
    }

    pub fn started_count(&self) -> usize {
        self.started.borrow().len()
    }

    /// One screen and one window, with solid thumbnails of the requested size.
    pub fn sources_for(options: &CaptureOptions) -> Vec<CapturedSource> {
        let thumbnail = |pixel| Thumbnail::solid(options.thumbnail_size, pixel);
        let mut sources = Vec::new();
        if options.capture_screen {
            sources.push(CapturedSource {
                id: "screen:0:0".into(),
                name: "Entire Screen".into(),
                display_id: "0".into(),
                thumbnail: thumbnail([32, 32, 32, 255]),
            });
        }
        if options.capture_window {
            sources.push(CapturedSource {
                id: "window:1:0".into(),
                name: "Headless Window".into(),
                display_id: String::new(),
                thumbnail: thumbnail([200, 200, 200, 255]),
            });
        }
        sources
    }
}

impl CaptureService for HeadlessCapturer {
    fn start_capture(&self, options: &CaptureOptions) {
        debug!(?options, "headless capture started");
        self.started.borrow_mut().push(*options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn open_window_takes_preferences_and_visibility_from_options() {
        let service = HeadlessWindowService::new();
        let options = OptionsObject::from_json(&json!({
            "show": false,
            "webPreferences": {"sandbox": true}
        }));
        let window = service.open_window(&options);

        assert!(!window.is_visible());
        let contents = window.contents();
        assert_eq!(contents.last_web_preferences().get_bool("sandbox"), Some(true));
        assert!(contents.browser_window_options().unwrap().ptr_eq(&options));
        assert!(!contents.is_guest());
    }

    #[test]
    fn create_adopts_existing_contents() {
        let service = HeadlessWindowService::new();
        let contents = service.create_contents(OptionsObject::new());
        let options = OptionsObject::new();
        options.insert(WEB_CONTENTS, contents.id());

        let window = service.create(&options).unwrap();
        assert_eq!(window.id(), contents.id());
    }

    #[test]
    fn create_with_unknown_contents_fails() {
        let service = HeadlessWindowService::new();
        let options = OptionsObject::new();
        options.insert(WEB_CONTENTS, ContentsId(99));
        assert!(matches!(
            service.create(&options),
            Err(WindowError::NotFound(ContentsId(99)))
        ));
    }

    #[test]
    fn close_emits_closed_once_and_destroys_contents() {
        let service = HeadlessWindowService::new();
        let window = service.open_window(&OptionsObject::new());
        let closes = Rc::new(Cell::new(0));
        let c = Rc::clone(&closes);
        window
            .lifecycle()
            .on(lifecycle::CLOSED, conduit_ipc::listener(move |_: &()| c.set(c.get() + 1)));

        window.close();
        window.destroy();
        assert_eq!(closes.get(), 1);
        assert!(window.headless_contents().is_destroyed());
        assert!(service.window(window.id()).is_none());
        assert!(window.load_url("about:blank").is_err());
    }

    #[test]
    fn embedded_contents_resolve_host() {
        let service = HeadlessWindowService::new();
        let host = service.open_window(&OptionsObject::new());
        let embedded = service.create_embedded_contents(&host.contents(), OptionsObject::new());

        assert!(embedded.is_guest());
        assert_eq!(embedded.host_contents().unwrap().id(), host.id());
        assert!(service.from_contents(&*embedded).is_none());
    }

    #[test]
    fn destroyed_contents_refuse_messages() {
        let service = HeadlessWindowService::new();
        let contents = service.create_contents(OptionsObject::new());
        contents.send("a", json!(1)).unwrap();
        contents.destroy();
        assert!(contents.send("b", json!(2)).is_err());
        assert_eq!(contents.sent_on("a"), vec![json!(1)]);
    }

    #[test]
    fn headless_capturer_synthesizes_requested_kinds() {
        let options = CaptureOptions {
            capture_window: false,
            capture_screen: true,
            thumbnail_size: conduit_common::Size::new(1, 1),
        };
        let sources = HeadlessCapturer::sources_for(&options);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, "screen:0:0");
        assert_eq!(sources[0].thumbnail.rgba.len(), 4);
    }
}
