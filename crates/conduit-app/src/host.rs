//! The browser process: registry, capturer and guest manager wired to the
//! headless backend.

use std::rc::Rc;

use conduit_browser::headless::{HeadlessCapturer, HeadlessWindowService, SentMessage};
use conduit_browser::{
    BrowserWindow, CaptureService, DesktopCapturer, GuestWindowManager, OptionsObject, WebContents,
};
use conduit_common::{CaptureError, ContentsId, IpcError};
use conduit_config::ConduitConfig;
use conduit_ipc::protocol::{
    DESKTOP_CAPTURER_GET_SOURCES, GUEST_WINDOW_MANAGER_WINDOW_CLOSE,
    GUEST_WINDOW_MANAGER_WINDOW_OPEN,
};
use conduit_ipc::{filter, ChannelRegistry, IpcEvent, IpcSender};
use serde_json::Value;
use tracing::{debug, info, warn};

// =============================================================================
// CHANNEL ALLOWLIST
// =============================================================================

/// Channels renderers may send on. Anything else is dropped by the
/// allowlist filter when filtering is enabled.
const ALLOWED_CHANNELS: &[&str] = &[
    DESKTOP_CAPTURER_GET_SOURCES,
    GUEST_WINDOW_MANAGER_WINDOW_OPEN,
    GUEST_WINDOW_MANAGER_WINDOW_CLOSE,
];

pub fn is_channel_allowed(channel: &str) -> bool {
    ALLOWED_CHANNELS.contains(&channel)
}

// =============================================================================
// HOST
// =============================================================================

pub struct BrowserHost {
    windows: Rc<HeadlessWindowService>,
    registry: ChannelRegistry<dyn WebContents>,
    capturer: Option<Rc<DesktopCapturer>>,
    guests: Rc<GuestWindowManager>,
}

impl BrowserHost {
    pub fn new(config: &ConduitConfig) -> Self {
        let windows = Rc::new(HeadlessWindowService::new());
        let native: Rc<dyn CaptureService> = Rc::new(HeadlessCapturer::new());
        let registry = ChannelRegistry::new(config.ipc.filters_enabled);

        registry.add_filter(filter(|event: &IpcEvent<dyn WebContents>| {
            let allowed = is_channel_allowed(event.channel());
            if !allowed {
                warn!(
                    contents_id = %event.sender().id(),
                    channel = event.channel(),
                    "IPC message rejected: unknown channel"
                );
            }
            allowed
        }));

        let capturer = config.capturer.enabled.then(|| {
            let capturer = Rc::new(DesktopCapturer::new(
                native,
                config.capturer.max_thumbnail_edge,
            ));
            capturer.install(&registry);
            capturer
        });

        let guests = Rc::new(GuestWindowManager::new(
            windows.clone(),
            config.guest.allow_popups,
        ));
        guests.install(&registry);

        info!(
            filters_enabled = registry.filters_enabled(),
            capturer = capturer.is_some(),
            "browser host ready"
        );
        Self {
            windows,
            registry,
            capturer,
            guests,
        }
    }

    /// Open a top-level window the way the application would.
    pub fn open_window(&self, options: &Value) -> ContentsId {
        let window = self.windows.open_window(&OptionsObject::from_json(options));
        window.id()
    }

    /// Deliver a renderer message from contents `from`.
    pub fn send(
        &self,
        from: ContentsId,
        channel: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, IpcError> {
        let sender: Rc<dyn WebContents> = self
            .windows
            .headless_contents(from)
            .ok_or_else(|| IpcError::SendFailed {
                channel: channel.to_string(),
                reason: format!("no live contents {from}"),
            })?;
        debug!(contents_id = %from, channel, "renderer message");
        Ok(self.registry.dispatch(sender, channel, args))
    }

    /// Tear down contents `id`. Returns false if it is not live.
    pub fn destroy_contents(&self, id: ContentsId) -> bool {
        match self.windows.headless_contents(id) {
            Some(contents) => {
                contents.destroy();
                true
            }
            None => false,
        }
    }

    /// Close window `id` as the user would. Returns false if it is not open.
    pub fn close_window(&self, id: ContentsId) -> bool {
        match self.windows.window(id) {
            Some(window) => {
                window.close();
                true
            }
            None => false,
        }
    }

    /// Finish the in-flight native capture. Returns false if none is running.
    pub fn complete_capture(&self, failure: Option<String>) -> bool {
        let Some(capturer) = &self.capturer else {
            return false;
        };
        let Some(options) = capturer.in_flight() else {
            return false;
        };
        let outcome = match failure {
            Some(reason) => Err(CaptureError::NativeFailure(reason)),
            None => Ok(HeadlessCapturer::sources_for(&options)),
        };
        capturer.on_capture_complete(outcome);
        true
    }

    /// Drain everything the browser sent to renderers since the last call.
    pub fn take_deliveries(&self) -> Vec<SentMessage> {
        self.windows.take_outbox()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn host() -> BrowserHost {
        let mut config = ConduitConfig::default();
        config.ipc.filters_enabled = true;
        BrowserHost::new(&config)
    }

    #[test]
    fn allowlist_covers_protocol_channels() {
        assert!(is_channel_allowed(DESKTOP_CAPTURER_GET_SOURCES));
        assert!(is_channel_allowed(GUEST_WINDOW_MANAGER_WINDOW_OPEN));
        assert!(!is_channel_allowed("SOMETHING_ELSE"));
    }

    #[test]
    fn unknown_channel_is_filtered() {
        let host = host();
        let id = host.open_window(&json!({}));
        let reply = host.send(id, "SOMETHING_ELSE", vec![]).unwrap();
        assert_eq!(reply, None);
    }

    #[test]
    fn window_open_round_trip() {
        let host = host();
        let opener = host.open_window(&json!({}));
        let reply = host
            .send(
                opener,
                GUEST_WINDOW_MANAGER_WINDOW_OPEN,
                vec![
                    json!("about:blank"),
                    json!(null),
                    json!(""),
                    json!("new-window"),
                    json!({}),
                ],
            )
            .unwrap()
            .unwrap();
        let guest = ContentsId(reply.as_u64().unwrap() as u32);
        assert_eq!(host.guests.opener_of(guest), Some(opener));

        assert!(host.close_window(guest));
        let deliveries = host.take_deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].to, opener);
    }

    #[test]
    fn capture_round_trip() {
        let host = host();
        let id = host.open_window(&json!({}));
        let args = vec![
            json!(false),
            json!(true),
            json!({"width": 1, "height": 1}),
            json!("r1"),
        ];
        assert_eq!(host.send(id, DESKTOP_CAPTURER_GET_SOURCES, args).unwrap(), None);

        assert!(host.complete_capture(None));
        assert!(!host.complete_capture(None));
        let deliveries = host.take_deliveries();
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].channel.ends_with("_r1"));
    }

    #[test]
    fn disabled_capturer_installs_no_handler() {
        let mut config = ConduitConfig::default();
        config.capturer.enabled = false;
        let host = BrowserHost::new(&config);
        let id = host.open_window(&json!({}));
        let args = vec![
            json!(false),
            json!(true),
            json!({"width": 1, "height": 1}),
            json!("r1"),
        ];
        host.send(id, DESKTOP_CAPTURER_GET_SOURCES, args).unwrap();
        assert!(!host.complete_capture(None));
    }

    #[test]
    fn sending_from_unknown_contents_fails() {
        let host = host();
        assert!(host.send(ContentsId(42), GUEST_WINDOW_MANAGER_WINDOW_OPEN, vec![]).is_err());
        assert!(!host.destroy_contents(ContentsId(42)));
        assert!(!host.close_window(ContentsId(42)));
    }
}
