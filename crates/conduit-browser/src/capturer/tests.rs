use std::rc::Rc;

use conduit_common::{CaptureError, RequestId, Size};
use conduit_ipc::protocol::{capturer_result_channel, DESKTOP_CAPTURER_GET_SOURCES};
use conduit_ipc::{lifecycle, ChannelRegistry, IpcSender};
use serde_json::{json, Value};

use super::*;
use crate::headless::{HeadlessCapturer, HeadlessContents, HeadlessWindowService};
use crate::options::OptionsObject;

struct Harness {
    service: HeadlessWindowService,
    native: Rc<HeadlessCapturer>,
    capturer: Rc<DesktopCapturer>,
    registry: ChannelRegistry<dyn WebContents>,
}

impl Harness {
    fn new() -> Self {
        let native = Rc::new(HeadlessCapturer::new());
        let capturer = Rc::new(DesktopCapturer::new(native.clone(), 4096));
        let registry = ChannelRegistry::new(false);
        capturer.install(&registry);
        Self {
            service: HeadlessWindowService::new(),
            native,
            capturer,
            registry,
        }
    }

    fn renderer(&self) -> Rc<HeadlessContents> {
        self.service.create_contents(OptionsObject::new())
    }

    fn request(&self, from: &Rc<HeadlessContents>, window: bool, screen: bool, edge: u32, id: &str) {
        let sender: Rc<dyn WebContents> = from.clone();
        let args = vec![
            json!(window),
            json!(screen),
            json!({"width": edge, "height": edge}),
            json!(id),
        ];
        self.registry
            .dispatch(sender, DESKTOP_CAPTURER_GET_SOURCES, args);
    }

    /// Complete the in-flight capture with synthesized sources.
    fn complete(&self) {
        let options = self.capturer.in_flight().expect("capture in flight");
        self.capturer
            .on_capture_complete(Ok(HeadlessCapturer::sources_for(&options)));
    }
}

fn replies(contents: &HeadlessContents, id: &str) -> Vec<Value> {
    contents.sent_on(&capturer_result_channel(&RequestId::from(id)))
}

#[test]
fn first_request_starts_capture_immediately() {
    let h = Harness::new();
    let r = h.renderer();
    h.request(&r, true, true, 1, "a");

    assert_eq!(h.capturer.state(), CaptureState::Capturing);
    let started = h.native.take_started();
    assert_eq!(started.len(), 1);
    assert!(started[0].capture_window);
    assert_eq!(started[0].thumbnail_size, Size::new(1, 1));
}

#[test]
fn equal_requests_share_one_native_capture() {
    let h = Harness::new();
    let r1 = h.renderer();
    let r2 = h.renderer();
    h.request(&r1, false, true, 1, "a");
    h.request(&r2, false, true, 1, "b");
    assert_eq!(h.capturer.pending(), 2);

    h.complete();

    assert_eq!(h.native.started_count(), 1);
    assert_eq!(h.capturer.state(), CaptureState::Idle);
    let a = replies(&r1, "a");
    let b = replies(&r2, "b");
    assert_eq!(a.len(), 1);
    assert_eq!(a, b);
    assert_eq!(a[0][0]["id"], "screen:0:0");
    assert_eq!(a[0][0]["display_id"], "0");
}

#[test]
fn distinct_requests_are_captured_in_arrival_order() {
    let h = Harness::new();
    let r = h.renderer();
    h.request(&r, false, true, 1, "screen");
    h.request(&r, true, false, 1, "window");
    h.request(&r, false, true, 1, "screen-again");

    h.complete();
    assert_eq!(replies(&r, "screen").len(), 1);
    assert_eq!(replies(&r, "screen-again").len(), 1);
    assert!(replies(&r, "window").is_empty());

    let in_flight = h.capturer.in_flight().unwrap();
    assert!(in_flight.capture_window);
    assert!(!in_flight.capture_screen);

    h.complete();
    assert_eq!(replies(&r, "window")[0][0]["id"], "window:1:0");
    assert_eq!(h.native.started_count(), 2);
}

#[test]
fn thumbnail_size_is_part_of_request_equality() {
    let h = Harness::new();
    let r = h.renderer();
    h.request(&r, false, true, 1, "small");
    h.request(&r, false, true, 2, "large");

    h.complete();
    assert_eq!(replies(&r, "small").len(), 1);
    assert!(replies(&r, "large").is_empty());
    assert_eq!(h.capturer.pending(), 1);
}

#[test]
fn destroyed_requester_gets_no_reply_and_others_are_unaffected() {
    let h = Harness::new();
    let gone = h.renderer();
    let stays = h.renderer();
    h.request(&gone, false, true, 1, "a");
    h.request(&stays, false, true, 1, "b");

    gone.destroy();
    assert_eq!(h.capturer.pending(), 2);

    h.complete();
    assert!(gone.sent().is_empty());
    assert_eq!(replies(&stays, "b").len(), 1);
}

#[test]
fn destroyed_head_still_drives_the_queue() {
    let h = Harness::new();
    let gone = h.renderer();
    let waits = h.renderer();
    h.request(&gone, false, true, 1, "a");
    h.request(&waits, true, false, 1, "b");
    gone.destroy();

    h.complete();
    h.complete();
    assert_eq!(replies(&waits, "b").len(), 1);
    assert_eq!(h.capturer.state(), CaptureState::Idle);
}

#[test]
fn failure_replies_with_error_and_advances() {
    let h = Harness::new();
    let r = h.renderer();
    h.request(&r, false, true, 1, "a");
    h.request(&r, false, true, 1, "b");
    h.request(&r, true, false, 1, "c");

    h.capturer
        .on_capture_complete(Err(CaptureError::NativeFailure("no display".into())));

    let a = replies(&r, "a");
    assert_eq!(a.len(), 1);
    assert!(a[0]["error"].as_str().unwrap().contains("no display"));
    assert_eq!(replies(&r, "b"), a);
    assert!(h.capturer.in_flight().unwrap().capture_window);
    assert_eq!(h.native.started_count(), 2);
}

#[test]
fn destroyed_hook_is_removed_after_reply() {
    let h = Harness::new();
    let r = h.renderer();
    h.request(&r, false, true, 1, "a");
    assert_eq!(r.lifecycle().listener_count(lifecycle::DESTROYED), 1);

    h.complete();
    assert_eq!(r.lifecycle().listener_count(lifecycle::DESTROYED), 0);
}

#[test]
fn oversized_thumbnail_is_rejected_without_capturing() {
    let h = Harness::new();
    let r = h.renderer();
    h.request(&r, false, true, 5000, "huge");

    assert_eq!(h.native.started_count(), 0);
    assert_eq!(h.capturer.state(), CaptureState::Idle);
    let reply = replies(&r, "huge");
    assert!(reply[0]["error"].as_str().unwrap().contains("5000x5000"));
}

#[test]
fn malformed_request_is_dropped() {
    let h = Harness::new();
    let r: Rc<dyn WebContents> = h.renderer();
    h.registry
        .dispatch(r, DESKTOP_CAPTURER_GET_SOURCES, vec![json!("nope")]);
    assert_eq!(h.capturer.pending(), 0);
}

#[test]
fn submit_after_idle_starts_a_new_capture() {
    let h = Harness::new();
    let r = h.renderer();
    h.request(&r, false, true, 1, "a");
    h.complete();

    let sender: Rc<dyn WebContents> = r.clone();
    let options = CaptureOptions {
        capture_window: true,
        capture_screen: false,
        thumbnail_size: Size::new(1, 1),
    };
    h.capturer.submit(RequestId::from("b"), options, &sender);

    assert_eq!(h.capturer.pending(), 1);
    assert_eq!(h.native.started_count(), 2);
}
