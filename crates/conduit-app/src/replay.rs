//! JSON-lines replay driver.
//!
//! Each input line is one step of a scripted session:
//!
//! ```text
//! {"open": {"webPreferences": {"sandbox": true}}}
//! {"send": {"from": 1, "channel": "CONDUIT_...", "args": [...]}}
//! {"destroy": 1}
//! {"close": 2}
//! "capture"
//! {"capture_failed": "display lost"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. After every step the
//! driver writes one JSON line per outcome: the opened window id, the
//! synchronous reply, and every message the browser delivered to a renderer.
//! A bad line produces an `error` line and the replay continues.

use std::io::{BufRead, Write};

use conduit_common::{ConduitError, ContentsId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::host::BrowserHost;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Step {
    Open(Value),
    Send {
        from: ContentsId,
        channel: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Destroy(ContentsId),
    Close(ContentsId),
    Capture,
    CaptureFailed(String),
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Output {
    Opened { id: ContentsId },
    Reply { from: ContentsId, channel: String, value: Value },
    Delivered { to: ContentsId, channel: String, payload: Value },
    Error { line: usize, message: String },
}

/// Counts reported once the script is exhausted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub steps: usize,
    pub errors: usize,
}

/// Run `input` against `host`, writing outcomes to `output`.
pub fn run<R: BufRead, W: Write>(
    host: &BrowserHost,
    input: R,
    mut output: W,
) -> Result<ReplaySummary, ConduitError> {
    let mut summary = ReplaySummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line_no = index + 1;
        summary.steps += 1;

        let mut outputs = match serde_json::from_str::<Step>(trimmed) {
            Ok(step) => {
                debug!(line = line_no, ?step, "replay step");
                apply(host, step).unwrap_or_else(|message| {
                    vec![Output::Error {
                        line: line_no,
                        message,
                    }]
                })
            }
            Err(e) => vec![Output::Error {
                line: line_no,
                message: format!("invalid step: {e}"),
            }],
        };

        outputs.extend(host.take_deliveries().into_iter().map(|m| Output::Delivered {
            to: m.to,
            channel: m.channel,
            payload: m.payload,
        }));

        for out in &outputs {
            if let Output::Error { line, message } = out {
                warn!(line, message = %message, "replay step failed");
                summary.errors += 1;
            }
            serde_json::to_writer(&mut output, out)?;
            output.write_all(b"\n")?;
        }
    }

    output.flush()?;
    Ok(summary)
}

fn apply(host: &BrowserHost, step: Step) -> Result<Vec<Output>, String> {
    match step {
        Step::Open(options) => Ok(vec![Output::Opened {
            id: host.open_window(&options),
        }]),
        Step::Send {
            from,
            channel,
            args,
        } => {
            let reply = host
                .send(from, &channel, args)
                .map_err(|e| e.to_string())?;
            Ok(reply
                .map(|value| Output::Reply {
                    from,
                    channel,
                    value,
                })
                .into_iter()
                .collect())
        }
        Step::Destroy(id) => host
            .destroy_contents(id)
            .then(Vec::new)
            .ok_or_else(|| format!("no live contents {id}")),
        Step::Close(id) => host
            .close_window(id)
            .then(Vec::new)
            .ok_or_else(|| format!("no open window {id}")),
        Step::Capture => host
            .complete_capture(None)
            .then(Vec::new)
            .ok_or_else(|| "no capture in flight".to_string()),
        Step::CaptureFailed(reason) => host
            .complete_capture(Some(reason))
            .then(Vec::new)
            .ok_or_else(|| "no capture in flight".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_config::ConduitConfig;
    use serde_json::json;

    fn replay(script: &str) -> (ReplaySummary, Vec<Value>) {
        let host = BrowserHost::new(&ConduitConfig::default());
        let mut out = Vec::new();
        let summary = run(&host, script.as_bytes(), &mut out).unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (summary, lines)
    }

    #[test]
    fn open_and_close_guest() {
        let script = r#"
# opener, then a guest it opens
{"open": {"webPreferences": {"sandbox": true}}}
{"send": {"from": 1, "channel": "CONDUIT_GUEST_WINDOW_MANAGER_WINDOW_OPEN", "args": ["about:blank", null, "", "new-window", {}]}}
{"close": 2}
"#;
        let (summary, lines) = replay(script);
        assert_eq!(summary, ReplaySummary { steps: 3, errors: 0 });
        assert_eq!(lines[0], json!({"event": "opened", "id": 1}));
        assert_eq!(
            lines[1],
            json!({
                "event": "reply",
                "from": 1,
                "channel": "CONDUIT_GUEST_WINDOW_MANAGER_WINDOW_OPEN",
                "value": 2
            })
        );
        assert_eq!(
            lines[2],
            json!({
                "event": "delivered",
                "to": 1,
                "channel": "CONDUIT_GUEST_WINDOW_MANAGER_WINDOW_CLOSED_2",
                "payload": null
            })
        );
    }

    #[test]
    fn coalesced_capture_is_delivered_to_both_requesters() {
        let script = r#"
{"open": {}}
{"open": {}}
{"send": {"from": 1, "channel": "CONDUIT_BROWSER_DESKTOP_CAPTURER_GET_SOURCES", "args": [false, true, {"width": 1, "height": 1}, "a"]}}
{"send": {"from": 2, "channel": "CONDUIT_BROWSER_DESKTOP_CAPTURER_GET_SOURCES", "args": [false, true, {"width": 1, "height": 1}, "b"]}}
"capture"
"#;
        let (summary, lines) = replay(script);
        assert_eq!(summary.errors, 0);
        let delivered: Vec<_> = lines
            .iter()
            .filter(|l| l["event"] == "delivered")
            .collect();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0]["to"], 1);
        assert_eq!(delivered[1]["to"], 2);
        assert_eq!(delivered[0]["payload"], delivered[1]["payload"]);
    }

    #[test]
    fn failed_capture_is_reported_to_requester() {
        let script = r#"
{"open": {}}
{"send": {"from": 1, "channel": "CONDUIT_BROWSER_DESKTOP_CAPTURER_GET_SOURCES", "args": [true, false, {"width": 1, "height": 1}, "a"]}}
{"capture_failed": "display lost"}
"#;
        let (_, lines) = replay(script);
        let last = lines.last().unwrap();
        assert_eq!(last["event"], "delivered");
        assert!(last["payload"]["error"]
            .as_str()
            .unwrap()
            .contains("display lost"));
    }

    #[test]
    fn bad_lines_are_reported_and_skipped() {
        let script = "not json\n{\"close\": 9}\n\"capture\"\n{\"open\": {}}\n";
        let (summary, lines) = replay(script);
        assert_eq!(summary, ReplaySummary { steps: 4, errors: 3 });
        assert_eq!(lines[0]["event"], "error");
        assert_eq!(lines[0]["line"], 1);
        assert_eq!(lines[1]["message"], "no open window 9");
        assert_eq!(lines[3], json!({"event": "opened", "id": 1}));
    }
}
