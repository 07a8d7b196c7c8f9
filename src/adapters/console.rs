//! Line-oriented operator console.
//!
//! Accepts one request per line, either a short word or a JSON object:
//!
//! | Input                                                  | Effect                 |
//! |--------------------------------------------------------|------------------------|
//! | `run` / `stop`                                         | start / stop           |
//! | `status`                                               | print telemetry frame  |
//! | `quit`                                                 | shut down              |
//! | `{"command":"set_incubator_state","state":"running"}`  | realtime message       |
//! | `{"setpoints":{"co2":5000,"temperature":"37.5"}}`      | partial setpoint update|
//! | `{"control":"o2","enabled":false}`                     | enable / disable loop  |
//!
//! Parsing is pure; [`execute`] forwards to a [`ControlLink`].

use core::fmt;

use serde::Deserialize;

use crate::app::commands::{ChannelMessage, ControlStateRequest, SetpointUpdate};
use crate::runtime::ControlLink;

/// One parsed console request.
#[derive(Debug, Clone)]
pub enum ConsoleRequest {
    Run,
    Stop,
    Status,
    Quit,
    Message(ChannelMessage),
    Setpoints(SetpointUpdate),
    Control {
        name: String,
        request: ControlStateRequest,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleError {
    Empty,
    UnknownWord,
    Malformed,
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty line"),
            Self::UnknownWord => write!(f, "unknown command (try run, stop, status, quit)"),
            Self::Malformed => write!(f, "malformed JSON request"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonLine {
    Message(ChannelMessage),
    Control { control: String, enabled: bool },
    Setpoints { setpoints: SetpointUpdate },
}

/// Parse one console line.
pub fn parse_line(line: &str) -> Result<ConsoleRequest, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ConsoleError::Empty);
    }
    if line.starts_with('{') {
        let parsed: JsonLine = serde_json::from_str(line).map_err(|_| ConsoleError::Malformed)?;
        return Ok(match parsed {
            JsonLine::Message(m) => ConsoleRequest::Message(m),
            JsonLine::Control { control, enabled } => ConsoleRequest::Control {
                name: control,
                request: ControlStateRequest { enabled },
            },
            JsonLine::Setpoints { setpoints } => ConsoleRequest::Setpoints(setpoints),
        });
    }
    match line.to_ascii_lowercase().as_str() {
        "run" | "start" => Ok(ConsoleRequest::Run),
        "stop" => Ok(ConsoleRequest::Stop),
        "status" => Ok(ConsoleRequest::Status),
        "quit" | "exit" => Ok(ConsoleRequest::Quit),
        _ => Err(ConsoleError::UnknownWord),
    }
}

/// Forward a request to the control task and render a reply line.
pub fn execute(request: ConsoleRequest, link: &ControlLink) -> String {
    match request {
        ConsoleRequest::Run => {
            link.set_running(true);
            "ok: starting".to_owned()
        }
        ConsoleRequest::Stop => {
            link.set_running(false);
            "ok: stopping".to_owned()
        }
        ConsoleRequest::Quit => {
            link.request_shutdown();
            "ok: shutting down".to_owned()
        }
        ConsoleRequest::Status => match link.telemetry() {
            Some(snapshot) => serde_json::to_string(&snapshot.to_frame())
                .unwrap_or_else(|e| format!("error: {e}")),
            None => "no telemetry yet".to_owned(),
        },
        ConsoleRequest::Message(m) => {
            link.handle_message(m);
            "ok".to_owned()
        }
        ConsoleRequest::Setpoints(update) => link.put_setpoints(&update).to_json().to_string(),
        ConsoleRequest::Control { name, request } => match link.set_enabled(&name, request.enabled) {
            Ok(()) => format!("ok: {name} enabled={}", request.enabled),
            Err(e) => format!("error: {name}: {e}"),
        },
    }
}
