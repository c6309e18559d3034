//! Line-oriented JSON control for headless hosts.
//!
//! Each stdin line is one request object tagged by `cmd`, answered by one
//! reply line. Machine events are written as their own JSON lines by a
//! separate forwarding thread, so replies and events interleave freely.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::events::MachineEvent;
use crate::iec::DRIVE_DEVICE;
use crate::session::MachineSession;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Start,
    Stop,
    Pause,
    Resume,
    Warp,
    Reset {
        #[serde(default)]
        hard: bool,
    },
    Attach {
        #[serde(default = "default_drive")]
        drive: u8,
        path: PathBuf,
    },
    Detach {
        #[serde(default = "default_drive")]
        drive: u8,
    },
    Configure {
        #[serde(default)]
        media: Vec<PathBuf>,
        autostart: Option<String>,
    },
    NextMedia,
    /// Without a line: enter the monitor.
    Monitor { line: Option<String> },
    Joystick { port: u8, bit: u8, pressed: bool },
    Key { row: u8, col: u8, pressed: bool },
    Resource { name: String, value: i64 },
    Screenshot,
    Status,
}

fn default_drive() -> u8 {
    DRIVE_DEVICE
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Ok,
    Error { message: String },
    Warp { enabled: bool },
    Media { path: Option<PathBuf> },
    Status { state: String },
    Screenshot { width: u32, height: u32, png: String },
}

impl Reply {
    fn from_result(result: Result<(), crate::MachineError>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(e) => Self::error(e),
        }
    }

    fn error(e: impl std::fmt::Display) -> Self {
        Self::Error {
            message: e.to_string(),
        }
    }
}

/// Most recent frame, kept for screenshots.
#[derive(Debug, Default)]
pub struct LastFrame {
    pub pixels: Vec<u32>,
    pub width: u32,
    pub height: u32,
}

pub type FrameSlot = Arc<Mutex<Option<LastFrame>>>;

/// Carry out one request.
pub fn handle(session: &mut MachineSession, frame: &FrameSlot, request: Request) -> Reply {
    match request {
        Request::Start => Reply::from_result(session.start()),
        Request::Stop => {
            session.stop();
            Reply::Ok
        }
        Request::Pause => Reply::from_result(session.pause()),
        Request::Resume => Reply::from_result(session.resume()),
        Request::Warp => Reply::Warp {
            enabled: session.toggle_warp(),
        },
        Request::Reset { hard } => Reply::from_result(session.reset(hard)),
        Request::Attach { drive, path } => Reply::from_result(session.attach_disk(drive, path)),
        Request::Detach { drive } => Reply::from_result(session.detach_disk(drive)),
        Request::Configure { media, autostart } => {
            Reply::from_result(session.configure(media, autostart))
        }
        Request::NextMedia => match session.next_media() {
            Ok(path) => Reply::Media { path },
            Err(e) => Reply::error(e),
        },
        Request::Monitor { line: None } => Reply::from_result(session.activate_monitor()),
        Request::Monitor { line: Some(line) } => {
            Reply::from_result(session.submit_monitor_line(&line))
        }
        Request::Joystick { port, bit, pressed } => {
            if pressed {
                session.set_joystick_bit(port, bit);
            } else {
                session.clear_joystick_bit(port, bit);
            }
            Reply::Ok
        }
        Request::Key { row, col, pressed } => {
            session.set_key(row, col, pressed);
            Reply::Ok
        }
        Request::Resource { name, value } => Reply::from_result(session.set_resource(&name, value)),
        Request::Screenshot => screenshot(frame),
        Request::Status => Reply::Status {
            state: format!("{:?}", session.state()),
        },
    }
}

#[cfg(feature = "screenshot")]
fn screenshot(frame: &FrameSlot) -> Reply {
    let guard = match frame.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let Some(frame) = guard.as_ref() else {
        return Reply::error("no frame yet");
    };
    match crate::capture::png_base64(&frame.pixels, frame.width, frame.height) {
        Ok(png) => Reply::Screenshot {
            width: frame.width,
            height: frame.height,
            png,
        },
        Err(e) => Reply::error(e),
    }
}

#[cfg(not(feature = "screenshot"))]
fn screenshot(_frame: &FrameSlot) -> Reply {
    Reply::error("built without the screenshot feature")
}

fn write_line<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{json}");
            let _ = out.flush();
        }
        Err(e) => log::error!("cannot serialise output: {e}"),
    }
}

/// Print events until the session's sink goes away. Frames and audio are
/// only printed with `frame_events`; the latest frame is always kept.
pub fn forward_events(events: &Receiver<MachineEvent>, frame: &FrameSlot, frame_events: bool) {
    for event in events {
        if let MachineEvent::FrameReady {
            pixels,
            width,
            height,
        } = &event
        {
            let mut slot = match frame.lock() {
                Ok(slot) => slot,
                Err(poisoned) => poisoned.into_inner(),
            };
            *slot = Some(LastFrame {
                pixels: pixels.clone(),
                width: *width,
                height: *height,
            });
        }
        if frame_events || !event.is_droppable() {
            write_line(&event);
        }
    }
}

/// Read requests from `input` until it closes or a `stop` request.
pub fn serve(session: &mut MachineSession, frame: &FrameSlot, input: impl BufRead) {
    for line in input.lines() {
        let Ok(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                write_line(&Reply::error(format!("bad request: {e}")));
                continue;
            }
        };
        let stop = request == Request::Stop;
        write_line(&handle(session, frame, request));
        if stop {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;
    use crate::events::RecordingSink;
    use crate::machine::tests::{SPIN, roms_running};
    use pretty_assertions::assert_eq;

    fn parse(json: &str) -> Request {
        serde_json::from_str(json).expect("valid request")
    }

    #[test]
    fn parses_requests() {
        assert_eq!(parse(r#"{"cmd":"start"}"#), Request::Start);
        assert_eq!(
            parse(r#"{"cmd":"monitor","line":"m c000"}"#),
            Request::Monitor {
                line: Some("m c000".into())
            }
        );
        assert_eq!(parse(r#"{"cmd":"monitor"}"#), Request::Monitor { line: None });
        assert_eq!(parse(r#"{"cmd":"reset"}"#), Request::Reset { hard: false });
        assert_eq!(
            parse(r#"{"cmd":"attach","path":"game.d64"}"#),
            Request::Attach {
                drive: 8,
                path: "game.d64".into()
            }
        );
        assert!(serde_json::from_str::<Request>(r#"{"cmd":"explode"}"#).is_err());
    }

    #[test]
    fn replies_serialise_with_a_tag() {
        let json = serde_json::to_string(&Reply::Warp { enabled: true }).expect("serialises");
        assert_eq!(json, r#"{"reply":"warp","enabled":true}"#);
    }

    #[test]
    fn errors_become_replies() {
        let mut session = MachineSession::new(
            &MachineConfig::default(),
            &roms_running(SPIN),
            RecordingSink::new(),
        )
        .expect("session builds");
        let frame = FrameSlot::default();
        let reply = handle(
            &mut session,
            &frame,
            Request::Resource {
                name: "Bogus".into(),
                value: 0,
            },
        );
        assert_eq!(
            reply,
            Reply::Error {
                message: "unknown resource Bogus".into()
            }
        );
        assert!(matches!(handle(&mut session, &frame, Request::Screenshot), Reply::Error { .. }));
        assert_eq!(
            handle(&mut session, &frame, Request::Status),
            Reply::Status {
                state: "Stopped".into()
            }
        );
    }

    #[cfg(feature = "screenshot")]
    #[test]
    fn screenshot_of_last_frame() {
        let mut session = MachineSession::new(
            &MachineConfig::default(),
            &roms_running(SPIN),
            RecordingSink::new(),
        )
        .expect("session builds");
        let frame: FrameSlot = Arc::new(Mutex::new(Some(LastFrame {
            pixels: vec![0xFF00_0000; 6],
            width: 3,
            height: 2,
        })));
        let Reply::Screenshot { width, height, png } = handle(&mut session, &frame, Request::Screenshot) else {
            panic!("expected a screenshot");
        };
        assert_eq!((width, height), (3, 2));
        assert!(png.starts_with("iVBORw0KGgo"));
    }
}
