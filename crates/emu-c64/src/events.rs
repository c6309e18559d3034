//! Events flowing from the worker thread to the host.
//!
//! The worker never blocks on the host. [`ChannelSink`] hands events over a
//! bounded channel with `try_send`: when the host lags, video frames and
//! audio buffers are dropped and counted, and every other event waits in a
//! local backlog so delivery order is preserved. Consecutive LED updates
//! merge in the backlog, and past [`BACKLOG_LIMIT`] events only
//! `MachineStopped` is still queued.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::Serialize;

/// How long a dropped [`ChannelSink`] waits for the host to take its backlog.
const BACKLOG_GRACE: Duration = Duration::from_secs(1);

/// Undelivered events a [`ChannelSink`] holds for a host that stopped reading.
pub const BACKLOG_LIMIT: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MachineEvent {
    /// One complete VIC-II frame, ARGB32 row-major.
    FrameReady {
        #[serde(skip)]
        pixels: Vec<u32>,
        width: u32,
        height: u32,
    },
    /// Mono samples at the configured rate, in emulated order.
    AudioReady {
        #[serde(skip)]
        samples: Vec<f32>,
    },
    /// Averaged activity LED, 0..=1000.
    DriveLed { drive: u8, intensity: u16 },
    DriveEnabled { drive: u8, enabled: bool },
    MonitorOutput { text: String },
    MonitorPrompt { text: String },
    MachineStopped,
    WarpChanged { enabled: bool },
    DeviceNotResponding { drive: u8 },
    Diagnostic { text: String },
}

impl MachineEvent {
    /// Events that can be skipped without the host losing state.
    #[must_use]
    pub fn is_droppable(&self) -> bool {
        matches!(self, Self::FrameReady { .. } | Self::AudioReady { .. })
    }
}

/// Receives events from the worker thread. Implementations must not block.
pub trait MachineEventSink: Send {
    fn on_event(&mut self, event: MachineEvent);
}

/// Sink over a bounded crossbeam channel.
pub struct ChannelSink {
    tx: Sender<MachineEvent>,
    backlog: VecDeque<MachineEvent>,
    dropped: Arc<AtomicU64>,
    /// Set once the backlog hit its limit, until it drains again.
    overflowed: bool,
}

impl ChannelSink {
    /// A sink and its receiving end, holding at most `capacity` events.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Receiver<MachineEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (
            Self {
                tx,
                backlog: VecDeque::new(),
                dropped: Arc::new(AtomicU64::new(0)),
                overflowed: false,
            },
            rx,
        )
    }

    /// Shared count of events dropped so far: frames and audio while the
    /// host lags, anything but `MachineStopped` once the backlog is full.
    #[must_use]
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    /// Push out as much of the backlog as the channel will take.
    /// Returns false if the receiver is gone.
    fn flush_backlog(&mut self) -> bool {
        while let Some(event) = self.backlog.pop_front() {
            match self.tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    self.backlog.push_front(event);
                    return true;
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.backlog.clear();
                    return false;
                }
            }
        }
        self.overflowed = false;
        true
    }

    /// Hold a non-droppable event until the channel has room.
    fn queue(&mut self, event: MachineEvent) {
        if let MachineEvent::DriveLed { drive, .. } = event {
            if let Some(last) = self.backlog.back_mut() {
                if matches!(last, MachineEvent::DriveLed { drive: queued, .. } if *queued == drive) {
                    *last = event;
                    return;
                }
            }
        }
        if self.backlog.len() >= BACKLOG_LIMIT && event != MachineEvent::MachineStopped {
            if !self.overflowed {
                self.overflowed = true;
                log::warn!("host not reading events: backlog full at {BACKLOG_LIMIT}, dropping");
            }
            self.drop_event(&event);
            return;
        }
        self.backlog.push_back(event);
    }

    fn drop_event(&self, event: &MachineEvent) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if let MachineEvent::FrameReady { .. } = event {
            log::trace!("host lagging: dropped frame ({total} dropped so far)");
        }
    }
}

impl MachineEventSink for ChannelSink {
    fn on_event(&mut self, event: MachineEvent) {
        if !self.flush_backlog() {
            return;
        }
        if !self.backlog.is_empty() {
            if event.is_droppable() {
                self.drop_event(&event);
            } else {
                self.queue(event);
            }
            return;
        }
        match self.tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                if event.is_droppable() {
                    self.drop_event(&event);
                } else {
                    self.queue(event);
                }
            }
        }
    }
}

impl Drop for ChannelSink {
    /// Give a reading host a last chance at the backlog, `MachineStopped`
    /// usually among it.
    fn drop(&mut self) {
        let deadline = Instant::now() + BACKLOG_GRACE;
        while let Some(event) = self.backlog.pop_front() {
            let left = deadline.saturating_duration_since(Instant::now());
            if self.tx.send_timeout(event, left).is_err() {
                log::debug!("{} events undelivered at shutdown", self.backlog.len() + 1);
                break;
            }
        }
    }
}

/// Sink that keeps every event, for tests and scripted hosts.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<MachineEvent>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<MachineEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl MachineEventSink for RecordingSink {
    fn on_event(&mut self, event: MachineEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame() -> MachineEvent {
        MachineEvent::FrameReady {
            pixels: vec![0; 4],
            width: 2,
            height: 2,
        }
    }

    fn text(s: &str) -> MachineEvent {
        MachineEvent::MonitorOutput {
            text: s.to_string(),
        }
    }

    #[test]
    fn frames_dropped_when_full() {
        let (mut sink, rx) = ChannelSink::bounded(1);
        let dropped = sink.dropped_counter();
        sink.on_event(frame());
        sink.on_event(frame());
        sink.on_event(frame());
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn other_events_keep_their_order() {
        let (mut sink, rx) = ChannelSink::bounded(1);
        sink.on_event(text("a"));
        sink.on_event(text("b"));
        sink.on_event(frame());
        sink.on_event(text("c"));
        assert_eq!(rx.try_recv().ok(), Some(text("a")));
        sink.on_event(MachineEvent::MachineStopped);
        let mut rest = Vec::new();
        for _ in 0..3 {
            rest.extend(rx.try_recv().ok());
            sink.on_event(MachineEvent::Diagnostic { text: "tick".into() });
        }
        assert_eq!(rest, vec![text("b"), text("c"), MachineEvent::MachineStopped]);
    }

    #[test]
    fn led_updates_merge_while_waiting() {
        let (mut sink, rx) = ChannelSink::bounded(1);
        sink.on_event(text("a"));
        for intensity in [100, 200, 300] {
            sink.on_event(MachineEvent::DriveLed { drive: 8, intensity });
        }
        assert_eq!(sink.backlog.len(), 1);
        assert_eq!(rx.try_recv().ok(), Some(text("a")));
        sink.on_event(MachineEvent::DriveLed { drive: 8, intensity: 0 });
        assert_eq!(
            rx.try_recv().ok(),
            Some(MachineEvent::DriveLed {
                drive: 8,
                intensity: 300
            })
        );
    }

    #[test]
    fn backlog_is_bounded_but_keeps_the_stop() {
        let (mut sink, _rx) = ChannelSink::bounded(1);
        let dropped = sink.dropped_counter();
        for n in 0..BACKLOG_LIMIT + 10 {
            sink.on_event(text(&n.to_string()));
        }
        assert_eq!(sink.backlog.len(), BACKLOG_LIMIT);
        assert_eq!(dropped.load(Ordering::Relaxed), 9);
        sink.on_event(MachineEvent::MachineStopped);
        assert_eq!(sink.backlog.back(), Some(&MachineEvent::MachineStopped));
    }

    #[test]
    fn disconnected_receiver_is_ignored() {
        let (mut sink, rx) = ChannelSink::bounded(1);
        drop(rx);
        sink.on_event(text("nobody listening"));
        sink.on_event(frame());
    }

    #[test]
    fn events_serialise_with_a_tag() {
        let json = serde_json::to_string(&MachineEvent::DriveLed {
            drive: 8,
            intensity: 500,
        })
        .expect("serialises");
        assert_eq!(json, r#"{"event":"drive_led","drive":8,"intensity":500}"#);
        let json = serde_json::to_string(&frame()).expect("serialises");
        assert_eq!(json, r#"{"event":"frame_ready","width":2,"height":2}"#);
    }

    #[test]
    fn recording_sink_collects() {
        let mut sink = RecordingSink::new();
        let view = sink.clone();
        sink.on_event(MachineEvent::WarpChanged { enabled: true });
        assert_eq!(view.take(), vec![MachineEvent::WarpChanged { enabled: true }]);
        assert!(view.take().is_empty());
    }
}
