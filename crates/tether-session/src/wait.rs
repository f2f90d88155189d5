//! Waiting for one event on a connection's event stream.

use tether_transport::{EventStream, TransportEvent};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;

use crate::WaitError;

/// Waits until `pick` accepts an event, the deadline passes, or the
/// connection ends, whichever happens first.
///
/// Events `pick` declines are dropped, except terminal ones, which end the
/// wait as [`WaitError::Interrupted`] so the caller can still act on them.
/// A closed stream counts as an end.
///
/// Dropping the returned future abandons the wait with nothing left
/// behind.
pub async fn wait_for_event<T>(
    events: &mut EventStream,
    deadline: Instant,
    mut pick: impl FnMut(&TransportEvent) -> Option<T>,
) -> Result<T, WaitError> {
    loop {
        let event = match tokio::time::timeout_at(deadline, events.recv()).await {
            Err(_) => return Err(WaitError::Timeout),
            Ok(None) => {
                return Err(WaitError::Interrupted(TransportEvent::Ended {
                    reason: "event stream closed".into(),
                }));
            }
            Ok(Some(event)) => event,
        };

        if let TransportEvent::Chat { sender, text } = &event {
            tracing::debug!(%sender, %text, "chat");
        }
        if let Some(value) = pick(&event) {
            return Ok(value);
        }
        if event.is_terminal() {
            return Err(WaitError::Interrupted(event));
        }
        tracing::trace!(%event, "skipping event while waiting");
    }
}

/// Drops every event already queued on `events`, without waiting.
///
/// Used before sending a command whose reply will be awaited, so that
/// nothing received earlier is taken for that reply. A terminal event (or
/// a closed stream) stops the drain as [`WaitError::Interrupted`].
pub fn discard_pending(events: &mut EventStream) -> Result<(), WaitError> {
    loop {
        match events.try_recv() {
            Ok(event) if event.is_terminal() => return Err(WaitError::Interrupted(event)),
            Ok(event) => tracing::trace!(%event, "discarding stale event"),
            Err(TryRecvError::Empty) => return Ok(()),
            Err(TryRecvError::Disconnected) => {
                return Err(WaitError::Interrupted(TransportEvent::Ended {
                    reason: "event stream closed".into(),
                }));
            }
        }
    }
}
