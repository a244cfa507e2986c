//! Duplicate-request gate.
//!
//! Hosts occasionally deliver the same send request twice in quick
//! succession (retriggered automations, double events). The gate remembers
//! the previous message and its arrival time and drops exact repeats that
//! arrive within the window.

use crate::message::Message;
use std::time::{Duration, Instant};

/// Repeats arriving closer together than this are dropped.
pub const DEDUP_WINDOW: Duration = Duration::from_millis(1000);

/// Memo of the last admitted request.
#[derive(Debug, Default)]
pub struct DedupGate {
    last: Option<(Instant, String)>,
}

impl DedupGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or drop a message. Returns `false` when the message is an
    /// exact repeat of the previous one within [`DEDUP_WINDOW`].
    ///
    /// On admission the memo is overwritten before any further processing,
    /// so a failed send still advances it. The first message is always
    /// admitted.
    pub fn admit(&mut self, message: &Message) -> bool {
        self.admit_at(message, Instant::now())
    }

    pub fn admit_at(&mut self, message: &Message, now: Instant) -> bool {
        let payload = message.canonical_json();

        if let Some((last_at, last_payload)) = &self.last {
            let elapsed = now.saturating_duration_since(*last_at);
            if *last_payload == payload && elapsed < DEDUP_WINDOW {
                log::debug!(
                    "Filter out double message [first was for {}ms]: {}",
                    elapsed.as_millis(),
                    payload
                );
                return false;
            }
        }

        self.last = Some((now, payload));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message() -> Message {
        Message::coerce(json!({"to": "a@b.com", "subject": "x", "text": "y"})).unwrap()
    }

    #[test]
    fn first_message_is_admitted() {
        let mut gate = DedupGate::new();
        assert!(gate.admit_at(&message(), Instant::now()));
    }

    #[test]
    fn repeat_within_window_is_dropped() {
        let mut gate = DedupGate::new();
        let start = Instant::now();

        assert!(gate.admit_at(&message(), start));
        assert!(!gate.admit_at(&message(), start + Duration::from_millis(500)));
    }

    #[test]
    fn repeat_at_or_past_window_is_admitted() {
        let mut gate = DedupGate::new();
        let start = Instant::now();

        assert!(gate.admit_at(&message(), start));
        assert!(gate.admit_at(&message(), start + Duration::from_millis(1200)));

        let mut gate = DedupGate::new();
        assert!(gate.admit_at(&message(), start));
        assert!(gate.admit_at(&message(), start + DEDUP_WINDOW));
    }

    #[test]
    fn different_payload_is_admitted() {
        let mut gate = DedupGate::new();
        let start = Instant::now();

        assert!(gate.admit_at(&message(), start));
        let other = Message::coerce(json!({"to": "a@b.com", "text": "z"})).unwrap();
        assert!(gate.admit_at(&other, start + Duration::from_millis(10)));
    }

    #[test]
    fn memo_advances_on_admission() {
        let mut gate = DedupGate::new();
        let start = Instant::now();

        assert!(gate.admit_at(&message(), start));
        // Admitted again past the window; the memo now points at t+1200.
        assert!(gate.admit_at(&message(), start + Duration::from_millis(1200)));
        // A repeat 500ms after the *second* copy is a duplicate again.
        assert!(!gate.admit_at(&message(), start + Duration::from_millis(1700)));
    }
}
