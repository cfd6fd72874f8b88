//! Session id generation.
//!
//! Ids are derived from the wall clock in nanoseconds but never repeat: if
//! two connections are accepted within the same nanosecond, or the clock
//! steps backwards, the generator hands out `last + 1` instead.

use overmind_kit::current_timestamp_nanos;
use std::sync::atomic::{AtomicI64, Ordering};

/// Strictly increasing id source.
#[derive(Debug, Default)]
pub struct SessionIdGenerator {
    last: AtomicI64,
}

impl SessionIdGenerator {
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Returns an id greater than every id returned before.
    pub fn next_id(&self) -> i64 {
        let now = current_timestamp_nanos();
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        now.max(previous.saturating_add(1))
    }
}

static PROCESS_IDS: SessionIdGenerator = SessionIdGenerator::new();

/// Next session id for this process. Shared by every listener.
pub fn next_session_id() -> i64 {
    PROCESS_IDS.next_id()
}
