//! Change-Watcher: mutation filter + debounced re-pass scheduling
//!
//! # Design Principles
//! 1. Single consumer: at most one re-pass is ever pending
//! 2. Cancel-and-reschedule: every qualifying batch pushes the deadline out
//! 3. Clock-agnostic: callers pass timestamps in milliseconds, so the same
//!    code runs against `performance.now()` in the browser and a fake clock
//!    in tests
//!
//! The browser backend maps the deadline onto `setTimeout`/`clearTimeout`;
//! natively the owner calls `poll` with the current time.

use crate::dom::MutationRecord;

// =============================================================================
// Debouncer
// =============================================================================

/// Cancel-and-reschedule deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct Debouncer {
    window_ms: f64,
    deadline: Option<f64>,
    /// Schedules that replaced a pending deadline
    coalesced: u64,
}

impl Debouncer {
    pub fn new(window_ms: u32) -> Self {
        Self {
            window_ms: f64::from(window_ms),
            deadline: None,
            coalesced: 0,
        }
    }

    pub fn window_ms(&self) -> f64 {
        self.window_ms
    }

    /// (Re)arm the deadline at `now + window`. Returns the new deadline.
    pub fn schedule(&mut self, now: f64) -> f64 {
        if self.deadline.is_some() {
            self.coalesced += 1;
        }
        let deadline = now + self.window_ms;
        self.deadline = Some(deadline);
        deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// Fire if the deadline has passed. Firing disarms the debouncer.
    pub fn poll(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

// =============================================================================
// ChangeWatcher
// =============================================================================

/// Attributes whose change means the content may have been swapped.
const WATCHED_ATTRIBUTES: [&str; 2] = ["class", "id"];

/// Decides which mutation batches warrant a re-pass and debounces them.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeWatcher {
    debouncer: Debouncer,
    observe_attributes: bool,
    armed: bool,
}

impl ChangeWatcher {
    pub fn new(debounce_ms: u32, observe_attributes: bool) -> Self {
        Self {
            debouncer: Debouncer::new(debounce_ms),
            observe_attributes,
            armed: false,
        }
    }

    /// Attribute names the observer should be filtered to.
    pub fn attribute_filter(&self) -> &'static [&'static str] {
        if self.observe_attributes {
            &WATCHED_ATTRIBUTES
        } else {
            &[]
        }
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Stop watching and drop any pending re-pass.
    pub fn disarm(&mut self) {
        self.armed = false;
        self.debouncer.cancel();
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Does this record introduce content worth scanning?
    pub fn qualifies<N>(&self, record: &MutationRecord<N>) -> bool {
        match record {
            MutationRecord::ChildList { added, .. } => *added > 0,
            MutationRecord::CharacterData { .. } => true,
            MutationRecord::Attributes { name, .. } => {
                self.observe_attributes && WATCHED_ATTRIBUTES.contains(&name.as_str())
            }
        }
    }

    /// Feed a batch. Reschedules and returns the deadline when any record
    /// qualifies; `None` when the batch is ignored.
    pub fn observe<N>(&mut self, records: &[MutationRecord<N>], now: f64) -> Option<f64> {
        if !self.armed || !records.iter().any(|r| self.qualifies(r)) {
            return None;
        }
        Some(self.debouncer.schedule(now))
    }

    /// The content area was replaced wholesale: always worth a re-pass.
    pub fn content_swapped(&mut self, now: f64) -> Option<f64> {
        self.armed.then(|| self.debouncer.schedule(now))
    }

    /// True once the quiet period after the last qualifying batch has elapsed.
    pub fn poll(&mut self, now: f64) -> bool {
        self.armed && self.debouncer.poll(now)
    }
}

// =============================================================================
// Tests
// =============================================================================
