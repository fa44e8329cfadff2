// Debounced local-state reporting.
//
// Local edits are pushed back to the daemon after a quiet period rather
// than on every keystroke. The gate tracks the last fingerprint the daemon
// acknowledged and holds a trailing deadline; callers feed it an explicit
// clock so the policy is testable without sleeping.

use std::time::{Duration, Instant};

use cutsync_common::fingerprint::{track_fingerprint, Fingerprint};
use cutsync_common::types::{ProjectId, Track};

pub const REPORT_DEBOUNCE: Duration = Duration::from_secs(3);

#[derive(Debug)]
pub struct ReportGate {
    project_id: ProjectId,
    last_reported: Fingerprint,
    due: Option<Instant>,
    debounce: Duration,
}

impl ReportGate {
    pub fn new(project_id: ProjectId) -> Self {
        Self::with_debounce(project_id, REPORT_DEBOUNCE)
    }

    pub fn with_debounce(project_id: ProjectId, debounce: Duration) -> Self {
        let last_reported = track_fingerprint(&project_id, &[]);
        Self { project_id, last_reported, due: None, debounce }
    }

    /// Note the current local state. A real change (re)arms the trailing
    /// deadline; a state matching the last report disarms it.
    pub fn note_change(&mut self, tracks: &[Track], now: Instant) {
        if track_fingerprint(&self.project_id, tracks) == self.last_reported {
            self.due = None;
        } else {
            self.due = Some(now + self.debounce);
        }
    }

    /// Whether a report should be sent now.
    pub fn should_fire(&self, now: Instant) -> bool {
        self.due.is_some_and(|due| due <= now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.due
    }

    /// Record that the given state was reported and acknowledged.
    pub fn mark_reported(&mut self, tracks: &[Track]) {
        self.last_reported = track_fingerprint(&self.project_id, tracks);
        self.due = None;
    }

    /// The fingerprint of the last acknowledged report.
    pub fn acked_fingerprint(&self) -> &Fingerprint {
        &self.last_reported
    }
}
