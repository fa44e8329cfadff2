// Debounced archive scheduling.
//
// Every workspace write schedules (or reschedules) an archive for the
// owning project; the archive fires only after a quiet window with no
// further writes. Scheduling state is a plain deadline map so the policy
// is testable against an explicit clock; the async driver loop lives in
// the runtime.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::debug;

use cutsync_common::types::ProjectId;

/// Pure debounce policy: one pending deadline per project, pushed back on
/// every reschedule.
#[derive(Debug)]
pub struct ArchiveScheduler {
    window: Duration,
    pending: HashMap<ProjectId, Instant>,
}

impl ArchiveScheduler {
    pub fn new(window: Duration) -> Self {
        Self { window, pending: HashMap::new() }
    }

    /// Schedule an archive for `now + window`, replacing any earlier
    /// deadline for the same project.
    pub fn schedule(&mut self, project: ProjectId, now: Instant) {
        self.pending.insert(project, now + self.window);
    }

    /// Drop a pending archive. Returns whether one was pending.
    pub fn cancel(&mut self, project: &ProjectId) -> bool {
        self.pending.remove(project).is_some()
    }

    /// The earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return every project whose deadline has passed.
    pub fn drain_ready_at(&mut self, now: Instant) -> Vec<ProjectId> {
        let ready: Vec<ProjectId> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(project, _)| project.clone())
            .collect();
        for project in &ready {
            self.pending.remove(project);
        }
        ready
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Shared handle around the scheduler. `notify` wakes the driver loop
/// whenever the deadline set changes.
#[derive(Debug)]
pub struct Archiver {
    scheduler: Mutex<ArchiveScheduler>,
    notify: Notify,
}

impl Archiver {
    pub fn new(window: Duration) -> Self {
        Self { scheduler: Mutex::new(ArchiveScheduler::new(window)), notify: Notify::new() }
    }

    pub fn schedule(&self, project: ProjectId) {
        debug!(project = %project, "archive scheduled");
        self.scheduler.lock().unwrap().schedule(project, tokio::time::Instant::now().into_std());
        self.notify.notify_one();
    }

    pub fn cancel(&self, project: &ProjectId) -> bool {
        let cancelled = self.scheduler.lock().unwrap().cancel(project);
        if cancelled {
            debug!(project = %project, "pending archive cancelled");
            self.notify.notify_one();
        }
        cancelled
    }

    pub fn next_deadline(&self) -> Option<tokio::time::Instant> {
        self.scheduler.lock().unwrap().next_deadline().map(tokio::time::Instant::from_std)
    }

    pub fn drain_ready(&self) -> Vec<ProjectId> {
        self.scheduler.lock().unwrap().drain_ready_at(tokio::time::Instant::now().into_std())
    }

    /// Wait until the deadline set changes.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ProjectId {
        ProjectId::new(s)
    }

    #[test]
    fn nothing_ready_before_window_elapses() {
        let mut scheduler = ArchiveScheduler::new(Duration::from_millis(2_000));
        let t0 = Instant::now();
        scheduler.schedule(id("p1"), t0);

        assert!(scheduler.drain_ready_at(t0 + Duration::from_millis(1_999)).is_empty());
        assert_eq!(scheduler.drain_ready_at(t0 + Duration::from_millis(2_000)), vec![id("p1")]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn reschedule_pushes_deadline_back() {
        let mut scheduler = ArchiveScheduler::new(Duration::from_millis(2_000));
        let t0 = Instant::now();

        scheduler.schedule(id("p1"), t0);
        scheduler.schedule(id("p1"), t0 + Duration::from_millis(1_500));

        // The original deadline has passed but the rescheduled one hasn't.
        assert!(scheduler.drain_ready_at(t0 + Duration::from_millis(2_500)).is_empty());
        assert_eq!(
            scheduler.drain_ready_at(t0 + Duration::from_millis(3_500)),
            vec![id("p1")]
        );
    }

    #[test]
    fn burst_of_schedules_coalesces_to_one_fire() {
        let mut scheduler = ArchiveScheduler::new(Duration::from_millis(2_000));
        let t0 = Instant::now();
        for i in 0..10 {
            scheduler.schedule(id("p1"), t0 + Duration::from_millis(i * 100));
        }
        let ready = scheduler.drain_ready_at(t0 + Duration::from_secs(10));
        assert_eq!(ready, vec![id("p1")]);
        assert!(scheduler.drain_ready_at(t0 + Duration::from_secs(20)).is_empty());
    }

    #[test]
    fn projects_debounce_independently() {
        let mut scheduler = ArchiveScheduler::new(Duration::from_millis(2_000));
        let t0 = Instant::now();
        scheduler.schedule(id("p1"), t0);
        scheduler.schedule(id("p2"), t0 + Duration::from_millis(1_000));

        let ready = scheduler.drain_ready_at(t0 + Duration::from_millis(2_500));
        assert_eq!(ready, vec![id("p1")]);
        assert_eq!(scheduler.next_deadline(), Some(t0 + Duration::from_millis(3_000)));
    }

    #[test]
    fn cancel_drops_pending_deadline() {
        let mut scheduler = ArchiveScheduler::new(Duration::from_millis(2_000));
        let t0 = Instant::now();
        scheduler.schedule(id("p1"), t0);

        assert!(scheduler.cancel(&id("p1")));
        assert!(!scheduler.cancel(&id("p1")));
        assert!(scheduler.drain_ready_at(t0 + Duration::from_secs(10)).is_empty());
        assert!(scheduler.next_deadline().is_none());
    }

    #[tokio::test]
    async fn handle_schedule_wakes_waiter() {
        let archiver = std::sync::Arc::new(Archiver::new(Duration::from_millis(50)));
        let waiter = archiver.clone();
        let wake = tokio::spawn(async move { waiter.changed().await });

        tokio::task::yield_now().await;
        archiver.schedule(id("p1"));
        tokio::time::timeout(Duration::from_secs(1), wake).await.unwrap().unwrap();
        assert!(archiver.next_deadline().is_some());
    }
}
