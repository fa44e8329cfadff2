// Client-side reconciliation for Cutsync sessions.
//
// A session holds the editor's local view of one project and decides, for
// every incoming sync event, what may replace local state: foreign or
// deleted projects are discarded outright, assets merge before tracks, and
// unacknowledged local edits are protected from stale pushes.

pub mod edits;
pub mod placeholder;
pub mod report;
pub mod session;
