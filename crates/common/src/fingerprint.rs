// Track-state fingerprinting for change detection and anti-clobber.
//
// The fingerprint is a SHA-256 digest over a stable structural summary of
// the timeline (track ids, element ids, start times, text content). It is
// used two ways: to skip no-op state reports, and to decide whether an
// incoming push may replace local tracks.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::types::{ProjectId, Track};

/// Hex-encoded SHA-256 digest of the track summary.
pub type Fingerprint = String;

#[derive(Serialize)]
struct TrackSummary<'a> {
    id: &'a str,
    elements: Vec<ElementSummary<'a>>,
}

#[derive(Serialize)]
struct ElementSummary<'a> {
    id: &'a str,
    start: f64,
    content: Option<&'a str>,
}

/// Compute the fingerprint of the local timeline for one project.
pub fn track_fingerprint(project_id: &ProjectId, tracks: &[Track]) -> Fingerprint {
    let summary: Vec<TrackSummary<'_>> = tracks
        .iter()
        .map(|track| TrackSummary {
            id: &track.id,
            elements: track
                .elements
                .iter()
                .map(|element| ElementSummary {
                    id: element.id(),
                    start: element.start_time(),
                    content: element.text_content(),
                })
                .collect(),
        })
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(project_id.as_str().as_bytes());
    hasher.update(b"\0");
    // Summary serialization is infallible: no maps with non-string keys.
    let encoded = serde_json::to_vec(&summary).unwrap_or_default();
    hasher.update(&encoded);
    hex_encode(&hasher.finalize())
}

fn hex_encode(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Whether an incoming track set may replace local tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyDecision {
    /// No conflicting local edits; the incoming tracks apply.
    Apply,
    /// Local edits exist that the store has not acknowledged; keep local
    /// tracks for this event.
    SkipTracks,
}

/// The anti-clobber rule, as a pure function.
///
/// Local tracks are kept when both hold: the local fingerprint differs from
/// the last acknowledged one (unflushed local edits exist), and the incoming
/// tracks differ structurally from the local ones. When the incoming set
/// already equals the local set there is nothing to clobber, so the apply is
/// allowed through and the fingerprint re-anchors on the next report.
pub fn decide_track_apply(
    project_id: &ProjectId,
    local: &[Track],
    last_acked: &Fingerprint,
    incoming: &[Track],
) -> ApplyDecision {
    let local_fp = track_fingerprint(project_id, local);
    let has_pending_local_changes = &local_fp != last_acked;
    if !has_pending_local_changes {
        return ApplyDecision::Apply;
    }

    let incoming_differs = serde_json::to_string(incoming).unwrap_or_default()
        != serde_json::to_string(local).unwrap_or_default();
    if incoming_differs {
        ApplyDecision::SkipTracks
    } else {
        ApplyDecision::Apply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Element, TextElement, TextStyle, TrackKind};

    fn text_track(track_id: &str, content: &str, start: f64) -> Track {
        Track {
            id: track_id.to_string(),
            name: "Text Track".to_string(),
            kind: TrackKind::Text,
            elements: vec![Element::Text(TextElement {
                id: format!("{track_id}-e1"),
                content: content.to_string(),
                start_time: start,
                duration: 3.0,
                trim_start: 0.0,
                trim_end: 0.0,
                style: TextStyle::default(),
            })],
            muted: false,
            is_main: false,
        }
    }

    #[test]
    fn fingerprint_is_stable_for_equal_state() {
        let id = ProjectId::new("p1");
        let tracks = vec![text_track("t1", "hello", 1.0)];
        assert_eq!(track_fingerprint(&id, &tracks), track_fingerprint(&id, &tracks.clone()));
    }

    #[test]
    fn fingerprint_changes_with_content_and_position() {
        let id = ProjectId::new("p1");
        let base = vec![text_track("t1", "hello", 1.0)];
        let edited = vec![text_track("t1", "hello!", 1.0)];
        let moved = vec![text_track("t1", "hello", 2.0)];
        assert_ne!(track_fingerprint(&id, &base), track_fingerprint(&id, &edited));
        assert_ne!(track_fingerprint(&id, &base), track_fingerprint(&id, &moved));
    }

    #[test]
    fn fingerprint_is_project_scoped() {
        let tracks = vec![text_track("t1", "hello", 1.0)];
        assert_ne!(
            track_fingerprint(&ProjectId::new("p1"), &tracks),
            track_fingerprint(&ProjectId::new("p2"), &tracks)
        );
    }

    #[test]
    fn fingerprint_ignores_style_only_changes() {
        let id = ProjectId::new("p1");
        let mut styled = vec![text_track("t1", "hello", 1.0)];
        if let Element::Text(e) = &mut styled[0].elements[0] {
            e.style.font_size = 72.0;
        }
        let plain = vec![text_track("t1", "hello", 1.0)];
        assert_eq!(track_fingerprint(&id, &plain), track_fingerprint(&id, &styled));
    }

    // ── Anti-clobber decision ──────────────────────────────────────

    #[test]
    fn applies_when_no_pending_local_changes() {
        let id = ProjectId::new("p1");
        let local = vec![text_track("t1", "hello", 1.0)];
        let acked = track_fingerprint(&id, &local);
        let incoming = vec![text_track("t1", "remote", 1.0)];
        assert_eq!(decide_track_apply(&id, &local, &acked, &incoming), ApplyDecision::Apply);
    }

    #[test]
    fn skips_when_pending_changes_and_incoming_differs() {
        let id = ProjectId::new("p1");
        let acked_state = vec![text_track("t1", "hello", 1.0)];
        let acked = track_fingerprint(&id, &acked_state);
        // Local edit not yet reported.
        let local = vec![text_track("t1", "edited locally", 1.0)];
        // Stale remote push.
        let incoming = vec![text_track("t1", "hello", 1.0)];
        assert_eq!(decide_track_apply(&id, &local, &acked, &incoming), ApplyDecision::SkipTracks);
    }

    #[test]
    fn applies_when_incoming_equals_local_even_with_pending_changes() {
        let id = ProjectId::new("p1");
        let acked = track_fingerprint(&id, &[text_track("t1", "old", 1.0)]);
        let local = vec![text_track("t1", "edited", 1.0)];
        let incoming = local.clone();
        assert_eq!(decide_track_apply(&id, &local, &acked, &incoming), ApplyDecision::Apply);
    }
}
