// Placeholder track reconciliation.
//
// While a generation job (voiceover, subtitles) is in flight, the editor
// shows a placeholder track. The daemon's pushes know nothing about job
// completion; instead, a placeholder element counts as resolved once a
// real element of the right kind appears close enough to its start time.
// Placeholder tracks arriving from the store are stripped so a stale
// archived copy cannot resurrect an already-resolved placeholder.

use cutsync_common::types::{Element, PlaceholderKind, Track};

/// Maximum start-time distance, in seconds, at which a real element counts
/// as the result of a placeholder.
pub const RESOLUTION_WINDOW_SECS: f64 = 0.2;

/// Merge local placeholder tracks into an incoming track set.
///
/// Incoming placeholder tracks are dropped. Each local placeholder element
/// survives only while no real element within [`RESOLUTION_WINDOW_SECS`] of
/// its start time exists on a track kind that can carry its result.
/// Placeholder tracks whose elements all resolved disappear entirely.
pub fn reconcile_placeholders(local: &[Track], incoming: Vec<Track>) -> Vec<Track> {
    let mut merged: Vec<Track> =
        incoming.into_iter().filter(|track| !track.is_placeholder()).collect();

    for track in local.iter().filter(|track| track.is_placeholder()) {
        let Some(kind) = track.placeholder_kind() else { continue };
        let unresolved: Vec<Element> = track
            .elements
            .iter()
            .filter(|element| !resolved_nearby(element.start_time(), kind, &merged))
            .cloned()
            .collect();
        if !unresolved.is_empty() {
            let mut kept = track.clone();
            kept.elements = unresolved;
            merged.push(kept);
        }
    }
    merged
}

fn resolved_nearby(start: f64, kind: PlaceholderKind, tracks: &[Track]) -> bool {
    tracks
        .iter()
        .filter(|track| !track.is_placeholder())
        .filter(|track| kind.resolving_track_kinds().contains(&track.kind))
        .flat_map(|track| &track.elements)
        .any(|element| (element.start_time() - start).abs() <= RESOLUTION_WINDOW_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutsync_common::types::{
        MediaElement, TextElement, TextStyle, TrackKind, SUBTITLE_PLACEHOLDER_TRACK,
        VOICE_PLACEHOLDER_TRACK,
    };

    fn track(id: &str, name: &str, kind: TrackKind, elements: Vec<Element>) -> Track {
        Track {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            elements,
            muted: false,
            is_main: false,
        }
    }

    fn text(id: &str, start: f64) -> Element {
        Element::Text(TextElement {
            id: id.to_string(),
            content: "text".to_string(),
            start_time: start,
            duration: 3.0,
            trim_start: 0.0,
            trim_end: 0.0,
            style: TextStyle::default(),
        })
    }

    fn media(id: &str, start: f64) -> Element {
        Element::Media(MediaElement {
            id: id.to_string(),
            asset_id: format!("asset-{id}"),
            name: String::new(),
            start_time: start,
            duration: 5.0,
            trim_start: 0.0,
            trim_end: 0.0,
            muted: false,
            volume: 1.0,
        })
    }

    fn voice_placeholder(starts: &[f64]) -> Track {
        let elements = starts
            .iter()
            .enumerate()
            .map(|(i, start)| media(&format!("ph-{i}"), *start))
            .collect();
        track("ph-voice", VOICE_PLACEHOLDER_TRACK, TrackKind::Audio, elements)
    }

    #[test]
    fn nearby_audio_resolves_a_voice_placeholder() {
        let local = vec![voice_placeholder(&[10.0])];
        let incoming = vec![track("a", "Audio Track", TrackKind::Audio, vec![media("real", 10.15)])];

        let merged = reconcile_placeholders(&local, incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Audio Track");
    }

    #[test]
    fn distant_audio_keeps_the_placeholder() {
        let local = vec![voice_placeholder(&[10.0])];
        let incoming = vec![track("a", "Audio Track", TrackKind::Audio, vec![media("real", 10.5)])];

        let merged = reconcile_placeholders(&local, incoming);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|t| t.name == VOICE_PLACEHOLDER_TRACK));
    }

    #[test]
    fn subtitle_placeholder_resolves_only_on_text_tracks() {
        let placeholder = track(
            "ph-sub",
            SUBTITLE_PLACEHOLDER_TRACK,
            TrackKind::Text,
            vec![text("ph-0", 4.0)],
        );

        // Audio at the same spot doesn't count for a subtitle placeholder.
        let audio_only = vec![track("a", "Audio Track", TrackKind::Audio, vec![media("m", 4.0)])];
        let merged = reconcile_placeholders(std::slice::from_ref(&placeholder), audio_only);
        assert!(merged.iter().any(|t| t.name == SUBTITLE_PLACEHOLDER_TRACK));

        let with_text = vec![track("t", "AI Subtitles", TrackKind::Text, vec![text("s", 4.1)])];
        let merged = reconcile_placeholders(std::slice::from_ref(&placeholder), with_text);
        assert!(!merged.iter().any(|t| t.name == SUBTITLE_PLACEHOLDER_TRACK));
    }

    #[test]
    fn incoming_placeholder_tracks_are_stripped() {
        let incoming = vec![
            track("t", "Text Track", TrackKind::Text, vec![]),
            voice_placeholder(&[2.0]),
        ];
        let merged = reconcile_placeholders(&[], incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Text Track");
    }

    #[test]
    fn partially_resolved_placeholder_keeps_remaining_elements() {
        let local = vec![voice_placeholder(&[1.0, 20.0])];
        let incoming = vec![track("a", "Audio Track", TrackKind::Audio, vec![media("real", 1.1)])];

        let merged = reconcile_placeholders(&local, incoming);
        let placeholder = merged.iter().find(|t| t.name == VOICE_PLACEHOLDER_TRACK).unwrap();
        assert_eq!(placeholder.elements.len(), 1);
        assert_eq!(placeholder.elements[0].start_time(), 20.0);
    }

    #[test]
    fn reconciliation_is_stable_under_repeat() {
        let local = vec![voice_placeholder(&[10.0])];
        let incoming = vec![track("a", "Audio Track", TrackKind::Audio, vec![media("real", 30.0)])];

        let once = reconcile_placeholders(&local, incoming);
        let twice = reconcile_placeholders(&once, once.clone());
        assert_eq!(once, twice);
    }
}
