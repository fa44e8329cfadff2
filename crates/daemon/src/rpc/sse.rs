// Live sync subscription.
//
// Each subscriber gets a `connected` handshake, then the current workspace
// document as an immediate `snapshot_update`, then the ordered event feed.
// Subscription happens before the initial read, so a write racing the
// handshake is re-delivered by the feed rather than lost.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::Utc;
use futures_util::stream::{self, Stream, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use cutsync_common::protocol::{SyncEvent, EVENT_CONNECTED};

use crate::runtime::SyncState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

pub async fn subscribe(
    State(state): State<Arc<SyncState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.hub.subscribe();
    debug!(subscribers = state.hub.subscriber_count(), "sync subscriber connected");

    let mut initial = vec![(
        EVENT_CONNECTED,
        json!({ "connected": true, "timestamp": Utc::now().timestamp_millis() }).to_string(),
    )];
    // The freshest copy of the open project, not necessarily the workspace
    // file: an external tool may have left a newer archive behind.
    let best = state
        .workspace
        .project_id()
        .and_then(|id| state.load_project(id.as_str()))
        .map(|resolution| resolution.snapshot)
        .or_else(|| state.workspace.read());
    if let Some(snapshot) = best {
        if let Some(rendered) = render(&SyncEvent::SnapshotUpdate(Box::new(snapshot))) {
            initial.push(rendered);
        }
    }

    let live = BroadcastStream::new(receiver).filter_map(|result| async move {
        match result {
            Ok(event) => render(&event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "sync subscriber lagged, events dropped");
                None
            }
        }
    });

    let events = stream::iter(initial)
        .chain(live)
        .map(|(name, data)| Ok(Event::default().event(name).data(data)));
    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
}

/// SSE event name + data for one sync event. Events that fail to encode
/// are dropped with a warning rather than tearing down the stream.
fn render(event: &SyncEvent) -> Option<(&'static str, String)> {
    match event.payload() {
        Ok(payload) => Some((event.event_name(), payload.to_string())),
        Err(error) => {
            warn!(?error, "failed to encode sync event");
            None
        }
    }
}
