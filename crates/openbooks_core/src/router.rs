use engine_logging::{engine_debug, engine_warn};

use crate::{
    Appearance, AppState, ConnectionState, Effect, Event, Inbound, Notification, RequestId,
};

/// Apply one decoded server message to state.
///
/// Responses that echo a request id are matched exactly. Without one the
/// search result goes to the newest pending search and a finished download
/// releases the oldest in-flight request.
pub fn route(mut state: AppState, inbound: Inbound) -> (AppState, Vec<Effect>) {
    let Inbound {
        event,
        request_id,
        notice,
    } = inbound;

    let effects = match event {
        Event::Status => vec![Effect::Notify(
            notice.into_notification(Appearance::Notify, "Status update"),
        )],
        Event::Connected { name } => {
            let notification = notice
                .into_notification(Appearance::Success, "Welcome, connection established.")
                .or_detail(format!("IRC username {name}"));
            state.set_username(name);
            state.set_connected(true);
            state.set_connection(ConnectionState::Connected);

            let mut effects = vec![Effect::Notify(notification)];
            if state.claim_server_request() {
                effects.push(Effect::FetchServers);
            }
            effects
        }
        Event::SearchResult { books, errors } => {
            let detail = format!("{} books, {} unparsed lines", books.len(), errors.len());
            match correlate_search(&mut state, request_id) {
                Some(timestamp) => {
                    if state.history_mut().resolve(timestamp, books, errors) {
                        state.mark_changed();
                    } else {
                        engine_warn!(
                            "Search results for ts={} dropped: entry gone or already resolved",
                            timestamp
                        );
                    }
                }
                None => engine_warn!("Search results arrived with no pending search"),
            }
            vec![Effect::Notify(
                notice
                    .into_notification(Appearance::Success, "Search results received")
                    .or_detail(detail),
            )]
        }
        Event::DownloadReady { path } => {
            match correlate_download(&mut state, request_id) {
                Some(book) => engine_debug!("Download ready for {:?} at {}", book, path),
                None => engine_warn!("Download at {} matches no in-flight request", path),
            }
            state.set_library(None);
            vec![
                Effect::Notify(
                    notice
                        .into_notification(Appearance::Success, "Book file received")
                        .or_detail(path.clone()),
                ),
                Effect::SaveFile { path },
                Effect::RefreshLibrary,
            ]
        }
        Event::RateLimited => vec![Effect::Notify(
            notice
                .into_notification(Appearance::Warning, "Rate limited")
                .or_detail("The server is throttling requests. Wait before trying again."),
        )],
    };

    (state, effects)
}

/// Generic notification for payloads the codec rejected.
pub(crate) fn undecodable(reason: String) -> Effect {
    Effect::Notify(
        Notification::new(Appearance::Danger, "Unknown message received from server.")
            .with_detail(reason),
    )
}

fn correlate_search(state: &mut AppState, request_id: Option<RequestId>) -> Option<i64> {
    if let Some(id) = request_id {
        let timestamp = state.pending_searches_mut().remove(&id);
        if timestamp.is_none() {
            engine_warn!("Search response {} matches no outstanding request", id);
        }
        return timestamp;
    }

    let candidates = state.history().pending_count();
    if candidates > 1 {
        engine_warn!(
            "Ambiguous search response: {} searches pending, attributing to the newest",
            candidates
        );
    }
    let timestamp = state.history().most_recent_pending()?;
    state
        .pending_searches_mut()
        .retain(|_, pending| *pending != timestamp);
    Some(timestamp)
}

fn correlate_download(state: &mut AppState, request_id: Option<RequestId>) -> Option<String> {
    let entry = match request_id {
        Some(id) => state.in_flight_mut().resolve_request(id),
        None => {
            if state.in_flight().len() > 1 {
                engine_warn!(
                    "Ambiguous download response: {} requests in flight, releasing the oldest",
                    state.in_flight().len()
                );
            }
            state.in_flight_mut().mark_resolved()
        }
    }?;
    state.mark_dirty();
    Some(entry.book)
}
