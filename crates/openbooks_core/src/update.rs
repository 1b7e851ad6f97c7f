use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::router::{route, undecodable};
use crate::{
    decode, Appearance, AppState, ConnectionState, Effect, Msg, Notification, RequestKind,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::Restore(snapshot) => {
            state.restore(snapshot);
            Vec::new()
        }
        Msg::SearchSubmitted {
            query,
            submitted_at,
        } => submit_search(&mut state, &query, submitted_at),
        Msg::DownloadClicked { book } => request_download(&mut state, book),
        Msg::HistorySelected { timestamp } => {
            if state.history().active() != timestamp && state.history_mut().select(timestamp) {
                state.mark_changed();
            }
            Vec::new()
        }
        Msg::HistoryDeleted { timestamp } => {
            if let Some(removed) = state.history_mut().delete(timestamp) {
                engine_debug!("Deleted history entry ts={}", removed.timestamp);
                state.forget_missing_searches();
                state.mark_changed();
            }
            Vec::new()
        }
        Msg::TransportConnecting { attempt } => {
            state.set_connection(ConnectionState::Connecting { attempt });
            Vec::new()
        }
        Msg::TransportOpened => {
            state.set_connection(ConnectionState::Connected);
            state.set_connected(true);
            let request = state.next_request(RequestKind::Connect);
            vec![Effect::Send(request)]
        }
        Msg::TransportClosed { reason } => {
            let announce = state.is_connected()
                || state.connection() == ConnectionState::Connecting { attempt: 0 };
            state.set_connected(false);
            state.set_connection(ConnectionState::Disconnected);
            engine_warn!("Transport closed: {}", reason);
            let mut effects = Vec::new();
            if announce {
                effects.push(Effect::Notify(
                    Notification::new(Appearance::Danger, "Unable to connect to server.")
                        .with_detail(reason),
                ));
            }
            effects.extend(release_requests(&mut state));
            effects
        }
        Msg::ReconnectScheduled { attempt, delay_ms } => {
            state.set_connection(ConnectionState::Backoff { attempt, delay_ms });
            vec![Effect::Notify(
                Notification::new(Appearance::Notify, "Reconnecting to server")
                    .with_detail(format!("attempt {attempt} in {delay_ms} ms")),
            )]
        }
        Msg::ReconnectAbandoned { attempts } => {
            if attempts == 0 {
                state.set_connection(ConnectionState::Disconnected);
                Vec::new()
            } else {
                state.set_connection(ConnectionState::GaveUp { attempts });
                vec![Effect::Notify(
                    Notification::new(Appearance::Danger, "Connection lost")
                        .with_detail(format!("Gave up after {attempts} reconnect attempts.")),
                )]
            }
        }
        Msg::FrameReceived(raw) => match decode(&raw) {
            Ok(inbound) => {
                let (next, effects) = route(state, inbound);
                state = next;
                effects
            }
            Err(err) => {
                engine_warn!("Dropping undecodable message: {} (payload_len={})", err, raw.len());
                vec![undecodable(err.to_string())]
            }
        },
        Msg::SendFailed { request_id, reason } => {
            if let Some(entry) = state.in_flight_mut().resolve_request(request_id) {
                state.mark_dirty();
                vec![Effect::Notify(
                    Notification::new(Appearance::Warning, "Download request was not sent")
                        .with_detail(format!("{}: {reason}", entry.book)),
                )]
            } else if let Some(timestamp) = state.pending_searches_mut().remove(&request_id) {
                state.history_mut().delete(Some(timestamp));
                state.mark_changed();
                vec![Effect::Notify(
                    Notification::new(Appearance::Warning, "Search request was not sent")
                        .with_detail(reason),
                )]
            } else {
                engine_info!("Request {} was not sent: {}", request_id, reason);
                Vec::new()
            }
        }
        Msg::ServersLoaded(servers) => {
            state.set_servers(servers);
            Vec::new()
        }
        Msg::LibraryLoaded(books) => {
            state.set_library(Some(books));
            Vec::new()
        }
        Msg::SideChannelFailed { what, reason } => {
            engine_warn!("Failed to load {}: {}", what, reason);
            vec![Effect::Notify(
                Notification::new(Appearance::Warning, format!("Could not load {what}"))
                    .with_detail(reason),
            )]
        }
        Msg::FileSaved { path } => vec![Effect::Notify(
            Notification::new(Appearance::Success, "Book saved").with_detail(path),
        )],
        Msg::FileSaveFailed { path, reason } => vec![Effect::Notify(
            Notification::new(Appearance::Danger, "Could not save book")
                .with_detail(format!("{path}: {reason}")),
        )],
    };

    (state, effects)
}

fn submit_search(state: &mut AppState, query: &str, submitted_at: i64) -> Vec<Effect> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    if !state.is_connected() {
        return vec![not_connected("Search was not sent.")];
    }

    let timestamp = state.history_mut().add_pending(query, submitted_at);
    state.history_mut().select(Some(timestamp));
    state.forget_missing_searches();

    let request = state.next_request(RequestKind::Search {
        query: query.to_string(),
    });
    state.pending_searches_mut().insert(request.id, timestamp);
    state.mark_changed();
    vec![Effect::Send(request)]
}

fn request_download(state: &mut AppState, book: String) -> Vec<Effect> {
    if !state.is_connected() {
        return vec![not_connected("Download was not requested.")];
    }
    if state.in_flight().is_in_flight(&book) {
        return vec![Effect::Notify(
            Notification::new(Appearance::Notify, "Download already in progress")
                .with_detail(book),
        )];
    }

    let request = state.next_request(RequestKind::Download { book: book.clone() });
    state.in_flight_mut().mark_sent(book, request.id);
    state.mark_dirty();
    vec![Effect::Send(request)]
}

/// The backend session that owned outstanding requests is gone and a new
/// one will never answer them: release downloads and drop pending searches.
fn release_requests(state: &mut AppState) -> Vec<Effect> {
    let mut effects: Vec<Effect> = state
        .in_flight_mut()
        .release_all()
        .into_iter()
        .map(|entry| {
            engine_info!("Releasing download {} ({:?})", entry.request_id, entry.book);
            Effect::Notify(
                Notification::new(Appearance::Warning, "Download was interrupted")
                    .with_detail(entry.book),
            )
        })
        .collect();

    state.pending_searches_mut().clear();
    let dropped = state.history_mut().drop_pending();
    if !dropped.is_empty() {
        engine_info!("Dropping {} searches left unanswered by the closed connection", dropped.len());
        effects.push(Effect::Notify(
            Notification::new(Appearance::Warning, "Search was interrupted").with_detail(
                dropped
                    .iter()
                    .map(|item| item.query.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
        ));
        state.mark_changed();
    } else if !effects.is_empty() {
        state.mark_dirty();
    }
    effects
}

fn not_connected(detail: &str) -> Effect {
    Effect::Notify(
        Notification::new(Appearance::Warning, "Not connected to the server.").with_detail(detail),
    )
}
