use std::sync::Once;

use openbooks_core::{
    update, Appearance, AppState, BookDetail, ConnectionState, Effect, Msg, Notification,
    RequestId, RequestKind, SearchStatus,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn book(full: &str) -> BookDetail {
    BookDetail {
        server: "Oatmeal".to_string(),
        author: "Frank Herbert".to_string(),
        title: "Dune".to_string(),
        format: "epub".to_string(),
        size: "1.2MB".to_string(),
        full: full.to_string(),
    }
}

fn frame(value: serde_json::Value) -> Msg {
    Msg::FrameReceived(value.to_string())
}

fn connected() -> AppState {
    let (state, _) = update(AppState::new(), Msg::TransportConnecting { attempt: 0 });
    let (state, _) = update(state, Msg::TransportOpened);
    let (state, _) = update(state, frame(json!({"type": 1, "name": "reader"})));
    state
}

fn search(state: AppState, query: &str, at: i64) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::SearchSubmitted {
            query: query.to_string(),
            submitted_at: at,
        },
    )
}

fn notifications(effects: &[Effect]) -> Vec<&Notification> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Notify(notification) => Some(notification),
            _ => None,
        })
        .collect()
}

#[test]
fn transport_open_sends_connect_request() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::TransportConnecting { attempt: 0 });
    assert_eq!(state.connection(), ConnectionState::Connecting { attempt: 0 });

    let (state, effects) = update(state, Msg::TransportOpened);
    assert!(state.is_connected());
    assert_eq!(state.connection(), ConnectionState::Connected);
    match effects.as_slice() {
        [Effect::Send(request)] => assert_eq!(request.kind, RequestKind::Connect),
        other => panic!("unexpected effects {other:?}"),
    }
}

#[test]
fn first_connect_sets_username_and_fetches_servers_once() {
    init_logging();
    let (state, _) = update(AppState::new(), Msg::TransportOpened);
    let (state, effects) = update(state, frame(json!({"type": 1, "name": "reader"})));

    assert_eq!(state.username(), Some("reader"));
    assert!(state.is_connected());
    assert!(effects.contains(&Effect::FetchServers));
    assert_eq!(notifications(&effects)[0].appearance, Appearance::Success);

    let (state, effects) = update(state, frame(json!({"type": 1, "name": "reader2"})));
    assert_eq!(state.username(), Some("reader2"));
    assert!(!effects.contains(&Effect::FetchServers));
}

#[test]
fn search_then_results_fill_the_pending_entry() {
    init_logging();
    let (state, effects) = search(connected(), "dune", 1_000);

    let t1 = state.history().iter().next().unwrap().timestamp;
    assert_eq!(t1, 1_000);
    assert!(state.history().get(t1).unwrap().is_pending());
    assert_eq!(state.history().active(), Some(t1));
    match effects.as_slice() {
        [Effect::Send(request)] => assert_eq!(
            request.kind,
            RequestKind::Search {
                query: "dune".to_string()
            }
        ),
        other => panic!("unexpected effects {other:?}"),
    }

    let (state, effects) = update(
        state,
        frame(json!({
            "type": 2,
            "books": [book("b1"), book("b2")],
            "errors": []
        })),
    );

    let item = state.history().get(t1).unwrap();
    assert_eq!(item.query, "dune");
    assert_eq!(item.results, Some(vec![book("b1"), book("b2")]));
    assert_eq!(item.errors, Some(Vec::new()));
    assert_eq!(state.history().len(), 1);
    assert_eq!(notifications(&effects).len(), 1);
}

#[test]
fn results_without_request_id_go_to_newest_pending() {
    init_logging();
    let (state, _) = search(connected(), "first", 1);
    let (state, _) = search(state, "second", 2);

    let (state, _) = update(
        state,
        frame(json!({"type": 2, "books": [book("for-first")], "errors": []})),
    );

    // Recency matching attributes the answer to the second search.
    assert_eq!(
        state.history().get(2).unwrap().results,
        Some(vec![book("for-first")])
    );
    assert!(state.history().get(1).unwrap().is_pending());
}

#[test]
fn results_with_request_id_match_exactly() {
    init_logging();
    let (state, first) = search(connected(), "first", 1);
    let (state, _) = search(state, "second", 2);
    let first_id = match first.as_slice() {
        [Effect::Send(request)] => request.id,
        other => panic!("unexpected effects {other:?}"),
    };

    let (state, _) = update(
        state,
        frame(json!({
            "type": 2,
            "requestId": first_id.0,
            "books": [book("for-first")],
            "errors": null
        })),
    );

    assert_eq!(
        state.history().get(1).unwrap().results,
        Some(vec![book("for-first")])
    );
    assert!(state.history().get(2).unwrap().is_pending());
}

#[test]
fn search_is_refused_while_disconnected() {
    init_logging();
    let (state, effects) = search(AppState::new(), "dune", 1);

    assert!(state.history().is_empty());
    let notes = notifications(&effects);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].appearance, Appearance::Warning);
}

#[test]
fn blank_search_is_ignored() {
    init_logging();
    let (state, effects) = search(connected(), "   ", 1);
    assert!(state.history().is_empty());
    assert!(effects.is_empty());
}

#[test]
fn downloads_resolve_in_send_order() {
    init_logging();
    let state = connected();
    let (state, _) = update(
        state,
        Msg::DownloadClicked {
            book: "book-A".to_string(),
        },
    );
    let (state, _) = update(
        state,
        Msg::DownloadClicked {
            book: "book-B".to_string(),
        },
    );
    assert_eq!(state.in_flight().len(), 2);

    let (state, effects) = update(
        state,
        frame(json!({"type": 3, "downloadPath": "library/whatever.epub"})),
    );

    assert_eq!(state.in_flight().books(), vec!["book-B".to_string()]);
    assert!(effects.contains(&Effect::SaveFile {
        path: "library/whatever.epub".to_string()
    }));
    assert!(effects.contains(&Effect::RefreshLibrary));
    assert_eq!(state.library(), None);
}

#[test]
fn duplicate_download_click_is_refused() {
    init_logging();
    let (state, first) = update(
        connected(),
        Msg::DownloadClicked {
            book: "book-A".to_string(),
        },
    );
    assert!(matches!(first.as_slice(), [Effect::Send(_)]));

    let (state, second) = update(
        state,
        Msg::DownloadClicked {
            book: "book-A".to_string(),
        },
    );
    assert_eq!(state.in_flight().len(), 1);
    assert!(!second.iter().any(|effect| matches!(effect, Effect::Send(_))));
}

#[test]
fn in_flight_books_are_marked_in_the_view() {
    init_logging();
    let (state, _) = search(connected(), "dune", 1);
    let (state, _) = update(
        state,
        frame(json!({"type": 2, "books": [book("b1"), book("b2")], "errors": []})),
    );
    let (state, _) = update(
        state,
        Msg::DownloadClicked {
            book: "b2".to_string(),
        },
    );

    let view = state.view();
    let active = view.active.unwrap();
    let flags: Vec<_> = active.books.iter().map(|row| row.downloading).collect();
    assert_eq!(flags, vec![false, true]);
    assert_eq!(
        view.history[0].status,
        SearchStatus::Complete {
            books: 2,
            errors: 0
        }
    );
}

#[test]
fn transport_close_flips_flag_and_warns() {
    init_logging();
    let (state, effects) = update(
        connected(),
        Msg::TransportClosed {
            reason: "connection reset".to_string(),
        },
    );

    assert!(!state.is_connected());
    assert_eq!(state.connection(), ConnectionState::Disconnected);
    let notes = notifications(&effects);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].appearance, Appearance::Danger);
    // The core never schedules its own reconnect.
    assert!(!effects.iter().any(|effect| matches!(effect, Effect::Send(_))));
}

#[test]
fn reconnect_lifecycle_reaches_give_up() {
    init_logging();
    let (state, _) = update(
        connected(),
        Msg::TransportClosed {
            reason: "eof".to_string(),
        },
    );
    let (state, _) = update(
        state,
        Msg::ReconnectScheduled {
            attempt: 1,
            delay_ms: 500,
        },
    );
    assert_eq!(
        state.connection(),
        ConnectionState::Backoff {
            attempt: 1,
            delay_ms: 500
        }
    );

    let (state, effects) = update(state, Msg::ReconnectAbandoned { attempts: 3 });
    assert_eq!(state.connection(), ConnectionState::GaveUp { attempts: 3 });
    assert_eq!(notifications(&effects)[0].appearance, Appearance::Danger);
}

#[test]
fn reconnect_disabled_settles_in_disconnected() {
    init_logging();
    let (state, _) = update(
        connected(),
        Msg::TransportClosed {
            reason: "eof".to_string(),
        },
    );
    let (state, effects) = update(state, Msg::ReconnectAbandoned { attempts: 0 });
    assert_eq!(state.connection(), ConnectionState::Disconnected);
    assert!(effects.is_empty());
}

#[test]
fn undecodable_frame_becomes_a_generic_error() {
    init_logging();
    let state = connected();
    let before = state.clone();
    let (state, effects) = update(state, Msg::FrameReceived("{oops".to_string()));

    assert_eq!(state, before);
    let notes = notifications(&effects);
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].appearance, Appearance::Danger);
}

#[test]
fn status_and_rate_limit_only_notify() {
    init_logging();
    let state = connected();
    let before = state.clone();

    let (state, effects) = update(
        state,
        frame(json!({"type": 0, "appearance": 2, "title": "Searching", "detail": "be patient"})),
    );
    assert_eq!(state, before);
    assert_eq!(
        notifications(&effects),
        vec![&Notification::new(Appearance::Warning, "Searching").with_detail("be patient")]
    );

    let (state, effects) = update(state, frame(json!({"type": 4})));
    assert_eq!(state, before);
    assert_eq!(notifications(&effects)[0].appearance, Appearance::Warning);
}

#[test]
fn send_failure_releases_download_and_drops_pending_search() {
    init_logging();
    let (state, download) = update(
        connected(),
        Msg::DownloadClicked {
            book: "book-A".to_string(),
        },
    );
    let (state, searched) = search(state, "dune", 1);
    let id_of = |effects: &[Effect]| -> RequestId {
        match effects {
            [Effect::Send(request)] => request.id,
            other => panic!("unexpected effects {other:?}"),
        }
    };

    let (state, _) = update(
        state,
        Msg::SendFailed {
            request_id: id_of(download.as_slice()),
            reason: "socket closed".to_string(),
        },
    );
    assert!(state.in_flight().is_empty());

    let (state, effects) = update(
        state,
        Msg::SendFailed {
            request_id: id_of(searched.as_slice()),
            reason: "socket closed".to_string(),
        },
    );
    assert!(state.history().is_empty());
    assert_eq!(notifications(&effects)[0].appearance, Appearance::Warning);
}

#[test]
fn deleting_active_entry_clears_selection() {
    init_logging();
    let (state, _) = search(connected(), "dune", 1);
    assert_eq!(state.history().active(), Some(1));

    let (mut state, _) = update(state, Msg::HistoryDeleted { timestamp: Some(1) });
    assert!(state.history().is_empty());
    assert_eq!(state.history().active(), None);
    assert!(state.consume_dirty());
    assert!(state.persist_pending());

    let (state, effects) = update(state, Msg::HistoryDeleted { timestamp: Some(1) });
    assert!(effects.is_empty());
    assert!(state.history().is_empty());
}

#[test]
fn reconnect_releases_requests_from_the_closed_session() {
    init_logging();
    let (state, _) = update(
        connected(),
        Msg::DownloadClicked {
            book: "book-A".to_string(),
        },
    );
    let (state, _) = search(state, "dune", 1);

    let (state, effects) = update(
        state,
        Msg::TransportClosed {
            reason: "connection reset".to_string(),
        },
    );
    assert!(state.in_flight().is_empty());
    assert!(state.history().is_empty());
    assert_eq!(state.history().active(), None);
    let warnings: Vec<_> = notifications(&effects)
        .into_iter()
        .filter(|note| note.appearance == Appearance::Warning)
        .map(|note| note.title.as_str())
        .collect();
    assert_eq!(warnings, vec!["Download was interrupted", "Search was interrupted"]);

    let (state, _) = update(state, Msg::TransportOpened);
    let (state, _) = update(state, frame(json!({"type": 1, "name": "reader"})));

    // The same book can be requested again on the new session.
    let (state, retry) = update(
        state,
        Msg::DownloadClicked {
            book: "book-A".to_string(),
        },
    );
    assert!(matches!(retry.as_slice(), [Effect::Send(_)]));
    assert_eq!(state.in_flight().books(), vec!["book-A".to_string()]);

    // A file without a request id settles the only live request.
    let (state, _) = update(
        state,
        frame(json!({"type": 3, "downloadPath": "library/book-A.epub"})),
    );
    assert!(state.in_flight().is_empty());

    // Results without a request id no longer land on the dropped search.
    let (state, _) = search(state, "emma", 2);
    let (state, _) = update(
        state,
        frame(json!({"type": 2, "books": [book("emma")], "errors": []})),
    );
    let items: Vec<_> = state.history().iter().map(|item| item.query.clone()).collect();
    assert_eq!(items, vec!["emma".to_string()]);
    assert!(!state.history().iter().any(|item| item.is_pending()));
}
