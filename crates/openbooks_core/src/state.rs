use std::collections::BTreeMap;

use engine_logging::engine_info;

use crate::view_model::{
    ActiveSearchView, AppViewModel, BookRowView, HistoryRowView, SearchStatus,
};
use crate::{
    ConnectionSnapshot, ConnectionState, HistoryStore, InFlightTracker, LibraryBook,
    PersistedSnapshot, Request, RequestId, RequestKind,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    connection: ConnectionState,
    is_connected: bool,
    username: Option<String>,
    servers: Vec<String>,
    servers_requested: bool,
    library: Option<Vec<LibraryBook>>,
    history: HistoryStore,
    in_flight: InFlightTracker,
    /// Outstanding search requests and the history entry each one fills.
    pending_searches: BTreeMap<RequestId, i64>,
    next_request_id: u64,
    dirty: bool,
    persist_pending: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn library(&self) -> Option<&[LibraryBook]> {
        self.library.as_deref()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn in_flight(&self) -> &InFlightTracker {
        &self.in_flight
    }

    pub fn view(&self) -> AppViewModel {
        let history = self
            .history
            .iter()
            .map(|item| HistoryRowView {
                timestamp: item.timestamp,
                query: item.query.clone(),
                status: SearchStatus::of(item),
                active: self.history.active() == Some(item.timestamp),
            })
            .collect();

        let active = self.history.active_item().map(|item| ActiveSearchView {
            timestamp: item.timestamp,
            query: item.query.clone(),
            pending: item.is_pending(),
            books: item
                .results
                .iter()
                .flatten()
                .map(|book| BookRowView {
                    downloading: self.in_flight.is_in_flight(&book.full),
                    book: book.clone(),
                })
                .collect(),
            errors: item.errors.clone().unwrap_or_default(),
        });

        AppViewModel {
            connection: self.connection,
            is_connected: self.is_connected,
            username: self.username.clone(),
            servers: self.servers.clone(),
            library: self.library.clone(),
            history,
            active,
            in_flight: self.in_flight.books(),
            dirty: self.dirty,
        }
    }

    /// Returns whether the view changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Whether persisted state changed since the last snapshot was taken.
    pub fn persist_pending(&self) -> bool {
        self.persist_pending
    }

    /// Take a snapshot for local storage and clear the pending flag.
    pub fn take_snapshot(&mut self) -> PersistedSnapshot {
        self.persist_pending = false;
        PersistedSnapshot {
            history: self.history.to_vec(),
            active: self.history.active(),
            connection: ConnectionSnapshot {
                username: self.username.clone(),
                servers: self.servers.clone(),
            },
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn mark_changed(&mut self) {
        self.dirty = true;
        self.persist_pending = true;
    }

    pub(crate) fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    pub(crate) fn in_flight_mut(&mut self) -> &mut InFlightTracker {
        &mut self.in_flight
    }

    pub(crate) fn pending_searches_mut(&mut self) -> &mut BTreeMap<RequestId, i64> {
        &mut self.pending_searches
    }

    /// Drop correlations whose history entry has been evicted or deleted.
    pub(crate) fn forget_missing_searches(&mut self) {
        let history = &self.history;
        self.pending_searches
            .retain(|_, timestamp| history.get(*timestamp).is_some());
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionState) {
        if self.connection != connection {
            self.connection = connection;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_connected(&mut self, connected: bool) {
        if self.is_connected != connected {
            self.is_connected = connected;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_username(&mut self, name: String) {
        if self.username.as_deref() != Some(name.as_str()) {
            self.username = Some(name);
            self.mark_changed();
        }
    }

    pub(crate) fn set_servers(&mut self, servers: Vec<String>) {
        if self.servers != servers {
            self.servers = servers;
            self.mark_changed();
        }
    }

    pub(crate) fn set_library(&mut self, library: Option<Vec<LibraryBook>>) {
        self.library = library;
        self.mark_dirty();
    }

    /// Returns true only the first time it is called.
    pub(crate) fn claim_server_request(&mut self) -> bool {
        !std::mem::replace(&mut self.servers_requested, true)
    }

    pub(crate) fn next_request(&mut self, kind: RequestKind) -> Request {
        self.next_request_id += 1;
        Request {
            id: RequestId(self.next_request_id),
            kind,
        }
    }

    pub(crate) fn restore(&mut self, snapshot: PersistedSnapshot) {
        let stored = snapshot.history.len();
        let history: Vec<_> = snapshot
            .history
            .into_iter()
            .filter(|item| !item.is_pending())
            .collect();
        if history.len() != stored {
            engine_info!(
                "Dropped {} pending searches left over from a previous session",
                stored - history.len()
            );
            self.persist_pending = true;
        }
        self.history = HistoryStore::from_parts(history, snapshot.active);
        self.username = snapshot.connection.username;
        self.servers = snapshot.connection.servers;
        self.pending_searches.clear();
        self.dirty = true;
    }
}
