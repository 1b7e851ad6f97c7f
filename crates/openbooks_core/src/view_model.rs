use crate::{BookDetail, ConnectionState, HistoryItem, LibraryBook, ParseError};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub connection: ConnectionState,
    pub is_connected: bool,
    pub username: Option<String>,
    pub servers: Vec<String>,
    pub library: Option<Vec<LibraryBook>>,
    pub history: Vec<HistoryRowView>,
    pub active: Option<ActiveSearchView>,
    pub in_flight: Vec<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Pending,
    Complete { books: usize, errors: usize },
}

impl SearchStatus {
    pub(crate) fn of(item: &HistoryItem) -> Self {
        if item.is_pending() {
            SearchStatus::Pending
        } else {
            SearchStatus::Complete {
                books: item.results.as_ref().map_or(0, Vec::len),
                errors: item.errors.as_ref().map_or(0, Vec::len),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRowView {
    pub timestamp: i64,
    pub query: String,
    pub status: SearchStatus,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSearchView {
    pub timestamp: i64,
    pub query: String,
    pub pending: bool,
    pub books: Vec<BookRowView>,
    pub errors: Vec<ParseError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRowView {
    pub book: BookDetail,
    pub downloading: bool,
}
