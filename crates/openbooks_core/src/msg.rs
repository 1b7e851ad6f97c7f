use crate::{LibraryBook, PersistedSnapshot, RequestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Restore history and connection details from local storage.
    Restore(PersistedSnapshot),
    /// User submitted a search.
    SearchSubmitted { query: String, submitted_at: i64 },
    /// User clicked a result row to download it (`full` of the book).
    DownloadClicked { book: String },
    /// User picked a history entry to display, or cleared the selection.
    HistorySelected { timestamp: Option<i64> },
    /// User removed a history entry; `None` removes the oldest.
    HistoryDeleted { timestamp: Option<i64> },
    /// Supervisor started a connection attempt.
    TransportConnecting { attempt: u32 },
    /// Transport is open and ready for requests.
    TransportOpened,
    /// Transport closed or failed to open.
    TransportClosed { reason: String },
    /// Supervisor will retry after a delay.
    ReconnectScheduled { attempt: u32, delay_ms: u64 },
    /// Supervisor stopped trying.
    ReconnectAbandoned { attempts: u32 },
    /// Raw payload received from the transport.
    FrameReceived(String),
    /// A request could not be written to the transport.
    SendFailed { request_id: RequestId, reason: String },
    /// REST side-channel returned the IRC server list.
    ServersLoaded(Vec<String>),
    /// REST side-channel returned previously downloaded books.
    LibraryLoaded(Vec<LibraryBook>),
    /// A REST side-channel call failed.
    SideChannelFailed { what: String, reason: String },
    /// A downloaded file was written to disk.
    FileSaved { path: String },
    /// A downloaded file could not be fetched or written.
    FileSaveFailed { path: String, reason: String },
}
