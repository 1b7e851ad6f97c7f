/// Transport lifecycle as seen by the UI.
///
/// `Disconnected -> Connecting -> Connected -> Backoff(n) -> Connecting -> ...`
/// with `GaveUp` terminal once the reconnect budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting {
        attempt: u32,
    },
    Connected,
    Backoff {
        attempt: u32,
        delay_ms: u64,
    },
    GaveUp {
        attempts: u32,
    },
}
