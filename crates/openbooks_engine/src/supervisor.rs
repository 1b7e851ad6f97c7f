//! Owns the single long-lived transport connection.
//!
//! The loop is an explicit state machine:
//! `Connecting -> Connected -> Backoff(n) -> Connecting -> ...`, ending in a
//! give-up state once the reconnect budget is spent. Requests are never
//! queued while disconnected; they are reported back as `SendFailed`.

use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio::sync::mpsc;

use crate::transport::{Connection, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Consecutive failed attempts allowed before giving up. Zero disables retries.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 8,
        }
    }
}

impl ReconnectPolicy {
    /// Drop to disconnected on the first close and stay there.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` once exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let exp = 2u32.saturating_pow(attempt - 1);
        let delay = self.base_delay.checked_mul(exp).unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// `attempt` counts failures since the last successful open; 0 is the first try.
    Connecting { attempt: u32 },
    Opened,
    Frame(String),
    Closed { reason: String },
    SendFailed { request_id: u64, reason: String },
    ReconnectScheduled { attempt: u32, delay: Duration },
    GaveUp { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorCommand {
    Send { request_id: u64, frame: String },
    Shutdown,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: SupervisorEvent);
}

enum PumpOutcome {
    Closed(String),
    Shutdown,
}

/// Run until `Shutdown` is received or the command channel closes.
pub async fn run_supervisor(
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    mut commands: mpsc::UnboundedReceiver<SupervisorCommand>,
    sink: Arc<dyn EventSink>,
) {
    let mut failures: u32 = 0;
    loop {
        sink.emit(SupervisorEvent::Connecting { attempt: failures });
        match transport.connect().await {
            Ok(connection) => {
                engine_info!("Transport connected");
                failures = 0;
                sink.emit(SupervisorEvent::Opened);
                match pump(connection, &mut commands, sink.as_ref()).await {
                    PumpOutcome::Closed(reason) => {
                        engine_warn!("Transport closed: {}", reason);
                        sink.emit(SupervisorEvent::Closed { reason });
                    }
                    PumpOutcome::Shutdown => {
                        engine_info!("Supervisor shutting down");
                        return;
                    }
                }
            }
            Err(err) => {
                engine_warn!("Connect attempt {} failed: {}", failures, err);
                sink.emit(SupervisorEvent::Closed {
                    reason: err.to_string(),
                });
            }
        }

        failures += 1;
        match policy.delay_for(failures) {
            Some(delay) => {
                engine_info!("Reconnect attempt {} in {:?}", failures, delay);
                sink.emit(SupervisorEvent::ReconnectScheduled {
                    attempt: failures,
                    delay,
                });
                if !idle(&mut commands, sink.as_ref(), Some(delay)).await {
                    return;
                }
            }
            None => {
                let attempts = failures - 1;
                engine_warn!("Giving up on transport after {} reconnect attempts", attempts);
                sink.emit(SupervisorEvent::GaveUp { attempts });
                idle(&mut commands, sink.as_ref(), None).await;
                return;
            }
        }
    }
}

async fn pump(
    connection: Connection,
    commands: &mut mpsc::UnboundedReceiver<SupervisorCommand>,
    sink: &dyn EventSink,
) -> PumpOutcome {
    let Connection {
        mut frames,
        mut requests,
    } = connection;
    loop {
        tokio::select! {
            frame = frames.next_frame() => match frame {
                Some(Ok(text)) => sink.emit(SupervisorEvent::Frame(text)),
                Some(Err(err)) => return PumpOutcome::Closed(err.to_string()),
                None => return PumpOutcome::Closed("stream ended by server".to_string()),
            },
            command = commands.recv() => match command {
                Some(SupervisorCommand::Send { request_id, frame }) => {
                    engine_debug!("Sending request {} ({} bytes)", request_id, frame.len());
                    if let Err(err) = requests.send(&frame).await {
                        engine_warn!("Request {} failed: {}", request_id, err);
                        sink.emit(SupervisorEvent::SendFailed {
                            request_id,
                            reason: err.to_string(),
                        });
                    }
                }
                Some(SupervisorCommand::Shutdown) | None => return PumpOutcome::Shutdown,
            },
        }
    }
}

/// Wait out `delay` (forever when `None`) while refusing sends.
/// Returns false if shutdown was requested.
async fn idle(
    commands: &mut mpsc::UnboundedReceiver<SupervisorCommand>,
    sink: &dyn EventSink,
    delay: Option<Duration>,
) -> bool {
    let wait = async {
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(wait);

    loop {
        tokio::select! {
            _ = &mut wait => return true,
            command = commands.recv() => match command {
                Some(SupervisorCommand::Send { request_id, .. }) => {
                    sink.emit(SupervisorEvent::SendFailed {
                        request_id,
                        reason: "not connected".to_string(),
                    });
                }
                Some(SupervisorCommand::Shutdown) | None => return false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_and_cap() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            max_attempts: 4,
        };
        assert_eq!(policy.delay_for(0), None);
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_millis(350)));
        assert_eq!(policy.delay_for(4), Some(Duration::from_millis(350)));
        assert_eq!(policy.delay_for(5), None);
    }

    #[test]
    fn disabled_policy_never_retries() {
        assert_eq!(ReconnectPolicy::disabled().delay_for(1), None);
    }

    #[test]
    fn huge_attempts_saturate_instead_of_overflowing() {
        let policy = ReconnectPolicy {
            max_attempts: u32::MAX,
            ..ReconnectPolicy::default()
        };
        assert_eq!(policy.delay_for(200), Some(policy.max_delay));
    }
}
