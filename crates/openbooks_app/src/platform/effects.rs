use engine_logging::{engine_debug, engine_warn};
use openbooks_core::{encode, Effect, LibraryBook, Msg, Notification, RequestId};
use openbooks_engine::{EngineConfig, EngineEvent, EngineHandle, LibraryEntry, SupervisorEvent};

use super::console;

/// Carries core effects out to the engine and engine events back in as messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        let engine = EngineHandle::new(config)?;
        Ok(Self { engine })
    }

    pub fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(request) => {
                    let frame = encode(&request);
                    engine_debug!("Send request {} len={}", request.id, frame.len());
                    self.engine.send(request.id.0, frame);
                }
                Effect::Notify(notification) => show(&notification),
                Effect::SaveFile { path } => self.engine.save_file(path),
                Effect::RefreshLibrary => self.engine.fetch_library(),
                Effect::FetchServers => self.engine.fetch_servers(),
            }
        }
    }

    /// Messages for every engine event received since the last call.
    pub fn drain(&self) -> Vec<Msg> {
        std::iter::from_fn(|| self.engine.try_recv())
            .map(map_event)
            .collect()
    }

    pub fn shutdown(&mut self) {
        self.engine.shutdown();
    }
}

fn show(notification: &Notification) {
    println!("{}", console::render_notification(notification));
}

pub(crate) fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::Connection(event) => map_connection(event),
        EngineEvent::ServersLoaded(Ok(list)) => Msg::ServersLoaded(list.all()),
        EngineEvent::ServersLoaded(Err(reason)) => Msg::SideChannelFailed {
            what: "server list".to_string(),
            reason,
        },
        EngineEvent::LibraryLoaded(Ok(entries)) => {
            Msg::LibraryLoaded(entries.into_iter().map(map_library_entry).collect())
        }
        EngineEvent::LibraryLoaded(Err(reason)) => Msg::SideChannelFailed {
            what: "library".to_string(),
            reason,
        },
        EngineEvent::FileSaved {
            result: Ok(saved), ..
        } => Msg::FileSaved {
            path: saved.display().to_string(),
        },
        EngineEvent::FileSaved {
            path,
            result: Err(reason),
        } => {
            engine_warn!("Saving {} failed: {}", path, reason);
            Msg::FileSaveFailed { path, reason }
        }
    }
}

fn map_connection(event: SupervisorEvent) -> Msg {
    match event {
        SupervisorEvent::Connecting { attempt } => Msg::TransportConnecting { attempt },
        SupervisorEvent::Opened => Msg::TransportOpened,
        SupervisorEvent::Frame(raw) => Msg::FrameReceived(raw),
        SupervisorEvent::Closed { reason } => Msg::TransportClosed { reason },
        SupervisorEvent::SendFailed { request_id, reason } => Msg::SendFailed {
            request_id: RequestId(request_id),
            reason,
        },
        SupervisorEvent::ReconnectScheduled { attempt, delay } => Msg::ReconnectScheduled {
            attempt,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        },
        SupervisorEvent::GaveUp { attempts } => Msg::ReconnectAbandoned { attempts },
    }
}

fn map_library_entry(entry: LibraryEntry) -> LibraryBook {
    LibraryBook {
        name: entry.name,
        download_link: entry.download_link,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openbooks_engine::ServerList;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn supervisor_events_become_transport_messages() {
        assert_eq!(
            map_event(EngineEvent::Connection(SupervisorEvent::ReconnectScheduled {
                attempt: 2,
                delay: Duration::from_millis(1500),
            })),
            Msg::ReconnectScheduled {
                attempt: 2,
                delay_ms: 1500
            }
        );
        assert_eq!(
            map_event(EngineEvent::Connection(SupervisorEvent::SendFailed {
                request_id: 9,
                reason: "not connected".into(),
            })),
            Msg::SendFailed {
                request_id: RequestId(9),
                reason: "not connected".into()
            }
        );
    }

    #[test]
    fn side_channel_results_are_mapped() {
        let servers = ServerList {
            elevated_users: vec!["Oatmeal".into()],
            regular_users: vec!["Ook".into()],
        };
        assert_eq!(
            map_event(EngineEvent::ServersLoaded(Ok(servers))),
            Msg::ServersLoaded(vec!["Oatmeal".into(), "Ook".into()])
        );
        assert_eq!(
            map_event(EngineEvent::LibraryLoaded(Err("timeout".into()))),
            Msg::SideChannelFailed {
                what: "library".into(),
                reason: "timeout".into()
            }
        );
        assert_eq!(
            map_event(EngineEvent::FileSaved {
                path: "library/Dune.epub".into(),
                result: Ok(PathBuf::from("books").join("Dune.epub")),
            }),
            Msg::FileSaved {
                path: PathBuf::from("books").join("Dune.epub").display().to_string()
            }
        );
    }
}
