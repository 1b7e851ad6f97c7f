use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_error, engine_info};
use tokio::sync::mpsc as async_mpsc;

use crate::persist::AtomicFileWriter;
use crate::rest::RestClient;
use crate::sse::{SseSettings, SseTransport};
use crate::supervisor::{
    run_supervisor, EventSink, ReconnectPolicy, SupervisorCommand, SupervisorEvent,
};
use crate::transport::Transport;
use crate::{EngineError, EngineEvent};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub server_url: String,
    pub download_dir: PathBuf,
    pub reconnect: ReconnectPolicy,
    pub sse: SseSettings,
    pub rest_timeout: Duration,
}

impl EngineConfig {
    pub fn new(server_url: impl Into<String>, download_dir: PathBuf) -> Self {
        Self {
            server_url: server_url.into(),
            download_dir,
            reconnect: ReconnectPolicy::default(),
            sse: SseSettings::default(),
            rest_timeout: Duration::from_secs(30),
        }
    }
}

enum EngineCommand {
    Send { request_id: u64, frame: String },
    FetchServers,
    FetchLibrary,
    SaveFile { path: String },
    Shutdown,
}

struct ChannelSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SupervisorEvent) {
        let _ = self.tx.send(EngineEvent::Connection(event));
    }
}

/// Handle to the IO thread. Commands are fire-and-forget; results come back
/// as [`EngineEvent`]s polled by the UI loop.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    worker: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let transport = Arc::new(SseTransport::new(&config.server_url, config.sse.clone())?);
        let rest = RestClient::new(&config.server_url, config.rest_timeout)?;
        Self::with_transport(config, transport, rest)
    }

    pub fn with_transport(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        rest: RestClient,
    ) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let downloads = AtomicFileWriter::new(config.download_dir.clone());
        let policy = config.reconnect;

        let worker = thread::Builder::new()
            .name("openbooks-engine".to_string())
            .spawn(move || run_engine(transport, policy, rest, downloads, cmd_rx, event_tx))?;

        Ok(Self {
            cmd_tx,
            event_rx,
            worker: Some(worker),
        })
    }

    pub fn send(&self, request_id: u64, frame: String) {
        let _ = self.cmd_tx.send(EngineCommand::Send { request_id, frame });
    }

    pub fn fetch_servers(&self) {
        let _ = self.cmd_tx.send(EngineCommand::FetchServers);
    }

    pub fn fetch_library(&self) {
        let _ = self.cmd_tx.send(EngineCommand::FetchLibrary);
    }

    pub fn save_file(&self, path: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::SaveFile { path: path.into() });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Stop the supervisor and wait for the IO thread to exit.
    pub fn shutdown(&mut self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                engine_error!("Engine thread panicked during shutdown");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_engine(
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
    rest: RestClient,
    downloads: AtomicFileWriter,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            engine_error!("Failed to start async runtime: {}", err);
            return;
        }
    };

    let (sup_tx, sup_rx) = async_mpsc::unbounded_channel();
    let sink: Arc<dyn EventSink> = Arc::new(ChannelSink {
        tx: event_tx.clone(),
    });
    let supervisor = runtime.spawn(run_supervisor(transport, policy, sup_rx, sink));
    let rest = Arc::new(rest);
    let downloads = Arc::new(downloads);

    while let Ok(command) = cmd_rx.recv() {
        let event_tx = event_tx.clone();
        match command {
            EngineCommand::Send { request_id, frame } => {
                let _ = sup_tx.send(SupervisorCommand::Send { request_id, frame });
            }
            EngineCommand::FetchServers => {
                let rest = rest.clone();
                runtime.spawn(async move {
                    let result = rest.fetch_servers().await.map_err(|err| err.to_string());
                    let _ = event_tx.send(EngineEvent::ServersLoaded(result));
                });
            }
            EngineCommand::FetchLibrary => {
                let rest = rest.clone();
                runtime.spawn(async move {
                    let result = rest.fetch_library().await.map_err(|err| err.to_string());
                    let _ = event_tx.send(EngineEvent::LibraryLoaded(result));
                });
            }
            EngineCommand::SaveFile { path } => {
                let rest = rest.clone();
                let downloads = downloads.clone();
                runtime.spawn(async move {
                    let result = rest
                        .save_file(&path, &downloads)
                        .await
                        .map_err(|err| err.to_string());
                    let _ = event_tx.send(EngineEvent::FileSaved { path, result });
                });
            }
            EngineCommand::Shutdown => break,
        }
    }

    let _ = sup_tx.send(SupervisorCommand::Shutdown);
    if runtime.block_on(supervisor).is_err() {
        engine_error!("Supervisor task aborted");
    }
    engine_info!("Engine stopped");
}
