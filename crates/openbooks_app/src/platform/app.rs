use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use engine_logging::{engine_info, engine_warn};
use openbooks_core::{update, AppState, ConnectionState, Effect, Msg, Throttle};
use openbooks_engine::FileStorage;

use super::config::{self, ClientConfig};
use super::console::{self, Command};
use super::effects::EffectRunner;
use super::logging::{self, LogDestination};
use super::persistence;

const TICK_INTERVAL: Duration = Duration::from_millis(75);

enum Input {
    Line(String),
    Tick,
    Eof,
}

pub fn run_app() -> anyhow::Result<()> {
    let config_path = config::config_path(std::env::args());
    let loaded = config::load(&config_path);
    let config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => ClientConfig::default(),
    };

    logging::initialize(LogDestination::from_config(config.log_to_file));
    match loaded {
        Ok(Some(_)) => engine_info!("Loaded config from {}", config_path.display()),
        Ok(None) => engine_info!("No config at {}; using defaults", config_path.display()),
        Err(err) => engine_warn!("{:#}; using defaults", err),
    }

    let mut storage = FileStorage::new(config.storage_dir.clone());
    let loaded = persistence::load_snapshot(&mut storage);
    let persist = loaded.writable;
    let snapshot = loaded.snapshot;

    let mut runner = EffectRunner::new(config.engine_config())?;
    let mut session = Session {
        state: AppState::new(),
        runner: &runner,
        last_connection: ConnectionState::Disconnected,
        shown_results: None,
    };
    session.dispatch(Msg::Restore(snapshot));

    let (input_tx, input_rx) = mpsc::channel::<Input>();
    spawn_stdin_reader(input_tx.clone());
    // Background tick drains engine events and drives persistence.
    thread::spawn(move || {
        while input_tx.send(Input::Tick).is_ok() {
            thread::sleep(TICK_INTERVAL);
        }
    });

    println!("OpenBooks console. Type `help` for commands.");
    let mut throttle = Throttle::new(config.persist_interval());

    while let Ok(input) = input_rx.recv() {
        match input {
            Input::Tick => {
                for msg in session.runner.drain() {
                    session.dispatch(msg);
                }
                if persist && session.state.persist_pending() && throttle.ready(Instant::now()) {
                    let snapshot = session.state.take_snapshot();
                    persistence::save_snapshot(&mut storage, &snapshot);
                }
            }
            Input::Line(line) => match console::parse(&line) {
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => session.execute(command),
                Ok(None) => {}
                Err(usage) => println!("{usage}"),
            },
            Input::Eof => break,
        }
    }

    if persist && session.state.persist_pending() {
        let snapshot = session.state.take_snapshot();
        persistence::save_snapshot(&mut storage, &snapshot);
    }
    drop(session);
    runner.shutdown();
    engine_info!("Exited cleanly");
    Ok(())
}

fn spawn_stdin_reader(tx: mpsc::Sender<Input>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(Input::Line(line)).is_err() {
                        return;
                    }
                }
                Err(err) => {
                    engine_warn!("Failed to read stdin: {}", err);
                    break;
                }
            }
        }
        let _ = tx.send(Input::Eof);
    });
}

struct Session<'a> {
    state: AppState,
    runner: &'a EffectRunner,
    last_connection: ConnectionState,
    shown_results: Option<i64>,
}

impl Session<'_> {
    fn dispatch(&mut self, msg: Msg) {
        let (state, effects) = update(std::mem::take(&mut self.state), msg);
        self.state = state;
        self.runner.run(effects);

        if self.state.consume_dirty() {
            let connection = self.state.connection();
            if connection != self.last_connection {
                self.last_connection = connection;
                println!("-- {}", console::render_connection(connection));
            }
            // Print each completed search once, when its results arrive.
            if let Some(active) = self.state.view().active {
                if !active.pending && self.shown_results != Some(active.timestamp) {
                    self.shown_results = Some(active.timestamp);
                    println!("{}", console::render_results(&active));
                }
            }
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Search(query) => self.dispatch(Msg::SearchSubmitted {
                query,
                submitted_at: Utc::now().timestamp_millis(),
            }),
            Command::Download(row) => {
                let view = self.state.view();
                let book = view
                    .active
                    .as_ref()
                    .zip(row.checked_sub(1))
                    .and_then(|(active, index)| active.books.get(index))
                    .map(|result| result.book.full.clone());
                match book {
                    Some(book) => self.dispatch(Msg::DownloadClicked { book }),
                    None => println!("No result row {row}; use `show <n>` to pick a search."),
                }
            }
            Command::Show(0) => self.dispatch(Msg::HistorySelected { timestamp: None }),
            Command::Show(n) => match self.history_timestamp(n) {
                Some(timestamp) => {
                    self.shown_results = Some(timestamp);
                    self.dispatch(Msg::HistorySelected {
                        timestamp: Some(timestamp),
                    });
                    if let Some(active) = self.state.view().active {
                        println!("{}", console::render_results(&active));
                    }
                }
                None => println!("No history entry {n}."),
            },
            Command::History => println!("{}", console::render_history(&self.state.view())),
            Command::Delete(None) => self.dispatch(Msg::HistoryDeleted { timestamp: None }),
            Command::Delete(Some(n)) => match self.history_timestamp(n) {
                Some(timestamp) => self.dispatch(Msg::HistoryDeleted {
                    timestamp: Some(timestamp),
                }),
                None => println!("No history entry {n}."),
            },
            Command::Library => match self.state.library() {
                Some(books) => println!("{}", console::render_library(Some(books))),
                None => {
                    println!("{}", console::render_library(None));
                    self.runner.run(vec![Effect::RefreshLibrary]);
                }
            },
            Command::Servers => {
                println!("{}", console::render_servers(self.state.servers()));
                if self.state.servers().is_empty() {
                    self.runner.run(vec![Effect::FetchServers]);
                }
            }
            Command::Status => println!("{}", console::render_status(&self.state.view())),
            Command::Help => println!("{}", console::HELP),
            Command::Quit => {}
        }
    }

    /// Timestamp of the 1-based history row `n`, newest first.
    fn history_timestamp(&self, n: usize) -> Option<i64> {
        n.checked_sub(1)
            .and_then(|index| self.state.history().iter().nth(index))
            .map(|item| item.timestamp)
    }
}
