//! Logger setup for the console client.
//!
//! Terminal output shares the screen with the console, so `log_to_file`
//! moves everything to `./openbooks.log` instead.

use std::fs::File;
use std::path::PathBuf;

use engine_logging::level_from_env;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_FILE: &str = "./openbooks.log";

pub(crate) enum LogDestination {
    /// Write to ./openbooks.log in the current directory.
    File,
    /// Write to the terminal (stderr for warnings and errors).
    Terminal,
}

impl LogDestination {
    pub fn from_config(log_to_file: bool) -> Self {
        if log_to_file {
            LogDestination::File
        } else {
            LogDestination::Terminal
        }
    }
}

/// Install the global logger. `OPENBOOKS_LOG` overrides the level.
///
/// Falls back to the terminal if the log file cannot be created.
pub(crate) fn initialize(destination: LogDestination) {
    let level = level_from_env(LevelFilter::Info);
    let config = build_config();

    let logger: Box<dyn SharedLogger> = match destination {
        LogDestination::File => match create_file_logger(level, config.clone()) {
            Some(file_logger) => file_logger,
            None => terminal_logger(level, config),
        },
        LogDestination::Terminal => terminal_logger(level, config),
    };

    let _ = CombinedLogger::init(vec![logger]);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn terminal_logger(level: LevelFilter, config: Config) -> Box<dyn SharedLogger> {
    TermLogger::new(level, config, TerminalMode::Mixed, ColorChoice::Auto)
}

fn create_file_logger(level: LevelFilter, config: Config) -> Option<Box<dyn SharedLogger>> {
    let log_path = PathBuf::from(LOG_FILE);
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}
