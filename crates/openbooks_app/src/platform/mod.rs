//! Console front end: config, logging, persistence and the effect runner
//! around the pure core.
mod app;
mod config;
mod console;
mod effects;
mod logging;
mod persistence;

pub use app::run_app;
