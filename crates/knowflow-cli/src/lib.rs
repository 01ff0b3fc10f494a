//! Library surface of the `knowflow` binary, exposed for integration tests

pub mod app;
pub mod cli;
pub mod commands;
pub mod logging;
pub mod output;

pub use app::App;
