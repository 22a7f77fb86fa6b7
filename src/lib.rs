//! Library entry for pixi-browse exposing the index engine, the session state
//! machine and the runtime for the binary and integration tests.

pub mod app;
pub mod args;
pub mod config;
pub mod events;
pub mod index;
pub mod state;
pub mod ui;
pub mod util;
