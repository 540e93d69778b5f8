// Crate root library declaration and module exports.
pub mod backend;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod controller;
pub mod model;
pub mod projection;
pub mod session;
pub mod storage;
pub mod store;

#[cfg(feature = "tui")]
pub mod tui;
