pub mod api;
pub mod cache;
pub mod code_host;
pub mod config;
pub mod tui;
