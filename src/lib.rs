pub mod collector;
pub mod config;
pub mod constants;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod filter;
pub mod git;
pub mod graph;
pub mod host;
pub mod lifecycle;
pub mod logging;
pub mod notifier;
pub mod status;
