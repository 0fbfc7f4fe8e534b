/// Shared library for the Social Downloader client.
///
/// Holds the backend wire protocol, the displayed-progress state machine and
/// the orchestrator that drives a download from start to settled.
pub mod api_protocol;
pub mod backend;
pub mod config;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod progress;
