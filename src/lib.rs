//! PriorityDesk: feature prioritization across Linear, Featurebase and Zendesk.
//!
//! Backlog issues are correlated with community posts and support tickets,
//! deduplicated, scored against per-stage weights (with AI-suggested factor
//! scores cached per configuration), and optionally written back to Linear.

pub mod ai_cache;
pub mod commands;
pub mod config;
pub mod correlate;
pub mod duplicates;
pub mod error;
pub mod featurebase;
pub mod intelligence;
pub mod jobs;
pub mod linear;
pub mod overrides;
pub mod scoring;
pub mod services;
pub mod settings;
pub mod sources;
pub mod state;
pub mod store;
pub mod text;
pub mod types;
pub mod usage;
pub mod zendesk;

/// Initialize `env_logger` at `info` unless `RUST_LOG` says otherwise.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init();
}
