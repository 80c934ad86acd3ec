//! Logging setup (SPEC_FULL §6.2). Rust rendition of
//! `original_source/apps/jobs/logger.py`'s structlog configuration: pretty
//! ANSI output in development, JSON lines in production, level driven by
//! `NODE_ENV` (debug outside production, info in production).

use tracing_subscriber::EnvFilter;

use crate::config::NodeEnv;

pub fn init(node_env: NodeEnv) {
    let default_level = if node_env.is_production() { "info" } else { "debug" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if node_env.is_production() {
        subscriber.json().with_current_span(false).init();
    } else {
        subscriber.with_ansi(true).init();
    }
}
