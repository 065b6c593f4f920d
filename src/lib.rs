//! Hypermedia application-state engine
//!
//! Models REST applications as resource-state machines: each state answers
//! at a URI path, transitions between states carry the HTTP methods a
//! client may use, and representations returned to clients get hypermedia
//! links injected from the graph.
//!
//! This library provides functionality for:
//! - Declaring resource-state machines programmatically or from TOML models
//! - Resolving which state answers a method and path
//! - Injecting links into entity and collection representations, including
//!   per-item links driven by repeating payload fields
//! - Exporting machines as Graphviz DOT graphs and checking them for
//!   structural problems

pub mod cli;
pub mod config;
pub mod error;
pub mod hypermedia;
pub mod registry;

pub use config::Config;
pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging with the given log level
pub fn init_logging(level: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "hyperstate");
    }
}
