pub mod config;
pub mod dates;
pub mod error;
pub mod notifier;
pub mod routing;
pub mod tracing;
