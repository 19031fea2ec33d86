pub mod api;
pub mod catalog;
pub mod config;
pub mod control;
pub mod host;
pub mod identity;
pub mod rooms;
pub mod store;
pub mod topology;

pub use config::Config;
pub use config::Diagnostic;
pub use config::LogLevel;
pub use config::format_diagnostics;
pub use topology::Topology;
