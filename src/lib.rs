// torrent-control - Control layer of a BitTorrent client
//
// This is the library crate containing the engine bridge, the live registry and
// the file selection model. The binary crate (main.rs) provides the console front-end.

pub mod config;
pub mod engine;
pub mod format;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod selection;
pub mod ui;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use engine::{BridgeEvent, Engine, EngineCommand, EngineError, EventSink, MemoryEngine};
pub use models::{ClientConfig, TorrentDescriptor, TorrentId, TorrentSnapshot};
pub use registry::{LiveRegistry, RegistryError};
pub use selection::{AddSession, CheckState, SelectionTree};
pub use ui::{BridgeConfig, BridgeError, ControlBridge};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
