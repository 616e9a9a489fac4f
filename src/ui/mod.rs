// UI module - foreground side of the client
//
// This module contains:
// - ControlBridge: Runs the engine loop on its own thread and carries commands and events across
// - ForegroundQueue: The single queue the foreground dispatcher blocks on
// - ConsoleController: Text front-end that renders the registry and drives add-sessions

pub mod bridge;
pub mod controller;
pub mod dispatcher;

pub use bridge::{
    BridgeConfig, BridgeError, BridgeHandle, BridgeState, CommandError, CommandResult,
    ControlBridge, Pending,
};
pub use controller::{ConsoleCommand, ConsoleController, ForegroundMessage, ParseError};
pub use dispatcher::{ForegroundQueue, foreground_queue};
