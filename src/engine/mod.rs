//! Engine seam: the interface the background torrent engine must expose.
//!
//! The engine does the real networking and disk work and lives entirely on the
//! bridge's background thread. This module defines:
//!
//! - [`Engine`]: the routines the bridge calls (startup, persisted-state load
//!   and dump, the four control commands, shutdown)
//! - [`EngineCommand`]: a command queued from the foreground
//! - [`BridgeEvent`] / [`EventSink`]: what the engine publishes back
//! - [`MemoryEngine`]: an in-process bookkeeping engine without networking
//!
//! Engine futures run on a single-threaded `LocalSet`, so they do not need to
//! be `Send`; only the engine value itself moves to the background thread.

pub mod command;
pub mod events;
pub mod memory;

pub use command::{CommandKind, CommandOutcome, EngineCommand};
pub use events::{BridgeEvent, EventSink};
pub use memory::MemoryEngine;

use crate::models::TorrentId;
use crate::selection::AddTorrent;
use std::io::{Read, Write};
use thiserror::Error;

/// Errors reported by engine routines
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("torrent {0} is already added")]
    DuplicateTorrent(TorrentId),

    #[error("torrent {0} not found")]
    NotFound(TorrentId),

    #[error("persisted state is invalid: {0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine failure: {0}")]
    Failed(String),
}

/// Routines a torrent engine exposes to the control bridge.
///
/// Every method is called on the bridge's background thread, one at a time,
/// in submission order. `pause`, `resume` and `remove` must return
/// [`EngineError::NotFound`] for unknown ids; `add` must return
/// [`EngineError::DuplicateTorrent`] for an id that is already registered.
#[allow(async_fn_in_trait)]
pub trait Engine: Send + 'static {
    /// Startup routine; `events` is the only channel back to the foreground
    async fn start(&mut self, events: EventSink) -> Result<(), EngineError>;

    /// Restore state written by a previous [`dump`](Self::dump)
    fn load(&mut self, reader: &mut dyn Read) -> Result<(), EngineError>;

    /// Write the complete engine state as one opaque blob
    fn dump(&self, writer: &mut dyn Write) -> Result<(), EngineError>;

    async fn add(&mut self, request: AddTorrent) -> Result<TorrentId, EngineError>;

    async fn pause(&mut self, id: TorrentId) -> Result<(), EngineError>;

    async fn resume(&mut self, id: TorrentId) -> Result<(), EngineError>;

    async fn remove(&mut self, id: TorrentId) -> Result<(), EngineError>;

    /// Bounded shutdown routine; must not start new unbounded work
    async fn stop(&mut self) -> Result<(), EngineError>;
}
