use super::{Engine, EngineError};
use crate::models::TorrentId;
use crate::selection::AddTorrent;
use std::fmt;

/// Control command queued from the foreground onto the engine loop
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Add a torrent with the files chosen in an add-session
    Add(Box<AddTorrent>),
    /// Pause an active torrent without removing it
    Pause { id: TorrentId },
    /// Resume a paused torrent
    Resume { id: TorrentId },
    /// Remove a torrent from the engine
    Remove { id: TorrentId },
}

/// Command discriminant, used in logs and failure events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Add,
    Pause,
    Resume,
    Remove,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandKind::Add => "add",
            CommandKind::Pause => "pause",
            CommandKind::Resume => "resume",
            CommandKind::Remove => "remove",
        })
    }
}

/// Successful result of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Added(TorrentId),
    Done,
}

impl EngineCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            EngineCommand::Add(_) => CommandKind::Add,
            EngineCommand::Pause { .. } => CommandKind::Pause,
            EngineCommand::Resume { .. } => CommandKind::Resume,
            EngineCommand::Remove { .. } => CommandKind::Remove,
        }
    }

    /// Torrent the command refers to
    pub fn target(&self) -> TorrentId {
        match self {
            EngineCommand::Add(request) => request.descriptor.info_hash,
            EngineCommand::Pause { id }
            | EngineCommand::Resume { id }
            | EngineCommand::Remove { id } => *id,
        }
    }

    pub(crate) async fn execute<E: Engine>(
        self,
        engine: &mut E,
    ) -> Result<CommandOutcome, EngineError> {
        match self {
            EngineCommand::Add(request) => engine.add(*request).await.map(CommandOutcome::Added),
            EngineCommand::Pause { id } => engine.pause(id).await.map(|_| CommandOutcome::Done),
            EngineCommand::Resume { id } => engine.resume(id).await.map(|_| CommandOutcome::Done),
            EngineCommand::Remove { id } => engine.remove(id).await.map(|_| CommandOutcome::Done),
        }
    }
}
