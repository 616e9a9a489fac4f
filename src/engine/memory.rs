//! In-process bookkeeping engine.
//!
//! `MemoryEngine` implements the full [`Engine`] contract (registration,
//! pause/resume/remove, persisted state, event publication) without any
//! networking or disk transfer. The console binary runs on it and the
//! integration tests use it to drive the bridge end to end.

use super::{Engine, EngineError, EventSink};
use crate::models::{TorrentDescriptor, TorrentId, TorrentSnapshot};
use crate::selection::{AddTorrent, FileSelection};
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTorrent {
    descriptor: TorrentDescriptor,
    download_dir: Utf8PathBuf,
    /// `None` means every file is selected
    whitelist: Option<Vec<Utf8PathBuf>>,
    paused: bool,
    downloaded_size: u64,
    uploaded_size: u64,
}

impl StoredTorrent {
    fn from_request(request: AddTorrent) -> Self {
        let whitelist = match request.selection {
            FileSelection::All => None,
            FileSelection::Whitelist(paths) => Some(paths),
        };
        Self {
            descriptor: request.descriptor,
            download_dir: request.download_dir,
            whitelist,
            paused: false,
            downloaded_size: 0,
            uploaded_size: 0,
        }
    }

    fn selected_size(&self) -> u64 {
        match &self.whitelist {
            None => self.descriptor.total_size(),
            Some(paths) => paths
                .iter()
                .filter_map(|path| self.descriptor.file(path))
                .map(|file| file.length)
                .sum(),
        }
    }

    fn snapshot(&self) -> TorrentSnapshot {
        let selected_size = self.selected_size();
        let downloaded_size = self.downloaded_size.min(selected_size);
        let progress = if selected_size == 0 {
            1.0
        } else {
            downloaded_size as f64 / selected_size as f64
        };
        TorrentSnapshot {
            id: self.descriptor.info_hash,
            name: self.descriptor.name.clone(),
            total_size: self.descriptor.total_size(),
            selected_size,
            downloaded_size,
            uploaded_size: self.uploaded_size,
            progress,
            total_peer_count: 0,
            downloading_peer_count: 0,
            uploading_peer_count: 0,
            download_speed: 0,
            upload_speed: 0,
            paused: self.paused,
            complete: downloaded_size >= selected_size,
            single_file_mode: self.descriptor.single_file_mode,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredState {
    version: u32,
    torrents: Vec<StoredTorrent>,
}

/// Bookkeeping engine with no transfer capability
#[derive(Debug, Default)]
pub struct MemoryEngine {
    torrents: IndexMap<TorrentId, StoredTorrent>,
    events: Option<EventSink>,
    stopped: bool,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.torrents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.is_empty()
    }

    pub fn snapshot(&self, id: &TorrentId) -> Option<TorrentSnapshot> {
        self.torrents.get(id).map(StoredTorrent::snapshot)
    }

    fn publish_added(&mut self, id: &TorrentId) {
        if let (Some(events), Some(torrent)) = (self.events.as_mut(), self.torrents.get(id)) {
            events.added(torrent.snapshot());
        }
    }

    fn publish_changed(&mut self, id: &TorrentId) {
        if let (Some(events), Some(torrent)) = (self.events.as_mut(), self.torrents.get(id)) {
            events.changed(torrent.snapshot());
        }
    }

    fn set_paused(&mut self, id: TorrentId, paused: bool) -> Result<(), EngineError> {
        let torrent = self
            .torrents
            .get_mut(&id)
            .ok_or(EngineError::NotFound(id))?;
        if torrent.paused == paused {
            return Ok(());
        }
        torrent.paused = paused;
        tracing::info!(%id, paused, "torrent state changed");
        self.publish_changed(&id);
        Ok(())
    }
}

impl Engine for MemoryEngine {
    async fn start(&mut self, events: EventSink) -> Result<(), EngineError> {
        self.events = Some(events);
        self.stopped = false;
        tracing::debug!("memory engine started");
        Ok(())
    }

    fn load(&mut self, reader: &mut dyn Read) -> Result<(), EngineError> {
        let state: StoredState = serde_json::from_reader(reader)
            .map_err(|e| EngineError::InvalidState(e.to_string()))?;
        if state.version != STATE_VERSION {
            return Err(EngineError::InvalidState(format!(
                "unsupported state version {}",
                state.version
            )));
        }

        let mut restored = 0;
        for torrent in state.torrents {
            let id = torrent.descriptor.info_hash;
            if self.torrents.contains_key(&id) {
                tracing::warn!(%id, "skipping duplicate torrent in saved state");
                continue;
            }
            self.torrents.insert(id, torrent);
            self.publish_added(&id);
            restored += 1;
        }
        tracing::info!(restored, "restored torrents from saved state");
        Ok(())
    }

    fn dump(&self, writer: &mut dyn Write) -> Result<(), EngineError> {
        let state = StoredState {
            version: STATE_VERSION,
            torrents: self.torrents.values().cloned().collect(),
        };
        serde_json::to_writer(writer, &state).map_err(|e| EngineError::Failed(e.to_string()))
    }

    async fn add(&mut self, request: AddTorrent) -> Result<TorrentId, EngineError> {
        if self.stopped {
            return Err(EngineError::Failed("engine is stopped".to_string()));
        }
        let id = request.descriptor.info_hash;
        if self.torrents.contains_key(&id) {
            return Err(EngineError::DuplicateTorrent(id));
        }
        tracing::info!(%id, name = %request.descriptor.name, dir = %request.download_dir, "torrent added");
        self.torrents.insert(id, StoredTorrent::from_request(request));
        self.publish_added(&id);
        Ok(id)
    }

    async fn pause(&mut self, id: TorrentId) -> Result<(), EngineError> {
        self.set_paused(id, true)
    }

    async fn resume(&mut self, id: TorrentId) -> Result<(), EngineError> {
        self.set_paused(id, false)
    }

    async fn remove(&mut self, id: TorrentId) -> Result<(), EngineError> {
        self.torrents
            .shift_remove(&id)
            .ok_or(EngineError::NotFound(id))?;
        tracing::info!(%id, "torrent removed");
        if let Some(events) = self.events.as_mut() {
            events.removed(id);
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        self.stopped = true;
        tracing::debug!(torrents = self.torrents.len(), "memory engine stopped");
        Ok(())
    }
}
