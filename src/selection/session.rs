//! Add-session: the state behind one "add torrent" dialog.

use super::{Aggregates, CheckState, SelectionError, SelectionTree};
use crate::format::humanize_size;
use crate::models::{FileTreeError, TorrentDescriptor};
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Which files of a torrent the engine should materialize
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelection {
    /// Every file (always the case for single-file torrents)
    All,
    /// Only these paths; everything else is skipped entirely
    Whitelist(Vec<Utf8PathBuf>),
}

/// Payload of the `add` command
#[derive(Debug, Clone, PartialEq)]
pub struct AddTorrent {
    pub descriptor: TorrentDescriptor,
    pub download_dir: Utf8PathBuf,
    pub selection: FileSelection,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("nothing to download: no file is selected")]
    NothingSelected,

    #[error("torrent file listing is invalid: {0}")]
    InvalidFileTree(#[from] FileTreeError),

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Per-dialog state for adding one torrent.
///
/// The destination directory is seeded from configuration and lives only in
/// this session; callers that want to remember the user's last choice read it
/// back with [`download_dir`](Self::download_dir) before submitting.
///
/// Single-file torrents never get a [`SelectionTree`]: their only file is
/// always selected.
#[derive(Debug, Clone)]
pub struct AddSession {
    descriptor: TorrentDescriptor,
    download_dir: Utf8PathBuf,
    tree: Option<SelectionTree>,
}

impl AddSession {
    pub fn new(
        descriptor: TorrentDescriptor,
        default_dir: impl Into<Utf8PathBuf>,
    ) -> Result<Self, SessionError> {
        let tree = if descriptor.single_file_mode {
            None
        } else {
            Some(SelectionTree::new(&descriptor.file_tree()?))
        };

        tracing::debug!(
            name = %descriptor.name,
            files = descriptor.files.len(),
            single_file = descriptor.single_file_mode,
            "add-session opened"
        );

        Ok(Self {
            descriptor,
            download_dir: default_dir.into(),
            tree,
        })
    }

    pub fn descriptor(&self) -> &TorrentDescriptor {
        &self.descriptor
    }

    pub fn download_dir(&self) -> &Utf8Path {
        &self.download_dir
    }

    pub fn set_download_dir(&mut self, dir: impl Into<Utf8PathBuf>) {
        self.download_dir = dir.into();
    }

    /// Announce URL tiers, for display only
    pub fn announce_tiers(&self) -> &[Vec<String>] {
        &self.descriptor.announce_list
    }

    /// The selection tree, or `None` for single-file torrents
    pub fn tree(&self) -> Option<&SelectionTree> {
        self.tree.as_ref()
    }

    pub fn toggle(&mut self, path: impl AsRef<Utf8Path>) -> Result<CheckState, SelectionError> {
        match self.tree.as_mut() {
            Some(tree) => tree.toggle(path),
            None => Err(SelectionError::SingleFile),
        }
    }

    pub fn state(&self, path: impl AsRef<Utf8Path>) -> Result<CheckState, SelectionError> {
        match self.tree.as_ref() {
            Some(tree) => tree.state(path),
            None => Ok(CheckState::Checked),
        }
    }

    pub fn aggregates(&self) -> Aggregates {
        match self.tree.as_ref() {
            Some(tree) => tree.aggregates(),
            None => {
                let size = self.descriptor.total_size();
                let count = self.descriptor.files.len();
                Aggregates {
                    selected_count: count,
                    selected_size: size,
                    total_count: count,
                    total_size: size,
                }
            }
        }
    }

    /// Submission is only allowed while at least one file is selected
    pub fn can_submit(&self) -> bool {
        !self.aggregates().is_empty()
    }

    /// One-line description of the current selection
    pub fn summary(&self) -> String {
        let aggregates = self.aggregates();
        if aggregates.is_empty() {
            "Nothing to download".to_string()
        } else {
            format!(
                "Selected {} files ({})",
                aggregates.selected_count,
                humanize_size(aggregates.selected_size)
            )
        }
    }

    /// Close the session and build the `add` command payload
    pub fn submit(self) -> Result<AddTorrent, SessionError> {
        let selection = match &self.tree {
            None => FileSelection::All,
            Some(tree) => {
                let whitelist = tree.whitelist();
                if whitelist.is_empty() {
                    return Err(SessionError::NothingSelected);
                }
                FileSelection::Whitelist(whitelist)
            }
        };

        tracing::info!(
            name = %self.descriptor.name,
            dir = %self.download_dir,
            "add-session submitted"
        );

        Ok(AddTorrent {
            descriptor: self.descriptor,
            download_dir: self.download_dir,
            selection,
        })
    }
}
