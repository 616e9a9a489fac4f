//! Data models shared by every layer of the client.
//!
//! - [`TorrentSnapshot`]: immutable record of one torrent's observable state, the
//!   only torrent data that ever crosses from the engine thread to the foreground
//! - [`TorrentId`]: 20-byte info-hash identifier
//! - [`FileTreeNode`] / [`TorrentDescriptor`]: file hierarchy and metadata used by
//!   add-sessions
//! - [`ClientConfig`]: settings loaded from `torrent-control.yaml`

pub mod config;
pub mod file_tree;
pub mod snapshot;

pub use config::ClientConfig;
pub use file_tree::{FileInfo, FileTreeError, FileTreeNode, TorrentDescriptor, normalize_path};
pub use snapshot::{TORRENT_ID_LEN, TorrentId, TorrentIdError, TorrentSnapshot};
