use super::TorrentId;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single file inside a torrent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Path relative to the torrent's root directory
    pub path: Utf8PathBuf,
    /// Length in bytes
    pub length: u64,
}

impl FileInfo {
    pub fn new(path: impl Into<Utf8PathBuf>, length: u64) -> Self {
        Self {
            path: path.into(),
            length,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileTreeError {
    #[error("file path is empty")]
    EmptyPath,

    #[error("path {0} is used both as a file and as a directory")]
    Conflict(Utf8PathBuf),

    #[error("path {0} leaves the torrent directory")]
    InvalidComponent(Utf8PathBuf),
}

/// Relative form of a path inside a torrent.
///
/// Root and `.` components are dropped. `..` and drive prefixes are rejected
/// so no file can resolve outside the download directory.
pub fn normalize_path(path: &Utf8Path) -> Result<Utf8PathBuf, FileTreeError> {
    let mut normal = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::Normal(part) => normal.push(part),
            Utf8Component::RootDir | Utf8Component::CurDir => {}
            Utf8Component::ParentDir | Utf8Component::Prefix(_) => {
                return Err(FileTreeError::InvalidComponent(path.to_path_buf()));
            }
        }
    }
    if normal.as_str().is_empty() {
        return Err(FileTreeError::EmptyPath);
    }
    Ok(normal)
}

/// Immutable file hierarchy of a torrent, built once from its metadata.
///
/// Directory children keep the order in which the metadata lists them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTreeNode {
    Directory(IndexMap<String, FileTreeNode>),
    File(FileInfo),
}

impl FileTreeNode {
    /// Build a tree from a flat file listing.
    ///
    /// The returned root is always a `Directory`, even for a single file.
    pub fn from_files<'a, I>(files: I) -> Result<Self, FileTreeError>
    where
        I: IntoIterator<Item = &'a FileInfo>,
    {
        let mut root = IndexMap::new();
        for file in files {
            insert_file(&mut root, file)?;
        }
        Ok(FileTreeNode::Directory(root))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FileTreeNode::File(_))
    }

    /// Sum of the lengths of every file below this node
    pub fn total_size(&self) -> u64 {
        match self {
            FileTreeNode::File(info) => info.length,
            FileTreeNode::Directory(children) => children.values().map(Self::total_size).sum(),
        }
    }

    /// Every file below this node in tree order
    pub fn files(&self) -> Vec<&FileInfo> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a FileInfo>) {
        match self {
            FileTreeNode::File(info) => out.push(info),
            FileTreeNode::Directory(children) => {
                for child in children.values() {
                    child.collect_files(out);
                }
            }
        }
    }
}

fn insert_file(
    root: &mut IndexMap<String, FileTreeNode>,
    file: &FileInfo,
) -> Result<(), FileTreeError> {
    let path = normalize_path(&file.path)?;
    let components: Vec<&str> = path.components().map(|c| c.as_str()).collect();
    let Some((leaf, dirs)) = components.split_last() else {
        return Err(FileTreeError::EmptyPath);
    };

    let mut current = root;
    let mut walked = Utf8PathBuf::new();
    for dir in dirs {
        walked.push(dir);
        let entry = current
            .entry((*dir).to_string())
            .or_insert_with(|| FileTreeNode::Directory(IndexMap::new()));
        current = match entry {
            FileTreeNode::Directory(children) => children,
            FileTreeNode::File(_) => return Err(FileTreeError::Conflict(walked)),
        };
    }

    if current.contains_key(*leaf) {
        return Err(FileTreeError::Conflict(path));
    }
    let stored = FileInfo::new(path.clone(), file.length);
    current.insert((*leaf).to_string(), FileTreeNode::File(stored));
    Ok(())
}

/// Parsed torrent metadata as handed to the front-end.
///
/// Metainfo decoding itself is done elsewhere; the console binary reads this
/// structure from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentDescriptor {
    pub info_hash: TorrentId,
    pub name: String,

    /// Tiers of announce URLs, display only
    #[serde(default)]
    pub announce_list: Vec<Vec<String>>,

    pub files: Vec<FileInfo>,

    #[serde(default)]
    pub single_file_mode: bool,
}

impl TorrentDescriptor {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.length).sum()
    }

    pub fn file_tree(&self) -> Result<FileTreeNode, FileTreeError> {
        FileTreeNode::from_files(&self.files)
    }

    /// Look up a file by its path relative to the torrent root.
    ///
    /// Both sides are compared in normalized form, so `/a/x` and `a/x` match.
    pub fn file(&self, path: &Utf8Path) -> Option<&FileInfo> {
        let wanted = normalize_path(path).ok()?;
        self.files
            .iter()
            .find(|f| normalize_path(&f.path).is_ok_and(|p| p == wanted))
    }
}
