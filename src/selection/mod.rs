//! Tri-state file selection for multi-file torrents.
//!
//! A [`SelectionTree`] mirrors a torrent's [`FileTreeNode`] hierarchy and tags
//! every node with a [`CheckState`]. Changing a node forces the same state onto
//! all of its descendants and re-derives the state of every ancestor, so a
//! directory is `Checked` only when everything under it is, `Unchecked` only
//! when nothing under it is, and `Partial` otherwise.
//!
//! The tree knows nothing about rendering. A front-end drives it through
//! [`SelectionTree::toggle`], reads it back through [`SelectionTree::state`] and
//! [`SelectionTree::aggregates`], and finally asks for the
//! [`SelectionTree::whitelist`] of files to download.
//!
//! Nodes are addressed by their path below the torrent root (`"a/x.txt"`,
//! `"a"`); the empty path is the root itself.

pub mod session;

use crate::models::{FileInfo, FileTreeError, FileTreeNode, normalize_path};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use thiserror::Error;

pub use session::{AddSession, AddTorrent, FileSelection, SessionError};

/// Selection state of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckState {
    Checked,
    Unchecked,
    /// Some but not all descendants are checked
    Partial,
}

impl CheckState {
    /// Checkbox-style marker used by text front-ends
    pub fn marker(self) -> &'static str {
        match self {
            CheckState::Checked => "[x]",
            CheckState::Unchecked => "[ ]",
            CheckState::Partial => "[~]",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no file or directory at {0:?}")]
    UnknownPath(String),

    #[error("partial state is derived from children and cannot be set directly")]
    PartialNotSettable,

    #[error("single-file torrents always download their only file")]
    SingleFile,
}

/// Counts and sizes of the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Aggregates {
    pub selected_count: usize,
    pub selected_size: u64,
    pub total_count: usize,
    pub total_size: u64,
}

impl Aggregates {
    /// No file is selected; submitting would download nothing
    pub fn is_empty(&self) -> bool {
        self.selected_count == 0
    }
}

/// One row of a depth-first listing of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEntry {
    pub path: String,
    pub name: String,
    pub depth: usize,
    pub state: CheckState,
    /// File length; `None` for directories
    pub length: Option<u64>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Directory { children: Vec<usize> },
    File(FileInfo),
}

#[derive(Debug, Clone)]
struct SelectionNode {
    name: String,
    path: String,
    depth: usize,
    parent: Option<usize>,
    state: CheckState,
    kind: NodeKind,
}

const ROOT: usize = 0;

/// Arena-backed tri-state tree over a torrent's files.
///
/// Nodes are stored in depth-first order with directory children sorted by
/// name, which is also the order of [`entries`](Self::entries) and
/// [`whitelist`](Self::whitelist). Every node starts `Checked`.
#[derive(Debug, Clone)]
pub struct SelectionTree {
    nodes: Vec<SelectionNode>,
    by_path: HashMap<String, usize>,
}

impl SelectionTree {
    pub fn new(root: &FileTreeNode) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            by_path: HashMap::new(),
        };
        tree.build(String::new(), String::new(), 0, None, root);
        tree
    }

    fn build(
        &mut self,
        name: String,
        path: String,
        depth: usize,
        parent: Option<usize>,
        node: &FileTreeNode,
    ) -> usize {
        let index = self.nodes.len();
        let kind = match node {
            FileTreeNode::File(info) => NodeKind::File(info.clone()),
            FileTreeNode::Directory(_) => NodeKind::Directory {
                children: Vec::new(),
            },
        };
        self.nodes.push(SelectionNode {
            name,
            path: path.clone(),
            depth,
            parent,
            state: CheckState::Checked,
            kind,
        });
        self.by_path.insert(path.clone(), index);

        if let FileTreeNode::Directory(children) = node {
            let mut sorted: Vec<(&String, &FileTreeNode)> = children.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));

            let mut child_indices = Vec::with_capacity(sorted.len());
            for (child_name, child) in sorted {
                let child_path = if path.is_empty() {
                    child_name.clone()
                } else {
                    format!("{path}/{child_name}")
                };
                child_indices.push(self.build(
                    child_name.clone(),
                    child_path,
                    depth + 1,
                    Some(index),
                    child,
                ));
            }
            self.nodes[index].kind = NodeKind::Directory {
                children: child_indices,
            };
        }
        index
    }

    fn lookup(&self, path: &Utf8Path) -> Result<usize, SelectionError> {
        let key = match normalize_path(path) {
            Ok(normal) => normal
                .components()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join("/"),
            Err(FileTreeError::EmptyPath) => String::new(),
            Err(_) => return Err(SelectionError::UnknownPath(path.to_string())),
        };
        self.by_path
            .get(&key)
            .copied()
            .ok_or_else(|| SelectionError::UnknownPath(path.to_string()))
    }

    /// State of the node at `path`
    pub fn state(&self, path: impl AsRef<Utf8Path>) -> Result<CheckState, SelectionError> {
        let index = self.lookup(path.as_ref())?;
        Ok(self.nodes[index].state)
    }

    /// Flip the node at `path` and return its new state.
    ///
    /// `Checked` becomes `Unchecked`; `Unchecked` and `Partial` become `Checked`.
    pub fn toggle(&mut self, path: impl AsRef<Utf8Path>) -> Result<CheckState, SelectionError> {
        let index = self.lookup(path.as_ref())?;
        let new_state = match self.nodes[index].state {
            CheckState::Checked => CheckState::Unchecked,
            CheckState::Unchecked | CheckState::Partial => CheckState::Checked,
        };
        self.apply(index, new_state);
        Ok(new_state)
    }

    /// Force the node at `path` (and its whole subtree) to `state`
    pub fn set(
        &mut self,
        path: impl AsRef<Utf8Path>,
        state: CheckState,
    ) -> Result<(), SelectionError> {
        if state == CheckState::Partial {
            return Err(SelectionError::PartialNotSettable);
        }
        let index = self.lookup(path.as_ref())?;
        self.apply(index, state);
        Ok(())
    }

    fn apply(&mut self, index: usize, state: CheckState) {
        self.propagate_down(index, state);
        self.aggregate_up(index);
        tracing::trace!(path = %self.nodes[index].path, ?state, "selection changed");
    }

    fn propagate_down(&mut self, index: usize, state: CheckState) {
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            self.nodes[current].state = state;
            if let NodeKind::Directory { children } = &self.nodes[current].kind {
                stack.extend(children.iter().copied());
            }
        }
    }

    fn aggregate_up(&mut self, index: usize) {
        let mut current = self.nodes[index].parent;
        while let Some(parent) = current {
            let NodeKind::Directory { children } = &self.nodes[parent].kind else {
                break;
            };

            let mut any_checked = false;
            let mut any_unchecked = false;
            let mut any_partial = false;
            for &child in children {
                match self.nodes[child].state {
                    CheckState::Checked => any_checked = true,
                    CheckState::Unchecked => any_unchecked = true,
                    CheckState::Partial => any_partial = true,
                }
            }

            // An empty directory has nothing unchecked below it.
            self.nodes[parent].state = if !any_partial && !any_unchecked {
                CheckState::Checked
            } else if !any_partial && !any_checked {
                CheckState::Unchecked
            } else {
                CheckState::Partial
            };
            current = self.nodes[parent].parent;
        }
    }

    fn files(&self) -> impl Iterator<Item = (&FileInfo, CheckState)> {
        self.nodes.iter().filter_map(|node| match &node.kind {
            NodeKind::File(info) => Some((info, node.state)),
            NodeKind::Directory { .. } => None,
        })
    }

    /// Selected and total file counts and sizes, from a full recount of the leaves
    pub fn aggregates(&self) -> Aggregates {
        self.files()
            .fold(Aggregates::default(), |mut acc, (info, state)| {
                acc.total_count += 1;
                acc.total_size += info.length;
                if state == CheckState::Checked {
                    acc.selected_count += 1;
                    acc.selected_size += info.length;
                }
                acc
            })
    }

    /// Paths of every checked file
    pub fn whitelist(&self) -> Vec<Utf8PathBuf> {
        self.files()
            .filter(|(_, state)| *state == CheckState::Checked)
            .map(|(info, _)| info.path.clone())
            .collect()
    }

    /// Depth-first listing of every node below the root
    pub fn entries(&self) -> Vec<SelectionEntry> {
        self.nodes
            .iter()
            .skip(1)
            .map(|node| SelectionEntry {
                path: node.path.clone(),
                name: node.name.clone(),
                depth: node.depth - 1,
                state: node.state,
                length: match &node.kind {
                    NodeKind::File(info) => Some(info.length),
                    NodeKind::Directory { .. } => None,
                },
            })
            .collect()
    }

    pub fn root_state(&self) -> CheckState {
        self.nodes[ROOT].state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> SelectionTree {
        let files = vec![
            FileInfo::new("a/x.txt", 100),
            FileInfo::new("a/y.txt", 200),
            FileInfo::new("b/z.txt", 50),
        ];
        SelectionTree::new(&FileTreeNode::from_files(&files).unwrap())
    }

    #[test]
    fn test_everything_starts_checked() {
        let tree = sample_tree();
        assert_eq!(tree.root_state(), CheckState::Checked);
        assert_eq!(tree.state("a/x.txt").unwrap(), CheckState::Checked);

        let aggregates = tree.aggregates();
        assert_eq!(aggregates.selected_count, 3);
        assert_eq!(aggregates.selected_size, 350);
        assert_eq!(aggregates.total_count, 3);
        assert_eq!(aggregates.total_size, 350);
    }

    #[test]
    fn test_select_two_files_in_different_directories() {
        let mut tree = sample_tree();
        tree.set("", CheckState::Unchecked).unwrap();
        tree.toggle("a/y.txt").unwrap();
        tree.toggle("b/z.txt").unwrap();

        let aggregates = tree.aggregates();
        assert_eq!(aggregates.selected_count, 2);
        assert_eq!(aggregates.selected_size, 250);
        assert_eq!(tree.state("a").unwrap(), CheckState::Partial);
        assert_eq!(tree.state("b").unwrap(), CheckState::Checked);
        assert_eq!(tree.root_state(), CheckState::Partial);
        assert_eq!(tree.whitelist(), vec!["a/y.txt", "b/z.txt"]);
    }

    #[test]
    fn test_root_partial_until_every_leaf_checked() {
        let mut tree = sample_tree();
        tree.set("", CheckState::Unchecked).unwrap();
        assert_eq!(tree.root_state(), CheckState::Unchecked);

        tree.toggle("a/x.txt").unwrap();
        assert_eq!(tree.root_state(), CheckState::Partial);

        tree.toggle("a/y.txt").unwrap();
        assert_eq!(tree.state("a").unwrap(), CheckState::Checked);
        assert_eq!(tree.root_state(), CheckState::Partial);

        tree.toggle("b/z.txt").unwrap();
        assert_eq!(tree.root_state(), CheckState::Checked);
    }

    #[test]
    fn test_directory_toggle_propagates_down() {
        let mut tree = sample_tree();
        assert_eq!(tree.toggle("a").unwrap(), CheckState::Unchecked);

        assert_eq!(tree.state("a/x.txt").unwrap(), CheckState::Unchecked);
        assert_eq!(tree.state("a/y.txt").unwrap(), CheckState::Unchecked);
        assert_eq!(tree.state("b/z.txt").unwrap(), CheckState::Checked);
        assert_eq!(tree.root_state(), CheckState::Partial);
    }

    #[test]
    fn test_partial_directory_toggles_to_checked() {
        let mut tree = sample_tree();
        tree.toggle("a/x.txt").unwrap();
        assert_eq!(tree.state("a").unwrap(), CheckState::Partial);

        assert_eq!(tree.toggle("a").unwrap(), CheckState::Checked);
        assert_eq!(tree.state("a/x.txt").unwrap(), CheckState::Checked);
        assert_eq!(tree.root_state(), CheckState::Checked);
    }

    #[test]
    fn test_unchecking_everything_reports_empty_selection() {
        let mut tree = sample_tree();
        tree.toggle("a").unwrap();
        tree.toggle("b").unwrap();

        assert!(tree.aggregates().is_empty());
        assert_eq!(tree.root_state(), CheckState::Unchecked);
        assert!(tree.whitelist().is_empty());
    }

    #[test]
    fn test_unknown_path_and_partial_set_rejected() {
        let mut tree = sample_tree();
        assert_eq!(
            tree.toggle("c/missing.txt"),
            Err(SelectionError::UnknownPath("c/missing.txt".to_string()))
        );
        assert_eq!(
            tree.set("a", CheckState::Partial),
            Err(SelectionError::PartialNotSettable)
        );
    }

    #[test]
    fn test_paths_are_normalized() {
        let tree = sample_tree();
        assert_eq!(tree.state("./a/x.txt").unwrap(), CheckState::Checked);
        assert_eq!(tree.state("a/").unwrap(), CheckState::Checked);
    }

    #[test]
    fn test_entries_sorted_depth_first() {
        let files = vec![FileInfo::new("z.bin", 1), FileInfo::new("dir/b.txt", 2)];
        let tree = SelectionTree::new(&FileTreeNode::from_files(&files).unwrap());

        let entries = tree.entries();
        let rows: Vec<(&str, usize, Option<u64>)> = entries
            .iter()
            .map(|e| (e.path.as_str(), e.depth, e.length))
            .collect();
        assert_eq!(
            rows,
            vec![("dir", 0, None), ("dir/b.txt", 1, Some(2)), ("z.bin", 0, Some(1))]
        );
    }
}
