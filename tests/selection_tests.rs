//! Integration tests for SelectionTree and AddSession
//!
//! These tests verify:
//! - Tri-state propagation on a realistic multi-file torrent
//! - Aggregates always match the checked leaves (property test)
//! - Single-file torrents bypass the tree entirely

use camino::Utf8PathBuf;
use proptest::prelude::*;
use torrent_control::models::{FileInfo, FileTreeNode};
use torrent_control::selection::{FileSelection, SelectionError, SessionError};
use torrent_control::{AddSession, CheckState, SelectionTree, TorrentDescriptor, TorrentId};

fn multi_file_descriptor() -> TorrentDescriptor {
    TorrentDescriptor {
        info_hash: TorrentId::new([7; 20]),
        name: "bundle".to_string(),
        announce_list: vec![
            vec!["http://tracker.example/announce".to_string()],
            vec!["udp://backup.example:6969".to_string()],
        ],
        files: vec![
            FileInfo::new("a/x.txt", 100),
            FileInfo::new("a/y.txt", 200),
            FileInfo::new("b/z.txt", 50),
        ],
        single_file_mode: false,
    }
}

fn single_file_descriptor() -> TorrentDescriptor {
    TorrentDescriptor {
        info_hash: TorrentId::new([8; 20]),
        name: "debian.iso".to_string(),
        announce_list: Vec::new(),
        files: vec![FileInfo::new("debian.iso", 4096)],
        single_file_mode: true,
    }
}

#[test]
fn test_select_two_of_three_files() {
    let tree_root = multi_file_descriptor().file_tree().unwrap();
    let mut tree = SelectionTree::new(&tree_root);

    assert_eq!(tree.toggle("a/x.txt").unwrap(), CheckState::Unchecked);

    let aggregates = tree.aggregates();
    assert_eq!(aggregates.selected_count, 2);
    assert_eq!(aggregates.selected_size, 250);
    assert_eq!(aggregates.total_count, 3);
    assert_eq!(aggregates.total_size, 350);
    assert_eq!(tree.state("a").unwrap(), CheckState::Partial);
    assert_eq!(tree.state("b").unwrap(), CheckState::Checked);
    assert_eq!(tree.root_state(), CheckState::Partial);
    assert_eq!(
        tree.whitelist(),
        vec![Utf8PathBuf::from("a/y.txt"), Utf8PathBuf::from("b/z.txt")]
    );
}

#[test]
fn test_rooted_file_paths_select_like_relative_ones() {
    let files = vec![
        FileInfo::new("/a/x.txt", 100),
        FileInfo::new("/a/y.txt", 200),
        FileInfo::new("/b/z.txt", 50),
    ];
    let tree_root = FileTreeNode::from_files(&files).unwrap();
    let mut tree = SelectionTree::new(&tree_root);

    for entry in tree.entries() {
        assert!(tree.state(&entry.path).is_ok(), "{} not addressable", entry.path);
    }

    tree.toggle("/a/x.txt").unwrap();
    let aggregates = tree.aggregates();
    assert_eq!(aggregates.selected_count, 2);
    assert_eq!(aggregates.selected_size, 250);
    assert_eq!(tree.state("a").unwrap(), CheckState::Partial);
    assert_eq!(tree.state("/b").unwrap(), CheckState::Checked);
    assert_eq!(tree.state("/").unwrap(), CheckState::Partial);
    assert_eq!(
        tree.whitelist(),
        vec![Utf8PathBuf::from("a/y.txt"), Utf8PathBuf::from("b/z.txt")]
    );
    assert!(matches!(
        tree.state("../a/x.txt"),
        Err(SelectionError::UnknownPath(_))
    ));
}

#[test]
fn test_root_partial_then_checked() {
    let tree_root = multi_file_descriptor().file_tree().unwrap();
    let mut tree = SelectionTree::new(&tree_root);

    tree.set("", CheckState::Unchecked).unwrap();
    assert_eq!(tree.root_state(), CheckState::Unchecked);
    assert!(tree.aggregates().is_empty());

    tree.toggle("b/z.txt").unwrap();
    assert_eq!(tree.root_state(), CheckState::Partial);

    tree.toggle("a").unwrap();
    assert_eq!(tree.state("a/x.txt").unwrap(), CheckState::Checked);
    assert_eq!(tree.root_state(), CheckState::Checked);
}

#[test]
fn test_unknown_path_and_partial_rejected() {
    let tree_root = multi_file_descriptor().file_tree().unwrap();
    let mut tree = SelectionTree::new(&tree_root);

    assert!(matches!(
        tree.toggle("c/missing.txt"),
        Err(SelectionError::UnknownPath(_))
    ));
    assert_eq!(
        tree.set("a", CheckState::Partial),
        Err(SelectionError::PartialNotSettable)
    );
}

#[test]
fn test_session_blocks_empty_selection() {
    let mut session = AddSession::new(multi_file_descriptor(), "/downloads").unwrap();
    assert_eq!(session.announce_tiers().len(), 2);
    session.toggle("a").unwrap();
    session.toggle("b").unwrap();

    assert!(!session.can_submit());
    assert_eq!(session.summary(), "Nothing to download");
    assert_eq!(session.submit().unwrap_err(), SessionError::NothingSelected);
}

#[test]
fn test_session_submits_whitelist_and_directory() {
    let mut session = AddSession::new(multi_file_descriptor(), "/downloads").unwrap();
    session.toggle("a/x.txt").unwrap();
    session.set_download_dir("/srv/media");
    assert_eq!(session.summary(), "Selected 2 files (250 bytes)");

    let request = session.submit().unwrap();
    assert_eq!(request.download_dir, "/srv/media");
    assert_eq!(
        request.selection,
        FileSelection::Whitelist(vec!["a/y.txt".into(), "b/z.txt".into()])
    );
}

#[test]
fn test_single_file_never_builds_tree() {
    let mut session = AddSession::new(single_file_descriptor(), "/downloads").unwrap();

    assert!(session.tree().is_none());
    assert_eq!(session.toggle("debian.iso"), Err(SelectionError::SingleFile));
    assert_eq!(session.aggregates().selected_size, 4096);
    assert!(session.can_submit());
    assert_eq!(session.submit().unwrap().selection, FileSelection::All);
}

fn file_set() -> impl Strategy<Value = Vec<FileInfo>> {
    prop::collection::btree_map(
        ("[a-c]", "[a-c]", "[a-e]"),
        1u64..10_000,
        1..24,
    )
    .prop_map(|files| {
        files
            .into_iter()
            .map(|((top, mid, leaf), length)| {
                FileInfo::new(format!("{top}/{mid}/{leaf}.bin"), length)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn selected_size_matches_checked_leaves(
        files in file_set(),
        toggles in prop::collection::vec(0usize..64, 0..40),
    ) {
        let root = FileTreeNode::from_files(&files).unwrap();
        let mut tree = SelectionTree::new(&root);
        let paths: Vec<String> = tree.entries().into_iter().map(|entry| entry.path).collect();

        for index in toggles {
            tree.toggle(&paths[index % paths.len()]).unwrap();

            let expected: u64 = files
                .iter()
                .filter(|file| tree.state(&file.path) == Ok(CheckState::Checked))
                .map(|file| file.length)
                .sum();
            let aggregates = tree.aggregates();
            prop_assert_eq!(aggregates.selected_size, expected);
            prop_assert_eq!(aggregates.selected_count, tree.whitelist().len());
            prop_assert_eq!(aggregates.total_size, files.iter().map(|f| f.length).sum::<u64>());
        }
    }

    #[test]
    fn directories_summarize_their_children(
        files in file_set(),
        toggles in prop::collection::vec(0usize..64, 0..40),
    ) {
        let root = FileTreeNode::from_files(&files).unwrap();
        let mut tree = SelectionTree::new(&root);
        let paths: Vec<String> = tree.entries().into_iter().map(|entry| entry.path).collect();
        for index in toggles {
            tree.toggle(&paths[index % paths.len()]).unwrap();
        }

        for entry in tree.entries().into_iter().filter(|entry| entry.length.is_none()) {
            let prefix = format!("{}/", entry.path);
            let leaves: Vec<CheckState> = files
                .iter()
                .filter(|file| file.path.as_str().starts_with(&prefix))
                .map(|file| tree.state(&file.path).unwrap())
                .collect();
            let expected = if leaves.iter().all(|s| *s == CheckState::Checked) {
                CheckState::Checked
            } else if leaves.iter().all(|s| *s == CheckState::Unchecked) {
                CheckState::Unchecked
            } else {
                CheckState::Partial
            };
            prop_assert_eq!(entry.state, expected);
        }
    }
}
