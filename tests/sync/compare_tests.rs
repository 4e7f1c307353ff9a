// Tests for tree comparison

use crate::fixtures::{mkdir, snapshot, write, Trees};
use filetime::{set_file_mtime, FileTime};
use foldersync::fs::{EntryKind, LocalFs};
use foldersync::sync::{EntryStatus, TreeComparator};
use foldersync::SyncError;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[test]
fn test_identical_trees_are_in_sync() {
    let trees = Trees::new();
    for root in [&trees.source, &trees.replica] {
        write(root, "a.txt", "alpha");
        write(root, "docs/b.txt", "beta");
        mkdir(root, "empty");
    }

    let classification = TreeComparator::new(&LocalFs).compare(&trees.source, &trees.replica).unwrap();

    assert!(classification.is_in_sync());
    assert_eq!(classification.common.len(), 4);
    assert!(classification.common.values().all(|entry| entry.status == EntryStatus::Unchanged));
}

#[test]
fn test_every_path_lands_in_exactly_one_set() {
    let trees = Trees::new();
    write(&trees.source, "shared.txt", "same");
    write(&trees.replica, "shared.txt", "same");
    write(&trees.source, "new/deep/file.txt", "n");
    write(&trees.replica, "stale/old.txt", "o");
    write(&trees.source, "mixed/keep.txt", "k");
    write(&trees.replica, "mixed/keep.txt", "k2");
    write(&trees.replica, "mixed/extra.txt", "x");
    write(&trees.source, "mixed/added.txt", "a");

    let classification = TreeComparator::new(&LocalFs).compare(&trees.source, &trees.replica).unwrap();

    let source_only: BTreeSet<_> = classification.source_only.keys().cloned().collect();
    let replica_only: BTreeSet<_> = classification.replica_only.keys().cloned().collect();
    let common: BTreeSet<_> = classification.common.keys().cloned().collect();

    assert!(source_only.is_disjoint(&replica_only));
    assert!(source_only.is_disjoint(&common));
    assert!(replica_only.is_disjoint(&common));

    let mut all_paths: BTreeSet<PathBuf> = snapshot(&trees.source).into_keys().collect();
    all_paths.extend(snapshot(&trees.replica).into_keys());
    let classified: BTreeSet<_> = source_only.union(&replica_only).cloned().chain(common).collect();
    assert_eq!(classified, all_paths);
    assert_eq!(classification.len(), all_paths.len());
}

#[test]
fn test_nested_change_marks_ancestors_changed() {
    let trees = Trees::new();
    write(&trees.source, "d/e/f.txt", "new");
    write(&trees.replica, "d/e/f.txt", "old");
    write(&trees.source, "d/same.txt", "s");
    write(&trees.replica, "d/same.txt", "s");

    let classification = TreeComparator::new(&LocalFs).compare(&trees.source, &trees.replica).unwrap();

    assert!(classification.common[&PathBuf::from("d")].is_changed());
    assert!(classification.common[&PathBuf::from("d/e")].is_changed());
    assert!(classification.common[&PathBuf::from("d/e/f.txt")].is_changed());
    assert!(!classification.common[&PathBuf::from("d/same.txt")].is_changed());
}

#[test]
fn test_same_size_and_mtime_with_different_bytes_is_changed() {
    let trees = Trees::new();
    write(&trees.source, "a.txt", "abc");
    write(&trees.replica, "a.txt", "abd");
    let stamp = FileTime::from_unix_time(1_600_000_000, 0);
    set_file_mtime(trees.source.join("a.txt"), stamp).unwrap();
    set_file_mtime(trees.replica.join("a.txt"), stamp).unwrap();

    let classification = TreeComparator::new(&LocalFs).compare(&trees.source, &trees.replica).unwrap();

    assert!(classification.common[&PathBuf::from("a.txt")].is_changed());
}

#[test]
fn test_different_mtime_with_same_bytes_is_unchanged() {
    let trees = Trees::new();
    write(&trees.source, "a.txt", "same");
    write(&trees.replica, "a.txt", "same");
    set_file_mtime(trees.replica.join("a.txt"), FileTime::from_unix_time(1_000_000_000, 0)).unwrap();

    let classification = TreeComparator::new(&LocalFs).compare(&trees.source, &trees.replica).unwrap();

    assert!(classification.is_in_sync());
}

#[test]
fn test_kind_change_is_a_changed_common_entry() {
    let trees = Trees::new();
    write(&trees.source, "x", "now a file");
    write(&trees.replica, "x/inner.txt", "was a dir");

    let classification = TreeComparator::new(&LocalFs).compare(&trees.source, &trees.replica).unwrap();

    let entry = classification.common[&PathBuf::from("x")];
    assert_eq!(entry.source_kind, EntryKind::File);
    assert_eq!(entry.replica_kind, EntryKind::Directory);
    assert!(entry.kind_changed());
    assert!(classification.replica_only.contains_key(&PathBuf::from("x/inner.txt")));
    assert_eq!(classification.removals().count(), 0);
    assert_eq!(classification.updates().count(), 1);
}

#[test]
fn test_missing_replica_root_is_an_access_error() {
    let trees = Trees::without_replica();
    write(&trees.source, "a.txt", "a");

    let err = TreeComparator::new(&LocalFs).compare(&trees.source, &trees.replica).unwrap_err();

    assert!(matches!(err, SyncError::FilesystemAccess { ref path, .. } if *path == trees.replica));
    assert!(!err.is_fatal());
}

#[test]
fn test_comparison_does_not_modify_either_tree() {
    let trees = Trees::new();
    write(&trees.source, "a.txt", "one");
    write(&trees.source, "dir/b.txt", "two");
    write(&trees.replica, "a.txt", "uno");
    write(&trees.replica, "gone/c.txt", "three");
    let before = (snapshot(&trees.source), snapshot(&trees.replica));

    TreeComparator::new(&LocalFs).compare(&trees.source, &trees.replica).unwrap();

    assert_eq!((snapshot(&trees.source), snapshot(&trees.replica)), before);
}

#[cfg(unix)]
#[test]
fn test_replica_symlink_never_matches_source_file() {
    let trees = Trees::new();
    write(&trees.source, "link.txt", "real");
    write(&trees.root, "outside.txt", "real");
    std::os::unix::fs::symlink(trees.root.join("outside.txt"), trees.replica.join("link.txt")).unwrap();

    let classification = TreeComparator::new(&LocalFs).compare(&trees.source, &trees.replica).unwrap();

    let entry = classification.common[&PathBuf::from("link.txt")];
    assert_eq!(entry.replica_kind, EntryKind::Symlink);
    assert!(entry.kind_changed());
}
