//! Property tests for shard tiling and index-model reconstruction.
//!
//! Run with: `cargo test --test property`

use std::sync::Arc;

use git2::Oid;
use proptest::prelude::*;
use treestatusd::index_model::{EntrySnapshot, Index, Snapshot};
use treestatusd::{derive_shards, PathArena, PathOrder};

/// Sorted, deduplicated relative paths with git-like shape.
///
/// Paths that would collide with a directory of the same name (a file `a`
/// next to `a/b`) are filtered out; git forbids that layout in an index.
fn arb_paths() -> impl Strategy<Value = Vec<Vec<u8>>> {
    let segment = prop::string::string_regex("[a-z][a-z0-9_.]{0,6}").unwrap();
    let path = prop::collection::vec(segment, 1..4).prop_map(|segs| segs.join("/").into_bytes());
    prop::collection::vec(path, 1..300).prop_map(|mut paths| {
        paths.sort();
        paths.dedup();
        let snapshot = paths.clone();
        paths.retain(|p| {
            let mut as_dir = p.clone();
            as_dir.push(b'/');
            !snapshot.iter().any(|q| q.starts_with(&as_dir))
        });
        paths
    })
}

fn snapshot_for(paths: &[Vec<u8>], order: PathOrder) -> Snapshot {
    let mut arena = PathArena::new();
    let mut entries = Vec::with_capacity(paths.len());
    for p in paths {
        let path = arena.intern(p).unwrap();
        entries.push(EntrySnapshot {
            path,
            oid: Oid::zero(),
            mode: 0o100644,
            mtime_s: 0,
            mtime_ns: 0,
            ino: 0,
            gid: 0,
            size: 0,
            intent_to_add: false,
        });
    }
    Snapshot {
        arena,
        entries,
        conflicted: Vec::new(),
        ita_count: 0,
        total_entries: paths.len(),
        order,
        index_mtime_s: i64::MAX,
        filemode: true,
    }
}

proptest! {
    /// Shards tile the key space: every path lands in exactly one shard,
    /// and the shard count respects the thread bound.
    #[test]
    fn shards_tile_exactly(paths in arb_paths(), threads in 1usize..9) {
        let order = PathOrder::Sensitive;
        let shards = derive_shards(order, threads, paths.len(), |i| paths[i].as_slice());

        prop_assert!(!shards.is_empty());
        prop_assert!(shards.len() <= 16 * threads + 1);
        prop_assert!(shards[0].start.is_empty());
        prop_assert!(shards[shards.len() - 1].end.is_empty());

        for p in &paths {
            let hits = shards.iter().filter(|s| s.contains(order, p)).count();
            prop_assert_eq!(hits, 1, "path {:?}", String::from_utf8_lossy(p));
        }
    }

    /// Arbitrary probe strings also land in exactly one shard: the tiling
    /// covers the whole key space, not just the paths it was derived from.
    #[test]
    fn shards_cover_foreign_strings(
        paths in arb_paths(),
        probes in prop::collection::vec("[a-z][a-z0-9/._]{0,20}", 1..50),
    ) {
        let order = PathOrder::Sensitive;
        let shards = derive_shards(order, 4, paths.len(), |i| paths[i].as_slice());
        for probe in &probes {
            let hits = shards
                .iter()
                .filter(|s| s.contains(order, probe.as_bytes()))
                .count();
            prop_assert_eq!(hits, 1, "probe {:?}", probe);
        }
    }

    /// Flattening the directory forest reproduces the entry list exactly,
    /// and every directory prefix appears exactly once.
    #[test]
    fn forest_flattens_to_entry_list(paths in arb_paths()) {
        let snap = Arc::new(snapshot_for(&paths, PathOrder::Sensitive));
        let index = Index::new(std::path::PathBuf::from("/nonexistent"), Arc::clone(&snap), 4).unwrap();

        let mut flattened: Vec<Vec<u8>> = index
            .dirs()
            .iter()
            .flat_map(|d| d.files.iter().map(|&i| snap.path_at(i as usize).to_vec()))
            .collect();
        flattened.sort();
        prop_assert_eq!(flattened, paths.clone());

        let mut dir_paths: Vec<Vec<u8>> = index
            .dirs()
            .iter()
            .map(|d| snap.arena.get(d.path).to_vec())
            .collect();
        let total_dirs = dir_paths.len();
        dir_paths.sort();
        dir_paths.dedup();
        prop_assert_eq!(dir_paths.len(), total_dirs, "duplicate directory nodes");

        let mut expected_dirs: Vec<Vec<u8>> = paths
            .iter()
            .flat_map(|p| {
                (0..p.len())
                    .filter(|&i| p[i] == b'/')
                    .map(|i| p[..=i].to_vec())
                    .collect::<Vec<_>>()
            })
            .collect();
        expected_dirs.push(Vec::new());
        expected_dirs.sort();
        expected_dirs.dedup();
        let mut actual = index
            .dirs()
            .iter()
            .map(|d| snap.arena.get(d.path).to_vec())
            .collect::<Vec<_>>();
        actual.sort();
        prop_assert_eq!(actual, expected_dirs);
    }

    /// Subdirectory lists are sorted and files sit in the directory whose
    /// path prefixes them.
    #[test]
    fn forest_structure_invariants(paths in arb_paths()) {
        let order = PathOrder::Sensitive;
        let snap = Arc::new(snapshot_for(&paths, order));
        let index = Index::new(std::path::PathBuf::from("/nonexistent"), Arc::clone(&snap), 2).unwrap();

        for dir in index.dirs() {
            let dir_path = snap.arena.get(dir.path).to_vec();
            prop_assert!(dir_path.is_empty() || dir_path.ends_with(b"/"));
            for &fi in &dir.files {
                let file_path = snap.path_at(fi as usize);
                prop_assert!(file_path.starts_with(&dir_path));
                prop_assert!(
                    !file_path[dir_path.len()..].contains(&b'/'),
                    "file must sit directly in its directory"
                );
            }
            let mut subdirs: Vec<&[u8]> =
                dir.subdirs.iter().map(|&s| snap.arena.get(s)).collect();
            let sorted = subdirs.windows(2).all(|w| w[0] < w[1]);
            prop_assert!(sorted, "subdirs must be strictly sorted");
            subdirs.dedup();
            prop_assert_eq!(subdirs.len(), dir.subdirs.len());
        }
    }
}
