//! String-range shards over the index entry space.
//!
//! A shard is a pair of inclusive string-prefix bounds used to slice sorted
//! path sequences for parallel scanning. Shards tile the whole key space:
//! the first starts at `""`, the last ends at `""` (open end), and bounds
//! never split a directory between two shards because every boundary is a
//! directory prefix with its final byte decremented.
//!
//! # Invariants
//! - `shards[0].start` is empty and `shards.last().end` is empty.
//! - Bounds are strictly increasing under the active [`PathOrder`].
//! - `shards.len() <= 16 * num_threads + 1`.

use crate::strcmp::PathOrder;

/// Entries per shard the derivation aims for.
const ENTRIES_PER_SHARD: usize = 512;

/// Shards per worker thread the derivation allows.
const SHARDS_PER_THREAD: usize = 16;

/// One contiguous range of the entry key space.
///
/// `start` is an ordinary inclusive lower bound. `end` is an inclusive
/// string *prefix* bound: a path is inside if its `end.len()`-byte prefix
/// compares at or below `end`. An empty `end` means "open".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shard {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl Shard {
    /// The single shard covering everything.
    #[must_use]
    pub fn open() -> Self {
        Self {
            start: Vec::new(),
            end: Vec::new(),
        }
    }

    /// True if `path` falls inside this shard under `order`.
    #[inline]
    #[must_use]
    pub fn contains(&self, order: PathOrder, path: &[u8]) -> bool {
        use std::cmp::Ordering;
        if order.cmp(path, &self.start) == Ordering::Less {
            return false;
        }
        self.end.is_empty() || order.prefix_cmp(path, &self.end) != Ordering::Greater
    }
}

/// Derives shard bounds from a sorted entry path sequence.
///
/// Candidate split points sit at `i * len / target` for each interior `i`.
/// Each split takes the directory portion of that entry's path and
/// decrements its final byte (always `/`, so this never underflows) to form
/// the previous shard's inclusive end. Splits producing empty or
/// non-increasing ranges are rejected, so the result may have fewer shards
/// than the target.
pub fn derive_shards<'a, F>(
    order: PathOrder,
    num_threads: usize,
    len: usize,
    path_at: F,
) -> Vec<Shard>
where
    F: Fn(usize) -> &'a [u8],
{
    use std::cmp::Ordering;

    let target = (len / ENTRIES_PER_SHARD + 1)
        .min(SHARDS_PER_THREAD * num_threads)
        .max(1);
    if target == 1 || len == 0 {
        return vec![Shard::open()];
    }

    let mut shards = Vec::with_capacity(target);
    let mut last: Vec<u8> = Vec::new();

    for i in 1..target {
        let path = path_at(i * len / target);
        let Some(slash) = path.iter().rposition(|&b| b == b'/') else {
            continue;
        };
        let dir = &path[..slash + 1];
        let mut end = dir.to_vec();
        let tail = end.last_mut().expect("directory prefix is non-empty");
        debug_assert_eq!(*tail, b'/');
        *tail -= 1;
        if order.cmp(&end, &last) != Ordering::Greater {
            continue;
        }
        shards.push(Shard {
            start: std::mem::take(&mut last),
            end,
        });
        last = dir.to_vec();
    }
    shards.push(Shard {
        start: last,
        end: Vec::new(),
    });

    assert!(!shards.is_empty());
    assert!(shards.len() <= target);
    assert!(shards[0].start.is_empty());
    assert!(shards[shards.len() - 1].end.is_empty());
    for i in 1..shards.len() {
        assert_eq!(
            order.cmp(&shards[i - 1].end, &shards[i].start),
            Ordering::Less,
            "shard bounds must increase"
        );
    }
    shards
}

/// Splits a sorted path list into per-shard ranges.
///
/// Returns `(shard_index, start..end)` for every non-empty run. Since the
/// shards tile the key space and `paths` is sorted under the same order,
/// every path lands in exactly one range.
pub fn chunk_by_shard(
    shards: &[Shard],
    order: PathOrder,
    paths: &[impl AsRef<[u8]>],
) -> Vec<(usize, std::ops::Range<usize>)> {
    let mut out = Vec::new();
    let mut shard = 0usize;
    let mut run_start = 0usize;

    for (i, p) in paths.iter().enumerate() {
        let p = p.as_ref();
        if shards[shard].contains(order, p) {
            continue;
        }
        if run_start < i {
            out.push((shard, run_start..i));
        }
        run_start = i;
        while !shards[shard].contains(order, p) {
            shard += 1;
            assert!(shard < shards.len(), "path beyond final shard");
        }
    }
    if run_start < paths.len() {
        out.push((shard, run_start..paths.len()));
    }
    out
}
