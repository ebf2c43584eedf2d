//! Stratified train/test split over tag groups.

use rand::{rngs::StdRng, seq::index::sample, SeedableRng};
use std::collections::BTreeMap;

/// Row indices assigned to each side of a split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    /// Tag groups of a single row (always routed to train)
    pub singletons: usize,
}

/// How many rows of a group of `n` go to test.
///
/// Groups of one never contribute; otherwise at least one row and
/// `ceil(n * percent / 100)` at most `n`.
pub fn test_count(n: usize, percent: u32) -> usize {
    if n <= 1 {
        return 0;
    }
    let percent = percent.clamp(1, 100) as usize;
    (n * percent).div_ceil(100).clamp(1, n)
}

/// Split `tags` (one per row) into train/test index sets.
///
/// Groups are visited in ascending tag order and sampled from one seeded
/// generator, so the same input and seed always give the same split.
pub fn stratified_split<S: AsRef<str>>(tags: &[S], percent: u32, seed: u64) -> Split {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, tag) in tags.iter().enumerate() {
        groups.entry(tag.as_ref()).or_default().push(idx);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut split = Split::default();

    for (tag, ids) in groups {
        let n = ids.len();
        if n <= 1 {
            split.singletons += 1;
            split.train.extend(ids);
            continue;
        }

        let count = test_count(n, percent);
        let chosen = sample(&mut rng, n, count).into_vec();
        log::debug!("tag {tag:?}: {n} rows, {count} to test");

        let mut in_test = vec![false; n];
        for &pos in &chosen {
            in_test[pos] = true;
            split.test.push(ids[pos]);
        }
        split.train.extend(
            ids.iter()
                .zip(in_test)
                .filter(|(_, test)| !test)
                .map(|(id, _)| *id),
        );
    }

    split
}
