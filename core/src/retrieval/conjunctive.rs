//! AND queries over term groups with skip-pointer intersection.

use crate::index::{DocumentId, InvertedIndex};
use crate::retrieval::TermGroup;

/// Skip attempts that landed (`hits`) or overshot (`misses`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipStats {
    pub hits: usize,
    pub misses: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intersection {
    pub docs: Vec<DocumentId>,
    pub stats: SkipStats,
}

/// Documents containing at least one term of every group, ascending by id.
pub fn conjunctive(groups: &[TermGroup], index: &InvertedIndex) -> Intersection {
    let mut unions: Vec<Vec<DocumentId>> = groups
        .iter()
        .map(|group| {
            let mut ids: Vec<DocumentId> = group
                .iter()
                .filter_map(|term| index.get(term))
                .flat_map(|list| list.doc_ids())
                .collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        })
        .collect();
    if unions.is_empty() || unions.iter().any(Vec::is_empty) {
        return Intersection::default();
    }
    unions.sort_by_key(Vec::len);

    let mut stats = SkipStats::default();
    let mut lists = unions.into_iter();
    let mut docs = lists.next().unwrap_or_default();
    for list in lists {
        if docs.is_empty() {
            break;
        }
        docs = intersect(&docs, &list, &mut stats);
    }
    tracing::debug!(matched = docs.len(), skip_hits = stats.hits, skip_misses = stats.misses, "conjunctive match");
    Intersection { docs, stats }
}

/// Skip distance for a list of `len` entries: floor(sqrt(len)) / 2.
pub fn skip_distance(len: usize) -> usize {
    ((len as f64).sqrt().floor() as usize) / 2
}

/// Intersects two ascending id lists.
pub fn intersect(a: &[DocumentId], b: &[DocumentId], stats: &mut SkipStats) -> Vec<DocumentId> {
    let skip_a = skip_distance(a.len());
    let skip_b = skip_distance(b.len());
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i = advance(a, i, b[j], skip_a, stats),
            std::cmp::Ordering::Greater => j = advance(b, j, a[i], skip_b, stats),
        }
    }
    out
}

/// Moves past `list[pos] < target`. Tries a skip first; an overshooting skip
/// backs off by the overshoot, landing on `target` or the first entry above it.
fn advance(list: &[DocumentId], pos: usize, target: DocumentId, skip: usize, stats: &mut SkipStats) -> usize {
    if skip == 0 {
        return pos + 1;
    }
    let jump = (pos + skip).min(list.len() - 1);
    if jump <= pos {
        return pos + 1;
    }
    if list[jump] <= target {
        stats.hits += 1;
        return jump;
    }
    stats.misses += 1;
    let mut back = jump;
    while back > pos + 1 && list[back - 1] > target {
        back -= 1;
    }
    if list[back - 1] == target {
        back - 1
    } else {
        back
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ids(offsets: &[u32]) -> Vec<DocumentId> {
        offsets.iter().map(|&o| DocumentId::new(0, o)).collect()
    }

    #[test]
    fn two_overlapping_lists_share_one_document() {
        let mut stats = SkipStats::default();
        assert_eq!(intersect(&ids(&[1, 2]), &ids(&[2, 3]), &mut stats), ids(&[2]));
    }

    #[test]
    fn skipping_matches_a_linear_merge() {
        let a: Vec<u32> = (0..400).filter(|x| x % 3 == 0).collect();
        let b: Vec<u32> = (0..400).filter(|x| x % 7 == 0 || *x == 398).collect();
        let expected: Vec<u32> = a.iter().copied().filter(|x| b.contains(x)).collect();
        let mut stats = SkipStats::default();
        assert_eq!(intersect(&ids(&a), &ids(&b), &mut stats), ids(&expected));
        assert!(stats.hits + stats.misses > 0);
        // argument order does not matter
        let mut stats = SkipStats::default();
        assert_eq!(intersect(&ids(&b), &ids(&a), &mut stats), ids(&expected));
    }

    #[test]
    fn skip_distance_follows_square_root() {
        assert_eq!(skip_distance(3), 0);
        assert_eq!(skip_distance(16), 2);
        assert_eq!(skip_distance(100), 5);
    }

    #[test]
    fn groups_union_their_expansions() {
        let mut counts: Vec<(DocumentId, HashMap<String, u32>)> = Vec::new();
        for (doc, words) in [(1, "cat dog"), (2, "cats bird"), (3, "dog")] {
            let map = words.split(' ').map(|w| (w.to_string(), 1)).collect();
            counts.push((DocumentId::new(0, doc), map));
        }
        let index = InvertedIndex::from_document_counts(counts, 3);
        let groups = vec![vec!["cat".to_string(), "cats".to_string()], vec!["dog".to_string()]];
        assert_eq!(conjunctive(&groups, &index).docs, ids(&[1]));
        let groups = vec![vec!["cat".to_string()], vec!["unicorn".to_string()]];
        assert!(conjunctive(&groups, &index).docs.is_empty());
    }
}
