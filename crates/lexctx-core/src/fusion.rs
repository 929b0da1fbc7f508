//! Weighted rank fusion of the shared and per-user result lists.
//!
//! # Fusion
//!
//! For every distinct passage id found in either list:
//!
//! ```text
//! fused = w_shared × score_in_shared + w_user × score_in_user
//! ```
//!
//! A list in which the passage does not appear contributes `0`. Results are
//! sorted by fused score (descending). The sort is stable over discovery
//! order (shared list first, then user list, each in rank order), so equal
//! scores never reorder between runs.
//!
//! [`merge_max`] combines several fused lists (one per query paraphrase)
//! into a single list, keeping the best score per passage.

use std::collections::{HashMap, HashSet};

use crate::models::{FusedPassage, Origin, RetrievedPassage};

/// Per-index weights applied during fusion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub shared: f64,
    pub user: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            shared: 0.5,
            user: 0.5,
        }
    }
}

impl FusionWeights {
    fn for_origin(&self, origin: Origin) -> f64 {
        match origin {
            Origin::Shared => self.shared,
            Origin::User => self.user,
        }
    }
}

/// Fuse the shared and user result lists into at most `limit` passages.
///
/// ```rust
/// use lexctx_core::fusion::{weighted_fusion, FusionWeights};
/// use lexctx_core::models::{RetrievedPassage, SourceMeta};
///
/// let p = |id: &str, score: f64| RetrievedPassage {
///     id: id.into(),
///     collection: "c".into(),
///     text: id.into(),
///     meta: SourceMeta::default(),
///     score,
/// };
/// let fused = weighted_fusion(&[p("a", 0.8)], &[p("b", 0.6)], FusionWeights::default(), 10);
/// assert_eq!(fused[0].id, "a");
/// assert!((fused[0].score - 0.4).abs() < 1e-9);
/// assert!((fused[1].score - 0.3).abs() < 1e-9);
/// ```
pub fn weighted_fusion(
    shared: &[RetrievedPassage],
    user: &[RetrievedPassage],
    weights: FusionWeights,
    limit: usize,
) -> Vec<FusedPassage> {
    let mut fused: Vec<FusedPassage> = Vec::with_capacity(shared.len() + user.len());
    let mut position: HashMap<String, usize> = HashMap::new();
    // Tracks which lists already contributed to an entry, so a duplicate id
    // inside one list is counted once.
    let mut seen_in: HashSet<(String, Origin)> = HashSet::new();

    let lists = [(Origin::Shared, shared), (Origin::User, user)];
    for (origin, list) in lists {
        let weight = weights.for_origin(origin);
        for passage in list {
            if !seen_in.insert((passage.id.clone(), origin)) {
                continue;
            }
            let contribution = weight * passage.score;
            match position.get(&passage.id) {
                Some(&i) => fused[i].score += contribution,
                None => {
                    position.insert(passage.id.clone(), fused.len());
                    fused.push(FusedPassage {
                        id: passage.id.clone(),
                        collection: passage.collection.clone(),
                        origin,
                        text: passage.text.clone(),
                        meta: passage.meta.clone(),
                        score: contribution,
                    });
                }
            }
        }
    }

    sort_desc(&mut fused);
    fused.truncate(limit);
    fused
}

/// Union of several fused lists, deduplicated by id keeping the maximum
/// score. Ties keep discovery order (list order, then rank within list).
pub fn merge_max(lists: Vec<Vec<FusedPassage>>) -> Vec<FusedPassage> {
    let mut merged: Vec<FusedPassage> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for passage in lists.into_iter().flatten() {
        match position.get(&passage.id) {
            Some(&i) => {
                if passage.score > merged[i].score {
                    merged[i].score = passage.score;
                }
            }
            None => {
                position.insert(passage.id.clone(), merged.len());
                merged.push(passage);
            }
        }
    }

    sort_desc(&mut merged);
    merged
}

fn sort_desc(passages: &mut [FusedPassage]) {
    passages.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
