//! Reciprocal Rank Fusion (RRF) for combining search results.

use std::collections::HashMap;

use ragfusion_core::{FusedResult, RankedList};

/// Default RRF constant.
/// Higher values flatten the influence of exact rank position.
pub const DEFAULT_RRF_K: u32 = 60;

/// Fuse multiple ranked lists using Reciprocal Rank Fusion.
///
/// RRF score = Σ 1 / (k + rank + 1) over every list containing the item,
/// with `rank` zero-based.
///
/// Each id appears once in the output. The first occurrence across the
/// lists, in input order, supplies the payload. Results are sorted by fused
/// score descending; equal scores keep first-seen order. A `k` of zero is
/// treated as one.
pub fn reciprocal_rank_fusion(result_sets: Vec<RankedList>, k: u32) -> Vec<FusedResult> {
    let k = f64::from(k.max(1));

    let mut fused: Vec<FusedResult> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for result_list in result_sets {
        for (rank, item) in result_list.into_iter().enumerate() {
            let rrf_score = 1.0 / (k + rank as f64 + 1.0);

            match positions.get(&item.id) {
                Some(&pos) => fused[pos].fusion_score += rrf_score,
                None => {
                    positions.insert(item.id.clone(), fused.len());
                    fused.push(FusedResult {
                        item,
                        fusion_score: rrf_score,
                    });
                }
            }
        }
    }

    // Stable sort keeps first-seen order for ties
    fused.sort_by(|a, b| b.fusion_score.total_cmp(&a.fusion_score));

    fused
}
