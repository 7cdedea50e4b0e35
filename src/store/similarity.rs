//! Cosine similarity and ranked, max-pooled pagination.
//!
//! [`cosine_similarity`] takes the `ndarray` path when every candidate vector
//! has the query's dimension and falls back to an elementwise loop otherwise.
//! Both compute in `f64` and give the same scores.

use std::collections::HashSet;

use ndarray::{Array1, Array2, Axis};

use crate::store::index::Index;
use crate::store::types::{Item, SearchItem};

/// Similarity of `query` against each of `vectors`. Zero norms and dimension
/// mismatches score `0.0`.
pub fn cosine_similarity(query: &[f32], vectors: &[&[f32]]) -> Vec<f64> {
    let uniform = !query.is_empty() && vectors.iter().all(|v| v.len() == query.len());
    if uniform && !vectors.is_empty() {
        cosine_similarity_matrix(query, vectors)
    } else {
        cosine_similarity_loop(query, vectors)
    }
}

pub(crate) fn cosine_similarity_matrix(query: &[f32], vectors: &[&[f32]]) -> Vec<f64> {
    let flat: Vec<f64> = vectors
        .iter()
        .flat_map(|v| v.iter().map(|&x| f64::from(x)))
        .collect();
    let matrix = match Array2::from_shape_vec((vectors.len(), query.len()), flat) {
        Ok(m) => m,
        Err(_) => return cosine_similarity_loop(query, vectors),
    };
    let q: Array1<f64> = query.iter().map(|&x| f64::from(x)).collect();

    let q_norm = q.dot(&q).sqrt();
    let dots = matrix.dot(&q);
    let norms = matrix.map_axis(Axis(1), |row| row.dot(&row).sqrt());

    dots.iter()
        .zip(norms.iter())
        .map(|(&d, &n)| ratio(d, n * q_norm))
        .collect()
}

pub(crate) fn cosine_similarity_loop(query: &[f32], vectors: &[&[f32]]) -> Vec<f64> {
    let q_norm = norm(query);
    vectors
        .iter()
        .map(|v| {
            if v.len() != query.len() {
                return 0.0;
            }
            let d: f64 = query
                .iter()
                .zip(v.iter())
                .map(|(&a, &b)| f64::from(a) * f64::from(b))
                .sum();
            ratio(d, norm(v) * q_norm)
        })
        .collect()
}

fn norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt()
}

fn ratio(dot: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

/// Score `candidates` against `query_embedding` and paginate the deduplicated
/// ranking.
///
/// A candidate with several vectors (one per indexed field) is kept once, at
/// its best score. `offset`/`limit` count distinct items. Candidates without
/// vectors are appended unscored, in candidate order, when the ranked page
/// came up short of `limit`.
pub fn rank(
    index: &Index,
    candidates: &[&Item],
    query_embedding: &[f32],
    offset: usize,
    limit: usize,
) -> Vec<SearchItem> {
    let mut flat_items: Vec<&Item> = Vec::new();
    let mut flat_vectors: Vec<&[f32]> = Vec::new();
    let mut scoreless: Vec<&Item> = Vec::new();

    for &candidate in candidates {
        match index.vectors(&candidate.namespace, &candidate.key) {
            Some(vectors) if !vectors.is_empty() => {
                for vector in vectors.values() {
                    flat_items.push(candidate);
                    flat_vectors.push(vector.as_slice());
                }
            }
            _ => scoreless.push(candidate),
        }
    }

    let scores = cosine_similarity(query_embedding, &flat_vectors);
    let mut scored: Vec<(f64, &Item)> = scores.into_iter().zip(flat_items).collect();
    // Stable, so equal scores stay in candidate order.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut seen: HashSet<(&[String], &str)> = HashSet::new();
    let mut kept: Vec<SearchItem> = Vec::new();
    for (score, item) in scored {
        let position = seen.len();
        if !seen.insert((item.namespace.as_slice(), item.key.as_str())) {
            continue;
        }
        if position >= offset.saturating_add(limit) {
            break;
        }
        if position < offset {
            continue;
        }
        kept.push(SearchItem {
            item: item.clone(),
            score: Some(score),
        });
    }

    if kept.len() < limit {
        let missing = limit - kept.len();
        kept.extend(
            scoreless
                .into_iter()
                .take(missing)
                .map(|item| SearchItem::unscored(item.clone())),
        );
    }

    kept
}
