use tracing::warn;

use crate::error::SearchError;
use crate::models::RetrievalHit;

/// Maximal-Marginal-Relevance parameters: select `k` results from a pool of
/// `fetch_k` nearest neighbors, trading relevance against diversity with
/// `lambda_mult` (1.0 = pure relevance, 0.0 = pure diversity).
#[derive(Debug, Clone, Copy)]
pub struct MmrParams {
    pub k: usize,
    pub fetch_k: usize,
    pub lambda_mult: f32,
}

impl Default for MmrParams {
    fn default() -> Self {
        Self {
            k: 5,
            fetch_k: 10,
            lambda_mult: 0.5,
        }
    }
}

impl MmrParams {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.k == 0 {
            return Err(SearchError::Request("k must be positive".to_string()));
        }
        if self.fetch_k < self.k {
            return Err(SearchError::Request(format!(
                "fetch_k {} must be at least k {}",
                self.fetch_k, self.k
            )));
        }
        if !(0.0..=1.0).contains(&self.lambda_mult) {
            return Err(SearchError::Request(format!(
                "lambda_mult {} must be within [0, 1]",
                self.lambda_mult
            )));
        }
        Ok(())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (left, right) in a.iter().zip(b) {
        dot += left * right;
        norm_a += left * left;
        norm_b += right * right;
    }
    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        dot / denominator
    }
}

/// Greedy MMR selection over candidate hits carrying their stored vectors.
/// Each round picks the candidate maximizing
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`.
/// Candidates without a vector cannot be scored and are dropped.
pub fn mmr_select(
    query_vector: &[f32],
    candidates: Vec<RetrievalHit>,
    params: &MmrParams,
) -> Vec<RetrievalHit> {
    let mut pool: Vec<(RetrievalHit, Vec<f32>)> = Vec::with_capacity(candidates.len());
    for hit in candidates {
        match hit.vector.clone() {
            Some(vector) => pool.push((hit, vector)),
            None => warn!(chunk_key = %hit.chunk_key, "candidate hit lacks a vector, dropped from MMR"),
        }
    }

    let mut selected: Vec<(RetrievalHit, Vec<f32>)> = Vec::with_capacity(params.k);
    while selected.len() < params.k && !pool.is_empty() {
        let mut best_position = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (position, (_, vector)) in pool.iter().enumerate() {
            let relevance = cosine_similarity(query_vector, vector);
            let redundancy = selected
                .iter()
                .map(|(_, picked)| cosine_similarity(vector, picked))
                .fold(0.0f32, f32::max);
            let score =
                params.lambda_mult * relevance - (1.0 - params.lambda_mult) * redundancy;
            if score > best_score {
                best_score = score;
                best_position = position;
            }
        }

        selected.push(pool.remove(best_position));
    }

    selected.into_iter().map(|(hit, _)| hit).collect()
}
