//! Top-K cosine-similarity ranking.
//!
//! [`rank`] scores every candidate against a query vector and returns the best `k`,
//! best-first. It is a pure function: no I/O, no shared state.

use thiserror::Error;

/// Anything that carries an embedding vector and an identifier.
pub trait Embedded {
    fn id(&self) -> &str;
    fn embedding(&self) -> &[f32];
}

/// A candidate paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub item: T,
    pub similarity: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum RankError {
    #[error("candidate {id} has {found} dimensions, query has {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        found: usize,
    },
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum()
}

fn magnitude(v: &[f32]) -> f64 {
    v.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt()
}

/// Cosine similarity of two equal-length vectors. Zero-magnitude input yields 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    let sim = dot(a, b) / (mag_a * mag_b);
    if sim.is_finite() {
        sim
    } else {
        0.0
    }
}

/// Return up to `k` candidates most similar to `query`, best first.
///
/// An empty or all-zero query, an empty candidate set, or `k == 0` yields an empty
/// result. Ties keep input order. Any candidate whose dimensionality differs from
/// the query rejects the whole call.
pub fn rank<T: Embedded>(query: &[f32], candidates: Vec<T>, k: usize) -> Result<Vec<Ranked<T>>, RankError> {
    if k == 0 || candidates.is_empty() || magnitude(query) == 0.0 {
        return Ok(Vec::new());
    }

    if let Some(bad) = candidates
        .iter()
        .find(|c| c.embedding().len() != query.len())
    {
        return Err(RankError::DimensionMismatch {
            id: bad.id().to_string(),
            expected: query.len(),
            found: bad.embedding().len(),
        });
    }

    let mut scored: Vec<Ranked<T>> = candidates
        .into_iter()
        .map(|item| {
            let similarity = cosine_similarity(query, item.embedding());
            Ranked { item, similarity }
        })
        .collect();

    // sort_by is stable: equal scores keep input order
    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    scored.truncate(k);
    Ok(scored)
}
