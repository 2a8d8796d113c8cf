//! Vector similarity math.

/// Euclidean norm of a vector
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero magnitude or the lengths differ,
/// instead of producing NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a = magnitude(a);
    let magnitude_b = magnitude(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// Cosine similarity with the query norm computed once by the caller
pub(crate) fn cosine_similarity_with_norm(query: &[f32], query_norm: f32, candidate: &[f32]) -> f32 {
    if query.len() != candidate.len() || query_norm == 0.0 {
        return 0.0;
    }

    let candidate_norm = magnitude(candidate);
    if candidate_norm == 0.0 {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(candidate).map(|(x, y)| x * y).sum();
    dot_product / (query_norm * candidate_norm)
}
