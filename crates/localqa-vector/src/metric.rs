use localqa_core::config::Metric;

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Similarity of a stored vector to a query, higher is closer.
///
/// Norms are passed in so callers can cache them. Cosine against a zero
/// vector is 0.
pub fn similarity(metric: Metric, query: &[f32], query_norm: f32, v: &[f32], v_norm: f32) -> f32 {
    match metric {
        Metric::InnerProduct => dot(query, v),
        Metric::Cosine => {
            if query_norm == 0.0 || v_norm == 0.0 {
                0.0
            } else {
                dot(query, v) / (query_norm * v_norm)
            }
        }
    }
}
