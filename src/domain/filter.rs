//! Security selection for a single rebalancing date.

/// Securities chosen for one date, with the value they were chosen on.
pub type SecuritySelection = Vec<(String, f64)>;

/// Rule selecting securities from one date's values of `field`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterRule {
    /// The `n` largest values, descending. Ties at the cut-off are all kept.
    TopN { field: String, n: usize },
    /// Every value strictly above `threshold`, in row order.
    ValueThreshold { field: String, threshold: f64 },
}

impl FilterRule {
    /// Data field the rule reads.
    pub fn field(&self) -> &str {
        match self {
            FilterRule::TopN { field, .. } | FilterRule::ValueThreshold { field, .. } => field,
        }
    }
}

/// Apply `rule` to a row of (security, value) pairs. An empty result is not an
/// error; the caller decides what an empty selection means.
pub fn apply(row: &[(&str, f64)], rule: &FilterRule) -> SecuritySelection {
    match rule {
        FilterRule::TopN { n, .. } => top_n(row, *n),
        FilterRule::ValueThreshold { threshold, .. } => above_threshold(row, *threshold),
    }
}

/// Largest `n` values, descending; equal values keep row order. Every security
/// tied with the n-th value is included, so the result may exceed `n`.
pub fn top_n(row: &[(&str, f64)], n: usize) -> SecuritySelection {
    if n == 0 {
        return Vec::new();
    }

    let mut sorted: SecuritySelection = row.iter().map(|(s, v)| (s.to_string(), *v)).collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));

    if n >= sorted.len() {
        return sorted;
    }

    let cutoff = sorted[n - 1].1;
    let keep = n + sorted[n..].iter().take_while(|(_, v)| *v == cutoff).count();
    sorted.truncate(keep);
    sorted
}

/// Values strictly greater than `threshold`. Row order is preserved; no sort
/// is implied.
pub fn above_threshold(row: &[(&str, f64)], threshold: f64) -> SecuritySelection {
    row.iter()
        .filter(|(_, v)| *v > threshold)
        .map(|(s, v)| (s.to_string(), *v))
        .collect()
}
