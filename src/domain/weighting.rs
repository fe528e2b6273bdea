//! Weight allocation across a date's selected securities.
//!
//! `Optimized` maximizes the value-weighted sum `Σ vᵢ·wᵢ` subject to
//! `Σ wᵢ = 1` and `lower ≤ wᵢ ≤ upper`. With a single equality constraint and
//! box bounds the linear program has a closed-form optimum: every security
//! starts at `lower`, then the remaining `1 − n·lower` is handed out in
//! descending value order, at most `upper − lower` each. Securities with equal
//! values are filled in selection order (stable sort), so among ties the
//! earlier security receives the larger share.
//!
//! Request validation keeps bounds inside `[0, 1]`. Rules built directly with
//! non-finite bounds pass the feasibility test but produce non-finite weights,
//! which `allocate` reports as `RebalanceError::Allocation`.

use std::collections::BTreeMap;

use crate::domain::error::RebalanceError;
use crate::domain::filter::SecuritySelection;

/// Security identifier → portfolio weight.
pub type WeightMap = BTreeMap<String, f64>;

/// Decimal places equal weights are rounded to.
pub const EQUAL_WEIGHT_DECIMALS: i32 = 6;

/// Allowed deviation of an optimized allocation's sum from 1.
pub const OPTIMIZED_SUM_TOLERANCE: f64 = 1e-4;

const FEASIBILITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightingRule {
    /// `1/n` for each of the `n` selected securities.
    Equal,
    /// Value-maximizing weights within `[lower_bound, upper_bound]`.
    Optimized { lower_bound: f64, upper_bound: f64 },
}

/// Weights for `selection` under `rule`.
///
/// An empty map means no allocation exists: the selection was empty or the
/// bounds cannot sum to 1 for this many securities. `Err` is reserved for an
/// allocation that came out malformed.
pub fn allocate(
    selection: &SecuritySelection,
    rule: &WeightingRule,
) -> Result<WeightMap, RebalanceError> {
    if selection.is_empty() {
        return Ok(WeightMap::new());
    }

    let (weights, tolerance) = match *rule {
        WeightingRule::Equal => (
            equal_weights(selection),
            selection.len() as f64 * 10f64.powi(-EQUAL_WEIGHT_DECIMALS) + FEASIBILITY_EPSILON,
        ),
        WeightingRule::Optimized {
            lower_bound,
            upper_bound,
        } => (
            optimized_weights(selection, lower_bound, upper_bound),
            OPTIMIZED_SUM_TOLERANCE,
        ),
    };

    if !weights.is_empty() {
        check_weights(&weights, tolerance)?;
    }
    Ok(weights)
}

pub fn equal_weights(selection: &SecuritySelection) -> WeightMap {
    let w = round_to(1.0 / selection.len() as f64, EQUAL_WEIGHT_DECIMALS);
    selection.iter().map(|(sec, _)| (sec.clone(), w)).collect()
}

/// Whether `n` weights bounded by `[lower, upper]` can sum to 1.
pub fn is_feasible(n: usize, lower: f64, upper: f64) -> bool {
    let n = n as f64;
    lower <= upper
        && n * lower <= 1.0 + FEASIBILITY_EPSILON
        && n * upper >= 1.0 - FEASIBILITY_EPSILON
}

pub fn optimized_weights(selection: &SecuritySelection, lower: f64, upper: f64) -> WeightMap {
    let n = selection.len();
    if n == 0 || !is_feasible(n, lower, upper) {
        return WeightMap::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| selection[b].1.total_cmp(&selection[a].1));

    let mut weights = vec![lower; n];
    let mut leftover = 1.0 - n as f64 * lower;
    let headroom = upper - lower;

    for i in order {
        if leftover <= 0.0 {
            break;
        }
        let add = headroom.min(leftover);
        weights[i] += add;
        leftover -= add;
    }

    selection
        .iter()
        .zip(weights)
        .map(|((sec, _), w)| (sec.clone(), w))
        .collect()
}

fn check_weights(weights: &WeightMap, tolerance: f64) -> Result<(), RebalanceError> {
    if let Some((sec, w)) = weights.iter().find(|(_, w)| !w.is_finite()) {
        return Err(RebalanceError::Allocation {
            reason: format!("non-finite weight {} for {}", w, sec),
        });
    }
    let total: f64 = weights.values().sum();
    if (total - 1.0).abs() > tolerance {
        return Err(RebalanceError::Allocation {
            reason: format!("weights sum to {:.8}, expected 1", total),
        });
    }
    Ok(())
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
