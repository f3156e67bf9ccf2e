//! Hyperparameter grid expansion.
//!
//! A model grid maps parameter names to candidate lists. Expansion is the
//! cartesian product over parameter names in sorted order, with the first
//! name varying slowest. This matches the order scikit-learn's
//! `ParameterGrid` produces, so candidate indices line up with the training
//! side.

use std::collections::BTreeMap;

use crate::config::{GridValue, ModelGrid};

pub const DROPMISSING_KEY: &str = "dropmissing__threshold";
pub const DROPLOWVARIANCE_KEY: &str = "droplowvariance__threshold";
pub const WINSORIZER_KEY: &str = "winsorizer__limits";

/// One concrete setting: parameter name -> value.
pub type Candidate = BTreeMap<String, GridValue>;

/// All parameter lists of a model grid, keyed by their config names.
///
/// An empty `winsorizer__limits` list is treated as absent.
pub fn parameters(grid: &ModelGrid) -> BTreeMap<String, Vec<GridValue>> {
    let mut params = grid.model.clone();
    if let Some(values) = &grid.dropmissing_threshold {
        params.insert(DROPMISSING_KEY.to_string(), floats(values));
    }
    if let Some(values) = &grid.droplowvariance_threshold {
        params.insert(DROPLOWVARIANCE_KEY.to_string(), floats(values));
    }
    if !grid.winsorizer_limits.is_empty() {
        params.insert(
            WINSORIZER_KEY.to_string(),
            grid.winsorizer_limits
                .iter()
                .map(|&(lo, hi)| GridValue::Interval(lo, hi))
                .collect(),
        );
    }
    params
}

fn floats(values: &[f64]) -> Vec<GridValue> {
    values.iter().copied().map(GridValue::Float).collect()
}

/// Number of candidates `expand` would produce.
pub fn size(grid: &ModelGrid) -> usize {
    parameters(grid)
        .values()
        .fold(1usize, |acc, values| acc.saturating_mul(values.len()))
}

/// Lazy walk over a grid's candidates in sorted-key odometer order.
///
/// Grids can be far larger than memory, so callers that only need a prefix
/// should `take` from this rather than `expand`.
#[derive(Debug, Clone)]
pub struct Candidates {
    lists: Vec<(String, Vec<GridValue>)>,
    index: Vec<usize>,
    done: bool,
}

impl Iterator for Candidates {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if self.done {
            return None;
        }
        let candidate = self
            .lists
            .iter()
            .zip(&self.index)
            .map(|((name, values), &i)| (name.clone(), values[i].clone()))
            .collect();

        // Advance the last position first so the first key varies slowest.
        self.done = true;
        for pos in (0..self.lists.len()).rev() {
            self.index[pos] += 1;
            if self.index[pos] < self.lists[pos].1.len() {
                self.done = false;
                break;
            }
            self.index[pos] = 0;
        }
        Some(candidate)
    }
}

/// Iterate the candidates of a grid without materializing them.
///
/// A grid with no parameters yields a single empty candidate; any empty
/// list yields none.
pub fn candidates(grid: &ModelGrid) -> Candidates {
    let lists: Vec<(String, Vec<GridValue>)> = parameters(grid).into_iter().collect();
    let done = lists.iter().any(|(_, values)| values.is_empty());
    Candidates {
        index: vec![0; lists.len()],
        lists,
        done,
    }
}

/// Every candidate of the grid, collected.
pub fn expand(grid: &ModelGrid) -> Vec<Candidate> {
    candidates(grid).collect()
}

/// Grid sizes for every configured model.
pub fn sizes(hyperparams: &BTreeMap<String, ModelGrid>) -> BTreeMap<&str, usize> {
    hyperparams.iter().map(|(name, grid)| (name.as_str(), size(grid))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> ModelGrid {
        let mut model = BTreeMap::new();
        model.insert(
            "model__max_depth".to_string(),
            vec![GridValue::Null, GridValue::Int(2), GridValue::Int(4)],
        );
        ModelGrid {
            dropmissing_threshold: Some(vec![0.9, 1.0]),
            droplowvariance_threshold: Some(vec![0.01]),
            winsorizer_limits: vec![(0.0, 1.0), (0.005, 0.995)],
            model,
        }
    }

    #[test]
    fn size_is_product_of_list_lengths() {
        assert_eq!(size(&grid()), 12);
        assert_eq!(expand(&grid()).len(), size(&grid()));
    }

    #[test]
    fn first_sorted_key_varies_slowest() {
        let candidates = expand(&grid());
        let first = &candidates[0];
        assert_eq!(first[DROPLOWVARIANCE_KEY], GridValue::Float(0.01));
        assert_eq!(first[DROPMISSING_KEY], GridValue::Float(0.9));
        assert_eq!(first["model__max_depth"], GridValue::Null);
        assert_eq!(first[WINSORIZER_KEY], GridValue::Interval(0.0, 1.0));

        // Last key (winsorizer__limits) changes first.
        assert_eq!(candidates[1][WINSORIZER_KEY], GridValue::Interval(0.005, 0.995));
        assert_eq!(candidates[1]["model__max_depth"], GridValue::Null);
        assert_eq!(candidates[2]["model__max_depth"], GridValue::Int(2));

        // dropmissing__threshold flips halfway through.
        assert_eq!(candidates[5][DROPMISSING_KEY], GridValue::Float(0.9));
        assert_eq!(candidates[6][DROPMISSING_KEY], GridValue::Float(1.0));
    }

    #[test]
    fn candidates_are_distinct() {
        let candidates = expand(&grid());
        for (i, a) in candidates.iter().enumerate() {
            for b in &candidates[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn empty_list_yields_nothing() {
        let mut g = grid();
        g.droplowvariance_threshold = Some(vec![]);
        assert_eq!(size(&g), 0);
        assert!(expand(&g).is_empty());
    }

    #[test]
    fn no_parameters_yields_one_empty_candidate() {
        let candidates = expand(&ModelGrid::default());
        assert_eq!(candidates, vec![Candidate::new()]);
    }

    #[test]
    fn huge_grid_is_walked_lazily() {
        let mut g = ModelGrid::default();
        for p in 0..8 {
            g.model.insert(format!("model__p{p}"), (0..300).map(GridValue::Int).collect());
        }
        assert_eq!(size(&g), 300usize.saturating_pow(8));

        let head: Vec<Candidate> = candidates(&g).take(3).collect();
        assert_eq!(head.len(), 3);
        assert_eq!(head[0]["model__p0"], GridValue::Int(0));
        assert_eq!(head[2]["model__p7"], GridValue::Int(2));
        assert_eq!(head[2]["model__p6"], GridValue::Int(0));
    }

    #[test]
    fn sizes_per_model() {
        let mut hyperparams = BTreeMap::new();
        hyperparams.insert("ridge".to_string(), grid());
        hyperparams.insert("linear".to_string(), ModelGrid::default());
        let sizes = sizes(&hyperparams);
        assert_eq!(sizes["ridge"], 12);
        assert_eq!(sizes["linear"], 1);
    }
}
