//! CART regression tree with a squared-error criterion.

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; all of them when `None`.
    pub max_features: Option<usize>,
}

/// A fitted tree stored as a flat node arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Pending {
    node: usize,
    samples: Vec<usize>,
    depth: usize,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    /// Grows a tree over the rows of `x` listed in `samples` (repeats allowed,
    /// which is how bootstrap resamples are expressed).
    ///
    /// Callers guarantee `samples` is non-empty and every row has `n_features` columns.
    pub(crate) fn fit<R: Rng>(
        x: &[Vec<f64>],
        y: &[f64],
        samples: Vec<usize>,
        n_features: usize,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let placeholder = Node::Leaf {
            value: 0.0,
            samples: 0,
        };
        let mut nodes = vec![placeholder.clone()];
        let mut stack = vec![Pending {
            node: 0,
            samples,
            depth: 0,
        }];

        while let Some(pending) = stack.pop() {
            let can_split = pending.samples.len() >= params.min_samples_split
                && params.max_depth.is_none_or(|max| pending.depth < max)
                && !is_constant(y, &pending.samples);

            let split = if can_split {
                best_split(x, y, &pending.samples, n_features, params, rng)
            } else {
                None
            };

            let Some(split) = split else {
                nodes[pending.node] = Node::Leaf {
                    value: mean(y, &pending.samples),
                    samples: pending.samples.len(),
                };
                continue;
            };

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = pending
                .samples
                .iter()
                .copied()
                .partition(|&i| x[i][split.feature] <= split.threshold);

            let left = nodes.len();
            nodes.push(placeholder.clone());
            let right = nodes.len();
            nodes.push(placeholder.clone());
            nodes[pending.node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            stack.push(Pending {
                node: right,
                samples: right_samples,
                depth: pending.depth + 1,
            });
            stack.push(Pending {
                node: left,
                samples: left_samples,
                depth: pending.depth + 1,
            });
        }

        Self { nodes }
    }

    /// Walks from the root to a leaf. `row` must have the training width.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Checks the arena of a tree that did not come from [`RegressionTree::fit`].
    ///
    /// Children always sit after their parent, which also rules out cycles.
    pub(crate) fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("no nodes".into());
        }
        let len = self.nodes.len();
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value, .. } if !value.is_finite() => {
                    return Err(format!("leaf {index} holds a non-finite value"));
                }
                Node::Leaf { .. } => {}
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {index} splits on feature {feature} of {n_features}"
                        ));
                    }
                    for child in [*left, *right] {
                        if child <= index || child >= len {
                            return Err(format!(
                                "node {index} points to node {child} in an arena of {len}"
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let Node::Split { left, right, .. } = &self.nodes[index] {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        deepest
    }
}

#[cfg(test)]
impl RegressionTree {
    pub(crate) fn leaf(value: f64) -> Self {
        Self {
            nodes: vec![Node::Leaf { value, samples: 1 }],
        }
    }

    /// A bare split node; children are whatever the caller says.
    pub(crate) fn split(feature: usize, left: usize, right: usize) -> Self {
        Self {
            nodes: vec![Node::Split {
                feature,
                threshold: 0.0,
                left,
                right,
            }],
        }
    }
}

fn mean(y: &[f64], samples: &[usize]) -> f64 {
    samples.iter().map(|&i| y[i]).sum::<f64>() / samples.len() as f64
}

fn is_constant(y: &[f64], samples: &[usize]) -> bool {
    let first = y[samples[0]];
    samples.iter().all(|&i| y[i] == first)
}

/// Finds the split maximising `sum_l²/n_l + sum_r²/n_r`, which is the same as
/// minimising the children's summed squared error.
fn best_split<R: Rng>(
    x: &[Vec<f64>],
    y: &[f64],
    samples: &[usize],
    n_features: usize,
    params: &TreeParams,
    rng: &mut R,
) -> Option<Candidate> {
    let mut features: Vec<usize> = (0..n_features).collect();
    if let Some(k) = params.max_features.filter(|&k| k < n_features) {
        features.shuffle(rng);
        features.truncate(k);
        features.sort_unstable();
    }

    let n = samples.len();
    let total: f64 = samples.iter().map(|&i| y[i]).sum();
    let parent_score = total * total / n as f64;
    let min_leaf = params.min_samples_leaf.max(1);

    let mut best: Option<Candidate> = None;
    let mut column: Vec<(f64, f64)> = Vec::with_capacity(n);

    for feature in features {
        column.clear();
        column.extend(samples.iter().map(|&i| (x[i][feature], y[i])));
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for split_at in 1..n {
            left_sum += column[split_at - 1].1;
            let (lower, upper) = (column[split_at - 1].0, column[split_at].0);
            if lower == upper {
                continue;
            }
            let left_n = split_at;
            let right_n = n - split_at;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64;
            let improves_parent = score > parent_score + parent_score.abs() * 1e-12;
            let beats_best = best.as_ref().is_none_or(|b| score > b.score);
            if improves_parent && beats_best {
                let mut threshold = lower + (upper - lower) / 2.0;
                if threshold >= upper {
                    threshold = lower;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn unlimited() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, 0.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| if i < 5 { 1.0 } else { 3.0 }).collect();
        (x, y)
    }

    #[test]
    fn learns_a_step_with_one_split() {
        let (x, y) = step_data();
        let mut rng = StdRng::seed_from_u64(7);
        let tree = RegressionTree::fit(&x, &y, (0..10).collect(), 2, &unlimited(), &mut rng);

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&[2.0, 0.0]), 1.0);
        // Threshold sits at the midpoint, 4.5, and ties go left.
        assert_eq!(tree.predict(&[4.5, 0.0]), 1.0);
        assert_eq!(tree.predict(&[4.6, 0.0]), 3.0);
        assert_eq!(tree.predict(&[9.0, 0.0]), 3.0);
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let x: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64]).collect();
        let y = vec![2.5; 5];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = RegressionTree::fit(&x, &y, (0..5).collect(), 1, &unlimited(), &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[100.0]), 2.5);
    }

    #[test]
    fn depth_limit_is_respected() {
        let x: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..64).map(|i| (i * i) as f64).collect();
        let params = TreeParams {
            max_depth: Some(3),
            ..unlimited()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let tree = RegressionTree::fit(&x, &y, (0..64).collect(), 1, &params, &mut rng);
        assert_eq!(tree.depth(), 3);
        assert!(tree.leaf_count() <= 8);
    }

    #[test]
    fn min_samples_leaf_blocks_tiny_children() {
        let (x, y) = step_data();
        let params = TreeParams {
            min_samples_leaf: 6,
            ..unlimited()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let tree = RegressionTree::fit(&x, &y, (0..10).collect(), 2, &params, &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[0.0, 0.0]), 2.0);
    }

    #[test]
    fn fitted_trees_validate() {
        let (x, y) = step_data();
        let mut rng = StdRng::seed_from_u64(11);
        let tree = RegressionTree::fit(&x, &y, (0..10).collect(), 2, &unlimited(), &mut rng);
        assert_eq!(tree.validate(2), Ok(()));
        assert!(tree.validate(0).is_err());
    }

    #[test]
    fn malformed_arenas_are_rejected() {
        let empty = RegressionTree { nodes: vec![] };
        assert!(empty.validate(1).is_err());

        let dangling = RegressionTree::split(0, 7, 8);
        assert!(dangling.validate(1).unwrap_err().contains("node 7"));

        let cycle = RegressionTree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 1,
                    right: 2,
                },
                Node::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 0,
                    right: 2,
                },
                Node::Leaf {
                    value: 1.0,
                    samples: 1,
                },
            ],
        };
        assert!(cycle.validate(1).is_err());

        assert!(RegressionTree::split(3, 1, 2).validate(3).is_err());
        assert!(RegressionTree::leaf(f64::NAN).validate(1).is_err());
        assert_eq!(RegressionTree::leaf(2.0).validate(1), Ok(()));
    }

    #[test]
    fn duplicated_feature_values_are_never_separated() {
        let x = vec![vec![1.0], vec![1.0], vec![2.0], vec![2.0]];
        let y = vec![0.0, 10.0, 20.0, 30.0];
        let mut rng = StdRng::seed_from_u64(9);
        let tree = RegressionTree::fit(&x, &y, (0..4).collect(), 1, &unlimited(), &mut rng);
        assert_eq!(tree.predict(&[1.0]), 5.0);
        assert_eq!(tree.predict(&[2.0]), 25.0);
    }
}
