//! Regression trees fitted on first and second order gradient statistics.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// Maximum depth; a root-only tree has depth 0.
    pub max_depth: usize,
    /// Minimum rows on each side of a split.
    pub min_samples_leaf: usize,
    /// Minimum hessian sum on each side of a split.
    pub min_child_weight: f64,
    /// L2 penalty on leaf values.
    pub lambda: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 4,
            min_samples_leaf: 20,
            min_child_weight: 1e-3,
            lambda: 0.0,
        }
    }
}

/// Split condition: rows with `x[feature] <= threshold` go left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Column the split tests.
    pub feature: usize,
    /// Midpoint between the two closest values on either side.
    pub threshold: f64,
}

/// A tree node: either a leaf score or a split with two subtrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// Score added to the class's raw output.
    Leaf(f64),
    /// Internal node.
    Children {
        split: Split,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    /// Walk to the leaf for `x` and return its value.
    ///
    /// `x` must be at least as wide as every split feature below this node.
    pub fn predict(&self, x: &[f64]) -> f64 {
        match self {
            Node::Leaf(value) => *value,
            Node::Children { split, left, right } => {
                if x[split.feature] <= split.threshold {
                    left.predict(x)
                } else {
                    right.predict(x)
                }
            }
        }
    }

    fn scale(&mut self, factor: f64) {
        match self {
            Node::Leaf(value) => *value *= factor,
            Node::Children { left, right, .. } => {
                left.scale(factor);
                right.scale(factor);
            }
        }
    }

    fn leaves(&self) -> usize {
        match self {
            Node::Leaf(_) => 1,
            Node::Children { left, right, .. } => left.leaves() + right.leaves(),
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf(_) => 0,
            Node::Children { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn max_feature(&self) -> Option<usize> {
        match self {
            Node::Leaf(_) => None,
            Node::Children { split, left, right } => {
                let below = left.max_feature().max(right.max_feature());
                Some(below.map_or(split.feature, |f| f.max(split.feature)))
            }
        }
    }
}

/// A fitted regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    /// Fit a tree on the rows named by `index`.
    ///
    /// `grad` and `hess` are indexed by row, like `rows`. `index` is reordered
    /// in place while the tree grows.
    pub fn fit(
        rows: &[Vec<f64>],
        grad: &[f64],
        hess: &[f64],
        index: &mut [usize],
        params: &TreeParams,
    ) -> Self {
        let builder = NodeBuilder {
            rows,
            grad,
            hess,
            params,
        };

        Self {
            root: builder.build(index, 0),
        }
    }

    /// Leaf value for `x`. See [`Node::predict`].
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.root.predict(x)
    }

    /// Multiply every leaf value by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.root.scale(factor);
    }

    /// Number of leaves.
    pub fn leaves(&self) -> usize {
        self.root.leaves()
    }

    /// Longest root-to-leaf path, in splits.
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Highest feature index any split reads, or `None` for a single leaf.
    pub fn max_feature(&self) -> Option<usize> {
        self.root.max_feature()
    }

    /// Root node.
    pub fn root(&self) -> &Node {
        &self.root
    }
}

struct NodeBuilder<'a> {
    rows: &'a [Vec<f64>],
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a TreeParams,
}

struct Candidate {
    split: Split,
    left_len: usize,
    gain: f64,
}

impl NodeBuilder<'_> {
    fn build(&self, index: &mut [usize], depth: usize) -> Node {
        let (g, h) = self.sums(index);
        let leaf = Node::Leaf(self.leaf_value(g, h));

        if depth >= self.params.max_depth || index.len() < 2 * self.params.min_samples_leaf.max(1) {
            return leaf;
        }

        let best = match self.best_split(index, g, h) {
            Some(best) => best,
            None => return leaf,
        };

        self.sort_by_feature(index, best.split.feature);
        let (left, right) = index.split_at_mut(best.left_len);

        Node::Children {
            split: best.split,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        }
    }

    fn best_split(&self, index: &mut [usize], g: f64, h: f64) -> Option<Candidate> {
        let n = index.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent_score = self.score(g, h);
        let n_features = self.rows[index[0]].len();

        let mut best: Option<Candidate> = None;

        for feature in 0..n_features {
            self.sort_by_feature(index, feature);

            let mut gl = 0.0;
            let mut hl = 0.0;

            for k in 1..n {
                let prev = index[k - 1];
                gl += self.grad[prev];
                hl += self.hess[prev];

                if k < min_leaf || n - k < min_leaf {
                    continue;
                }

                let lo = self.rows[prev][feature];
                let hi = self.rows[index[k]][feature];
                if hi - lo <= f64::EPSILON {
                    continue;
                }

                let (gr, hr) = (g - gl, h - hl);
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }

                let gain = self.score(gl, hl) + self.score(gr, hr) - parent_score;
                if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Candidate {
                        split: Split {
                            feature,
                            threshold: (lo + hi) / 2.0,
                        },
                        left_len: k,
                        gain,
                    });
                }
            }
        }

        best
    }

    fn sort_by_feature(&self, index: &mut [usize], feature: usize) {
        index.sort_by_key(|&i| OrderedFloat(self.rows[i][feature]));
    }

    fn sums(&self, index: &[usize]) -> (f64, f64) {
        index
            .iter()
            .fold((0.0, 0.0), |(g, h), &i| (g + self.grad[i], h + self.hess[i]))
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.params.lambda;
        if denom <= 0.0 {
            0.0
        } else {
            g * g / denom
        }
    }

    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.params.lambda;
        if denom <= 0.0 {
            0.0
        } else {
            -g / denom
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(min_samples_leaf: usize) -> TreeParams {
        TreeParams {
            max_depth: 3,
            min_samples_leaf,
            min_child_weight: 0.0,
            lambda: 0.0,
        }
    }

    #[test]
    fn single_split_separates_gradients() {
        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        // Negative gradient on the upper half pushes those leaves up.
        let grad: Vec<f64> = (0..8).map(|i| if i < 4 { 1.0 } else { -1.0 }).collect();
        let hess = vec![1.0; 8];
        let mut index: Vec<usize> = (0..8).collect();

        let tree = RegressionTree::fit(&rows, &grad, &hess, &mut index, &params(1));

        match tree.root() {
            Node::Children { split, .. } => {
                assert_eq!(split.feature, 0);
                assert_eq!(split.threshold, 3.5);
            }
            Node::Leaf(_) => panic!("expected a split"),
        }
        assert_eq!(tree.predict(&[0.0]), -1.0);
        assert_eq!(tree.predict(&[7.0]), 1.0);
    }

    #[test]
    fn constant_gradient_stays_a_leaf() {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let grad = vec![0.5; 6];
        let hess = vec![1.0; 6];
        let mut index: Vec<usize> = (0..6).collect();

        let tree = RegressionTree::fit(&rows, &grad, &hess, &mut index, &params(1));

        assert_eq!(tree.leaves(), 1);
        assert_eq!(tree.predict(&[2.0]), -0.5);
    }

    #[test]
    fn min_samples_leaf_blocks_small_children() {
        let rows: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let grad = vec![1.0, -1.0, -1.0, -1.0, -1.0, -1.0];
        let hess = vec![1.0; 6];
        let mut index: Vec<usize> = (0..6).collect();

        let tree = RegressionTree::fit(&rows, &grad, &hess, &mut index, &params(3));

        // The only useful cut isolates row 0, which would leave a 1-row child.
        if let Node::Children { split, .. } = tree.root() {
            assert_eq!(split.threshold, 2.5);
        }
        assert!(tree.leaves() <= 2);
    }

    #[test]
    fn depth_is_bounded() {
        let rows: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let grad: Vec<f64> = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let hess = vec![1.0; 64];
        let mut index: Vec<usize> = (0..64).collect();

        let tree = RegressionTree::fit(&rows, &grad, &hess, &mut index, &params(1));

        assert!(tree.depth() <= 3);
    }

    #[test]
    fn max_feature_reads_every_split() {
        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![0.0, 0.0, i as f64]).collect();
        let grad: Vec<f64> = (0..8).map(|i| if i < 4 { 1.0 } else { -1.0 }).collect();
        let hess = vec![1.0; 8];
        let mut index: Vec<usize> = (0..8).collect();

        let tree = RegressionTree::fit(&rows, &grad, &hess, &mut index, &params(1));
        assert_eq!(tree.max_feature(), Some(2));

        let stump = RegressionTree::fit(&rows, &[0.5; 8], &hess, &mut index, &params(1));
        assert_eq!(stump.max_feature(), None);
    }

    #[test]
    fn scale_multiplies_leaves() {
        let rows: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let grad = vec![-2.0; 4];
        let hess = vec![1.0; 4];
        let mut index: Vec<usize> = (0..4).collect();

        let mut tree = RegressionTree::fit(&rows, &grad, &hess, &mut index, &params(1));
        tree.scale(0.1);

        assert!((tree.predict(&[1.0]) - 0.2).abs() < 1e-12);
    }
}
