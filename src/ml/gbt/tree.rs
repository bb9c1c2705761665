// ============================================================
// Regression tree + histogram grower
// ============================================================
// One tree fits the gradient statistics (g, h) of one class in
// one boosting round.
//
// Growth is depth-wise. At each node:
//   1. histogram: per (feature, bin) sum of g and h over the
//      node's rows
//   2. scan every feature's bins left to right; splitting after
//      bin j gives
//        gain = ½ [G_L²/(H_L+λ) + G_R²/(H_R+λ) − G²/(H+λ)] − γ
//      and both children need H >= min_child_weight
//   3. no positive gain, or max depth reached → leaf with
//        value = −eta · G / (H + λ)
//   4. otherwise partition the rows; the smaller child builds
//      its histogram from its rows and the larger one gets
//      parent − smaller
//
// Nodes are stored in pre-order: a split's children always sit
// at higher indices than the split itself.

use serde::{Deserialize, Serialize};

use crate::ml::gbt::binning::BinCuts;

// ─── Tree ─────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `x[feature] < threshold` go left.
    Split {
        feature:   usize,
        threshold: f32,
        left:      usize,
        right:     usize,
    },
    Leaf {
        value: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn predict(&self, x: &[f32]) -> f32 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split { feature, threshold, left, right } => {
                    idx = if x[feature] < threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    /// Check the node table is a well-formed tree over `n_features` inputs.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Leaf { value } if !value.is_finite() => {
                    return Err(format!("leaf {idx} has non-finite value {value}"));
                }
                Node::Leaf { .. } => {}
                Node::Split { feature, threshold, left, right } => {
                    if feature >= n_features {
                        return Err(format!("node {idx} splits on feature {feature} of {n_features}"));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {idx} has a NaN threshold"));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx} references invalid child {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

// ─── Growing ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct GrowParams {
    pub max_depth:        usize,
    pub eta:              f64,
    pub lambda:           f64,
    pub gamma:            f64,
    pub min_child_weight: f64,
}

/// Binned training matrix shared by every tree of a run.
pub struct BinnedMatrix<'a> {
    pub cuts:   &'a BinCuts,
    pub bins:   &'a [u8],
    pub n_rows: usize,
}

impl BinnedMatrix<'_> {
    fn bin(&self, row: usize, feature: usize) -> usize {
        self.bins[row * self.cuts.n_features() + feature] as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct GradPair {
    g: f64,
    h: f64,
}

struct BestSplit {
    feature: usize,
    bin:     usize,
    gain:    f64,
}

pub struct TreeGrower<'a> {
    matrix: &'a BinnedMatrix<'a>,
    grad:   &'a [f32],
    hess:   &'a [f32],
    params: GrowParams,
    nodes:  Vec<Node>,
}

impl<'a> TreeGrower<'a> {
    pub fn new(matrix: &'a BinnedMatrix<'a>, grad: &'a [f32], hess: &'a [f32], params: GrowParams) -> Self {
        Self { matrix, grad, hess, params, nodes: Vec::new() }
    }

    /// Grow one tree over all rows of the matrix.
    pub fn grow(mut self) -> Tree {
        let rows: Vec<u32> = (0..self.matrix.n_rows as u32).collect();
        let hist           = self.histogram(&rows);
        self.build(rows, hist, 0);
        Tree { nodes: self.nodes }
    }

    fn build(&mut self, rows: Vec<u32>, hist: Vec<GradPair>, depth: usize) -> usize {
        let idx   = self.nodes.len();
        let total = self.sum(&rows);
        self.nodes.push(Node::Leaf { value: self.leaf_value(total) });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return idx;
        }
        let Some(best) = self.best_split(&hist, total) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<u32>, Vec<u32>) = rows
            .into_iter()
            .partition(|&r| self.matrix.bin(r as usize, best.feature) <= best.bin);

        // ── Sibling histogram by subtraction ──────────────────────────────────
        let (left_hist, right_hist) = if left_rows.len() <= right_rows.len() {
            let small = self.histogram(&left_rows);
            let large = subtract(&hist, &small);
            (small, large)
        } else {
            let small = self.histogram(&right_rows);
            let large = subtract(&hist, &small);
            (large, small)
        };
        drop(hist);

        let left  = self.build(left_rows, left_hist, depth + 1);
        let right = self.build(right_rows, right_hist, depth + 1);

        self.nodes[idx] = Node::Split {
            feature:   best.feature,
            threshold: self.matrix.cuts.threshold(best.feature, best.bin),
            left,
            right,
        };
        tracing::trace!("node {idx}: split feature {} at bin {} (gain {:.5})", best.feature, best.bin, best.gain);
        idx
    }

    fn histogram(&self, rows: &[u32]) -> Vec<GradPair> {
        let cuts     = self.matrix.cuts;
        let mut hist = vec![GradPair::default(); cuts.total_bins()];
        for &r in rows {
            let r = r as usize;
            let (g, h) = (f64::from(self.grad[r]), f64::from(self.hess[r]));
            for f in 0..cuts.n_features() {
                let slot = &mut hist[cuts.offset(f) + self.matrix.bin(r, f)];
                slot.g += g;
                slot.h += h;
            }
        }
        hist
    }

    fn sum(&self, rows: &[u32]) -> GradPair {
        rows.iter().fold(GradPair::default(), |acc, &r| GradPair {
            g: acc.g + f64::from(self.grad[r as usize]),
            h: acc.h + f64::from(self.hess[r as usize]),
        })
    }

    fn score(&self, p: GradPair) -> f64 {
        p.g * p.g / (p.h + self.params.lambda)
    }

    fn leaf_value(&self, p: GradPair) -> f32 {
        (-self.params.eta * p.g / (p.h + self.params.lambda)) as f32
    }

    fn best_split(&self, hist: &[GradPair], total: GradPair) -> Option<BestSplit> {
        let cuts        = self.matrix.cuts;
        let parent      = self.score(total);
        let mut best: Option<BestSplit> = None;

        for f in 0..cuts.n_features() {
            let base     = cuts.offset(f);
            let mut left = GradPair::default();

            // last bin cannot be a split point: nothing would go right
            for bin in 0..cuts.n_bins(f) - 1 {
                left.g += hist[base + bin].g;
                left.h += hist[base + bin].h;
                let right = GradPair { g: total.g - left.g, h: total.h - left.h };

                if left.h < self.params.min_child_weight || right.h < self.params.min_child_weight {
                    continue;
                }

                let gain = 0.5 * (self.score(left) + self.score(right) - parent) - self.params.gamma;
                if gain > 1e-10 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit { feature: f, bin, gain });
                }
            }
        }
        best
    }
}

fn subtract(parent: &[GradPair], child: &[GradPair]) -> Vec<GradPair> {
    parent
        .iter()
        .zip(child)
        .map(|(p, c)| GradPair { g: p.g - c.g, h: p.h - c.h })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_depth: usize) -> GrowParams {
        GrowParams { max_depth, eta: 1.0, lambda: 1.0, gamma: 0.0, min_child_weight: 1.0 }
    }

    #[test]
    fn test_predict_follows_strict_less_than() {
        let tree = Tree {
            nodes: vec![
                Node::Split { feature: 0, threshold: 0.5, left: 1, right: 2 },
                Node::Leaf { value: -1.0 },
                Node::Leaf { value: 1.0 },
            ],
        };
        assert_eq!(tree.predict(&[0.4]), -1.0);
        assert_eq!(tree.predict(&[0.5]), 1.0);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_grower_separates_two_groups() {
        // feature 0 splits the rows cleanly, feature 1 is noise
        let features: Vec<f32> = (0..20)
            .flat_map(|i| [if i < 10 { 0.0 } else { 1.0 }, (i % 3) as f32])
            .collect();
        let grad: Vec<f32> = (0..20).map(|i| if i < 10 { 1.0 } else { -1.0 }).collect();
        let hess = vec![1.0f32; 20];

        let cuts   = BinCuts::build(&features, 2, 256);
        let bins   = cuts.bin_matrix(&features);
        let matrix = BinnedMatrix { cuts: &cuts, bins: &bins, n_rows: 20 };
        let tree   = TreeGrower::new(&matrix, &grad, &hess, params(3)).grow();

        assert!(matches!(tree.nodes[0], Node::Split { feature: 0, .. }));
        // leaf = -G/(H+λ) = -10/11 for the low group
        assert!((tree.predict(&[0.0, 2.0]) + 10.0 / 11.0).abs() < 1e-5);
        assert!((tree.predict(&[1.0, 0.0]) - 10.0 / 11.0).abs() < 1e-5);
        tree.validate(2).unwrap();
    }

    #[test]
    fn test_depth_zero_is_single_leaf() {
        let features = vec![0.0f32, 1.0, 2.0, 3.0];
        let grad     = vec![1.0f32, 1.0, -1.0, -1.0];
        let hess     = vec![1.0f32; 4];
        let cuts     = BinCuts::build(&features, 1, 256);
        let bins     = cuts.bin_matrix(&features);
        let matrix   = BinnedMatrix { cuts: &cuts, bins: &bins, n_rows: 4 };

        let tree = TreeGrower::new(&matrix, &grad, &hess, params(0)).grow();
        assert_eq!(tree.nodes, vec![Node::Leaf { value: 0.0 }]);
    }

    #[test]
    fn test_subtraction_matches_direct_histogram() {
        let features: Vec<f32> = (0..12).map(|i| (i % 4) as f32).collect();
        let grad: Vec<f32>     = (0..12).map(|i| i as f32 * 0.25 - 1.0).collect();
        let hess               = vec![0.5f32; 12];
        let cuts               = BinCuts::build(&features, 1, 256);
        let bins               = cuts.bin_matrix(&features);
        let matrix             = BinnedMatrix { cuts: &cuts, bins: &bins, n_rows: 12 };
        let grower             = TreeGrower::new(&matrix, &grad, &hess, params(2));

        let all: Vec<u32>   = (0..12).collect();
        let left: Vec<u32>  = (0..5).collect();
        let right: Vec<u32> = (5..12).collect();

        let derived = subtract(&grower.histogram(&all), &grower.histogram(&left));
        let direct  = grower.histogram(&right);
        for (a, b) in derived.iter().zip(&direct) {
            assert!((a.g - b.g).abs() < 1e-9 && (a.h - b.h).abs() < 1e-9);
        }
    }

    #[test]
    fn test_validate_rejects_bad_references() {
        let cyclic = Tree {
            nodes: vec![
                Node::Split { feature: 0, threshold: 1.0, left: 0, right: 1 },
                Node::Leaf { value: 0.0 },
            ],
        };
        assert!(cyclic.validate(1).is_err());

        let bad_feature = Tree {
            nodes: vec![
                Node::Split { feature: 5, threshold: 1.0, left: 1, right: 2 },
                Node::Leaf { value: 0.0 },
                Node::Leaf { value: 0.0 },
            ],
        };
        assert!(bad_feature.validate(2).is_err());
    }
}
