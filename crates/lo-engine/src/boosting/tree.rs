//! Fitted regression trees.

use serde::{Deserialize, Serialize};

use crate::encoding::FeatureMatrix;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// One level of an oblivious tree: every node on the level shares it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObliviousSplit {
    pub feature: usize,
    pub threshold: f64,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tree {
    /// Node arena; index 0 is the root.
    Binary { nodes: Vec<Node> },
    /// `leaves` has `2^splits.len()` entries, indexed by the path bits.
    Oblivious {
        splits: Vec<ObliviousSplit>,
        leaves: Vec<f64>,
    },
}

#[inline]
fn goes_left(value: f64, threshold: f64) -> bool {
    value.is_nan() || value <= threshold
}

impl Tree {
    pub fn predict_row(&self, x: &FeatureMatrix, row: usize) -> f64 {
        match self {
            Self::Binary { nodes } => {
                let mut idx = 0;
                loop {
                    match nodes.get(idx) {
                        Some(Node::Split {
                            feature,
                            threshold,
                            left,
                            right,
                            ..
                        }) => {
                            idx = if goes_left(x.value(row, *feature), *threshold) {
                                *left
                            } else {
                                *right
                            };
                        }
                        Some(Node::Leaf { value }) => return *value,
                        None => return 0.0,
                    }
                }
            }
            Self::Oblivious { splits, leaves } => {
                let idx = splits.iter().fold(0usize, |idx, split| {
                    let right = !goes_left(x.value(row, split.feature), split.threshold);
                    idx * 2 + usize::from(right)
                });
                leaves.get(idx).copied().unwrap_or(0.0)
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            Self::Binary { nodes } => nodes
                .iter()
                .filter(|n| matches!(n, Node::Leaf { .. }))
                .count(),
            Self::Oblivious { leaves, .. } => leaves.len(),
        }
    }

    /// Call `f(feature, gain)` once per split node.
    pub fn for_each_split(&self, mut f: impl FnMut(usize, f64)) {
        match self {
            Self::Binary { nodes } => {
                for node in nodes {
                    if let Node::Split { feature, gain, .. } = node {
                        f(*feature, *gain);
                    }
                }
            }
            Self::Oblivious { splits, .. } => {
                for split in splits {
                    f(split.feature, split.gain);
                }
            }
        }
    }
}
