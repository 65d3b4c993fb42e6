//! Tree growth strategies: depth-wise, leaf-wise and oblivious.

use serde::{Deserialize, Serialize};

use super::split::{bin_gains, pick_best, SplitContext, SplitInfo, MIN_SPLIT_GAIN};
use super::tree::{Node, ObliviousSplit, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GrowthStrategy {
    /// Split every node level by level up to `max_depth`.
    DepthWise { max_depth: usize },
    /// Always split the leaf with the largest gain, up to `num_leaves` leaves.
    LeafWise {
        num_leaves: usize,
        max_depth: Option<usize>,
    },
    /// One shared split per level, `depth` levels.
    Oblivious { depth: usize },
}

/// Grow one tree over `rows`; leaf values are already scaled by `learning_rate`.
pub fn grow(strategy: GrowthStrategy, ctx: &SplitContext<'_>, rows: &[usize], learning_rate: f64) -> Tree {
    match strategy {
        GrowthStrategy::DepthWise { max_depth } => {
            let mut nodes = Vec::new();
            grow_depth_wise(ctx, rows.to_vec(), 0, max_depth, learning_rate, &mut nodes);
            Tree::Binary { nodes }
        }
        GrowthStrategy::LeafWise {
            num_leaves,
            max_depth,
        } => grow_leaf_wise(ctx, rows, num_leaves, max_depth, learning_rate),
        GrowthStrategy::Oblivious { depth } => grow_oblivious(ctx, rows, depth, learning_rate),
    }
}

fn leaf_value(ctx: &SplitContext<'_>, rows: &[usize], learning_rate: f64) -> f64 {
    learning_rate * ctx.params.leaf_weight(&ctx.stats(rows))
}

fn split_node(ctx: &SplitContext<'_>, split: &SplitInfo, left: usize, right: usize) -> Node {
    Node::Split {
        feature: split.feature,
        threshold: ctx.mapper.threshold(split.feature, split.bin),
        gain: split.gain,
        left,
        right,
    }
}

fn grow_depth_wise(
    ctx: &SplitContext<'_>,
    rows: Vec<usize>,
    depth: usize,
    max_depth: usize,
    learning_rate: f64,
    nodes: &mut Vec<Node>,
) -> usize {
    let idx = nodes.len();
    nodes.push(Node::Leaf { value: 0.0 });

    let split = if depth < max_depth && rows.len() >= 2 {
        ctx.best_split(&rows)
    } else {
        None
    };

    nodes[idx] = match split {
        Some(split) => {
            let (left_rows, right_rows) = ctx.partition(&rows, &split);
            drop(rows);
            let left = grow_depth_wise(ctx, left_rows, depth + 1, max_depth, learning_rate, nodes);
            let right = grow_depth_wise(ctx, right_rows, depth + 1, max_depth, learning_rate, nodes);
            split_node(ctx, &split, left, right)
        }
        None => Node::Leaf {
            value: leaf_value(ctx, &rows, learning_rate),
        },
    };
    idx
}

struct OpenLeaf {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
    split: Option<SplitInfo>,
}

fn grow_leaf_wise(
    ctx: &SplitContext<'_>,
    rows: &[usize],
    num_leaves: usize,
    max_depth: Option<usize>,
    learning_rate: f64,
) -> Tree {
    let find = |rows: &[usize], depth: usize| {
        if max_depth.map_or(true, |d| depth < d) && rows.len() >= 2 {
            ctx.best_split(rows)
        } else {
            None
        }
    };

    let mut nodes = vec![Node::Leaf { value: 0.0 }];
    let mut open = vec![OpenLeaf {
        node: 0,
        split: find(rows, 0),
        rows: rows.to_vec(),
        depth: 0,
    }];
    let mut n_leaves = 1;

    while n_leaves < num_leaves {
        let chosen = open
            .iter()
            .enumerate()
            .filter_map(|(i, leaf)| leaf.split.map(|s| (i, s.gain)))
            .fold(None, |best: Option<(usize, f64)>, (i, gain)| match best {
                Some((_, g)) if g >= gain => best,
                _ => Some((i, gain)),
            });
        let Some((i, _)) = chosen else {
            break;
        };

        let leaf = open.remove(i);
        let Some(split) = leaf.split else {
            break;
        };
        let (left_rows, right_rows) = ctx.partition(&leaf.rows, &split);

        let left = nodes.len();
        let right = left + 1;
        nodes.push(Node::Leaf { value: 0.0 });
        nodes.push(Node::Leaf { value: 0.0 });
        nodes[leaf.node] = split_node(ctx, &split, left, right);

        let depth = leaf.depth + 1;
        for (node, rows) in [(left, left_rows), (right, right_rows)] {
            open.push(OpenLeaf {
                node,
                split: find(&rows, depth),
                rows,
                depth,
            });
        }
        n_leaves += 1;
    }

    for leaf in open {
        nodes[leaf.node] = Node::Leaf {
            value: leaf_value(ctx, &leaf.rows, learning_rate),
        };
    }
    Tree::Binary { nodes }
}

fn grow_oblivious(ctx: &SplitContext<'_>, rows: &[usize], depth: usize, learning_rate: f64) -> Tree {
    let mut partitions: Vec<Vec<usize>> = vec![rows.to_vec()];
    let mut splits = Vec::with_capacity(depth);

    for _ in 0..depth {
        let totals: Vec<_> = partitions.iter().map(|p| ctx.stats(p)).collect();

        let candidates = ctx.map_features(rows.len(), |feature| {
            let mut gains = vec![0.0; ctx.mapper.n_bins(feature).saturating_sub(1)];
            for (part, total) in partitions.iter().zip(&totals) {
                if part.len() < 2 {
                    continue;
                }
                let hist = ctx.histogram(feature, part);
                for (g, part_gain) in gains.iter_mut().zip(bin_gains(&hist, total, &ctx.params)) {
                    *g += part_gain;
                }
            }

            gains
                .iter()
                .enumerate()
                .fold(None, |best: Option<SplitInfo>, (bin, &gain)| {
                    if gain > MIN_SPLIT_GAIN && best.map_or(true, |b| gain > b.gain) {
                        Some(SplitInfo { feature, bin, gain })
                    } else {
                        best
                    }
                })
        });

        let Some(split) = pick_best(candidates) else {
            break;
        };

        partitions = partitions
            .iter()
            .flat_map(|p| {
                let (left, right) = ctx.partition(p, &split);
                [left, right]
            })
            .collect();
        splits.push(ObliviousSplit {
            feature: split.feature,
            threshold: ctx.mapper.threshold(split.feature, split.bin),
            gain: split.gain,
        });
    }

    let leaves = partitions
        .iter()
        .map(|p| leaf_value(ctx, p, learning_rate))
        .collect();
    Tree::Oblivious { splits, leaves }
}
