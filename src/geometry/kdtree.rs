//! 2-D k-d tree for nearest-neighbor queries over (row, column) points.

/// A static, median-split k-d tree. Built once per point set, queried many
/// times.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
struct KdNode {
    point_idx: usize,
    left: Option<usize>,
    right: Option<usize>,
    /// 0 = row, 1 = column
    split_dim: usize,
}

impl KdTree {
    /// Build a tree, or `None` when there are no points.
    pub fn build(points: &[(f64, f64)]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let points_vec = points.to_vec();
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        Self::build_recursive(&points_vec, &mut indices, 0, &mut nodes);

        Some(Self {
            nodes,
            points: points_vec,
        })
    }

    fn build_recursive(
        points: &[(f64, f64)],
        indices: &mut [usize],
        depth: usize,
        nodes: &mut Vec<KdNode>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let split_dim = depth % 2;
        indices.sort_by(|&a, &b| coord(points[a], split_dim).total_cmp(&coord(points[b], split_dim)));

        let median = indices.len() / 2;
        let node_idx = nodes.len();
        nodes.push(KdNode {
            point_idx: indices[median],
            left: None,
            right: None,
            split_dim,
        });

        let (left_indices, right_part) = indices.split_at_mut(median);
        let right_indices = &mut right_part[1..];

        let left = Self::build_recursive(points, left_indices, depth + 1, nodes);
        let right = Self::build_recursive(points, right_indices, depth + 1, nodes);
        nodes[node_idx].left = left;
        nodes[node_idx].right = right;

        Some(node_idx)
    }

    /// Index and Euclidean distance of the point closest to `query`.
    pub fn nearest(&self, query: (f64, f64)) -> (usize, f64) {
        let mut best = (self.nodes[0].point_idx, f64::INFINITY);
        self.nearest_recursive(0, query, &mut best);
        (best.0, best.1.sqrt())
    }

    fn nearest_recursive(&self, node_idx: usize, query: (f64, f64), best: &mut (usize, f64)) {
        let node = &self.nodes[node_idx];
        let point = self.points[node.point_idx];

        let dist_sq = distance_squared(query, point);
        if dist_sq < best.1 || (dist_sq == best.1 && node.point_idx < best.0) {
            *best = (node.point_idx, dist_sq);
        }

        let diff = coord(query, node.split_dim) - coord(point, node.split_dim);
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(first_idx) = first {
            self.nearest_recursive(first_idx, query, best);
        }
        if let Some(second_idx) = second {
            if diff * diff <= best.1 {
                self.nearest_recursive(second_idx, query, best);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[inline]
fn coord(point: (f64, f64), dim: usize) -> f64 {
    if dim == 0 {
        point.0
    } else {
        point.1
    }
}

#[inline]
pub fn distance_squared(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dr = a.0 - b.0;
    let dc = a.1 - b.1;
    dr * dr + dc * dc
}

#[inline]
pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    distance_squared(a, b).sqrt()
}
