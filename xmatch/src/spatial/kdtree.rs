//! A three dimensional k-d tree over unit-sphere embeddings of sky positions.

/// A 3D k-d tree for nearest-neighbor and radius queries on unit vectors.
///
/// The tree is built once per reference catalog and queried once per query object. Nodes are
/// stored in a flat vector and refer to each other by index.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<[f64; 3]>,
}

#[derive(Debug, Clone)]
struct KdNode {
    /// Index into the points array.
    point_idx: usize,
    left: Option<usize>,
    right: Option<usize>,
    /// Split axis (0 = x, 1 = y, 2 = z).
    split_dim: usize,
}

impl KdTree {
    /// Builds a balanced tree by splitting on the median of each axis in turn.
    pub fn build(points: Vec<[f64; 3]>) -> Self {
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());

        Self::build_recursive(&points, &mut indices, 0, &mut nodes);

        Self { nodes, points }
    }

    fn build_recursive(
        points: &[[f64; 3]],
        indices: &mut [usize],
        depth: usize,
        nodes: &mut Vec<KdNode>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let split_dim = depth % 3;
        let median = indices.len() / 2;
        indices.select_nth_unstable_by(median, |&a, &b| {
            points[a][split_dim]
                .total_cmp(&points[b][split_dim])
                .then(a.cmp(&b))
        });

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

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Finds the point closest to `query`.
    ///
    /// Returns `(index, squared distance)`. When several points are exactly as close, the one
    /// with the lowest index wins, so results match a linear scan over the same points.
    pub fn nearest(&self, query: [f64; 3]) -> Option<(usize, f64)> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best = (usize::MAX, f64::INFINITY);
        self.nearest_recursive(0, query, &mut best);

        Some(best)
    }

    fn nearest_recursive(&self, node_idx: usize, query: [f64; 3], best: &mut (usize, f64)) {
        let node = &self.nodes[node_idx];
        let point = self.points[node.point_idx];

        let dist_sq = distance_squared(query, point);
        if dist_sq < best.1 || (dist_sq == best.1 && node.point_idx < best.0) {
            *best = (node.point_idx, dist_sq);
        }

        let diff = query[node.split_dim] - point[node.split_dim];
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(first_idx) = first {
            self.nearest_recursive(first_idx, query, best);
        }

        // Ties must be explored too, a lower index may sit on the far side.
        if let Some(second_idx) = second
            && diff * diff <= best.1
        {
            self.nearest_recursive(second_idx, query, best);
        }
    }

    /// Finds all points whose squared distance to `query` is at most `radius_sq`.
    ///
    /// Returned indices are sorted in ascending order.
    pub fn within(&self, query: [f64; 3], radius_sq: f64) -> Vec<usize> {
        let mut results = Vec::new();
        if !self.nodes.is_empty() {
            self.within_recursive(0, query, radius_sq, &mut results);
        }

        results.sort_unstable();
        results
    }

    fn within_recursive(
        &self,
        node_idx: usize,
        query: [f64; 3],
        radius_sq: f64,
        results: &mut Vec<usize>,
    ) {
        let node = &self.nodes[node_idx];
        let point = self.points[node.point_idx];

        if distance_squared(query, point) <= radius_sq {
            results.push(node.point_idx);
        }

        let diff = query[node.split_dim] - point[node.split_dim];
        let diff_sq = diff * diff;

        if let Some(left) = node.left
            && (diff < 0.0 || diff_sq <= radius_sq)
        {
            self.within_recursive(left, query, radius_sq, results);
        }

        if let Some(right) = node.right
            && (diff >= 0.0 || diff_sq <= radius_sq)
        {
            self.within_recursive(right, query, radius_sq, results);
        }
    }
}

#[inline]
fn distance_squared(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];

    dx * dx + dy * dy + dz * dz
}
