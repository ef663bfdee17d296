use crate::spatial::KdTree;
use crate::types::{Position, arcsec_to_chord_squared};

/// Nearest reference object found for one query position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestMatch {
    /// Index of the nearest reference object, `None` when the reference set is empty.
    pub index: Option<usize>,
    /// Great-circle separation in arcseconds, `f64::INFINITY` when there is no match.
    pub separation_arcsec: f64,
}

impl NearestMatch {
    fn none() -> Self {
        Self {
            index: None,
            separation_arcsec: f64::INFINITY,
        }
    }

    /// Returns the matched index if the match is strictly closer than `radius_arcsec`.
    pub fn within(&self, radius_arcsec: f64) -> Option<usize> {
        if self.separation_arcsec < radius_arcsec {
            self.index
        } else {
            None
        }
    }
}

/// A spatial index over a fixed set of reference positions.
#[derive(Debug)]
pub struct SkyIndex {
    positions: Vec<Position>,
    tree: KdTree,
}

impl SkyIndex {
    pub fn new(positions: Vec<Position>) -> Self {
        let tree = KdTree::build(positions.iter().map(Position::to_unit_vector).collect());

        Self { positions, tree }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Returns the reference position nearest to `query`.
    pub fn nearest(&self, query: &Position) -> NearestMatch {
        match self.tree.nearest(query.to_unit_vector()) {
            Some((index, _)) => NearestMatch {
                index: Some(index),
                separation_arcsec: query.separation_arcsec(&self.positions[index]),
            },
            None => NearestMatch::none(),
        }
    }

    /// Returns the indices of all reference positions strictly closer than `radius_arcsec`,
    /// in ascending order.
    pub fn within_radius(&self, query: &Position, radius_arcsec: f64) -> Vec<usize> {
        // The chord search is slightly widened, the exact angular test below decides.
        let radius_sq = arcsec_to_chord_squared(radius_arcsec) * (1.0 + 1e-9);

        self.tree
            .within(query.to_unit_vector(), radius_sq)
            .into_iter()
            .filter(|&index| query.separation_arcsec(&self.positions[index]) < radius_arcsec)
            .collect()
    }
}

/// Finds, for every query position, the nearest reference position and its separation.
///
/// The result has one entry per query, in query order.
pub fn match_to_catalog(query: &[Position], reference: &[Position]) -> Vec<NearestMatch> {
    let index = SkyIndex::new(reference.to_vec());

    query.iter().map(|position| index.nearest(position)).collect()
}

/// Linear-scan version of [`match_to_catalog`].
///
/// Quadratic in the input sizes, used as the correctness baseline for the indexed matcher.
pub fn match_to_catalog_brute_force(
    query: &[Position],
    reference: &[Position],
) -> Vec<NearestMatch> {
    query
        .iter()
        .map(|position| {
            let mut best = NearestMatch::none();
            for (index, candidate) in reference.iter().enumerate() {
                let separation = position.separation_arcsec(candidate);
                if separation < best.separation_arcsec {
                    best = NearestMatch {
                        index: Some(index),
                        separation_arcsec: separation,
                    };
                }
            }
            best
        })
        .collect()
}
