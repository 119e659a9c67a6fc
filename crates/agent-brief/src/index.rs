//! Flat (exhaustive) L2 vector index
//!
//! Vectors are stored contiguously in insertion order; position `i` belongs
//! to document `i` of the store the index was built from.

use crate::error::{BriefError, Result};
use serde::Serialize;
use std::cmp::Ordering;

/// One nearest-neighbour result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    /// Position of the matching vector (and document)
    pub index: usize,
    /// Euclidean distance to the query
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimensions: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Build an index over `vectors`
    ///
    /// All vectors must share one non-zero length and hold finite values.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Err(BriefError::Configuration(
                "cannot build a vector index without vectors".to_string(),
            ));
        };

        let dimensions = first.len();
        if dimensions == 0 {
            return Err(BriefError::Configuration(
                "vectors must have at least one dimension".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(dimensions * vectors.len());
        for (position, vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimensions {
                return Err(BriefError::Configuration(format!(
                    "vector {position} has {} dimensions, expected {dimensions}",
                    vector.len()
                )));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(BriefError::Configuration(format!(
                    "vector {position} contains non-finite values"
                )));
            }
            data.extend(vector);
        }

        Ok(Self { dimensions, data })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored vectors (never zero)
    pub fn len(&self) -> usize {
        self.data.len() / self.dimensions
    }

    /// Always `false` for a built index; kept beside [`len`](Self::len)
    /// for `clippy::len_without_is_empty`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Stored vectors in insertion order
    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimensions)
    }

    /// The `k` stored vectors closest to `query`, nearest first
    ///
    /// Ties are broken by ascending position. Returns `min(k, len)` hits and
    /// an empty list for `k == 0`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimensions {
            return Err(BriefError::InvalidInput(format!(
                "query has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(BriefError::InvalidInput(
                "query vector contains non-finite values".to_string(),
            ));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .vectors()
            .enumerate()
            .map(|(index, vector)| SearchHit {
                index,
                distance: euclidean_distance(query, vector),
            })
            .collect();

        let by_rank = |a: &SearchHit, b: &SearchHit| -> Ordering {
            a.distance
                .total_cmp(&b.distance)
                .then(a.index.cmp(&b.index))
        };

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_rank);
            hits.truncate(k);
        }
        hits.sort_unstable_by(by_rank);

        Ok(hits)
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> VectorIndex {
        VectorIndex::build(vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 2.0],
            vec![3.0, 4.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_search_orders_by_distance() {
        let index = grid();
        let hits = index.search(&[0.9, 0.0], 3).unwrap();

        let positions: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(positions, vec![1, 0, 2]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!((hits[0].distance - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_self_query_returns_itself_first() {
        let index = grid();
        for (position, vector) in index.vectors().enumerate() {
            let hits = index.search(vector, 1).unwrap();
            assert_eq!(hits[0].index, position);
            assert_eq!(hits[0].distance, 0.0);
        }
    }

    #[test]
    fn test_k_larger_than_population() {
        let index = grid();
        let hits = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[3].index, 3);
        assert_eq!(hits[3].distance, 5.0);
    }

    #[test]
    fn test_k_zero_is_empty() {
        assert!(grid().search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_break_by_position() {
        let index = VectorIndex::build(vec![vec![1.0], vec![-1.0], vec![1.0]]).unwrap();
        let hits = index.search(&[0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(positions, vec![0, 1, 2]);

        let top_two = index.search(&[0.0], 2).unwrap();
        assert_eq!(top_two.iter().map(|h| h.index).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_query_validation() {
        let index = grid();
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(BriefError::InvalidInput(_))
        ));
        assert!(matches!(
            index.search(&[f32::NAN, 0.0], 1),
            Err(BriefError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_build_validation() {
        assert!(VectorIndex::build(Vec::new()).is_err());
        assert!(VectorIndex::build(vec![Vec::new()]).is_err());
        assert!(VectorIndex::build(vec![vec![1.0, 2.0], vec![1.0]]).is_err());
        assert!(VectorIndex::build(vec![vec![f32::INFINITY]]).is_err());

        let index = grid();
        assert_eq!(index.len(), 4);
        assert_eq!(index.dimensions(), 2);
    }

    #[test]
    fn test_built_index_is_never_empty() {
        let index = VectorIndex::build(vec![vec![0.5]]).unwrap();
        assert_eq!(index.len(), 1);
        assert!(!index.is_empty());
    }

    #[test]
    fn test_search_is_pure() {
        let index = grid();
        let first = index.search(&[2.0, 2.0], 2).unwrap();
        let second = index.search(&[2.0, 2.0], 2).unwrap();
        assert_eq!(first, second);
    }
}
