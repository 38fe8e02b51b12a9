//! Problem instance types.

use crate::error::{Result, TourForgeError};

/// Index of a city in `[0, n)`.
pub type CityIndex = usize;

/// Distances between cities, row `from`, column `to`.
///
/// Rows are stored as supplied. Shape and content are checked by
/// [`validate`](Self::validate), which model building calls before
/// touching a solver, so malformed data never reaches a gateway.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistanceMatrix {
    rows: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    /// Wraps supplier rows without checking them.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        Self { rows }
    }

    /// Builds an `n × n` matrix from a distance function. The diagonal is zero.
    pub fn from_fn(n: usize, mut distance: impl FnMut(CityIndex, CityIndex) -> f64) -> Self {
        let rows = (0..n)
            .map(|from| {
                (0..n)
                    .map(|to| if from == to { 0.0 } else { distance(from, to) })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Number of rows (the city count once validated).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distance of the directed edge `from -> to`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    #[inline]
    pub fn distance(&self, from: CityIndex, to: CityIndex) -> f64 {
        self.rows[from][to]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Returns true if `d(a, b) == d(b, a)` for every pair.
    pub fn is_symmetric(&self) -> bool {
        let n = self.rows.len();
        (0..n).all(|a| (a + 1..n).all(|b| self.rows[a][b] == self.rows[b][a]))
    }

    /// Checks that the matrix is square, holds at least two cities and
    /// contains only finite, non-negative distances. Returns the city count.
    pub fn validate(&self) -> Result<usize> {
        let n = self.rows.len();
        if n < 2 {
            return Err(TourForgeError::InvalidInstance(format!(
                "at least 2 cities are required, got {}",
                n
            )));
        }
        for (from, row) in self.rows.iter().enumerate() {
            if row.len() != n {
                return Err(TourForgeError::InvalidInstance(format!(
                    "matrix is not square: row {} has {} entries, expected {}",
                    from,
                    row.len(),
                    n
                )));
            }
            for (to, &d) in row.iter().enumerate() {
                if !d.is_finite() || d < 0.0 {
                    return Err(TourForgeError::InvalidInstance(format!(
                        "distance {} -> {} must be finite and non-negative, got {}",
                        from, to, d
                    )));
                }
            }
            if row[from] != 0.0 {
                tracing::warn!(
                    city = from,
                    distance = row[from],
                    "Non-zero diagonal entry is ignored"
                );
            }
        }
        Ok(n)
    }
}

/// A travelling-salesman instance: distances plus the city the tour starts from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TspInstance {
    pub distances: DistanceMatrix,
    pub start: CityIndex,
}

impl TspInstance {
    pub fn new(distances: DistanceMatrix, start: CityIndex) -> Self {
        Self { distances, start }
    }

    /// Number of cities (rows of the distance matrix).
    pub fn city_count(&self) -> usize {
        self.distances.len()
    }

    /// Validates the matrix and the start city. Returns the city count.
    pub fn validate(&self) -> Result<usize> {
        let n = self.distances.validate()?;
        if self.start >= n {
            return Err(TourForgeError::InvalidInstance(format!(
                "start city {} is out of range for {} cities",
                self.start, n
            )));
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_from_fn_zero_diagonal() {
        let m = DistanceMatrix::from_fn(3, |a, b| (a + b) as f64);
        assert_eq!(m.len(), 3);
        assert_eq!(m.distance(1, 1), 0.0);
        assert_eq!(m.distance(1, 2), 3.0);
        assert!(m.is_symmetric());
        assert_eq!(m.validate().unwrap(), 3);
    }

    #[test]
    fn test_non_square_is_invalid() {
        let m = DistanceMatrix::from_rows(vec![vec![0.0; 4]; 3]);
        let err = m.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInstance);
    }

    #[test]
    fn test_negative_distance_is_invalid() {
        let m = DistanceMatrix::from_rows(vec![vec![0.0, -1.0], vec![1.0, 0.0]]);
        assert_eq!(m.validate().unwrap_err().kind(), ErrorKind::InvalidInstance);
    }

    #[test]
    fn test_nan_distance_is_invalid() {
        let m = DistanceMatrix::from_rows(vec![vec![0.0, f64::NAN], vec![1.0, 0.0]]);
        assert_eq!(m.validate().unwrap_err().kind(), ErrorKind::InvalidInstance);
    }

    #[test]
    fn test_single_city_is_invalid() {
        let m = DistanceMatrix::from_rows(vec![vec![0.0]]);
        assert_eq!(m.validate().unwrap_err().kind(), ErrorKind::InvalidInstance);
    }

    #[test]
    fn test_asymmetric_detected() {
        let m = DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![2.0, 0.0]]);
        assert!(!m.is_symmetric());
        assert_eq!(m.validate().unwrap(), 2);
    }

    #[test]
    fn test_start_out_of_range() {
        let instance = TspInstance::new(DistanceMatrix::from_fn(3, |_, _| 1.0), 3);
        assert_eq!(
            instance.validate().unwrap_err().kind(),
            ErrorKind::InvalidInstance
        );
    }
}
