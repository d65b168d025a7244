use ndarray::Array2;
use std::fmt::Display;

use crate::error::{AppError, AppResult};

/// Pairwise score between preprocessed feature vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityKernel {
    /// Dot product of L2-normalised rows
    Cosine,
    /// Plain dot product
    Linear,
}

impl SimilarityKernel {
    pub fn name(&self) -> &'static str {
        match self {
            SimilarityKernel::Cosine => "cosine",
            SimilarityKernel::Linear => "linear",
        }
    }

    /// Scores every row of `x` against every row of `y`
    pub fn compute(&self, x: &Array2<f64>, y: &Array2<f64>) -> AppResult<Array2<f64>> {
        if x.ncols() != y.ncols() {
            return Err(AppError::InvalidInput(format!(
                "Feature width mismatch: {} vs {}",
                x.ncols(),
                y.ncols()
            )));
        }

        let scores = match self {
            SimilarityKernel::Linear => x.dot(&y.t()),
            SimilarityKernel::Cosine => {
                let x = normalize_rows(x);
                let y = normalize_rows(y);
                x.dot(&y.t())
            }
        };
        Ok(scores)
    }
}

impl Display for SimilarityKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Zero rows stay zero
fn normalize_rows(matrix: &Array2<f64>) -> Array2<f64> {
    let mut normalized = matrix.clone();
    for mut row in normalized.rows_mut() {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_linear_kernel() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let scores = SimilarityKernel::Linear.compute(&x, &x).unwrap();
        assert_close(&scores, &array![[5.0, 11.0], [11.0, 25.0]]);
    }

    #[test]
    fn test_cosine_similarity() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [0.0, 2.0]];
        let scores = SimilarityKernel::Cosine.compute(&x, &x).unwrap();
        let h = 1.0 / 2.0_f64.sqrt();
        assert_close(
            &scores,
            &array![[1.0, h, 0.0], [h, 1.0, h], [0.0, h, 1.0]],
        );
    }

    #[test]
    fn test_cosine_zero_row_scores_zero() {
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let scores = SimilarityKernel::Cosine.compute(&x, &x).unwrap();
        assert_eq!(scores[[0, 0]], 0.0);
        assert_eq!(scores[[0, 1]], 0.0);
    }

    #[test]
    fn test_width_mismatch() {
        let x = array![[1.0, 0.0]];
        let y = array![[1.0, 0.0, 0.0]];
        assert!(SimilarityKernel::Linear.compute(&x, &y).is_err());
    }
}
