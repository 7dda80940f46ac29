/// Applies the companion-matrix action of a local Jacobian row to every
/// basis vector, in place. The new first coordinate of each vector is the
/// inner product of the Jacobian row with the vector's current coordinates;
/// the remaining coordinates shift by one lag, mirroring the delay-embedding
/// structure. `basis` is row-major dim×dim, one basis vector per row.
pub fn propagate(basis: &mut [f64], jacobian_row: &[f64], dim: usize) {
    debug_assert_eq!(basis.len(), dim * dim);
    debug_assert_eq!(jacobian_row.len(), dim);
    let mut updated = vec![0.0; dim * dim];
    for i in 0..dim {
        let row = &basis[i * dim..(i + 1) * dim];
        let mut head = 0.0;
        for k in 0..dim {
            head += jacobian_row[k] * row[k];
        }
        updated[i * dim] = head;
        for j in 1..dim {
            updated[i * dim + j] = row[j - 1];
        }
    }
    basis.copy_from_slice(&updated);
}

/// Classical Gram-Schmidt over the rows of `basis` in fixed order: each
/// vector has its projections onto all previously processed vectors
/// subtracted and is then normalized. The pre-normalization norm of each
/// vector is written to `stretch`; row 0 tracks the fastest-growing
/// direction.
pub fn gram_schmidt(basis: &mut [f64], dim: usize, stretch: &mut [f64]) {
    debug_assert_eq!(basis.len(), dim * dim);
    debug_assert_eq!(stretch.len(), dim);
    let mut ortho = vec![0.0; dim * dim];
    let mut diff = vec![0.0; dim];
    for i in 0..dim {
        diff.fill(0.0);
        for j in 0..i {
            let mut projection = 0.0;
            for k in 0..dim {
                projection += basis[i * dim + k] * ortho[j * dim + k];
            }
            for k in 0..dim {
                diff[k] -= projection * ortho[j * dim + k];
            }
        }
        let mut norm = 0.0;
        for j in 0..dim {
            let value = basis[i * dim + j] + diff[j];
            norm += value * value;
        }
        let norm = norm.sqrt();
        stretch[i] = norm;
        for j in 0..dim {
            ortho[i * dim + j] = (basis[i * dim + j] + diff[j]) / norm;
        }
    }
    basis.copy_from_slice(&ortho);
}

#[cfg(test)]
mod tests {
    use super::{gram_schmidt, propagate};
    use nalgebra::DMatrix;

    #[test]
    fn gram_schmidt_output_is_orthonormal() {
        let dim = 3;
        let mut basis = vec![
            1.0, 1.0, 0.0, //
            1.0, 0.0, 1.0, //
            0.2, 0.9, 1.3,
        ];
        let mut stretch = vec![0.0; dim];
        gram_schmidt(&mut basis, dim, &mut stretch);

        let q = DMatrix::from_row_slice(dim, dim, &basis);
        let gram = &q * q.transpose();
        let identity = DMatrix::<f64>::identity(dim, dim);
        assert!((gram - identity).abs().max() < 1e-12);
        for &factor in &stretch {
            assert!(factor > 0.0);
        }
    }

    #[test]
    fn stretch_factors_of_orthogonal_rows_are_their_norms() {
        let mut basis = vec![3.0, 0.0, 0.0, 0.5];
        let mut stretch = vec![0.0; 2];
        gram_schmidt(&mut basis, 2, &mut stretch);
        assert!((stretch[0] - 3.0).abs() < 1e-12);
        assert!((stretch[1] - 0.5).abs() < 1e-12);
        assert_eq!(basis, vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn first_stretch_is_first_row_norm() {
        let mut basis = vec![3.0, 4.0, 1.0, 1.0];
        let mut stretch = vec![0.0; 2];
        gram_schmidt(&mut basis, 2, &mut stretch);
        assert!((stretch[0] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn propagation_has_companion_structure() {
        let dim = 3;
        let mut basis = vec![
            1.0, 2.0, 3.0, //
            4.0, 5.0, 6.0, //
            7.0, 8.0, 9.0,
        ];
        let jacobian_row = [0.5, -1.0, 2.0];
        propagate(&mut basis, &jacobian_row, dim);

        for i in 0..dim {
            let original = [
                (i * 3 + 1) as f64,
                (i * 3 + 2) as f64,
                (i * 3 + 3) as f64,
            ];
            let expected_head =
                0.5 * original[0] - 1.0 * original[1] + 2.0 * original[2];
            assert!((basis[i * dim] - expected_head).abs() < 1e-12);
            assert_eq!(basis[i * dim + 1], original[0]);
            assert_eq!(basis[i * dim + 2], original[1]);
        }
    }
}
