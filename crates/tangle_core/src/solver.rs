use crate::error::SpectrumError;

/// Solves `mat · x = rhs` in place by Gaussian elimination with partial
/// pivoting. `mat` is a row-major n×n matrix; both buffers are overwritten
/// and the solution is left in `rhs`.
///
/// At each elimination step the row with the largest-magnitude leading
/// coefficient in the active column is swapped into place. A pivot of
/// exactly zero after pivoting is reported as singular; no tolerance is
/// applied to near-zero pivots, so near-singular systems solve to large
/// coefficients instead of failing.
pub fn solve_in_place(mat: &mut [f64], rhs: &mut [f64], n: usize) -> Result<(), SpectrumError> {
    debug_assert_eq!(mat.len(), n * n);
    debug_assert_eq!(rhs.len(), n);

    for i in 0..n - 1 {
        let mut max = mat[i * n + i].abs();
        let mut max_row = i;
        for j in i + 1..n {
            let h = mat[j * n + i].abs();
            if h > max {
                max = h;
                max_row = j;
            }
        }
        if max_row != i {
            for k in 0..n {
                mat.swap(i * n + k, max_row * n + k);
            }
            rhs.swap(i, max_row);
        }

        let pivot = mat[i * n + i];
        if pivot.abs() == 0.0 {
            return Err(SpectrumError::SingularMatrix);
        }
        for j in i + 1..n {
            let q = -mat[j * n + i] / pivot;
            mat[j * n + i] = 0.0;
            for k in i + 1..n {
                mat[j * n + k] += q * mat[i * n + k];
            }
            rhs[j] += q * rhs[i];
        }
    }

    let last = n - 1;
    if mat[last * n + last] == 0.0 {
        return Err(SpectrumError::SingularMatrix);
    }
    rhs[last] /= mat[last * n + last];
    for i in (0..last).rev() {
        for j in (i + 1..n).rev() {
            rhs[i] -= mat[i * n + j] * rhs[j];
        }
        rhs[i] /= mat[i * n + i];
    }
    Ok(())
}

/// Inverts a row-major n×n matrix by solving the system once per standard
/// basis vector and assembling the solutions into columns of the inverse.
pub fn invert_matrix(mat: &[f64], n: usize) -> Result<Vec<f64>, SpectrumError> {
    debug_assert_eq!(mat.len(), n * n);
    let mut inverse = vec![0.0; n * n];
    let mut scratch = vec![0.0; n * n];
    let mut column = vec![0.0; n];
    for i in 0..n {
        scratch.copy_from_slice(mat);
        for (j, value) in column.iter_mut().enumerate() {
            *value = if i == j { 1.0 } else { 0.0 };
        }
        solve_in_place(&mut scratch, &mut column, n)?;
        for j in 0..n {
            inverse[j * n + i] = column[j];
        }
    }
    Ok(inverse)
}

#[cfg(test)]
mod tests {
    use super::{invert_matrix, solve_in_place};
    use crate::error::SpectrumError;
    use nalgebra::DMatrix;

    #[test]
    fn solves_known_system() {
        let mut mat = vec![2.0, 1.0, -1.0, -3.0, -1.0, 2.0, -2.0, 1.0, 2.0];
        let mut rhs = vec![8.0, -11.0, -3.0];
        solve_in_place(&mut mat, &mut rhs, 3).expect("system should solve");
        // Known solution: x = 2, y = 3, z = -1.
        assert!((rhs[0] - 2.0).abs() < 1e-12);
        assert!((rhs[1] - 3.0).abs() < 1e-12);
        assert!((rhs[2] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pivoting_handles_zero_leading_coefficient() {
        let mut mat = vec![0.0, 1.0, 1.0, 0.0];
        let mut rhs = vec![2.0, 3.0];
        solve_in_place(&mut mat, &mut rhs, 2).expect("pivoting should rescue the system");
        assert!((rhs[0] - 3.0).abs() < 1e-12);
        assert!((rhs[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn inversion_round_trip_yields_identity() {
        // Diagonally dominant, comfortably conditioned.
        let mat = vec![
            4.0, 1.0, 0.5, 0.0, //
            1.0, 5.0, 1.0, 0.5, //
            0.5, 1.0, 6.0, 1.0, //
            0.0, 0.5, 1.0, 4.0,
        ];
        let inverse = invert_matrix(&mat, 4).expect("matrix should invert");
        let a = DMatrix::from_row_slice(4, 4, &mat);
        let a_inv = DMatrix::from_row_slice(4, 4, &inverse);
        let product = a * a_inv;
        let identity = DMatrix::<f64>::identity(4, 4);
        assert!((product - identity).abs().max() < 1e-10);
    }

    #[test]
    fn zero_row_is_singular() {
        let mat = vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 4.0, 5.0, 6.0];
        assert_eq!(invert_matrix(&mat, 3), Err(SpectrumError::SingularMatrix));
    }
}
