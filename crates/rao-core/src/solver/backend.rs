use anyhow::{anyhow, ensure, Result};
use faer::{prelude::*, solvers::PartialPivLu, Mat};

/// Solves dense systems `A·x = b` for the reduced susceptance matrix.
///
/// Implementations must report a singular or non-finite system as an error
/// rather than returning garbage; the oracle maps that to a divergence.
pub trait LinearSystemBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>>;

    /// Solve for several right-hand sides sharing one matrix.
    fn solve_many(&self, matrix: &[Vec<f64>], rhs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rhs.iter().map(|b| self.solve(matrix, b)).collect()
    }
}

fn check_dimensions(matrix: &[Vec<f64>], rhs_len: usize) -> Result<()> {
    let n = matrix.len();
    ensure!(
        rhs_len == n,
        "rhs length ({}) does not match matrix dimension {}",
        rhs_len,
        n
    );
    ensure!(
        matrix.iter().all(|row| row.len() == n),
        "matrix must be square"
    );
    Ok(())
}

fn check_finite(solution: &[f64]) -> Result<()> {
    ensure!(
        solution.iter().all(|v| v.is_finite()),
        "non-finite solution (singular matrix)"
    );
    Ok(())
}

/// Gauss-Jordan elimination with partial pivoting.
#[derive(Debug, Clone, Default)]
pub struct GaussSolver;

impl LinearSystemBackend for GaussSolver {
    fn name(&self) -> &'static str {
        "gauss"
    }

    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        let n = matrix.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        check_dimensions(matrix, rhs.len())?;

        let mut a = matrix.to_vec();
        let mut b = rhs.to_vec();

        for i in 0..n {
            let mut pivot = i;
            for row in i + 1..n {
                if a[row][i].abs() > a[pivot][i].abs() {
                    pivot = row;
                }
            }
            if pivot != i {
                a.swap(i, pivot);
                b.swap(i, pivot);
            }

            let diag = a[i][i];
            if diag.abs() < 1e-12 {
                return Err(anyhow!("singular matrix (pivot {} is zero)", i));
            }

            for value in a[i][i..].iter_mut() {
                *value /= diag;
            }
            b[i] /= diag;

            let pivot_segment = a[i][i..].to_vec();
            for row in 0..n {
                if row == i {
                    continue;
                }
                let factor = a[row][i];
                if factor == 0.0 {
                    continue;
                }
                for (target, &p) in a[row][i..].iter_mut().zip(pivot_segment.iter()) {
                    *target -= factor * p;
                }
                b[row] -= factor * b[i];
            }
        }

        check_finite(&b)?;
        Ok(b)
    }
}

/// Partial-pivot LU from `faer`; factorises once per call to [`solve_many`].
///
/// [`solve_many`]: LinearSystemBackend::solve_many
#[derive(Debug, Clone, Default)]
pub struct FaerSolver;

impl LinearSystemBackend for FaerSolver {
    fn name(&self) -> &'static str {
        "faer"
    }

    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        let mut solutions = self.solve_many(matrix, &[rhs.to_vec()])?;
        Ok(solutions.pop().unwrap_or_default())
    }

    fn solve_many(&self, matrix: &[Vec<f64>], rhs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let n = matrix.len();
        if n == 0 {
            return Ok(vec![Vec::new(); rhs.len()]);
        }
        for b in rhs {
            check_dimensions(matrix, b.len())?;
        }
        if rhs.is_empty() {
            return Ok(Vec::new());
        }

        let mat = Mat::from_fn(n, n, |i, j| matrix[i][j]);
        let rhs_mat = Mat::from_fn(n, rhs.len(), |i, k| rhs[k][i]);
        let lu = PartialPivLu::new(mat.as_ref());
        let sol = lu.solve(&rhs_mat);

        let mut solutions = Vec::with_capacity(rhs.len());
        for k in 0..rhs.len() {
            let column: Vec<f64> = (0..n).map(|i| sol.read(i, k)).collect();
            check_finite(&column)?;
            solutions.push(column);
        }
        Ok(solutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reduced_triangle() -> Vec<Vec<f64>> {
        // Three-bus triangle, x = 0.1 p.u. everywhere, slack removed
        vec![vec![20.0, -10.0], vec![-10.0, 20.0]]
    }

    #[test]
    fn gauss_and_faer_agree_on_triangle() {
        let matrix = reduced_triangle();
        let rhs = vec![0.0, -3.0];

        let gauss = GaussSolver.solve(&matrix, &rhs).unwrap();
        let faer = FaerSolver.solve(&matrix, &rhs).unwrap();

        assert!((gauss[0] + 0.1).abs() < 1e-12);
        assert!((gauss[1] + 0.2).abs() < 1e-12);
        for (g, f) in gauss.iter().zip(faer.iter()) {
            assert!((g - f).abs() < 1e-10);
        }
    }

    #[test]
    fn solve_many_returns_one_column_per_rhs() {
        let matrix = reduced_triangle();
        let rhs = vec![vec![0.0, -3.0], vec![0.0, 10.0]];

        for backend in [&GaussSolver as &dyn LinearSystemBackend, &FaerSolver] {
            let sols = backend.solve_many(&matrix, &rhs).unwrap();
            assert_eq!(sols.len(), 2);
            assert!((sols[1][0] - 1.0 / 3.0).abs() < 1e-10, "{}", backend.name());
            assert!((sols[1][1] - 2.0 / 3.0).abs() < 1e-10, "{}", backend.name());
        }
    }

    #[test]
    fn gauss_reports_singular_matrix() {
        let matrix = vec![vec![1.0, -1.0], vec![-1.0, 1.0]];
        assert!(GaussSolver.solve(&matrix, &[1.0, -1.0]).is_err());
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let matrix = reduced_triangle();
        assert!(GaussSolver.solve(&matrix, &[1.0]).is_err());
        assert!(FaerSolver.solve(&matrix, &[1.0]).is_err());
    }
}
