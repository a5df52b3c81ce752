use super::{QpSolver, SolveStatus, SolverOutput};
use ndarray::{Array1, Array2};

/// Relative ridge added to the passive-set system when it is singular.
const RIDGE: f64 = 1e-10;

/// Lawson–Hanson active-set solver for `min ||M x - b||²` subject to `x >= 0`.
#[derive(Clone, Copy, Debug)]
pub struct NnlsSolver {
    /// Optimality tolerance on the gradient.
    pub tolerance: f64,
    /// Maximum number of inner iterations; defaults to `3n + 10`.
    pub max_iterations: Option<usize>,
}

impl Default for NnlsSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            max_iterations: None,
        }
    }
}

impl QpSolver for NnlsSolver {
    fn solve(&self, design: &Array2<f64>, target: &Array1<f64>) -> SolverOutput {
        let n = design.ncols();
        let mtm = design.t().dot(design);
        let mtb = design.t().dot(target);
        let max_iterations = self.max_iterations.unwrap_or(3 * n + 10);
        // Scale the tolerance with the problem so tiny capacities do not stall the search.
        let scale = mtm.diag().iter().fold(0.0f64, |a, b| a.max(b.abs())).max(1.0);
        let tol = self.tolerance * scale;

        let mut x = Array1::<f64>::zeros(n);
        let mut passive = vec![false; n];
        let mut iterations = 0;

        loop {
            let gradient = &mtb - &mtm.dot(&x);
            let candidate = (0..n)
                .filter(|j| !passive[*j])
                .max_by(|a, b| gradient[*a].total_cmp(&gradient[*b]));
            let entering = match candidate {
                Some(j) if gradient[j] > tol => j,
                _ => break,
            };
            passive[entering] = true;

            loop {
                iterations += 1;
                if iterations > max_iterations {
                    return SolverOutput::failed(SolveStatus::IterationLimit, n);
                }
                let Some(s) = solve_passive(&mtm, &mtb, &passive) else {
                    return SolverOutput::failed(SolveStatus::NumericalError, n);
                };
                if (0..n).filter(|j| passive[*j]).all(|j| s[j] > 0.0) {
                    x = s;
                    break;
                }

                let alpha = step_length(&x, &s, &passive);
                for j in 0..n {
                    x[j] += alpha * (s[j] - x[j]);
                    if passive[j] && x[j] <= tol {
                        passive[j] = false;
                        x[j] = 0.0;
                    }
                }
            }
        }

        SolverOutput {
            status: SolveStatus::Optimal,
            solution: x.to_vec(),
        }
    }
}

/// How far to step from `x` towards `s` so that the first passive variable
/// reaches zero. A variable already at zero in both blocks the step entirely.
fn step_length(x: &Array1<f64>, s: &Array1<f64>, passive: &[bool]) -> f64 {
    (0..x.len())
        .filter(|j| passive[*j] && s[*j] <= 0.0)
        .map(|j| {
            let gap = x[j] - s[j];
            if gap > 0.0 {
                x[j] / gap
            } else {
                0.0
            }
        })
        .fold(f64::INFINITY, f64::min)
}

/// Solves the normal equations restricted to the passive set. Inactive
/// variables are zero in the result.
fn solve_passive(mtm: &Array2<f64>, mtb: &Array1<f64>, passive: &[bool]) -> Option<Array1<f64>> {
    let idx = (0..passive.len()).filter(|j| passive[*j]).collect::<Vec<_>>();
    let k = idx.len();
    let mut a = Array2::<f64>::zeros((k, k));
    let mut b = Array1::<f64>::zeros(k);
    for (r, i) in idx.iter().enumerate() {
        b[r] = mtb[*i];
        for (c, j) in idx.iter().enumerate() {
            a[[r, c]] = mtm[[*i, *j]];
        }
    }

    let sub = cholesky_solve(&a, &b).or_else(|| {
        let ridge = RIDGE * a.diag().iter().fold(0.0f64, |m, d| m.max(d.abs())).max(1.0);
        for r in 0..k {
            a[[r, r]] += ridge;
        }
        cholesky_solve(&a, &b)
    })?;

    let mut full = Array1::<f64>::zeros(passive.len());
    for (r, i) in idx.iter().enumerate() {
        full[*i] = sub[r];
    }
    Some(full)
}

/// Solves `a x = b` for symmetric positive definite `a`.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= a[[i, i]].abs() * 1e-13 || sum <= 0.0 {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    Some(x)
}

#[cfg(test)]
mod test {
    use super::{step_length, NnlsSolver};
    use crate::assignment::{QpSolver, SolveStatus};
    use assert_approx_eq::assert_approx_eq;
    use ndarray::{arr1, arr2};

    #[test]
    fn unconstrained_optimum_is_kept() {
        let m = arr2(&[[1.0, 0.0], [0.0, 2.0], [1.0, 1.0]]);
        let b = arr1(&[1.0, 2.0, 2.0]);
        let out = NnlsSolver::default().solve(&m, &b);
        assert_eq!(out.status, SolveStatus::Optimal);
        assert_approx_eq!(out.solution[0], 1.0, 1e-9);
        assert_approx_eq!(out.solution[1], 1.0, 1e-9);
    }

    #[test]
    fn negative_component_is_clamped() {
        // The unconstrained solution is (2, -1).
        let m = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let b = arr1(&[2.0, -1.0]);
        let out = NnlsSolver::default().solve(&m, &b);
        assert_eq!(out.status, SolveStatus::Optimal);
        assert_approx_eq!(out.solution[0], 2.0, 1e-9);
        assert_eq!(out.solution[1], 0.0);
    }

    #[test]
    fn duplicate_columns() {
        let m = arr2(&[[1.0, 1.0], [1.0, 1.0]]);
        let b = arr1(&[3.0, 3.0]);
        let out = NnlsSolver::default().solve(&m, &b);
        assert_eq!(out.status, SolveStatus::Optimal);
        assert_approx_eq!(out.solution[0] + out.solution[1], 3.0, 1e-6);
    }

    #[test]
    fn step_length_stays_finite() {
        let x = arr1(&[0.0, 2.0]);
        let s = arr1(&[0.0, -1.0]);
        assert_eq!(step_length(&x, &s, &[true, true]), 0.0);
        assert_approx_eq!(step_length(&x, &s, &[false, true]), 2.0 / 3.0);
    }
}
