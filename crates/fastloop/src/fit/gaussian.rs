//! src/fit/gaussian.rs
//!
//! Three-parameter Gaussian peak model and a damped least-squares fit.

use serde::Serialize;
use std::fmt;

/// Parameters of a Gaussian peak:
/// `amp * exp(-(x - mean)^2 / (2 * sigma^2))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gaussian {
    pub amp: f64,
    pub mean: f64,
    pub sigma: f64,
}

impl Gaussian {
    pub fn eval(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.sigma;
        self.amp * (-0.5 * z * z).exp()
    }
}

/// Why a fit could not produce parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitFailure {
    /// The iteration limit was reached before the step size converged.
    DidNotConverge,
    /// The inputs cannot constrain three parameters: too few points,
    /// non-finite values, a vanishing sigma, or a singular normal
    /// system.
    Degenerate,
}

impl fmt::Display for FitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitFailure::DidNotConverge => write!(f, "least-squares fit did not converge"),
            FitFailure::Degenerate => write!(f, "inputs cannot constrain a Gaussian fit"),
        }
    }
}

impl std::error::Error for FitFailure {}

const MAX_ITERATIONS: usize = 200;
const STEP_TOLERANCE: f64 = 1e-8;
const LAMBDA_START: f64 = 1e-3;
const LAMBDA_LIMIT: f64 = 1e12;

/// Least-squares fit of a Gaussian to `(xs, ys)` starting from `init`.
///
/// Damped Gauss-Newton on the analytic Jacobian: the damping factor
/// grows whenever a step would increase the residual and shrinks after
/// an accepted step, so the iteration cannot run away from a poor
/// starting point. Converges when the accepted step becomes small
/// relative to the parameter scale.
pub fn fit_gaussian(xs: &[f64], ys: &[f64], init: Gaussian) -> Result<Gaussian, FitFailure> {
    if xs.len() != ys.len() || xs.len() < 3 {
        return Err(FitFailure::Degenerate);
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(FitFailure::Degenerate);
    }
    if !init.sigma.is_finite() || init.sigma == 0.0 {
        return Err(FitFailure::Degenerate);
    }

    let mut params = init;
    let mut lambda = LAMBDA_START;
    let mut residual = sum_sq(xs, ys, &params);

    for _ in 0..MAX_ITERATIONS {
        // Normal equations (J^T J + lambda diag) delta = J^T r.
        let mut jtj = [[0.0f64; 3]; 3];
        let mut jtr = [0.0f64; 3];
        for (&x, &y) in xs.iter().zip(ys) {
            let z = (x - params.mean) / params.sigma;
            let e = (-0.5 * z * z).exp();
            let grad = [
                e,
                params.amp * e * z / params.sigma,
                params.amp * e * z * z / params.sigma,
            ];
            let r = y - params.amp * e;
            for i in 0..3 {
                jtr[i] += grad[i] * r;
                for j in 0..3 {
                    jtj[i][j] += grad[i] * grad[j];
                }
            }
        }
        for (i, row) in jtj.iter_mut().enumerate() {
            row[i] *= 1.0 + lambda;
        }

        let delta = solve3(jtj, jtr).ok_or(FitFailure::Degenerate)?;
        let candidate = Gaussian {
            amp: params.amp + delta[0],
            mean: params.mean + delta[1],
            sigma: params.sigma + delta[2],
        };
        if !candidate.sigma.is_finite() || candidate.sigma == 0.0 {
            return Err(FitFailure::Degenerate);
        }

        let next = sum_sq(xs, ys, &candidate);
        if next.is_finite() && next <= residual {
            let step = delta.iter().fold(0.0f64, |acc, d| acc.max(d.abs()));
            let scale = [params.amp, params.mean, params.sigma]
                .iter()
                .fold(1.0f64, |acc, p| acc.max(p.abs()));
            params = candidate;
            residual = next;
            lambda = (lambda * 0.5).max(1e-12);
            if step <= STEP_TOLERANCE * scale {
                return Ok(params);
            }
        } else {
            lambda *= 4.0;
            if lambda > LAMBDA_LIMIT {
                return Err(FitFailure::DidNotConverge);
            }
        }
    }

    Err(FitFailure::DidNotConverge)
}

fn sum_sq(xs: &[f64], ys: &[f64], params: &Gaussian) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = y - params.eval(x);
            r * r
        })
        .sum()
}

/// Solves a 3x3 linear system by Gaussian elimination with partial
/// pivoting. Returns `None` for a (numerically) singular matrix.
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-300 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0f64; 3];
    for row in (0..3).rev() {
        let mut sum = b[row];
        for k in row + 1..3 {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}
