//! Non-linear refinement of a consensus model over its inliers.
//!
//! Problems expose their residual vector through argmin's [`Operator`] and
//! [`Jacobian`] traits; [`levenberg_marquardt`] minimizes the sum of squared
//! residuals and optionally returns the covariance of the parameters.

use argmin::core::{Jacobian, Operator};
use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::core::ModelAdapter;
use crate::error::RefinementError;
use crate::types::Covariance;

/// Iteration cap of the accurate refinement.
pub const MAX_REFINE_ITERATIONS: usize = 100;
/// Iteration cap of the fast refinement.
pub const MAX_FAST_REFINE_ITERATIONS: usize = 20;

const INITIAL_DAMPING: f64 = 1e-3;
const MAX_DAMPING: f64 = 1e16;
const CONVERGENCE_TOLERANCE: f64 = 1e-12;

/// How a refinement is performed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RefineOptions {
    /// Fewer iterations and forward-difference Jacobians.
    pub fast: bool,
    /// Compute the covariance of the refined parameters.
    pub keep_covariance: bool,
}

impl RefineOptions {
    pub fn max_iterations(&self) -> usize {
        if self.fast {
            MAX_FAST_REFINE_ITERATIONS
        } else {
            MAX_REFINE_ITERATIONS
        }
    }
}

/// A refined model and, on request, the covariance of its parameters.
#[derive(Debug, Clone)]
pub struct Refined<M> {
    pub model: M,
    pub covariance: Option<Covariance>,
}

/// Model adapters able to re-estimate a model from all of its inliers.
pub trait Refine: ModelAdapter {
    /// Refine `model` over the correspondences at `inliers`.
    ///
    /// Failure is not fatal for the caller, the unrefined model is kept.
    fn refine(
        &self,
        model: &Self::Model,
        inliers: &[usize],
        options: &RefineOptions,
    ) -> Result<Refined<Self::Model>, RefinementError>;
}

/// Fail unless at least `required` inliers are available.
pub fn ensure_inliers(inliers: &[usize], required: usize) -> Result<(), RefinementError> {
    if inliers.len() < required {
        Err(RefinementError::NotEnoughInliers {
            required,
            got: inliers.len(),
        })
    } else {
        Ok(())
    }
}

/// Least-squares problem given as a residual function, with a
/// finite-difference Jacobian.
pub struct NumericLeastSquares<F> {
    residuals: F,
    central: bool,
}

impl<F> NumericLeastSquares<F>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    /// Forward differences when `fast`, central differences otherwise.
    pub fn new(residuals: F, fast: bool) -> Self {
        Self {
            residuals,
            central: !fast,
        }
    }
}

impl<F> Operator for NumericLeastSquares<F>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    type Param = DVector<f64>;
    type Output = DVector<f64>;

    fn apply(&self, param: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok((self.residuals)(param))
    }
}

impl<F> Jacobian for NumericLeastSquares<F>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    type Param = DVector<f64>;
    type Jacobian = DMatrix<f64>;

    fn jacobian(&self, param: &Self::Param) -> Result<Self::Jacobian, argmin::core::Error> {
        let base = (self.residuals)(param);
        let mut jac = DMatrix::<f64>::zeros(base.len(), param.len());

        for j in 0..param.len() {
            let scale = param[j].abs().max(1.0);
            if self.central {
                let h = f64::EPSILON.cbrt() * scale;
                let mut plus = param.clone();
                let mut minus = param.clone();
                plus[j] += h;
                minus[j] -= h;
                let col = ((self.residuals)(&plus) - (self.residuals)(&minus)) / (2.0 * h);
                jac.set_column(j, &col);
            } else {
                let h = f64::EPSILON.sqrt() * scale;
                let mut plus = param.clone();
                plus[j] += h;
                let col = ((self.residuals)(&plus) - &base) / h;
                jac.set_column(j, &col);
            }
        }

        Ok(jac)
    }
}

/// Outcome of [`levenberg_marquardt`].
#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: DVector<f64>,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    pub initial_cost: f64,
    pub iterations: usize,
    pub covariance: Option<Covariance>,
}

/// Damped Gauss-Newton minimization of `|r(p)|²` starting at `initial`.
///
/// Damping grows tenfold on a rejected step and shrinks tenfold on an
/// accepted one. Only steps that decrease the cost are accepted, so the
/// returned cost never exceeds the initial one.
pub fn levenberg_marquardt<P>(
    problem: &P,
    initial: DVector<f64>,
    max_iterations: usize,
    keep_covariance: bool,
) -> Result<LmSolution, RefinementError>
where
    P: Operator<Param = DVector<f64>, Output = DVector<f64>>
        + Jacobian<Param = DVector<f64>, Jacobian = DMatrix<f64>>,
{
    let mut params = initial;
    let mut residuals = problem.apply(&params)?;
    let mut cost = residuals.norm_squared();
    if !cost.is_finite() {
        return Err(RefinementError::NonFiniteCost);
    }
    let initial_cost = cost;

    let mut lambda = INITIAL_DAMPING;
    let mut iterations = 0;

    'outer: while iterations < max_iterations {
        iterations += 1;
        let jac = problem.jacobian(&params)?;
        let jtj = jac.transpose() * &jac;
        let gradient = jac.transpose() * &residuals;
        if gradient.amax() <= CONVERGENCE_TOLERANCE {
            break;
        }

        loop {
            let mut damped = jtj.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * jtj[(i, i)].max(CONVERGENCE_TOLERANCE);
            }

            let step = damped.lu().solve(&(-&gradient));
            if let Some(step) = step.filter(|s| s.iter().all(|v| v.is_finite())) {
                let candidate = &params + &step;
                let candidate_residuals = problem.apply(&candidate)?;
                let candidate_cost = candidate_residuals.norm_squared();

                if candidate_cost.is_finite() && candidate_cost < cost {
                    let relative_decrease = (cost - candidate_cost) / cost.max(f64::MIN_POSITIVE);
                    let step_limit =
                        CONVERGENCE_TOLERANCE * (params.norm() + CONVERGENCE_TOLERANCE);
                    let small_step = step.norm() <= step_limit;
                    params = candidate;
                    residuals = candidate_residuals;
                    cost = candidate_cost;
                    lambda = (lambda / 10.0).max(f64::MIN_POSITIVE);
                    trace!(iterations, cost, lambda, "step accepted");
                    if relative_decrease < CONVERGENCE_TOLERANCE || small_step {
                        break 'outer;
                    }
                    break;
                }
            }

            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                break 'outer;
            }
        }
    }

    let covariance = if keep_covariance {
        covariance_at(problem, &params, cost)?
    } else {
        None
    };

    Ok(LmSolution {
        params,
        cost,
        initial_cost,
        iterations,
        covariance,
    })
}

/// `(JᵀJ)⁻¹ s²` at `params`, with `s² = cost / (m - p)`, or `cost / m` when
/// there are no more residuals than parameters. `None` if `JᵀJ` is singular.
pub fn covariance_at<P>(
    problem: &P,
    params: &DVector<f64>,
    cost: f64,
) -> Result<Option<Covariance>, RefinementError>
where
    P: Jacobian<Param = DVector<f64>, Jacobian = DMatrix<f64>>,
{
    let jac = problem.jacobian(params)?;
    let (m, p) = jac.shape();
    if m == 0 {
        return Ok(None);
    }
    let dof = if m > p { m - p } else { m };
    let variance = cost / dof as f64;

    let jtj = jac.transpose() * &jac;
    let covariance = jtj
        .try_inverse()
        .map(|inv| inv * variance)
        .filter(|c| c.iter().all(|v| v.is_finite()));
    Ok(covariance)
}
