//! Levenberg-Marquardt backend on the `levenberg_marquardt` crate.

use crate::SolverError;
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use std::cell::Cell;

/// Nonlinear least-squares problem: residual vector and its Jacobian.
pub trait NllsProblem {
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64>;
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LmOptions {
    /// Maximum number of Jacobian updates (outer iterations).
    pub max_iters: usize,
    /// Relative cost reduction and relative step size below which the
    /// minimizer reports convergence.
    pub tolerance: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iters: 30,
            tolerance: 1e-12,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LmReport {
    pub iterations: usize,
    pub evaluations: usize,
    /// Sum of squared residuals at the returned parameters.
    pub final_cost: f64,
    pub converged: bool,
}

struct LmWrapper<'a, P: NllsProblem> {
    problem: &'a P,
    params: DVector<f64>,
    jacobians: Cell<usize>,
    max_jacobians: usize,
}

impl<P: NllsProblem> LeastSquaresProblem<f64, Dyn, Dyn> for LmWrapper<'_, P> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(self.problem.residuals(&self.params))
    }

    /// Returning `None` ends the minimization at the last accepted step;
    /// this is how the iteration budget is enforced.
    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let used = self.jacobians.get();
        if used >= self.max_jacobians {
            return None;
        }
        self.jacobians.set(used + 1);
        Some(self.problem.jacobian(&self.params))
    }
}

fn sum_squares(r: &DVector<f64>) -> f64 {
    r.iter().map(|e| e * e).sum()
}

/// Minimise `problem` from `x0` with at most `opts.max_iters` iterations.
pub fn minimize<P: NllsProblem>(
    problem: &P,
    x0: DVector<f64>,
    opts: &LmOptions,
) -> Result<(DVector<f64>, LmReport), SolverError> {
    if !sum_squares(&problem.residuals(&x0)).is_finite() {
        return Err(SolverError::NonFinite);
    }

    let max_iters = opts.max_iters.max(1);
    let lm = LevenbergMarquardt::new()
        .with_ftol(opts.tolerance)
        .with_xtol(opts.tolerance)
        .with_patience(max_iters);

    let wrapper = LmWrapper {
        problem,
        params: x0,
        jacobians: Cell::new(0),
        max_jacobians: max_iters,
    };
    let (wrapper, report) = lm.minimize(wrapper);

    if let TerminationReason::Numerical(what) = report.termination {
        return Err(SolverError::Numerical(what.to_string()));
    }
    log::debug!(
        "lm stopped after {} iterations: {:?}",
        wrapper.jacobians.get(),
        report.termination
    );

    let x = wrapper.params();
    let final_cost = sum_squares(&problem.residuals(&x));
    if !final_cost.is_finite() || x.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite);
    }

    Ok((
        x,
        LmReport {
            iterations: wrapper.jacobians.get(),
            evaluations: report.number_of_evaluations,
            final_cost,
            converged: report.termination.was_successful(),
        },
    ))
}
