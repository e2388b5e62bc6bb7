//! Shared traits and structures for the explicit Runge-Kutta and Runge-Kutta-Chebyshev integrators.

use nalgebra::DVector;
use thiserror::Error;

/// Trait needed to be implemented by the user.
pub trait System {
    /// Number of equations, i.e. the length of the state vector.
    fn number_of_equations(&self) -> usize;

    /// Right-hand side of the system of ordinary differential equations.
    fn rhs(&self, t: f64, y: &DVector<f64>, dy: &mut DVector<f64>);

    /// Product of the Jacobian of the right-hand side at `(t, y)` with the vector `v`.
    ///
    /// `fy` holds `rhs(t, y)`. The product is written to `jv`. Returns `false` when the
    /// problem does not provide a Jacobian, in which case finite differences of `rhs` are used.
    fn jacobian_vector_product(
        &self,
        _t: f64,
        _y: &DVector<f64>,
        _fy: &DVector<f64>,
        _v: &DVector<f64>,
        _jv: &mut DVector<f64>,
    ) -> bool {
        false
    }
}

/// Enumeration of the errors that may arise during integration.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("No ODE problem has been assigned to the integrator.")]
    ProblemNotAssigned,
    #[error("The ODE problem has no equations.")]
    EmptyState,
    #[error("Initial state has {found} components, the problem has {expected} equations.")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Final integration time {t_out} is lower than current time {t} or it is not sufficiently apart.")]
    InvalidTimeRange { t_out: f64, t: f64 },
    #[error("Stopped at t = {t}. Step size {h} is below the minimum step size {h_min} for the current precision.")]
    StepTooSmall { t: f64, h: f64, h_min: f64 },
    #[error("Maximum number of iterations ({max_iterations}) exceeded during computation of the spectral radius.")]
    MaxSpectralRadiusIterationsExceeded { max_iterations: usize },
    #[error("Tolerance {value} has to be in the range [{min}, {max}].")]
    ToleranceOutOfRange { value: f64, min: f64, max: f64 },
    #[error("Parameter `{name}` = {value} has to be in the range [{min}, {max}].")]
    ParameterOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("Could not write the step size history.")]
    History(#[from] std::io::Error),
}

/// Computes the inverse tolerance scale `1 / (rel_tol * |y_i| + abs_tol)` into `weights`.
pub(crate) fn inverse_tolerance_weights(
    weights: &mut DVector<f64>,
    y: &DVector<f64>,
    rel_tol: f64,
    abs_tol: f64,
) {
    for (w, y_i) in weights.iter_mut().zip(y.iter()) {
        *w = 1.0 / (rel_tol * y_i.abs() + abs_tol);
    }
}

/// Weighted root-mean-square norm `sqrt(sum((x_i * w_i)^2) / n)`.
pub(crate) fn weighted_rms_norm(x: &DVector<f64>, weights: &DVector<f64>) -> f64 {
    debug_assert_eq!(x.len(), weights.len());
    if x.is_empty() {
        return 0.0;
    }
    let sum: f64 = x
        .iter()
        .zip(weights.iter())
        .map(|(x_i, w_i)| (x_i * w_i) * (x_i * w_i))
        .sum();
    (sum / x.len() as f64).sqrt()
}
