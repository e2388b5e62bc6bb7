//! Estimation of the spectral radius of the Jacobian of the right-hand side.
//!
//! The Jacobian is never formed. A nonlinear power iteration perturbs the current state
//! along a direction `d` with `|d| = dy_norm` and measures
//!
//! ```text
//! sigma = |f(t, y + d) - f(t, y)| / dy_norm
//! ```
//!
//! The difference of the right-hand sides becomes the next direction. When the problem
//! implements [`System::jacobian_vector_product`], `J d` replaces the difference.
//! Until the first step is accepted every estimation starts from the direction of `f(t, y)`,
//! later ones warm-start from the direction kept from the previous estimation.

use crate::constants::chebyshev::{POWER_ITERATION_TOLERANCE, SPECTRAL_RADIUS_MARGIN};
use crate::ode_shared::{IntegrationError, System};
use crate::stats::Stats;

use log::debug;
use nalgebra::DVector;

/// Spectral radius estimate and the state of the power iteration.
#[derive(Clone, Debug)]
pub struct SpectralRadiusEstimate {
    spectral_radius: f64,
    sigma: f64,
    eigen_vector: DVector<f64>,
    /// An estimate was computed at the current time
    pub(crate) jacobian_at_t: bool,
    pub(crate) need_recompute: bool,
    perturbed: DVector<f64>,
    difference: DVector<f64>,
}

impl SpectralRadiusEstimate {
    pub(crate) fn new() -> Self {
        SpectralRadiusEstimate {
            spectral_radius: 0.0,
            sigma: 0.0,
            eigen_vector: DVector::zeros(0),
            jacobian_at_t: false,
            need_recompute: true,
            perturbed: DVector::zeros(0),
            difference: DVector::zeros(0),
        }
    }

    /// Forgets the previous estimate and allocates the work vectors for `n` equations.
    pub(crate) fn reset(&mut self, n: usize) {
        *self = SpectralRadiusEstimate::new();
        self.eigen_vector = DVector::zeros(n);
        self.perturbed = DVector::zeros(n);
        self.difference = DVector::zeros(n);
    }

    /// Upper bound of the spectral radius, the last power iterate times a safety margin.
    pub fn spectral_radius(&self) -> f64 {
        self.spectral_radius
    }

    /// Last power iterate.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Perturbation direction of the last iteration.
    pub fn eigen_vector(&self) -> &DVector<f64> {
        &self.eigen_vector
    }

    pub fn jacobian_constant_at_current_time(&self) -> bool {
        self.jacobian_at_t
    }

    pub fn need_recompute(&self) -> bool {
        self.need_recompute
    }

    /// Runs the power iteration at `(t, y)` where `fy = f(t, y)`.
    ///
    /// `small` is the absolute floor of the convergence test. The iteration starts from the
    /// direction of `fy` as long as `stats` counts no accepted step.
    pub(crate) fn estimate(
        &mut self,
        problem: &dyn System,
        t: f64,
        y: &DVector<f64>,
        fy: &DVector<f64>,
        small: f64,
        max_iterations: usize,
        stats: &mut Stats,
    ) -> Result<f64, IntegrationError> {
        let n = y.len();
        if stats.accepted_steps == 0 {
            self.eigen_vector.copy_from(fy);
        }

        let eps = f64::EPSILON;
        let sqrt_eps = eps.sqrt();
        // A state too small to scale the perturbation counts as zero.
        let y_norm = Some(y.norm() * sqrt_eps).filter(|dy| *dy >= f64::MIN_POSITIVE);
        let ev_norm = self.eigen_vector.norm();

        let dy_norm = match y_norm {
            Some(dy_norm) if ev_norm != 0.0 => {
                self.eigen_vector *= dy_norm / ev_norm;
                dy_norm
            }
            Some(dy_norm) => {
                self.eigen_vector.copy_from(y);
                self.eigen_vector *= sqrt_eps;
                dy_norm
            }
            None if ev_norm != 0.0 => {
                self.eigen_vector *= eps / ev_norm;
                eps
            }
            None => {
                self.eigen_vector.fill(eps / (n as f64).sqrt());
                eps
            }
        };

        let mut exact = true;
        let mut sigma: f64 = 0.0;
        for iter in 1..=max_iterations {
            if exact {
                exact = problem.jacobian_vector_product(t, y, fy, &self.eigen_vector, &mut self.difference);
                if exact {
                    stats.jacobian_products += 1;
                }
            }
            if !exact {
                self.perturbed.copy_from(y);
                self.perturbed += &self.eigen_vector;
                problem.rhs(t, &self.perturbed, &mut self.difference);
                stats.num_eval += 1;
                self.difference -= fy;
            }
            stats.power_iterations += 1;

            let df_norm = self.difference.norm();
            let sigma_old = sigma;
            sigma = df_norm / dy_norm;
            self.spectral_radius = SPECTRAL_RADIUS_MARGIN * sigma;

            if iter >= 2 && (sigma - sigma_old).abs() <= sigma.max(small) * POWER_ITERATION_TOLERANCE {
                self.sigma = sigma;
                stats.spectral_radius_estimates += 1;
                debug!(
                    "spectral radius {:e} at t = {:e} after {} iterations",
                    self.spectral_radius, t, iter
                );
                return Ok(self.spectral_radius);
            }

            if df_norm != 0.0 {
                self.eigen_vector.copy_from(&self.difference);
                self.eigen_vector *= dy_norm / df_norm;
            } else {
                // Flip one component to leave the degenerate direction.
                let index = iter % n;
                self.eigen_vector[index] = -self.eigen_vector[index];
            }
        }

        Err(IntegrationError::MaxSpectralRadiusIterationsExceeded { max_iterations })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    /// y' = -diag(lambda) y
    struct Diagonal {
        lambda: Vec<f64>,
        exact_jacobian: bool,
    }

    impl System for Diagonal {
        fn number_of_equations(&self) -> usize {
            self.lambda.len()
        }

        fn rhs(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
            for i in 0..self.lambda.len() {
                dy[i] = -self.lambda[i] * y[i];
            }
        }

        fn jacobian_vector_product(
            &self,
            _t: f64,
            _y: &DVector<f64>,
            _fy: &DVector<f64>,
            v: &DVector<f64>,
            jv: &mut DVector<f64>,
        ) -> bool {
            if self.exact_jacobian {
                for i in 0..self.lambda.len() {
                    jv[i] = -self.lambda[i] * v[i];
                }
            }
            self.exact_jacobian
        }
    }

    fn estimate(problem: &Diagonal, y: Vec<f64>) -> (SpectralRadiusEstimate, Stats, Result<f64, IntegrationError>) {
        let y = DVector::from_vec(y);
        let mut fy = DVector::zeros(y.len());
        problem.rhs(0.0, &y, &mut fy);
        let mut estimate = SpectralRadiusEstimate::new();
        estimate.reset(y.len());
        let mut stats = Stats::new();
        let result = estimate.estimate(problem, 0.0, &y, &fy, 1.0, 50, &mut stats);
        (estimate, stats, result)
    }

    #[test]
    fn test_scalar_linear_problem() {
        let problem = Diagonal {
            lambda: vec![1000.0],
            exact_jacobian: false,
        };
        let (estimate, stats, result) = estimate(&problem, vec![1.0]);
        let rho = result.unwrap();
        assert_relative_eq!(estimate.sigma(), 1000.0, max_relative = 1e-6);
        assert_relative_eq!(rho, 1.2 * estimate.sigma());
        assert_eq!(stats.spectral_radius_estimates, 1);
        assert_eq!(stats.power_iterations, 2);
        assert_eq!(stats.num_eval, 2);
    }

    #[test]
    fn test_dominant_eigenvalue() {
        let problem = Diagonal {
            lambda: vec![1.0, 10.0, 100.0],
            exact_jacobian: false,
        };
        let (estimate, _, result) = estimate(&problem, vec![1.0, 1.0, 1.0]);
        assert!(result.is_ok());
        assert_relative_eq!(estimate.sigma(), 100.0, max_relative = 0.02);
    }

    #[test]
    fn test_exact_jacobian_products() {
        let problem = Diagonal {
            lambda: vec![2.0, 50.0],
            exact_jacobian: true,
        };
        let (estimate, stats, result) = estimate(&problem, vec![1.0, 1.0]);
        assert!(result.is_ok());
        assert_relative_eq!(estimate.sigma(), 50.0, max_relative = 0.02);
        assert_eq!(stats.num_eval, 0);
        assert_eq!(stats.jacobian_products, stats.power_iterations);
    }

    #[test]
    fn test_zero_state_uses_absolute_perturbation() {
        let problem = Diagonal {
            lambda: vec![4.0, 4.0],
            exact_jacobian: false,
        };
        let (estimate, _, result) = estimate(&problem, vec![0.0, 0.0]);
        assert!(result.is_ok());
        assert_relative_eq!(estimate.sigma(), 4.0, max_relative = 1e-6);
        assert_relative_eq!(estimate.eigen_vector().norm(), f64::EPSILON, max_relative = 1e-12);
    }

    #[test]
    fn test_vanishing_jacobian() {
        let problem = Diagonal {
            lambda: vec![0.0, 0.0],
            exact_jacobian: false,
        };
        let (estimate, _, result) = estimate(&problem, vec![1.0, 2.0]);
        assert_eq!(result.unwrap(), 0.0);
        assert_eq!(estimate.spectral_radius(), 0.0);
    }

    #[test]
    fn test_seed_from_derivative_until_first_accepted_step() {
        let problem = Diagonal {
            lambda: vec![1.0, 100.0],
            exact_jacobian: true,
        };
        let (estimate, _, result) = estimate(&problem, vec![1.0, 1.0]);
        assert!(result.is_ok());

        let y = DVector::from_vec(vec![1.0, 1.0]);
        let seed = DVector::from_vec(vec![-1.0, 0.0]);

        // Before the first accepted step the direction restarts from the derivative.
        let mut cold = estimate.clone();
        let mut stats = Stats::new();
        cold.estimate(&problem, 0.0, &y, &seed, 1.0, 50, &mut stats).unwrap();
        assert_relative_eq!(cold.sigma(), 1.0, max_relative = 1e-12);

        // Afterwards the previous direction is kept.
        let mut warm = estimate;
        stats.accepted_steps = 1;
        warm.estimate(&problem, 0.0, &y, &seed, 1.0, 50, &mut stats).unwrap();
        assert_relative_eq!(warm.sigma(), 100.0, max_relative = 0.01);
    }

    /// Alternates between two gains so that the power iteration never settles.
    struct Flickering {
        calls: Cell<usize>,
    }

    impl System for Flickering {
        fn number_of_equations(&self) -> usize {
            1
        }

        fn rhs(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
            dy[0] = -y[0];
        }

        fn jacobian_vector_product(
            &self,
            _t: f64,
            _y: &DVector<f64>,
            _fy: &DVector<f64>,
            v: &DVector<f64>,
            jv: &mut DVector<f64>,
        ) -> bool {
            let calls = self.calls.get();
            self.calls.set(calls + 1);
            let gain = if calls % 2 == 0 { 1.0 } else { 10.0 };
            jv[0] = -gain * v[0];
            true
        }
    }

    #[test]
    fn test_iteration_limit() {
        let problem = Flickering { calls: Cell::new(0) };
        let y = DVector::from_vec(vec![1.0]);
        let fy = DVector::from_vec(vec![-1.0]);
        let mut estimate = SpectralRadiusEstimate::new();
        estimate.reset(1);
        let mut stats = Stats::new();
        let result = estimate.estimate(&problem, 0.0, &y, &fy, 1.0, 5, &mut stats);
        assert!(matches!(
            result,
            Err(IntegrationError::MaxSpectralRadiusIterationsExceeded { max_iterations: 5 })
        ));
        assert_eq!(stats.power_iterations, 5);
        assert_eq!(stats.spectral_radius_estimates, 0);
    }
}
