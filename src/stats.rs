//! Statistics of the integration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Contains some statistics of the integration.
///
/// The counters only grow during an integration run and are reset when a new problem is
/// assigned to the integrator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of right-hand side evaluations
    pub num_eval: u32,
    pub accepted_steps: u32,
    pub rejected_steps: u32,
    /// Largest accepted step size, zero before the first accepted step
    pub max_stepsize: f64,
    /// Smallest accepted step size, infinite before the first accepted step
    pub min_stepsize: f64,
    /// Number of converged spectral radius estimations (Runge-Kutta-Chebyshev only)
    pub spectral_radius_estimates: u32,
    /// Total number of power iterations (Runge-Kutta-Chebyshev only)
    pub power_iterations: u32,
    /// Number of Jacobian-vector products supplied by the problem
    pub jacobian_products: u32,
    /// Largest number of stages used in an accepted step (Runge-Kutta-Chebyshev only)
    pub max_stage: usize,
}

impl Default for Stats {
    fn default() -> Self {
        Stats::new()
    }
}

impl Stats {
    pub(crate) fn new() -> Stats {
        Stats {
            num_eval: 0,
            accepted_steps: 0,
            rejected_steps: 0,
            max_stepsize: 0.0,
            min_stepsize: f64::INFINITY,
            spectral_radius_estimates: 0,
            power_iterations: 0,
            jacobian_products: 0,
            max_stage: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Stats::new();
    }

    pub(crate) fn record_accepted_step(&mut self, stepsize: f64) {
        self.accepted_steps += 1;
        self.max_stepsize = self.max_stepsize.max(stepsize);
        self.min_stepsize = self.min_stepsize.min(stepsize);
    }

    pub(crate) fn record_stage(&mut self, stages: usize) {
        self.max_stage = self.max_stage.max(stages);
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Number of function evaluations: {}", self.num_eval)?;
        writeln!(f, "Number of accepted steps: {}", self.accepted_steps)?;
        write!(f, "Number of rejected steps: {}", self.rejected_steps)?;
        if self.accepted_steps > 0 {
            write!(f, "\nMaximum step size: {:.8e}", self.max_stepsize)?;
            write!(f, "\nMinimum step size: {:.8e}", self.min_stepsize)?;
        }
        if self.spectral_radius_estimates > 0 {
            write!(
                f,
                "\nNumber of spectral radius estimates: {} ({} power iterations)",
                self.spectral_radius_estimates, self.power_iterations
            )?;
        }
        if self.jacobian_products > 0 {
            write!(f, "\nNumber of Jacobian-vector products: {}", self.jacobian_products)?;
        }
        if self.max_stage > 0 {
            write!(f, "\nMaximum number of stages: {}", self.max_stage)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_size_extrema() {
        let mut stats = Stats::new();
        stats.record_accepted_step(0.1);
        stats.record_accepted_step(0.4);
        stats.record_accepted_step(0.05);
        assert_eq!(stats.accepted_steps, 3);
        assert_eq!(stats.max_stepsize, 0.4);
        assert_eq!(stats.min_stepsize, 0.05);

        stats.reset();
        assert_eq!(stats, Stats::new());
    }

    #[test]
    fn test_display_skips_unused_counters() {
        let mut stats = Stats::new();
        stats.num_eval = 12;
        let report = format!("{}", stats);
        assert!(report.contains("Number of function evaluations: 12"));
        assert!(!report.contains("stages"));

        stats.record_stage(7);
        let report = format!("{}", stats);
        assert!(report.contains("Maximum number of stages: 7"));
    }
}
