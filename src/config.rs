//! Integrator parameters.

use crate::constants::{chebyshev, step_control, tolerance};
use crate::ode_shared::IntegrationError;
use serde::{Deserialize, Serialize};

/// Parameters shared by all integrators of the crate.
///
/// The defaults match the values used by [`crate::Integrator`] when no configuration is given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    /// Relative tolerance used in the computation of the adaptive step size
    pub rel_tol: f64,
    /// Absolute tolerance used in the computation of the adaptive step size
    pub abs_tol: f64,
    /// Safety factor of the step size control
    pub safety: f64,
    /// β coefficient of the PI controller
    pub stabilization_beta: f64,
    /// Minimum factor between two successive steps
    pub decrease_factor: f64,
    /// Maximum factor between two successive steps
    pub increase_factor: f64,
    /// Maximum number of power iterations when estimating the spectral radius
    pub max_spectral_radius_iterations: usize,
    /// The spectral radius is estimated again every this many accepted steps
    pub spectral_radius_interval: usize,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        IntegratorConfig {
            rel_tol: tolerance::DEFAULT_RELATIVE,
            abs_tol: tolerance::DEFAULT_ABSOLUTE,
            safety: step_control::SAFETY,
            stabilization_beta: step_control::STABILIZATION_BETA,
            decrease_factor: step_control::DECREASE_FACTOR,
            increase_factor: step_control::INCREASE_FACTOR,
            max_spectral_radius_iterations: chebyshev::MAX_SPECTRAL_RADIUS_ITERATIONS,
            spectral_radius_interval: chebyshev::SPECTRAL_RADIUS_INTERVAL,
        }
    }
}

impl IntegratorConfig {
    /// Creates a configuration with the given tolerances and default values elsewhere.
    pub fn with_tolerances(rel_tol: f64, abs_tol: f64) -> Result<Self, IntegrationError> {
        let config = IntegratorConfig {
            rel_tol,
            abs_tol,
            ..IntegratorConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that every parameter lies in its admissible range.
    pub fn validate(&self) -> Result<(), IntegrationError> {
        check_tolerance(self.rel_tol)?;
        check_tolerance(self.abs_tol)?;
        let (beta_min, beta_max) = step_control::STABILIZATION_BETA_RANGE;
        check_parameter("stabilization_beta", self.stabilization_beta, beta_min, beta_max)?;
        check_parameter("safety", self.safety, f64::EPSILON, 1.0)?;
        check_parameter("decrease_factor", self.decrease_factor, f64::EPSILON, 1.0)?;
        check_parameter(
            "increase_factor",
            self.increase_factor,
            1.0,
            f64::INFINITY,
        )?;
        check_parameter(
            "max_spectral_radius_iterations",
            self.max_spectral_radius_iterations as f64,
            2.0,
            f64::INFINITY,
        )?;
        check_parameter(
            "spectral_radius_interval",
            self.spectral_radius_interval as f64,
            1.0,
            f64::INFINITY,
        )?;
        Ok(())
    }
}

pub(crate) fn check_tolerance(value: f64) -> Result<(), IntegrationError> {
    if (tolerance::MIN..=tolerance::MAX).contains(&value) {
        Ok(())
    } else {
        Err(IntegrationError::ToleranceOutOfRange {
            value,
            min: tolerance::MIN,
            max: tolerance::MAX,
        })
    }
}

pub(crate) fn check_parameter(
    name: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), IntegrationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(IntegrationError::ParameterOutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}
