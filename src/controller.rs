//! Adaptive step size control.

use crate::config::IntegratorConfig;

/// PI controller used by the embedded Runge-Kutta pairs
#[derive(Clone, Copy, Debug)]
pub struct Controller {
    alpha: f64,
    beta: f64,
    exponent: f64,
    fac_min: f64,
    fac_max: f64,
    safety_factor: f64,
}

impl Controller {
    /// Creates a controller responsible for adaptive step size control.
    ///
    /// # Arguments
    ///
    /// * `error_order` - Order `p` of the embedded error estimate
    /// * `beta`    - &#946; coefficient of the PI controller, &#945; = 1/(p+1) - 0.75&#946;
    /// * `fac_min` - Minimum factor between two successive steps
    /// * `fac_max` - Maximum factor between two successive steps
    /// * `safety_factor`   - Safety factor of the PI controller
    ///
    pub fn new(error_order: usize, beta: f64, fac_min: f64, fac_max: f64, safety_factor: f64) -> Controller {
        let exponent = 1.0 / (error_order as f64 + 1.0);
        Controller {
            alpha: exponent - 0.75 * beta,
            beta,
            exponent,
            fac_min,
            fac_max,
            safety_factor,
        }
    }

    pub fn from_config(error_order: usize, config: &IntegratorConfig) -> Controller {
        Controller::new(
            error_order,
            config.stabilization_beta,
            config.decrease_factor,
            config.increase_factor,
            config.safety,
        )
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Factor applied to the step size after an accepted step.
    ///
    /// `err_old` is the error norm of the previous accepted step, `None` for the first one.
    pub fn factor_after_accept(&self, err: f64, err_old: Option<f64>) -> f64 {
        let fac = match err_old {
            Some(err_old) => err_old.powf(self.beta) / err.powf(self.alpha),
            None => (1.0 / err).powf(self.exponent),
        };
        self.limit(fac)
    }

    /// Factor applied to the step size after a rejected step.
    pub fn factor_after_reject(&self, err: f64) -> f64 {
        self.limit((1.0 / err).powf(self.exponent))
    }

    // The safety factor is applied before clamping. NaN factors end up at fac_min.
    fn limit(&self, fac: f64) -> f64 {
        (self.safety_factor * fac).max(self.fac_min).min(self.fac_max)
    }
}
