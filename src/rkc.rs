//! Runge-Kutta-Chebyshev method for mildly stiff problems.
//!
//! The method is explicit with a variable number of stages `s`. Its stability interval
//! along the negative real axis grows like `1.54 s^2`, so the number of stages is chosen
//! from an estimate of the spectral radius of the Jacobian such that the step stays stable.
//! The stages follow the three-term recurrence of damped Chebyshev polynomials and the
//! local error is estimated from the derivatives at both ends of the step.

use crate::constants::chebyshev::{DAMPING, END_APPROACH_FACTOR, MIN_STAGES, STABILITY_BOUNDARY_SLOPE};
use crate::integrator::{Integrator, StepCore, StepMethod};
use crate::ode_shared::{inverse_tolerance_weights, weighted_rms_norm, IntegrationError, System};
use crate::spectral_radius::SpectralRadiusEstimate;

use log::debug;
use nalgebra::DVector;
use std::fmt;
use std::mem;

/// Second order Runge-Kutta-Chebyshev method.
#[derive(Clone, Debug)]
pub struct RungeKuttaChebyshev {
    spectral: SpectralRadiusEstimate,
    stages: usize,
    max_stage: usize,
    /// Inverse of the integration interval, floor of the power iteration convergence test
    small: f64,
    steps_since_estimate: usize,
    /// Derivative at the current state
    f_current: DVector<f64>,
    /// Derivative at the new state
    f_new: DVector<f64>,
    work: DVector<f64>,
    yjm1: DVector<f64>,
    yjm2: DVector<f64>,
}

impl Default for RungeKuttaChebyshev {
    fn default() -> Self {
        RungeKuttaChebyshev::new()
    }
}

impl RungeKuttaChebyshev {
    pub fn new() -> Self {
        RungeKuttaChebyshev {
            spectral: SpectralRadiusEstimate::new(),
            stages: 0,
            max_stage: MIN_STAGES,
            small: 0.0,
            steps_since_estimate: 0,
            f_current: DVector::zeros(0),
            f_new: DVector::zeros(0),
            work: DVector::zeros(0),
            yjm1: DVector::zeros(0),
            yjm2: DVector::zeros(0),
        }
    }

    pub fn spectral_radius_estimate(&self) -> &SpectralRadiusEstimate {
        &self.spectral
    }

    /// Number of stages of the last step.
    pub fn stage_count(&self) -> usize {
        self.stages
    }

    /// Largest admissible number of stages for the current relative tolerance.
    pub fn max_stage(&self) -> usize {
        self.max_stage
    }

    fn estimate_spectral_radius(&mut self, problem: &dyn System, core: &mut StepCore) -> Result<(), IntegrationError> {
        self.spectral.estimate(
            problem,
            core.t,
            &core.y,
            &self.f_current,
            self.small,
            core.config.max_spectral_radius_iterations,
            &mut core.stats,
        )?;
        self.spectral.jacobian_at_t = true;
        self.spectral.need_recompute = false;
        Ok(())
    }
}

/// Largest number of stages worth using with the relative tolerance `rel_tol`.
///
/// More stages than about `sqrt(rel_tol / (10 eps))` let round-off errors dominate.
pub fn max_stage_for_tolerance(rel_tol: f64) -> usize {
    ((rel_tol / (10.0 * f64::EPSILON)).sqrt() as usize).max(MIN_STAGES)
}

/// Number of stages keeping a step of size `stepsize` stable.
///
/// Returns the number of stages and, if `max_stage` is exceeded, the reduced step size
/// that `max_stage` stages can handle.
pub fn select_stages(stepsize: f64, spectral_radius: f64, max_stage: usize) -> (usize, Option<f64>) {
    let stages = 1 + (STABILITY_BOUNDARY_SLOPE * stepsize * spectral_radius + 1.0).sqrt() as usize;
    if stages > max_stage {
        let s = max_stage as f64;
        (max_stage, Some((s * s - 1.0) / (STABILITY_BOUNDARY_SLOPE * spectral_radius)))
    } else {
        (stages, None)
    }
}

impl StepMethod for RungeKuttaChebyshev {
    fn name(&self) -> &'static str {
        "Runge-Kutta-Chebyshev"
    }

    fn assign(&mut self, problem: &dyn System, core: &mut StepCore) {
        let n = core.y.len();
        self.spectral.reset(n);
        self.stages = 0;
        self.steps_since_estimate = 0;
        self.f_current = DVector::zeros(n);
        self.f_new = DVector::zeros(n);
        self.work = DVector::zeros(n);
        self.yjm1 = DVector::zeros(n);
        self.yjm2 = DVector::zeros(n);
        problem.rhs(core.t, &core.y, &mut self.f_current);
        core.stats.num_eval += 1;
    }

    fn initialize_integration(&mut self, problem: &dyn System, core: &mut StepCore) -> Result<(), IntegrationError> {
        self.max_stage = max_stage_for_tolerance(core.config.rel_tol);
        self.small = 1.0 / (core.t_end - core.t);
        if self.spectral.need_recompute {
            self.estimate_spectral_radius(problem, core)?;
        }
        Ok(())
    }

    fn estimate_initial_stepsize(&mut self, problem: &dyn System, core: &mut StepCore) {
        let dt = core.t_end - core.t;
        core.h_min = 10.0 * f64::EPSILON * dt;

        let mut h = dt;
        let spectral_radius = self.spectral.spectral_radius();
        if spectral_radius * h > 1.0 {
            h = 1.0 / spectral_radius;
        }
        h = h.max(core.h_min);

        // Size of the second derivative from a forward difference along f.
        self.work.copy_from(&core.y);
        self.work.axpy(h, &self.f_current, 1.0);
        problem.rhs(core.t + h, &self.work, &mut self.f_new);
        core.stats.num_eval += 1;
        self.f_new -= &self.f_current;
        let estimate = h * weighted_rms_norm(&self.f_new, &core.weights);

        // The local error of the first step is about (h^2 / 2) |y''|.
        core.h = if 0.1 * h < dt * estimate.sqrt() {
            (0.1 * h / estimate.sqrt()).max(core.h_min)
        } else {
            dt
        };
    }

    fn start_step(&mut self, problem: &dyn System, core: &mut StepCore) -> Result<(), IntegrationError> {
        if self.spectral.need_recompute {
            self.estimate_spectral_radius(problem, core)?;
        }

        core.last = false;
        let dt = core.t_end - core.t;
        if END_APPROACH_FACTOR * core.h > dt {
            core.h = dt;
            core.last = true;
        }

        let (stages, capped) = select_stages(core.h, self.spectral.spectral_radius(), self.max_stage);
        self.stages = stages;
        if let Some(h) = capped {
            debug!(
                "step size {:e} needs more than {} stages, reduced to {:e}",
                core.h, self.max_stage, h
            );
            core.h = h;
            core.last = false;
        }
        Ok(())
    }

    fn compute_stage(&mut self, problem: &dyn System, core: &mut StepCore) {
        let h = core.h;
        let stages = self.stages;
        let s = stages as f64;

        let w0 = 1.0 + DAMPING / (s * s);
        let temp1 = w0 * w0 - 1.0;
        let temp2 = temp1.sqrt();
        let arg = s * (w0 + temp2).ln();
        let w1 = arg.sinh() * temp1 / (arg.cosh() * s * temp2 - w0 * arg.sinh());

        let mut bjm1 = 1.0 / (4.0 * w0 * w0);
        let mut bjm2 = bjm1;

        // First stage
        self.yjm2.copy_from(&core.y);
        let mus = w1 * bjm1;
        self.yjm1.copy_from(&core.y);
        self.yjm1.axpy(h * mus, &self.f_current, 1.0);

        let mut thjm2 = 0.0;
        let mut thjm1 = mus;
        let mut zjm1 = w0;
        let mut zjm2 = 1.0;
        let mut dzjm1 = 1.0;
        let mut dzjm2 = 0.0;
        let mut d2zjm1 = 0.0;
        let mut d2zjm2 = 0.0;

        for j in 2..=stages {
            let zj = 2.0 * w0 * zjm1 - zjm2;
            let dzj = 2.0 * w0 * dzjm1 - dzjm2 + 2.0 * zjm1;
            let d2zj = 2.0 * w0 * d2zjm1 - d2zjm2 + 4.0 * dzjm1;
            let bj = d2zj / (dzj * dzj);
            let ajm1 = 1.0 - zjm1 * bjm1;
            let mu = 2.0 * w0 * bj / bjm1;
            let nu = -bj / bjm2;
            let mus = mu * w1 / w0;

            problem.rhs(core.t + h * thjm1, &self.yjm1, &mut core.y_new);
            core.stats.num_eval += 1;
            core.y_new *= h * mus;
            core.y_new.axpy(mu, &self.yjm1, 1.0);
            core.y_new.axpy(nu, &self.yjm2, 1.0);
            core.y_new.axpy(1.0 - mu - nu, &core.y, 1.0);
            core.y_new.axpy(-h * mus * ajm1, &self.f_current, 1.0);
            let thj = mu * thjm1 + nu * thjm2 + mus * (1.0 - ajm1);

            if j < stages {
                mem::swap(&mut self.yjm2, &mut self.yjm1);
                self.yjm1.copy_from(&core.y_new);
                thjm2 = thjm1;
                thjm1 = thj;
                bjm2 = bjm1;
                bjm1 = bj;
                zjm2 = zjm1;
                zjm1 = zj;
                dzjm2 = dzjm1;
                dzjm1 = dzj;
                d2zjm2 = d2zjm1;
                d2zjm1 = d2zj;
            }
        }

        core.t_new = core.t + h;
        problem.rhs(core.t_new, &core.y_new, &mut self.f_new);
        core.stats.num_eval += 1;
    }

    fn estimate_error(&mut self, core: &mut StepCore) {
        let h = core.h;
        for (w, (y, y_new)) in self.work.iter_mut().zip(core.y.iter().zip(core.y_new.iter())) {
            *w = y.abs().max(y_new.abs());
        }
        inverse_tolerance_weights(&mut core.weights, &self.work, core.config.rel_tol, core.config.abs_tol);

        core.new_local_error.copy_from(&core.y);
        core.new_local_error -= &core.y_new;
        core.new_local_error *= 0.8;
        core.new_local_error.axpy(0.4 * h, &self.f_current, 1.0);
        core.new_local_error.axpy(-0.4 * h, &self.f_new, 1.0);
        core.err_new = weighted_rms_norm(&core.new_local_error, &core.weights);
    }

    fn stepsize_after_accept(&mut self, core: &mut StepCore) {
        let err = core.err_new;
        let mut factor = core.config.increase_factor;
        match core.err_old {
            None => {
                let temp = err.powf(1.0 / 3.0);
                if 0.8 < factor * temp {
                    factor = 0.8 / temp;
                }
            }
            Some(err_old) => {
                let temp1 = 0.8 * core.h * err_old.powf(1.0 / 3.0);
                let temp2 = core.h_old * err.powf(2.0 / 3.0);
                if temp1 < factor * temp2 {
                    factor = temp1 / temp2;
                }
            }
        }
        core.h = (core.h * factor.max(core.config.decrease_factor)).max(core.h_min);
    }

    fn stepsize_after_reject(&mut self, core: &mut StepCore) {
        core.h = core.config.safety * core.h / core.err_new.powf(1.0 / 3.0);
        self.spectral.need_recompute = !self.spectral.jacobian_at_t;
    }

    fn prepare_next_step(&mut self, _problem: &dyn System, core: &mut StepCore) {
        self.spectral.jacobian_at_t = false;
        self.spectral.need_recompute = false;
        self.steps_since_estimate = (self.steps_since_estimate + 1) % core.config.spectral_radius_interval;
        if self.steps_since_estimate == 0 {
            self.spectral.need_recompute = true;
        }
        mem::swap(&mut self.f_current, &mut self.f_new);
        core.stats.record_stage(self.stages);
    }

    fn stages(&self) -> Option<usize> {
        Some(self.stages)
    }

    fn describe(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "\nMaximum number of stages: {}\nSpectral radius: {:e}",
            self.max_stage,
            self.spectral.spectral_radius()
        )
    }
}

impl<'a> Integrator<'a, RungeKuttaChebyshev> {
    /// Integrator using the Runge-Kutta-Chebyshev method.
    pub fn rkc() -> Self {
        Integrator::new(RungeKuttaChebyshev::new())
    }
}
