//! Step size controlled integration loop shared by the explicit methods.
//!
//! An [`Integrator`] owns the integration state and drives every step through the same
//! sequence: start the step, compute the stages, estimate the local error, then accept or
//! reject the step and adapt the step size. What happens in each phase is delegated to a
//! [`StepMethod`], so the loop never depends on the concrete method.

use crate::config::{check_parameter, check_tolerance, IntegratorConfig};
use crate::constants::step_control::{ACCEPTANCE_THRESHOLD, STABILIZATION_BETA_RANGE};
use crate::history::{HistoryRecord, HistorySink, NoHistory};
use crate::ode_shared::{inverse_tolerance_weights, IntegrationError, System};
use crate::stats::Stats;

use log::{debug, trace};
use nalgebra::DVector;
use std::fmt;
use std::mem;

/// State of an integration run, mutated by the integrator and its [`StepMethod`].
#[derive(Clone, Debug)]
pub struct StepCore {
    pub(crate) config: IntegratorConfig,
    pub(crate) t: f64,
    pub(crate) y: DVector<f64>,
    pub(crate) t_old: f64,
    /// Size of the last accepted step
    pub(crate) h_old: f64,
    pub(crate) h: f64,
    pub(crate) h_min: f64,
    pub(crate) t_end: f64,
    pub(crate) t_new: f64,
    pub(crate) y_new: DVector<f64>,
    /// Can the current step reach `t_end`?
    pub(crate) last: bool,
    pub(crate) weights: DVector<f64>,
    pub(crate) local_error: DVector<f64>,
    pub(crate) new_local_error: DVector<f64>,
    pub(crate) err_new: f64,
    /// Error norm of the last accepted step, `None` before the first one
    pub(crate) err_old: Option<f64>,
    pub(crate) stats: Stats,
}

impl StepCore {
    pub(crate) fn new(config: IntegratorConfig) -> Self {
        StepCore {
            config,
            t: 0.0,
            y: DVector::zeros(0),
            t_old: 0.0,
            h_old: 0.0,
            h: 0.0,
            h_min: 10.0 * f64::EPSILON,
            t_end: 0.0,
            t_new: 0.0,
            y_new: DVector::zeros(0),
            last: false,
            weights: DVector::zeros(0),
            local_error: DVector::zeros(0),
            new_local_error: DVector::zeros(0),
            err_new: 0.0,
            err_old: None,
            stats: Stats::new(),
        }
    }

    fn reset(&mut self, t0: f64, y0: DVector<f64>) {
        let n = y0.len();
        self.t = t0;
        self.t_old = t0;
        self.t_new = t0;
        self.t_end = t0;
        self.y = y0;
        self.y_new = DVector::zeros(n);
        self.weights = DVector::zeros(n);
        self.local_error = DVector::zeros(n);
        self.new_local_error = DVector::zeros(n);
        self.h = 0.0;
        self.h_old = 0.0;
        self.last = false;
        self.err_new = 0.0;
        self.err_old = None;
        self.stats.reset();
        self.update_weights();
    }

    /// Recomputes the weights from the current state.
    pub(crate) fn update_weights(&mut self) {
        inverse_tolerance_weights(
            &mut self.weights,
            &self.y,
            self.config.rel_tol,
            self.config.abs_tol,
        );
    }

    fn check_stepsize(&self) -> Result<(), IntegrationError> {
        // Also catches NaN step sizes.
        if self.h >= self.h_min {
            Ok(())
        } else {
            Err(IntegrationError::StepTooSmall {
                t: self.t,
                h: self.h,
                h_min: self.h_min,
            })
        }
    }

    fn complete_step(&mut self) {
        self.t_old = self.t;
        self.h_old = self.h;
        self.t = if self.last { self.t_end } else { self.t_new };
        self.stats.record_accepted_step(self.h);
    }

    fn prepare_next_step(&mut self) {
        mem::swap(&mut self.y, &mut self.y_new);
        mem::swap(&mut self.local_error, &mut self.new_local_error);
        self.err_old = Some(self.err_new);
        self.update_weights();
    }
}

/// Method specific parts of an integration step.
///
/// The hooks are called by [`Integrator`] in the order in which they are declared.
pub trait StepMethod {
    /// Human readable name of the method.
    fn name(&self) -> &'static str;

    /// Allocates the work vectors for `core.y` and evaluates what the first step needs.
    fn assign(&mut self, problem: &dyn System, core: &mut StepCore);

    /// One-time setup at the beginning of every call to [`Integrator::integrate_to`].
    fn initialize_integration(
        &mut self,
        _problem: &dyn System,
        _core: &mut StepCore,
    ) -> Result<(), IntegrationError> {
        Ok(())
    }

    /// Sets `core.h_min` and the first step size `core.h`.
    fn estimate_initial_stepsize(&mut self, problem: &dyn System, core: &mut StepCore);

    /// Adjusts the step size before the stages are computed and decides `core.last`.
    fn start_step(&mut self, problem: &dyn System, core: &mut StepCore) -> Result<(), IntegrationError>;

    /// Computes `core.y_new` and `core.t_new`.
    fn compute_stage(&mut self, problem: &dyn System, core: &mut StepCore);

    /// Computes `core.new_local_error` and its weighted norm `core.err_new`.
    fn estimate_error(&mut self, core: &mut StepCore);

    /// Adapts `core.h` after an accepted step. `core.t` is already the new time and
    /// `core.h_old` the accepted step size.
    fn stepsize_after_accept(&mut self, core: &mut StepCore);

    /// Shrinks `core.h` after a rejected step.
    fn stepsize_after_reject(&mut self, core: &mut StepCore);

    /// Called once `core.y` holds the accepted state.
    fn prepare_next_step(&mut self, problem: &dyn System, core: &mut StepCore);

    /// Number of stages of the last step, if the method uses a variable number.
    fn stages(&self) -> Option<usize> {
        None
    }

    /// Writes method specific parameters.
    fn describe(&self, _f: &mut fmt::Formatter) -> fmt::Result {
        Ok(())
    }
}

/// Adaptive integrator driving a [`StepMethod`].
///
/// The problem is borrowed and must outlive the integrator.
pub struct Integrator<'a, M, H = NoHistory>
where
    M: StepMethod,
    H: HistorySink,
{
    problem: Option<&'a dyn System>,
    core: StepCore,
    method: M,
    save_history: bool,
    history: H,
}

impl<'a, M: StepMethod> Integrator<'a, M, NoHistory> {
    /// Creates an integrator with the default parameters.
    pub fn new(method: M) -> Self {
        Integrator::with_history_sink(method, NoHistory)
    }

    /// Creates an integrator with the given parameters.
    pub fn with_config(method: M, config: IntegratorConfig) -> Result<Self, IntegrationError> {
        config.validate()?;
        let mut integrator = Integrator::new(method);
        integrator.core.config = config;
        Ok(integrator)
    }
}

impl<'a, M: StepMethod, H: HistorySink> Integrator<'a, M, H> {
    /// Creates an integrator passing the step size history of accepted steps to `history`.
    ///
    /// Records are only produced once saving is enabled with [`Integrator::set_save_history`].
    pub fn with_history_sink(method: M, history: H) -> Self {
        Integrator {
            problem: None,
            core: StepCore::new(IntegratorConfig::default()),
            method,
            save_history: false,
            history,
        }
    }

    /// Binds the ODE problem and its initial condition and resets the statistics.
    pub fn assign(
        &mut self,
        problem: &'a dyn System,
        initial_time: f64,
        initial_state: DVector<f64>,
    ) -> Result<(), IntegrationError> {
        let n = problem.number_of_equations();
        if n == 0 {
            return Err(IntegrationError::EmptyState);
        }
        if initial_state.len() != n {
            return Err(IntegrationError::DimensionMismatch {
                expected: n,
                found: initial_state.len(),
            });
        }

        self.core.reset(initial_time, initial_state);
        self.method.assign(problem, &mut self.core);
        self.problem = Some(problem);
        Ok(())
    }

    /// Integrates the problem up to `t_out`.
    pub fn integrate_to(&mut self, t_out: f64) -> Result<(), IntegrationError> {
        let problem = self.problem.ok_or(IntegrationError::ProblemNotAssigned)?;

        if !(t_out - self.core.t > f64::EPSILON) {
            return Err(IntegrationError::InvalidTimeRange {
                t_out,
                t: self.core.t,
            });
        }
        self.core.t_end = t_out;

        self.method.initialize_integration(problem, &mut self.core)?;
        self.method.estimate_initial_stepsize(problem, &mut self.core);

        if self.core.t_end - self.core.t < self.core.h_min {
            return Err(IntegrationError::StepTooSmall {
                t: self.core.t,
                h: self.core.t_end - self.core.t,
                h_min: self.core.h_min,
            });
        }

        while self.core.t != self.core.t_end {
            self.perform_integration_step(problem)?;
            if self.save_history {
                self.update_history()?;
            }
        }
        Ok(())
    }

    /// Integrates the problem over the interval `dt` from the current time.
    pub fn integrate_forward(&mut self, dt: f64) -> Result<(), IntegrationError> {
        self.integrate_to(self.core.t + dt)
    }

    fn perform_integration_step(&mut self, problem: &dyn System) -> Result<(), IntegrationError> {
        let core = &mut self.core;
        loop {
            self.method.start_step(problem, core)?;
            if !core.last {
                core.check_stepsize()?;
            }
            self.method.compute_stage(problem, core);
            self.method.estimate_error(core);

            if core.err_new <= ACCEPTANCE_THRESHOLD {
                core.complete_step();
                self.method.stepsize_after_accept(core);
                core.prepare_next_step();
                self.method.prepare_next_step(problem, core);
                trace!(
                    "accepted step to t = {:e} with h = {:e}, error norm {:e}",
                    core.t,
                    core.h_old,
                    core.err_new
                );
                return Ok(());
            }

            core.stats.rejected_steps += 1;
            debug!(
                "rejected step at t = {:e} with h = {:e}, error norm {:e}",
                core.t, core.h, core.err_new
            );
            self.method.stepsize_after_reject(core);
            core.check_stepsize()?;
        }
    }

    fn update_history(&mut self) -> Result<(), IntegrationError> {
        let record = HistoryRecord {
            time: self.core.t,
            stepsize: self.core.h_old,
            stages: self.method.stages(),
        };
        self.history.record(&record)?;
        Ok(())
    }

    pub fn set_relative_tolerance(&mut self, rel_tol: f64) -> Result<(), IntegrationError> {
        check_tolerance(rel_tol)?;
        self.core.config.rel_tol = rel_tol;
        self.core.update_weights();
        Ok(())
    }

    pub fn relative_tolerance(&self) -> f64 {
        self.core.config.rel_tol
    }

    pub fn set_absolute_tolerance(&mut self, abs_tol: f64) -> Result<(), IntegrationError> {
        check_tolerance(abs_tol)?;
        self.core.config.abs_tol = abs_tol;
        self.core.update_weights();
        Ok(())
    }

    pub fn absolute_tolerance(&self) -> f64 {
        self.core.config.abs_tol
    }

    /// Sets the β coefficient of the PI controller, which must lie in [0, 0.2].
    pub fn set_stabilization_beta(&mut self, beta: f64) -> Result<(), IntegrationError> {
        let (min, max) = STABILIZATION_BETA_RANGE;
        check_parameter("stabilization_beta", beta, min, max)?;
        self.core.config.stabilization_beta = beta;
        Ok(())
    }

    pub fn set_safety_factor(&mut self, safety: f64) -> Result<(), IntegrationError> {
        check_parameter("safety", safety, f64::EPSILON, 1.0)?;
        self.core.config.safety = safety;
        Ok(())
    }

    pub fn set_max_spectral_radius_iterations(&mut self, max_iterations: usize) -> Result<(), IntegrationError> {
        check_parameter(
            "max_spectral_radius_iterations",
            max_iterations as f64,
            2.0,
            f64::INFINITY,
        )?;
        self.core.config.max_spectral_radius_iterations = max_iterations;
        Ok(())
    }

    pub fn config(&self) -> &IntegratorConfig {
        &self.core.config
    }

    pub fn set_save_history(&mut self, save: bool) {
        self.save_history = save;
    }

    pub fn save_history(&self) -> bool {
        self.save_history
    }

    pub fn history_sink(&self) -> &H {
        &self.history
    }

    pub fn history_sink_mut(&mut self) -> &mut H {
        &mut self.history
    }

    /// Consumes the integrator and returns the history sink.
    pub fn into_history_sink(self) -> H {
        self.history
    }

    pub fn current_time(&self) -> f64 {
        self.core.t
    }

    pub fn current_state(&self) -> &DVector<f64> {
        &self.core.y
    }

    /// Time at the start of the last accepted step.
    pub fn previous_time(&self) -> f64 {
        self.core.t_old
    }

    /// Step size proposed for the next step.
    pub fn stepsize(&self) -> f64 {
        self.core.h
    }

    pub fn min_stepsize(&self) -> f64 {
        self.core.h_min
    }

    /// Weighted error norm of the last attempted step.
    pub fn local_error_norm(&self) -> f64 {
        self.core.err_new
    }

    /// Local error estimate of the last accepted step.
    pub fn local_error(&self) -> &DVector<f64> {
        &self.core.local_error
    }

    pub fn weights(&self) -> &DVector<f64> {
        &self.core.weights
    }

    pub fn stats(&self) -> &Stats {
        &self.core.stats
    }

    pub fn method(&self) -> &M {
        &self.method
    }
}

impl<'a, M: StepMethod, H: HistorySink> fmt::Display for Integrator<'a, M, H> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let config = &self.core.config;
        writeln!(f, "Solver name: {}", self.method.name())?;
        writeln!(f, "Relative tolerance: {:e}", config.rel_tol)?;
        writeln!(f, "Absolute tolerance: {:e}", config.abs_tol)?;
        writeln!(f, "Safety factor: {}", config.safety)?;
        writeln!(f, "Decrease factor: {}", config.decrease_factor)?;
        write!(f, "Increase factor: {}", config.increase_factor)?;
        self.method.describe(f)
    }
}
