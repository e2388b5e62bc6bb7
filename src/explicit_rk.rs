//! Explicit embedded Runge-Kutta methods with adaptive step size control.

use crate::butcher_tableau::ButcherTableau;
use crate::controller::Controller;
use crate::integrator::{Integrator, StepCore, StepMethod};
use crate::ode_shared::{weighted_rms_norm, IntegrationError, System};

use nalgebra::DVector;
use std::fmt;

/// Embedded Runge-Kutta pair driven by a PI controller.
#[derive(Clone, Debug)]
pub struct ExplicitRungeKutta {
    tableau: ButcherTableau,
    k: Vec<DVector<f64>>,
    too_small: f64,
}

impl ExplicitRungeKutta {
    pub fn new(tableau: ButcherTableau) -> Self {
        let too_small = 10.0 * f64::EPSILON / tableau.min_abscissa_gap();
        ExplicitRungeKutta {
            tableau,
            k: Vec::new(),
            too_small,
        }
    }

    /// Bogacki-Shampine 3(2) pair.
    pub fn rk23() -> Self {
        ExplicitRungeKutta::new(ButcherTableau::rk23())
    }

    /// Runge-Kutta-Merson pair.
    pub fn rkm45() -> Self {
        ExplicitRungeKutta::new(ButcherTableau::rkm45())
    }

    /// Dormand-Prince 5(4) pair.
    pub fn dp45() -> Self {
        ExplicitRungeKutta::new(ButcherTableau::dp45())
    }

    /// Cash-Karp 5(4) pair.
    pub fn cash_karp45() -> Self {
        ExplicitRungeKutta::new(ButcherTableau::cash_karp45())
    }

    pub fn tableau(&self) -> &ButcherTableau {
        &self.tableau
    }

    /// Derivative at the current state, i.e. the first stage of the next step.
    ///
    /// `None` until a problem is assigned.
    pub fn first_stage_derivative(&self) -> Option<&DVector<f64>> {
        self.k.first()
    }

    fn controller(&self, core: &StepCore) -> Controller {
        Controller::from_config(self.tableau.error_order(), &core.config)
    }
}

impl StepMethod for ExplicitRungeKutta {
    fn name(&self) -> &'static str {
        self.tableau.name()
    }

    fn assign(&mut self, problem: &dyn System, core: &mut StepCore) {
        let n = core.y.len();
        self.k = vec![DVector::zeros(n); self.tableau.stages()];
        problem.rhs(core.t, &core.y, &mut self.k[0]);
        core.stats.num_eval += 1;
    }

    fn estimate_initial_stepsize(&mut self, _problem: &dyn System, core: &mut StepCore) {
        let span = core.t_end - core.t;
        core.h_min = f64::MIN_POSITIVE.sqrt().max(self.too_small * span);

        let mut h = span;
        for (y_i, k_i) in core.y.iter().zip(self.k[0].iter()) {
            let tol = core.config.rel_tol * y_i.abs() + core.config.abs_tol;
            let slope = k_i.abs();
            if slope * h.powi(5) > tol {
                h = (tol / slope).powf(0.2);
            }
        }
        core.h = h.min(span).max(core.h_min);
    }

    fn start_step(&mut self, _problem: &dyn System, core: &mut StepCore) -> Result<(), IntegrationError> {
        core.last = false;
        let dt = core.t_end - core.t;
        if dt < core.h {
            core.h = dt;
            core.last = true;
        } else if dt < 2.0 * core.h {
            // Split the remaining interval into two steps of similar size.
            core.h *= 0.5;
        }
        Ok(())
    }

    fn compute_stage(&mut self, problem: &dyn System, core: &mut StepCore) {
        let h = core.h;
        let stages = self.tableau.stages();

        for s in 1..stages {
            core.y_new.copy_from(&core.y);
            for i in 0..s {
                let a = self.tableau.a(s, i);
                if a != 0.0 {
                    core.y_new.axpy(h * a, &self.k[i], 1.0);
                }
            }
            problem.rhs(core.t + h * self.tableau.c(s), &core.y_new, &mut self.k[s]);
            core.stats.num_eval += 1;
        }
        core.t_new = core.t + h;

        // With FSAL the input of the last stage already is the new state.
        if !self.tableau.fsal() {
            core.y_new.copy_from(&core.y);
            for s in 0..stages {
                let b = self.tableau.b(s);
                if b != 0.0 {
                    core.y_new.axpy(h * b, &self.k[s], 1.0);
                }
            }
        }
    }

    fn estimate_error(&mut self, core: &mut StepCore) {
        core.new_local_error.fill(0.0);
        for s in 0..self.tableau.stages() {
            let e = self.tableau.e(s);
            if e != 0.0 {
                core.new_local_error.axpy(core.h * e, &self.k[s], 1.0);
            }
        }
        core.err_new = weighted_rms_norm(&core.new_local_error, &core.weights);
    }

    fn stepsize_after_accept(&mut self, core: &mut StepCore) {
        let factor = self.controller(core).factor_after_accept(core.err_new, core.err_old);
        core.h *= factor;
    }

    fn stepsize_after_reject(&mut self, core: &mut StepCore) {
        let factor = self.controller(core).factor_after_reject(core.err_new);
        core.h *= factor;
    }

    fn prepare_next_step(&mut self, problem: &dyn System, core: &mut StepCore) {
        if self.tableau.fsal() {
            let last = self.tableau.stages() - 1;
            self.k.swap(0, last);
        } else {
            problem.rhs(core.t, &core.y, &mut self.k[0]);
            core.stats.num_eval += 1;
        }
    }

    fn describe(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "\nNumber of stages: {}\nOrder of the error estimate: {}\nFirst same as last: {}",
            self.tableau.stages(),
            self.tableau.error_order(),
            self.tableau.fsal()
        )
    }
}

impl<'a> Integrator<'a, ExplicitRungeKutta> {
    /// Integrator using the Bogacki-Shampine 3(2) pair.
    pub fn rk23() -> Self {
        Integrator::new(ExplicitRungeKutta::rk23())
    }

    /// Integrator using the Runge-Kutta-Merson pair.
    pub fn rkm45() -> Self {
        Integrator::new(ExplicitRungeKutta::rkm45())
    }

    /// Integrator using the Dormand-Prince 5(4) pair.
    pub fn dp45() -> Self {
        Integrator::new(ExplicitRungeKutta::dp45())
    }

    pub fn cash_karp45() -> Self {
        Integrator::new(ExplicitRungeKutta::cash_karp45())
    }
}
