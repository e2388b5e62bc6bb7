// Lotka-Volterra predator-prey model
//
//     x' = 2 (x - x y)
//     y' = -(y - x y)
//
// integrated with the Dormand-Prince pair. The accepted steps are collected in memory.

use odeity_rk::*;

fn main() {
    let system = PredatorPrey;
    let y0 = DVector::from_vec(vec![1.0, 3.0]);

    let mut integrator = Integrator::with_history_sink(ExplicitRungeKutta::dp45(), Vec::<HistoryRecord>::new());
    integrator.set_save_history(true);
    let res = integrator
        .set_relative_tolerance(1e-6)
        .and_then(|_| integrator.assign(&system, 0.0, y0))
        .and_then(|_| integrator.integrate_to(10.0));

    match res {
        Ok(()) => {
            println!("{}", integrator.stats());
            let y = integrator.current_state();
            println!("y(10) = ({:.6}, {:.6})", y[0], y[1]);
            for record in integrator.history_sink().iter().take(10) {
                println!("t = {:10.6}, h = {:.3e}", record.time, record.stepsize);
            }
        }
        Err(e) => println!("An error occured: {}", e),
    }
}

struct PredatorPrey;

impl System for PredatorPrey {
    fn number_of_equations(&self) -> usize {
        2
    }

    fn rhs(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        dy[0] = 2.0 * (y[0] - y[0] * y[1]);
        dy[1] = -(y[1] - y[0] * y[1]);
    }
}
