// Chemical reaction of Robertson.
// The problem is stiff: the explicit pairs need tiny steps while the number of stages of the
// Runge-Kutta-Chebyshev method grows with the spectral radius instead.

use odeity_rk::*;

fn main() {
    let system = ChemicalReaction;

    println!("Runge-Kutta-Chebyshev");
    run(Integrator::rkc(), &system);

    println!("\nBogacki-Shampine 3(2)");
    run(Integrator::rk23(), &system);
}

fn run<'a, M: StepMethod>(mut integrator: Integrator<'a, M>, system: &'a ChemicalReaction) {
    let y0 = DVector::from_vec(vec![1.0, 0.0, 0.0]);

    let res = integrator
        .set_relative_tolerance(1.0e-2)
        .and_then(|_| integrator.assign(system, 0.0, y0))
        .and_then(|_| integrator.integrate_to(0.3));

    // Handle result.
    match res {
        Ok(()) => println!("{}", integrator.stats()),
        Err(e) => println!("An error occured: {}", e),
    }
}

struct ChemicalReaction;

impl System for ChemicalReaction {
    fn number_of_equations(&self) -> usize {
        3
    }

    fn rhs(&self, _: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        dy[0] = -0.04 * y[0] + 10000. * y[1] * y[2];
        dy[1] = 0.04 * y[0] - 10000. * y[1] * y[2] - 3. * 10_f64.powi(7) * y[1] * y[1];
        dy[2] = 3. * 10_f64.powi(7) * y[1] * y[1];
    }
}
