// Allen-Cahn equation in one dimension
//
//     u_t = u_xx + u (1 - u) (1 + u) / xi^2
//
// with homogeneous Neumann boundary conditions, discretized by central differences.
// The diffusion term makes the system stiff, so it is integrated by the
// Runge-Kutta-Chebyshev method.

use odeity_rk::*;

use std::{fs::File, io::BufWriter, path::Path};

fn main() {
    let nodes = 200;
    let dx = 1.0 / (nodes - 1) as f64;
    let system = AllenCahn {
        nodes,
        dx_pow2_inv: 1.0 / (dx * dx),
        xi_sqr_inv: 1.0 / (4.0 * dx * dx),
    };

    // Two interfaces, the smaller phase shrinks and disappears.
    let y0 = DVector::from_fn(nodes, |i, _| {
        let x = i as f64 * dx;
        if (x - 0.5).abs() < 0.1 {
            1.0
        } else {
            -1.0
        }
    });

    let path = Path::new("./outputs/allen_cahn_history.dat");
    let file = match File::create(path) {
        Ok(file) => file,
        Err(e) => {
            println!("Could not open file. Error: {:?}", e);
            return;
        }
    };

    let mut integrator = Integrator::with_history_sink(RungeKuttaChebyshev::new(), WriterSink::new(BufWriter::new(file)));
    integrator.set_save_history(true);
    if let Err(e) = integrator.set_relative_tolerance(1e-4) {
        println!("An error occured: {}", e);
        return;
    }
    if let Err(e) = integrator.assign(&system, 0.0, y0) {
        println!("An error occured: {}", e);
        return;
    }

    // Report the size of the middle phase at a few output times.
    for &t_out in &[0.001, 0.002, 0.005, 0.01, 0.02] {
        match integrator.integrate_to(t_out) {
            Ok(()) => {
                let positive = integrator.current_state().iter().filter(|&&u| u > 0.0).count();
                println!("t = {:6.3}: {} nodes with u > 0", integrator.current_time(), positive);
            }
            Err(e) => {
                println!("An error occured: {}", e);
                return;
            }
        }
    }

    println!("{}", integrator);
    println!("{}", integrator.stats());
    match integrator.into_history_sink().into_inner() {
        Ok(_) => println!("Step size history saved in: {:?}", path),
        Err(e) => println!("Could not write the history. Error: {:?}", e),
    }
}

struct AllenCahn {
    nodes: usize,
    dx_pow2_inv: f64,
    xi_sqr_inv: f64,
}

impl AllenCahn {
    fn laplacian(&self, v: &DVector<f64>, i: usize) -> f64 {
        let n = self.nodes;
        // Reflection at the boundary
        let left = if i == 0 { v[1] } else { v[i - 1] };
        let right = if i == n - 1 { v[n - 2] } else { v[i + 1] };
        self.dx_pow2_inv * (left - 2.0 * v[i] + right)
    }
}

impl System for AllenCahn {
    fn number_of_equations(&self) -> usize {
        self.nodes
    }

    fn rhs(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        for i in 0..self.nodes {
            let u = y[i];
            dy[i] = self.laplacian(y, i) + self.xi_sqr_inv * u * (1.0 - u) * (1.0 + u);
        }
    }

    fn jacobian_vector_product(
        &self,
        _t: f64,
        y: &DVector<f64>,
        _fy: &DVector<f64>,
        v: &DVector<f64>,
        jv: &mut DVector<f64>,
    ) -> bool {
        for i in 0..self.nodes {
            let u = y[i];
            jv[i] = self.laplacian(v, i) + self.xi_sqr_inv * (1.0 - 3.0 * u * u) * v[i];
        }
        true
    }
}
