use approx::assert_relative_eq;
use odeity_rk::{DVector, ExplicitRungeKutta, HistoryRecord, IntegrationError, Integrator, System, WriterSink};

struct Decay;

// Implement the ODE dy/dt = -y
impl System for Decay {
    fn number_of_equations(&self) -> usize {
        1
    }

    fn rhs(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        dy[0] = -y[0];
    }
}

struct LotkaVolterra;

impl System for LotkaVolterra {
    fn number_of_equations(&self) -> usize {
        2
    }

    fn rhs(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        dy[0] = 2.0 * (y[0] - y[0] * y[1]);
        dy[1] = -(y[1] - y[0] * y[1]);
    }
}

struct Oscillator;

impl System for Oscillator {
    fn number_of_equations(&self) -> usize {
        2
    }

    fn rhs(&self, _t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        dy[0] = y[1];
        dy[1] = -y[0];
    }
}

struct Broken;

impl System for Broken {
    fn number_of_equations(&self) -> usize {
        1
    }

    fn rhs(&self, _t: f64, _y: &DVector<f64>, dy: &mut DVector<f64>) {
        dy[0] = f64::NAN;
    }
}

fn state(values: &[f64]) -> DVector<f64> {
    DVector::from_column_slice(values)
}

#[test]
fn test_rk23_exponential_decay() {
    let mut integrator = Integrator::rk23();
    integrator.set_relative_tolerance(1e-6).unwrap();
    integrator.set_absolute_tolerance(1e-6).unwrap();
    integrator.assign(&Decay, 0.0, state(&[1.0])).unwrap();
    integrator.integrate_to(1.0).unwrap();

    assert_eq!(integrator.current_time(), 1.0);
    assert_relative_eq!(integrator.current_state()[0], (-1.0_f64).exp(), epsilon = 1e-5);

    let stats = integrator.stats();
    assert!(stats.accepted_steps > 1);
    assert!(stats.min_stepsize >= integrator.min_stepsize());
    assert!(stats.max_stepsize <= 1.0);
}

#[test]
fn test_dp45_lotka_volterra_history() {
    let mut integrator = Integrator::with_history_sink(ExplicitRungeKutta::dp45(), Vec::<HistoryRecord>::new());
    integrator.set_save_history(true);
    integrator.set_relative_tolerance(1e-6).unwrap();
    integrator.assign(&LotkaVolterra, 0.0, state(&[1.0, 3.0])).unwrap();
    integrator.integrate_to(10.0).unwrap();

    let history = integrator.history_sink();
    assert_eq!(history.len(), integrator.stats().accepted_steps as usize);
    assert!(history.windows(2).all(|w| w[0].time < w[1].time));
    assert_eq!(history.last().map(|r| r.time), Some(10.0));
    assert!(history.iter().all(|r| r.stages.is_none()));

    // The step sizes add up to the interval.
    let total: f64 = history.iter().map(|r| r.stepsize).sum();
    assert_relative_eq!(total, 10.0, epsilon = 1e-9);

    // The first integral x - ln x + 2 (y - ln y) is conserved.
    let invariant = |x: f64, y: f64| x - x.ln() + 2.0 * (y - y.ln());
    let y = integrator.current_state();
    assert_relative_eq!(invariant(y[0], y[1]), invariant(1.0, 3.0), max_relative = 1e-3);
}

#[test]
fn test_fsal_first_stage_matches_fresh_evaluation() {
    let mut integrator = Integrator::dp45();
    integrator.assign(&LotkaVolterra, 0.0, state(&[1.0, 3.0])).unwrap();
    integrator.integrate_to(2.5).unwrap();

    let mut dy = DVector::zeros(2);
    LotkaVolterra.rhs(integrator.current_time(), integrator.current_state(), &mut dy);
    let k0 = integrator.method().first_stage_derivative().unwrap();
    assert_relative_eq!(k0[0], dy[0], max_relative = 1e-14);
    assert_relative_eq!(k0[1], dy[1], max_relative = 1e-14);

    let stats = integrator.stats();
    let attempts = stats.accepted_steps + stats.rejected_steps;
    assert_eq!(stats.num_eval, 1 + 6 * attempts);
}

#[test]
fn test_integration_can_be_continued() {
    let mut integrator = Integrator::rkm45();
    integrator.set_relative_tolerance(1e-8).unwrap();
    integrator.set_absolute_tolerance(1e-8).unwrap();
    integrator.assign(&Oscillator, 0.0, state(&[1.0, 0.0])).unwrap();
    integrator.integrate_to(1.0).unwrap();
    integrator.integrate_forward(2.0).unwrap();

    assert_eq!(integrator.current_time(), 3.0);
    assert_relative_eq!(integrator.current_state()[0], 3.0_f64.cos(), epsilon = 1e-6);
    assert!(matches!(
        integrator.integrate_to(2.0),
        Err(IntegrationError::InvalidTimeRange { .. })
    ));
}

#[test]
fn test_tighter_tolerance_does_not_increase_error() {
    let t_end = 5.0;
    let error = |method: fn() -> ExplicitRungeKutta, tol: f64| {
        let mut integrator = Integrator::new(method());
        integrator.set_relative_tolerance(tol).unwrap();
        integrator.set_absolute_tolerance(tol).unwrap();
        integrator.assign(&Oscillator, 0.0, state(&[1.0, 0.0])).unwrap();
        integrator.integrate_to(t_end).unwrap();
        let y = integrator.current_state();
        ((y[0] - t_end.cos()).powi(2) + (y[1] + t_end.sin()).powi(2)).sqrt()
    };

    for &method in &[ExplicitRungeKutta::rk23 as fn() -> ExplicitRungeKutta, ExplicitRungeKutta::dp45] {
        let mut tol = 1e-3;
        let mut previous = error(method, tol);
        while tol > 1e-9 {
            tol *= 0.5;
            let current = error(method, tol);
            assert!(current <= 10.0 * previous + 1e-12, "{} > 10 * {}", current, previous);
            previous = current;
        }
    }
}

#[test]
fn test_nan_right_hand_side_stops_with_step_too_small() {
    let mut integrator = Integrator::rk23();
    integrator.assign(&Broken, 0.0, state(&[1.0])).unwrap();
    let result = integrator.integrate_to(1.0);
    assert!(matches!(result, Err(IntegrationError::StepTooSmall { .. })));
    assert_eq!(integrator.stats().accepted_steps, 0);
    assert!(integrator.stats().rejected_steps > 0);
    assert_eq!(integrator.current_time(), 0.0);
}

#[test]
fn test_tolerance_out_of_range() {
    let mut integrator = Integrator::dp45();
    assert!(matches!(
        integrator.set_relative_tolerance(1.0),
        Err(IntegrationError::ToleranceOutOfRange { .. })
    ));
    assert!(matches!(
        integrator.set_absolute_tolerance(0.0),
        Err(IntegrationError::ToleranceOutOfRange { .. })
    ));
    // Rejected values leave the tolerances untouched.
    assert_eq!(integrator.relative_tolerance(), 1e-3);
    assert_eq!(integrator.absolute_tolerance(), 1e-6);
}

#[test]
fn test_history_written_to_stream() {
    let mut integrator = Integrator::with_history_sink(ExplicitRungeKutta::rk23(), WriterSink::new(Vec::new()));
    integrator.set_save_history(true);
    integrator.assign(&Decay, 0.0, state(&[1.0])).unwrap();
    integrator.integrate_to(2.0).unwrap();
    let accepted = integrator.stats().accepted_steps as usize;

    let report = format!("{}", integrator);
    assert!(report.contains("Bogacki-Shampine"));

    let bytes = integrator.into_history_sink().into_inner().unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let times: Vec<f64> = text
        .lines()
        .map(|line| line.split_whitespace().next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(times.len(), accepted);
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(times.last(), Some(&2.0));
}
