//! Default values and admissible ranges of the integrator parameters.

/// Tolerance defaults and limits
pub mod tolerance {
    /// Default relative tolerance
    pub const DEFAULT_RELATIVE: f64 = 1.0e-3;

    /// Default absolute tolerance
    pub const DEFAULT_ABSOLUTE: f64 = 1.0e-6;

    /// Smallest admissible tolerance
    pub const MIN: f64 = 10.0 * f64::EPSILON;

    /// Largest admissible tolerance
    pub const MAX: f64 = 0.1;
}

/// Step size control constants
pub mod step_control {
    /// Safety factor applied to every step size change
    pub const SAFETY: f64 = 0.9;

    /// β coefficient of the PI controller
    pub const STABILIZATION_BETA: f64 = 0.1;

    /// Admissible range of the β coefficient
    pub const STABILIZATION_BETA_RANGE: (f64, f64) = (0.0, 0.2);

    /// Smallest factor between two successive steps
    pub const DECREASE_FACTOR: f64 = 0.1;

    /// Largest factor between two successive steps
    pub const INCREASE_FACTOR: f64 = 10.0;

    /// A step is accepted when its weighted error norm does not exceed this value
    pub const ACCEPTANCE_THRESHOLD: f64 = 1.0;
}

/// Runge-Kutta-Chebyshev constants
pub mod chebyshev {
    /// Maximum number of power iterations in the spectral radius estimation
    pub const MAX_SPECTRAL_RADIUS_ITERATIONS: usize = 50;

    /// Number of accepted steps after which the spectral radius is estimated again
    pub const SPECTRAL_RADIUS_INTERVAL: usize = 25;

    /// Margin applied to the power iteration estimate so it is likely an upper bound
    pub const SPECTRAL_RADIUS_MARGIN: f64 = 1.2;

    /// Relative change between power iterations considered as converged
    pub const POWER_ITERATION_TOLERANCE: f64 = 0.01;

    /// Length of the real stability interval per squared stage (damped polynomial)
    pub const STABILITY_BOUNDARY_SLOPE: f64 = 1.54;

    /// Damping parameter of the Chebyshev polynomial, `w0 = 1 + DAMPING / s^2`
    pub const DAMPING: f64 = 2.0 / 13.0;

    /// The step is shortened to reach the end time when within this multiple of the step size
    pub const END_APPROACH_FACTOR: f64 = 1.2;

    /// Smallest admissible number of stages
    pub const MIN_STAGES: usize = 2;
}
