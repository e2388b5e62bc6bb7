//! # odeity-rk
//! `odeity-rk` provides adaptive explicit integrators for large systems of ordinary differential
//! equations such as the ones arising from the spatial discretization of parabolic PDEs:
//! embedded Runge-Kutta pairs (RK23, RKM45, DP45, Cash-Karp) and the stabilized
//! Runge-Kutta-Chebyshev method.

// Re-export from external crate
pub use nalgebra::DVector;

// Declare modules
pub mod butcher_tableau;
pub mod config;
pub mod constants;
pub mod controller;
pub mod explicit_rk;
pub mod history;
pub mod integrator;
pub mod ode_shared;
pub mod rkc;
pub mod spectral_radius;
pub mod stats;

pub use butcher_tableau::ButcherTableau;
pub use config::IntegratorConfig;
pub use controller::Controller;
pub use explicit_rk::ExplicitRungeKutta;
pub use history::{HistoryRecord, HistorySink, NoHistory, WriterSink};
pub use integrator::{Integrator, StepCore, StepMethod};
pub use ode_shared::{IntegrationError, System};
pub use rkc::RungeKuttaChebyshev;
pub use spectral_radius::SpectralRadiusEstimate;
pub use stats::Stats;
