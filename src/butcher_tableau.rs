//! Coefficients of the embedded explicit Runge-Kutta pairs.
//!
//! A method with `s` stages is described by
//!
//! ```text
//!  c(1) | a(1,1) ... a(1,s)
//!   ..  |       ...
//!  c(s) | a(s,1) ... a(s,s)
//!  -----+------------------
//!       | b(1)   ... b(s)
//!       | e(1)   ... e(s)
//! ```
//!
//! where `b` are the weights of the propagated solution and `e` the weights of the
//! error estimate, i.e. the difference between the two formulas of the pair.

use nalgebra::{DMatrix, DVector};

/// Immutable coefficients of an embedded Runge-Kutta pair.
#[derive(Clone, Debug, PartialEq)]
pub struct ButcherTableau {
    name: &'static str,
    a: DMatrix<f64>,
    b: DVector<f64>,
    c: DVector<f64>,
    e: DVector<f64>,
    error_order: usize,
    fsal: bool,
}

impl ButcherTableau {
    /// Builds a tableau from row-major `a` and the vectors `b`, `c` and `e`.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions are inconsistent or `a` is not strictly lower triangular.
    pub fn new(
        name: &'static str,
        a: &[f64],
        b: &[f64],
        c: &[f64],
        e: &[f64],
        error_order: usize,
        fsal: bool,
    ) -> Self {
        let stages = b.len();
        assert!(stages >= 2, "a Runge-Kutta pair needs at least two stages");
        assert_eq!(a.len(), stages * stages);
        assert_eq!(c.len(), stages);
        assert_eq!(e.len(), stages);
        let a = DMatrix::from_row_slice(stages, stages, a);
        for i in 0..stages {
            for j in i..stages {
                assert!(a[(i, j)] == 0.0, "the method must be explicit");
            }
        }
        ButcherTableau {
            name,
            a,
            b: DVector::from_column_slice(b),
            c: DVector::from_column_slice(c),
            e: DVector::from_column_slice(e),
            error_order,
            fsal,
        }
    }

    /// Bogacki-Shampine 3(2) pair, also known as `ode23`.
    #[rustfmt::skip]
    pub fn rk23() -> Self {
        ButcherTableau::new(
            "Runge-Kutta 3(2) (Bogacki-Shampine)",
            &[
                0.0, 0.0, 0.0, 0.0,
                1.0 / 2.0, 0.0, 0.0, 0.0,
                0.0, 3.0 / 4.0, 0.0, 0.0,
                2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0, 0.0,
            ],
            &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0, 0.0],
            &[0.0, 1.0 / 2.0, 3.0 / 4.0, 1.0],
            &[-5.0 / 72.0, 1.0 / 12.0, 1.0 / 9.0, -1.0 / 8.0],
            2,
            true,
        )
    }

    /// Runge-Kutta-Merson method with five stages.
    #[rustfmt::skip]
    pub fn rkm45() -> Self {
        ButcherTableau::new(
            "Runge-Kutta-Merson 4(5)",
            &[
                0.0, 0.0, 0.0, 0.0, 0.0,
                1.0 / 3.0, 0.0, 0.0, 0.0, 0.0,
                1.0 / 6.0, 1.0 / 6.0, 0.0, 0.0, 0.0,
                0.125, 0.0, 0.375, 0.0, 0.0,
                0.5, 0.0, -1.5, 2.0, 0.0,
            ],
            &[1.0 / 6.0, 0.0, 0.0, 2.0 / 3.0, 1.0 / 6.0],
            &[0.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 2.0, 1.0],
            &[1.0 / 15.0, 0.0, -3.0 / 10.0, 4.0 / 15.0, -1.0 / 30.0],
            4,
            false,
        )
    }

    /// Dormand-Prince 5(4) pair with seven stages.
    #[rustfmt::skip]
    pub fn dp45() -> Self {
        ButcherTableau::new(
            "Runge-Kutta 5(4) (Dormand-Prince)",
            &[
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0, 0.0,
                19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0, 0.0, 0.0, 0.0,
                9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0, 0.0, 0.0,
                35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0, 0.0,
            ],
            &[
                35.0 / 384.0,
                0.0,
                500.0 / 1113.0,
                125.0 / 192.0,
                -2187.0 / 6784.0,
                11.0 / 84.0,
                0.0,
            ],
            &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0],
            &[
                71.0 / 57600.0,
                0.0,
                -71.0 / 16695.0,
                71.0 / 1920.0,
                -17253.0 / 339200.0,
                22.0 / 525.0,
                -1.0 / 40.0,
            ],
            4,
            true,
        )
    }

    /// Cash-Karp 5(4) pair with six stages.
    #[rustfmt::skip]
    pub fn cash_karp45() -> Self {
        ButcherTableau::new(
            "Runge-Kutta 5(4) (Cash-Karp)",
            &[
                0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0,
                3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0,
                3.0 / 10.0, -9.0 / 10.0, 6.0 / 5.0, 0.0, 0.0, 0.0,
                -11.0 / 54.0, 5.0 / 2.0, -70.0 / 27.0, 35.0 / 27.0, 0.0, 0.0,
                1631.0 / 55296.0, 175.0 / 512.0, 575.0 / 13824.0, 44275.0 / 110592.0, 253.0 / 4096.0, 0.0,
            ],
            &[37.0 / 378.0, 0.0, 250.0 / 621.0, 125.0 / 594.0, 0.0, 512.0 / 1771.0],
            &[0.0, 1.0 / 5.0, 3.0 / 10.0, 3.0 / 5.0, 1.0, 7.0 / 8.0],
            &[
                37.0 / 378.0 - 2825.0 / 27648.0,
                0.0,
                250.0 / 621.0 - 18575.0 / 48384.0,
                125.0 / 594.0 - 13525.0 / 55296.0,
                -277.0 / 14336.0,
                512.0 / 1771.0 - 1.0 / 4.0,
            ],
            4,
            false,
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stages(&self) -> usize {
        self.b.len()
    }

    /// Order of the error estimate.
    pub fn error_order(&self) -> usize {
        self.error_order
    }

    /// Is the method "first same as last"?
    pub fn fsal(&self) -> bool {
        self.fsal
    }

    pub fn a(&self, i: usize, j: usize) -> f64 {
        self.a[(i, j)]
    }

    pub fn b(&self, i: usize) -> f64 {
        self.b[i]
    }

    pub fn c(&self, i: usize) -> f64 {
        self.c[i]
    }

    pub fn e(&self, i: usize) -> f64 {
        self.e[i]
    }

    /// Smallest nonzero distance between two abscissae, at most one.
    pub(crate) fn min_abscissa_gap(&self) -> f64 {
        let stages = self.stages();
        let mut gap: f64 = 1.0;
        for i in 0..stages {
            for j in (i + 1)..stages {
                let diff = (self.c[i] - self.c[j]).abs();
                if diff > 0.0 {
                    gap = gap.min(diff);
                }
            }
        }
        gap
    }
}
