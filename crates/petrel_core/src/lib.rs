pub mod compare;
pub mod dump;
pub mod error;
pub mod linalg;
pub mod nonlinear;
pub mod ode;
pub mod options;
/// The `petrel_core` crate provides the numerical engine behind the Petrel programs.
/// All computation happens on `f64` data held in assembled containers.
///
/// Key components:
/// - **Linalg**: `Vector`/`Matrix` with a buffered insert/assemble/view protocol, and the `LinearSolver` seam.
/// - **Nonlinear**: Newton-Raphson with backtracking line search and finite-difference Jacobian fallback.
/// - **ODE**: Explicit Runge-Kutta integration (RK4 by default) with exact final-time matching and embedded-pair adaptivity.
/// - **Traits**: `NonlinearSystem`, `OdeSystem`, `ExactSolution` (user callbacks).
pub mod traits;

pub use error::{Error, Result};
