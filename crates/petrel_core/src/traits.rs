use crate::error::Result;
use crate::linalg::Matrix;

/// A nonlinear system F(x) = 0 handed to the Newton solver.
pub trait NonlinearSystem {
    /// Returns the number of unknowns.
    fn dimension(&self) -> usize;

    /// Evaluates the residual.
    /// x: current iterate
    /// out: buffer to write F(x)
    fn residual(&mut self, x: &[f64], out: &mut [f64]) -> Result<()>;

    /// Whether `jacobian` is implemented. Without it the solver falls back to
    /// finite differences.
    fn has_jacobian(&self) -> bool {
        false
    }

    /// Fills and assembles J(x). The matrix keeps its previous pattern and
    /// values from the last call.
    fn jacobian(&mut self, _x: &[f64], _jac: &mut Matrix) -> Result<()> {
        Err(crate::Error::usage("this system provides no analytic Jacobian"))
    }
}

/// Right-hand side of y' = g(t, y).
pub trait OdeSystem {
    fn dimension(&self) -> usize;

    /// t: current time
    /// y: current state
    /// out: buffer to write g(t, y)
    fn rhs(&mut self, t: f64, y: &[f64], out: &mut [f64]) -> Result<()>;
}

/// Closed-form solution used to validate an integration.
pub trait ExactSolution {
    fn evaluate(&self, t: f64, out: &mut [f64]);
}

/// Adapts closures into a [`NonlinearSystem`].
pub struct FnSystem<R, J = fn(&[f64], &mut Matrix) -> Result<()>> {
    dim: usize,
    residual: R,
    jacobian: Option<J>,
}

impl<R> FnSystem<R>
where
    R: FnMut(&[f64], &mut [f64]) -> Result<()>,
{
    pub fn new(dim: usize, residual: R) -> Self {
        Self {
            dim,
            residual,
            jacobian: None,
        }
    }
}

impl<R, J> FnSystem<R, J>
where
    R: FnMut(&[f64], &mut [f64]) -> Result<()>,
    J: FnMut(&[f64], &mut Matrix) -> Result<()>,
{
    pub fn with_jacobian(dim: usize, residual: R, jacobian: J) -> Self {
        Self {
            dim,
            residual,
            jacobian: Some(jacobian),
        }
    }
}

impl<R, J> NonlinearSystem for FnSystem<R, J>
where
    R: FnMut(&[f64], &mut [f64]) -> Result<()>,
    J: FnMut(&[f64], &mut Matrix) -> Result<()>,
{
    fn dimension(&self) -> usize {
        self.dim
    }

    fn residual(&mut self, x: &[f64], out: &mut [f64]) -> Result<()> {
        (self.residual)(x, out)
    }

    fn has_jacobian(&self) -> bool {
        self.jacobian.is_some()
    }

    fn jacobian(&mut self, x: &[f64], jac: &mut Matrix) -> Result<()> {
        match self.jacobian.as_mut() {
            Some(jacobian) => jacobian(x, jac),
            None => Err(crate::Error::usage("this system provides no analytic Jacobian")),
        }
    }
}

/// Adapts a closure into an [`OdeSystem`].
pub struct FnRhs<G> {
    dim: usize,
    rhs: G,
}

impl<G> FnRhs<G>
where
    G: FnMut(f64, &[f64], &mut [f64]),
{
    pub fn new(dim: usize, rhs: G) -> Self {
        Self { dim, rhs }
    }
}

impl<G> OdeSystem for FnRhs<G>
where
    G: FnMut(f64, &[f64], &mut [f64]),
{
    fn dimension(&self) -> usize {
        self.dim
    }

    fn rhs(&mut self, t: f64, y: &[f64], out: &mut [f64]) -> Result<()> {
        (self.rhs)(t, y, out);
        Ok(())
    }
}

impl<F> ExactSolution for F
where
    F: Fn(f64, &mut [f64]),
{
    fn evaluate(&self, t: f64, out: &mut [f64]) {
        self(t, out)
    }
}
