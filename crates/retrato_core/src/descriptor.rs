use crate::bifurcation::{BifurcationMap, FrozenMap};
use crate::error::{EvalError, EvalResult};
use crate::expr::SymbolicField;
use crate::field::{sample_grid, FieldSample};
use crate::linear::LinearField;
use crate::params::ParameterSet;
use crate::solvers::{integrate, StepRule};
use crate::trajectory::Trajectory;
use crate::traits::VectorField;
use nalgebra::Matrix2;

/// A self-contained description of a system to analyze, the unit of
/// exchange between the interface layer and the evaluators.
///
/// Each request builds its field afresh from the descriptor, so two
/// runs with equal descriptors cannot see each other's state.
#[derive(Debug, Clone)]
pub enum SystemDescriptor {
    /// One of the canonical one-dimensional maps at a fixed parameter.
    ClosedForm { map: BifurcationMap, r: f64 },
    /// A planar linear system `x' = A x`.
    Linear { matrix: Matrix2<f64> },
    /// User-entered equations over named variables and parameters.
    Nonlinear {
        equations: Vec<String>,
        variables: Vec<String>,
        params: ParameterSet,
    },
}

impl<'a> VectorField<f64> for Box<dyn VectorField<f64> + 'a> {
    fn dimension(&self) -> usize {
        self.as_ref().dimension()
    }

    fn eval(&self, t: f64, x: &[f64], out: &mut [f64]) {
        self.as_ref().eval(t, x, out);
    }
}

impl SystemDescriptor {
    pub fn dimension(&self) -> usize {
        match self {
            SystemDescriptor::ClosedForm { .. } => 1,
            SystemDescriptor::Linear { .. } => 2,
            SystemDescriptor::Nonlinear { equations, .. } => equations.len(),
        }
    }

    /// Compiles or wraps the described field.
    pub fn build(&self) -> EvalResult<Box<dyn VectorField<f64> + '_>> {
        match self {
            SystemDescriptor::ClosedForm { map, r } => {
                if !r.is_finite() {
                    return Err(EvalError::validation(format!(
                        "parameter value {r} must be finite"
                    )));
                }
                Ok(Box::new(FrozenMap { map: *map, r: *r }))
            }
            SystemDescriptor::Linear { matrix } => Ok(Box::new(LinearField::new(*matrix))),
            SystemDescriptor::Nonlinear {
                equations,
                variables,
                params,
            } => {
                let equations: Vec<&str> = equations.iter().map(String::as_str).collect();
                let variables: Vec<&str> = variables.iter().map(String::as_str).collect();
                let names: Vec<&str> = params.names().collect();
                let values: Vec<f64> = names
                    .iter()
                    .map(|&name| params.get(name))
                    .collect::<EvalResult<_>>()?;
                Ok(Box::new(SymbolicField::compile(
                    &equations, &variables, &names, &values,
                )?))
            }
        }
    }

    /// Integrates the described system over `[t0, t1]`.
    pub fn integrate(
        &self,
        x0: &[f64],
        t0: f64,
        t1: f64,
        rule: StepRule,
    ) -> EvalResult<Trajectory> {
        let field = self.build()?;
        integrate(&field, x0, t0, t1, rule)
    }

    /// Direction-field samples for the planar families.
    pub fn sample_grid(
        &self,
        x_range: (f64, f64),
        y_range: (f64, f64),
        nx: usize,
        ny: usize,
    ) -> EvalResult<Vec<FieldSample>> {
        let field = self.build()?;
        sample_grid(&field, x_range, y_range, nx, ny)
    }
}
