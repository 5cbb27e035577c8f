use crate::error::{EvalError, EvalResult};
use crate::trajectory::Trajectory;
use crate::traits::{Scalar, Stepper, VectorField};

/// Classical fourth-order Runge-Kutta with a fixed step.
///
/// The only scheme this crate needs: every simulator integrates smooth
/// low-dimensional fields over short horizons, so there is no adaptive
/// step control and no stiffness handling.
pub struct Rk4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> Rk4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Stepper<T> for Rk4<T> {
    fn step(&mut self, field: &impl VectorField<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = T::from_f64(0.5);
        let sixth = T::from_f64(1.0 / 6.0);
        let two = T::from_f64(2.0);
        let t0 = *t;

        field.eval(t0, state, &mut self.k1);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * half * self.k1[i];
        }
        field.eval(t0 + dt * half, &self.tmp, &mut self.k2);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * half * self.k2[i];
        }
        field.eval(t0 + dt * half, &self.tmp, &mut self.k3);

        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        field.eval(t0 + dt, &self.tmp, &mut self.k4);

        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// How to derive the step count for an integration run.
#[derive(Debug, Clone, Copy)]
pub enum StepRule {
    /// A requested step size; the actual size is adjusted so the final
    /// sample lands exactly on `t1`.
    Size(f64),
    /// A total number of steps over the interval.
    Count(usize),
}

impl StepRule {
    fn step_count(self, span: f64) -> EvalResult<usize> {
        match self {
            StepRule::Size(h) => {
                if !(h > 0.0) || !h.is_finite() {
                    return Err(EvalError::validation(format!(
                        "step size must be positive and finite, got {h}"
                    )));
                }
                Ok((span / h).ceil().max(1.0) as usize)
            }
            StepRule::Count(n) => {
                if n == 0 {
                    return Err(EvalError::validation("step count must be at least 1"));
                }
                Ok(n)
            }
        }
    }
}

/// Integrates `x' = F(t, x)` from `x0` over `[t0, t1]`.
///
/// Pure function of its inputs: re-invoking with the same field,
/// initial state, and rule reproduces the trajectory bit for bit.
/// Diverging solutions are not an error, the magnitudes just grow until
/// the plot clips them; only a non-finite sample (the field left its
/// domain, e.g. a logarithm hit a non-positive argument) stops the run
/// early, truncating at the last valid sample and recording the time of
/// the failed step in `truncated_at`.
pub fn integrate<F: VectorField<f64>>(
    field: &F,
    x0: &[f64],
    t0: f64,
    t1: f64,
    rule: StepRule,
) -> EvalResult<Trajectory> {
    let dim = field.dimension();
    if dim == 0 {
        return Err(EvalError::validation("field has zero dimension"));
    }
    if x0.len() != dim {
        return Err(EvalError::validation(format!(
            "initial state has {} components, field expects {dim}",
            x0.len()
        )));
    }
    if !t0.is_finite() || !t1.is_finite() || t1 <= t0 {
        return Err(EvalError::validation(format!(
            "time range [{t0}, {t1}] must be finite with t1 > t0"
        )));
    }
    if x0.iter().any(|v| !v.is_finite()) {
        return Err(EvalError::validation("initial state must be finite"));
    }

    let span = t1 - t0;
    let steps = rule.step_count(span)?;
    let dt = span / steps as f64;

    let mut stepper = Rk4::new(dim);
    let mut state = x0.to_vec();
    let mut t = t0;
    let mut trajectory = Trajectory::with_capacity(dim, steps + 1);
    trajectory.push(t, &state);

    for _ in 0..steps {
        stepper.step(field, &mut t, &mut state, dt);
        if state.iter().any(|v| !v.is_finite()) {
            trajectory.truncated_at = Some(t);
            break;
        }
        trajectory.push(t, &state);
    }

    Ok(trajectory)
}

/// Single evaluation of a field with the domain failure surfaced as a
/// typed error instead of a NaN.
pub fn probe<F: VectorField<f64>>(field: &F, t: f64, x: &[f64]) -> EvalResult<Vec<f64>> {
    let dim = field.dimension();
    if x.len() != dim {
        return Err(EvalError::validation(format!(
            "state has {} components, field expects {dim}",
            x.len()
        )));
    }
    let mut out = vec![0.0; dim];
    field.eval(t, x, &mut out);
    if let Some(i) = out.iter().position(|v| !v.is_finite()) {
        return Err(EvalError::Domain {
            t,
            detail: format!("component {i} evaluated to {}", out[i]),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{integrate, probe, StepRule};
    use crate::error::EvalError;
    use crate::expr::SymbolicField;
    use crate::traits::VectorField;

    struct Decay;

    impl VectorField<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn eval(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[0];
        }
    }

    #[test]
    fn rk4_matches_exponential_decay() {
        let trajectory = integrate(&Decay, &[1.0], 0.0, 2.0, StepRule::Count(200)).unwrap();
        let last = trajectory.last_state().unwrap()[0];
        assert!((last - (-2.0_f64).exp()).abs() < 1e-8);
        assert_eq!(trajectory.len(), 201);
    }

    #[test]
    fn integration_is_reproducible() {
        let a = integrate(&Decay, &[0.7], 0.0, 5.0, StepRule::Size(0.01)).unwrap();
        let b = integrate(&Decay, &[0.7], 0.0, 5.0, StepRule::Size(0.01)).unwrap();
        assert_eq!(a.len(), b.len());
        for i in 0..a.len() {
            assert_eq!(a.time(i), b.time(i));
            assert_eq!(a.state(i), b.state(i));
        }
    }

    #[test]
    fn step_size_rule_lands_on_the_endpoint() {
        // 1.0 / 0.3 is not an integer; the size shrinks to 0.25 so the
        // last sample still sits at t1.
        let trajectory = integrate(&Decay, &[1.0], 0.0, 1.0, StepRule::Size(0.3)).unwrap();
        let last_t = trajectory.time(trajectory.len() - 1);
        assert!((last_t - 1.0).abs() < 1e-12);
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        assert!(matches!(
            integrate(&Decay, &[1.0], 1.0, 1.0, StepRule::Count(10)),
            Err(EvalError::Validation(_))
        ));
        assert!(matches!(
            integrate(&Decay, &[1.0], 0.0, 1.0, StepRule::Size(0.0)),
            Err(EvalError::Validation(_))
        ));
        assert!(matches!(
            integrate(&Decay, &[1.0, 2.0], 0.0, 1.0, StepRule::Count(10)),
            Err(EvalError::Validation(_))
        ));
    }

    #[test]
    fn log_singularity_truncates_instead_of_aborting() {
        // x' = -1 drives x toward the ln singularity at 0; y' = ln(x)
        // becomes undefined once x goes non-positive.
        let field = SymbolicField::compile(&["-1", "ln(x)"], &["x", "y"], &[], &[]).unwrap();
        let trajectory = integrate(&field, &[0.5, 0.0], 0.0, 2.0, StepRule::Count(100)).unwrap();
        assert!(trajectory.truncated_at.is_some());
        assert!(trajectory.len() > 1);
        // Every retained sample is finite.
        for (_, state) in trajectory.iter() {
            assert!(state.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn probe_reports_domain_errors() {
        let field = SymbolicField::compile(&["ln(x)"], &["x"], &[], &[]).unwrap();
        assert!(probe(&field, 0.0, &[1.0]).is_ok());
        match probe(&field, 0.0, &[-1.0]) {
            Err(EvalError::Domain { t, .. }) => assert_eq!(t, 0.0),
            other => panic!("expected domain error, got {other:?}"),
        }
    }
}
