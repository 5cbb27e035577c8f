use num_traits::Num;
use std::fmt::Debug;
use std::ops::Neg;

/// Numeric abstraction shared by every evaluator in the crate.
///
/// Implemented for `f64` (plain evaluation) and for `Dual`
/// (forward-mode derivatives). The elementary-function surface matches
/// what the expression engine and the built-in models need; nothing
/// here detects domain violations, an `ln` of a negative argument
/// simply produces a NaN that the trajectory layer turns into a
/// `Domain` failure.
pub trait Scalar: Num + Neg<Output = Self> + Copy + PartialOrd + Debug + 'static {
    fn from_f64(v: f64) -> Self;

    /// Real part of the value, discarding any derivative information.
    fn value(self) -> f64;

    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn abs(self) -> Self;
    fn powf(self, exponent: Self) -> Self;
    fn powi(self, exponent: i32) -> Self;

    fn is_finite(self) -> bool {
        self.value().is_finite()
    }
}

impl Scalar for f64 {
    fn from_f64(v: f64) -> Self {
        v
    }

    fn value(self) -> f64 {
        self
    }

    fn sin(self) -> Self {
        f64::sin(self)
    }

    fn cos(self) -> Self {
        f64::cos(self)
    }

    fn tan(self) -> Self {
        f64::tan(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn ln(self) -> Self {
        f64::ln(self)
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn powf(self, exponent: Self) -> Self {
        f64::powf(self, exponent)
    }

    fn powi(self, exponent: i32) -> Self {
        f64::powi(self, exponent)
    }
}

/// An autonomous vector field `x' = F(t, x)`.
///
/// `t` is passed through for the few models with explicit time
/// dependence (reinforcement schedules); purely autonomous fields
/// ignore it.
pub trait VectorField<T: Scalar> {
    /// Dimension of the state space.
    fn dimension(&self) -> usize;

    /// Writes `F(t, x)` into `out`. `out.len() == self.dimension()`.
    fn eval(&self, t: T, x: &[T], out: &mut [T]);
}

/// One fixed step of an explicit integration scheme.
pub trait Stepper<T: Scalar> {
    /// Advances `state` and `t` by a single step of size `dt`.
    fn step(&mut self, field: &impl VectorField<T>, t: &mut T, state: &mut [T], dt: T);
}
