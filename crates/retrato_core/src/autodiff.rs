use crate::traits::Scalar;
use num_traits::{Num, One, Zero};
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

/// Forward-mode dual number: `val + eps·ε` with `ε² = 0`.
///
/// Running any `Scalar`-generic code with one input's `eps` set to 1
/// yields that input's partial derivative in the `eps` part of the
/// result. Used for Jacobians of symbolic fields and for the parameter
/// sensitivities of the logistic fit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Dual {
    pub val: f64,
    pub eps: f64,
}

impl Dual {
    pub fn new(val: f64, eps: f64) -> Self {
        Self { val, eps }
    }

    /// A constant carries no derivative.
    pub fn constant(val: f64) -> Self {
        Self { val, eps: 0.0 }
    }

    /// The seed for differentiating with respect to this value.
    pub fn variable(val: f64) -> Self {
        Self { val, eps: 1.0 }
    }
}

impl Zero for Dual {
    fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    fn is_zero(&self) -> bool {
        self.val == 0.0 && self.eps == 0.0
    }
}

impl One for Dual {
    fn one() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl Add for Dual {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.val + rhs.val, self.eps + rhs.eps)
    }
}

impl Sub for Dual {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.val - rhs.val, self.eps - rhs.eps)
    }
}

impl Mul for Dual {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.val * rhs.val, self.val * rhs.eps + self.eps * rhs.val)
    }
}

impl Div for Dual {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        Self::new(
            self.val / rhs.val,
            (self.eps * rhs.val - self.val * rhs.eps) / (rhs.val * rhs.val),
        )
    }
}

impl Neg for Dual {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.val, -self.eps)
    }
}

impl Rem for Dual {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        // Derivative of rem is not meaningful here; keep the value only.
        Self::new(self.val % rhs.val, 0.0)
    }
}

impl Num for Dual {
    type FromStrRadixErr = ();

    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        f64::from_str_radix(str, radix)
            .map(Self::constant)
            .map_err(|_| ())
    }
}

impl Scalar for Dual {
    fn from_f64(v: f64) -> Self {
        Self::constant(v)
    }

    fn value(self) -> f64 {
        self.val
    }

    fn sin(self) -> Self {
        Self::new(self.val.sin(), self.eps * self.val.cos())
    }

    fn cos(self) -> Self {
        Self::new(self.val.cos(), -self.eps * self.val.sin())
    }

    fn tan(self) -> Self {
        let t = self.val.tan();
        Self::new(t, self.eps * (1.0 + t * t))
    }

    fn exp(self) -> Self {
        let e = self.val.exp();
        Self::new(e, e * self.eps)
    }

    fn ln(self) -> Self {
        Self::new(self.val.ln(), self.eps / self.val)
    }

    fn sqrt(self) -> Self {
        let s = self.val.sqrt();
        Self::new(s, self.eps / (2.0 * s))
    }

    fn abs(self) -> Self {
        Self::new(
            self.val.abs(),
            if self.val >= 0.0 { self.eps } else { -self.eps },
        )
    }

    fn powf(self, exponent: Self) -> Self {
        let v = self.val.powf(exponent.val);
        let base_term = exponent.val * self.val.powf(exponent.val - 1.0) * self.eps;
        if exponent.eps == 0.0 {
            // A constant exponent needs only the power rule; going
            // through ln would poison negative bases with NaN.
            Self::new(v, base_term)
        } else {
            Self::new(v, base_term + exponent.eps * self.val.ln() * v)
        }
    }

    fn powi(self, exponent: i32) -> Self {
        Self::new(
            self.val.powi(exponent),
            f64::from(exponent) * self.val.powi(exponent - 1) * self.eps,
        )
    }
}
