use crate::traits::{Scalar, VectorField};
use nalgebra::Matrix2;
use num_complex::Complex;
use serde::Serialize;

/// Tolerance for the degenerate boundaries of the trace-determinant
/// plane. Exact zeros of `det` or `tr` rarely survive floating point,
/// so anything inside this band is treated as sitting on the boundary.
pub const EPS: f64 = 1e-9;

/// Qualitative type of the origin of a planar linear system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CriticalPointKind {
    StableNode,
    UnstableNode,
    Saddle,
    StableSpiral,
    UnstableSpiral,
    Center,
    /// A zero eigenvalue: a whole line of equilibria rather than an
    /// isolated critical point.
    Degenerate,
}

impl CriticalPointKind {
    /// Display label matching the classical portrait names.
    pub fn label(self) -> &'static str {
        match self {
            CriticalPointKind::StableNode => "stable node",
            CriticalPointKind::UnstableNode => "unstable node",
            CriticalPointKind::Saddle => "saddle",
            CriticalPointKind::StableSpiral => "stable spiral",
            CriticalPointKind::UnstableSpiral => "unstable spiral",
            CriticalPointKind::Center => "center",
            CriticalPointKind::Degenerate => "line of critical points",
        }
    }
}

/// Full classification of `x' = A x` at the origin.
#[derive(Debug, Clone, Serialize)]
pub struct LinearClassification {
    pub eigenvalues: [Complex<f64>; 2],
    /// Real eigenvectors, one per eigenvalue, when the eigenvalues are
    /// real. Complex pairs carry no real eigendirections worth drawing.
    pub eigenvectors: Option<[[f64; 2]; 2]>,
    pub trace: f64,
    pub determinant: f64,
    pub kind: CriticalPointKind,
}

/// Classifies the origin of `x' = A x` from the trace and determinant.
pub fn classify(a: &Matrix2<f64>) -> LinearClassification {
    let trace = a.trace();
    let determinant = a.determinant();
    let disc = trace * trace - 4.0 * determinant;

    let (eigenvalues, real) = if disc >= 0.0 {
        let root = disc.sqrt();
        (
            [
                Complex::new((trace + root) / 2.0, 0.0),
                Complex::new((trace - root) / 2.0, 0.0),
            ],
            true,
        )
    } else {
        let imag = (-disc).sqrt() / 2.0;
        (
            [
                Complex::new(trace / 2.0, imag),
                Complex::new(trace / 2.0, -imag),
            ],
            false,
        )
    };

    let kind = if determinant < -EPS {
        CriticalPointKind::Saddle
    } else if determinant.abs() <= EPS {
        CriticalPointKind::Degenerate
    } else if real {
        if trace < 0.0 {
            CriticalPointKind::StableNode
        } else {
            CriticalPointKind::UnstableNode
        }
    } else if trace.abs() <= EPS {
        CriticalPointKind::Center
    } else if trace < 0.0 {
        CriticalPointKind::StableSpiral
    } else {
        CriticalPointKind::UnstableSpiral
    };

    let eigenvectors = if real {
        Some([
            eigenvector(a, eigenvalues[0].re),
            eigenvector(a, eigenvalues[1].re),
        ])
    } else {
        None
    };

    LinearClassification {
        eigenvalues,
        eigenvectors,
        trace,
        determinant,
        kind,
    }
}

/// A real eigenvector of `A` for the real eigenvalue `lambda`.
///
/// `(A - λI) v = 0` gives `v = (a12, λ - a11)` from the first row, or
/// `(λ - a22, a21)` from the second when the first degenerates. A
/// diagonal matrix degenerates both ways and falls back to the axis
/// selected by whichever diagonal entry matches `lambda`.
fn eigenvector(a: &Matrix2<f64>, lambda: f64) -> [f64; 2] {
    let candidate = [a[(0, 1)], lambda - a[(0, 0)]];
    if norm(candidate) > EPS {
        return normalize(candidate);
    }
    let candidate = [lambda - a[(1, 1)], a[(1, 0)]];
    if norm(candidate) > EPS {
        return normalize(candidate);
    }
    if (lambda - a[(0, 0)]).abs() <= (lambda - a[(1, 1)]).abs() {
        [1.0, 0.0]
    } else {
        [0.0, 1.0]
    }
}

fn norm(v: [f64; 2]) -> f64 {
    (v[0] * v[0] + v[1] * v[1]).sqrt()
}

fn normalize(v: [f64; 2]) -> [f64; 2] {
    let n = norm(v);
    let v = [v[0] / n, v[1] / n];
    // Canonical sign: first nonzero component positive, so equal
    // matrices always report the same eigendirections.
    let lead = if v[0] != 0.0 { v[0] } else { v[1] };
    if lead < 0.0 {
        [-v[0], -v[1]]
    } else {
        v
    }
}

/// The autonomous field `x' = A x`, generic so dual numbers can flow
/// through it.
pub struct LinearField {
    a: [[f64; 2]; 2],
}

impl LinearField {
    pub fn new(a: Matrix2<f64>) -> Self {
        Self {
            a: [[a[(0, 0)], a[(0, 1)]], [a[(1, 0)], a[(1, 1)]]],
        }
    }

    pub fn matrix(&self) -> Matrix2<f64> {
        Matrix2::new(self.a[0][0], self.a[0][1], self.a[1][0], self.a[1][1])
    }
}

impl<T: Scalar> VectorField<T> for LinearField {
    fn dimension(&self) -> usize {
        2
    }

    fn eval(&self, _t: T, x: &[T], out: &mut [T]) {
        for row in 0..2 {
            out[row] =
                T::from_f64(self.a[row][0]) * x[0] + T::from_f64(self.a[row][1]) * x[1];
        }
    }
}
