use crate::autodiff::Dual;
use crate::expr::SymbolicField;
use crate::linear::{classify, LinearClassification};
use crate::traits::VectorField;
use anyhow::{bail, ensure, Result};
use nalgebra::{Matrix2, Vector2};

/// Knobs for the damped Newton iteration.
#[derive(Debug, Clone, Copy)]
pub struct NewtonSettings {
    pub max_steps: usize,
    /// Fraction of the Newton step to take, in `(0, 1]`.
    pub damping: f64,
    /// Residual norm below which a point counts as an equilibrium.
    pub tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            damping: 1.0,
            tolerance: 1e-9,
        }
    }
}

/// An equilibrium of a planar field together with its linearization.
#[derive(Debug, Clone)]
pub struct Equilibrium {
    pub position: [f64; 2],
    pub classification: LinearClassification,
}

/// Jacobian of a planar symbolic field at `x`, one dual pass per
/// column.
pub fn jacobian(field: &SymbolicField<f64>, x: [f64; 2]) -> Result<Matrix2<f64>> {
    ensure!(
        field.dimension() == 2,
        "Jacobian requires a planar field, got dimension {}",
        field.dimension()
    );
    let dual = field.to_dual();
    let t = Dual::constant(0.0);
    let mut out = [Dual::constant(0.0); 2];
    let mut j = Matrix2::zeros();
    for col in 0..2 {
        let state = [
            if col == 0 {
                Dual::variable(x[0])
            } else {
                Dual::constant(x[0])
            },
            if col == 1 {
                Dual::variable(x[1])
            } else {
                Dual::constant(x[1])
            },
        ];
        dual.eval(t, &state, &mut out);
        j[(0, col)] = out[0].eps;
        j[(1, col)] = out[1].eps;
    }
    Ok(j)
}

/// Refines a guess into an equilibrium by damped Newton iteration.
pub fn refine(
    field: &SymbolicField<f64>,
    guess: [f64; 2],
    settings: &NewtonSettings,
) -> Result<[f64; 2]> {
    ensure!(
        field.dimension() == 2,
        "equilibrium search requires a planar field, got dimension {}",
        field.dimension()
    );
    ensure!(
        settings.damping > 0.0 && settings.damping <= 1.0,
        "damping must lie in (0, 1], got {}",
        settings.damping
    );

    let mut x = Vector2::new(guess[0], guess[1]);
    let mut f = [0.0; 2];
    for _ in 0..settings.max_steps {
        field.eval(0.0, x.as_slice(), &mut f);
        let residual = Vector2::new(f[0], f[1]);
        if !residual.norm().is_finite() {
            bail!("field is not finite at ({}, {})", x[0], x[1]);
        }
        if residual.norm() < settings.tolerance {
            return Ok([x[0], x[1]]);
        }
        let j = jacobian(field, [x[0], x[1]])?;
        let Some(inverse) = j.try_inverse() else {
            bail!("singular Jacobian at ({}, {})", x[0], x[1]);
        };
        x -= settings.damping * (inverse * residual);
    }

    field.eval(0.0, x.as_slice(), &mut f);
    if Vector2::new(f[0], f[1]).norm() < settings.tolerance {
        Ok([x[0], x[1]])
    } else {
        bail!(
            "Newton iteration did not converge within {} steps",
            settings.max_steps
        );
    }
}

/// Classifies an equilibrium through the eigenstructure of its
/// Jacobian.
pub fn classify_at(field: &SymbolicField<f64>, position: [f64; 2]) -> Result<LinearClassification> {
    Ok(classify(&jacobian(field, position)?))
}

/// Scans a rectangle with a grid of Newton seeds and collects the
/// distinct equilibria that converge into it.
///
/// Seeds that diverge, leave the rectangle, or hit a singular Jacobian
/// are dropped silently; a rectangle with no equilibria yields an
/// empty list, not an error.
pub fn find_equilibria(
    field: &SymbolicField<f64>,
    x_range: (f64, f64),
    y_range: (f64, f64),
    resolution: usize,
    settings: &NewtonSettings,
) -> Result<Vec<Equilibrium>> {
    ensure!(resolution >= 2, "seed grid needs at least 2 points per axis");
    for (lo, hi) in [x_range, y_range] {
        ensure!(
            lo.is_finite() && hi.is_finite() && hi > lo,
            "search range [{lo}, {hi}] must be finite with hi > lo"
        );
    }

    let dx = (x_range.1 - x_range.0) / (resolution - 1) as f64;
    let dy = (y_range.1 - y_range.0) / (resolution - 1) as f64;
    // Duplicates within this radius are one equilibrium.
    let merge_radius = settings.tolerance.sqrt().max(1e-8);

    let mut found: Vec<[f64; 2]> = Vec::new();
    for j in 0..resolution {
        for i in 0..resolution {
            let seed = [x_range.0 + dx * i as f64, y_range.0 + dy * j as f64];
            let Ok(position) = refine(field, seed, settings) else {
                continue;
            };
            if position[0] < x_range.0
                || position[0] > x_range.1
                || position[1] < y_range.0
                || position[1] > y_range.1
            {
                continue;
            }
            let duplicate = found.iter().any(|p| {
                ((p[0] - position[0]).powi(2) + (p[1] - position[1]).powi(2)).sqrt()
                    < merge_radius
            });
            if !duplicate {
                found.push(position);
            }
        }
    }

    found.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    found
        .into_iter()
        .map(|position| {
            Ok(Equilibrium {
                classification: classify_at(field, position)?,
                position,
            })
        })
        .collect()
}
