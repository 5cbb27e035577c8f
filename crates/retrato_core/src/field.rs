use crate::error::{EvalError, EvalResult};
use crate::traits::VectorField;
use serde::Serialize;

/// One arrow of a direction-field plot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSample {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
}

impl FieldSample {
    pub fn magnitude(&self) -> f64 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }
}

/// Samples a planar field on a regular grid for a quiver plot.
///
/// Grid points where the field evaluates to a non-finite value keep
/// their position with a zeroed direction, so a single singular corner
/// never voids the whole plot.
pub fn sample_grid<F: VectorField<f64>>(
    field: &F,
    x_range: (f64, f64),
    y_range: (f64, f64),
    nx: usize,
    ny: usize,
) -> EvalResult<Vec<FieldSample>> {
    if field.dimension() != 2 {
        return Err(EvalError::validation(format!(
            "grid sampling needs a planar field, got dimension {}",
            field.dimension()
        )));
    }
    if nx < 2 || ny < 2 {
        return Err(EvalError::validation("grid needs at least 2 samples per axis"));
    }
    for (lo, hi) in [x_range, y_range] {
        if !lo.is_finite() || !hi.is_finite() || hi <= lo {
            return Err(EvalError::validation(format!(
                "grid range [{lo}, {hi}] must be finite with hi > lo"
            )));
        }
    }

    let dx = (x_range.1 - x_range.0) / (nx - 1) as f64;
    let dy = (y_range.1 - y_range.0) / (ny - 1) as f64;
    let mut samples = Vec::with_capacity(nx * ny);
    let mut out = [0.0; 2];

    for j in 0..ny {
        let y = y_range.0 + dy * j as f64;
        for i in 0..nx {
            let x = x_range.0 + dx * i as f64;
            field.eval(0.0, &[x, y], &mut out);
            let finite = out.iter().all(|v| v.is_finite());
            samples.push(FieldSample {
                x,
                y,
                dx: if finite { out[0] } else { 0.0 },
                dy: if finite { out[1] } else { 0.0 },
            });
        }
    }
    Ok(samples)
}

/// Evenly spaced initial states on a circle, for launching a bundle of
/// trajectories around an equilibrium.
pub fn seed_ring(center: [f64; 2], radius: f64, count: usize) -> EvalResult<Vec<[f64; 2]>> {
    if !(radius > 0.0) || !radius.is_finite() {
        return Err(EvalError::validation(format!(
            "seed radius must be positive and finite, got {radius}"
        )));
    }
    if count == 0 {
        return Err(EvalError::validation("seed ring needs at least one point"));
    }
    let step = std::f64::consts::TAU / count as f64;
    Ok((0..count)
        .map(|i| {
            let angle = step * i as f64;
            [
                center[0] + radius * angle.cos(),
                center[1] + radius * angle.sin(),
            ]
        })
        .collect())
}
