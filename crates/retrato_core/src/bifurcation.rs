use crate::error::{EvalError, EvalResult};
use crate::traits::VectorField;
use serde::Serialize;

/// Stability tolerance for `f_x` at an equilibrium. Inside this band
/// the linearization is inconclusive and the branch point is neutral.
const STABILITY_EPS: f64 = 1e-9;

/// Minimum admissible parameter span for a scan.
const MIN_SPAN: f64 = 0.05;

/// The canonical one-dimensional bifurcation normal forms, plus the
/// logistic map in its continuous form. Each carries closed-form
/// equilibria, so branch diagrams never need a root finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BifurcationMap {
    /// `x' = r + x²`
    SaddleNode,
    /// `x' = r·x - x²`
    Transcritical,
    /// `x' = r·x - x³`
    Pitchfork,
    /// `x' = r·x + x³`
    SubcriticalPitchfork,
    /// `x' = r·x·(1 - x)`
    Logistic,
}

/// Stability of an equilibrium branch point, from the sign of `f_x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Stable,
    Unstable,
    /// `f_x` vanishes; the linearization decides nothing.
    Neutral,
}

impl BifurcationMap {
    pub fn label(self) -> &'static str {
        match self {
            BifurcationMap::SaddleNode => "saddle-node",
            BifurcationMap::Transcritical => "transcritical",
            BifurcationMap::Pitchfork => "supercritical pitchfork",
            BifurcationMap::SubcriticalPitchfork => "subcritical pitchfork",
            BifurcationMap::Logistic => "logistic",
        }
    }

    /// Right-hand side `f(r, x)`.
    pub fn f(self, r: f64, x: f64) -> f64 {
        match self {
            BifurcationMap::SaddleNode => r + x * x,
            BifurcationMap::Transcritical => r * x - x * x,
            BifurcationMap::Pitchfork => r * x - x * x * x,
            BifurcationMap::SubcriticalPitchfork => r * x + x * x * x,
            BifurcationMap::Logistic => r * x * (1.0 - x),
        }
    }

    /// Spatial derivative `∂f/∂x` evaluated at `(r, x)`.
    pub fn f_x(self, r: f64, x: f64) -> f64 {
        match self {
            BifurcationMap::SaddleNode => 2.0 * x,
            BifurcationMap::Transcritical => r - 2.0 * x,
            BifurcationMap::Pitchfork => r - 3.0 * x * x,
            BifurcationMap::SubcriticalPitchfork => r + 3.0 * x * x,
            BifurcationMap::Logistic => r * (1.0 - 2.0 * x),
        }
    }

    /// All real equilibria at the given parameter value.
    pub fn equilibria_at(self, r: f64) -> Vec<f64> {
        match self {
            BifurcationMap::SaddleNode => {
                if r < 0.0 {
                    let root = (-r).sqrt();
                    vec![-root, root]
                } else if r == 0.0 {
                    vec![0.0]
                } else {
                    Vec::new()
                }
            }
            BifurcationMap::Transcritical => {
                if r == 0.0 {
                    vec![0.0]
                } else {
                    vec![0.0, r]
                }
            }
            BifurcationMap::Pitchfork => {
                if r > 0.0 {
                    let root = r.sqrt();
                    vec![-root, 0.0, root]
                } else {
                    vec![0.0]
                }
            }
            BifurcationMap::SubcriticalPitchfork => {
                if r < 0.0 {
                    let root = (-r).sqrt();
                    vec![-root, 0.0, root]
                } else {
                    vec![0.0]
                }
            }
            BifurcationMap::Logistic => {
                if r == 0.0 {
                    vec![0.0]
                } else {
                    vec![0.0, 1.0]
                }
            }
        }
    }

    /// Stability of one equilibrium from the sign of `f_x`.
    pub fn stability(self, r: f64, x: f64) -> Phase {
        let slope = self.f_x(r, x);
        if slope < -STABILITY_EPS {
            Phase::Stable
        } else if slope > STABILITY_EPS {
            Phase::Unstable
        } else {
            Phase::Neutral
        }
    }

    /// Sweeps the parameter interval and yields every branch point
    /// inside the `x_range` viewport, lazily. With `steps` unset the
    /// resolution follows the span, so zooming in never starves the
    /// diagram of samples.
    pub fn scan(
        self,
        r_range: (f64, f64),
        x_range: (f64, f64),
        steps: Option<usize>,
    ) -> EvalResult<Scan> {
        for (lo, hi) in [r_range, x_range] {
            if !lo.is_finite() || !hi.is_finite() || hi <= lo {
                return Err(EvalError::validation(format!(
                    "scan range [{lo}, {hi}] must be finite with max > min"
                )));
            }
        }
        let span = r_range.1 - r_range.0;
        if span < MIN_SPAN {
            return Err(EvalError::validation(format!(
                "parameter span {span} is below the minimum {MIN_SPAN}"
            )));
        }
        let steps = match steps {
            Some(n) if n < 2 => {
                return Err(EvalError::validation("scan needs at least 2 samples"))
            }
            Some(n) => n,
            None => auto_steps(span),
        };
        Ok(Scan {
            map: self,
            r_min: r_range.0,
            dr: span / (steps - 1) as f64,
            x_range,
            steps,
            index: 0,
            pending: Vec::new(),
        })
    }
}

/// Sample resolution for a parameter span: roughly a hundred samples
/// per unit, clamped so tiny and huge spans both stay plottable.
pub fn auto_steps(span: f64) -> usize {
    ((span * 100.0).round() as usize).clamp(151, 801)
}

/// One equilibrium of the diagram at one parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BranchPoint {
    pub r: f64,
    pub x: f64,
    pub phase: Phase,
}

/// Lazy sweep over a parameter interval. Each parameter value can
/// contribute zero, one, or several branch points.
pub struct Scan {
    map: BifurcationMap,
    r_min: f64,
    dr: f64,
    x_range: (f64, f64),
    steps: usize,
    index: usize,
    pending: Vec<BranchPoint>,
}

impl Iterator for Scan {
    type Item = BranchPoint;

    fn next(&mut self) -> Option<BranchPoint> {
        loop {
            if let Some(point) = self.pending.pop() {
                return Some(point);
            }
            if self.index >= self.steps {
                return None;
            }
            let r = self.r_min + self.dr * self.index as f64;
            self.index += 1;
            self.pending.extend(
                self.map
                    .equilibria_at(r)
                    .into_iter()
                    .filter(|&x| x >= self.x_range.0 && x <= self.x_range.1)
                    .map(|x| BranchPoint {
                        r,
                        x,
                        phase: self.map.stability(r, x),
                    }),
            );
        }
    }
}

/// The map frozen at one parameter value, usable as a one-dimensional
/// field for time-series integration.
pub struct FrozenMap {
    pub map: BifurcationMap,
    pub r: f64,
}

impl VectorField<f64> for FrozenMap {
    fn dimension(&self) -> usize {
        1
    }

    fn eval(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        out[0] = self.map.f(self.r, x[0]);
    }
}

#[cfg(test)]
mod tests {
    use super::{auto_steps, BifurcationMap, FrozenMap, Phase};
    use crate::solvers::{integrate, StepRule};
    use crate::error::EvalError;

    #[test]
    fn saddle_node_has_no_equilibria_past_the_fold() {
        assert!(BifurcationMap::SaddleNode.equilibria_at(0.5).is_empty());
        let pair = BifurcationMap::SaddleNode.equilibria_at(-4.0);
        assert_eq!(pair, vec![-2.0, 2.0]);
        assert_eq!(BifurcationMap::SaddleNode.stability(-4.0, -2.0), Phase::Stable);
        assert_eq!(BifurcationMap::SaddleNode.stability(-4.0, 2.0), Phase::Unstable);
    }

    #[test]
    fn transcritical_branches_exchange_stability() {
        let map = BifurcationMap::Transcritical;
        assert_eq!(map.stability(-1.0, 0.0), Phase::Stable);
        assert_eq!(map.stability(-1.0, -1.0), Phase::Unstable);
        assert_eq!(map.stability(1.0, 0.0), Phase::Unstable);
        assert_eq!(map.stability(1.0, 1.0), Phase::Stable);
    }

    #[test]
    fn pitchfork_grows_a_stable_pair() {
        let map = BifurcationMap::Pitchfork;
        assert_eq!(map.equilibria_at(-1.0), vec![0.0]);
        let branches = map.equilibria_at(4.0);
        assert_eq!(branches, vec![-2.0, 0.0, 2.0]);
        assert_eq!(map.stability(4.0, 2.0), Phase::Stable);
        assert_eq!(map.stability(4.0, -2.0), Phase::Stable);
        assert_eq!(map.stability(4.0, 0.0), Phase::Unstable);
    }

    #[test]
    fn subcritical_pair_is_unstable() {
        let map = BifurcationMap::SubcriticalPitchfork;
        assert_eq!(map.stability(-4.0, 2.0), Phase::Unstable);
        assert_eq!(map.stability(-4.0, 0.0), Phase::Stable);
    }

    #[test]
    fn neutral_phase_at_the_bifurcation_point() {
        assert_eq!(BifurcationMap::Pitchfork.stability(0.0, 0.0), Phase::Neutral);
        assert_eq!(BifurcationMap::SaddleNode.stability(0.0, 0.0), Phase::Neutral);
    }

    #[test]
    fn scan_resolution_follows_the_span() {
        assert_eq!(auto_steps(0.05), 151);
        assert_eq!(auto_steps(3.0), 300);
        assert_eq!(auto_steps(100.0), 801);
    }

    #[test]
    fn scan_covers_the_interval_inclusively() {
        let points: Vec<_> = BifurcationMap::Logistic
            .scan((-1.0, 1.0), (-2.0, 2.0), Some(5))
            .unwrap()
            .collect();
        // 5 parameter values, two branches each except r = 0.
        assert_eq!(points.len(), 9);
        assert_eq!(points.first().unwrap().r, -1.0);
        assert_eq!(points.last().unwrap().r, 1.0);
    }

    #[test]
    fn scan_clips_branches_to_the_viewport() {
        // At r = 4 the pitchfork branches sit at -2, 0, 2; a narrow
        // window keeps only the trivial branch.
        let points: Vec<_> = BifurcationMap::Pitchfork
            .scan((3.9, 4.0), (-0.5, 0.5), Some(3))
            .unwrap()
            .collect();
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.x == 0.0));
    }

    #[test]
    fn narrow_spans_are_rejected() {
        assert!(matches!(
            BifurcationMap::Pitchfork.scan((0.0, 0.01), (-1.0, 1.0), None),
            Err(EvalError::Validation(_))
        ));
        assert!(matches!(
            BifurcationMap::Pitchfork.scan((1.0, 0.0), (-1.0, 1.0), None),
            Err(EvalError::Validation(_))
        ));
        assert!(matches!(
            BifurcationMap::Pitchfork.scan((0.0, 1.0), (1.0, -1.0), None),
            Err(EvalError::Validation(_))
        ));
    }

    #[test]
    fn frozen_map_relaxes_onto_the_stable_branch() {
        // r·x - x³ with r = 1 pulls positive starts toward x = 1.
        let field = FrozenMap {
            map: BifurcationMap::Pitchfork,
            r: 1.0,
        };
        let trajectory = integrate(&field, &[0.1], 0.0, 20.0, StepRule::Count(400)).unwrap();
        assert!((trajectory.last_state().unwrap()[0] - 1.0).abs() < 1e-6);
    }
}
