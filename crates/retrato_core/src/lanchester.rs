use crate::error::{EvalError, EvalResult};
use crate::params::ParameterSet;
use crate::solvers::{integrate, StepRule};
use crate::trajectory::Trajectory;
use crate::traits::VectorField;
use serde::Serialize;

/// A force counts as annihilated once it drops below one combatant.
pub const ANNIHILATION_THRESHOLD: f64 = 1.0;

/// How casualties scale with the opposing force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttritionLaw {
    /// Unaimed fire: losses proportional to both force sizes.
    /// `B' = -α·B·R`, `R' = -β·B·R`
    Linear,
    /// Aimed fire: losses proportional to the opposing force alone.
    /// `B' = -α·R`, `R' = -β·B`
    Quadratic,
    /// Asymmetric engagement: blue under aimed fire, red ambushed.
    /// `B' = -α·R`, `R' = -β·B·R`
    Mixed,
}

/// Scheduled arrival of fresh troops at a constant rate.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Reinforcement {
    /// Combatants per unit time.
    pub rate: f64,
    /// Time at which the flow starts.
    pub start: f64,
}

/// Two-force combat model with optional fatigue and reinforcements.
#[derive(Debug, Clone, Serialize)]
pub struct CombatModel {
    pub law: AttritionLaw,
    /// Effectiveness of red fire against blue.
    pub alpha: f64,
    /// Effectiveness of blue fire against red.
    pub beta: f64,
    pub fatigue_blue: f64,
    pub fatigue_red: f64,
    pub reinforcements_blue: Option<Reinforcement>,
    pub reinforcements_red: Option<Reinforcement>,
}

impl CombatModel {
    pub fn new(law: AttritionLaw, alpha: f64, beta: f64) -> EvalResult<Self> {
        if !(alpha > 0.0) || !(beta > 0.0) {
            return Err(EvalError::validation(format!(
                "effectiveness coefficients must be positive, got alpha = {alpha}, beta = {beta}"
            )));
        }
        Ok(Self {
            law,
            alpha,
            beta,
            fatigue_blue: 0.0,
            fatigue_red: 0.0,
            reinforcements_blue: None,
            reinforcements_red: None,
        })
    }

    /// Builds a model from named parameters: `alpha` and `beta` are
    /// required, `fatigue_blue` and `fatigue_red` default to zero, and
    /// a `reinforce_*_rate` brings its side's schedule into play with
    /// `reinforce_*_start` defaulting to zero.
    pub fn from_params(law: AttritionLaw, params: &ParameterSet) -> EvalResult<Self> {
        let mut model = Self::new(
            law,
            params.get_positive("alpha")?,
            params.get_positive("beta")?,
        )?;
        model.fatigue_blue = params.get_or("fatigue_blue", 0.0);
        model.fatigue_red = params.get_or("fatigue_red", 0.0);
        let blue_rate = params.get_or("reinforce_blue_rate", 0.0);
        if blue_rate > 0.0 {
            model.reinforcements_blue = Some(Reinforcement {
                rate: blue_rate,
                start: params.get_or("reinforce_blue_start", 0.0),
            });
        }
        let red_rate = params.get_or("reinforce_red_rate", 0.0);
        if red_rate > 0.0 {
            model.reinforcements_red = Some(Reinforcement {
                rate: red_rate,
                start: params.get_or("reinforce_red_start", 0.0),
            });
        }
        Ok(model)
    }

    pub fn with_fatigue(mut self, blue: f64, red: f64) -> Self {
        self.fatigue_blue = blue;
        self.fatigue_red = red;
        self
    }

    pub fn with_blue_reinforcements(mut self, rate: f64, start: f64) -> Self {
        self.reinforcements_blue = Some(Reinforcement { rate, start });
        self
    }

    pub fn with_red_reinforcements(mut self, rate: f64, start: f64) -> Self {
        self.reinforcements_red = Some(Reinforcement { rate, start });
        self
    }
}

impl VectorField<f64> for CombatModel {
    fn dimension(&self) -> usize {
        2
    }

    fn eval(&self, t: f64, x: &[f64], out: &mut [f64]) {
        // An annihilated force neither fires nor takes losses.
        let b = x[0].max(0.0);
        let r = x[1].max(0.0);

        let (db, dr) = match self.law {
            AttritionLaw::Linear => (-self.alpha * b * r, -self.beta * b * r),
            AttritionLaw::Quadratic => (-self.alpha * r, -self.beta * b),
            AttritionLaw::Mixed => (-self.alpha * r, -self.beta * b * r),
        };

        out[0] = db - self.fatigue_blue * b;
        out[1] = dr - self.fatigue_red * r;

        if let Some(reinforcement) = self.reinforcements_blue {
            if t >= reinforcement.start {
                out[0] += reinforcement.rate;
            }
        }
        if let Some(reinforcement) = self.reinforcements_red {
            if t >= reinforcement.start {
                out[1] += reinforcement.rate;
            }
        }
    }
}

/// Integrates an engagement from `t = 0` with the given starting
/// strengths.
pub fn simulate(
    model: &CombatModel,
    blue: f64,
    red: f64,
    t_end: f64,
    rule: StepRule,
) -> EvalResult<Trajectory> {
    if !(blue >= 0.0) || !(red >= 0.0) {
        return Err(EvalError::validation(format!(
            "starting strengths must not be negative, got blue = {blue}, red = {red}"
        )));
    }
    integrate(model, &[blue, red], 0.0, t_end, rule)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Blue,
    Red,
}

/// Verdict of an engagement read off the final trajectory samples.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Outcome {
    /// The surviving side, if exactly one force was annihilated.
    pub winner: Option<Side>,
    pub final_blue: f64,
    pub final_red: f64,
    /// First sample time at which the losing side fell below the
    /// annihilation threshold.
    pub decided_at: Option<f64>,
}

/// Reads the verdict off a combat trajectory.
pub fn outcome(trajectory: &Trajectory) -> Outcome {
    let last = trajectory.last_state().unwrap_or(&[0.0, 0.0]);
    let (final_blue, final_red) = (last[0], last[1]);

    let blue_out = final_blue < ANNIHILATION_THRESHOLD;
    let red_out = final_red < ANNIHILATION_THRESHOLD;
    let winner = match (blue_out, red_out) {
        (false, true) => Some(Side::Blue),
        (true, false) => Some(Side::Red),
        _ => None,
    };

    let decided_at = winner.and_then(|side| {
        let losing = match side {
            Side::Blue => 1,
            Side::Red => 0,
        };
        trajectory
            .iter()
            .find(|(_, state)| state[losing] < ANNIHILATION_THRESHOLD)
            .map(|(t, _)| t)
    });

    Outcome {
        winner,
        final_blue,
        final_red,
        decided_at,
    }
}
