//! Built-in systems, scenarios, and datasets offered by the
//! simulators. Everything here is constructed fresh per call so a
//! caller can freely mutate what it receives.

use crate::descriptor::SystemDescriptor;
use crate::lanchester::{AttritionLaw, CombatModel};
use crate::params::ParameterSet;
use crate::verhulst::Observation;
use nalgebra::Matrix2;

/// A named coefficient matrix illustrating one portrait type.
#[derive(Debug, Clone)]
pub struct LinearPreset {
    pub name: &'static str,
    pub matrix: Matrix2<f64>,
}

impl LinearPreset {
    pub fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::Linear {
            matrix: self.matrix,
        }
    }
}

/// One canonical matrix per portrait type.
pub fn linear_presets() -> Vec<LinearPreset> {
    vec![
        LinearPreset {
            name: "stable node",
            matrix: Matrix2::new(-1.0, 0.0, 0.0, -1.0),
        },
        LinearPreset {
            name: "unstable node",
            matrix: Matrix2::new(1.0, 0.0, 0.0, 1.0),
        },
        LinearPreset {
            name: "saddle",
            matrix: Matrix2::new(1.0, 0.0, 0.0, -1.0),
        },
        LinearPreset {
            name: "center",
            matrix: Matrix2::new(0.0, -1.0, 1.0, 0.0),
        },
        LinearPreset {
            name: "stable spiral",
            matrix: Matrix2::new(-1.0, -1.0, 1.0, -1.0),
        },
        LinearPreset {
            name: "unstable spiral",
            matrix: Matrix2::new(1.0, -1.0, 1.0, 1.0),
        },
    ]
}

/// A planar family with one tunable parameter.
#[derive(Debug, Clone)]
pub struct NonlinearPreset {
    pub name: &'static str,
    pub equations: [&'static str; 2],
    pub variables: [&'static str; 2],
    pub parameter: &'static str,
    /// Parameter values worth exploring, spanning the qualitative
    /// regimes of the family.
    pub suggested_values: &'static [f64],
}

impl NonlinearPreset {
    pub fn descriptor(&self, value: f64) -> SystemDescriptor {
        SystemDescriptor::Nonlinear {
            equations: self.equations.iter().map(|s| s.to_string()).collect(),
            variables: self.variables.iter().map(|s| s.to_string()).collect(),
            params: ParameterSet::new().with(self.parameter, value),
        }
    }
}

/// The normal form of the Hopf bifurcation. A stable limit cycle of
/// radius `sqrt(mu)` appears as `mu` crosses zero.
pub fn hopf() -> NonlinearPreset {
    NonlinearPreset {
        name: "Hopf normal form",
        equations: ["mu*x - y - x*(x^2 + y^2)", "x + mu*y - y*(x^2 + y^2)"],
        variables: ["x", "y"],
        parameter: "mu",
        suggested_values: &[-1.0, 0.0, 1.0],
    }
}

/// The Van der Pol oscillator; `mu` controls how strongly the limit
/// cycle distorts away from a circle.
pub fn van_der_pol() -> NonlinearPreset {
    NonlinearPreset {
        name: "Van der Pol oscillator",
        equations: ["y", "mu*(1 - x^2)*y - x"],
        variables: ["x", "y"],
        parameter: "mu",
        suggested_values: &[0.5, 1.0, 2.0],
    }
}

pub fn nonlinear_presets() -> Vec<NonlinearPreset> {
    vec![hopf(), van_der_pol()]
}

/// A ready-to-run engagement.
#[derive(Debug, Clone)]
pub struct CombatScenario {
    pub name: &'static str,
    pub model: CombatModel,
    pub blue: f64,
    pub red: f64,
    pub horizon: f64,
}

fn aimed_fire(alpha: f64, beta: f64) -> CombatModel {
    CombatModel {
        law: AttritionLaw::Quadratic,
        alpha,
        beta,
        fatigue_blue: 0.0,
        fatigue_red: 0.0,
        reinforcements_blue: None,
        reinforcements_red: None,
    }
}

pub fn combat_scenarios() -> Vec<CombatScenario> {
    vec![
        CombatScenario {
            name: "evenly matched",
            model: aimed_fire(0.01, 0.01),
            blue: 100.0,
            red: 100.0,
            horizon: 150.0,
        },
        CombatScenario {
            name: "blue fire superiority",
            model: aimed_fire(0.008, 0.015),
            blue: 120.0,
            red: 80.0,
            horizon: 100.0,
        },
        CombatScenario {
            name: "outnumbered with reinforcements",
            model: aimed_fire(0.01, 0.01).with_blue_reinforcements(2.0, 20.0),
            blue: 80.0,
            red: 100.0,
            horizon: 150.0,
        },
    ]
}

/// Observations of a population with a known carrying capacity.
#[derive(Debug, Clone)]
pub struct GrowthDataset {
    pub name: &'static str,
    pub capacity: f64,
    pub observations: Vec<Observation>,
}

pub fn growth_datasets() -> Vec<GrowthDataset> {
    vec![
        GrowthDataset {
            name: "rumor in a school",
            capacity: 1000.0,
            observations: vec![
                Observation { t: 0.0, p: 10.0 },
                Observation { t: 5.0, p: 50.0 },
                Observation { t: 10.0, p: 150.0 },
            ],
        },
        GrowthDataset {
            name: "epidemic outbreak",
            capacity: 5000.0,
            observations: vec![
                Observation { t: 0.0, p: 5.0 },
                Observation { t: 10.0, p: 100.0 },
                Observation { t: 20.0, p: 800.0 },
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::{combat_scenarios, growth_datasets, hopf, linear_presets, van_der_pol};
    use crate::lanchester::{outcome, simulate, Side};
    use crate::linear::classify;
    use crate::solvers::StepRule;
    use crate::verhulst::solve_growth_rate;

    #[test]
    fn linear_preset_names_match_their_classification() {
        for preset in linear_presets() {
            assert_eq!(classify(&preset.matrix).kind.label(), preset.name);
        }
    }

    #[test]
    fn hopf_below_the_bifurcation_decays_to_the_origin() {
        let descriptor = hopf().descriptor(-1.0);
        let trajectory = descriptor
            .integrate(&[0.5, 0.5], 0.0, 20.0, StepRule::Count(2000))
            .unwrap();
        let last = trajectory.last_state().unwrap();
        assert!((last[0].powi(2) + last[1].powi(2)).sqrt() < 1e-6);
    }

    #[test]
    fn hopf_above_the_bifurcation_settles_on_the_unit_cycle() {
        let descriptor = hopf().descriptor(1.0);
        let trajectory = descriptor
            .integrate(&[0.1, 0.0], 0.0, 40.0, StepRule::Count(4000))
            .unwrap();
        let last = trajectory.last_state().unwrap();
        let radius = (last[0].powi(2) + last[1].powi(2)).sqrt();
        assert!((radius - 1.0).abs() < 1e-4);
    }

    #[test]
    fn van_der_pol_sustains_oscillation() {
        let descriptor = van_der_pol().descriptor(1.0);
        let trajectory = descriptor
            .integrate(&[0.1, 0.0], 0.0, 50.0, StepRule::Count(5000))
            .unwrap();
        // The orbit grows away from the weak unstable focus instead of
        // dying out.
        let last = trajectory.last_state().unwrap();
        assert!((last[0].powi(2) + last[1].powi(2)).sqrt() > 1.0);
    }

    #[test]
    fn combat_scenarios_play_out_as_advertised() {
        let scenarios = combat_scenarios();
        let verdicts: Vec<_> = scenarios
            .iter()
            .map(|s| {
                let trajectory =
                    simulate(&s.model, s.blue, s.red, s.horizon, StepRule::Count(1500)).unwrap();
                outcome(&trajectory).winner
            })
            .collect();
        assert_eq!(verdicts, vec![None, Some(Side::Blue), Some(Side::Blue)]);
    }

    #[test]
    fn growth_datasets_admit_a_two_point_rate() {
        for dataset in growth_datasets() {
            let k = solve_growth_rate(
                dataset.capacity,
                dataset.observations[1],
                dataset.observations[2],
            )
            .unwrap();
            assert!(k > 0.0);
        }
    }
}
