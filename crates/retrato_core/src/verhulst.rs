use crate::autodiff::Dual;
use crate::error::{EvalError, EvalResult};
use crate::traits::Scalar;
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

/// One population measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub t: f64,
    pub p: f64,
}

/// Closed-form logistic solution, generic so dual numbers can carry
/// parameter sensitivities through it.
///
/// `P(t) = N / (1 + C·e^(-k·N·t))` with `C = (N - P0) / P0`.
fn logistic_model<T: Scalar>(t: T, p0: T, k: T, n: T) -> T {
    let c = (n - p0) / p0;
    n / (T::one() + c * (-(k * n * t)).exp())
}

/// Population at time `t` under logistic growth.
pub fn logistic(t: f64, p0: f64, k: f64, n: f64) -> EvalResult<f64> {
    validate_parameters(p0, k, n)?;
    Ok(logistic_model(t, p0, k, n))
}

fn validate_parameters(p0: f64, k: f64, n: f64) -> EvalResult<()> {
    if !(n > 0.0) || !n.is_finite() {
        return Err(EvalError::validation(format!(
            "carrying capacity must be positive and finite, got {n}"
        )));
    }
    if !(p0 > 0.0) || !p0.is_finite() {
        return Err(EvalError::validation(format!(
            "initial population must be positive and finite, got {p0}"
        )));
    }
    if !(k > 0.0) || !k.is_finite() {
        return Err(EvalError::validation(format!(
            "growth rate must be positive and finite, got {k}"
        )));
    }
    Ok(())
}

/// Solves for the growth rate from two observations of a population
/// with known carrying capacity:
///
/// `k = ln[((N - P1)/P1) / ((N - P2)/P2)] / (N·(t2 - t1))`
pub fn solve_growth_rate(n: f64, first: Observation, second: Observation) -> EvalResult<f64> {
    if !(n > 0.0) || !n.is_finite() {
        return Err(EvalError::validation(format!(
            "carrying capacity must be positive and finite, got {n}"
        )));
    }
    if second.t <= first.t {
        return Err(EvalError::observations(format!(
            "observation times must increase, got t1 = {} and t2 = {}",
            first.t, second.t
        )));
    }
    for obs in [first, second] {
        if !(obs.p > 0.0) || obs.p >= n {
            return Err(EvalError::observations(format!(
                "population {} at t = {} must lie strictly between 0 and the capacity {n}",
                obs.p, obs.t
            )));
        }
    }
    if second.p <= first.p {
        return Err(EvalError::observations(format!(
            "population must grow between observations, got {} then {}",
            first.p, second.p
        )));
    }
    let ratio = ((n - first.p) / first.p) / ((n - second.p) / second.p);
    Ok(ratio.ln() / (n * (second.t - first.t)))
}

/// Time at which the population reaches half the carrying capacity.
pub fn half_capacity_time(p0: f64, k: f64, n: f64) -> EvalResult<f64> {
    time_to_fraction(p0, k, n, 0.5)
}

/// Time at which the population reaches `fraction·N`. Only defined for
/// fractions above the starting level and strictly below saturation.
pub fn time_to_fraction(p0: f64, k: f64, n: f64, fraction: f64) -> EvalResult<f64> {
    validate_parameters(p0, k, n)?;
    if !(fraction > 0.0) || fraction >= 1.0 {
        return Err(EvalError::validation(format!(
            "fraction must lie in (0, 1), got {fraction}"
        )));
    }
    let target = fraction * n;
    if target <= p0 {
        return Err(EvalError::validation(format!(
            "target population {target} is already reached at t = 0 (P0 = {p0})"
        )));
    }
    let c = (n - p0) / p0;
    Ok((c / (n / target - 1.0)).ln() / (k * n))
}

/// Result of fitting the logistic curve to observations.
#[derive(Debug, Clone, Serialize)]
pub struct LogisticFit {
    pub k: f64,
    pub n: f64,
    pub p0: f64,
    /// Root-mean-square residual at the fitted parameters.
    pub residual: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FitSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub initial_damping: f64,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
            initial_damping: 1e-3,
        }
    }
}

/// Fits `k` and `N` to observations by Levenberg-Marquardt, with the
/// initial population pinned to the first observation.
///
/// Sensitivities come from dual-number passes over the model rather
/// than finite differences. Seeds: the capacity starts at 1.5 times
/// the largest observed population, the rate at the two-point solution
/// over the seed capacity when one exists.
pub fn fit_logistic(observations: &[Observation], settings: FitSettings) -> EvalResult<LogisticFit> {
    if observations.len() < 3 {
        return Err(EvalError::observations(format!(
            "fit needs at least 3 observations, got {}",
            observations.len()
        )));
    }
    for obs in observations {
        if !obs.t.is_finite() || !obs.p.is_finite() || obs.p <= 0.0 {
            return Err(EvalError::observations(format!(
                "observation (t = {}, p = {}) must be finite with p > 0",
                obs.t, obs.p
            )));
        }
    }
    for pair in observations.windows(2) {
        if pair[1].t <= pair[0].t {
            return Err(EvalError::observations(
                "observation times must strictly increase",
            ));
        }
    }

    let p0 = observations[0].p;
    let max_p = observations
        .iter()
        .map(|o| o.p)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut n = 1.5 * max_p;
    let mut k = solve_growth_rate(n, observations[1], observations[observations.len() - 1])
        .unwrap_or(1e-3);
    let mut lambda = settings.initial_damping;
    let mut ssr = sum_of_squares(observations, p0, k, n);

    for iteration in 1..=settings.max_iterations {
        let mut jtj: Matrix2<f64> = Matrix2::zeros();
        let mut jtr: Vector2<f64> = Vector2::zeros();
        for obs in observations {
            let residual = logistic_model(obs.t, p0, k, n) - obs.p;
            let dk = logistic_model(
                Dual::constant(obs.t),
                Dual::constant(p0),
                Dual::variable(k),
                Dual::constant(n),
            )
            .eps;
            let dn = logistic_model(
                Dual::constant(obs.t),
                Dual::constant(p0),
                Dual::constant(k),
                Dual::variable(n),
            )
            .eps;
            jtj[(0, 0)] += dk * dk;
            jtj[(0, 1)] += dk * dn;
            jtj[(1, 1)] += dn * dn;
            jtr[0] += dk * residual;
            jtr[1] += dn * residual;
        }
        jtj[(1, 0)] = jtj[(0, 1)];

        let mut damped = jtj;
        damped[(0, 0)] += lambda * jtj[(0, 0)].max(1e-12);
        damped[(1, 1)] += lambda * jtj[(1, 1)].max(1e-12);

        let Some(inverse) = damped.try_inverse() else {
            lambda *= 10.0;
            continue;
        };
        let delta = -(inverse * jtr);
        let k_next = k + delta[0];
        let n_next = n + delta[1];

        // The capacity must stay above every observation and the rate
        // positive, otherwise the model leaves its domain.
        if !(k_next > 0.0) || n_next <= max_p {
            lambda *= 10.0;
            continue;
        }

        let ssr_next = sum_of_squares(observations, p0, k_next, n_next);
        if ssr_next.is_finite() && ssr_next < ssr {
            let step = (delta[0] * delta[0] + delta[1] * delta[1]).sqrt();
            let scale = 1.0 + (k * k + n * n).sqrt();
            let improvement = (ssr - ssr_next) / ssr.max(f64::MIN_POSITIVE);
            k = k_next;
            n = n_next;
            ssr = ssr_next;
            lambda = (lambda / 10.0).max(1e-12);
            if step < settings.tolerance * scale || improvement < settings.tolerance {
                return Ok(LogisticFit {
                    k,
                    n,
                    p0,
                    residual: (ssr / observations.len() as f64).sqrt(),
                    iterations: iteration,
                });
            }
        } else {
            lambda *= 10.0;
        }
    }

    Err(EvalError::FitDidNotConverge {
        iterations: settings.max_iterations,
        residual: (ssr / observations.len() as f64).sqrt(),
    })
}

fn sum_of_squares(observations: &[Observation], p0: f64, k: f64, n: f64) -> f64 {
    observations
        .iter()
        .map(|obs| {
            let r = logistic_model(obs.t, p0, k, n) - obs.p;
            r * r
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::{
        fit_logistic, half_capacity_time, logistic, solve_growth_rate, time_to_fraction,
        FitSettings, Observation,
    };
    use crate::error::EvalError;

    fn obs(t: f64, p: f64) -> Observation {
        Observation { t, p }
    }

    #[test]
    fn starts_at_p0_and_saturates_at_the_capacity() {
        let (p0, k, n) = (10.0, 2.4e-4, 1000.0);
        assert!((logistic(0.0, p0, k, n).unwrap() - p0).abs() < 1e-12);
        assert!((logistic(1e5, p0, k, n).unwrap() - n).abs() < 1e-6);
        // Strictly increasing along the way.
        let early = logistic(5.0, p0, k, n).unwrap();
        let later = logistic(10.0, p0, k, n).unwrap();
        assert!(p0 < early && early < later && later < n);
    }

    #[test]
    fn two_point_rate_for_the_school_rumor_data() {
        let k = solve_growth_rate(1000.0, obs(5.0, 50.0), obs(10.0, 150.0)).unwrap();
        assert!((k - 2.419676e-4).abs() < 1e-9);
    }

    #[test]
    fn non_increasing_observations_are_rejected() {
        assert!(matches!(
            solve_growth_rate(1000.0, obs(5.0, 150.0), obs(10.0, 150.0)),
            Err(EvalError::InvalidObservations(_))
        ));
        assert!(matches!(
            solve_growth_rate(1000.0, obs(10.0, 50.0), obs(5.0, 150.0)),
            Err(EvalError::InvalidObservations(_))
        ));
        assert!(matches!(
            solve_growth_rate(1000.0, obs(5.0, 50.0), obs(10.0, 1200.0)),
            Err(EvalError::InvalidObservations(_))
        ));
    }

    #[test]
    fn half_capacity_time_hits_half_the_capacity() {
        let (p0, k, n) = (10.0, 2.419676e-4, 1000.0);
        let t = half_capacity_time(p0, k, n).unwrap();
        assert!((logistic(t, p0, k, n).unwrap() - n / 2.0).abs() < 1e-9);
        // Reaching 90% takes longer than reaching 50%.
        let t90 = time_to_fraction(p0, k, n, 0.9).unwrap();
        assert!(t90 > t);
        assert!((logistic(t90, p0, k, n).unwrap() - 0.9 * n).abs() < 1e-9);
    }

    #[test]
    fn unreachable_fractions_are_rejected() {
        assert!(time_to_fraction(600.0, 1e-4, 1000.0, 0.5).is_err());
        assert!(time_to_fraction(10.0, 1e-4, 1000.0, 1.0).is_err());
    }

    #[test]
    fn fit_recovers_synthetic_parameters() {
        let (p0, k, n) = (5.0, 1.6e-4, 5000.0);
        let observations: Vec<Observation> = [0.0, 5.0, 10.0, 15.0, 20.0, 30.0, 40.0]
            .iter()
            .map(|&t| obs(t, logistic(t, p0, k, n).unwrap()))
            .collect();
        let fit = fit_logistic(&observations, FitSettings::default()).unwrap();
        assert!((fit.k - k).abs() / k < 1e-3);
        assert!((fit.n - n).abs() / n < 1e-3);
        assert_eq!(fit.p0, p0);
        assert!(fit.residual < 1e-3);
    }

    #[test]
    fn exhausted_budget_reports_non_convergence() {
        let observations = vec![obs(0.0, 10.0), obs(5.0, 50.0), obs(10.0, 150.0)];
        let settings = FitSettings {
            max_iterations: 1,
            tolerance: 1e-16,
            ..FitSettings::default()
        };
        match fit_logistic(&observations, settings) {
            Err(EvalError::FitDidNotConverge { iterations, .. }) => assert_eq!(iterations, 1),
            other => panic!("expected a convergence failure, got {other:?}"),
        }
    }

    #[test]
    fn too_few_observations_are_rejected() {
        let observations = vec![obs(0.0, 10.0), obs(5.0, 50.0)];
        assert!(matches!(
            fit_logistic(&observations, FitSettings::default()),
            Err(EvalError::InvalidObservations(_))
        ));
    }
}
