//! Adaptive ODE integration for population dynamics.
//!
//! Implements the Dormand-Prince 5(4) embedded Runge-Kutta pair with
//! first-same-as-last stages, a scaled RMS error norm and a standard
//! step-size controller. Output is either every accepted step or a caller
//! supplied set of times, filled by cubic Hermite interpolation between
//! accepted steps.
//!
//! Reference: Hairer, Nørsett & Wanner, Solving Ordinary Differential
//! Equations I, 2nd ed., Springer 1993, §II.4-II.5

use serde::{Deserialize, Serialize};

use crate::error::{IntegrationFailure, Result, SimError};

// Butcher tableau
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// 5th-order weights minus embedded 4th-order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Configuration for the adaptive integrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// Initial step; chosen automatically when `None`
    pub first_step: Option<f64>,
    /// Upper bound on the step size; unbounded when `None`
    pub max_step: Option<f64>,
    /// Steps smaller than this abort the integration
    pub min_step: f64,
    /// Budget of attempted (accepted + rejected) steps
    pub max_steps: usize,
    /// Lower bound applied to accepted states (prevents negative populations)
    pub floor: Option<f64>,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            first_step: None,
            max_step: None,
            min_step: 1e-12,
            max_steps: 100_000,
            floor: Some(0.0),
        }
    }
}

impl IntegratorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(SimError::config("rtol must be positive"));
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            return Err(SimError::config("atol must be positive"));
        }
        if let Some(h) = self.first_step {
            if !(h.is_finite() && h > 0.0) {
                return Err(SimError::config("first_step must be positive"));
            }
        }
        if let Some(h) = self.max_step {
            if !(h > 0.0) {
                return Err(SimError::config("max_step must be positive"));
            }
        }
        if !(self.min_step.is_finite() && self.min_step >= 0.0) {
            return Err(SimError::config("min_step must be non-negative"));
        }
        if self.max_steps == 0 {
            return Err(SimError::config("max_steps must be positive"));
        }
        if let Some(floor) = self.floor {
            if !floor.is_finite() {
                return Err(SimError::config("floor must be finite"));
            }
        }
        Ok(())
    }
}

/// Time-indexed samples of the state vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<Vec<f64>>,
}

impl Trajectory {
    pub fn push(&mut self, t: f64, y: Vec<f64>) {
        self.times.push(t);
        self.states.push(y);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn final_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    pub fn final_state(&self) -> Option<&[f64]> {
        self.states.last().map(|y| y.as_slice())
    }

    /// Smallest value of any component at any sample.
    pub fn min_value(&self) -> f64 {
        self.states
            .iter()
            .flat_map(|y| y.iter())
            .cloned()
            .fold(f64::INFINITY, f64::min)
    }
}

/// Dormand-Prince 5(4) adaptive integrator
///
/// Solves dy/dt = f(t, y) over a closed time span. The right-hand side may
/// fail; the failure is returned together with the trajectory so far.
pub struct DormandPrince {
    /// Configuration
    pub config: IntegratorConfig,
    /// Accepted steps in the last run
    pub accepted_steps: usize,
    /// Rejected steps in the last run
    pub rejected_steps: usize,
    /// Right-hand-side evaluations in the last run
    pub evaluations: usize,
    /// Stage derivatives k1..k7
    k: [Vec<f64>; 7],
    y_stage: Vec<f64>,
    y_new: Vec<f64>,
}

impl DormandPrince {
    pub fn new(config: IntegratorConfig) -> Self {
        Self {
            config,
            accepted_steps: 0,
            rejected_steps: 0,
            evaluations: 0,
            k: Default::default(),
            y_stage: Vec::new(),
            y_new: Vec::new(),
        }
    }

    /// Resize internal buffers if system size changes
    fn resize(&mut self, n: usize) {
        for k in self.k.iter_mut() {
            k.resize(n, 0.0);
        }
        self.y_stage.resize(n, 0.0);
        self.y_new.resize(n, 0.0);
    }

    /// Reset step counters
    pub fn reset(&mut self) {
        self.accepted_steps = 0;
        self.rejected_steps = 0;
        self.evaluations = 0;
    }

    /// Integrate from `y0` over `[t0, t1]`.
    ///
    /// With `t_eval`, the trajectory holds exactly those times (which must
    /// be non-decreasing and inside the span); otherwise it holds `t0` and
    /// every accepted step.
    pub fn integrate<F>(
        &mut self,
        mut rhs: F,
        t_span: (f64, f64),
        y0: &[f64],
        t_eval: Option<&[f64]>,
    ) -> Result<Trajectory>
    where
        F: FnMut(f64, &[f64], &mut [f64]) -> Result<()>,
    {
        self.config.validate()?;
        let (t0, t1) = t_span;
        if !(t0.is_finite() && t1.is_finite() && t1 > t0) {
            return Err(SimError::config(format!(
                "time span [{}, {}] must be finite and increasing",
                t0, t1
            )));
        }
        if y0.iter().any(|v| !v.is_finite()) {
            return Err(SimError::config("initial state must be finite"));
        }
        if let Some(times) = t_eval {
            if times.iter().any(|&t| !(t >= t0 && t <= t1)) {
                return Err(SimError::config("t_eval points must lie inside the time span"));
            }
            if times.windows(2).any(|w| w[1] < w[0]) {
                return Err(SimError::config("t_eval must be non-decreasing"));
            }
        }

        let n = y0.len();
        self.resize(n);
        self.reset();

        let mut trajectory = Trajectory::default();
        let mut t = t0;
        let mut y = y0.to_vec();
        let mut next_eval = 0;

        match t_eval {
            None => trajectory.push(t0, y.clone()),
            Some(times) => {
                while next_eval < times.len() && times[next_eval] <= t0 {
                    trajectory.push(times[next_eval], y.clone());
                    next_eval += 1;
                }
            }
        }

        let mut f0 = vec![0.0; n];
        if let Err(e) = self.eval(&mut rhs, t, &y, &mut f0) {
            return Err(model_failure(t, e, trajectory));
        }

        let mut h = match self.config.first_step {
            Some(h) => h,
            None => match self.initial_step(&mut rhs, t0, &y, &f0) {
                Ok(h) => h,
                Err(e) => return Err(model_failure(t, e, trajectory)),
            },
        };
        h = h.min(t1 - t0);

        let max_step = self.config.max_step.unwrap_or(f64::INFINITY);
        let mut attempts = 0;
        let mut f1 = vec![0.0; n];

        while t < t1 {
            if attempts >= self.config.max_steps {
                return Err(SimError::Integration {
                    t,
                    reason: IntegrationFailure::StepBudgetExhausted {
                        max_steps: self.config.max_steps,
                    },
                    trajectory: Box::new(trajectory),
                });
            }
            attempts += 1;

            h = h.min(max_step);
            let min_h = self.config.min_step.max(10.0 * f64::EPSILON * t.abs());
            if h < min_h {
                return Err(SimError::Integration {
                    t,
                    reason: IntegrationFailure::StepSizeUnderflow { step: h },
                    trajectory: Box::new(trajectory),
                });
            }

            let last = h >= t1 - t;
            let step = if last { t1 - t } else { h };
            let t_new = if last { t1 } else { t + step };

            let err_norm = match self.attempt(&mut rhs, t, &y, &f0, step) {
                Ok(err) => err,
                Err(e) => return Err(model_failure(t, e, trajectory)),
            };

            if !err_norm.is_finite() || self.y_new.iter().any(|v| !v.is_finite()) {
                // Shrink hard; the underflow guard ends a genuinely divergent run.
                self.rejected_steps += 1;
                h = step * MIN_FACTOR;
                if h < min_h {
                    return Err(SimError::Integration {
                        t,
                        reason: IntegrationFailure::NonFiniteState,
                        trajectory: Box::new(trajectory),
                    });
                }
                continue;
            }

            if err_norm > 1.0 {
                self.rejected_steps += 1;
                let factor = (SAFETY * err_norm.powf(-0.2)).max(MIN_FACTOR);
                h = step * factor;
                continue;
            }

            // Accepted
            let mut floored = false;
            if let Some(floor) = self.config.floor {
                for v in self.y_new.iter_mut() {
                    if *v < floor {
                        *v = floor;
                        floored = true;
                    }
                }
            }
            if floored {
                let y_new = self.y_new.clone();
                if let Err(e) = self.eval(&mut rhs, t_new, &y_new, &mut f1) {
                    return Err(model_failure(t, e, trajectory));
                }
            } else {
                f1.copy_from_slice(&self.k[6]);
            }

            match t_eval {
                None => trajectory.push(t_new, self.y_new.clone()),
                Some(times) => {
                    while next_eval < times.len() && times[next_eval] <= t_new {
                        let theta = (times[next_eval] - t) / step;
                        let sample = self.hermite(&y, &f0, &f1, step, theta);
                        trajectory.push(times[next_eval], sample);
                        next_eval += 1;
                    }
                }
            }

            t = t_new;
            y.copy_from_slice(&self.y_new);
            f0.copy_from_slice(&f1);
            self.accepted_steps += 1;

            let factor = if err_norm == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
            };
            h = step * factor;
        }

        log::debug!(
            "Integrated [{}, {}]: {} accepted, {} rejected, {} evaluations",
            t0,
            t1,
            self.accepted_steps,
            self.rejected_steps,
            self.evaluations
        );
        Ok(trajectory)
    }

    fn eval<F>(&mut self, rhs: &mut F, t: f64, y: &[f64], out: &mut [f64]) -> Result<()>
    where
        F: FnMut(f64, &[f64], &mut [f64]) -> Result<()>,
    {
        self.evaluations += 1;
        rhs(t, y, out)
    }

    /// One trial step of size `h`; fills `y_new` and `k`, returns the error norm.
    fn attempt<F>(&mut self, rhs: &mut F, t: f64, y: &[f64], f0: &[f64], h: f64) -> Result<f64>
    where
        F: FnMut(f64, &[f64], &mut [f64]) -> Result<()>,
    {
        let n = y.len();
        let [k1, k2, k3, k4, k5, k6, k7] = &mut self.k;
        let ys = &mut self.y_stage;
        let y_new = &mut self.y_new;

        k1.copy_from_slice(f0);

        for i in 0..n {
            ys[i] = y[i] + h * A21 * k1[i];
        }
        self.evaluations += 1;
        rhs(t + C2 * h, &ys[..], &mut k2[..])?;

        for i in 0..n {
            ys[i] = y[i] + h * (A31 * k1[i] + A32 * k2[i]);
        }
        self.evaluations += 1;
        rhs(t + C3 * h, &ys[..], &mut k3[..])?;

        for i in 0..n {
            ys[i] = y[i] + h * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
        }
        self.evaluations += 1;
        rhs(t + C4 * h, &ys[..], &mut k4[..])?;

        for i in 0..n {
            ys[i] = y[i] + h * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
        }
        self.evaluations += 1;
        rhs(t + C5 * h, &ys[..], &mut k5[..])?;

        for i in 0..n {
            ys[i] = y[i]
                + h * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
        }
        self.evaluations += 1;
        rhs(t + h, &ys[..], &mut k6[..])?;

        for i in 0..n {
            y_new[i] = y[i]
                + h * (A71 * k1[i] + A73 * k3[i] + A74 * k4[i] + A75 * k5[i] + A76 * k6[i]);
        }
        self.evaluations += 1;
        rhs(t + h, &y_new[..], &mut k7[..])?;

        let (atol, rtol) = (self.config.atol, self.config.rtol);
        Ok(rms_norm((0..n).map(|i| {
            let err = h
                * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
            err / (atol + rtol * y[i].abs().max(y_new[i].abs()))
        })))
    }

    /// Starting step from the local derivative scale (Hairer §II.4).
    fn initial_step<F>(&mut self, rhs: &mut F, t0: f64, y0: &[f64], f0: &[f64]) -> Result<f64>
    where
        F: FnMut(f64, &[f64], &mut [f64]) -> Result<()>,
    {
        let n = y0.len();
        if n == 0 {
            return Ok(1e-6);
        }
        let scale: Vec<f64> = y0
            .iter()
            .map(|v| self.config.atol + self.config.rtol * v.abs())
            .collect();

        let d0 = rms_norm(y0.iter().zip(&scale).map(|(y, s)| y / s));
        let d1 = rms_norm(f0.iter().zip(&scale).map(|(f, s)| f / s));
        let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };

        let mut y1: Vec<f64> = y0.iter().zip(f0).map(|(y, f)| y + h0 * f).collect();
        if let Some(floor) = self.config.floor {
            y1.iter_mut().for_each(|v| *v = v.max(floor));
        }
        let mut f1 = vec![0.0; n];
        self.eval(rhs, t0 + h0, &y1, &mut f1)?;

        let d2 = rms_norm(
            f1.iter()
                .zip(f0)
                .zip(&scale)
                .map(|((a, b), s)| (a - b) / s),
        ) / h0;

        let h1 = if d1.max(d2) <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(0.2)
        };
        Ok((100.0 * h0).min(h1))
    }

    /// Cubic Hermite interpolant between `y` (derivative `f0`) and `y_new`
    /// (derivative `f1`) at fraction `theta` of a step of size `h`.
    fn hermite(&self, y: &[f64], f0: &[f64], f1: &[f64], h: f64, theta: f64) -> Vec<f64> {
        let t2 = theta * theta;
        let t3 = t2 * theta;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + theta;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        y.iter()
            .zip(self.y_new.iter())
            .zip(f0.iter().zip(f1.iter()))
            .map(|((&a, &b), (&da, &db))| {
                let v = h00 * a + h10 * h * da + h01 * b + h11 * h * db;
                match self.config.floor {
                    Some(floor) => v.max(floor),
                    None => v,
                }
            })
            .collect()
    }
}

impl Default for DormandPrince {
    fn default() -> Self {
        Self::new(IntegratorConfig::default())
    }
}

/// Root-mean-square of the scaled components; zero for an empty state.
fn rms_norm<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum_sq, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v * v, c + 1));
    if count == 0 {
        0.0
    } else {
        (sum_sq / count as f64).sqrt()
    }
}

fn model_failure(t: f64, error: SimError, trajectory: Trajectory) -> SimError {
    SimError::Integration {
        t,
        reason: IntegrationFailure::Model(Box::new(error)),
        trajectory: Box::new(trajectory),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unclamped() -> IntegratorConfig {
        IntegratorConfig {
            rtol: 1e-9,
            atol: 1e-12,
            floor: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_exponential_decay() {
        // dy/dt = -y, y(0) = 1 → y(1) = exp(-1)
        let mut integrator = DormandPrince::new(unclamped());
        let traj = integrator
            .integrate(
                |_, y, dydt| {
                    dydt[0] = -y[0];
                    Ok(())
                },
                (0.0, 1.0),
                &[1.0],
                None,
            )
            .unwrap();

        assert_eq!(traj.final_time(), Some(1.0));
        let error = (traj.final_state().unwrap()[0] - (-1.0_f64).exp()).abs();
        assert!(error < 1e-8, "error too large: {}", error);
        assert!(integrator.accepted_steps > 0);
    }

    #[test]
    fn test_harmonic_oscillator_with_t_eval() {
        // y1' = y2, y2' = -y1 → y1 = cos t
        let mut integrator = DormandPrince::new(unclamped());
        let times: Vec<f64> = (0..=10).map(|k| k as f64 * 0.3).collect();
        let traj = integrator
            .integrate(
                |_, y, dydt| {
                    dydt[0] = y[1];
                    dydt[1] = -y[0];
                    Ok(())
                },
                (0.0, 3.0),
                &[1.0, 0.0],
                Some(&times),
            )
            .unwrap();

        assert_eq!(traj.times, times);
        for (t, y) in traj.times.iter().zip(traj.states.iter()) {
            assert!((y[0] - t.cos()).abs() < 1e-5, "t={} y={}", t, y[0]);
        }
    }

    #[test]
    fn test_floor_keeps_state_non_negative() {
        let mut integrator = DormandPrince::default();
        let traj = integrator
            .integrate(
                |_, _, dydt| {
                    dydt[0] = -1000.0;
                    Ok(())
                },
                (0.0, 1.0),
                &[0.001],
                None,
            )
            .unwrap();
        assert!(traj.min_value() >= 0.0);
    }

    #[test]
    fn test_step_budget_returns_partial_trajectory() {
        let mut integrator = DormandPrince::new(IntegratorConfig {
            max_steps: 3,
            first_step: Some(1e-3),
            max_step: Some(1e-3),
            ..Default::default()
        });
        let err = integrator
            .integrate(
                |_, y, dydt| {
                    dydt[0] = -y[0];
                    Ok(())
                },
                (0.0, 10.0),
                &[1.0],
                None,
            )
            .unwrap_err();

        match err {
            SimError::Integration {
                reason: IntegrationFailure::StepBudgetExhausted { max_steps },
                trajectory,
                ..
            } => {
                assert_eq!(max_steps, 3);
                assert_eq!(trajectory.len(), 4);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rhs_failure_is_surfaced() {
        let mut integrator = DormandPrince::default();
        let err = integrator
            .integrate(
                |t, _, dydt| {
                    if t > 0.5 {
                        return Err(SimError::degenerate("test", 0, 0.0));
                    }
                    dydt[0] = 1.0;
                    Ok(())
                },
                (0.0, 1.0),
                &[0.0],
                None,
            )
            .unwrap_err();

        match err {
            SimError::Integration {
                reason: IntegrationFailure::Model(inner),
                trajectory,
                t,
            } => {
                assert!(matches!(*inner, SimError::NumericalDegeneracy { .. }));
                assert!(t <= 0.5);
                assert!(!trajectory.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_span() {
        let mut integrator = DormandPrince::default();
        let result = integrator.integrate(|_, _, _| Ok(()), (1.0, 1.0), &[1.0], None);
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn test_t_eval_outside_span() {
        let mut integrator = DormandPrince::default();
        let result = integrator.integrate(|_, _, _| Ok(()), (0.0, 1.0), &[1.0], Some(&[2.0]));
        assert!(matches!(result, Err(SimError::Config(_))));
    }
}
