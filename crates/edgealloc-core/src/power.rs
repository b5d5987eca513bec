//! Piecewise-linear server power model.
//!
//! A server's draw at utilization `u` is `coefficient(u) * u + idle * (1 - u)`,
//! where `coefficient(u)` is interpolated between the two bracketing
//! breakpoints of the server's curve. Outside the modeled range the nearest
//! endpoint coefficient is used.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigResult, ConfigurationError};

/// A single `(utilization, coefficient)` point on a power curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Utilization fraction in `[0, 1]`.
    pub utilization: f64,
    /// Full-load wattage at this operating point.
    pub coefficient: f64,
}

impl Breakpoint {
    pub fn new(utilization: f64, coefficient: f64) -> Self {
        Self {
            utilization,
            coefficient,
        }
    }
}

/// Validated, ascending list of breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Breakpoint>", into = "Vec<Breakpoint>")]
pub struct PowerCurve {
    breakpoints: Vec<Breakpoint>,
}

impl PowerCurve {
    /// Build a curve, rejecting empty, out-of-range, or unsorted input.
    pub fn new(breakpoints: Vec<Breakpoint>) -> ConfigResult<Self> {
        if breakpoints.is_empty() {
            return Err(ConfigurationError::EmptyPowerCurve);
        }
        for (index, bp) in breakpoints.iter().enumerate() {
            if !bp.utilization.is_finite() || !(0.0..=1.0).contains(&bp.utilization) {
                return Err(ConfigurationError::InvalidBreakpoint {
                    index,
                    reason: format!("utilization {} outside [0, 1]", bp.utilization),
                });
            }
            if !bp.coefficient.is_finite() || bp.coefficient < 0.0 {
                return Err(ConfigurationError::InvalidBreakpoint {
                    index,
                    reason: format!(
                        "coefficient {} must be non-negative and finite",
                        bp.coefficient
                    ),
                });
            }
            if index > 0 && bp.utilization <= breakpoints[index - 1].utilization {
                return Err(ConfigurationError::UnsortedPowerCurve { index });
            }
        }
        Ok(Self { breakpoints })
    }

    /// A flat curve: the same coefficient at every utilization.
    pub fn constant(coefficient: f64) -> ConfigResult<Self> {
        Self::new(vec![Breakpoint::new(0.0, coefficient)])
    }

    /// A two-point curve from `(0, at_zero)` to `(1, at_full)`.
    pub fn linear(at_zero: f64, at_full: f64) -> ConfigResult<Self> {
        Self::new(vec![Breakpoint::new(0.0, at_zero), Breakpoint::new(1.0, at_full)])
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Interpolated coefficient at `utilization`, clamped to the endpoints.
    pub fn coefficient_at(&self, utilization: f64) -> f64 {
        let first = self.breakpoints[0];
        let last = self.breakpoints[self.breakpoints.len() - 1];
        if utilization <= first.utilization {
            return first.coefficient;
        }
        if utilization >= last.utilization {
            return last.coefficient;
        }

        // First breakpoint strictly above `utilization`; always in 1..len here.
        let upper = self
            .breakpoints
            .partition_point(|bp| bp.utilization <= utilization);
        let lo = self.breakpoints[upper - 1];
        let hi = self.breakpoints[upper];
        let t = (utilization - lo.utilization) / (hi.utilization - lo.utilization);
        lo.coefficient + (hi.coefficient - lo.coefficient) * t
    }

    /// Instantaneous draw in watts for the given idle power and utilization.
    pub fn power(&self, idle_power: f64, utilization: f64) -> f64 {
        let u = utilization.clamp(0.0, 1.0);
        self.coefficient_at(u) * u + idle_power * (1.0 - u)
    }
}

impl TryFrom<Vec<Breakpoint>> for PowerCurve {
    type Error = ConfigurationError;

    fn try_from(value: Vec<Breakpoint>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PowerCurve> for Vec<Breakpoint> {
    fn from(curve: PowerCurve) -> Self {
        curve.breakpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(points: &[(f64, f64)]) -> PowerCurve {
        PowerCurve::new(points.iter().map(|&(u, c)| Breakpoint::new(u, c)).collect()).unwrap()
    }

    #[test]
    fn rejects_empty_curve() {
        assert_eq!(PowerCurve::new(vec![]), Err(ConfigurationError::EmptyPowerCurve));
    }

    #[test]
    fn rejects_unsorted_curve() {
        let err = PowerCurve::new(vec![Breakpoint::new(0.5, 10.0), Breakpoint::new(0.2, 12.0)]);
        assert_eq!(err, Err(ConfigurationError::UnsortedPowerCurve { index: 1 }));
    }

    #[test]
    fn rejects_duplicate_utilization() {
        let err = PowerCurve::new(vec![Breakpoint::new(0.5, 10.0), Breakpoint::new(0.5, 12.0)]);
        assert!(matches!(err, Err(ConfigurationError::UnsortedPowerCurve { .. })));
    }

    #[test]
    fn rejects_out_of_range_utilization() {
        let err = PowerCurve::new(vec![Breakpoint::new(1.5, 10.0)]);
        assert!(matches!(err, Err(ConfigurationError::InvalidBreakpoint { index: 0, .. })));
    }

    #[test]
    fn rejects_negative_coefficient() {
        let err = PowerCurve::new(vec![Breakpoint::new(0.0, -1.0)]);
        assert!(matches!(err, Err(ConfigurationError::InvalidBreakpoint { .. })));
    }

    #[test]
    fn interpolates_between_breakpoints() {
        let c = curve(&[(0.0, 100.0), (0.5, 150.0), (1.0, 250.0)]);
        assert_eq!(c.coefficient_at(0.25), 125.0);
        assert_eq!(c.coefficient_at(0.5), 150.0);
        assert_eq!(c.coefficient_at(0.75), 200.0);
    }

    #[test]
    fn clamps_outside_modeled_range() {
        let c = curve(&[(0.2, 100.0), (0.8, 160.0)]);
        assert_eq!(c.coefficient_at(0.0), 100.0);
        assert_eq!(c.coefficient_at(0.1), 100.0);
        assert_eq!(c.coefficient_at(0.9), 160.0);
        assert_eq!(c.coefficient_at(1.0), 160.0);
    }

    #[test]
    fn idle_power_at_zero_utilization() {
        let c = curve(&[(0.0, 200.0), (1.0, 300.0)]);
        assert_eq!(c.power(80.0, 0.0), 80.0);
    }

    #[test]
    fn full_load_draws_coefficient() {
        let c = curve(&[(0.0, 200.0), (1.0, 300.0)]);
        assert_eq!(c.power(80.0, 1.0), 300.0);
    }

    #[test]
    fn utilization_is_clamped() {
        let c = curve(&[(0.0, 200.0), (1.0, 300.0)]);
        assert_eq!(c.power(80.0, 1.7), c.power(80.0, 1.0));
        assert_eq!(c.power(80.0, -0.3), 80.0);
    }

    #[test]
    fn monotone_when_coefficients_exceed_idle() {
        let c = curve(&[(0.0, 120.0), (1.0, 180.0)]);
        let mut prev = c.power(60.0, 0.0);
        for step in 1..=20 {
            let p = c.power(60.0, step as f64 / 20.0);
            assert!(p >= prev, "power fell from {prev} to {p}");
            prev = p;
        }
    }

    #[test]
    fn deserialize_validates() {
        let ok: Result<PowerCurve, _> =
            serde_json::from_str(r#"[{"utilization":0.0,"coefficient":5.0}]"#);
        assert!(ok.is_ok());
        let bad: Result<PowerCurve, _> = serde_json::from_str("[]");
        assert!(bad.is_err());
    }
}
