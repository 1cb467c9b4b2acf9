//! Interpolation policies for intermediate QPS targets.

/// Produces the aggregate QPS targets run before the final target.
///
/// Implementations return strictly increasing values below `final_target`.
/// The controller filters anything else out, so a sloppy strategy can only
/// shorten a ramp, never break its ordering.
pub trait RampStrategy: Send + Sync {
    fn intermediate_targets(&self, final_target: u64) -> Vec<u64>;

    fn name(&self) -> &'static str;

    /// Reject parameters the strategy cannot plan with.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Start at `starting_qps` and multiply by `growth_factor` each stage.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometricRamp {
    pub starting_qps: u64,
    pub growth_factor: f64,
}

/// Datastore recommends starting at 500 ops/sec and growing by at most 50%
/// every five minutes.
impl Default for GeometricRamp {
    fn default() -> Self {
        Self {
            starting_qps: 500,
            growth_factor: 1.5,
        }
    }
}

impl RampStrategy for GeometricRamp {
    fn intermediate_targets(&self, final_target: u64) -> Vec<u64> {
        let mut targets = Vec::new();
        if self.starting_qps == 0 || self.starting_qps >= final_target {
            return targets;
        }
        // NaN never grows past the final target.
        if !self.growth_factor.is_finite() || self.growth_factor <= 1.0 {
            targets.push(self.starting_qps);
            return targets;
        }

        let mut qps = self.starting_qps as f64;
        while (qps as u64) < final_target {
            let target = qps as u64;
            if targets.last().map_or(true, |last| target > *last) {
                targets.push(target);
            }
            qps *= self.growth_factor;
        }
        targets
    }

    fn name(&self) -> &'static str {
        "geometric"
    }

    fn validate(&self) -> Result<(), String> {
        if !self.growth_factor.is_finite() || self.growth_factor <= 0.0 {
            return Err(format!(
                "growth factor must be a positive number, got {}",
                self.growth_factor
            ));
        }
        Ok(())
    }
}

/// Increase the target by a fixed `step` each stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedStepRamp {
    pub step: u64,
}

impl RampStrategy for FixedStepRamp {
    fn intermediate_targets(&self, final_target: u64) -> Vec<u64> {
        if self.step == 0 {
            return Vec::new();
        }
        (1u64..)
            .map_while(|i| i.checked_mul(self.step))
            .take_while(|t| *t < final_target)
            .collect()
    }

    fn name(&self) -> &'static str {
        "fixed-step"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometric_default_sequence() {
        let targets = GeometricRamp::default().intermediate_targets(2000);
        assert_eq!(targets, vec![500, 750, 1125, 1687]);
    }

    #[test]
    fn test_geometric_nothing_below_start() {
        assert!(GeometricRamp::default().intermediate_targets(500).is_empty());
        assert!(GeometricRamp::default().intermediate_targets(100).is_empty());
    }

    #[test]
    fn test_geometric_small_growth_stays_increasing() {
        let ramp = GeometricRamp {
            starting_qps: 1,
            growth_factor: 1.1,
        };
        let targets = ramp.intermediate_targets(20);
        assert!(targets.windows(2).all(|w| w[0] < w[1]));
        assert!(targets.iter().all(|t| *t < 20));
    }

    #[test]
    fn test_geometric_flat_growth_single_stage() {
        let ramp = GeometricRamp {
            starting_qps: 100,
            growth_factor: 1.0,
        };
        assert_eq!(ramp.intermediate_targets(1000), vec![100]);
    }

    #[test]
    fn test_geometric_non_finite_growth_terminates() {
        let ramp = GeometricRamp {
            starting_qps: 500,
            growth_factor: f64::NAN,
        };
        assert_eq!(ramp.intermediate_targets(2000), vec![500]);
        assert!(ramp.validate().is_err());

        let ramp = GeometricRamp {
            starting_qps: 500,
            growth_factor: f64::INFINITY,
        };
        assert_eq!(ramp.intermediate_targets(2000), vec![500]);
        assert!(ramp.validate().is_err());

        assert!(GeometricRamp::default().validate().is_ok());
    }

    #[test]
    fn test_fixed_step_near_overflow() {
        let step = u64::MAX / 2 + 1;
        let ramp = FixedStepRamp { step };
        assert_eq!(ramp.intermediate_targets(u64::MAX), vec![step]);
    }

    #[test]
    fn test_fixed_step() {
        let ramp = FixedStepRamp { step: 300 };
        assert_eq!(ramp.intermediate_targets(1000), vec![300, 600, 900]);
        assert_eq!(ramp.intermediate_targets(900), vec![300, 600]);
        assert!(FixedStepRamp { step: 0 }.intermediate_targets(1000).is_empty());
    }
}
