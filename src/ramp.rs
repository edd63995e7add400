//! Voltage sweep state machine.
//!
//! The cursor walks in integer millivolts so that a sweep always produces
//! the same setpoint sequence and always terminates, regardless of how the
//! bounds divide by the increment.

use crate::config::RampPlan;

const MV_PER_VOLT: f64 = 1000.0;

/// Outcome of one sweep tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RampStep {
    /// Push this setpoint to the supply.
    Set(f64),
    /// Same, but a new sweep leg begins; the log gets a segment break first.
    NewLeg(f64),
    /// The sweep has covered its range.
    Finished,
}

/// Walks the voltage cursor over the range of a [`RampPlan`].
#[derive(Debug, Clone)]
pub struct RampController {
    cursor_mv: i64,
    step_mv: i64,
    low_mv: i64,
    high_mv: i64,
    dual: bool,
    second_leg: bool,
}

impl RampController {
    pub fn new(plan: &RampPlan) -> Self {
        let low_mv = to_mv(plan.start);
        let high_mv = to_mv(plan.end);
        let step_mv = i64::from(plan.step_mv);
        Self {
            // A positive increment climbs from the lower bound; a negative
            // one starts at the upper bound and descends.
            cursor_mv: if step_mv > 0 { low_mv } else { high_mv },
            step_mv,
            low_mv,
            high_mv,
            dual: plan.dual,
            second_leg: false,
        }
    }

    /// Current cursor position in volts.
    pub fn current_voltage(&self) -> f64 {
        self.cursor_mv as f64 / MV_PER_VOLT
    }

    /// True once a dual sweep has turned around.
    pub fn second_leg_started(&self) -> bool {
        self.second_leg
    }

    /// Move the cursor one increment.
    ///
    /// The bounds are inclusive: a cursor sitting exactly on its limit has
    /// finished the leg and turns or stops instead of stepping past it.
    pub fn advance(&mut self) -> RampStep {
        if self.at_limit() {
            if self.dual && !self.second_leg {
                self.step_mv = -self.step_mv;
                self.second_leg = true;
                // A degenerate sweep (equal bounds) is already at the far
                // limit of the reversed leg too.
                if self.at_limit() {
                    return RampStep::Finished;
                }
                self.cursor_mv += self.step_mv;
                return RampStep::NewLeg(self.current_voltage());
            }
            return RampStep::Finished;
        }
        self.cursor_mv += self.step_mv;
        RampStep::Set(self.current_voltage())
    }

    fn at_limit(&self) -> bool {
        if self.step_mv > 0 {
            self.cursor_mv >= self.high_mv
        } else {
            self.cursor_mv <= self.low_mv
        }
    }
}

fn to_mv(volt: f64) -> i64 {
    (volt * MV_PER_VOLT).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(start: f64, end: f64, step_mv: i32, dual: bool) -> RampPlan {
        RampPlan {
            start,
            end,
            step_mv,
            dual,
        }
    }

    /// Run a controller to completion, returning the emitted setpoints in
    /// millivolts and the tick indices where a new leg began.
    fn collect(plan: &RampPlan) -> (Vec<i64>, Vec<usize>) {
        let mut ramp = RampController::new(plan);
        let mut setpoints = Vec::new();
        let mut leg_breaks = Vec::new();
        loop {
            match ramp.advance() {
                RampStep::Set(v) => setpoints.push(to_mv(v)),
                RampStep::NewLeg(v) => {
                    leg_breaks.push(setpoints.len());
                    setpoints.push(to_mv(v));
                }
                RampStep::Finished => return (setpoints, leg_breaks),
            }
            assert!(setpoints.len() < 100_000, "sweep failed to terminate");
        }
    }

    #[test]
    fn ascending_sweep_hits_every_step_and_terminates() {
        let (setpoints, breaks) = collect(&plan(0.0, 15.0, 100, false));
        assert_eq!(setpoints.len(), 150);
        assert_eq!(setpoints[0], 100);
        assert_eq!(setpoints[149], 15_000);
        assert!(breaks.is_empty());
    }

    #[test]
    fn non_divisible_range_overshoots_once_then_stops() {
        // 0...1.05 V in 100 mV steps: the 11th setpoint passes the bound.
        let (setpoints, _) = collect(&plan(0.0, 1.05, 100, false));
        assert_eq!(setpoints.len(), 11);
        assert_eq!(*setpoints.last().unwrap(), 1_100);
    }

    #[test]
    fn negative_increment_starts_at_the_upper_bound() {
        let mut ramp = RampController::new(&plan(6.0, 15.0, -100, false));
        assert_eq!(to_mv(ramp.current_voltage()), 15_000);
        assert_eq!(ramp.advance(), RampStep::Set(14.9));
    }

    #[test]
    fn descending_dual_sweep_turns_at_the_lower_bound() {
        let (setpoints, breaks) = collect(&plan(6.0, 15.0, -100, true));
        // 90 descending setpoints, then 90 ascending back to the top.
        assert_eq!(setpoints.len(), 180);
        assert_eq!(breaks, [90]);
        assert_eq!(setpoints[89], 6_000);
        assert_eq!(setpoints[90], 6_100);
        assert_eq!(*setpoints.last().unwrap(), 15_000);
    }

    #[test]
    fn dual_sweep_second_leg_mirrors_the_first() {
        let (setpoints, breaks) = collect(&plan(0.0, 2.0, 100, true));
        assert_eq!(breaks, [20]);
        let (leg1, leg2) = setpoints.split_at(20);
        // The turning point is emitted once; the retrace ends at the origin.
        let mut mirrored: Vec<i64> = leg1.iter().rev().skip(1).copied().collect();
        mirrored.push(0);
        assert_eq!(leg2, mirrored);
    }

    #[test]
    fn second_leg_flag_set_only_after_the_turn() {
        let mut ramp = RampController::new(&plan(0.0, 0.2, 100, true));
        assert!(!ramp.second_leg_started());
        ramp.advance();
        ramp.advance();
        assert!(!ramp.second_leg_started());
        assert_eq!(ramp.advance(), RampStep::NewLeg(0.1));
        assert!(ramp.second_leg_started());
    }

    #[test]
    fn identical_plans_produce_identical_sequences() {
        let p = plan(1.0, 9.35, 73, true);
        assert_eq!(collect(&p), collect(&p));
    }

    #[test]
    fn degenerate_dual_sweep_finishes_without_a_setpoint() {
        let (setpoints, breaks) = collect(&plan(5.0, 5.0, 100, true));
        assert!(setpoints.is_empty());
        assert!(breaks.is_empty());
    }
}
