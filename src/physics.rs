//! External collaborators of the executor: propagation and solving.
//!
//! The executor owns the command loop; the actual numeric work is behind
//! the [`Propagator`] trait and the [`DifferentialCorrector`] state
//! machine, so commands stay thin and the numeric models can change
//! independently.

use log::debug;

use crate::error::ScriptError;
use crate::object::ModelObject;

/// Default convergence tolerance when an Achieve gives none.
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Advances a spacecraft state through time.
pub trait Propagator {
    /// Prepare internal state before the first step of a Propagate run.
    fn initialize(&mut self) -> Result<(), ScriptError>;

    /// Advance `sat` by `dt` seconds.
    fn step(&mut self, sat: &mut ModelObject, dt: f64) -> Result<(), ScriptError>;
}

/// Constant-velocity propagation: position advances along the velocity
/// vector, epoch and elapsed time accumulate.
#[derive(Debug, Default)]
pub struct LinearPropagator;

impl Propagator for LinearPropagator {
    fn initialize(&mut self) -> Result<(), ScriptError> {
        Ok(())
    }

    fn step(&mut self, sat: &mut ModelObject, dt: f64) -> Result<(), ScriptError> {
        for (pos, vel) in [("X", "VX"), ("Y", "VY"), ("Z", "VZ")] {
            let p = sat.real_parameter_by_name(pos)?;
            let v = sat.real_parameter_by_name(vel)?;
            sat.set_real_parameter_by_name(pos, p + v * dt)?;
        }
        let epoch = sat.real_parameter_by_name("Epoch")?;
        sat.set_real_parameter_by_name("Epoch", epoch + dt / 86_400.0)?;
        Ok(())
    }
}

/// Build the propagator implementation a Propagator object is configured
/// for.
pub fn build_propagator(obj: &ModelObject) -> Result<Box<dyn Propagator>, ScriptError> {
    let kind = obj.string_parameter_by_name("Type")?;
    match kind.as_str() {
        "Linear" => Ok(Box::new(LinearPropagator)),
        other => Err(ScriptError::TypeMismatch(format!(
            "{} requests unknown propagator type {other}",
            obj.name()
        ))),
    }
}

/// Outcome of one solver pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    /// Not converged; run the loop body again with the updated variable.
    Iterating,
    /// The goal is met within tolerance.
    Converged,
    /// Iteration budget exhausted or no progress possible.
    Diverged,
}

/// Single-variable differential corrector using secant updates.
///
/// One instance drives one Target loop. The executor sets the control
/// variable from [`variable`](Self::variable) before each pass, the
/// Achieve command records the attained value, and [`advance`](Self::advance)
/// decides whether to go around again.
#[derive(Debug, Clone)]
pub struct DifferentialCorrector {
    name: String,
    goal: f64,
    tolerance: f64,
    perturbation: f64,
    max_iterations: usize,
    iterations: usize,
    current: f64,
    previous: Option<(f64, f64)>,
    achieved: Option<f64>,
}

impl DifferentialCorrector {
    /// Configure a corrector from its solver object plus the Vary and
    /// Achieve declarations of the loop.
    pub fn from_object(
        obj: &ModelObject,
        initial: f64,
        goal: f64,
        tolerance: Option<f64>,
    ) -> Result<Self, ScriptError> {
        Ok(DifferentialCorrector {
            name: obj.name().to_string(),
            goal,
            tolerance: tolerance.unwrap_or(DEFAULT_TOLERANCE),
            perturbation: obj.real_parameter_by_name("Perturbation")?,
            max_iterations: obj.real_parameter_by_name("MaximumIterations")?.max(1.0) as usize,
            iterations: 0,
            current: initial,
            previous: None,
            achieved: None,
        })
    }

    /// Name of the solver object driving this loop.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value of the control variable.
    pub fn variable(&self) -> f64 {
        self.current
    }

    /// Passes completed so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Record the value the goal quantity attained this pass.
    pub fn record_achieved(&mut self, value: f64) {
        self.achieved = Some(value);
    }

    /// Fold the recorded pass into the state machine and pick the next
    /// control value.
    pub fn advance(&mut self) -> SolverState {
        let achieved = match self.achieved.take() {
            Some(v) => v,
            // A pass that never reached its Achieve cannot make progress.
            None => return SolverState::Diverged,
        };
        let miss = achieved - self.goal;
        debug!(
            "{}: pass {} var {} achieved {achieved} miss {miss}",
            self.name, self.iterations, self.current
        );
        if miss.abs() <= self.tolerance {
            return SolverState::Converged;
        }
        self.iterations += 1;
        if self.iterations >= self.max_iterations {
            return SolverState::Diverged;
        }
        let next = match self.previous {
            None => self.current + self.perturbation,
            Some((prev_value, prev_miss)) => {
                if miss == prev_miss {
                    // Flat response; the secant update cannot move.
                    return SolverState::Diverged;
                }
                self.current - miss * (self.current - prev_value) / (miss - prev_miss)
            }
        };
        self.previous = Some((self.current, miss));
        self.current = next;
        SolverState::Iterating
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectKind, Registry};

    fn corrector(initial: f64, goal: f64) -> DifferentialCorrector {
        let mut reg = Registry::new();
        let obj = reg.create_of_kind(ObjectKind::DifferentialCorrector, "DC").unwrap();
        DifferentialCorrector::from_object(obj, initial, goal, None).unwrap()
    }

    #[test]
    fn secant_converges_on_a_linear_response() {
        // Achieved quantity responds as 2v + 1; goal 11 means v = 5.
        let mut dc = corrector(0.0, 11.0);
        for _ in 0..10 {
            dc.record_achieved(2.0 * dc.variable() + 1.0);
            match dc.advance() {
                SolverState::Converged => {
                    assert!((dc.variable() - 5.0).abs() < 1.0);
                    return;
                }
                SolverState::Iterating => {}
                SolverState::Diverged => panic!("diverged"),
            }
        }
        panic!("did not converge in 10 passes");
    }

    #[test]
    fn iteration_budget_caps_the_loop() {
        let mut reg = Registry::new();
        let obj = reg.create_of_kind(ObjectKind::DifferentialCorrector, "DC").unwrap();
        obj.set_real_parameter_by_name("MaximumIterations", 2.0).unwrap();
        let mut dc = DifferentialCorrector::from_object(obj, 0.0, 100.0, None).unwrap();
        let mut state = SolverState::Iterating;
        for _ in 0..5 {
            // A goal the response can never reach.
            dc.record_achieved(0.0);
            state = dc.advance();
            if state != SolverState::Iterating {
                break;
            }
        }
        assert_eq!(state, SolverState::Diverged);
        assert!(dc.iterations() <= 2);
    }

    #[test]
    fn pass_without_achieve_diverges() {
        let mut dc = corrector(0.0, 1.0);
        assert_eq!(dc.advance(), SolverState::Diverged);
    }

    #[test]
    fn linear_propagator_advances_along_velocity() {
        let mut reg = Registry::new();
        let sat = reg.create("Spacecraft", "Sat1").unwrap();
        sat.set_real_parameter_by_name("X", 7000.0).unwrap();
        sat.set_real_parameter_by_name("VX", 2.0).unwrap();
        let mut prop = LinearPropagator;
        prop.initialize().unwrap();
        prop.step(sat, 30.0).unwrap();
        assert_eq!(sat.real_parameter_by_name("X").unwrap(), 7060.0);
    }
}
