//! The mission run loop.
//!
//! The executor walks the command chain with a cursor, initializing each
//! node against a per-run object map cloned from the configured registry.
//! Branch commands redirect the cursor; Target constructs run their body
//! repeatedly under a differential corrector until it converges or gives
//! up. A command failure is either recoverable (the run halts and reports
//! the offending command) or fatal (an [`ExecError`] aborts the run).

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::error::{ExecError, ScriptError};
use crate::object::{ParamValue, Registry};
use crate::physics::{build_propagator, DifferentialCorrector, Propagator, SolverState};
use crate::sequence::{CommandKind, MissionSequence, NodeId, NodeState};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The cursor ran off the end of the chain.
    Completed,
    /// A command reported a recoverable failure; the run stopped there.
    Halted,
    /// A Stop command or an external stop request ended the run.
    Stopped,
}

/// Summary of one mission run, with the final object map.
#[derive(Debug)]
pub struct RunResult {
    /// How the run ended.
    pub status: RunStatus,
    /// Commands executed, loop passes included, `End` markers excluded.
    pub commands_executed: usize,
    /// Human-readable outcome message.
    pub message: String,
    /// Script text of the command that halted the run, if any.
    pub failed_command: Option<String>,
    /// The per-run object map in its final state.
    pub registry: Registry,
}

impl RunResult {
    /// Final value of a user variable, if present.
    pub fn variable(&self, name: &str) -> Option<f64> {
        self.registry
            .get(name)
            .and_then(|obj| obj.real_parameter_by_name("Value").ok())
    }

    /// Lines accumulated by a report file object.
    pub fn report_lines(&self, name: &str) -> Vec<String> {
        self.registry
            .get(name)
            .and_then(|obj| {
                let id = obj.parameter_id("Data").ok()?;
                Some(obj.string_list_parameter(id).ok()?.to_vec())
            })
            .unwrap_or_default()
    }
}

/// Cursor target picked by an executed command.
enum Step {
    /// Follow the node's ordinary successor.
    Continue,
    /// Jump to an explicit node, or end the chain.
    Goto(Option<NodeId>),
    /// Recoverable failure: halt the run, reporting `message`.
    Halt(String),
    /// End the run immediately.
    Stop,
}

/// Result of running one chain segment.
enum ChainOutcome {
    Ran,
    Halted { script: String, message: String },
    Stopped,
}

/// Executes a validated command sequence against its own clone of the
/// configured objects.
pub struct Executor {
    registry: Registry,
    propagators: HashMap<String, Box<dyn Propagator>>,
    solvers: Vec<DifferentialCorrector>,
    stop_requested: bool,
    commands_executed: usize,
}

impl Executor {
    /// An executor over a clone of the configured objects. The originals
    /// stay untouched no matter what the run does.
    pub fn new(configured: &Registry) -> Self {
        Executor {
            registry: configured.clone(),
            propagators: HashMap::new(),
            solvers: Vec::new(),
            stop_requested: false,
            commands_executed: 0,
        }
    }

    /// Ask the run to stop at the next command boundary.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Run the sequence from its head to completion, halt, or stop.
    pub fn run(&mut self, seq: &mut MissionSequence) -> Result<RunResult, ExecError> {
        self.stop_requested = false;
        self.commands_executed = 0;
        let outcome = self.run_chain(seq, seq.head(), None)?;
        let (status, message, failed_command) = match outcome {
            ChainOutcome::Ran => (
                RunStatus::Completed,
                "mission run complete".to_string(),
                None,
            ),
            ChainOutcome::Halted { script, message } => {
                warn!("run halted at '{script}': {message}");
                (RunStatus::Halted, message, Some(script))
            }
            ChainOutcome::Stopped => (RunStatus::Stopped, "run stopped".to_string(), None),
        };
        info!(
            "{message} after {} commands",
            self.commands_executed
        );
        Ok(RunResult {
            status,
            commands_executed: self.commands_executed,
            message,
            failed_command,
            registry: self.registry.clone(),
        })
    }

    /// Walk one chain segment. `stop_at` bounds a Target body at its
    /// EndTarget node, which the Target construct itself accounts for.
    fn run_chain(
        &mut self,
        seq: &mut MissionSequence,
        start: Option<NodeId>,
        stop_at: Option<NodeId>,
    ) -> Result<ChainOutcome, ExecError> {
        let mut cursor = start;
        while let Some(id) = cursor {
            if Some(id) == stop_at {
                break;
            }
            if self.stop_requested {
                return Ok(ChainOutcome::Stopped);
            }
            match seq.node(id).state {
                NodeState::Invalid | NodeState::Unparsed => {
                    return Err(ExecError::CorruptSequence(format!(
                        "'{}' is not in a runnable state",
                        seq.node(id).script
                    )));
                }
                _ => {}
            }
            self.initialize_node(seq, id)?;
            seq.node_mut(id).state = NodeState::Executing;
            let step = self.execute_node(seq, id)?;
            {
                let node = seq.node_mut(id);
                node.state = NodeState::Complete;
                if !node.kind.is_end() {
                    self.commands_executed += 1;
                }
            }
            match step {
                Step::Continue => cursor = seq.get_next(id),
                Step::Goto(target) => cursor = target,
                Step::Halt(message) => {
                    let node = seq.node_mut(id);
                    node.summary = message.clone();
                    return Ok(ChainOutcome::Halted {
                        script: node.script.clone(),
                        message,
                    });
                }
                Step::Stop => {
                    self.stop_requested = true;
                    return Ok(ChainOutcome::Stopped);
                }
            }
        }
        Ok(ChainOutcome::Ran)
    }

    /// Re-check the node's wrappers against the per-run map and make sure
    /// collaborators it needs exist. Runs on every arrival, so loop
    /// re-entries pick up the current map.
    fn initialize_node(
        &mut self,
        seq: &mut MissionSequence,
        id: NodeId,
    ) -> Result<(), ExecError> {
        {
            let node = seq.node(id);
            node.kind
                .revalidate(&self.registry)
                .map_err(|e| ExecError::in_command(&node.script, e))?;
        }
        if let CommandKind::Propagate { propagator, .. } = &seq.node(id).kind {
            if !self.propagators.contains_key(propagator) {
                let script = seq.node(id).script.clone();
                let obj = self
                    .registry
                    .get(propagator)
                    .ok_or_else(|| {
                        ExecError::in_command(&script, ScriptError::not_found(propagator))
                    })?;
                let built = build_propagator(obj)
                    .map_err(|e| ExecError::in_command(&script, e))?;
                self.propagators.insert(propagator.clone(), built);
            }
        }
        seq.node_mut(id).state = NodeState::Initialized;
        Ok(())
    }

    fn execute_node(
        &mut self,
        seq: &mut MissionSequence,
        id: NodeId,
    ) -> Result<Step, ExecError> {
        let kind = seq.node(id).kind.clone();
        let script = seq.node(id).script.clone();
        debug!("executing '{script}'");
        let wrap = |e: ScriptError| ExecError::in_command(&script, e);
        match kind {
            CommandKind::Create { type_name, names } => {
                for name in &names {
                    // Configuration already applied this Create; a
                    // re-executed one keeps the run state it accumulated.
                    if self.registry.contains(name) {
                        continue;
                    }
                    self.registry.create(&type_name, name).map_err(wrap)?;
                }
                Ok(Step::Continue)
            }
            CommandKind::Assignment { target, tree, .. } => {
                let target = target
                    .ok_or_else(|| unresolved(&script))?;
                let tree = tree.ok_or_else(|| unresolved(&script))?;
                self.assign(&target, &tree).map_err(wrap)?;
                Ok(Step::Continue)
            }
            CommandKind::If { resolved, .. } => {
                let cond = resolved.ok_or_else(|| unresolved(&script))?;
                let node = seq.node(id);
                let taken = cond.evaluate(&self.registry).map_err(wrap)?;
                let target = if taken {
                    node.branches.first().copied()
                } else {
                    node.branches.get(1).copied().or(node.next)
                };
                Ok(Step::Goto(target.or(node.next)))
            }
            CommandKind::While { resolved, .. } => {
                let cond = resolved.ok_or_else(|| unresolved(&script))?;
                let node = seq.node(id);
                if cond.evaluate(&self.registry).map_err(wrap)? {
                    Ok(Step::Goto(node.branches.first().copied()))
                } else {
                    Ok(Step::Goto(node.next))
                }
            }
            CommandKind::Target { ref solver } => self.run_target(seq, id, solver),
            CommandKind::Vary {
                solver,
                variable,
                ..
            } => {
                let wrapper = variable.ok_or_else(|| unresolved(&script))?;
                let value = self
                    .solvers
                    .iter()
                    .rev()
                    .find(|s| s.name() == solver)
                    .map(DifferentialCorrector::variable)
                    .ok_or_else(|| {
                        ExecError::CorruptSequence(format!(
                            "Vary references solver {solver} outside its Target loop"
                        ))
                    })?;
                wrapper.set_real(&mut self.registry, value).map_err(wrap)?;
                Ok(Step::Continue)
            }
            CommandKind::Achieve { solver, goal, .. } => {
                let wrapper = goal.ok_or_else(|| unresolved(&script))?;
                let attained = wrapper.evaluate_real(&self.registry).map_err(wrap)?;
                let dc = self
                    .solvers
                    .iter_mut()
                    .rev()
                    .find(|s| s.name() == solver)
                    .ok_or_else(|| {
                        ExecError::CorruptSequence(format!(
                            "Achieve references solver {solver} outside its Target loop"
                        ))
                    })?;
                dc.record_achieved(attained);
                Ok(Step::Continue)
            }
            CommandKind::Propagate {
                propagator,
                spacecraft,
                stop,
                stop_tree,
                ..
            } => {
                let stop = stop.ok_or_else(|| unresolved(&script))?;
                let stop_tree = stop_tree.ok_or_else(|| unresolved(&script))?;
                self.propagate(&script, &propagator, &spacecraft, &stop, &stop_tree)
            }
            CommandKind::Maneuver { burn, spacecraft } => {
                self.maneuver(&burn, &spacecraft).map_err(wrap)?;
                Ok(Step::Continue)
            }
            CommandKind::Report { file, items, .. } => {
                self.report(&file, &items).map_err(wrap)?;
                Ok(Step::Continue)
            }
            CommandKind::PlotCommand { plot, action } => {
                let obj = self
                    .registry
                    .get_mut(&plot)
                    .ok_or_else(|| wrap(ScriptError::not_found(&plot)))?;
                if obj.take_action(action.action_name(), "") {
                    Ok(Step::Continue)
                } else {
                    Ok(Step::Halt(format!(
                        "{plot} rejected action {}",
                        action.action_name()
                    )))
                }
            }
            CommandKind::Stop => {
                info!("stop command reached");
                Ok(Step::Stop)
            }
            CommandKind::Verbatim { .. }
            | CommandKind::EndIf
            | CommandKind::EndWhile
            | CommandKind::EndTarget => Ok(Step::Continue),
        }
    }

    /// Write the evaluated right-hand side through the target wrapper,
    /// picking the accessor the leaf type calls for.
    fn assign(
        &mut self,
        target: &crate::wrapper::ElementWrapper,
        tree: &crate::wrapper::MathNode,
    ) -> Result<(), ScriptError> {
        use crate::wrapper::ElementWrapper as W;
        match tree.as_leaf() {
            Some(W::StringLit { value, .. }) => target.set_string(&mut self.registry, value),
            Some(W::ObjectRef { name, .. }) => target.set_string(&mut self.registry, name),
            Some(W::OnOff { value, .. }) | Some(W::Boolean { value, .. }) => {
                target.set_bool(&mut self.registry, *value)
            }
            Some(w @ W::Variable { name, .. })
                if self.registry.get(name).map(|o| o.kind())
                    == Some(crate::object::ObjectKind::StringVar) =>
            {
                let value = w.evaluate_string(&self.registry)?;
                target.set_string(&mut self.registry, &value)
            }
            _ => {
                let value = tree.evaluate(&self.registry)?;
                target.set_real(&mut self.registry, value)
            }
        }
    }

    /// Step the spacecraft until the stop quantity reaches its target
    /// value or the step budget runs out.
    fn propagate(
        &mut self,
        script: &str,
        propagator: &str,
        spacecraft: &str,
        stop: &crate::wrapper::ElementWrapper,
        stop_tree: &crate::wrapper::MathNode,
    ) -> Result<Step, ExecError> {
        let wrap = |e: ScriptError| ExecError::in_command(script, e);
        let (dt, max_steps) = {
            let obj = self
                .registry
                .get(propagator)
                .ok_or_else(|| wrap(ScriptError::not_found(propagator)))?;
            (
                obj.real_parameter_by_name("StepSize").map_err(wrap)?,
                obj.real_parameter_by_name("MaxSteps").map_err(wrap)? as usize,
            )
        };
        let target = stop_tree.evaluate(&self.registry).map_err(wrap)?;
        {
            let sat = self
                .registry
                .get_mut(spacecraft)
                .ok_or_else(|| wrap(ScriptError::not_found(spacecraft)))?;
            let eid = sat.parameter_id("ElapsedSecs").map_err(wrap)?;
            sat.force_set(eid, ParamValue::Real(0.0)).map_err(wrap)?;
        }
        if let Some(p) = self.propagators.get_mut(propagator) {
            p.initialize().map_err(wrap)?;
        }
        let mut prev = stop.evaluate_real(&self.registry).map_err(wrap)?;
        if prev == target {
            return Ok(Step::Continue);
        }
        for _ in 0..max_steps {
            if self.stop_requested {
                return Ok(Step::Stop);
            }
            let prop = self.propagators.get_mut(propagator).ok_or_else(|| {
                ExecError::CorruptSequence(format!("propagator {propagator} was never built"))
            })?;
            let sat = self
                .registry
                .get_mut(spacecraft)
                .ok_or_else(|| {
                    ExecError::CloneInconsistency(format!(
                        "{spacecraft} missing from the run map"
                    ))
                })?;
            prop.step(sat, dt).map_err(wrap)?;
            let eid = sat.parameter_id("ElapsedSecs").map_err(wrap)?;
            let elapsed = sat.real_parameter(eid).map_err(wrap)?;
            sat.force_set(eid, ParamValue::Real(elapsed + dt)).map_err(wrap)?;
            let cur = stop.evaluate_real(&self.registry).map_err(wrap)?;
            // Stop on reaching or crossing the target value.
            if (prev - target) * (cur - target) <= 0.0 {
                debug!("'{script}' stopped with {} = {cur}", stop.description());
                return Ok(Step::Continue);
            }
            prev = cur;
        }
        Ok(Step::Halt(format!(
            "stop condition {} = {target} not reached within {max_steps} steps",
            stop.description()
        )))
    }

    /// Add the burn's delta-v elements to the spacecraft velocity.
    fn maneuver(&mut self, burn: &str, spacecraft: &str) -> Result<(), ScriptError> {
        let (e1, e2, e3) = {
            let obj = self
                .registry
                .get(burn)
                .ok_or_else(|| ScriptError::not_found(burn))?;
            (
                obj.real_parameter_by_name("Element1")?,
                obj.real_parameter_by_name("Element2")?,
                obj.real_parameter_by_name("Element3")?,
            )
        };
        let sat = self
            .registry
            .get_mut(spacecraft)
            .ok_or_else(|| ScriptError::not_found(spacecraft))?;
        for (slot, delta) in [("VX", e1), ("VY", e2), ("VZ", e3)] {
            let v = sat.real_parameter_by_name(slot)?;
            sat.set_real_parameter_by_name(slot, v + delta)?;
        }
        Ok(())
    }

    /// Evaluate the report items and append one line to the file object.
    fn report(
        &mut self,
        file: &str,
        items: &[crate::wrapper::ElementWrapper],
    ) -> Result<(), ScriptError> {
        let mut fields = Vec::with_capacity(items.len());
        for item in items {
            let text = match item.evaluate_real(&self.registry) {
                Ok(v) => format_field(v),
                Err(_) => item.evaluate_string(&self.registry)?,
            };
            fields.push(text);
        }
        let line = fields.join("   ");
        let obj = self
            .registry
            .get_mut(file)
            .ok_or_else(|| ScriptError::not_found(file))?;
        let data_id = obj.parameter_id("Data")?;
        let headers = obj.bool_parameter(obj.parameter_id("WriteHeaders")?)?;
        if headers && obj.string_list_parameter(data_id)?.is_empty() {
            let header = items
                .iter()
                .map(|w| w.description().to_string())
                .collect::<Vec<_>>()
                .join("   ");
            obj.force_push_string(data_id, &header);
        }
        obj.force_push_string(data_id, &line);
        Ok(())
    }

    /// Run a Target construct: repeat the body from a snapshot of the run
    /// map until the solver converges.
    fn run_target(
        &mut self,
        seq: &mut MissionSequence,
        id: NodeId,
        solver: &str,
    ) -> Result<Step, ExecError> {
        let script = seq.node(id).script.clone();
        let wrap = |e: ScriptError| ExecError::in_command(&script, e);
        let body = seq.node(id).branches.first().copied();
        let end = seq.end_node_of(id).ok_or_else(|| {
            ExecError::CorruptSequence(format!("'{script}' has no EndTarget"))
        })?;
        let (initial, goal, tolerance) =
            self.target_declarations(seq, body, end, &script)?;
        let solver_obj = self
            .registry
            .get(solver)
            .ok_or_else(|| wrap(ScriptError::not_found(solver)))?;
        let mut dc = DifferentialCorrector::from_object(solver_obj, initial, goal, tolerance)
            .map_err(wrap)?;
        let snapshot = self.registry.clone();
        loop {
            // Every pass replays the body against the same starting state;
            // only the solver's control value differs.
            self.registry = snapshot.clone();
            self.solvers.push(dc);
            let outcome = self.run_chain(seq, body, Some(end));
            dc = self.solvers.pop().ok_or_else(|| {
                ExecError::CorruptSequence("solver stack underflow".to_string())
            })?;
            match outcome? {
                ChainOutcome::Ran => {}
                ChainOutcome::Stopped => return Ok(Step::Stop),
                ChainOutcome::Halted { message, .. } => return Ok(Step::Halt(message)),
            }
            match dc.advance() {
                SolverState::Converged => {
                    info!(
                        "{solver} converged after {} passes",
                        dc.iterations() + 1
                    );
                    break;
                }
                SolverState::Iterating => {}
                SolverState::Diverged => {
                    return Err(ExecError::SolverDivergence {
                        solver: solver.to_string(),
                        iterations: dc.iterations(),
                    })
                }
            }
        }
        seq.node_mut(end).state = NodeState::Complete;
        Ok(Step::Goto(seq.node(id).next))
    }

    /// Pull the initial guess, goal value, and tolerance out of the body's
    /// Vary and Achieve declarations.
    fn target_declarations(
        &mut self,
        seq: &MissionSequence,
        body: Option<NodeId>,
        end: NodeId,
        script: &str,
    ) -> Result<(f64, f64, Option<f64>), ExecError> {
        let wrap = |e: ScriptError| ExecError::in_command(script, e);
        let mut initial = None;
        let mut goal = None;
        let mut cursor = body;
        while let Some(id) = cursor {
            if id == end {
                break;
            }
            match &seq.node(id).kind {
                CommandKind::Vary { initial_tree, .. } if initial.is_none() => {
                    let tree = initial_tree.as_ref().ok_or_else(|| unresolved(script))?;
                    initial = Some(tree.evaluate(&self.registry).map_err(wrap)?);
                }
                CommandKind::Achieve {
                    value_tree,
                    tolerance,
                    ..
                } if goal.is_none() => {
                    let tree = value_tree.as_ref().ok_or_else(|| unresolved(script))?;
                    goal = Some((tree.evaluate(&self.registry).map_err(wrap)?, *tolerance));
                }
                _ => {}
            }
            cursor = seq.node(id).next;
        }
        let initial = initial.ok_or_else(|| {
            ExecError::CorruptSequence(format!("'{script}' has no Vary declaration"))
        })?;
        let (goal, tolerance) = goal.ok_or_else(|| {
            ExecError::CorruptSequence(format!("'{script}' has no Achieve declaration"))
        })?;
        Ok((initial, goal, tolerance))
    }
}

fn unresolved(script: &str) -> ExecError {
    ExecError::CorruptSequence(format!("'{script}' was executed before resolution"))
}

fn format_field(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v:.6}")
    }
}
