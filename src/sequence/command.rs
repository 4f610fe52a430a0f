//! Polymorphic command kinds carried by sequence nodes.
//!
//! Each kind stores the raw parsed fields plus the wrappers the resolver
//! attaches during validation. Wrapper fields are `None` until the node
//! reaches the Validated state.

use crate::error::ScriptError;
use crate::object::Registry;
use crate::script::ast::{Condition, Expression, PlotAction, RelOp};
use crate::wrapper::{rename_in_text, ElementWrapper, MathNode};

/// A condition whose operands have been resolved to wrappers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCondition {
    /// Left operand.
    pub lhs: ElementWrapper,
    /// Relational operator.
    pub op: RelOp,
    /// Right operand.
    pub rhs: ElementWrapper,
}

impl ResolvedCondition {
    /// Evaluate both operands as reals and apply the operator.
    pub fn evaluate(&self, map: &Registry) -> Result<bool, ScriptError> {
        let l = self.lhs.evaluate_real(map)?;
        let r = self.rhs.evaluate_real(map)?;
        Ok(self.op.apply(l, r))
    }

    /// Validate both operand wrappers against `map`.
    pub fn validate(&self, map: &Registry) -> Result<(), ScriptError> {
        self.lhs.validate(map)?;
        self.rhs.validate(map)
    }

    /// Propagate an object rename through both operands.
    pub fn rename_object(&mut self, old: &str, new: &str) {
        self.lhs.rename_object(old, new);
        self.rhs.rename_object(old, new);
    }
}

/// The closed set of command kinds a sequence node can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// Configure one or more objects of a named type.
    Create {
        /// Type-name string.
        type_name: String,
        /// Names to create.
        names: Vec<String>,
    },
    /// Assign an expression to a wrapped target.
    Assignment {
        /// Target reference text.
        target_desc: String,
        /// Raw right-hand side.
        expr: Expression,
        /// Resolved target wrapper.
        target: Option<ElementWrapper>,
        /// Resolved right-hand side tree.
        tree: Option<MathNode>,
    },
    /// Branch command: If/Else/EndIf.
    If {
        /// Raw condition.
        condition: Condition,
        /// Resolved condition.
        resolved: Option<ResolvedCondition>,
    },
    /// Branch command: While/EndWhile loop.
    While {
        /// Raw condition, re-evaluated on each arrival.
        condition: Condition,
        /// Resolved condition.
        resolved: Option<ResolvedCondition>,
    },
    /// Branch command: solver-driven Target loop.
    Target {
        /// Solver object name.
        solver: String,
    },
    /// Declare a solver control variable inside a Target body.
    Vary {
        /// Solver object name.
        solver: String,
        /// Control variable reference text.
        variable_desc: String,
        /// Initial guess.
        initial: Expression,
        /// Resolved control variable wrapper.
        variable: Option<ElementWrapper>,
        /// Resolved initial guess tree.
        initial_tree: Option<MathNode>,
    },
    /// Declare a solver goal inside a Target body.
    Achieve {
        /// Solver object name.
        solver: String,
        /// Goal reference text.
        goal_desc: String,
        /// Desired value.
        value: Expression,
        /// Convergence tolerance override.
        tolerance: Option<f64>,
        /// Resolved goal wrapper.
        goal: Option<ElementWrapper>,
        /// Resolved desired-value tree.
        value_tree: Option<MathNode>,
    },
    /// Run the external propagator until the stop condition is met.
    Propagate {
        /// Propagator object name.
        propagator: String,
        /// Spacecraft object name.
        spacecraft: String,
        /// Stop-condition reference text.
        stop_desc: String,
        /// Stop-condition value.
        stop_value: Expression,
        /// Resolved stop-condition wrapper.
        stop: Option<ElementWrapper>,
        /// Resolved stop-value tree.
        stop_tree: Option<MathNode>,
    },
    /// Apply an impulsive burn to a spacecraft.
    Maneuver {
        /// Burn object name.
        burn: String,
        /// Spacecraft object name.
        spacecraft: String,
    },
    /// Write evaluated items to a report file object.
    Report {
        /// Report-file object name.
        file: String,
        /// Raw item reference texts.
        item_descs: Vec<String>,
        /// Resolved item wrappers.
        items: Vec<ElementWrapper>,
    },
    /// Dispatch a named action to a plot object.
    PlotCommand {
        /// Plot object name.
        plot: String,
        /// The action to dispatch.
        action: PlotAction,
    },
    /// Halt the run between commands.
    Stop,
    /// Verbatim block preserved for round-trip.
    Verbatim {
        /// The enclosed text.
        text: String,
    },
    /// Terminator of an If construct.
    EndIf,
    /// Terminator of a While construct; control jumps back to the While.
    EndWhile,
    /// Terminator of a Target construct.
    EndTarget,
}

impl CommandKind {
    /// The command's type name, as reported in errors and summaries.
    pub fn type_name(&self) -> &'static str {
        match self {
            CommandKind::Create { .. } => "Create",
            CommandKind::Assignment { .. } => "Assignment",
            CommandKind::If { .. } => "If",
            CommandKind::While { .. } => "While",
            CommandKind::Target { .. } => "Target",
            CommandKind::Vary { .. } => "Vary",
            CommandKind::Achieve { .. } => "Achieve",
            CommandKind::Propagate { .. } => "Propagate",
            CommandKind::Maneuver { .. } => "Maneuver",
            CommandKind::Report { .. } => "Report",
            CommandKind::PlotCommand { action, .. } => action.keyword(),
            CommandKind::Stop => "Stop",
            CommandKind::Verbatim { .. } => "BeginScript",
            CommandKind::EndIf => "EndIf",
            CommandKind::EndWhile => "EndWhile",
            CommandKind::EndTarget => "EndTarget",
        }
    }

    /// Whether this command owns branch sub-chains.
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            CommandKind::If { .. } | CommandKind::While { .. } | CommandKind::Target { .. }
        )
    }

    /// Whether this command terminates a branch construct.
    pub fn is_end(&self) -> bool {
        matches!(
            self,
            CommandKind::EndIf | CommandKind::EndWhile | CommandKind::EndTarget
        )
    }

    /// The plain object names this command declares needing, looked up
    /// before wrapper creation.
    pub fn ref_object_names(&self) -> Vec<String> {
        match self {
            CommandKind::Propagate {
                propagator,
                spacecraft,
                ..
            } => vec![propagator.clone(), spacecraft.clone()],
            CommandKind::Maneuver { burn, spacecraft } => {
                vec![burn.clone(), spacecraft.clone()]
            }
            CommandKind::Report { file, .. } => vec![file.clone()],
            CommandKind::PlotCommand { plot, .. } => vec![plot.clone()],
            CommandKind::Target { solver } => vec![solver.clone()],
            CommandKind::Vary { solver, .. } | CommandKind::Achieve { solver, .. } => {
                vec![solver.clone()]
            }
            _ => Vec::new(),
        }
    }

    /// Re-check every attached wrapper against `map`; used when a node is
    /// initialized against a fresh per-run object map.
    pub fn revalidate(&self, map: &Registry) -> Result<(), ScriptError> {
        match self {
            CommandKind::Assignment { target, tree, .. } => {
                if let Some(w) = target {
                    w.validate(map)?;
                }
                if let Some(t) = tree {
                    t.validate(map)?;
                }
                Ok(())
            }
            CommandKind::If { resolved, .. } | CommandKind::While { resolved, .. } => {
                match resolved {
                    Some(c) => c.validate(map),
                    None => Ok(()),
                }
            }
            CommandKind::Vary {
                variable,
                initial_tree,
                ..
            } => {
                if let Some(w) = variable {
                    w.validate(map)?;
                }
                if let Some(t) = initial_tree {
                    t.validate(map)?;
                }
                Ok(())
            }
            CommandKind::Achieve {
                goal, value_tree, ..
            } => {
                if let Some(w) = goal {
                    w.validate(map)?;
                }
                if let Some(t) = value_tree {
                    t.validate(map)?;
                }
                Ok(())
            }
            CommandKind::Propagate {
                stop, stop_tree, ..
            } => {
                if let Some(w) = stop {
                    w.validate(map)?;
                }
                if let Some(t) = stop_tree {
                    t.validate(map)?;
                }
                Ok(())
            }
            CommandKind::Report { items, .. } => {
                for w in items {
                    w.validate(map)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Propagate an object rename through every stored name, description,
    /// and wrapper.
    pub fn rename_object(&mut self, old: &str, new: &str) {
        let fix = |s: &mut String| {
            if s == old {
                *s = new.to_string();
            }
        };
        match self {
            CommandKind::Create { names, .. } => {
                for n in names {
                    fix(n);
                }
            }
            CommandKind::Assignment {
                target_desc,
                expr,
                target,
                tree,
            } => {
                *target_desc = rename_in_text(target_desc, old, new);
                rename_expression(expr, old, new);
                if let Some(w) = target {
                    w.rename_object(old, new);
                }
                if let Some(t) = tree {
                    t.rename_object(old, new);
                }
            }
            CommandKind::If {
                condition,
                resolved,
            }
            | CommandKind::While {
                condition,
                resolved,
            } => {
                condition.lhs = rename_in_text(&condition.lhs, old, new);
                condition.rhs = rename_in_text(&condition.rhs, old, new);
                if let Some(c) = resolved {
                    c.rename_object(old, new);
                }
            }
            CommandKind::Target { solver } => fix(solver),
            CommandKind::Vary {
                solver,
                variable_desc,
                initial,
                variable,
                initial_tree,
            } => {
                fix(solver);
                *variable_desc = rename_in_text(variable_desc, old, new);
                rename_expression(initial, old, new);
                if let Some(w) = variable {
                    w.rename_object(old, new);
                }
                if let Some(t) = initial_tree {
                    t.rename_object(old, new);
                }
            }
            CommandKind::Achieve {
                solver,
                goal_desc,
                value,
                goal,
                value_tree,
                ..
            } => {
                fix(solver);
                *goal_desc = rename_in_text(goal_desc, old, new);
                rename_expression(value, old, new);
                if let Some(w) = goal {
                    w.rename_object(old, new);
                }
                if let Some(t) = value_tree {
                    t.rename_object(old, new);
                }
            }
            CommandKind::Propagate {
                propagator,
                spacecraft,
                stop_desc,
                stop_value,
                stop,
                stop_tree,
            } => {
                fix(propagator);
                fix(spacecraft);
                *stop_desc = rename_in_text(stop_desc, old, new);
                rename_expression(stop_value, old, new);
                if let Some(w) = stop {
                    w.rename_object(old, new);
                }
                if let Some(t) = stop_tree {
                    t.rename_object(old, new);
                }
            }
            CommandKind::Maneuver { burn, spacecraft } => {
                fix(burn);
                fix(spacecraft);
            }
            CommandKind::Report {
                file,
                item_descs,
                items,
            } => {
                fix(file);
                for d in item_descs {
                    *d = rename_in_text(d, old, new);
                }
                for w in items {
                    w.rename_object(old, new);
                }
            }
            CommandKind::PlotCommand { plot, .. } => fix(plot),
            CommandKind::Stop
            | CommandKind::Verbatim { .. }
            | CommandKind::EndIf
            | CommandKind::EndWhile
            | CommandKind::EndTarget => {}
        }
    }
}

/// Propagate an object rename through an unresolved expression tree.
fn rename_expression(expr: &mut Expression, old: &str, new: &str) {
    match expr {
        Expression::Reference(desc) => *desc = rename_in_text(desc, old, new),
        Expression::Binary { left, right, .. } => {
            rename_expression(left, old, new);
            rename_expression(right, old, new);
        }
        Expression::Negate(inner) => rename_expression(inner, old, new),
        Expression::Number(_) | Expression::StringLit(_) => {}
    }
}
