//! Reference resolution: description strings to wrappers, and sequence
//! validation against the configured objects.
//!
//! Resolution is name-driven and happens before any command runs. The
//! resolver owns the precedence rules that decide what a description like
//! `Sat1.X` means, and the bulk-validation pass that either stops at the
//! first bad reference or accumulates every error for diagnostics.

use log::{debug, warn};

use crate::error::ScriptError;
use crate::object::{ObjectKind, ParamKind, ParameterDef, Registry};
use crate::script::ast::{Condition, Expression};
use crate::sequence::{CommandKind, MissionSequence, NodeState, ResolvedCondition};
use crate::wrapper::{ElementWrapper, MathNode};

/// How the resolver handles computed parameters it discovers while
/// building wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamManage {
    /// Register discovered parameters; a conflicting registration fails.
    #[default]
    Register,
    /// Build the wrapper without touching the parameter table.
    Transient,
    /// Register, silently replacing any previous definition.
    Overwrite,
}

/// Resolution and validation context over a configured-object registry.
pub struct ResolveContext<'a> {
    registry: &'a mut Registry,
    /// Try computed parameters before object slots for `Obj.Field`
    /// descriptions.
    pub parameters_first: bool,
    /// Accumulate validation errors instead of stopping at the first.
    pub continue_on_error: bool,
    /// Parameter-table policy for discovered parameters.
    pub manage: ParamManage,
    /// Create a Variable object for an unknown bare name instead of
    /// failing.
    pub auto_create_variables: bool,
    errors: Vec<ScriptError>,
}

impl<'a> ResolveContext<'a> {
    /// A context with the default policy: parameters first, fail fast,
    /// register discovered parameters.
    pub fn new(registry: &'a mut Registry) -> Self {
        ResolveContext {
            registry,
            parameters_first: true,
            continue_on_error: false,
            manage: ParamManage::Register,
            auto_create_variables: false,
            errors: Vec::new(),
        }
    }

    /// Errors accumulated so far.
    pub fn errors(&self) -> &[ScriptError] {
        &self.errors
    }

    /// Take the accumulated errors, leaving the context empty.
    pub fn take_errors(&mut self) -> Vec<ScriptError> {
        std::mem::take(&mut self.errors)
    }

    /// Find the object a description is rooted at, stripping any index
    /// or dotted suffix.
    pub fn find_object(&self, desc: &str) -> Option<&crate::object::ModelObject> {
        let base = desc
            .split(|c| c == '.' || c == '(')
            .next()
            .unwrap_or(desc)
            .trim();
        self.registry.get(base)
    }

    /// Build a wrapper for a description string.
    ///
    /// Precedence: numeric literal, quoted string, On/Off, true/false,
    /// bare object name, array element, then dotted references, where the
    /// `parameters_first` flag decides whether `Obj.Field` tries a
    /// computed parameter or an object slot first.
    pub fn create_element_wrapper(
        &mut self,
        desc: &str,
    ) -> Result<ElementWrapper, ScriptError> {
        let desc = desc.trim();
        if let Ok(value) = desc.parse::<f64>() {
            return Ok(ElementWrapper::Number {
                desc: desc.to_string(),
                value,
            });
        }
        if desc.starts_with('\'') && desc.ends_with('\'') && desc.len() >= 2 {
            return Ok(ElementWrapper::StringLit {
                desc: desc.to_string(),
                value: desc[1..desc.len() - 1].to_string(),
            });
        }
        match desc {
            "On" | "Off" => {
                return Ok(ElementWrapper::OnOff {
                    desc: desc.to_string(),
                    value: desc == "On",
                })
            }
            "true" | "false" => {
                return Ok(ElementWrapper::Boolean {
                    desc: desc.to_string(),
                    value: desc == "true",
                })
            }
            _ => {}
        }
        if let Some((name, indices)) = split_array_index(desc) {
            return self.array_element_wrapper(desc, name, indices);
        }
        if !desc.contains('.') {
            return self.bare_name_wrapper(desc);
        }
        self.dotted_wrapper(desc)
    }

    fn bare_name_wrapper(&mut self, desc: &str) -> Result<ElementWrapper, ScriptError> {
        if let Some(obj) = self.registry.get(desc) {
            let wrapper = match obj.kind() {
                ObjectKind::Variable | ObjectKind::StringVar => ElementWrapper::Variable {
                    desc: desc.to_string(),
                    name: desc.to_string(),
                },
                _ => ElementWrapper::ObjectRef {
                    desc: desc.to_string(),
                    name: desc.to_string(),
                },
            };
            return Ok(wrapper);
        }
        if self.auto_create_variables && is_identifier(desc) {
            debug!("auto-creating variable {desc}");
            self.registry.create_of_kind(ObjectKind::Variable, desc)?;
            return Ok(ElementWrapper::Variable {
                desc: desc.to_string(),
                name: desc.to_string(),
            });
        }
        Err(ScriptError::not_found(desc))
    }

    fn array_element_wrapper(
        &mut self,
        desc: &str,
        name: &str,
        indices: Vec<&str>,
    ) -> Result<ElementWrapper, ScriptError> {
        let obj = self
            .registry
            .get(name)
            .ok_or_else(|| ScriptError::not_found(name))?;
        if obj.kind() != ObjectKind::Array {
            return Err(ScriptError::TypeMismatch(format!(
                "{name} is a {}, expected Array",
                obj.kind().type_name()
            )));
        }
        let (row, col) = match indices.as_slice() {
            // A single index addresses a column of a one-row array.
            [c] => (
                ElementWrapper::Number {
                    desc: "1".to_string(),
                    value: 1.0,
                },
                self.create_element_wrapper(c)?,
            ),
            [r, c] => (
                self.create_element_wrapper(r)?,
                self.create_element_wrapper(c)?,
            ),
            _ => {
                return Err(ScriptError::GrammarViolation(format!(
                    "'{desc}' has more than two array indices"
                )))
            }
        };
        Ok(ElementWrapper::ArrayElement {
            desc: desc.to_string(),
            array: name.to_string(),
            row: Box::new(row),
            col: Box::new(col),
        })
    }

    fn dotted_wrapper(&mut self, desc: &str) -> Result<ElementWrapper, ScriptError> {
        let parts: Vec<&str> = desc.split('.').collect();
        match parts.as_slice() {
            [owner, field] => {
                if !self.registry.contains(owner) {
                    return Err(ScriptError::not_found(owner));
                }
                if self.parameters_first {
                    self.parameter_wrapper(desc, owner, None, field)
                        .or_else(|_| self.property_wrapper(desc, owner, field))
                } else {
                    self.property_wrapper(desc, owner, field)
                        .or_else(|_| self.parameter_wrapper(desc, owner, None, field))
                }
            }
            [owner, dependency, field] => {
                if !self.registry.contains(owner) {
                    return Err(ScriptError::not_found(owner));
                }
                let dep = self
                    .registry
                    .get(dependency)
                    .ok_or_else(|| ScriptError::not_found(dependency))?;
                if dep.kind() != ObjectKind::CoordinateSystem {
                    return Err(ScriptError::TypeMismatch(format!(
                        "{dependency} is a {}, expected CoordinateSystem",
                        dep.kind().type_name()
                    )));
                }
                self.parameter_wrapper(desc, owner, Some(dependency), field)
            }
            _ => Err(ScriptError::GrammarViolation(format!(
                "'{desc}' has too many qualification levels"
            ))),
        }
    }

    fn parameter_wrapper(
        &mut self,
        desc: &str,
        owner: &str,
        dependency: Option<&str>,
        field: &str,
    ) -> Result<ElementWrapper, ScriptError> {
        let kind = ParamKind::from_name(field).ok_or_else(|| {
            ScriptError::not_found(&format!("parameter {field}"))
        })?;
        let obj = self
            .registry
            .get(owner)
            .ok_or_else(|| ScriptError::not_found(owner))?;
        if !kind.available_for(obj.kind()) {
            return Err(ScriptError::TypeMismatch(format!(
                "parameter {} is not defined for {} objects",
                kind.name(),
                obj.kind().type_name()
            )));
        }
        let def = ParameterDef {
            owner: owner.to_string(),
            dependency: dependency.map(str::to_string),
            kind,
        };
        match self.manage {
            ParamManage::Register => self.registry.register_parameter(desc, def)?,
            ParamManage::Overwrite => self.registry.overwrite_parameter(desc, def),
            ParamManage::Transient => {}
        }
        Ok(ElementWrapper::Parameter {
            desc: desc.to_string(),
            owner: owner.to_string(),
            dependency: dependency.map(str::to_string),
            kind,
        })
    }

    fn property_wrapper(
        &mut self,
        desc: &str,
        owner: &str,
        field: &str,
    ) -> Result<ElementWrapper, ScriptError> {
        let obj = self
            .registry
            .get(owner)
            .ok_or_else(|| ScriptError::not_found(owner))?;
        obj.parameter_id(field)?;
        Ok(ElementWrapper::ObjectProperty {
            desc: desc.to_string(),
            object: owner.to_string(),
            property: field.to_string(),
        })
    }

    /// Build a math tree from a parsed expression, resolving every
    /// reference leaf.
    pub fn build_math_tree(&mut self, expr: &Expression) -> Result<MathNode, ScriptError> {
        match expr {
            Expression::Number(v) => Ok(MathNode::Leaf(ElementWrapper::Number {
                desc: format_number(*v),
                value: *v,
            })),
            Expression::StringLit(s) => Ok(MathNode::Leaf(ElementWrapper::StringLit {
                desc: format!("'{s}'"),
                value: s.clone(),
            })),
            Expression::Reference(desc) => {
                Ok(MathNode::Leaf(self.create_element_wrapper(desc)?))
            }
            Expression::Binary { op, left, right } => Ok(MathNode::Binary {
                op: *op,
                left: Box::new(self.build_math_tree(left)?),
                right: Box::new(self.build_math_tree(right)?),
            }),
            Expression::Negate(inner) => {
                Ok(MathNode::Negate(Box::new(self.build_math_tree(inner)?)))
            }
        }
    }

    /// Resolve both operands of a relational condition.
    pub fn resolve_condition(
        &mut self,
        cond: &Condition,
    ) -> Result<ResolvedCondition, ScriptError> {
        Ok(ResolvedCondition {
            lhs: self.create_element_wrapper(&cond.lhs)?,
            op: cond.op,
            rhs: self.create_element_wrapper(&cond.rhs)?,
        })
    }

    /// Validate every node of a sequence, building wrappers in place.
    ///
    /// In fail-fast mode the first error is returned and later nodes are
    /// left untouched. With `continue_on_error` set, every failing node is
    /// marked Invalid, its error is accumulated, and validation proceeds.
    pub fn validate_sequence(&mut self, seq: &mut MissionSequence) -> Result<(), ScriptError> {
        for id in seq.ids() {
            if let Err(err) = self.validate_node(seq, id) {
                seq.node_mut(id).state = NodeState::Invalid;
                if self.continue_on_error {
                    warn!("validation of '{}' failed: {err}", seq.node(id).script);
                    self.errors.push(err);
                } else {
                    return Err(err);
                }
            } else {
                seq.node_mut(id).state = NodeState::Validated;
            }
        }
        Ok(())
    }

    fn validate_node(
        &mut self,
        seq: &mut MissionSequence,
        id: crate::sequence::NodeId,
    ) -> Result<(), ScriptError> {
        // Declared object names resolve before any wrapper is built.
        for name in seq.node(id).kind.ref_object_names() {
            if !self.registry.contains(&name) {
                return Err(ScriptError::not_found(&name));
            }
        }
        let mut kind = seq.node(id).kind.clone();
        self.resolve_kind(&mut kind)?;
        seq.node_mut(id).kind = kind;
        Ok(())
    }

    fn expect_kind(&self, name: &str, wanted: ObjectKind) -> Result<(), ScriptError> {
        let obj = self
            .registry
            .get(name)
            .ok_or_else(|| ScriptError::not_found(name))?;
        if obj.kind() != wanted {
            return Err(ScriptError::TypeMismatch(format!(
                "{name} is a {}, expected {}",
                obj.kind().type_name(),
                wanted.type_name()
            )));
        }
        Ok(())
    }

    fn resolve_kind(&mut self, kind: &mut CommandKind) -> Result<(), ScriptError> {
        match kind {
            CommandKind::Create { type_name, .. } => {
                ObjectKind::from_type_name(type_name).ok_or_else(|| {
                    ScriptError::ReferenceNotFound(format!("unknown object type {type_name}"))
                })?;
                Ok(())
            }
            CommandKind::Assignment {
                target_desc,
                expr,
                target,
                tree,
            } => {
                *target = Some(self.create_element_wrapper(target_desc)?);
                *tree = Some(self.build_math_tree(expr)?);
                Ok(())
            }
            CommandKind::If {
                condition,
                resolved,
            }
            | CommandKind::While {
                condition,
                resolved,
            } => {
                *resolved = Some(self.resolve_condition(condition)?);
                Ok(())
            }
            CommandKind::Target { solver } => {
                self.expect_kind(solver, ObjectKind::DifferentialCorrector)
            }
            CommandKind::Vary {
                solver,
                variable_desc,
                initial,
                variable,
                initial_tree,
            } => {
                self.expect_kind(solver, ObjectKind::DifferentialCorrector)?;
                *variable = Some(self.create_element_wrapper(variable_desc)?);
                *initial_tree = Some(self.build_math_tree(initial)?);
                Ok(())
            }
            CommandKind::Achieve {
                solver,
                goal_desc,
                value,
                goal,
                value_tree,
                ..
            } => {
                self.expect_kind(solver, ObjectKind::DifferentialCorrector)?;
                *goal = Some(self.create_element_wrapper(goal_desc)?);
                *value_tree = Some(self.build_math_tree(value)?);
                Ok(())
            }
            CommandKind::Propagate {
                propagator,
                spacecraft,
                stop_desc,
                stop_value,
                stop,
                stop_tree,
            } => {
                self.expect_kind(propagator, ObjectKind::Propagator)?;
                self.expect_kind(spacecraft, ObjectKind::Spacecraft)?;
                *stop = Some(self.create_element_wrapper(stop_desc)?);
                *stop_tree = Some(self.build_math_tree(stop_value)?);
                Ok(())
            }
            CommandKind::Maneuver { burn, spacecraft } => {
                self.expect_kind(burn, ObjectKind::ImpulsiveBurn)?;
                self.expect_kind(spacecraft, ObjectKind::Spacecraft)
            }
            CommandKind::Report {
                file,
                item_descs,
                items,
            } => {
                self.expect_kind(file, ObjectKind::ReportFile)?;
                let mut wrappers = Vec::with_capacity(item_descs.len());
                for desc in item_descs.iter() {
                    wrappers.push(self.create_element_wrapper(desc)?);
                }
                *items = wrappers;
                Ok(())
            }
            CommandKind::PlotCommand { plot, .. } => {
                self.expect_kind(plot, ObjectKind::XYPlot)
            }
            CommandKind::Stop
            | CommandKind::Verbatim { .. }
            | CommandKind::EndIf
            | CommandKind::EndWhile
            | CommandKind::EndTarget => Ok(()),
        }
    }
}

/// Split `Name(i)` or `Name(i, j)` into the base name and index texts.
/// Index texts may themselves be full expressions; commas nested inside
/// parentheses stay with their index.
fn split_array_index(desc: &str) -> Option<(&str, Vec<&str>)> {
    let open = desc.find('(')?;
    if !desc.ends_with(')') || open == 0 {
        return None;
    }
    let name = &desc[..open];
    if !is_identifier(name) {
        return None;
    }
    let inner = &desc[open + 1..desc.len() - 1];
    let mut indices = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                indices.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    indices.push(inner[start..].trim());
    Some((name, indices))
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Format a numeric literal the way the script writer would.
fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_script;
    use crate::wrapper::WrapperKind;

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.create("Spacecraft", "Sat1").unwrap();
        reg.create("Variable", "v").unwrap();
        reg.create("XYPlot", "Plot1").unwrap();
        reg.create_array("A", 2, 3).unwrap();
        reg
    }

    #[test]
    fn literal_precedence_beats_object_lookup() {
        let mut reg = registry();
        let mut ctx = ResolveContext::new(&mut reg);
        assert_eq!(
            ctx.create_element_wrapper("7000").unwrap().kind(),
            WrapperKind::Number
        );
        assert_eq!(
            ctx.create_element_wrapper("'hi'").unwrap().kind(),
            WrapperKind::String
        );
        assert_eq!(
            ctx.create_element_wrapper("On").unwrap().kind(),
            WrapperKind::OnOff
        );
        assert_eq!(
            ctx.create_element_wrapper("v").unwrap().kind(),
            WrapperKind::Variable
        );
    }

    #[test]
    fn dotted_reference_prefers_parameters_when_configured() {
        let mut reg = registry();
        let mut ctx = ResolveContext::new(&mut reg);
        let w = ctx.create_element_wrapper("Sat1.X").unwrap();
        assert_eq!(w.kind(), WrapperKind::Parameter);
        // The discovered parameter lands in the registry table.
        assert!(reg.parameter("Sat1.X").is_some());

        let mut reg = registry();
        let mut ctx = ResolveContext::new(&mut reg);
        ctx.parameters_first = false;
        let w = ctx.create_element_wrapper("Sat1.X").unwrap();
        assert_eq!(w.kind(), WrapperKind::ObjectProperty);
    }

    #[test]
    fn transient_mode_leaves_the_parameter_table_alone() {
        let mut reg = registry();
        let mut ctx = ResolveContext::new(&mut reg);
        ctx.manage = ParamManage::Transient;
        let w = ctx.create_element_wrapper("Sat1.Rmag").unwrap();
        assert_eq!(w.kind(), WrapperKind::Parameter);
        assert!(reg.parameter("Sat1.Rmag").is_none());
    }

    #[test]
    fn array_element_with_reference_index() {
        let mut reg = registry();
        let mut ctx = ResolveContext::new(&mut reg);
        let w = ctx.create_element_wrapper("A(1, v)").unwrap();
        match w {
            ElementWrapper::ArrayElement { array, col, .. } => {
                assert_eq!(array, "A");
                // Reference indices resolve later, against the run map.
                assert_eq!(col.kind(), WrapperKind::Variable);
            }
            other => panic!("unexpected wrapper {other:?}"),
        }
    }

    #[test]
    fn plot_dispatch_rejects_wrong_kind_naming_the_actual_type() {
        let mut reg = registry();
        let block =
            parse_script("Create Spacecraft Sat1\nClearPlot Sat1\n").unwrap();
        let mut seq = MissionSequence::from_block(&block);
        let mut ctx = ResolveContext::new(&mut reg);
        let err = ctx.validate_sequence(&mut seq).unwrap_err();
        match err {
            ScriptError::TypeMismatch(msg) => {
                assert!(msg.contains("Spacecraft"), "message was {msg}")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn continue_on_error_accumulates_and_proceeds() {
        let mut reg = registry();
        let block = parse_script(
            "v = 1\nClearPlot Sat9\nv = 2\n",
        )
        .unwrap();
        let mut seq = MissionSequence::from_block(&block);
        let mut ctx = ResolveContext::new(&mut reg);
        ctx.continue_on_error = true;
        ctx.validate_sequence(&mut seq).unwrap();
        let errors = ctx.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ScriptError::ReferenceNotFound(_)));
        // Nodes after the failing one still validated.
        let last = seq.ids().last().unwrap();
        assert_eq!(seq.node(last).state, NodeState::Validated);
        let bad = seq
            .ids()
            .find(|&i| seq.node(i).script.contains("Sat9"))
            .unwrap();
        assert_eq!(seq.node(bad).state, NodeState::Invalid);
    }

    #[test]
    fn unknown_bare_name_fails_unless_auto_create_is_on() {
        let mut reg = registry();
        let mut ctx = ResolveContext::new(&mut reg);
        assert!(matches!(
            ctx.create_element_wrapper("w9"),
            Err(ScriptError::ReferenceNotFound(_))
        ));
        ctx.auto_create_variables = true;
        let w = ctx.create_element_wrapper("w9").unwrap();
        assert_eq!(w.kind(), WrapperKind::Variable);
        assert!(reg.contains("w9"));
    }
}
