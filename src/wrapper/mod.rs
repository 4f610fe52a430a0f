//! Element wrappers: a uniform read/write facade over disparate value
//! sources.
//!
//! A wrapper abstracts "a place to read or write a value" regardless of
//! whether that place is a literal, a configured object, an object slot, a
//! computed parameter, a user variable, or an array element. Wrappers hold
//! names, never object pointers; every access re-resolves against the
//! object map passed in, so the same wrapper works against the configured
//! registry and against per-run clones.

pub mod math;

pub use math::{MathNode, MathOp};

use crate::error::ScriptError;
use crate::object::{ObjectKind, ParamKind, ParamValue, Registry};

/// Closed set of wrapper kinds, used in type-mismatch messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKind {
    /// Numeric literal.
    Number,
    /// String literal.
    String,
    /// On/Off literal.
    OnOff,
    /// Boolean literal.
    Boolean,
    /// A configured object as a whole.
    Object,
    /// A slot on a configured object.
    ObjectProperty,
    /// A computed parameter, optionally dependency-qualified.
    Parameter,
    /// A user variable object.
    Variable,
    /// One element of an array object.
    ArrayElement,
}

impl WrapperKind {
    /// Human-readable kind name.
    pub fn name(&self) -> &'static str {
        match self {
            WrapperKind::Number => "Number",
            WrapperKind::String => "String",
            WrapperKind::OnOff => "OnOff",
            WrapperKind::Boolean => "Boolean",
            WrapperKind::Object => "Object",
            WrapperKind::ObjectProperty => "ObjectProperty",
            WrapperKind::Parameter => "Parameter",
            WrapperKind::Variable => "Variable",
            WrapperKind::ArrayElement => "ArrayElement",
        }
    }
}

/// A typed handle over one value source.
///
/// Each variant keeps the original description text so that regenerated
/// script text (including after renames) matches what the user wrote.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementWrapper {
    /// A numeric literal such as `7000` or `3.14`.
    Number {
        /// Original text.
        desc: String,
        /// Parsed value.
        value: f64,
    },
    /// A quoted string literal.
    StringLit {
        /// Original text.
        desc: String,
        /// Unquoted value.
        value: String,
    },
    /// The literals `On` / `Off`.
    OnOff {
        /// Original text.
        desc: String,
        /// `true` for On.
        value: bool,
    },
    /// The literals `true` / `false`.
    Boolean {
        /// Original text.
        desc: String,
        /// Parsed value.
        value: bool,
    },
    /// A configured object referenced as a whole.
    ObjectRef {
        /// Original text.
        desc: String,
        /// Referenced object name.
        name: String,
    },
    /// A slot on a configured object, `Obj.Slot`.
    ObjectProperty {
        /// Original text.
        desc: String,
        /// Owner object name.
        object: String,
        /// Slot name.
        property: String,
    },
    /// A computed parameter, `Obj.Param` or `Obj.Dep.Param`.
    Parameter {
        /// Original text.
        desc: String,
        /// Owner object name.
        owner: String,
        /// Optional dependency (coordinate system) name.
        dependency: Option<String>,
        /// The computed quantity.
        kind: ParamKind,
    },
    /// A scalar user variable object.
    Variable {
        /// Original text.
        desc: String,
        /// Variable object name.
        name: String,
    },
    /// One element of an array object, `Arr(row, col)`, 1-based.
    ArrayElement {
        /// Original text.
        desc: String,
        /// Array object name.
        array: String,
        /// Row index source.
        row: Box<ElementWrapper>,
        /// Column index source.
        col: Box<ElementWrapper>,
    },
}

impl ElementWrapper {
    /// The wrapper's kind tag.
    pub fn kind(&self) -> WrapperKind {
        match self {
            ElementWrapper::Number { .. } => WrapperKind::Number,
            ElementWrapper::StringLit { .. } => WrapperKind::String,
            ElementWrapper::OnOff { .. } => WrapperKind::OnOff,
            ElementWrapper::Boolean { .. } => WrapperKind::Boolean,
            ElementWrapper::ObjectRef { .. } => WrapperKind::Object,
            ElementWrapper::ObjectProperty { .. } => WrapperKind::ObjectProperty,
            ElementWrapper::Parameter { .. } => WrapperKind::Parameter,
            ElementWrapper::Variable { .. } => WrapperKind::Variable,
            ElementWrapper::ArrayElement { .. } => WrapperKind::ArrayElement,
        }
    }

    /// The original description text.
    pub fn description(&self) -> &str {
        match self {
            ElementWrapper::Number { desc, .. }
            | ElementWrapper::StringLit { desc, .. }
            | ElementWrapper::OnOff { desc, .. }
            | ElementWrapper::Boolean { desc, .. }
            | ElementWrapper::ObjectRef { desc, .. }
            | ElementWrapper::ObjectProperty { desc, .. }
            | ElementWrapper::Parameter { desc, .. }
            | ElementWrapper::Variable { desc, .. }
            | ElementWrapper::ArrayElement { desc, .. } => desc,
        }
    }

    /// Names of the objects this wrapper must resolve against.
    pub fn ref_object_names(&self) -> Vec<String> {
        match self {
            ElementWrapper::ObjectRef { name, .. } | ElementWrapper::Variable { name, .. } => {
                vec![name.clone()]
            }
            ElementWrapper::ObjectProperty { object, .. } => vec![object.clone()],
            ElementWrapper::Parameter {
                owner, dependency, ..
            } => {
                let mut names = vec![owner.clone()];
                if let Some(dep) = dependency {
                    names.push(dep.clone());
                }
                names
            }
            ElementWrapper::ArrayElement {
                array, row, col, ..
            } => {
                let mut names = vec![array.clone()];
                names.extend(row.ref_object_names());
                names.extend(col.ref_object_names());
                names
            }
            _ => Vec::new(),
        }
    }

    /// Confirm every referenced name resolves in `map` with a compatible
    /// type. A wrapper is either fully resolved or in an error state that
    /// must surface before execution.
    pub fn validate(&self, map: &Registry) -> Result<(), ScriptError> {
        match self {
            ElementWrapper::Number { .. }
            | ElementWrapper::StringLit { .. }
            | ElementWrapper::OnOff { .. }
            | ElementWrapper::Boolean { .. } => Ok(()),
            ElementWrapper::ObjectRef { name, .. } => {
                map.get(name).ok_or_else(|| ScriptError::not_found(name))?;
                Ok(())
            }
            ElementWrapper::Variable { name, .. } => {
                let obj = map.get(name).ok_or_else(|| ScriptError::not_found(name))?;
                if obj.kind() != ObjectKind::Variable && obj.kind() != ObjectKind::StringVar {
                    return Err(ScriptError::TypeMismatch(format!(
                        "{name} is a {}, expected Variable",
                        obj.kind().type_name()
                    )));
                }
                Ok(())
            }
            ElementWrapper::ObjectProperty {
                object, property, ..
            } => {
                let obj = map
                    .get(object)
                    .ok_or_else(|| ScriptError::not_found(object))?;
                obj.parameter_id(property)?;
                Ok(())
            }
            ElementWrapper::Parameter {
                owner,
                dependency,
                kind,
                ..
            } => {
                let obj = map.get(owner).ok_or_else(|| ScriptError::not_found(owner))?;
                if !kind.available_for(obj.kind()) {
                    return Err(ScriptError::TypeMismatch(format!(
                        "parameter {} is not defined for {} objects",
                        kind.name(),
                        obj.kind().type_name()
                    )));
                }
                if let Some(dep) = dependency {
                    let dep_obj = map.get(dep).ok_or_else(|| ScriptError::not_found(dep))?;
                    if dep_obj.kind() != ObjectKind::CoordinateSystem {
                        return Err(ScriptError::TypeMismatch(format!(
                            "{dep} is a {}, expected CoordinateSystem",
                            dep_obj.kind().type_name()
                        )));
                    }
                }
                Ok(())
            }
            ElementWrapper::ArrayElement {
                array, row, col, ..
            } => {
                let obj = map.get(array).ok_or_else(|| ScriptError::not_found(array))?;
                if obj.kind() != ObjectKind::Array {
                    return Err(ScriptError::TypeMismatch(format!(
                        "{array} is a {}, expected Array",
                        obj.kind().type_name()
                    )));
                }
                row.validate(map)?;
                col.validate(map)
            }
        }
    }

    fn mismatch(&self, wanted: &str) -> ScriptError {
        ScriptError::TypeMismatch(format!(
            "cannot {wanted} through a {} wrapper ('{}')",
            self.kind().name(),
            self.description()
        ))
    }

    fn array_index(&self, map: &Registry, which: &ElementWrapper) -> Result<usize, ScriptError> {
        let raw = which.evaluate_real(map)?;
        if raw < 1.0 || raw.fract() != 0.0 {
            return Err(ScriptError::TypeMismatch(format!(
                "array index {raw} in '{}' is not a positive integer",
                self.description()
            )));
        }
        Ok(raw as usize)
    }

    /// Read a real value through the wrapper.
    pub fn evaluate_real(&self, map: &Registry) -> Result<f64, ScriptError> {
        match self {
            ElementWrapper::Number { value, .. } => Ok(*value),
            ElementWrapper::Variable { name, .. } => {
                let obj = map.get(name).ok_or_else(|| ScriptError::not_found(name))?;
                obj.real_parameter_by_name("Value")
            }
            ElementWrapper::ObjectProperty {
                object, property, ..
            } => {
                let obj = map
                    .get(object)
                    .ok_or_else(|| ScriptError::not_found(object))?;
                obj.real_parameter(obj.parameter_id(property)?)
            }
            ElementWrapper::Parameter { owner, kind, .. } => {
                let obj = map.get(owner).ok_or_else(|| ScriptError::not_found(owner))?;
                // The dependency qualifies the frame of the quantity; frame
                // transformation is the coordinate subsystem's concern and is
                // identity here.
                kind.evaluate(obj)
            }
            ElementWrapper::ArrayElement {
                array, row, col, ..
            } => {
                let r = self.array_index(map, row)?;
                let c = self.array_index(map, col)?;
                let obj = map.get(array).ok_or_else(|| ScriptError::not_found(array))?;
                let rows = obj.real_parameter_by_name("NumRows")? as usize;
                let cols = obj.real_parameter_by_name("NumCols")? as usize;
                if r > rows || c > cols {
                    return Err(ScriptError::TypeMismatch(format!(
                        "index ({r},{c}) out of bounds for {array} ({rows}x{cols})"
                    )));
                }
                let data = obj.real_list_parameter(obj.parameter_id("Data")?)?;
                Ok(data[(r - 1) * cols + (c - 1)])
            }
            _ => Err(self.mismatch("evaluate a Real")),
        }
    }

    /// Write a real value through the wrapper.
    pub fn set_real(&self, map: &mut Registry, value: f64) -> Result<(), ScriptError> {
        match self {
            ElementWrapper::Variable { name, .. } => {
                let obj = map
                    .get_mut(name)
                    .ok_or_else(|| ScriptError::not_found(name))?;
                obj.set_real_parameter_by_name("Value", value)
            }
            ElementWrapper::ObjectProperty {
                object, property, ..
            } => {
                let obj = map
                    .get_mut(object)
                    .ok_or_else(|| ScriptError::not_found(object))?;
                obj.set_real_parameter(obj.parameter_id(property)?, value)
            }
            ElementWrapper::Parameter { owner, kind, .. } => {
                let obj = map
                    .get_mut(owner)
                    .ok_or_else(|| ScriptError::not_found(owner))?;
                kind.set(obj, value)
            }
            ElementWrapper::ArrayElement {
                array, row, col, ..
            } => {
                let r = self.array_index(map, row)?;
                let c = self.array_index(map, col)?;
                let obj = map.get(array).ok_or_else(|| ScriptError::not_found(array))?;
                let rows = obj.real_parameter_by_name("NumRows")? as usize;
                let cols = obj.real_parameter_by_name("NumCols")? as usize;
                if r > rows || c > cols {
                    return Err(ScriptError::TypeMismatch(format!(
                        "index ({r},{c}) out of bounds for {array} ({rows}x{cols})"
                    )));
                }
                let id = obj.parameter_id("Data")?;
                let mut data = obj.real_list_parameter(id)?.to_vec();
                data[(r - 1) * cols + (c - 1)] = value;
                map.get_mut(array)
                    .ok_or_else(|| ScriptError::not_found(array))?
                    .force_set(id, ParamValue::RealList(data))
            }
            _ => Err(self.mismatch("assign a Real")),
        }
    }

    /// Read a string value through the wrapper.
    pub fn evaluate_string(&self, map: &Registry) -> Result<String, ScriptError> {
        match self {
            ElementWrapper::StringLit { value, .. } => Ok(value.clone()),
            ElementWrapper::ObjectRef { name, .. } => {
                let obj = map.get(name).ok_or_else(|| ScriptError::not_found(name))?;
                Ok(obj.name().to_string())
            }
            ElementWrapper::Variable { name, .. } => {
                let obj = map.get(name).ok_or_else(|| ScriptError::not_found(name))?;
                if obj.kind() == ObjectKind::StringVar {
                    obj.string_parameter_by_name("Value")
                } else {
                    Err(self.mismatch("evaluate a String"))
                }
            }
            ElementWrapper::ObjectProperty {
                object, property, ..
            } => {
                let obj = map
                    .get(object)
                    .ok_or_else(|| ScriptError::not_found(object))?;
                obj.string_parameter(obj.parameter_id(property)?)
            }
            _ => Err(self.mismatch("evaluate a String")),
        }
    }

    /// Write a string value through the wrapper.
    pub fn set_string(&self, map: &mut Registry, value: &str) -> Result<(), ScriptError> {
        match self {
            ElementWrapper::Variable { name, .. } => {
                let obj = map
                    .get_mut(name)
                    .ok_or_else(|| ScriptError::not_found(name))?;
                if obj.kind() == ObjectKind::StringVar {
                    obj.set_string_parameter_by_name("Value", value)
                } else {
                    Err(self.mismatch("assign a String"))
                }
            }
            ElementWrapper::ObjectProperty {
                object, property, ..
            } => {
                let obj = map
                    .get_mut(object)
                    .ok_or_else(|| ScriptError::not_found(object))?;
                obj.set_string_parameter(obj.parameter_id(property)?, value)
            }
            _ => Err(self.mismatch("assign a String")),
        }
    }

    /// Write a boolean value through the wrapper.
    pub fn set_bool(&self, map: &mut Registry, value: bool) -> Result<(), ScriptError> {
        match self {
            ElementWrapper::ObjectProperty {
                object, property, ..
            } => {
                let obj = map
                    .get_mut(object)
                    .ok_or_else(|| ScriptError::not_found(object))?;
                obj.set_bool_parameter(obj.parameter_id(property)?, value)
            }
            _ => Err(self.mismatch("assign a Boolean")),
        }
    }

    /// Update stored reference names and the description text after an
    /// object rename, so regenerated script text reflects the new name.
    pub fn rename_object(&mut self, old: &str, new: &str) {
        let rename_desc = |desc: &mut String| {
            *desc = rename_in_text(desc, old, new);
        };
        match self {
            ElementWrapper::Number { .. }
            | ElementWrapper::StringLit { .. }
            | ElementWrapper::OnOff { .. }
            | ElementWrapper::Boolean { .. } => {}
            ElementWrapper::ObjectRef { desc, name } | ElementWrapper::Variable { desc, name } => {
                if name == old {
                    *name = new.to_string();
                }
                rename_desc(desc);
            }
            ElementWrapper::ObjectProperty { desc, object, .. } => {
                if object == old {
                    *object = new.to_string();
                }
                rename_desc(desc);
            }
            ElementWrapper::Parameter {
                desc,
                owner,
                dependency,
                ..
            } => {
                if owner == old {
                    *owner = new.to_string();
                }
                if dependency.as_deref() == Some(old) {
                    *dependency = Some(new.to_string());
                }
                rename_desc(desc);
            }
            ElementWrapper::ArrayElement {
                desc,
                array,
                row,
                col,
            } => {
                if array == old {
                    *array = new.to_string();
                }
                row.rename_object(old, new);
                col.rename_object(old, new);
                rename_desc(desc);
            }
        }
    }
}

/// Replace `old` with `new` wherever it appears as a whole identifier in
/// `text`.
pub fn rename_in_text(text: &str, old: &str, new: &str) -> String {
    let pattern = format!(r"\b{}\b", regex::escape(old));
    // The pattern is built from an escaped literal and cannot fail.
    let re = regex::Regex::new(&pattern).unwrap();
    re.replace_all(text, new).to_string()
}
