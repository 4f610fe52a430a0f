//! Parameter slot types and values.

use std::fmt;

use crate::error::ScriptError;

/// Semantic type of a parameter slot.
///
/// Every slot id on a modeled object maps to exactly one of these; the
/// typed accessors enforce the declared type rather than coercing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Floating point value.
    Real,
    /// String value.
    Str,
    /// List of strings.
    StrList,
    /// List of reals (array storage).
    RealList,
    /// String restricted to an enumerated set.
    Enumerated,
    /// Name of another modeled object.
    ObjectRef,
    /// List of names of other modeled objects.
    ObjectList,
    /// Boolean value.
    Boolean,
}

impl ParamType {
    /// Human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamType::Real => "Real",
            ParamType::Str => "String",
            ParamType::StrList => "StringList",
            ParamType::RealList => "RealList",
            ParamType::Enumerated => "Enumerated",
            ParamType::ObjectRef => "Object",
            ParamType::ObjectList => "ObjectList",
            ParamType::Boolean => "Boolean",
        }
    }

    /// Default value stored in a freshly created slot of this type.
    pub fn default_value(&self) -> ParamValue {
        match self {
            ParamType::Real => ParamValue::Real(0.0),
            ParamType::Str => ParamValue::Str(String::new()),
            ParamType::StrList => ParamValue::StrList(Vec::new()),
            ParamType::RealList => ParamValue::RealList(Vec::new()),
            ParamType::Enumerated => ParamValue::Enumerated(String::new()),
            ParamType::ObjectRef => ParamValue::ObjectRef(String::new()),
            ParamType::ObjectList => ParamValue::ObjectList(Vec::new()),
            ParamType::Boolean => ParamValue::Boolean(false),
        }
    }
}

/// A value held in a parameter slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Floating point value.
    Real(f64),
    /// String value.
    Str(String),
    /// List of strings.
    StrList(Vec<String>),
    /// List of reals.
    RealList(Vec<f64>),
    /// Enumerated string value.
    Enumerated(String),
    /// Name of another modeled object.
    ObjectRef(String),
    /// List of names of other modeled objects.
    ObjectList(Vec<String>),
    /// Boolean value.
    Boolean(bool),
}

impl ParamValue {
    /// The semantic type of this value.
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Real(_) => ParamType::Real,
            ParamValue::Str(_) => ParamType::Str,
            ParamValue::StrList(_) => ParamType::StrList,
            ParamValue::RealList(_) => ParamType::RealList,
            ParamValue::Enumerated(_) => ParamType::Enumerated,
            ParamValue::ObjectRef(_) => ParamType::ObjectRef,
            ParamValue::ObjectList(_) => ParamType::ObjectList,
            ParamValue::Boolean(_) => ParamType::Boolean,
        }
    }

    /// Read as a real. Fails with a type mismatch for any other type.
    pub fn as_real(&self) -> Result<f64, ScriptError> {
        match self {
            ParamValue::Real(v) => Ok(*v),
            other => Err(ScriptError::TypeMismatch(format!(
                "expected Real, slot holds {}",
                other.param_type().type_name()
            ))),
        }
    }

    /// Read as a string. String-backed types (plain, enumerated, object
    /// name) all read through this accessor.
    pub fn as_str(&self) -> Result<&str, ScriptError> {
        match self {
            ParamValue::Str(s) | ParamValue::Enumerated(s) | ParamValue::ObjectRef(s) => Ok(s),
            other => Err(ScriptError::TypeMismatch(format!(
                "expected String, slot holds {}",
                other.param_type().type_name()
            ))),
        }
    }

    /// Read as a boolean.
    pub fn as_bool(&self) -> Result<bool, ScriptError> {
        match self {
            ParamValue::Boolean(b) => Ok(*b),
            other => Err(ScriptError::TypeMismatch(format!(
                "expected Boolean, slot holds {}",
                other.param_type().type_name()
            ))),
        }
    }

    /// Read as a string list.
    pub fn as_str_list(&self) -> Result<&[String], ScriptError> {
        match self {
            ParamValue::StrList(v) | ParamValue::ObjectList(v) => Ok(v),
            other => Err(ScriptError::TypeMismatch(format!(
                "expected StringList, slot holds {}",
                other.param_type().type_name()
            ))),
        }
    }

    /// Read as a real list.
    pub fn as_real_list(&self) -> Result<&[f64], ScriptError> {
        match self {
            ParamValue::RealList(v) => Ok(v),
            other => Err(ScriptError::TypeMismatch(format!(
                "expected RealList, slot holds {}",
                other.param_type().type_name()
            ))),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Real(v) => write!(f, "{v}"),
            ParamValue::Str(s) | ParamValue::Enumerated(s) | ParamValue::ObjectRef(s) => {
                write!(f, "{s}")
            }
            ParamValue::StrList(v) | ParamValue::ObjectList(v) => write!(f, "{}", v.join(" ")),
            ParamValue::RealList(v) => {
                let items: Vec<String> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "{}", items.join(" "))
            }
            ParamValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_enforces_slot_type() {
        let v = ParamValue::Real(7000.0);
        assert_eq!(v.as_real().unwrap(), 7000.0);
        assert!(matches!(v.as_str(), Err(ScriptError::TypeMismatch(_))));
        assert!(matches!(v.as_bool(), Err(ScriptError::TypeMismatch(_))));
    }

    #[test]
    fn string_backed_types_share_accessor() {
        assert_eq!(
            ParamValue::ObjectRef("EarthMJ2000Eq".into()).as_str().unwrap(),
            "EarthMJ2000Eq"
        );
        assert_eq!(ParamValue::Enumerated("VNB".into()).as_str().unwrap(), "VNB");
    }
}
