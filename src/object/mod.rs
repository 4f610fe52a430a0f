//! Generic object model: named, typed, introspectable runtime objects.
//!
//! Every entity a mission script manipulates (spacecraft, burns, solvers,
//! plots, ...) is a [`ModelObject`]: a name, a closed [`ObjectKind`] tag,
//! and an ordered table of typed parameter slots addressed by stable
//! integer id or by name. Commands and wrappers never hold pointers to
//! other objects, only names re-resolved against the current object map;
//! this is what makes [`Clone`] safe for per-run working copies.

mod param;
mod registry;
mod value;

pub use param::ParamKind;
pub use registry::{ParameterDef, Registry};
pub use value::{ParamType, ParamValue};

use crate::error::ScriptError;

/// Closed enumeration of modeled object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A spacecraft with a Cartesian state and mass properties.
    Spacecraft,
    /// An impulsive delta-v maneuver.
    ImpulsiveBurn,
    /// A numerical propagator configuration.
    Propagator,
    /// A scalar user variable.
    Variable,
    /// A string user variable.
    StringVar,
    /// A two-dimensional real array.
    Array,
    /// A coordinate system (origin plus axes).
    CoordinateSystem,
    /// An XY plot subscriber.
    XYPlot,
    /// A report file subscriber.
    ReportFile,
    /// A differential-corrector solver.
    DifferentialCorrector,
}

/// Declaration of one parameter slot in an object kind's schema.
#[derive(Debug, Clone, Copy)]
pub struct SlotSpec {
    /// Slot name, unique within the kind.
    pub name: &'static str,
    /// Declared semantic type.
    pub ty: ParamType,
    /// Whether script-level writes are rejected.
    pub read_only: bool,
}

const fn slot(name: &'static str, ty: ParamType, read_only: bool) -> SlotSpec {
    SlotSpec { name, ty, read_only }
}

impl ObjectKind {
    /// The type-name string used by `Create` statements and factories.
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectKind::Spacecraft => "Spacecraft",
            ObjectKind::ImpulsiveBurn => "ImpulsiveBurn",
            ObjectKind::Propagator => "Propagator",
            ObjectKind::Variable => "Variable",
            ObjectKind::StringVar => "String",
            ObjectKind::Array => "Array",
            ObjectKind::CoordinateSystem => "CoordinateSystem",
            ObjectKind::XYPlot => "XYPlot",
            ObjectKind::ReportFile => "ReportFile",
            ObjectKind::DifferentialCorrector => "DifferentialCorrector",
        }
    }

    /// Look up a kind from its type-name string.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "Spacecraft" => Some(ObjectKind::Spacecraft),
            "ImpulsiveBurn" => Some(ObjectKind::ImpulsiveBurn),
            "Propagator" => Some(ObjectKind::Propagator),
            "Variable" => Some(ObjectKind::Variable),
            "String" => Some(ObjectKind::StringVar),
            "Array" => Some(ObjectKind::Array),
            "CoordinateSystem" => Some(ObjectKind::CoordinateSystem),
            "XYPlot" => Some(ObjectKind::XYPlot),
            "ReportFile" => Some(ObjectKind::ReportFile),
            "DifferentialCorrector" => Some(ObjectKind::DifferentialCorrector),
            _ => None,
        }
    }

    /// The ordered slot table for this kind. Slot ids are table indices.
    pub fn schema(&self) -> &'static [SlotSpec] {
        use ParamType::*;
        const SPACECRAFT: &[SlotSpec] = &[
            slot("X", Real, false),
            slot("Y", Real, false),
            slot("Z", Real, false),
            slot("VX", Real, false),
            slot("VY", Real, false),
            slot("VZ", Real, false),
            slot("Epoch", Real, false),
            slot("DryMass", Real, false),
            slot("FuelMass", Real, false),
            slot("Cd", Real, false),
            slot("Cr", Real, false),
            slot("CoordinateSystem", ObjectRef, false),
            slot("Tanks", ObjectList, false),
            slot("ElapsedSecs", Real, true),
        ];
        const IMPULSIVE_BURN: &[SlotSpec] = &[
            slot("Element1", Real, false),
            slot("Element2", Real, false),
            slot("Element3", Real, false),
            slot("Axes", Enumerated, false),
            slot("Origin", ObjectRef, false),
        ];
        const PROPAGATOR: &[SlotSpec] = &[
            slot("StepSize", Real, false),
            slot("MaxSteps", Real, false),
            slot("Type", Enumerated, false),
        ];
        const VARIABLE: &[SlotSpec] = &[slot("Value", Real, false)];
        const STRING_VAR: &[SlotSpec] = &[slot("Value", Str, false)];
        const ARRAY: &[SlotSpec] = &[
            slot("NumRows", Real, true),
            slot("NumCols", Real, true),
            slot("Data", RealList, true),
        ];
        const COORDINATE_SYSTEM: &[SlotSpec] = &[
            slot("Origin", Str, false),
            slot("Axes", Enumerated, false),
            slot("Epoch", Real, false),
        ];
        const XY_PLOT: &[SlotSpec] = &[
            slot("XVariable", Str, false),
            slot("YVariables", StrList, false),
            slot("ShowGrid", Boolean, false),
            slot("Drawing", Boolean, true),
            slot("Data", StrList, true),
        ];
        const REPORT_FILE: &[SlotSpec] = &[
            slot("Filename", Str, false),
            slot("WriteHeaders", Boolean, false),
            slot("Data", StrList, true),
        ];
        const DIFFERENTIAL_CORRECTOR: &[SlotSpec] = &[
            slot("MaximumIterations", Real, false),
            slot("Perturbation", Real, false),
            slot("ShowProgress", Boolean, false),
        ];
        match self {
            ObjectKind::Spacecraft => SPACECRAFT,
            ObjectKind::ImpulsiveBurn => IMPULSIVE_BURN,
            ObjectKind::Propagator => PROPAGATOR,
            ObjectKind::Variable => VARIABLE,
            ObjectKind::StringVar => STRING_VAR,
            ObjectKind::Array => ARRAY,
            ObjectKind::CoordinateSystem => COORDINATE_SYSTEM,
            ObjectKind::XYPlot => XY_PLOT,
            ObjectKind::ReportFile => REPORT_FILE,
            ObjectKind::DifferentialCorrector => DIFFERENTIAL_CORRECTOR,
        }
    }
}

/// A named, typed, introspectable runtime object.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelObject {
    name: String,
    kind: ObjectKind,
    slots: Vec<ParamValue>,
}

impl ModelObject {
    /// Create an object of `kind` with all slots at their type defaults.
    pub fn new(kind: ObjectKind, name: &str) -> Self {
        let mut obj = Self {
            name: name.to_string(),
            kind,
            slots: kind.schema().iter().map(|s| s.ty.default_value()).collect(),
        };
        // Kind-specific defaults the schema table cannot express.
        match kind {
            ObjectKind::Propagator => {
                obj.slots[0] = ParamValue::Real(60.0);
                obj.slots[1] = ParamValue::Real(10_000.0);
                obj.slots[2] = ParamValue::Enumerated("Linear".to_string());
            }
            ObjectKind::DifferentialCorrector => {
                obj.slots[0] = ParamValue::Real(25.0);
                obj.slots[1] = ParamValue::Real(1e-4);
            }
            ObjectKind::XYPlot => {
                obj.slots[3] = ParamValue::Boolean(true);
            }
            ObjectKind::Spacecraft => {
                obj.slots[7] = ParamValue::Real(850.0);
                obj.slots[8] = ParamValue::Real(150.0);
                obj.slots[9] = ParamValue::Real(2.2);
                obj.slots[10] = ParamValue::Real(1.8);
            }
            _ => {}
        }
        obj
    }

    /// The object's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The object's type tag.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Map a slot name to its stable id.
    pub fn parameter_id(&self, name: &str) -> Result<usize, ScriptError> {
        self.kind
            .schema()
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| {
                ScriptError::ReferenceNotFound(format!(
                    "{} has no parameter named {name}",
                    self.kind.type_name()
                ))
            })
    }

    /// The slot name for `id`, if in range.
    pub fn parameter_name(&self, id: usize) -> Option<&'static str> {
        self.kind.schema().get(id).map(|s| s.name)
    }

    /// The declared semantic type of slot `id`.
    pub fn parameter_type(&self, id: usize) -> Option<ParamType> {
        self.kind.schema().get(id).map(|s| s.ty)
    }

    /// Whether script-level writes to slot `id` are rejected.
    pub fn is_parameter_read_only(&self, id: usize) -> bool {
        self.kind.schema().get(id).map(|s| s.read_only).unwrap_or(true)
    }

    fn slot_value(&self, id: usize) -> Result<&ParamValue, ScriptError> {
        self.slots.get(id).ok_or_else(|| {
            ScriptError::ReferenceNotFound(format!(
                "{} has no parameter with id {id}",
                self.kind.type_name()
            ))
        })
    }

    fn check_write(&self, id: usize, incoming: ParamType) -> Result<(), ScriptError> {
        let spec = self.kind.schema().get(id).ok_or_else(|| {
            ScriptError::ReferenceNotFound(format!(
                "{} has no parameter with id {id}",
                self.kind.type_name()
            ))
        })?;
        if spec.read_only {
            return Err(ScriptError::TypeMismatch(format!(
                "{}.{} is read-only",
                self.name, spec.name
            )));
        }
        // String-backed slots accept any string-backed value.
        let compatible = spec.ty == incoming
            || matches!(
                (spec.ty, incoming),
                (
                    ParamType::Str | ParamType::Enumerated | ParamType::ObjectRef,
                    ParamType::Str | ParamType::Enumerated | ParamType::ObjectRef
                )
            );
        if !compatible {
            return Err(ScriptError::TypeMismatch(format!(
                "{}.{} expects {}, not {}",
                self.name,
                spec.name,
                spec.ty.type_name(),
                incoming.type_name()
            )));
        }
        Ok(())
    }

    /// Read a real slot by id.
    pub fn real_parameter(&self, id: usize) -> Result<f64, ScriptError> {
        self.slot_value(id)?.as_real()
    }

    /// Read a real slot by name.
    pub fn real_parameter_by_name(&self, name: &str) -> Result<f64, ScriptError> {
        self.real_parameter(self.parameter_id(name)?)
    }

    /// Write a real slot by id, enforcing type and read-only gating.
    pub fn set_real_parameter(&mut self, id: usize, value: f64) -> Result<(), ScriptError> {
        self.check_write(id, ParamType::Real)?;
        self.slots[id] = ParamValue::Real(value);
        Ok(())
    }

    /// Write a real slot by name.
    pub fn set_real_parameter_by_name(&mut self, name: &str, value: f64) -> Result<(), ScriptError> {
        self.set_real_parameter(self.parameter_id(name)?, value)
    }

    /// Read a string slot by id.
    pub fn string_parameter(&self, id: usize) -> Result<String, ScriptError> {
        self.slot_value(id)?.as_str().map(str::to_string)
    }

    /// Read a string slot by name.
    pub fn string_parameter_by_name(&self, name: &str) -> Result<String, ScriptError> {
        self.string_parameter(self.parameter_id(name)?)
    }

    /// Write a string slot by id, enforcing type and read-only gating.
    pub fn set_string_parameter(&mut self, id: usize, value: &str) -> Result<(), ScriptError> {
        self.check_write(id, ParamType::Str)?;
        let spec = &self.kind.schema()[id];
        self.slots[id] = match spec.ty {
            ParamType::Enumerated => ParamValue::Enumerated(value.to_string()),
            ParamType::ObjectRef => ParamValue::ObjectRef(value.to_string()),
            _ => ParamValue::Str(value.to_string()),
        };
        Ok(())
    }

    /// Write a string slot by name.
    pub fn set_string_parameter_by_name(&mut self, name: &str, value: &str) -> Result<(), ScriptError> {
        self.set_string_parameter(self.parameter_id(name)?, value)
    }

    /// Read a boolean slot by id.
    pub fn bool_parameter(&self, id: usize) -> Result<bool, ScriptError> {
        self.slot_value(id)?.as_bool()
    }

    /// Read a boolean slot by name.
    pub fn bool_parameter_by_name(&self, name: &str) -> Result<bool, ScriptError> {
        self.bool_parameter(self.parameter_id(name)?)
    }

    /// Write a boolean slot by id.
    pub fn set_bool_parameter(&mut self, id: usize, value: bool) -> Result<(), ScriptError> {
        self.check_write(id, ParamType::Boolean)?;
        self.slots[id] = ParamValue::Boolean(value);
        Ok(())
    }

    /// Read an element of a string-list slot.
    pub fn string_list_parameter(&self, id: usize) -> Result<&[String], ScriptError> {
        self.slot_value(id)?.as_str_list()
    }

    /// Append to a string-list slot.
    pub fn push_string_parameter(&mut self, id: usize, value: &str) -> Result<(), ScriptError> {
        self.check_write(id, ParamType::StrList)?;
        match &mut self.slots[id] {
            ParamValue::StrList(v) | ParamValue::ObjectList(v) => {
                v.push(value.to_string());
                Ok(())
            }
            other => Err(ScriptError::TypeMismatch(format!(
                "{} expects StringList, slot holds {}",
                self.name,
                other.param_type().type_name()
            ))),
        }
    }

    /// Read a real-list slot.
    pub fn real_list_parameter(&self, id: usize) -> Result<&[f64], ScriptError> {
        self.slot_value(id)?.as_real_list()
    }

    /// Internal write that bypasses the read-only gate; used by the
    /// executor for engine-maintained slots (ElapsedSecs, subscriber data,
    /// array storage).
    pub(crate) fn force_set(&mut self, id: usize, value: ParamValue) -> Result<(), ScriptError> {
        let spec = self.kind.schema().get(id).ok_or_else(|| {
            ScriptError::ReferenceNotFound(format!(
                "{} has no parameter with id {id}",
                self.kind.type_name()
            ))
        })?;
        if spec.ty != value.param_type() {
            return Err(ScriptError::TypeMismatch(format!(
                "{}.{} expects {}, not {}",
                self.name,
                spec.name,
                spec.ty.type_name(),
                value.param_type().type_name()
            )));
        }
        self.slots[id] = value;
        Ok(())
    }

    pub(crate) fn force_push_string(&mut self, id: usize, value: &str) {
        if let Some(ParamValue::StrList(v)) = self.slots.get_mut(id) {
            v.push(value.to_string());
        }
    }

    /// Update every slot that stores `old` as another object's name.
    ///
    /// Idempotent: returns `true` whether or not the name was referenced.
    pub fn rename_ref_object(&mut self, old: &str, new: &str) -> bool {
        for value in &mut self.slots {
            match value {
                ParamValue::ObjectRef(s) if s == old => *s = new.to_string(),
                ParamValue::ObjectList(v) => {
                    for s in v.iter_mut() {
                        if s == old {
                            *s = new.to_string();
                        }
                    }
                }
                _ => {}
            }
        }
        true
    }

    /// Generic untyped action dispatch. Any object may define named
    /// actions; unknown actions return `false`.
    pub fn take_action(&mut self, action: &str, _data: &str) -> bool {
        match (self.kind, action) {
            (ObjectKind::XYPlot, "ClearData") => {
                self.slots[4] = ParamValue::StrList(Vec::new());
                true
            }
            (ObjectKind::XYPlot, "PenUp") => {
                self.slots[3] = ParamValue::Boolean(false);
                true
            }
            (ObjectKind::XYPlot, "PenDown") => {
                self.slots[3] = ParamValue::Boolean(true);
                true
            }
            (ObjectKind::ReportFile, "Clear") => {
                self.slots[2] = ParamValue::StrList(Vec::new());
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_returns_the_same_slot_table_on_each_call() {
        let kinds = [
            ObjectKind::Spacecraft,
            ObjectKind::ImpulsiveBurn,
            ObjectKind::Propagator,
            ObjectKind::Variable,
            ObjectKind::StringVar,
            ObjectKind::Array,
            ObjectKind::CoordinateSystem,
            ObjectKind::XYPlot,
            ObjectKind::ReportFile,
            ObjectKind::DifferentialCorrector,
        ];
        for kind in kinds {
            let schema = kind.schema();
            assert!(!schema.is_empty(), "{} has no slots", kind.type_name());
            // The table is a single static allocation, not a per-call copy.
            assert_eq!(schema.as_ptr(), kind.schema().as_ptr());
        }
    }

    #[test]
    fn slot_ids_are_stable_and_reverse_mapped() {
        let sat = ModelObject::new(ObjectKind::Spacecraft, "Sat1");
        let id = sat.parameter_id("VX").unwrap();
        assert_eq!(sat.parameter_name(id), Some("VX"));
        assert!(sat.parameter_id("NoSuchField").is_err());
    }

    #[test]
    fn wrong_accessor_fails_without_coercion() {
        let mut sat = ModelObject::new(ObjectKind::Spacecraft, "Sat1");
        let cs = sat.parameter_id("CoordinateSystem").unwrap();
        assert!(matches!(
            sat.real_parameter(cs),
            Err(ScriptError::TypeMismatch(_))
        ));
        assert!(matches!(
            sat.set_real_parameter(cs, 1.0),
            Err(ScriptError::TypeMismatch(_))
        ));
    }

    #[test]
    fn read_only_gates_writes() {
        let mut sat = ModelObject::new(ObjectKind::Spacecraft, "Sat1");
        let id = sat.parameter_id("ElapsedSecs").unwrap();
        assert!(sat.is_parameter_read_only(id));
        assert!(sat.set_real_parameter(id, 5.0).is_err());
        // The engine-side path is still allowed.
        sat.force_set(id, ParamValue::Real(5.0)).unwrap();
        assert_eq!(sat.real_parameter(id).unwrap(), 5.0);
    }

    #[test]
    fn rename_ref_object_is_idempotent() {
        let mut burn = ModelObject::new(ObjectKind::ImpulsiveBurn, "Burn1");
        burn.set_string_parameter_by_name("Origin", "OldCS").unwrap();
        assert!(burn.rename_ref_object("OldCS", "NewCS"));
        assert_eq!(burn.string_parameter_by_name("Origin").unwrap(), "NewCS");
        // Renaming an unreferenced name still succeeds.
        assert!(burn.rename_ref_object("Nobody", "Anybody"));
    }

    #[test]
    fn take_action_dispatches_by_name() {
        let mut plot = ModelObject::new(ObjectKind::XYPlot, "Plot1");
        assert!(plot.take_action("PenUp", ""));
        assert!(!plot.bool_parameter(plot.parameter_id("Drawing").unwrap()).unwrap());
        assert!(!plot.take_action("NoSuchAction", ""));
    }
}
