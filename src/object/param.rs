//! Computed parameters: named quantities evaluated against an object.
//!
//! A parameter such as `Sat1.Rmag` is not a slot on the spacecraft; it is
//! computed on demand from the owner's state, optionally qualified by a
//! dependency object (a coordinate system). Pass-through kinds mirror a
//! slot and are therefore settable; derived kinds are read-only.

use crate::error::ScriptError;
use crate::object::{ModelObject, ObjectKind};

/// Closed set of computed parameter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// X position component (km).
    X,
    /// Y position component (km).
    Y,
    /// Z position component (km).
    Z,
    /// X velocity component (km/s).
    VX,
    /// Y velocity component (km/s).
    VY,
    /// Z velocity component (km/s).
    VZ,
    /// Position vector magnitude (km).
    Rmag,
    /// Velocity vector magnitude (km/s).
    Vmag,
    /// Dry plus fuel mass (kg).
    TotalMass,
    /// Seconds elapsed in the current propagation span.
    ElapsedSecs,
    /// State epoch.
    Epoch,
}

impl ParamKind {
    /// Parse a parameter name as used after the dot in `Owner.Name`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "X" => Some(ParamKind::X),
            "Y" => Some(ParamKind::Y),
            "Z" => Some(ParamKind::Z),
            "VX" => Some(ParamKind::VX),
            "VY" => Some(ParamKind::VY),
            "VZ" => Some(ParamKind::VZ),
            "Rmag" => Some(ParamKind::Rmag),
            "Vmag" => Some(ParamKind::Vmag),
            "TotalMass" => Some(ParamKind::TotalMass),
            "ElapsedSecs" => Some(ParamKind::ElapsedSecs),
            "Epoch" => Some(ParamKind::Epoch),
            _ => None,
        }
    }

    /// The script-facing name of this parameter.
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::X => "X",
            ParamKind::Y => "Y",
            ParamKind::Z => "Z",
            ParamKind::VX => "VX",
            ParamKind::VY => "VY",
            ParamKind::VZ => "VZ",
            ParamKind::Rmag => "Rmag",
            ParamKind::Vmag => "Vmag",
            ParamKind::TotalMass => "TotalMass",
            ParamKind::ElapsedSecs => "ElapsedSecs",
            ParamKind::Epoch => "Epoch",
        }
    }

    /// Whether this parameter is registered for objects of `kind`.
    pub fn available_for(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::Spacecraft
    }

    /// Pass-through parameters mirror a slot and may be assigned.
    pub fn is_settable(&self) -> bool {
        !matches!(self, ParamKind::Rmag | ParamKind::Vmag | ParamKind::TotalMass)
    }

    /// Evaluate against the owner object.
    pub fn evaluate(&self, owner: &ModelObject) -> Result<f64, ScriptError> {
        let get = |name: &str| owner.real_parameter_by_name(name);
        match self {
            ParamKind::X => get("X"),
            ParamKind::Y => get("Y"),
            ParamKind::Z => get("Z"),
            ParamKind::VX => get("VX"),
            ParamKind::VY => get("VY"),
            ParamKind::VZ => get("VZ"),
            ParamKind::Epoch => get("Epoch"),
            ParamKind::ElapsedSecs => get("ElapsedSecs"),
            ParamKind::Rmag => {
                let (x, y, z) = (get("X")?, get("Y")?, get("Z")?);
                Ok((x * x + y * y + z * z).sqrt())
            }
            ParamKind::Vmag => {
                let (vx, vy, vz) = (get("VX")?, get("VY")?, get("VZ")?);
                Ok((vx * vx + vy * vy + vz * vz).sqrt())
            }
            ParamKind::TotalMass => Ok(get("DryMass")? + get("FuelMass")?),
        }
    }

    /// Assign through a pass-through parameter.
    pub fn set(&self, owner: &mut ModelObject, value: f64) -> Result<(), ScriptError> {
        if !self.is_settable() {
            return Err(ScriptError::TypeMismatch(format!(
                "{}.{} is a computed quantity and cannot be assigned",
                owner.name(),
                self.name()
            )));
        }
        if matches!(self, ParamKind::ElapsedSecs) {
            return Err(ScriptError::TypeMismatch(format!(
                "{}.ElapsedSecs is maintained by propagation and cannot be assigned",
                owner.name()
            )));
        }
        owner.set_real_parameter_by_name(self.name(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_parameters_compute_from_slots() {
        let mut sat = ModelObject::new(ObjectKind::Spacecraft, "Sat1");
        sat.set_real_parameter_by_name("X", 3.0).unwrap();
        sat.set_real_parameter_by_name("Y", 4.0).unwrap();
        assert_eq!(ParamKind::Rmag.evaluate(&sat).unwrap(), 5.0);
        assert_eq!(ParamKind::TotalMass.evaluate(&sat).unwrap(), 1000.0);
    }

    #[test]
    fn derived_parameters_reject_assignment() {
        let mut sat = ModelObject::new(ObjectKind::Spacecraft, "Sat1");
        assert!(ParamKind::Rmag.set(&mut sat, 1.0).is_err());
        ParamKind::X.set(&mut sat, 7000.0).unwrap();
        assert_eq!(ParamKind::X.evaluate(&sat).unwrap(), 7000.0);
    }
}
