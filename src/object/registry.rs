//! The configured-object registry: factory, lookup, and rename cascade.

use std::collections::HashMap;

use log::debug;

use crate::error::ScriptError;
use crate::object::{ModelObject, ObjectKind, ParamKind, ParamValue};

/// Definition of a registered computed parameter, e.g. `Sat1.X` or
/// `Sat1.EarthMJ2000Eq.X`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDef {
    /// Name of the owner object.
    pub owner: String,
    /// Optional dependency object (a coordinate system).
    pub dependency: Option<String>,
    /// The computed quantity.
    pub kind: ParamKind,
}

/// Name-to-object map owning every configured object.
///
/// One registry holds the script's template objects; the executor clones
/// it wholesale into a per-run map so runtime mutation never corrupts the
/// templates. Cloning copies value slots and name slots only; object
/// cross-references are names, re-resolved against whichever map is
/// current.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    objects: HashMap<String, ModelObject>,
    parameters: HashMap<String, ParameterDef>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory keyed on the type-name string. Fails on an unknown type
    /// name or a name collision with an incompatible existing object.
    pub fn create(&mut self, type_name: &str, name: &str) -> Result<&mut ModelObject, ScriptError> {
        let kind = ObjectKind::from_type_name(type_name).ok_or_else(|| {
            ScriptError::ReferenceNotFound(format!("unknown object type {type_name}"))
        })?;
        self.create_of_kind(kind, name)
    }

    /// Factory from an already resolved kind.
    pub fn create_of_kind(
        &mut self,
        kind: ObjectKind,
        name: &str,
    ) -> Result<&mut ModelObject, ScriptError> {
        if let Some(existing) = self.objects.get(name) {
            if existing.kind() != kind {
                return Err(ScriptError::TypeMismatch(format!(
                    "cannot create {} {name}: name already used by a {}",
                    kind.type_name(),
                    existing.kind().type_name()
                )));
            }
            // Re-creating the same kind replaces the template in place.
        }
        debug!("configuring {} {name}", kind.type_name());
        self.objects.insert(name.to_string(), ModelObject::new(kind, name));
        Ok(self.objects.get_mut(name).unwrap())
    }

    /// Insert a prebuilt object, replacing any previous holder of the name.
    pub fn insert(&mut self, obj: ModelObject) {
        self.objects.insert(obj.name().to_string(), obj);
    }

    /// Remove an object, returning it.
    pub fn remove(&mut self, name: &str) -> Option<ModelObject> {
        self.objects.remove(name)
    }

    /// Look up an object by exact name.
    pub fn get(&self, name: &str) -> Option<&ModelObject> {
        self.objects.get(name)
    }

    /// Mutable lookup by exact name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ModelObject> {
        self.objects.get_mut(name)
    }

    /// Whether an object with this exact name is configured.
    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Iterate over all configured objects.
    pub fn iter(&self) -> impl Iterator<Item = &ModelObject> {
        self.objects.values()
    }

    /// Names of all objects of the given kind.
    pub fn names_of_kind(&self, kind: ObjectKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .objects
            .values()
            .filter(|o| o.kind() == kind)
            .map(|o| o.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Register a computed parameter definition.
    ///
    /// A collision with an object name or with a differing parameter
    /// definition is an error; re-registering an identical definition is
    /// a no-op.
    pub fn register_parameter(&mut self, name: &str, def: ParameterDef) -> Result<(), ScriptError> {
        if self.objects.contains_key(name) {
            return Err(ScriptError::TypeMismatch(format!(
                "cannot create parameter {name}: name already used by an object"
            )));
        }
        if let Some(existing) = self.parameters.get(name) {
            if *existing != def {
                return Err(ScriptError::TypeMismatch(format!(
                    "cannot create parameter {name}: incompatible definition already registered"
                )));
            }
            return Ok(());
        }
        debug!("registering parameter {name}");
        self.parameters.insert(name.to_string(), def);
        Ok(())
    }

    /// Register a parameter without collision checks, replacing any
    /// previous definition.
    pub fn overwrite_parameter(&mut self, name: &str, def: ParameterDef) {
        self.parameters.insert(name.to_string(), def);
    }

    /// Look up a registered parameter definition.
    pub fn parameter(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.get(name)
    }

    /// Atomically rename `old` to `new`, cascading through every object
    /// that stores the old name and every registered parameter bound to it.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), ScriptError> {
        if self.objects.contains_key(new) {
            return Err(ScriptError::TypeMismatch(format!(
                "cannot rename {old} to {new}: name already in use"
            )));
        }
        let mut obj = self
            .objects
            .remove(old)
            .ok_or_else(|| ScriptError::not_found(old))?;
        debug!("renaming {old} to {new}");
        obj.set_name(new);
        self.objects.insert(new.to_string(), obj);
        for other in self.objects.values_mut() {
            other.rename_ref_object(old, new);
        }
        let renamed: Vec<(String, ParameterDef)> = self
            .parameters
            .drain()
            .map(|(_, mut def)| {
                if def.owner == old {
                    def.owner = new.to_string();
                }
                if def.dependency.as_deref() == Some(old) {
                    def.dependency = Some(new.to_string());
                }
                // The key is derived from the definition, so owner and
                // dependency renames both land in it.
                let name = match &def.dependency {
                    Some(dep) => format!("{}.{}.{}", def.owner, dep, def.kind.name()),
                    None => format!("{}.{}", def.owner, def.kind.name()),
                };
                (name, def)
            })
            .collect();
        self.parameters = renamed.into_iter().collect();
        Ok(())
    }

    /// Create an array object with the given 1-based dimensions.
    pub fn create_array(
        &mut self,
        name: &str,
        rows: usize,
        cols: usize,
    ) -> Result<(), ScriptError> {
        let obj = self.create_of_kind(ObjectKind::Array, name)?;
        obj.force_set(0, ParamValue::Real(rows as f64))?;
        obj.force_set(1, ParamValue::Real(cols as f64))?;
        obj.force_set(2, ParamValue::RealList(vec![0.0; rows * cols]))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_rejects_incompatible_collision() {
        let mut reg = Registry::new();
        reg.create("Spacecraft", "Sat1").unwrap();
        let err = reg.create("XYPlot", "Sat1").unwrap_err();
        assert!(matches!(err, ScriptError::TypeMismatch(_)));
        assert!(err.to_string().contains("Spacecraft"));
    }

    #[test]
    fn rename_cascades_and_isolates() {
        let mut reg = Registry::new();
        reg.create("Spacecraft", "Sat1").unwrap();
        reg.create("Spacecraft", "SatC").unwrap();
        let burn = reg.create("ImpulsiveBurn", "Burn1").unwrap();
        burn.set_string_parameter_by_name("Origin", "Sat1").unwrap();
        let other = reg.create("ImpulsiveBurn", "Burn2").unwrap();
        other.set_string_parameter_by_name("Origin", "SatC").unwrap();

        reg.rename("Sat1", "SatB").unwrap();
        assert!(reg.get("Sat1").is_none());
        assert_eq!(reg.get("SatB").unwrap().name(), "SatB");
        assert_eq!(
            reg.get("Burn1").unwrap().string_parameter_by_name("Origin").unwrap(),
            "SatB"
        );
        // Unrelated references are untouched.
        assert_eq!(
            reg.get("Burn2").unwrap().string_parameter_by_name("Origin").unwrap(),
            "SatC"
        );
    }

    #[test]
    fn rename_updates_registered_parameters() {
        let mut reg = Registry::new();
        reg.create("Spacecraft", "Sat1").unwrap();
        reg.register_parameter(
            "Sat1.X",
            ParameterDef {
                owner: "Sat1".to_string(),
                dependency: None,
                kind: ParamKind::X,
            },
        )
        .unwrap();
        reg.rename("Sat1", "SatB").unwrap();
        assert!(reg.parameter("Sat1.X").is_none());
        assert_eq!(reg.parameter("SatB.X").unwrap().owner, "SatB");
    }

    #[test]
    fn rename_updates_dependency_qualified_parameter_keys() {
        let mut reg = Registry::new();
        reg.create("Spacecraft", "Sat1").unwrap();
        reg.create("CoordinateSystem", "CS1").unwrap();
        reg.register_parameter(
            "Sat1.CS1.X",
            ParameterDef {
                owner: "Sat1".to_string(),
                dependency: Some("CS1".to_string()),
                kind: ParamKind::X,
            },
        )
        .unwrap();
        reg.rename("CS1", "CS2").unwrap();
        assert!(reg.parameter("Sat1.CS1.X").is_none());
        let def = reg.parameter("Sat1.CS2.X").unwrap();
        assert_eq!(def.owner, "Sat1");
        assert_eq!(def.dependency.as_deref(), Some("CS2"));
    }

    #[test]
    fn parameter_collision_with_object_is_rejected() {
        let mut reg = Registry::new();
        reg.create("Variable", "v").unwrap();
        let err = reg
            .register_parameter(
                "v",
                ParameterDef {
                    owner: "Sat1".to_string(),
                    dependency: None,
                    kind: ParamKind::X,
                },
            )
            .unwrap_err();
        assert!(matches!(err, ScriptError::TypeMismatch(_)));
    }
}
