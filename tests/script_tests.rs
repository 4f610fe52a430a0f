//! Script loading and validation behavior through the public API.

use astroscript::{
    ElementWrapper, ParamManage, Registry, ResolveContext, Script, ScriptError, WrapperKind,
};

#[test]
fn load_configure_and_read_back() {
    let script = Script::parse(
        "Create Spacecraft Sat1, Sat2\n\
         Create Propagator DefaultProp\n\
         Create Variable v\n",
    )
    .unwrap();
    let mut reg = Registry::new();
    script.configure(&mut reg).unwrap();
    for name in ["Sat1", "Sat2", "DefaultProp", "v"] {
        assert!(reg.contains(name), "{name} missing");
    }
}

#[test]
fn assignment_through_a_computed_parameter() {
    let script = Script::parse(
        "Create Spacecraft Sat1\n\
         Sat1.X = 7000\n\
         Create Variable v\n\
         v = Sat1.X + 1\n",
    )
    .unwrap();
    let result = script.run().unwrap();
    assert_eq!(result.variable("v"), Some(7001.0));
}

#[test]
fn dotted_reference_resolves_to_a_parameter_wrapper_by_default() {
    let mut reg = Registry::new();
    reg.create("Spacecraft", "Sat1").unwrap();
    let mut ctx = ResolveContext::new(&mut reg);
    let w = ctx.create_element_wrapper("Sat1.X").unwrap();
    assert_eq!(w.kind(), WrapperKind::Parameter);
    // The same description resolves to a slot when the order is flipped.
    let mut reg = Registry::new();
    reg.create("Spacecraft", "Sat1").unwrap();
    let mut ctx = ResolveContext::new(&mut reg);
    ctx.parameters_first = false;
    ctx.manage = ParamManage::Transient;
    let w = ctx.create_element_wrapper("Sat1.X").unwrap();
    assert_eq!(w.kind(), WrapperKind::ObjectProperty);
}

#[test]
fn wrapper_read_matches_direct_accessor() {
    let mut reg = Registry::new();
    let sat = reg.create("Spacecraft", "Sat1").unwrap();
    sat.set_real_parameter_by_name("VZ", -3.25).unwrap();
    let mut ctx = ResolveContext::new(&mut reg);
    let w = ctx.create_element_wrapper("Sat1.VZ").unwrap();
    let direct = reg
        .get("Sat1")
        .unwrap()
        .real_parameter_by_name("VZ")
        .unwrap();
    assert_eq!(w.evaluate_real(&reg).unwrap(), direct);
}

#[test]
fn mismatched_accessor_leaves_the_object_untouched() {
    let mut reg = Registry::new();
    reg.create("Spacecraft", "Sat1").unwrap();
    let w = ElementWrapper::ObjectRef {
        desc: "Sat1".into(),
        name: "Sat1".into(),
    };
    let before = reg.get("Sat1").unwrap().clone();
    assert!(w.set_real(&mut reg, 9.0).is_err());
    assert_eq!(*reg.get("Sat1").unwrap(), before);
}

#[test]
fn clear_plot_on_a_spacecraft_names_the_actual_type() {
    let script = Script::parse("Create Spacecraft Sat1\nClearPlot Sat1\n").unwrap();
    let mut reg = Registry::new();
    let err = script.build(&mut reg).unwrap_err();
    match err {
        ScriptError::TypeMismatch(msg) => {
            assert!(msg.contains("Spacecraft"), "message: {msg}");
            assert!(msg.contains("XYPlot"), "message: {msg}");
        }
        other => panic!("expected a type mismatch, got {other:?}"),
    }
}

#[test]
fn penup_with_index_fails_before_any_lookup() {
    // No objects are configured; the violation must come from the command
    // form alone.
    let err = Script::parse("PenUp Sat1(5)\n").unwrap_err();
    assert!(matches!(err, ScriptError::GrammarViolation(_)), "{err:?}");
}

#[test]
fn report_without_items_is_a_missing_argument() {
    let err = Script::parse("Report MyFile\n").unwrap_err();
    assert!(matches!(err, ScriptError::MissingArgument(_)), "{err:?}");
}

#[test]
fn bulk_validation_accumulates_one_error_and_continues() {
    let script = Script::parse(
        "Create Variable v\n\
         v = 1\n\
         ClearPlot Sat9\n\
         v = 2\n",
    )
    .unwrap();
    let mut reg = Registry::new();
    let (seq, errors) = script.validate_all(&mut reg).unwrap();
    assert_eq!(errors.len(), 1);
    assert!(
        matches!(&errors[0], ScriptError::ReferenceNotFound(name) if name == "Sat9"),
        "{errors:?}"
    );
    // The failing command is marked; everything else validated.
    let invalid: Vec<_> = seq
        .ids()
        .filter(|&id| seq.node(id).state == astroscript::NodeState::Invalid)
        .collect();
    assert_eq!(invalid.len(), 1);
    assert!(seq.node(invalid[0]).script.contains("Sat9"));
}

#[test]
fn rename_preserves_resolution_and_isolates_other_objects() {
    let mut reg = Registry::new();
    let sat = reg.create("Spacecraft", "SatA").unwrap();
    sat.set_real_parameter_by_name("X", 1234.0).unwrap();
    let satc = reg.create("Spacecraft", "SatC").unwrap();
    satc.set_real_parameter_by_name("X", 9.0).unwrap();

    let mut ctx = ResolveContext::new(&mut reg);
    let mut w = ctx.create_element_wrapper("SatA.X").unwrap();
    let mut untouched = ctx.create_element_wrapper("SatC.X").unwrap();

    reg.rename("SatA", "SatB").unwrap();
    w.rename_object("SatA", "SatB");
    untouched.rename_object("SatA", "SatB");

    assert_eq!(w.description(), "SatB.X");
    assert_eq!(w.evaluate_real(&reg).unwrap(), 1234.0);
    assert_eq!(untouched.description(), "SatC.X");
    assert_eq!(untouched.evaluate_real(&reg).unwrap(), 9.0);
    // The old name is gone from the registry and its parameter table.
    assert!(reg.get("SatA").is_none());
    assert!(reg.parameter("SatA.X").is_none());
    assert!(reg.parameter("SatB.X").is_some());
}

#[test]
fn verbatim_text_survives_load_and_regeneration() {
    let script = Script::parse(
        "Create Variable v\n\
         BeginScript\n\
         raw line (with) {anything}\n\
         EndScript\n\
         v = 1\n",
    )
    .unwrap();
    let mut reg = Registry::new();
    let seq = script.build(&mut reg).unwrap();
    let out = seq.generating_script();
    assert!(out.contains("raw line (with) {anything}"));
    assert!(out.contains("BeginScript"));
    assert!(out.contains("EndScript"));
}
