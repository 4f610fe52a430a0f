//! Command sequence structure and mission execution end to end.

use astroscript::{
    CommandKind, CommandNode, Executor, MissionSequence, Registry, ResolveContext, RunStatus,
    Script,
};
use proptest::prelude::*;

fn build(script_text: &str) -> (Registry, MissionSequence) {
    let script = Script::parse(script_text).unwrap();
    let mut registry = Registry::new();
    let seq = script.build(&mut registry).unwrap();
    (registry, seq)
}

fn run(script_text: &str) -> astroscript::RunResult {
    Script::parse(script_text).unwrap().run().unwrap()
}

#[test]
fn traversal_skips_past_nested_constructs() {
    let (_, seq) = build(
        "Create Variable v\n\
         If v < 10\n\
            While v < 5\n\
               v = v + 1\n\
            EndWhile\n\
         EndIf\n\
         Stop\n",
    );
    // Structural walk: get_next from the If jumps the whole construct.
    let create = seq.head().unwrap();
    let if_id = seq.get_next(create).unwrap();
    let after = seq.get_next(if_id).unwrap();
    assert_eq!(seq.node(after).script, "Stop");
    // The nested While's exit also lands on a node inside the If body's
    // tail, never outside the construct.
    let while_id = seq.node(if_id).branches[0];
    let endif = seq.get_next(while_id).unwrap();
    assert_eq!(seq.node(endif).script, "EndIf");
}

#[test]
fn while_loop_runs_its_body_the_exact_number_of_times() {
    let result = run(
        "Create Variable i\n\
         Create Variable total\n\
         While i < 4\n\
            i = i + 1\n\
            total = total + 10\n\
         EndWhile\n",
    );
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.variable("i"), Some(4.0));
    assert_eq!(result.variable("total"), Some(40.0));
}

#[test]
fn if_else_takes_exactly_one_arm() {
    let result = run(
        "Create Variable v\n\
         Create Variable taken\n\
         v = 3\n\
         If v > 5\n\
            taken = 1\n\
         Else\n\
            taken = 2\n\
         EndIf\n",
    );
    assert_eq!(result.variable("taken"), Some(2.0));
}

#[test]
fn stop_inside_a_loop_ends_the_run() {
    let result = run(
        "Create Variable i\n\
         While i < 100\n\
            i = i + 1\n\
            If i == 3\n\
               Stop\n\
            EndIf\n\
         EndWhile\n",
    );
    assert_eq!(result.status, RunStatus::Stopped);
    assert_eq!(result.variable("i"), Some(3.0));
}

#[test]
fn maneuver_and_propagate_move_the_spacecraft() {
    let result = run(
        "Create Spacecraft Sat1\n\
         Create ImpulsiveBurn Burn1\n\
         Create Propagator Prop1\n\
         Sat1.X = 7000\n\
         Burn1.Element1 = 2\n\
         Maneuver Burn1(Sat1)\n\
         Propagate Prop1(Sat1) {Sat1.ElapsedSecs = 120}\n",
    );
    assert_eq!(result.status, RunStatus::Completed);
    let sat = result.registry.get("Sat1").unwrap();
    assert_eq!(sat.real_parameter_by_name("VX").unwrap(), 2.0);
    // Two 60 s steps at 2 km/s.
    assert_eq!(sat.real_parameter_by_name("X").unwrap(), 7240.0);
    assert_eq!(sat.real_parameter_by_name("ElapsedSecs").unwrap(), 120.0);
}

#[test]
fn target_loop_solves_for_the_burn_magnitude() {
    let result = run(
        "Create Spacecraft Sat1\n\
         Create ImpulsiveBurn Burn1\n\
         Create Propagator Prop1\n\
         Create DifferentialCorrector DC\n\
         Sat1.X = 7000\n\
         Target DC\n\
            Vary DC(Burn1.Element1 = 0)\n\
            Maneuver Burn1(Sat1)\n\
            Propagate Prop1(Sat1) {Sat1.ElapsedSecs = 60}\n\
            Achieve DC(Sat1.X = 7600, {Tolerance = 0.01})\n\
         EndTarget\n",
    );
    assert_eq!(result.status, RunStatus::Completed);
    let sat = result.registry.get("Sat1").unwrap();
    let x = sat.real_parameter_by_name("X").unwrap();
    assert!((x - 7600.0).abs() <= 0.01, "X was {x}");
    // One 60 s step: delta-v of 10 km/s closes the 600 km gap.
    let e1 = result
        .registry
        .get("Burn1")
        .unwrap()
        .real_parameter_by_name("Element1")
        .unwrap();
    assert!((e1 - 10.0).abs() < 0.01, "Element1 was {e1}");
}

#[test]
fn diverging_target_reports_the_solver() {
    let script = Script::parse(
        "Create DifferentialCorrector DC\n\
         Create Variable x\n\
         Create Variable y\n\
         Target DC\n\
            Vary DC(x = 0)\n\
            y = 5\n\
            Achieve DC(y = 100)\n\
         EndTarget\n",
    )
    .unwrap();
    let err = script.run().unwrap_err();
    match err {
        astroscript::ExecError::SolverDivergence { solver, .. } => assert_eq!(solver, "DC"),
        other => panic!("expected divergence, got {other}"),
    }
}

#[test]
fn report_accumulates_lines_with_headers() {
    let result = run(
        "Create Spacecraft Sat1\n\
         Create ReportFile Log1\n\
         Log1.WriteHeaders = true\n\
         Sat1.X = 7000\n\
         Report Log1 Sat1.X Sat1.VX\n\
         Sat1.X = 7100\n\
         Report Log1 Sat1.X Sat1.VX\n",
    );
    let lines = result.report_lines("Log1");
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("Sat1.X"));
    assert!(lines[1].starts_with("7000"));
    assert!(lines[2].starts_with("7100"));
}

#[test]
fn plot_actions_toggle_drawing_and_clear_data() {
    let result = run(
        "Create XYPlot Plot1\n\
         PenUp Plot1\n",
    );
    assert_eq!(result.status, RunStatus::Completed);
    let plot = result.registry.get("Plot1").unwrap();
    assert!(!plot.bool_parameter_by_name("Drawing").unwrap());
}

fn single_node(src: &str) -> CommandNode {
    let block = astroscript::script::parser::parse_script(src).unwrap();
    let donor = MissionSequence::from_block(&block);
    donor.node(donor.head().unwrap()).clone()
}

#[test]
fn command_inserted_after_an_if_runs_on_both_arms() {
    for v in [1.0_f64, 9.0] {
        let script = Script::parse(&format!(
            "Create Variable v\n\
             Create Variable mark\n\
             v = {v}\n\
             If v > 5\n\
                v = v + 1\n\
             Else\n\
                v = v - 1\n\
             EndIf\n"
        ))
        .unwrap();
        let mut registry = Registry::new();
        let mut seq = script.build(&mut registry).unwrap();
        let if_id = seq
            .ids()
            .find(|&id| matches!(seq.node(id).kind, CommandKind::If { .. }))
            .unwrap();
        // Anchor at the EndIf on one pass and at the If node on the other;
        // both mean "after the whole construct".
        let anchor = if v < 5.0 {
            seq.end_node_of(if_id).unwrap()
        } else {
            if_id
        };
        assert!(seq.insert_after(single_node("mark = 9\n"), anchor));
        let mut ctx = ResolveContext::new(&mut registry);
        ctx.validate_sequence(&mut seq).unwrap();
        let mut exec = Executor::new(&registry);
        let result = exec.run(&mut seq).unwrap();
        assert_eq!(result.variable("mark"), Some(9.0), "v = {v}");
    }
}

#[test]
fn string_variable_assignment_uses_the_string_path() {
    let result = run(
        "Create String s\n\
         Create XYPlot Plot1\n\
         s = 'Sat1.X'\n\
         Plot1.XVariable = s\n",
    );
    assert_eq!(result.status, RunStatus::Completed);
    let plot = result.registry.get("Plot1").unwrap();
    assert_eq!(
        plot.string_parameter_by_name("XVariable").unwrap(),
        "Sat1.X"
    );
}

#[test]
fn re_executed_create_keeps_accumulated_state() {
    let result = run(
        "Create Variable v\n\
         v = 5\n\
         Create Variable v\n",
    );
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.variable("v"), Some(5.0));
}

#[test]
fn rerunning_the_same_sequence_gives_the_same_answer() {
    let (registry, mut seq) = build(
        "Create Variable i\n\
         While i < 3\n\
            i = i + 1\n\
         EndWhile\n",
    );
    let mut exec = Executor::new(&registry);
    let first = exec.run(&mut seq).unwrap();
    let mut exec = Executor::new(&registry);
    let second = exec.run(&mut seq).unwrap();
    assert_eq!(first.variable("i"), second.variable("i"));
    assert_eq!(first.commands_executed, second.commands_executed);
}

#[test]
fn sequence_rename_keeps_the_mission_runnable() {
    let script = Script::parse(
        "Create Spacecraft SatA\n\
         SatA.X = 7000\n\
         Create Variable v\n\
         v = SatA.X + 1\n",
    )
    .unwrap();
    let mut registry = Registry::new();
    let mut seq = script.build(&mut registry).unwrap();
    registry.rename("SatA", "SatB").unwrap();
    seq.rename_object("SatA", "SatB");
    assert!(seq.generating_script().contains("SatB.X = 7000"));
    let mut exec = Executor::new(&registry);
    let result = exec.run(&mut seq).unwrap();
    assert_eq!(result.variable("v"), Some(7001.0));
}

fn nested_statements() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        Just("v = v + 1".to_string()),
        Just("w = v * 2".to_string()),
    ];
    leaf.prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            (proptest::collection::vec(inner.clone(), 1..3), any::<bool>()).prop_map(
                |(body, with_else)| {
                    let b = body.join("\n");
                    if with_else {
                        format!("If v < 10\n{b}\nElse\n{b}\nEndIf")
                    } else {
                        format!("If v < 10\n{b}\nEndIf")
                    }
                }
            ),
            proptest::collection::vec(inner, 1..3)
                .prop_map(|body| format!("While v < 0\n{}\nEndWhile", body.join("\n"))),
        ]
    })
}

proptest! {
    /// For any nesting of If and While constructs, the main chain from the
    /// head terminates, never revisits a node, and reaches the final Stop.
    #[test]
    fn main_chain_walk_terminates_without_revisits(
        stmts in proptest::collection::vec(nested_statements(), 1..4)
    ) {
        let text = format!(
            "Create Variable v\nCreate Variable w\n{}\nStop\n",
            stmts.join("\n")
        );
        let (_, seq) = build(&text);
        let mut seen = vec![false; seq.len()];
        let mut cursor = seq.head();
        let mut last = None;
        while let Some(id) = cursor {
            prop_assert!(!seen[id], "main chain revisited node {id}");
            seen[id] = true;
            last = Some(id);
            cursor = seq.get_next(id);
        }
        let last = last.unwrap();
        prop_assert_eq!(seq.node(last).script.as_str(), "Stop");
        // Every allocated node is reachable from the head.
        for id in seq.ids() {
            prop_assert!(seq.contains(id), "node {id} unreachable");
        }
    }

    /// Executing the nested structure completes: If arms route to the
    /// construct exit and the false While never traps the cursor.
    #[test]
    fn nested_structures_execute_to_completion(
        stmts in proptest::collection::vec(nested_statements(), 1..4)
    ) {
        let text = format!(
            "Create Variable v\nCreate Variable w\n{}\n",
            stmts.join("\n")
        );
        let result = Script::parse(&text).unwrap().run().unwrap();
        prop_assert_eq!(result.status, RunStatus::Completed);
    }
}
