//! Script front end: grammar, statement forms, and the loadable script
//! facade.
//!
//! A [`Script`] is the parsed text. Configuration (Create statements)
//! populates a [`Registry`]; the remaining statements become a
//! [`MissionSequence`] validated against it. The two phases are separate
//! so the same parsed script can be re-validated after objects are
//! reconfigured or renamed.

pub mod ast;
pub mod parser;

use log::info;

use crate::error::{ExecError, ScriptError};
use crate::object::Registry;
use crate::resolver::ResolveContext;
use crate::sequence::{Executor, MissionSequence, RunResult};

use ast::{Block, StmtKind};
use parser::parse_script;

/// A parsed mission script.
#[derive(Debug, Clone)]
pub struct Script {
    statements: Block,
}

impl Script {
    /// Parse script text.
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let statements = parse_script(text)?;
        info!("parsed {} top-level statements", statements.len());
        Ok(Script { statements })
    }

    /// The parsed statement block.
    pub fn statements(&self) -> &Block {
        &self.statements
    }

    /// Apply every Create statement to `registry`, including those nested
    /// inside branch constructs.
    pub fn configure(&self, registry: &mut Registry) -> Result<(), ScriptError> {
        configure_block(&self.statements, registry)
    }

    /// Configure objects and build a validated command sequence,
    /// stopping at the first bad reference.
    pub fn build(&self, registry: &mut Registry) -> Result<MissionSequence, ScriptError> {
        self.configure(registry)?;
        let mut seq = MissionSequence::from_block(&self.statements);
        let mut ctx = ResolveContext::new(registry);
        ctx.validate_sequence(&mut seq)?;
        Ok(seq)
    }

    /// Configure objects and validate every command, accumulating all
    /// errors instead of stopping. Invalid nodes are marked and will
    /// refuse to execute.
    pub fn validate_all(
        &self,
        registry: &mut Registry,
    ) -> Result<(MissionSequence, Vec<ScriptError>), ScriptError> {
        self.configure(registry)?;
        let mut seq = MissionSequence::from_block(&self.statements);
        let mut ctx = ResolveContext::new(registry);
        ctx.continue_on_error = true;
        ctx.validate_sequence(&mut seq)?;
        Ok((seq, ctx.take_errors()))
    }

    /// Parse-to-finish convenience: configure a fresh registry, build the
    /// sequence, and run it.
    pub fn run(&self) -> Result<RunResult, ExecError> {
        let mut registry = Registry::new();
        let mut seq = self.build(&mut registry)?;
        let mut exec = Executor::new(&registry);
        exec.run(&mut seq)
    }
}

fn configure_block(block: &Block, registry: &mut Registry) -> Result<(), ScriptError> {
    for stmt in block {
        match &stmt.kind {
            StmtKind::Create { type_name, names } => {
                for name in names {
                    registry.create(type_name, name)?;
                }
            }
            StmtKind::If {
                then_block,
                else_block,
                ..
            } => {
                configure_block(then_block, registry)?;
                if let Some(b) = else_block {
                    configure_block(b, registry)?;
                }
            }
            StmtKind::While { body, .. } | StmtKind::Target { body, .. } => {
                configure_block(body, registry)?;
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_reaches_nested_creates() {
        let script = Script::parse(
            "Create Variable flag\nIf flag == 0\n   Create Variable inner\nEndIf\n",
        )
        .unwrap();
        let mut reg = Registry::new();
        script.configure(&mut reg).unwrap();
        assert!(reg.contains("flag"));
        assert!(reg.contains("inner"));
    }

    #[test]
    fn parse_build_run_assigns_through_a_parameter() {
        let script = Script::parse(
            "Create Spacecraft Sat1\nSat1.X = 7000\nCreate Variable v\nv = Sat1.X + 1\n",
        )
        .unwrap();
        let result = script.run().unwrap();
        assert_eq!(result.variable("v"), Some(7001.0));
    }

    #[test]
    fn build_fails_fast_on_an_unknown_reference() {
        let script = Script::parse("Create Variable v\nv = Sat9.X\n").unwrap();
        let mut reg = Registry::new();
        let err = script.build(&mut reg).unwrap_err();
        assert!(matches!(err, ScriptError::ReferenceNotFound(_)));
    }
}
