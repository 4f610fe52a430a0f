//! AstroScript: a mission-scripting engine
//!
//! AstroScript parses a small mission-scripting language, configures the
//! objects the script declares, validates every command against them, and
//! runs the resulting command sequence: propagation, maneuvers,
//! branching, loops, and solver-driven targeting.
//!
//! # Pipeline
//!
//! 1. **Parse** the text into statements ([`Script::parse`]).
//! 2. **Configure**: Create statements populate a [`Registry`] of typed
//!    objects.
//! 3. **Validate**: every reference in every command resolves to an
//!    [`ElementWrapper`] against the configured objects, either failing
//!    fast or accumulating all errors.
//! 4. **Execute**: an [`Executor`] clones the registry and walks the
//!    command chain, so a run can never corrupt the configured templates.
//!
//! # Quick Start
//!
//! ```rust
//! use astroscript::Script;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let script = Script::parse(
//!         "Create Spacecraft Sat1\n\
//!          Sat1.X = 7000\n\
//!          Create Variable v\n\
//!          v = Sat1.X + 1\n",
//!     )?;
//!     let result = script.run()?;
//!     assert_eq!(result.variable("v"), Some(7001.0));
//!     Ok(())
//! }
//! ```
//!
//! # References are names
//!
//! Wrappers and commands store object *names*, never pointers. Every
//! access re-resolves against whichever object map is current, which is
//! what makes per-run clones, Target-loop snapshots, and whole-mission
//! renames ([`Registry::rename`]) safe.

#![warn(missing_docs)]

pub mod error;
pub mod object;
pub mod physics;
pub mod resolver;
pub mod script;
pub mod sequence;
pub mod wrapper;

pub use error::{ExecError, ScriptError};
pub use object::{ModelObject, ObjectKind, ParamKind, ParamType, ParamValue, Registry};
pub use physics::{DifferentialCorrector, LinearPropagator, Propagator, SolverState};
pub use resolver::{ParamManage, ResolveContext};
pub use script::Script;
pub use sequence::{
    CommandKind, CommandNode, Executor, MissionSequence, NodeId, NodeState, RunResult, RunStatus,
};
pub use wrapper::{ElementWrapper, MathNode, MathOp, WrapperKind};
