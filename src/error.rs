//! Error types for script parsing, validation, and execution.

use thiserror::Error;

/// Errors raised while parsing or validating a mission script.
///
/// Resolution-time errors are accumulated by the resolver when running in
/// continue-on-error mode (bulk validation at load time), and raised
/// immediately in fail-fast mode (interactive validation).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// Error parsing the script text.
    #[error("Parse error at line {line}, column {col}: {message}")]
    Parse {
        /// Line number where the error occurred.
        line: usize,
        /// Column number where the error occurred.
        col: usize,
        /// Error message.
        message: String,
    },

    /// A name did not resolve to any configured object.
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    /// A wrapper accessor or slot accessor was used against an
    /// incompatible kind or type.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A command line has fewer arguments than it requires.
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// Disallowed brackets or parentheses in a command that forbids them.
    #[error("Grammar violation: {0}")]
    GrammarViolation(String),
}

impl ScriptError {
    /// Build a reference-not-found error for `name`.
    pub fn not_found(name: &str) -> Self {
        ScriptError::ReferenceNotFound(name.to_string())
    }
}

/// Errors raised while executing a command sequence.
///
/// A command that cannot complete either returns `false` (recoverable stop,
/// reported through [`RunResult`](crate::sequence::RunResult)) or raises one
/// of these, which aborts the run with the offending command recorded.
#[derive(Error, Debug)]
pub enum ExecError {
    /// A script-level error surfaced while preparing the run.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// A command raised a fatal error; carries the command's original
    /// script text.
    #[error("'{script}' failed: {source}")]
    Command {
        /// Generating script text of the offending command.
        script: String,
        /// The underlying error.
        source: ScriptError,
    },

    /// The external solver collaborator reported failure.
    #[error("Solver {solver} failed to converge after {iterations} iterations")]
    SolverDivergence {
        /// Name of the solver object.
        solver: String,
        /// Iterations performed before giving up.
        iterations: usize,
    },

    /// An object reference could not be re-resolved after cloning for a
    /// loop or solver pass.
    #[error("Clone inconsistency: {0}")]
    CloneInconsistency(String),

    /// The command sequence structure is corrupt (unlinked branch,
    /// missing terminator, node marked unusable).
    #[error("Command sequence is corrupt: {0}")]
    CorruptSequence(String),
}

impl ExecError {
    /// Wrap a resolution error with the script text of the command that
    /// raised it.
    pub fn in_command(script: &str, source: ScriptError) -> Self {
        ExecError::Command {
            script: script.to_string(),
            source,
        }
    }
}
