//! Statement and expression forms produced by the parser.
//!
//! These are raw, unresolved forms: references are still description
//! strings. The resolver turns them into wrappers and math trees when the
//! command sequence is validated.

use crate::wrapper::MathOp;

/// A block of statements.
pub type Block = Vec<Statement>;

/// One parsed statement with its generating script text.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// The statement form.
    pub kind: StmtKind,
    /// The script text this statement regenerates to. For branch
    /// constructs this is the header line only; the body keeps its own.
    pub script: String,
}

/// The statement forms of the mission-script language.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `Create <Type> <name> [, <name>...]`
    Create {
        /// Type-name string.
        type_name: String,
        /// Names to create.
        names: Vec<String>,
    },
    /// `target = expression;`
    Assignment {
        /// Target reference text.
        target: String,
        /// Right-hand side expression.
        expr: Expression,
    },
    /// `If <cond>` ... `Else` ... `EndIf`
    If {
        /// The branch condition.
        condition: Condition,
        /// Statements of the true branch.
        then_block: Block,
        /// Statements of the false branch, if an `Else` is present.
        else_block: Option<Block>,
    },
    /// `While <cond>` ... `EndWhile`
    While {
        /// The loop condition, re-evaluated on each arrival.
        condition: Condition,
        /// Loop body.
        body: Block,
    },
    /// `Target <solver>` ... `EndTarget`
    Target {
        /// Solver object name.
        solver: String,
        /// Loop body, run once per solver pass.
        body: Block,
    },
    /// `Vary <solver>(<var> = <initial>)`
    Vary {
        /// Solver object name.
        solver: String,
        /// Reference text of the control variable.
        variable: String,
        /// Initial guess expression.
        initial: Expression,
    },
    /// `Achieve <solver>(<goal> = <value>[, {Tolerance = t}])`
    Achieve {
        /// Solver object name.
        solver: String,
        /// Reference text of the goal quantity.
        goal: String,
        /// Desired value expression.
        value: Expression,
        /// Convergence tolerance; the solver default applies when absent.
        tolerance: Option<f64>,
    },
    /// `Propagate <prop>(<sat>) {<ref> = <value>}`
    Propagate {
        /// Propagator object name.
        propagator: String,
        /// Spacecraft object name.
        spacecraft: String,
        /// Stop-condition reference text.
        stop_ref: String,
        /// Stop-condition value expression.
        stop_value: Expression,
    },
    /// `Maneuver <burn>(<sat>)`
    Maneuver {
        /// Burn object name.
        burn: String,
        /// Spacecraft object name.
        spacecraft: String,
    },
    /// `Report <file> <item>...`
    Report {
        /// Report-file object name.
        file: String,
        /// Reference texts of the reported items.
        items: Vec<String>,
    },
    /// `ClearPlot`, `PenUp`, or `PenDown` applied to a plot object.
    PlotCommand {
        /// Plot object name.
        plot: String,
        /// Which action to dispatch.
        action: PlotAction,
    },
    /// `Stop`
    Stop,
    /// `BeginScript` ... `EndScript` verbatim block.
    Verbatim {
        /// The enclosed lines, preserved byte for byte.
        text: String,
    },
}

/// The plot actions dispatched through the generic `take_action` protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotAction {
    /// Discard accumulated plot data.
    ClearData,
    /// Lift the pen: points are no longer drawn.
    PenUp,
    /// Lower the pen: points are drawn again.
    PenDown,
}

impl PlotAction {
    /// The action name passed to `take_action`.
    pub fn action_name(&self) -> &'static str {
        match self {
            PlotAction::ClearData => "ClearData",
            PlotAction::PenUp => "PenUp",
            PlotAction::PenDown => "PenDown",
        }
    }

    /// The command keyword that produces this action.
    pub fn keyword(&self) -> &'static str {
        match self {
            PlotAction::ClearData => "ClearPlot",
            PlotAction::PenUp => "PenUp",
            PlotAction::PenDown => "PenDown",
        }
    }
}

/// A relational condition over two reference operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Left operand reference text.
    pub lhs: String,
    /// Relational operator.
    pub op: RelOp,
    /// Right operand reference text.
    pub rhs: String,
}

/// Relational operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    /// Equality: `==`
    Eq,
    /// Inequality: `~=` or `!=`
    Ne,
    /// Less than: `<`
    Lt,
    /// Greater than: `>`
    Gt,
    /// Less than or equal: `<=`
    Le,
    /// Greater than or equal: `>=`
    Ge,
}

impl RelOp {
    /// Apply the operator to two reals.
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            RelOp::Eq => lhs == rhs,
            RelOp::Ne => lhs != rhs,
            RelOp::Lt => lhs < rhs,
            RelOp::Gt => lhs > rhs,
            RelOp::Le => lhs <= rhs,
            RelOp::Ge => lhs >= rhs,
        }
    }

    /// The operator's script symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            RelOp::Eq => "==",
            RelOp::Ne => "~=",
            RelOp::Lt => "<",
            RelOp::Gt => ">",
            RelOp::Le => "<=",
            RelOp::Ge => ">=",
        }
    }
}

/// An unresolved expression tree; leaves are reference texts or literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Numeric literal.
    Number(f64),
    /// Quoted string literal.
    StringLit(String),
    /// A reference such as `Sat1.X`, `v`, `A(1,2)`, `On`.
    Reference(String),
    /// Binary operation.
    Binary {
        /// Operator.
        op: MathOp,
        /// Left operand.
        left: Box<Expression>,
        /// Right operand.
        right: Box<Expression>,
    },
    /// Unary negation.
    Negate(Box<Expression>),
}
