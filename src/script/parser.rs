//! Parser implementation using Pest.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::error::ScriptError;
use crate::script::ast::*;
use crate::wrapper::MathOp;

/// Pest parser over the mission-script grammar.
#[derive(Parser)]
#[grammar = "script/grammar.pest"]
pub struct MissionParser;

impl From<pest::error::Error<Rule>> for ScriptError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((line, col)) => (line, col),
            pest::error::LineColLocation::Span((line, col), _) => (line, col),
        };
        ScriptError::Parse {
            line,
            col,
            message: e.variant.to_string(),
        }
    }
}

/// Parse a mission script from a string into a statement block.
pub fn parse_script(input: &str) -> Result<Block, ScriptError> {
    let pairs = MissionParser::parse(Rule::script, input)?;

    let mut statements = Vec::new();
    for pair in pairs {
        if pair.as_rule() == Rule::script {
            for inner in pair.into_inner() {
                if inner.as_rule() == Rule::statement {
                    if let Some(stmt) = parse_statement(inner)? {
                        statements.push(stmt);
                    }
                }
            }
        }
    }

    Ok(statements)
}

fn parse_statement(pair: Pair<Rule>) -> Result<Option<Statement>, ScriptError> {
    let Some(inner) = pair.into_inner().next() else {
        return Ok(None);
    };

    let stmt = match inner.as_rule() {
        Rule::create_stmt => parse_create_stmt(inner)?,
        Rule::assign_stmt => parse_assign_stmt(inner)?,
        Rule::if_stmt => parse_if_stmt(inner)?,
        Rule::while_stmt => parse_while_stmt(inner)?,
        Rule::target_stmt => parse_target_stmt(inner)?,
        Rule::vary_stmt => parse_vary_stmt(inner)?,
        Rule::achieve_stmt => parse_achieve_stmt(inner)?,
        Rule::propagate_stmt => parse_propagate_stmt(inner)?,
        Rule::maneuver_stmt => parse_maneuver_stmt(inner)?,
        Rule::report_stmt => parse_report_stmt(inner)?,
        Rule::clear_plot_stmt => parse_plot_stmt(inner, PlotAction::ClearData)?,
        Rule::pen_up_stmt => parse_plot_stmt(inner, PlotAction::PenUp)?,
        Rule::pen_down_stmt => parse_plot_stmt(inner, PlotAction::PenDown)?,
        Rule::stop_stmt => Statement {
            kind: StmtKind::Stop,
            script: "Stop".to_string(),
        },
        Rule::verbatim_block => parse_verbatim_block(inner)?,
        _ => return Ok(None),
    };

    Ok(Some(stmt))
}

fn parse_create_stmt(pair: Pair<Rule>) -> Result<Statement, ScriptError> {
    let script = pair.as_str().trim().to_string();
    let mut names: Vec<String> = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::identifier)
        .map(|p| p.as_str().to_string())
        .collect();
    if names.len() < 2 {
        return Err(ScriptError::MissingArgument(format!(
            "'{script}': Create requires a type and at least one name"
        )));
    }
    let type_name = names.remove(0);
    Ok(Statement {
        kind: StmtKind::Create { type_name, names },
        script,
    })
}

fn parse_assign_stmt(pair: Pair<Rule>) -> Result<Statement, ScriptError> {
    let script = pair.as_str().trim().to_string();
    let mut inner = pair.into_inner();
    let target = inner.next().unwrap().as_str().trim().to_string();
    let expr = parse_expression(inner.next().unwrap())?;
    Ok(Statement {
        kind: StmtKind::Assignment { target, expr },
        script,
    })
}

fn parse_condition(pair: Pair<Rule>) -> Condition {
    let mut inner = pair.into_inner();
    let lhs = inner.next().unwrap().as_str().trim().to_string();
    let op = match inner.next().unwrap().as_str() {
        "==" => RelOp::Eq,
        "~=" | "!=" => RelOp::Ne,
        "<=" => RelOp::Le,
        ">=" => RelOp::Ge,
        "<" => RelOp::Lt,
        _ => RelOp::Gt,
    };
    let rhs = inner.next().unwrap().as_str().trim().to_string();
    Condition { lhs, op, rhs }
}

fn parse_if_stmt(pair: Pair<Rule>) -> Result<Statement, ScriptError> {
    let mut inner = pair.into_inner();
    inner.next(); // kw_if
    let condition = parse_condition(inner.next().unwrap());
    let then_block = parse_block(inner.next().unwrap())?;
    let mut else_block = None;
    for p in inner {
        if p.as_rule() == Rule::else_clause {
            let block_pair = p
                .into_inner()
                .find(|q| q.as_rule() == Rule::block)
                .expect("else clause holds a block");
            else_block = Some(parse_block(block_pair)?);
        }
    }
    let script = format!(
        "If {} {} {}",
        condition.lhs,
        condition.op.symbol(),
        condition.rhs
    );
    Ok(Statement {
        kind: StmtKind::If {
            condition,
            then_block,
            else_block,
        },
        script,
    })
}

fn parse_while_stmt(pair: Pair<Rule>) -> Result<Statement, ScriptError> {
    let mut inner = pair.into_inner();
    inner.next(); // kw_while
    let condition = parse_condition(inner.next().unwrap());
    let body = parse_block(inner.next().unwrap())?;
    let script = format!(
        "While {} {} {}",
        condition.lhs,
        condition.op.symbol(),
        condition.rhs
    );
    Ok(Statement {
        kind: StmtKind::While { condition, body },
        script,
    })
}

fn parse_target_stmt(pair: Pair<Rule>) -> Result<Statement, ScriptError> {
    let mut inner = pair.into_inner();
    inner.next(); // kw_target
    let solver = inner.next().unwrap().as_str().to_string();
    let body = parse_block(inner.next().unwrap())?;
    let script = format!("Target {solver}");
    Ok(Statement {
        kind: StmtKind::Target { solver, body },
        script,
    })
}

fn parse_vary_stmt(pair: Pair<Rule>) -> Result<Statement, ScriptError> {
    let script = pair.as_str().trim().to_string();
    let mut inner = pair.into_inner();
    inner.next(); // kw_vary
    let solver = inner.next().unwrap().as_str().to_string();
    let variable = inner.next().unwrap().as_str().trim().to_string();
    let initial = parse_expression(inner.next().unwrap())?;
    Ok(Statement {
        kind: StmtKind::Vary {
            solver,
            variable,
            initial,
        },
        script,
    })
}

fn parse_achieve_stmt(pair: Pair<Rule>) -> Result<Statement, ScriptError> {
    let script = pair.as_str().trim().to_string();
    let mut inner = pair.into_inner();
    inner.next(); // kw_achieve
    let solver = inner.next().unwrap().as_str().to_string();
    let goal = inner.next().unwrap().as_str().trim().to_string();
    let value = parse_expression(inner.next().unwrap())?;
    let mut tolerance = None;
    for p in inner {
        if p.as_rule() == Rule::tolerance_spec {
            let num = p
                .into_inner()
                .find(|q| q.as_rule() == Rule::number)
                .expect("tolerance spec holds a number");
            tolerance = Some(num.as_str().parse().unwrap());
        }
    }
    Ok(Statement {
        kind: StmtKind::Achieve {
            solver,
            goal,
            value,
            tolerance,
        },
        script,
    })
}

fn parse_propagate_stmt(pair: Pair<Rule>) -> Result<Statement, ScriptError> {
    let script = pair.as_str().trim().to_string();
    let mut inner = pair.into_inner();
    inner.next(); // kw_propagate
    let propagator = inner.next().unwrap().as_str().to_string();
    let spacecraft = inner.next().unwrap().as_str().to_string();
    let stop_ref = inner.next().unwrap().as_str().trim().to_string();
    let stop_value = parse_expression(inner.next().unwrap())?;
    Ok(Statement {
        kind: StmtKind::Propagate {
            propagator,
            spacecraft,
            stop_ref,
            stop_value,
        },
        script,
    })
}

fn parse_maneuver_stmt(pair: Pair<Rule>) -> Result<Statement, ScriptError> {
    let script = pair.as_str().trim().to_string();
    let mut inner = pair.into_inner();
    inner.next(); // kw_maneuver
    let burn = inner.next().unwrap().as_str().to_string();
    let spacecraft = inner.next().unwrap().as_str().to_string();
    Ok(Statement {
        kind: StmtKind::Maneuver { burn, spacecraft },
        script,
    })
}

fn parse_report_stmt(pair: Pair<Rule>) -> Result<Statement, ScriptError> {
    let script = pair.as_str().trim().to_string();
    let mut inner = pair.into_inner();
    inner.next(); // kw_report
    let file = match inner.next() {
        Some(p) => p.as_str().to_string(),
        None => {
            return Err(ScriptError::MissingArgument(format!(
                "'{script}': Report requires a report file and at least one item"
            )))
        }
    };
    let items: Vec<String> = inner.map(|p| p.as_str().trim().to_string()).collect();
    if items.is_empty() {
        return Err(ScriptError::MissingArgument(format!(
            "'{script}': Report requires at least one item to report"
        )));
    }
    Ok(Statement {
        kind: StmtKind::Report { file, items },
        script,
    })
}

fn parse_plot_stmt(pair: Pair<Rule>, action: PlotAction) -> Result<Statement, ScriptError> {
    let script = pair.as_str().trim().to_string();
    let mut inner = pair.into_inner();
    inner.next(); // keyword
    let arg = inner.next().unwrap().as_str().trim().to_string();
    // Bracket and parenthesis checks happen here, before any object lookup.
    if arg.contains('(') || arg.contains('[') {
        return Err(ScriptError::GrammarViolation(format!(
            "'{script}': {} does not allow brackets or parentheses in its argument",
            action.keyword()
        )));
    }
    if arg.contains('.') {
        return Err(ScriptError::GrammarViolation(format!(
            "'{script}': {} expects a plot name, not a field reference",
            action.keyword()
        )));
    }
    Ok(Statement {
        kind: StmtKind::PlotCommand { plot: arg, action },
        script,
    })
}

fn parse_verbatim_block(pair: Pair<Rule>) -> Result<Statement, ScriptError> {
    let script = pair.as_str().trim().to_string();
    let text = pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::verbatim_body)
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    Ok(Statement {
        kind: StmtKind::Verbatim { text },
        script,
    })
}

fn parse_block(pair: Pair<Rule>) -> Result<Block, ScriptError> {
    let mut statements = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::statement {
            if let Some(stmt) = parse_statement(inner)? {
                statements.push(stmt);
            }
        }
    }
    Ok(statements)
}

fn parse_expression(pair: Pair<Rule>) -> Result<Expression, ScriptError> {
    let mut inner = pair.into_inner();
    let mut expr = parse_term(inner.next().unwrap())?;
    while let Some(op_pair) = inner.next() {
        let op = if op_pair.as_str() == "+" {
            MathOp::Add
        } else {
            MathOp::Sub
        };
        let rhs = parse_term(inner.next().unwrap())?;
        expr = Expression::Binary {
            op,
            left: Box::new(expr),
            right: Box::new(rhs),
        };
    }
    Ok(expr)
}

fn parse_term(pair: Pair<Rule>) -> Result<Expression, ScriptError> {
    let mut inner = pair.into_inner();
    let mut expr = parse_factor(inner.next().unwrap())?;
    while let Some(op_pair) = inner.next() {
        let op = if op_pair.as_str() == "*" {
            MathOp::Mul
        } else {
            MathOp::Div
        };
        let rhs = parse_factor(inner.next().unwrap())?;
        expr = Expression::Binary {
            op,
            left: Box::new(expr),
            right: Box::new(rhs),
        };
    }
    Ok(expr)
}

fn parse_factor(pair: Pair<Rule>) -> Result<Expression, ScriptError> {
    let inner = pair.into_inner().next().unwrap();
    match inner.as_rule() {
        Rule::number => Ok(Expression::Number(inner.as_str().parse().unwrap())),
        Rule::string_lit => {
            let s = inner.as_str();
            Ok(Expression::StringLit(s[1..s.len() - 1].to_string()))
        }
        Rule::paren_expr => parse_expression(inner.into_inner().next().unwrap()),
        Rule::neg_factor => Ok(Expression::Negate(Box::new(parse_factor(
            inner.into_inner().next().unwrap(),
        )?))),
        Rule::reference => Ok(Expression::Reference(inner.as_str().trim().to_string())),
        rule => Err(ScriptError::Parse {
            line: 0,
            col: 0,
            message: format!("unexpected expression rule: {rule:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_and_assignment() {
        let block = parse_script("Create Spacecraft Sat1\nSat1.X = 7000;\n").unwrap();
        assert_eq!(block.len(), 2);
        assert_eq!(block[1].script, "Sat1.X = 7000;");
        match &block[1].kind {
            StmtKind::Assignment { target, expr } => {
                assert_eq!(target, "Sat1.X");
                assert_eq!(*expr, Expression::Number(7000.0));
            }
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn expression_precedence_is_left_to_right_with_terms() {
        let block = parse_script("v = 2 + 3 * 4\n").unwrap();
        let StmtKind::Assignment { expr, .. } = &block[0].kind else {
            panic!("expected assignment");
        };
        match expr {
            Expression::Binary { op: MathOp::Add, right, .. } => {
                assert!(matches!(**right, Expression::Binary { op: MathOp::Mul, .. }));
            }
            other => panic!("expected additive root, got {other:?}"),
        }
    }

    #[test]
    fn nested_if_while_parses() {
        let text = "While v < 3\nIf Sat1.X == 7000\nv = v + 1\nEndIf\nEndWhile\n";
        let block = parse_script(text).unwrap();
        let StmtKind::While { body, .. } = &block[0].kind else {
            panic!("expected while");
        };
        assert!(matches!(body[0].kind, StmtKind::If { .. }));
    }

    #[test]
    fn penup_with_parentheses_is_a_grammar_violation() {
        let err = parse_script("PenUp Sat1(5)\n").unwrap_err();
        assert!(matches!(err, ScriptError::GrammarViolation(_)), "{err:?}");
    }

    #[test]
    fn create_with_no_names_is_missing_argument() {
        let err = parse_script("Create Spacecraft\n").unwrap_err();
        assert!(matches!(err, ScriptError::MissingArgument(_)), "{err:?}");
    }

    #[test]
    fn verbatim_block_preserved() {
        let text = "BeginScript\nanything at all (even) {this}\nEndScript\n";
        let block = parse_script(text).unwrap();
        let StmtKind::Verbatim { text } = &block[0].kind else {
            panic!("expected verbatim");
        };
        assert_eq!(text, "anything at all (even) {this}\n");
    }

    #[test]
    fn keyword_prefix_does_not_shadow_identifiers() {
        let block = parse_script("Iftest = 5\n").unwrap();
        assert!(matches!(block[0].kind, StmtKind::Assignment { .. }));
    }
}
