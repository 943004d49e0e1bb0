//! Boolean expression evaluator for loop and branch conditions
//!
//! Evaluates infix expressions such as `(1 = 1) and (2 gt 1)` with a single
//! left-to-right scan over two function-local stacks. There is no operator
//! precedence; grouping is entirely explicit through parentheses. All state
//! lives on the stack frames of [`evaluate`], so conditions may evaluate
//! concurrently from parallel branches.

use tracing::debug;

use crate::common::{EngineError, Result};

/// Relational and boolean operators known to the evaluator.
///
/// `lt`, `lt=`, `gt`, `gt=` exist alongside the symbolic aliases so that
/// expressions survive being embedded in markup that reserves `<` and `>`.
const OPERATORS: &[&str] = &["lt", "lt=", "gt", "gt=", "<", "<=", ">", ">="];

/// Operators producing or combining boolean results
const BOOLEAN_OPERATORS: &[&str] = &["=", "and", "or"];

/// Marker pushed for an opening parenthesis
const OPEN_MARKER: &str = "(";

/// A typed operand on the value stack.
///
/// The original stringly representation coerced anything that was not the
/// literal "true" to false inside `and`/`or`; keeping operands typed lets a
/// mismatch fail loudly instead.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Operand {
    Int(i64),
    Bool(bool),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Evaluate a boolean expression string to its boolean result.
///
/// Supported tokens: decimal digit runs, `true`/`false`, the operators
/// `lt`, `lt=`, `gt`, `gt=`, `<`, `<=`, `>`, `>=`, `=`, `and`, `or`, and
/// parentheses. Fails naming an unknown operator, and fails if the
/// expression does not reduce to exactly one boolean.
pub fn evaluate(expression: &str) -> Result<bool> {
    let mut operators: Vec<String> = Vec::new();
    let mut values: Vec<Operand> = Vec::new();

    let chars: Vec<char> = expression.chars().collect();
    let mut index = 0;

    while index < chars.len() {
        let current = chars[index];

        if current == '(' {
            operators.push(OPEN_MARKER.to_string());
            index += 1;
        } else if current == ' ' {
            index += 1;
        } else if current == ')' {
            reduce_subexpression(expression, &mut operators, &mut values)?;
            index += 1;
        } else if current.is_ascii_digit() {
            let digits = parse_digits(&chars, index);
            index += digits.len();
            let number: i64 = digits
                .parse()
                .map_err(|_| EngineError::expression(expression, format!("invalid number '{digits}'")))?;
            values.push(Operand::Int(number));
        } else {
            let token = parse_non_digits(&chars, index);
            index += token.len();
            match token.as_str() {
                "true" => values.push(Operand::Bool(true)),
                "false" => values.push(Operand::Bool(false)),
                _ => operators.push(validate_operator(expression, &token)?),
            }
        }
    }

    // Drain remaining operators the same way a closing parenthesis does
    while let Some(operator) = operators.pop() {
        if operator == OPEN_MARKER {
            return Err(EngineError::expression(expression, "unbalanced parentheses"));
        }
        apply_operator(expression, &operator, &mut values)?;
    }

    let result = match (values.pop(), values.is_empty()) {
        (Some(Operand::Bool(result)), true) => result,
        (Some(operand), true) => {
            return Err(EngineError::expression(
                expression,
                format!("expression evaluates to '{operand}', not a boolean"),
            ))
        }
        _ => {
            return Err(EngineError::expression(
                expression,
                "expression does not reduce to a single boolean",
            ))
        }
    };

    debug!(expression, result, "evaluated boolean expression");
    Ok(result)
}

/// Reduce operators down to the matching opening parenthesis.
fn reduce_subexpression(
    expression: &str,
    operators: &mut Vec<String>,
    values: &mut Vec<Operand>,
) -> Result<()> {
    loop {
        let operator = operators
            .pop()
            .ok_or_else(|| EngineError::expression(expression, "unbalanced parentheses"))?;
        if operator == OPEN_MARKER {
            return Ok(());
        }
        apply_operator(expression, &operator, values)?;
    }
}

/// Pop two operands, apply `operator`, push the result.
fn apply_operator(expression: &str, operator: &str, values: &mut Vec<Operand>) -> Result<()> {
    let right = pop_operand(expression, values)?;
    let left = pop_operand(expression, values)?;

    let result = match operator {
        "lt" | "<" => {
            let (l, r) = int_pair(expression, operator, left, right)?;
            Operand::Bool(l < r)
        }
        "lt=" | "<=" => {
            let (l, r) = int_pair(expression, operator, left, right)?;
            Operand::Bool(l <= r)
        }
        "gt" | ">" => {
            let (l, r) = int_pair(expression, operator, left, right)?;
            Operand::Bool(l > r)
        }
        "gt=" | ">=" => {
            let (l, r) = int_pair(expression, operator, left, right)?;
            Operand::Bool(l >= r)
        }
        "=" => match (left, right) {
            (Operand::Int(l), Operand::Int(r)) => Operand::Bool(l == r),
            (Operand::Bool(l), Operand::Bool(r)) => Operand::Bool(l == r),
            _ => {
                return Err(EngineError::expression(
                    expression,
                    format!("operator '=' cannot compare '{left}' with '{right}'"),
                ))
            }
        },
        "and" => {
            let (l, r) = bool_pair(expression, operator, left, right)?;
            Operand::Bool(l && r)
        }
        "or" => {
            let (l, r) = bool_pair(expression, operator, left, right)?;
            Operand::Bool(l || r)
        }
        _ => {
            return Err(EngineError::expression(
                expression,
                format!("unknown operator '{operator}'"),
            ))
        }
    };

    values.push(result);
    Ok(())
}

fn pop_operand(expression: &str, values: &mut Vec<Operand>) -> Result<Operand> {
    values.pop().ok_or_else(|| {
        EngineError::expression(expression, "incomplete expression, missing operand")
    })
}

fn int_pair(
    expression: &str,
    operator: &str,
    left: Operand,
    right: Operand,
) -> Result<(i64, i64)> {
    match (left, right) {
        (Operand::Int(l), Operand::Int(r)) => Ok((l, r)),
        _ => Err(EngineError::expression(
            expression,
            format!("operator '{operator}' requires integer operands, got '{left}' and '{right}'"),
        )),
    }
}

fn bool_pair(
    expression: &str,
    operator: &str,
    left: Operand,
    right: Operand,
) -> Result<(bool, bool)> {
    match (left, right) {
        (Operand::Bool(l), Operand::Bool(r)) => Ok((l, r)),
        _ => Err(EngineError::expression(
            expression,
            format!("operator '{operator}' requires boolean operands, got '{left}' and '{right}'"),
        )),
    }
}

/// Read a run of digit characters starting at `start`.
fn parse_digits(chars: &[char], start: usize) -> String {
    chars[start..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .collect()
}

/// Read a run of non-digit, non-separator characters starting at `start`.
fn parse_non_digits(chars: &[char], start: usize) -> String {
    chars[start..]
        .iter()
        .take_while(|c| !c.is_ascii_digit() && **c != ' ' && **c != '(' && **c != ')')
        .collect()
}

/// Check the operator is known, failing with its name otherwise.
fn validate_operator(expression: &str, operator: &str) -> Result<String> {
    if OPERATORS.contains(&operator) || BOOLEAN_OPERATORS.contains(&operator) {
        Ok(operator.to_string())
    } else {
        Err(EngineError::expression(
            expression,
            format!("unknown operator '{operator}'"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_comparisons() {
        assert!(evaluate("1 = 1").unwrap());
        assert!(!evaluate("1 = 2").unwrap());
        assert!(evaluate("1 lt 2").unwrap());
        assert!(!evaluate("2 lt= 1").unwrap());
        assert!(evaluate("2 gt 1").unwrap());
        assert!(evaluate("2 gt= 2").unwrap());
    }

    #[test]
    fn test_symbolic_aliases() {
        assert!(evaluate("1 < 2").unwrap());
        assert!(evaluate("2 <= 2").unwrap());
        assert!(evaluate("3 > 2").unwrap());
        assert!(evaluate("3 >= 3").unwrap());
    }

    #[test]
    fn test_boolean_literals() {
        assert!(evaluate("true").unwrap());
        assert!(!evaluate("false").unwrap());
        assert!(evaluate("(true) or (false)").unwrap());
    }

    #[test]
    fn test_combined_expressions() {
        assert!(evaluate("(1 = 1) and (2 gt 1)").unwrap());
        assert!(!evaluate("(1 = 2) and (2 gt 1)").unwrap());
        assert!(evaluate("(1 = 2) or (2 gt 1)").unwrap());
        assert!(evaluate("((1 lt 2) and (2 lt 3)) or (5 = 6)").unwrap());
    }

    #[test]
    fn test_no_spaces_around_operators() {
        assert!(evaluate("1=1").unwrap());
        assert!(evaluate("2gt1").unwrap());
        assert!(evaluate("(1=1)and(2gt=2)").unwrap());
    }

    #[test]
    fn test_unknown_operator_is_named() {
        let err = evaluate("1 zz 2").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unknown operator 'zz'"), "{message}");
        // The full expression stays in the message, not just the operator
        assert!(message.contains("'1 zz 2'"), "{message}");
    }

    #[test]
    fn test_incomplete_expression() {
        assert!(evaluate("1 =").is_err());
        assert!(evaluate("and").is_err());
    }

    #[test]
    fn test_non_boolean_result() {
        let err = evaluate("42").unwrap_err();
        assert!(err.to_string().contains("not a boolean"), "{err}");
    }

    #[test]
    fn test_multiple_leftover_values() {
        assert!(evaluate("1 2").is_err());
    }

    #[test]
    fn test_unbalanced_parentheses() {
        assert!(evaluate("(1 = 1").is_err());
        assert!(evaluate("1 = 1)").is_err());
    }

    #[test]
    fn test_type_mismatch() {
        assert!(evaluate("true and 1").is_err());
        assert!(evaluate("1 lt true").is_err());
        assert!(evaluate("true = 1").is_err());
    }

    #[tokio::test]
    async fn test_reentrant_from_concurrent_tasks() {
        let mut handles = Vec::new();
        for n in 0..16u32 {
            handles.push(tokio::spawn(async move {
                evaluate(&format!("({n} lt= {n}) and ({n} gt= {n})")).unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }
}
