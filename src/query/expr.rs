// Bound expressions
// Column references are resolved to indices, so evaluation never looks names up.

use crate::error::{QueryError, Result};
use crate::storage::{DataType, GroupKey, Row, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

/// An expression resolved against a table schema
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarExpr {
    /// Value of the column at this index in the current row
    Column(usize),
    Literal(Value),
    Negate(Box<ScalarExpr>),
    Not(Box<ScalarExpr>),
    Binary {
        left: Box<ScalarExpr>,
        op: BinaryOp,
        right: Box<ScalarExpr>,
    },
    IsNull {
        expr: Box<ScalarExpr>,
        negated: bool,
    },
    Like {
        expr: Box<ScalarExpr>,
        pattern: Box<ScalarExpr>,
        negated: bool,
    },
    Between {
        expr: Box<ScalarExpr>,
        low: Box<ScalarExpr>,
        high: Box<ScalarExpr>,
        negated: bool,
    },
    InList {
        expr: Box<ScalarExpr>,
        list: Vec<ScalarExpr>,
        negated: bool,
    },
    Cast {
        expr: Box<ScalarExpr>,
        to: DataType,
    },
    Function {
        func: ScalarFunction,
        args: Vec<ScalarExpr>,
    },
    /// Result of the aggregate call at this index in the plan
    Aggregate(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunction {
    Abs,
    Round,
    Upper,
    Lower,
    Length,
    Trim,
    Coalesce,
}

impl ScalarFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "ABS" => Some(Self::Abs),
            "ROUND" => Some(Self::Round),
            "UPPER" => Some(Self::Upper),
            "LOWER" => Some(Self::Lower),
            "LENGTH" | "LEN" | "CHAR_LENGTH" => Some(Self::Length),
            "TRIM" => Some(Self::Trim),
            "COALESCE" | "IFNULL" => Some(Self::Coalesce),
            _ => None,
        }
    }

    /// Accepted argument counts, inclusive
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Self::Round => (1, 2),
            Self::Coalesce => (1, usize::MAX),
            _ => (1, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    CountStar,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "COUNT" => Some(Self::Count),
            "SUM" => Some(Self::Sum),
            "AVG" => Some(Self::Avg),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            _ => None,
        }
    }
}

/// One aggregate call appearing in a SELECT, HAVING or ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub func: AggregateFunction,
    /// None only for COUNT(*)
    pub arg: Option<ScalarExpr>,
    pub distinct: bool,
}

impl AggregateCall {
    /// Fold the aggregate over the rows of one group
    pub fn evaluate(&self, rows: &[&Row]) -> Result<Value> {
        let arg = match (&self.func, &self.arg) {
            (AggregateFunction::CountStar, _) => return Ok(Value::Integer(rows.len() as i64)),
            (_, Some(arg)) => arg,
            (func, None) => {
                return Err(QueryError::Parse(format!("{:?} requires an argument", func)))
            }
        };

        let mut seen = HashSet::new();
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            let value = arg.eval(&row.values, &[])?;
            if value.is_null() {
                continue;
            }
            if self.distinct && !seen.insert(value.group_key()) {
                continue;
            }
            values.push(value);
        }

        Ok(match self.func {
            AggregateFunction::CountStar | AggregateFunction::Count => {
                Value::Integer(values.len() as i64)
            }
            AggregateFunction::Sum => sum(&values),
            AggregateFunction::Avg => {
                if values.is_empty() {
                    Value::Null
                } else {
                    let total: f64 = values.iter().filter_map(Value::coerce_f64).sum();
                    Value::Real(total / values.len() as f64)
                }
            }
            AggregateFunction::Min => values
                .into_iter()
                .min_by(|a, b| a.sort_cmp(b))
                .unwrap_or(Value::Null),
            AggregateFunction::Max => values
                .into_iter()
                .max_by(|a, b| a.sort_cmp(b))
                .unwrap_or(Value::Null),
        })
    }
}

/// SUM keeps integer results while every input is an integer and nothing overflows
fn sum(values: &[Value]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }

    let mut int_total: Option<i64> = Some(0);
    let mut real_total = 0.0;
    for value in values {
        int_total = match (int_total, value) {
            (Some(acc), Value::Integer(i)) => acc.checked_add(*i),
            _ => None,
        };
        real_total += value.coerce_f64().unwrap_or(0.0);
    }

    match int_total {
        Some(total) => Value::Integer(total),
        None => Value::Real(real_total),
    }
}

impl ScalarExpr {
    /// Evaluate against one row. `aggregates` holds the already-computed
    /// aggregate results for the row's group (empty outside GROUP BY).
    pub fn eval(&self, row: &[Value], aggregates: &[Value]) -> Result<Value> {
        match self {
            ScalarExpr::Column(idx) => Ok(row.get(*idx).cloned().unwrap_or(Value::Null)),
            ScalarExpr::Literal(value) => Ok(value.clone()),
            ScalarExpr::Aggregate(idx) => aggregates
                .get(*idx)
                .cloned()
                .ok_or_else(|| QueryError::Parse("misuse of aggregate function".to_string())),
            ScalarExpr::Negate(expr) => match expr.eval(row, aggregates)? {
                Value::Null => Ok(Value::Null),
                Value::Integer(i) => Ok(i
                    .checked_neg()
                    .map(Value::Integer)
                    .unwrap_or(Value::Real(-(i as f64)))),
                other => Ok(Value::Real(-other.coerce_f64().unwrap_or(0.0))),
            },
            ScalarExpr::Not(expr) => Ok(match expr.eval(row, aggregates)?.truthy() {
                Some(b) => Value::Boolean(!b),
                None => Value::Null,
            }),
            ScalarExpr::Binary { left, op, right } => {
                let l = left.eval(row, aggregates)?;
                // AND / OR short-circuit on a decided left side
                match (op, l.truthy()) {
                    (BinaryOp::And, Some(false)) => return Ok(Value::Boolean(false)),
                    (BinaryOp::Or, Some(true)) => return Ok(Value::Boolean(true)),
                    _ => {}
                }
                let r = right.eval(row, aggregates)?;
                eval_binary(*op, l, r)
            }
            ScalarExpr::IsNull { expr, negated } => {
                let is_null = expr.eval(row, aggregates)?.is_null();
                Ok(Value::Boolean(is_null != *negated))
            }
            ScalarExpr::Like {
                expr,
                pattern,
                negated,
            } => {
                let value = expr.eval(row, aggregates)?;
                let pattern = pattern.eval(row, aggregates)?;
                if value.is_null() || pattern.is_null() {
                    return Ok(Value::Null);
                }
                let matched = like_match(&value.to_string(), &pattern.to_string());
                Ok(Value::Boolean(matched != *negated))
            }
            ScalarExpr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = expr.eval(row, aggregates)?;
                let above = eval_binary(BinaryOp::GtEq, value.clone(), low.eval(row, aggregates)?)?;
                let below = eval_binary(BinaryOp::LtEq, value, high.eval(row, aggregates)?)?;
                let within = eval_binary(BinaryOp::And, above, below)?;
                if *negated {
                    ScalarExpr::Not(Box::new(ScalarExpr::Literal(within))).eval(row, aggregates)
                } else {
                    Ok(within)
                }
            }
            ScalarExpr::InList {
                expr,
                list,
                negated,
            } => {
                let value = expr.eval(row, aggregates)?;
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for item in list {
                    let candidate = item.eval(row, aggregates)?;
                    if candidate.is_null() {
                        saw_null = true;
                    } else if compare_values(&value, &candidate) == Ordering::Equal {
                        return Ok(Value::Boolean(!*negated));
                    }
                }
                Ok(if saw_null {
                    Value::Null
                } else {
                    Value::Boolean(*negated)
                })
            }
            ScalarExpr::Cast { expr, to } => Ok(cast(expr.eval(row, aggregates)?, *to)),
            ScalarExpr::Function { func, args } => {
                let args = args
                    .iter()
                    .map(|arg| arg.eval(row, aggregates))
                    .collect::<Result<Vec<_>>>()?;
                eval_function(*func, args)
            }
        }
    }

    /// True when the expression contains an aggregate reference
    pub fn has_aggregate(&self) -> bool {
        match self {
            ScalarExpr::Aggregate(_) => true,
            ScalarExpr::Column(_) | ScalarExpr::Literal(_) => false,
            ScalarExpr::Negate(e) | ScalarExpr::Not(e) => e.has_aggregate(),
            ScalarExpr::IsNull { expr, .. } | ScalarExpr::Cast { expr, .. } => expr.has_aggregate(),
            ScalarExpr::Binary { left, right, .. } => left.has_aggregate() || right.has_aggregate(),
            ScalarExpr::Like { expr, pattern, .. } => expr.has_aggregate() || pattern.has_aggregate(),
            ScalarExpr::Between {
                expr, low, high, ..
            } => expr.has_aggregate() || low.has_aggregate() || high.has_aggregate(),
            ScalarExpr::InList { expr, list, .. } => {
                expr.has_aggregate() || list.iter().any(ScalarExpr::has_aggregate)
            }
            ScalarExpr::Function { args, .. } => args.iter().any(ScalarExpr::has_aggregate),
        }
    }
}

/// Ordering used for equality and comparison operators.
/// Values of different kinds order as NULL < number < text.
fn compare_values(left: &Value, right: &Value) -> Ordering {
    left.compare(right).unwrap_or_else(|| left.sort_cmp(right))
}

fn eval_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    match op {
        BinaryOp::And => Ok(match (l.truthy(), r.truthy()) {
            (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
            (Some(true), Some(true)) => Value::Boolean(true),
            _ => Value::Null,
        }),
        BinaryOp::Or => Ok(match (l.truthy(), r.truthy()) {
            (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
            (Some(false), Some(false)) => Value::Boolean(false),
            _ => Value::Null,
        }),
        _ if l.is_null() || r.is_null() => Ok(Value::Null),
        BinaryOp::Eq => Ok(Value::Boolean(compare_values(&l, &r) == Ordering::Equal)),
        BinaryOp::NotEq => Ok(Value::Boolean(compare_values(&l, &r) != Ordering::Equal)),
        BinaryOp::Lt => Ok(Value::Boolean(compare_values(&l, &r) == Ordering::Less)),
        BinaryOp::LtEq => Ok(Value::Boolean(compare_values(&l, &r) != Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Boolean(compare_values(&l, &r) == Ordering::Greater)),
        BinaryOp::GtEq => Ok(Value::Boolean(compare_values(&l, &r) != Ordering::Less)),
        BinaryOp::Concat => Ok(Value::Text(format!("{}{}", l, r))),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            eval_arithmetic(op, &l, &r)
        }
    }
}

fn eval_arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    if let (Value::Integer(a), Value::Integer(b)) = (l, r) {
        let (a, b) = (*a, *b);
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            // Integer division and modulo by zero yield NULL
            BinaryOp::Div if b == 0 => return Ok(Value::Null),
            BinaryOp::Mod if b == 0 => return Ok(Value::Null),
            BinaryOp::Div => a.checked_div(b),
            BinaryOp::Mod => a.checked_rem(b),
            _ => None,
        };
        if let Some(result) = exact {
            return Ok(Value::Integer(result));
        }
    }

    let (a, b) = match (l.coerce_f64(), r.coerce_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Ok(Value::Null),
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b == 0.0 => return Ok(Value::Null),
        BinaryOp::Mod if b == 0.0 => return Ok(Value::Null),
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        other => {
            return Err(QueryError::Type(format!(
                "{:?} is not an arithmetic operator",
                other
            )))
        }
    };
    Ok(Value::Real(result))
}

fn cast(value: Value, to: DataType) -> Value {
    match (value, to) {
        (Value::Null, _) => Value::Null,
        (Value::Text(s), DataType::Integer) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Integer(s.trim().parse::<f64>().unwrap_or(0.0) as i64)),
        (v, DataType::Integer) => Value::Integer(v.as_f64().unwrap_or(0.0) as i64),
        (v, DataType::Real) => Value::Real(v.coerce_f64().unwrap_or(0.0)),
        (v, DataType::Text) => Value::Text(v.to_string()),
        (v, DataType::Boolean) => v.truthy().map(Value::Boolean).unwrap_or(Value::Null),
    }
}

fn eval_function(func: ScalarFunction, args: Vec<Value>) -> Result<Value> {
    if func == ScalarFunction::Coalesce {
        return Ok(args
            .into_iter()
            .find(|v| !v.is_null())
            .unwrap_or(Value::Null));
    }

    let mut args = args.into_iter();
    let first = args.next().unwrap_or(Value::Null);
    if first.is_null() {
        return Ok(Value::Null);
    }

    Ok(match func {
        ScalarFunction::Abs => match first {
            Value::Integer(i) => Value::Integer(i.saturating_abs()),
            other => Value::Real(other.coerce_f64().unwrap_or(0.0).abs()),
        },
        ScalarFunction::Round => {
            let digits = args
                .next()
                .and_then(|d| d.coerce_f64())
                .unwrap_or(0.0)
                .max(0.0) as i32;
            let factor = 10f64.powi(digits);
            let n = first.coerce_f64().unwrap_or(0.0);
            Value::Real((n * factor).round() / factor)
        }
        ScalarFunction::Upper => Value::Text(first.to_string().to_uppercase()),
        ScalarFunction::Lower => Value::Text(first.to_string().to_lowercase()),
        ScalarFunction::Length => Value::Integer(first.to_string().chars().count() as i64),
        ScalarFunction::Trim => Value::Text(first.to_string().trim().to_string()),
        ScalarFunction::Coalesce => first,
    })
}

/// SQL LIKE: `%` matches any run, `_` one character. Case-insensitive.
pub fn like_match(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    // Classic two-pointer wildcard match with backtracking to the last '%'
    let (mut v, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while v < value.len() {
        if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, v));
            p += 1;
        } else if p < pattern.len() && (pattern[p] == '_' || pattern[p] == value[v]) {
            v += 1;
            p += 1;
        } else if let Some((star_p, star_v)) = star {
            p = star_p + 1;
            v = star_v + 1;
            star = Some((star_p, star_v + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

/// Group key of a row under a list of expressions
pub fn group_key(exprs: &[ScalarExpr], row: &[Value]) -> Result<Vec<GroupKey>> {
    exprs
        .iter()
        .map(|e| e.eval(row, &[]).map(|v| v.group_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(v: Value) -> Box<ScalarExpr> {
        Box::new(ScalarExpr::Literal(v))
    }

    #[test]
    fn test_like_patterns() {
        assert!(like_match("Seoul", "s%"));
        assert!(like_match("Seoul", "%OUL"));
        assert!(like_match("abc", "a_c"));
        assert!(like_match("", "%"));
        assert!(!like_match("abc", "a_"));
        assert!(like_match("a%b", "a%%b"));
        assert!(like_match("mississippi", "%sip%"));
    }

    #[test]
    fn test_three_valued_logic() {
        let and = ScalarExpr::Binary {
            left: lit(Value::Null),
            op: BinaryOp::And,
            right: lit(Value::Boolean(false)),
        };
        assert_eq!(and.eval(&[], &[]).unwrap(), Value::Boolean(false));

        let or = ScalarExpr::Binary {
            left: lit(Value::Null),
            op: BinaryOp::Or,
            right: lit(Value::Boolean(false)),
        };
        assert_eq!(or.eval(&[], &[]).unwrap(), Value::Null);

        let eq = ScalarExpr::Binary {
            left: lit(Value::Null),
            op: BinaryOp::Eq,
            right: lit(Value::Null),
        };
        assert_eq!(eq.eval(&[], &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_integer_arithmetic_and_division_by_zero() {
        let div = |a, b| {
            ScalarExpr::Binary {
                left: lit(Value::Integer(a)),
                op: BinaryOp::Div,
                right: lit(Value::Integer(b)),
            }
            .eval(&[], &[])
            .unwrap()
        };
        assert_eq!(div(7, 2), Value::Integer(3));
        assert_eq!(div(7, 0), Value::Null);

        let mixed = ScalarExpr::Binary {
            left: lit(Value::Real(1.5)),
            op: BinaryOp::Add,
            right: lit(Value::Integer(2)),
        };
        assert_eq!(mixed.eval(&[], &[]).unwrap(), Value::Real(3.5));
    }

    #[test]
    fn test_numbers_compare_across_integer_and_real() {
        let eq = ScalarExpr::Binary {
            left: Box::new(ScalarExpr::Column(0)),
            op: BinaryOp::Eq,
            right: lit(Value::Integer(25)),
        };
        assert_eq!(eq.eval(&[Value::Real(25.0)], &[]).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_aggregates_skip_nulls() {
        let rows = vec![
            Row::new(vec![Value::Real(1.0)]),
            Row::new(vec![Value::Null]),
            Row::new(vec![Value::Real(3.0)]),
            Row::new(vec![Value::Real(3.0)]),
        ];
        let refs: Vec<&Row> = rows.iter().collect();
        let call = |func, distinct| AggregateCall {
            func,
            arg: Some(ScalarExpr::Column(0)),
            distinct,
        };

        assert_eq!(
            call(AggregateFunction::Count, false).evaluate(&refs).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            call(AggregateFunction::Count, true).evaluate(&refs).unwrap(),
            Value::Integer(2)
        );
        assert_eq!(
            call(AggregateFunction::Sum, false).evaluate(&refs).unwrap(),
            Value::Real(7.0)
        );
        assert_eq!(
            call(AggregateFunction::Max, false).evaluate(&refs).unwrap(),
            Value::Real(3.0)
        );
        let star = AggregateCall {
            func: AggregateFunction::CountStar,
            arg: None,
            distinct: false,
        };
        assert_eq!(star.evaluate(&refs).unwrap(), Value::Integer(4));
        assert_eq!(
            call(AggregateFunction::Avg, false).evaluate(&[]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_round_and_coalesce() {
        let round = ScalarExpr::Function {
            func: ScalarFunction::Round,
            args: vec![
                ScalarExpr::Literal(Value::Real(2.345)),
                ScalarExpr::Literal(Value::Integer(1)),
            ],
        };
        assert_eq!(round.eval(&[], &[]).unwrap(), Value::Real(2.3));

        let coalesce = ScalarExpr::Function {
            func: ScalarFunction::Coalesce,
            args: vec![
                ScalarExpr::Literal(Value::Null),
                ScalarExpr::Literal(Value::Text("x".into())),
            ],
        };
        assert_eq!(coalesce.eval(&[], &[]).unwrap(), Value::Text("x".into()));
    }
}
