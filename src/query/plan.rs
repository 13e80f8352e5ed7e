// Query planning
// Binds a parsed SELECT against a table schema: names become column indices,
// aggregate calls are pulled out, ORDER BY targets are resolved.

use super::expr::{AggregateCall, AggregateFunction, BinaryOp, ScalarExpr, ScalarFunction};
use super::parser::{affinity, object_name_to_string, SelectStatement};
use crate::error::{QueryError, Result};
use crate::storage::{DataType, Schema, Value};
use sqlparser::ast::{
    BinaryOperator, DuplicateTreatment, Expr, Function, FunctionArg, FunctionArgExpr,
    FunctionArguments, Ident, SelectItem, UnaryOperator, Value as SqlValue,
};

/// A SELECT ready to run
#[derive(Debug, Clone)]
pub struct SelectPlan {
    pub table_name: Option<String>,
    /// Result column names, one per projection expression
    pub output_names: Vec<String>,
    pub projection: Vec<ScalarExpr>,
    pub filter: Option<ScalarExpr>,
    pub group_by: Vec<ScalarExpr>,
    pub having: Option<ScalarExpr>,
    pub aggregates: Vec<AggregateCall>,
    pub order_by: Vec<SortKey>,
    pub distinct: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub target: SortTarget,
    pub descending: bool,
}

#[derive(Debug, Clone)]
pub enum SortTarget {
    /// Sort by an already projected output column
    Output(usize),
    /// Sort by an expression evaluated alongside the projection
    Expr(ScalarExpr),
}

impl SelectPlan {
    /// Whether rows are folded into groups before projection
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty() || !self.aggregates.is_empty()
    }

    /// Bind a parsed SELECT against the schema of its table.
    /// `schema` is None for a FROM-less SELECT.
    pub fn bind(stmt: &SelectStatement, schema: Option<&Schema>) -> Result<Self> {
        let empty = Schema::new(Vec::new());
        let schema = schema.unwrap_or(&empty);
        let mut binder = Binder::new(schema, stmt);

        let mut output_names = Vec::new();
        let mut projection = Vec::new();
        for item in &stmt.projection {
            match item {
                SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(_, _) => {
                    if schema.is_empty() {
                        return Err(QueryError::Parse("no tables specified".to_string()));
                    }
                    for (idx, column) in schema.columns.iter().enumerate() {
                        output_names.push(column.name.clone());
                        projection.push(ScalarExpr::Column(idx));
                    }
                }
                SelectItem::UnnamedExpr(expr) => {
                    output_names.push(output_name(expr));
                    projection.push(binder.bind(expr, true)?);
                }
                SelectItem::ExprWithAlias { expr, alias } => {
                    output_names.push(alias.value.clone());
                    projection.push(binder.bind(expr, true)?);
                }
            }
        }

        let filter = match &stmt.selection {
            Some(expr) => Some(binder.bind(expr, false)?),
            None => None,
        };

        // GROUP BY may name an output alias when no column has that name
        binder.resolve_aliases = true;
        let group_by = stmt
            .group_by
            .iter()
            .map(|expr| binder.bind(expr, false))
            .collect::<Result<Vec<_>>>()?;

        let having = match &stmt.having {
            Some(expr) => Some(binder.bind(expr, true)?),
            None => None,
        };

        let mut order_by = Vec::new();
        for order in &stmt.order_by {
            let target = match Self::output_target(&order.expr, &output_names)? {
                Some(idx) => SortTarget::Output(idx),
                None => SortTarget::Expr(binder.bind(&order.expr, true)?),
            };
            order_by.push(SortKey {
                target,
                descending: order.asc == Some(false),
            });
        }

        Ok(Self {
            table_name: stmt.table_name.clone(),
            output_names,
            projection,
            filter,
            group_by,
            having,
            aggregates: binder.aggregates,
            order_by,
            distinct: stmt.distinct,
            limit: stmt.limit,
            offset: stmt.offset,
        })
    }

    /// ORDER BY 2 or ORDER BY alias refers to an output column
    fn output_target(expr: &Expr, output_names: &[String]) -> Result<Option<usize>> {
        match expr {
            Expr::Value(SqlValue::Number(n, _)) => {
                let position: usize = n
                    .parse()
                    .map_err(|_| QueryError::Parse(format!("invalid ORDER BY term: {}", n)))?;
                if position == 0 || position > output_names.len() {
                    return Err(QueryError::Parse(format!(
                        "ORDER BY term out of range: {}",
                        position
                    )));
                }
                Ok(Some(position - 1))
            }
            Expr::Identifier(ident) => Ok(output_names
                .iter()
                .position(|name| name.eq_ignore_ascii_case(&ident.value))),
            _ => Ok(None),
        }
    }
}

/// Result column name for an unaliased expression
fn output_name(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(idents) => idents
            .last()
            .map(|i| i.value.clone())
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

/// Resolves names and collects aggregate calls while converting AST expressions
struct Binder<'a> {
    schema: &'a Schema,
    stmt: &'a SelectStatement,
    aggregates: Vec<AggregateCall>,
    /// Allow identifiers to fall back to SELECT aliases
    resolve_aliases: bool,
    /// Set while binding an aggregate's argument
    in_aggregate: bool,
}

impl<'a> Binder<'a> {
    fn new(schema: &'a Schema, stmt: &'a SelectStatement) -> Self {
        Self {
            schema,
            stmt,
            aggregates: Vec::new(),
            resolve_aliases: false,
            in_aggregate: false,
        }
    }

    fn bind(&mut self, expr: &Expr, allow_aggregates: bool) -> Result<ScalarExpr> {
        let bound = match expr {
            Expr::Identifier(ident) => self.bind_identifier(ident, allow_aggregates)?,
            Expr::CompoundIdentifier(idents) => self.bind_compound(idents)?,
            Expr::Value(value) => ScalarExpr::Literal(literal(value)?),
            Expr::Nested(inner) => self.bind(inner, allow_aggregates)?,
            Expr::UnaryOp { op, expr } => {
                let inner = Box::new(self.bind(expr, allow_aggregates)?);
                match op {
                    UnaryOperator::Minus => ScalarExpr::Negate(inner),
                    UnaryOperator::Plus => *inner,
                    UnaryOperator::Not => ScalarExpr::Not(inner),
                    other => return Err(QueryError::Unsupported(format!("operator {}", other))),
                }
            }
            Expr::BinaryOp { left, op, right } => ScalarExpr::Binary {
                left: Box::new(self.bind(left, allow_aggregates)?),
                op: binary_op(op)?,
                right: Box::new(self.bind(right, allow_aggregates)?),
            },
            Expr::IsNull(inner) => ScalarExpr::IsNull {
                expr: Box::new(self.bind(inner, allow_aggregates)?),
                negated: false,
            },
            Expr::IsNotNull(inner) => ScalarExpr::IsNull {
                expr: Box::new(self.bind(inner, allow_aggregates)?),
                negated: true,
            },
            Expr::Like {
                negated,
                expr,
                pattern,
                ..
            }
            | Expr::ILike {
                negated,
                expr,
                pattern,
                ..
            } => ScalarExpr::Like {
                expr: Box::new(self.bind(expr, allow_aggregates)?),
                pattern: Box::new(self.bind(pattern, allow_aggregates)?),
                negated: *negated,
            },
            Expr::Between {
                expr,
                negated,
                low,
                high,
                ..
            } => ScalarExpr::Between {
                expr: Box::new(self.bind(expr, allow_aggregates)?),
                low: Box::new(self.bind(low, allow_aggregates)?),
                high: Box::new(self.bind(high, allow_aggregates)?),
                negated: *negated,
            },
            Expr::InList {
                expr,
                list,
                negated,
                ..
            } => ScalarExpr::InList {
                expr: Box::new(self.bind(expr, allow_aggregates)?),
                list: list
                    .iter()
                    .map(|item| self.bind(item, allow_aggregates))
                    .collect::<Result<Vec<_>>>()?,
                negated: *negated,
            },
            Expr::Cast {
                expr, data_type, ..
            } => ScalarExpr::Cast {
                expr: Box::new(self.bind(expr, allow_aggregates)?),
                to: cast_target(data_type)?,
            },
            Expr::Function(func) => self.bind_function(func, allow_aggregates)?,
            other => {
                return Err(QueryError::Unsupported(format!("expression: {}", other)));
            }
        };
        Ok(bound)
    }

    fn bind_identifier(&mut self, ident: &Ident, allow_aggregates: bool) -> Result<ScalarExpr> {
        if let Some(idx) = self.schema.get_column_index(&ident.value) {
            return Ok(ScalarExpr::Column(idx));
        }

        if self.resolve_aliases {
            let aliased = self.stmt.projection.iter().find_map(|item| match item {
                SelectItem::ExprWithAlias { expr, alias }
                    if alias.value.eq_ignore_ascii_case(&ident.value) =>
                {
                    Some(expr.clone())
                }
                _ => None,
            });
            if let Some(expr) = aliased {
                // An alias never refers back to itself
                self.resolve_aliases = false;
                let bound = self.bind(&expr, allow_aggregates);
                self.resolve_aliases = true;
                return bound;
            }
        }

        Err(QueryError::UnknownColumn(ident.value.clone()))
    }

    /// `data.col` or `alias.col`
    fn bind_compound(&mut self, idents: &[Ident]) -> Result<ScalarExpr> {
        let (column, qualifier) = match idents {
            [qualifier @ .., column] if !qualifier.is_empty() => (column, qualifier),
            _ => {
                return Err(QueryError::Parse(format!(
                    "invalid column reference: {:?}",
                    idents
                )))
            }
        };

        let qualifier = qualifier
            .iter()
            .map(|i| i.value.clone())
            .collect::<Vec<_>>()
            .join(".");
        let known = [self.stmt.table_name.as_deref(), self.stmt.table_alias.as_deref()];
        if !known
            .iter()
            .flatten()
            .any(|name| name.eq_ignore_ascii_case(&qualifier))
        {
            return Err(QueryError::UnknownTable(qualifier));
        }

        self.schema
            .get_column_index(&column.value)
            .map(ScalarExpr::Column)
            .ok_or_else(|| QueryError::UnknownColumn(format!("{}.{}", qualifier, column.value)))
    }

    fn bind_function(&mut self, func: &Function, allow_aggregates: bool) -> Result<ScalarExpr> {
        let name = object_name_to_string(&func.name);
        if func.over.is_some() {
            return Err(QueryError::Unsupported(format!("window function {}", name)));
        }

        let (args, distinct) = match &func.args {
            FunctionArguments::None => (Vec::new(), false),
            FunctionArguments::List(list) => (
                list.args.iter().collect::<Vec<_>>(),
                matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct)),
            ),
            FunctionArguments::Subquery(_) => {
                return Err(QueryError::Unsupported("subqueries".to_string()))
            }
        };

        if let Some(aggregate) = AggregateFunction::from_name(&name) {
            if !allow_aggregates {
                return Err(QueryError::Parse(format!(
                    "misuse of aggregate function {}()",
                    name
                )));
            }
            if self.in_aggregate {
                return Err(QueryError::Parse(format!(
                    "aggregate function {}() cannot be nested",
                    name
                )));
            }
            return self.bind_aggregate(aggregate, &name, &args, distinct);
        }

        let scalar = ScalarFunction::from_name(&name)
            .ok_or_else(|| QueryError::Unsupported(format!("function {}()", name)))?;
        let (min, max) = scalar.arity();
        if args.len() < min || args.len() > max {
            return Err(QueryError::Parse(format!(
                "wrong number of arguments to function {}()",
                name
            )));
        }

        let mut bound = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => {
                    bound.push(self.bind(expr, allow_aggregates)?)
                }
                other => {
                    return Err(QueryError::Unsupported(format!(
                        "argument {} to {}()",
                        other, name
                    )))
                }
            }
        }

        Ok(ScalarExpr::Function {
            func: scalar,
            args: bound,
        })
    }

    fn bind_aggregate(
        &mut self,
        func: AggregateFunction,
        name: &str,
        args: &[&FunctionArg],
        distinct: bool,
    ) -> Result<ScalarExpr> {
        let call = match args {
            [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)] if func == AggregateFunction::Count => {
                AggregateCall {
                    func: AggregateFunction::CountStar,
                    arg: None,
                    distinct: false,
                }
            }
            [FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))] => {
                self.in_aggregate = true;
                let arg = self.bind(expr, true);
                self.in_aggregate = false;
                AggregateCall {
                    func,
                    arg: Some(arg?),
                    distinct,
                }
            }
            _ => {
                return Err(QueryError::Parse(format!(
                    "wrong number of arguments to function {}()",
                    name
                )))
            }
        };

        // Identical calls share one slot
        let idx = match self.aggregates.iter().position(|existing| *existing == call) {
            Some(idx) => idx,
            None => {
                self.aggregates.push(call);
                self.aggregates.len() - 1
            }
        };
        Ok(ScalarExpr::Aggregate(idx))
    }
}

fn literal(value: &SqlValue) -> Result<Value> {
    match value {
        SqlValue::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Value::Integer(i))
            } else {
                n.parse::<f64>()
                    .map(Value::Real)
                    .map_err(|_| QueryError::Parse(format!("invalid number: {}", n)))
            }
        }
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => {
            Ok(Value::Text(s.clone()))
        }
        SqlValue::Boolean(b) => Ok(Value::Boolean(*b)),
        SqlValue::Null => Ok(Value::Null),
        other => Err(QueryError::Unsupported(format!("literal {}", other))),
    }
}

fn binary_op(op: &BinaryOperator) -> Result<BinaryOp> {
    Ok(match op {
        BinaryOperator::Plus => BinaryOp::Add,
        BinaryOperator::Minus => BinaryOp::Sub,
        BinaryOperator::Multiply => BinaryOp::Mul,
        BinaryOperator::Divide => BinaryOp::Div,
        BinaryOperator::Modulo => BinaryOp::Mod,
        BinaryOperator::Eq => BinaryOp::Eq,
        BinaryOperator::NotEq => BinaryOp::NotEq,
        BinaryOperator::Lt => BinaryOp::Lt,
        BinaryOperator::LtEq => BinaryOp::LtEq,
        BinaryOperator::Gt => BinaryOp::Gt,
        BinaryOperator::GtEq => BinaryOp::GtEq,
        BinaryOperator::And => BinaryOp::And,
        BinaryOperator::Or => BinaryOp::Or,
        BinaryOperator::StringConcat => BinaryOp::Concat,
        other => return Err(QueryError::Unsupported(format!("operator {}", other))),
    })
}

fn cast_target(data_type: &sqlparser::ast::DataType) -> Result<DataType> {
    affinity(data_type).ok_or_else(|| QueryError::Unsupported(format!("CAST to {}", data_type)))
}
