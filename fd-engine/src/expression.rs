use std::{cmp::Ordering, collections::HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::{error::EvaluationError, evaluator::EvalContext};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Expression {
    Literal {
        value: Value,
    },
    Field {
        id: String,
    },
    /// Field of the same replicated row as the element being evaluated.
    Sibling {
        id: String,
    },
    Visible {
        id: String,
    },
    Not {
        operand: Box<Expression>,
    },
    And {
        operands: Vec<Expression>,
    },
    Or {
        operands: Vec<Expression>,
    },
    Eq {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Ne {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Lt {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Le {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Gt {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Ge {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Empty {
        operand: Box<Expression>,
    },
    Contains {
        collection: Box<Expression>,
        item: Box<Expression>,
    },
    Matches {
        operand: Box<Expression>,
        pattern: String,
    },
    Add {
        operands: Vec<Expression>,
    },
    Sub {
        operands: Vec<Expression>,
    },
    Mul {
        operands: Vec<Expression>,
    },
    Div {
        operands: Vec<Expression>,
    },
    Concat {
        operands: Vec<Expression>,
    },
    Length {
        operand: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        then: Box<Expression>,
        #[serde(default, rename = "else", skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<Expression>>,
    },
    List {
        items: Vec<Expression>,
    },
    Coalesce {
        operands: Vec<Expression>,
    },
}

impl Expression {
    pub fn literal(value: Value) -> Self {
        Expression::Literal { value }
    }

    pub fn field(id: impl Into<String>) -> Self {
        Expression::Field { id: id.into() }
    }

    pub fn sibling(id: impl Into<String>) -> Self {
        Expression::Sibling { id: id.into() }
    }

    pub fn visible(id: impl Into<String>) -> Self {
        Expression::Visible { id: id.into() }
    }

    pub fn not(operand: Expression) -> Self {
        Expression::Not {
            operand: Box::new(operand),
        }
    }

    pub fn eq(left: Expression, right: Expression) -> Self {
        Expression::Eq {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn gt(left: Expression, right: Expression) -> Self {
        Expression::Gt {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn empty(operand: Expression) -> Self {
        Expression::Empty {
            operand: Box::new(operand),
        }
    }
}

#[derive(Clone, Copy)]
enum Arithmetic {
    Add,
    Sub,
    Mul,
    Div,
}

impl Arithmetic {
    fn name(self) -> &'static str {
        match self {
            Arithmetic::Add => "add",
            Arithmetic::Sub => "sub",
            Arithmetic::Mul => "mul",
            Arithmetic::Div => "div",
        }
    }
}

#[derive(Default)]
pub struct ExpressionEvaluator {
    patterns: HashMap<String, Regex>,
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(
        &mut self,
        expression: &Expression,
        context: &EvalContext<'_>,
    ) -> Result<Value, EvaluationError> {
        match expression {
            Expression::Literal { value } => Ok(value.clone()),
            Expression::Field { id } => Ok(context.value(id).cloned().unwrap_or(Value::Null)),
            Expression::Sibling { id } => Ok(context
                .value(&context.sibling_id(id))
                .cloned()
                .unwrap_or(Value::Null)),
            Expression::Visible { id } => Ok(Value::Bool(context.is_visible(id))),
            Expression::Not { operand } => {
                let value = self.evaluate(operand, context)?;
                Ok(Value::Bool(!truthy(&value)))
            }
            Expression::And { operands } => {
                for operand in operands {
                    if !truthy(&self.evaluate(operand, context)?) {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Expression::Or { operands } => {
                for operand in operands {
                    if truthy(&self.evaluate(operand, context)?) {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Expression::Eq { left, right } => {
                let (left, right) = self.evaluate_pair(left, right, context)?;
                Ok(Value::Bool(json_equals(&left, &right)))
            }
            Expression::Ne { left, right } => {
                let (left, right) = self.evaluate_pair(left, right, context)?;
                Ok(Value::Bool(!json_equals(&left, &right)))
            }
            Expression::Lt { left, right } => {
                self.compare(left, right, context, |order| order == Ordering::Less)
            }
            Expression::Le { left, right } => {
                self.compare(left, right, context, |order| order != Ordering::Greater)
            }
            Expression::Gt { left, right } => {
                self.compare(left, right, context, |order| order == Ordering::Greater)
            }
            Expression::Ge { left, right } => {
                self.compare(left, right, context, |order| order != Ordering::Less)
            }
            Expression::Empty { operand } => {
                let value = self.evaluate(operand, context)?;
                Ok(Value::Bool(is_blank(&value)))
            }
            Expression::Contains { collection, item } => {
                let (collection, item) = self.evaluate_pair(collection, item, context)?;
                let found = match (&collection, &item) {
                    (Value::Null, _) => false,
                    (Value::Array(values), item) => {
                        values.iter().any(|value| json_equals(value, item))
                    }
                    (Value::String(text), Value::String(needle)) => text.contains(needle.as_str()),
                    (Value::Object(map), Value::String(key)) => map.contains_key(key),
                    _ => {
                        return Err(EvaluationError::Expression(format!(
                            "contains is not defined for {} and {}",
                            value_kind(&collection),
                            value_kind(&item)
                        )));
                    }
                };
                Ok(Value::Bool(found))
            }
            Expression::Matches { operand, pattern } => {
                let value = self.evaluate(operand, context)?;
                let text = match &value {
                    Value::Null => return Ok(Value::Bool(false)),
                    Value::String(text) => text.as_str(),
                    other => {
                        return Err(EvaluationError::Expression(format!(
                            "matches expects a string, got {}",
                            value_kind(other)
                        )));
                    }
                };
                let regex = self.pattern(pattern)?;
                Ok(Value::Bool(regex.is_match(text)))
            }
            Expression::Add { operands } => self.arithmetic(Arithmetic::Add, operands, context),
            Expression::Sub { operands } => self.arithmetic(Arithmetic::Sub, operands, context),
            Expression::Mul { operands } => self.arithmetic(Arithmetic::Mul, operands, context),
            Expression::Div { operands } => self.arithmetic(Arithmetic::Div, operands, context),
            Expression::Concat { operands } => self.concat(operands, context),
            Expression::Length { operand } => {
                let value = self.evaluate(operand, context)?;
                let len = match &value {
                    Value::Null => 0,
                    Value::String(text) => text.chars().count(),
                    Value::Array(values) => values.len(),
                    Value::Object(map) => map.len(),
                    other => {
                        return Err(EvaluationError::Expression(format!(
                            "length is not defined for {}",
                            value_kind(other)
                        )));
                    }
                };
                Ok(Value::from(len as u64))
            }
            Expression::If {
                condition,
                then,
                otherwise,
            } => {
                if truthy(&self.evaluate(condition, context)?) {
                    self.evaluate(then, context)
                } else if let Some(otherwise) = otherwise {
                    self.evaluate(otherwise, context)
                } else {
                    Ok(Value::Null)
                }
            }
            Expression::List { items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate(item, context)?);
                }
                Ok(Value::Array(values))
            }
            Expression::Coalesce { operands } => {
                for operand in operands {
                    let value = self.evaluate(operand, context)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                Ok(Value::Null)
            }
        }
    }

    fn evaluate_pair(
        &mut self,
        left: &Expression,
        right: &Expression,
        context: &EvalContext<'_>,
    ) -> Result<(Value, Value), EvaluationError> {
        let left = self.evaluate(left, context)?;
        let right = self.evaluate(right, context)?;
        Ok((left, right))
    }

    // Comparisons against null are false rather than errors: an unanswered
    // field must not make a condition blow up.
    fn compare(
        &mut self,
        left: &Expression,
        right: &Expression,
        context: &EvalContext<'_>,
        accept: fn(Ordering) -> bool,
    ) -> Result<Value, EvaluationError> {
        let (left, right) = self.evaluate_pair(left, right, context)?;
        if left.is_null() || right.is_null() {
            return Ok(Value::Bool(false));
        }
        let order = match (&left, &right) {
            (Value::String(lhs), Value::String(rhs)) => lhs.cmp(rhs),
            _ => {
                let lhs = as_number(&left);
                let rhs = as_number(&right);
                match (lhs, rhs) {
                    (Some(lhs), Some(rhs)) => lhs.partial_cmp(&rhs).ok_or_else(|| {
                        EvaluationError::Expression("cannot order NaN".to_string())
                    })?,
                    _ => {
                        return Err(EvaluationError::Expression(format!(
                            "cannot compare {} with {}",
                            value_kind(&left),
                            value_kind(&right)
                        )));
                    }
                }
            }
        };
        Ok(Value::Bool(accept(order)))
    }

    fn arithmetic(
        &mut self,
        op: Arithmetic,
        operands: &[Expression],
        context: &EvalContext<'_>,
    ) -> Result<Value, EvaluationError> {
        let mut acc: Option<Number> = None;
        for operand in operands {
            let value = self.evaluate(operand, context)?;
            let number = match value {
                Value::Number(number) => number,
                other => {
                    return Err(EvaluationError::Expression(format!(
                        "{} expects numbers, got {}",
                        op.name(),
                        value_kind(&other)
                    )));
                }
            };
            acc = Some(match acc {
                None => number,
                Some(lhs) => apply_arithmetic(op, &lhs, &number)?,
            });
        }
        acc.map(Value::Number).ok_or_else(|| {
            EvaluationError::Expression(format!("{} needs at least one operand", op.name()))
        })
    }

    fn concat(
        &mut self,
        operands: &[Expression],
        context: &EvalContext<'_>,
    ) -> Result<Value, EvaluationError> {
        let mut values = Vec::with_capacity(operands.len());
        for operand in operands {
            values.push(self.evaluate(operand, context)?);
        }
        if values.iter().any(Value::is_array) {
            let mut out = Vec::new();
            for value in values {
                match value {
                    Value::Array(items) => out.extend(items),
                    Value::Null => {}
                    other => out.push(other),
                }
            }
            return Ok(Value::Array(out));
        }
        let mut out = String::new();
        for value in &values {
            match value {
                Value::Null => {}
                Value::String(text) => out.push_str(text),
                other => out.push_str(&other.to_string()),
            }
        }
        Ok(Value::String(out))
    }

    fn pattern(&mut self, pattern: &str) -> Result<&Regex, EvaluationError> {
        if !self.patterns.contains_key(pattern) {
            let regex = Regex::new(pattern).map_err(|err| {
                EvaluationError::Expression(format!("invalid pattern '{pattern}': {err}"))
            })?;
            self.patterns.insert(pattern.to_string(), regex);
        }
        self.patterns.get(pattern).ok_or_else(|| {
            EvaluationError::Expression("pattern cache lookup failed".to_string())
        })
    }
}

fn apply_arithmetic(op: Arithmetic, lhs: &Number, rhs: &Number) -> Result<Number, EvaluationError> {
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        let exact = match op {
            Arithmetic::Add => a.checked_add(b),
            Arithmetic::Sub => a.checked_sub(b),
            Arithmetic::Mul => a.checked_mul(b),
            Arithmetic::Div => {
                if b == 0 {
                    return Err(EvaluationError::Expression("division by zero".to_string()));
                }
                if a.checked_rem(b) == Some(0) {
                    a.checked_div(b)
                } else {
                    None
                }
            }
        };
        if let Some(value) = exact {
            return Ok(Number::from(value));
        }
    }

    let a = lhs
        .as_f64()
        .ok_or_else(|| EvaluationError::Expression(format!("number out of range: {lhs}")))?;
    let b = rhs
        .as_f64()
        .ok_or_else(|| EvaluationError::Expression(format!("number out of range: {rhs}")))?;
    let result = match op {
        Arithmetic::Add => a + b,
        Arithmetic::Sub => a - b,
        Arithmetic::Mul => a * b,
        Arithmetic::Div => {
            if b == 0.0 {
                return Err(EvaluationError::Expression("division by zero".to_string()));
            }
            a / b
        }
    };
    Number::from_f64(result).ok_or_else(|| {
        EvaluationError::Expression(format!("{} produced a non-finite number", op.name()))
    })
}

/// null → false, numbers → non-zero, strings and collections → non-empty.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(value) => *value,
        Value::Number(number) => number.as_f64().is_some_and(|value| value != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(values) => !values.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// null, whitespace-only strings and empty collections.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(values) => values.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        _ => None,
    }
}

fn json_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(lhs), Value::Number(rhs)) => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => lhs == rhs,
        },
        (Value::Array(lhs), Value::Array(rhs)) => {
            lhs.len() == rhs.len() && lhs.iter().zip(rhs).all(|(a, b)| json_equals(a, b))
        }
        _ => left == right,
    }
}
