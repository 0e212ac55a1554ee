use serde_json::{Map, Value};

use crate::{
    element::{ElementNode, LegacyFunction, Script, resolved_id},
    error::EvaluationError,
    expression::{Expression, ExpressionEvaluator, truthy, value_kind},
    state::DerivationState,
    validation::INVALID_MESSAGE,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultShape {
    NoCode,
    Code,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EvalResult {
    value: Value,
    shape: ResultShape,
}

impl EvalResult {
    pub fn code(value: Value) -> Self {
        Self {
            value,
            shape: ResultShape::Code,
        }
    }

    pub fn no_code(value: Value) -> Self {
        Self {
            value,
            shape: ResultShape::NoCode,
        }
    }

    pub fn shape(&self) -> ResultShape {
        self.shape
    }

    pub fn is_no_code(&self) -> bool {
        self.shape == ResultShape::NoCode
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn as_bool(&self) -> bool {
        truthy(&self.value)
    }

    pub fn expect_bool(&self) -> Result<bool, EvaluationError> {
        match &self.value {
            Value::Bool(value) => Ok(*value),
            other => Err(EvaluationError::UnexpectedResult {
                expected: "boolean",
                found: value_kind(other),
            }),
        }
    }

    /// Error message of a custom validation result. Null and `true` mean
    /// valid, `false` gets a generic message.
    pub fn validation_message(&self) -> Result<Option<String>, EvaluationError> {
        match &self.value {
            Value::Null | Value::Bool(true) => Ok(None),
            Value::Bool(false) => Ok(Some(INVALID_MESSAGE.to_string())),
            Value::String(text) => Ok(Some(text.clone())),
            other => Err(EvaluationError::UnexpectedResult {
                expected: "string or boolean",
                found: value_kind(other),
            }),
        }
    }

    pub fn as_object(&self) -> &Value {
        &self.value
    }

    pub fn as_map(&self) -> Option<&Map<String, Value>> {
        self.value.as_object()
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub resolved_id: &'a str,
    pub id_prefix: Option<&'a str>,
    pub element: &'a ElementNode,
    pub state: &'a DerivationState,
}

impl<'a> EvalContext<'a> {
    pub fn new(
        resolved_id: &'a str,
        id_prefix: Option<&'a str>,
        element: &'a ElementNode,
        state: &'a DerivationState,
    ) -> Self {
        Self {
            resolved_id,
            id_prefix,
            element,
            state,
        }
    }

    pub fn value(&self, id: &str) -> Option<&'a Value> {
        self.state.value(id)
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.state.is_visible(id)
    }

    pub fn error(&self, id: &str) -> Option<&'a str> {
        self.state.error(id)
    }

    pub fn override_for(&self, id: &str) -> Option<&'a ElementNode> {
        self.state.override_for(id)
    }

    pub fn sibling_id(&self, id: &str) -> String {
        resolved_id(self.id_prefix, id)
    }

    pub fn to_json(&self) -> Value {
        let values: Map<String, Value> = self.state.combined_values().into_iter().collect();
        let visibilities: Map<String, Value> = self
            .state
            .visibilities()
            .iter()
            .map(|(id, visible)| (id.clone(), Value::Bool(*visible)))
            .collect();
        let errors: Map<String, Value> = self
            .state
            .errors()
            .iter()
            .map(|(id, message)| (id.clone(), Value::String(message.clone())))
            .collect();
        let overrides: Map<String, Value> = self
            .state
            .overrides()
            .iter()
            .filter_map(|(id, element)| {
                serde_json::to_value(element)
                    .ok()
                    .map(|value| (id.clone(), value))
            })
            .collect();

        let mut context = Map::new();
        context.insert("id".to_string(), Value::String(self.resolved_id.to_string()));
        context.insert(
            "prefix".to_string(),
            self.id_prefix
                .map(|prefix| Value::String(prefix.to_string()))
                .unwrap_or(Value::Null),
        );
        context.insert(
            "element".to_string(),
            serde_json::to_value(self.element).unwrap_or(Value::Null),
        );
        context.insert("values".to_string(), Value::Object(values));
        context.insert("visibilities".to_string(), Value::Object(visibilities));
        context.insert("errors".to_string(), Value::Object(errors));
        context.insert("overrides".to_string(), Value::Object(overrides));
        Value::Object(context)
    }
}

pub trait Evaluator {
    fn evaluate_script(
        &mut self,
        script: &Script,
        context: &EvalContext<'_>,
    ) -> Result<EvalResult, EvaluationError>;

    fn evaluate_expression(
        &mut self,
        expression: &Expression,
        context: &EvalContext<'_>,
    ) -> Result<EvalResult, EvaluationError>;

    fn evaluate_legacy(
        &mut self,
        function: &LegacyFunction,
        context: &EvalContext<'_>,
    ) -> Result<EvalResult, EvaluationError>;
}

/// Hands out one evaluator per derivation. Whatever the evaluator holds is
/// released when the returned box is dropped.
pub trait EvaluatorProvider {
    fn acquire(&self) -> Result<Box<dyn Evaluator + '_>, EvaluationError>;
}

pub trait ScriptEngine {
    fn run(&mut self, source: &str, context: &EvalContext<'_>) -> Result<Value, EvaluationError>;
}

type ScriptEngineFactory =
    dyn Fn() -> Result<Box<dyn ScriptEngine>, EvaluationError> + Send + Sync;

pub struct StandardEvaluator {
    expressions: ExpressionEvaluator,
    scripts: Option<Box<dyn ScriptEngine>>,
}

impl StandardEvaluator {
    pub fn new(scripts: Option<Box<dyn ScriptEngine>>) -> Self {
        Self {
            expressions: ExpressionEvaluator::new(),
            scripts,
        }
    }

    fn run_script(
        &mut self,
        source: &str,
        context: &EvalContext<'_>,
    ) -> Result<EvalResult, EvaluationError> {
        let engine = self
            .scripts
            .as_mut()
            .ok_or(EvaluationError::NoScriptEngine)?;
        engine.run(source, context).map(EvalResult::code)
    }
}

impl Evaluator for StandardEvaluator {
    fn evaluate_script(
        &mut self,
        script: &Script,
        context: &EvalContext<'_>,
    ) -> Result<EvalResult, EvaluationError> {
        self.run_script(&script.source, context)
    }

    fn evaluate_expression(
        &mut self,
        expression: &Expression,
        context: &EvalContext<'_>,
    ) -> Result<EvalResult, EvaluationError> {
        self.expressions
            .evaluate(expression, context)
            .map(EvalResult::no_code)
    }

    fn evaluate_legacy(
        &mut self,
        function: &LegacyFunction,
        context: &EvalContext<'_>,
    ) -> Result<EvalResult, EvaluationError> {
        match function {
            LegacyFunction::NoCode { rules } => {
                for rule in rules {
                    let holds = self.expressions.evaluate(&rule.when, context)?;
                    if truthy(&holds) {
                        return Ok(EvalResult::no_code(rule.result.clone()));
                    }
                }
                Ok(EvalResult::no_code(Value::Null))
            }
            LegacyFunction::Code { source } => self.run_script(source, context),
        }
    }
}

#[derive(Default)]
pub struct StandardProvider {
    script_engines: Option<Box<ScriptEngineFactory>>,
}

impl StandardProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script_engine<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn ScriptEngine>, EvaluationError> + Send + Sync + 'static,
    {
        Self {
            script_engines: Some(Box::new(factory)),
        }
    }
}

impl EvaluatorProvider for StandardProvider {
    fn acquire(&self) -> Result<Box<dyn Evaluator + '_>, EvaluationError> {
        let scripts = match &self.script_engines {
            Some(factory) => Some(factory()?),
            None => None,
        };
        Ok(Box::new(StandardEvaluator::new(scripts)))
    }
}
