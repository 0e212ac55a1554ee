mod errors;
mod overrides;
mod values;
mod visibility;
mod walk;

use std::{
    any::Any,
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
};

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    element::ElementNode,
    error::EvaluationError,
    evaluator::EvaluatorProvider,
    logging::{Category, category},
    resolver::{ElementResolver, JsonElementResolver},
    state::DerivationState,
    validation::ValidatorRegistry,
};

use errors::ErrorPass;
use overrides::OverridePass;
use values::ValuePass;
use visibility::VisibilityPass;
use walk::{Run, walk};

pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeriveOptions {
    pub skip_validation: bool,
    pub max_depth: usize,
}

impl Default for DeriveOptions {
    fn default() -> Self {
        Self {
            skip_validation: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Visibility,
    Override,
    Value,
    Error,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Visibility => write!(f, "visibility"),
            Phase::Override => write!(f, "override"),
            Phase::Value => write!(f, "value"),
            Phase::Error => write!(f, "error"),
        }
    }
}

/// The derivation as a whole could not be completed. Per-element failures
/// never end up here; they are recorded in the state.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivationError {
    EvaluatorUnavailable(EvaluationError),
    DepthExceeded { id: String, limit: usize },
    Panicked { phase: Phase, message: String },
}

impl std::fmt::Display for DerivationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DerivationError::EvaluatorUnavailable(err) => {
                write!(f, "derivation failed: {err}")
            }
            DerivationError::DepthExceeded { id, limit } => write!(
                f,
                "derivation failed: element '{id}' is nested deeper than {limit} levels"
            ),
            DerivationError::Panicked { phase, message } => {
                write!(f, "derivation failed during {phase} phase: {message}")
            }
        }
    }
}

impl std::error::Error for DerivationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DerivationError::EvaluatorUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

pub struct Deriver<P> {
    provider: P,
    resolver: Box<dyn ElementResolver + Send + Sync>,
    validators: ValidatorRegistry,
}

impl<P: EvaluatorProvider> Deriver<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            resolver: Box::new(JsonElementResolver::new()),
            validators: ValidatorRegistry::default(),
        }
    }

    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: ElementResolver + Send + Sync + 'static,
    {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_validators(mut self, validators: ValidatorRegistry) -> Self {
        self.validators = validators;
        self
    }

    pub fn validators_mut(&mut self) -> &mut ValidatorRegistry {
        &mut self.validators
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn derive(
        &self,
        root: &ElementNode,
        inputs: HashMap<String, Value>,
        skip_validation: bool,
    ) -> Result<DerivationState, DerivationError> {
        self.derive_with(
            root,
            inputs,
            DeriveOptions {
                skip_validation,
                ..DeriveOptions::default()
            },
        )
    }

    pub fn derive_with(
        &self,
        root: &ElementNode,
        inputs: HashMap<String, Value>,
        options: DeriveOptions,
    ) -> Result<DerivationState, DerivationError> {
        let mut evaluator = self
            .provider
            .acquire()
            .map_err(DerivationError::EvaluatorUnavailable)?;
        let mut state = DerivationState::new(inputs);

        let mut run = Run::new(
            &mut state,
            evaluator.as_mut(),
            self.resolver.as_ref(),
            &self.validators,
            options.max_depth,
        );
        run_phase(Phase::Visibility, || {
            walk(&VisibilityPass, &mut run, root, true)
        })?;
        run_phase(Phase::Override, || walk(&OverridePass, &mut run, root, ()))?;
        run_phase(Phase::Value, || walk(&ValuePass, &mut run, root, ()))?;
        if options.skip_validation {
            debug!("{} skipping error phase", category(Category::Derive));
        } else {
            run_phase(Phase::Error, || walk(&ErrorPass, &mut run, root, ()))?;
        }
        drop(evaluator);

        info!(
            "{} {} elements, {} hidden, {} errors",
            category(Category::Derive),
            state.reached().len(),
            state.visibilities().len(),
            state.errors().len()
        );
        Ok(state)
    }
}

fn run_phase<F>(phase: Phase, pass: F) -> Result<(), DerivationError>
where
    F: FnOnce() -> Result<(), DerivationError>,
{
    debug!("{} {} phase", category(Category::Derive), phase);
    match panic::catch_unwind(AssertUnwindSafe(pass)) {
        Ok(result) => result,
        Err(payload) => Err(DerivationError::Panicked {
            phase,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::StandardProvider;
    use serde_json::json;

    fn tree(raw: Value) -> ElementNode {
        JsonElementResolver::new()
            .resolve_form(&raw)
            .expect("form should resolve")
    }

    #[test]
    fn phase_display_names() {
        assert_eq!(Phase::Visibility.to_string(), "visibility");
        assert_eq!(Phase::Error.to_string(), "error");
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn depth_limit_aborts_derivation() {
        let root = tree(json!({
            "id": "root",
            "type": "root",
            "children": [
                { "id": "s", "type": "step", "children": [
                    { "id": "g", "type": "group", "children": [
                        { "id": "x", "type": "textField" }
                    ]}
                ]}
            ]
        }));
        let deriver = Deriver::new(StandardProvider::new());

        let err = deriver
            .derive_with(
                &root,
                HashMap::new(),
                DeriveOptions {
                    max_depth: 2,
                    ..DeriveOptions::default()
                },
            )
            .expect_err("derivation should fail");
        assert_eq!(
            err,
            DerivationError::DepthExceeded {
                id: "x".to_string(),
                limit: 2
            }
        );

        let state = deriver
            .derive(&root, HashMap::new(), false)
            .expect("derive should succeed");
        assert!(state.reached().contains("x"));
    }

    #[test]
    fn malformed_dataset_ids_are_recorded_on_container() {
        let root = tree(json!({
            "id": "root",
            "type": "root",
            "children": [
                { "id": "items", "type": "replicatingContainer", "children": [
                    { "id": "qty", "type": "numberField", "required": true }
                ]}
            ]
        }));
        let inputs = serde_json::from_value(json!({ "items": "oops" }))
            .expect("inputs should be a map");

        let state = Deriver::new(StandardProvider::new())
            .derive(&root, inputs, true)
            .expect("derive should succeed");
        assert_eq!(state.error("items"), Some("Expected a list of entries."));
        assert!(state.reached().iter().all(|id| !id.starts_with("items_")));
    }
}
