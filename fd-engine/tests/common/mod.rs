#![allow(dead_code, unused_imports)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

pub use engine::{
    DerivationError, DerivationSnapshot, DerivationState, DeriveOptions, Deriver, ElementNode,
    EvalContext, EvaluationError, Expression, JsonElementResolver, ScriptEngine, StandardProvider,
};
pub use serde_json::{Value, json};

pub type ScriptFn = Arc<dyn Fn(&EvalContext<'_>) -> Result<Value, EvaluationError> + Send + Sync>;

/// Script sources mapped to canned behavior. Unknown sources fail like a
/// script error would.
#[derive(Clone, Default)]
pub struct Scripts {
    entries: HashMap<String, ScriptFn>,
}

impl Scripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, source: &str, script: F) -> Self
    where
        F: Fn(&EvalContext<'_>) -> Result<Value, EvaluationError> + Send + Sync + 'static,
    {
        self.entries.insert(source.to_string(), Arc::new(script));
        self
    }

    pub fn returning(self, source: &str, value: Value) -> Self {
        self.with(source, move |_| Ok(value.clone()))
    }

    pub fn failing(self, source: &str, message: &str) -> Self {
        let message = message.to_string();
        self.with(source, move |_| Err(EvaluationError::Script(message.clone())))
    }
}

pub struct ScriptedEngine {
    scripts: Arc<HashMap<String, ScriptFn>>,
    released: Arc<AtomicUsize>,
}

impl ScriptEngine for ScriptedEngine {
    fn run(&mut self, source: &str, context: &EvalContext<'_>) -> Result<Value, EvaluationError> {
        match self.scripts.get(source) {
            Some(script) => script(context),
            None => Err(EvaluationError::Script(format!("unknown script '{source}'"))),
        }
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counts how many script engines were handed out and dropped again.
#[derive(Clone, Default)]
pub struct Lifecycle {
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl Lifecycle {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

pub fn scripted_provider(scripts: Scripts) -> (StandardProvider, Lifecycle) {
    let scripts = Arc::new(scripts.entries);
    let lifecycle = Lifecycle::default();
    let counters = lifecycle.clone();
    let provider = StandardProvider::with_script_engine(move || {
        counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            scripts: Arc::clone(&scripts),
            released: Arc::clone(&counters.released),
        }) as Box<dyn ScriptEngine>)
    });
    (provider, lifecycle)
}

pub fn deriver(scripts: Scripts) -> Deriver<StandardProvider> {
    let (provider, _) = scripted_provider(scripts);
    Deriver::new(provider)
}

pub fn form(raw: Value) -> ElementNode {
    JsonElementResolver::new()
        .resolve_form(&raw)
        .expect("form should resolve")
}

pub fn inputs(raw: Value) -> HashMap<String, Value> {
    serde_json::from_value(raw).expect("inputs should be a JSON object")
}

pub fn derive(
    deriver: &Deriver<StandardProvider>,
    root: &ElementNode,
    raw: Value,
) -> DerivationState {
    deriver
        .derive(root, inputs(raw), false)
        .expect("derive should succeed")
}
