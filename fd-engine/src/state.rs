use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::element::ElementNode;

#[derive(Clone, Debug, Default)]
pub struct DerivationState {
    input_values: HashMap<String, Value>,
    computed_values: HashMap<String, Value>,
    visibilities: HashMap<String, bool>,
    errors: HashMap<String, String>,
    overrides: HashMap<String, ElementNode>,
    reached: BTreeSet<String>,
}

impl DerivationState {
    pub fn new(input_values: HashMap<String, Value>) -> Self {
        Self {
            input_values,
            ..Self::default()
        }
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.visibilities.get(id).copied().unwrap_or(true)
    }

    pub fn set_visible(&mut self, id: impl Into<String>, visible: bool) {
        let id = id.into();
        if visible {
            self.visibilities.remove(&id);
        } else {
            self.visibilities.insert(id, false);
        }
    }

    /// Current value of an element instance.
    ///
    /// Invisible elements have no value. Submitted input wins over computed
    /// values unless it is null or an empty list/map, in which case the
    /// computed value (if any) is used instead.
    pub fn value(&self, id: &str) -> Option<&Value> {
        if !self.is_visible(id) {
            return None;
        }
        if let Some(input) = self.input_values.get(id)
            && !is_absent_input(input)
        {
            return Some(input);
        }
        self.computed_values.get(id).filter(|value| !value.is_null())
    }

    pub fn input_value(&self, id: &str) -> Option<&Value> {
        self.input_values.get(id)
    }

    pub fn computed_value(&self, id: &str) -> Option<&Value> {
        self.computed_values.get(id)
    }

    pub fn set_computed_value(&mut self, id: impl Into<String>, value: Value) {
        self.computed_values.insert(id.into(), value);
    }

    pub fn error(&self, id: &str) -> Option<&str> {
        self.errors.get(id).map(String::as_str)
    }

    pub fn set_error(&mut self, id: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(id.into(), message.into());
    }

    pub fn override_for(&self, id: &str) -> Option<&ElementNode> {
        self.overrides.get(id)
    }

    pub fn set_override(&mut self, id: impl Into<String>, element: ElementNode) {
        self.overrides.insert(id.into(), element);
    }

    pub fn input_values(&self) -> &HashMap<String, Value> {
        &self.input_values
    }

    pub fn computed_values(&self) -> &HashMap<String, Value> {
        &self.computed_values
    }

    pub fn visibilities(&self) -> &HashMap<String, bool> {
        &self.visibilities
    }

    pub fn errors(&self) -> &HashMap<String, String> {
        &self.errors
    }

    pub fn overrides(&self) -> &HashMap<String, ElementNode> {
        &self.overrides
    }

    pub fn reached(&self) -> &BTreeSet<String> {
        &self.reached
    }

    pub(crate) fn mark_reached(&mut self, id: &str) {
        if !self.reached.contains(id) {
            self.reached.insert(id.to_string());
        }
    }

    pub fn combined_values(&self) -> HashMap<String, Value> {
        let mut combined = HashMap::new();
        for id in self.input_values.keys().chain(self.computed_values.keys()) {
            if combined.contains_key(id) {
                continue;
            }
            if let Some(value) = self.value(id) {
                combined.insert(id.clone(), value.clone());
            }
        }
        combined
    }
}

fn is_absent_input(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(values) => values.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => false,
    }
}
