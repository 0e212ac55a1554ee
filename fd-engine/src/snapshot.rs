use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::DerivationState;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivationSnapshot {
    pub elements: BTreeMap<String, ElementSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub overridden: bool,
}

impl DerivationSnapshot {
    pub fn from_state(state: &DerivationState) -> Self {
        let elements = state
            .reached()
            .iter()
            .map(|id| {
                let element = ElementSnapshot {
                    visible: state.is_visible(id),
                    value: state.value(id).cloned(),
                    error: state.error(id).map(str::to_string),
                    overridden: state.override_for(id).is_some(),
                };
                (id.clone(), element)
            })
            .collect();
        Self { elements }
    }

    pub fn get(&self, id: &str) -> Option<&ElementSnapshot> {
        self.elements.get(id)
    }

    pub fn error_count(&self) -> usize {
        self.elements
            .values()
            .filter(|element| element.error.is_some())
            .count()
    }
}

impl From<&DerivationState> for DerivationSnapshot {
    fn from(state: &DerivationState) -> Self {
        Self::from_state(state)
    }
}
