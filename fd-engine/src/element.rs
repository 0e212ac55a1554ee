use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expression::Expression;

/// `value`, `validation` and `required` are only accepted on input-bearing
/// kinds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Behavior::is_absent")]
    pub visibility: Behavior<Expression>,
    #[serde(default, rename = "override", skip_serializing_if = "Behavior::is_absent")]
    pub patch: Behavior<Expression>,
    #[serde(default, skip_serializing_if = "Behavior::is_absent")]
    pub value: Behavior<Expression>,
    #[serde(default, skip_serializing_if = "Behavior::is_absent")]
    pub validation: Behavior<Vec<ValidationRule>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ElementKind {
    Root {
        #[serde(default)]
        children: Vec<ElementNode>,
    },
    Step {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default)]
        children: Vec<ElementNode>,
    },
    Group {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default)]
        children: Vec<ElementNode>,
    },
    ReplicatingContainer {
        #[serde(default)]
        children: Vec<ElementNode>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_rows: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_rows: Option<usize>,
    },
    TextField {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    TextArea {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    EmailField {},
    NumberField {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        integer: bool,
    },
    Checkbox {
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        must_be_checked: bool,
    },
    Select {
        #[serde(default)]
        options: Vec<SelectOption>,
    },
    MultiSelect {
        #[serde(default)]
        options: Vec<SelectOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_selected: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_selected: Option<usize>,
    },
    DateField {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<String>,
    },
    Text {
        #[serde(default)]
        content: String,
    },
    Spacer {},
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Root,
    Step,
    Group,
    ReplicatingContainer,
    TextField,
    TextArea,
    EmailField,
    NumberField,
    Checkbox,
    Select,
    MultiSelect,
    DateField,
    Text,
    Spacer,
}

impl ElementType {
    pub fn name(self) -> &'static str {
        match self {
            ElementType::Root => "root",
            ElementType::Step => "step",
            ElementType::Group => "group",
            ElementType::ReplicatingContainer => "replicatingContainer",
            ElementType::TextField => "textField",
            ElementType::TextArea => "textArea",
            ElementType::EmailField => "emailField",
            ElementType::NumberField => "numberField",
            ElementType::Checkbox => "checkbox",
            ElementType::Select => "select",
            ElementType::MultiSelect => "multiSelect",
            ElementType::DateField => "dateField",
            ElementType::Text => "text",
            ElementType::Spacer => "spacer",
        }
    }

    pub fn accepts_input(self) -> bool {
        match self {
            ElementType::Root
            | ElementType::Step
            | ElementType::Group
            | ElementType::Text
            | ElementType::Spacer => false,
            ElementType::ReplicatingContainer
            | ElementType::TextField
            | ElementType::TextArea
            | ElementType::EmailField
            | ElementType::NumberField
            | ElementType::Checkbox
            | ElementType::Select
            | ElementType::MultiSelect
            | ElementType::DateField => true,
        }
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Shape<'a> {
    Root(&'a [ElementNode]),
    Section(&'a [ElementNode]),
    Replicating(&'a [ElementNode]),
    Leaf,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ElementKind {
    pub fn element_type(&self) -> ElementType {
        match self {
            ElementKind::Root { .. } => ElementType::Root,
            ElementKind::Step { .. } => ElementType::Step,
            ElementKind::Group { .. } => ElementType::Group,
            ElementKind::ReplicatingContainer { .. } => ElementType::ReplicatingContainer,
            ElementKind::TextField { .. } => ElementType::TextField,
            ElementKind::TextArea { .. } => ElementType::TextArea,
            ElementKind::EmailField {} => ElementType::EmailField,
            ElementKind::NumberField { .. } => ElementType::NumberField,
            ElementKind::Checkbox { .. } => ElementType::Checkbox,
            ElementKind::Select { .. } => ElementType::Select,
            ElementKind::MultiSelect { .. } => ElementType::MultiSelect,
            ElementKind::DateField { .. } => ElementType::DateField,
            ElementKind::Text { .. } => ElementType::Text,
            ElementKind::Spacer {} => ElementType::Spacer,
        }
    }
}

impl ElementNode {
    pub fn element_type(&self) -> ElementType {
        self.kind.element_type()
    }

    pub fn accepts_input(&self) -> bool {
        self.element_type().accepts_input()
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, ElementKind::Root { .. })
    }

    pub fn shape(&self) -> Shape<'_> {
        match &self.kind {
            ElementKind::Root { children } => Shape::Root(children),
            ElementKind::Step { children, .. } | ElementKind::Group { children, .. } => {
                Shape::Section(children)
            }
            ElementKind::ReplicatingContainer { children, .. } => Shape::Replicating(children),
            ElementKind::TextField { .. }
            | ElementKind::TextArea { .. }
            | ElementKind::EmailField {}
            | ElementKind::NumberField { .. }
            | ElementKind::Checkbox { .. }
            | ElementKind::Select { .. }
            | ElementKind::MultiSelect { .. }
            | ElementKind::DateField { .. }
            | ElementKind::Text { .. }
            | ElementKind::Spacer {} => Shape::Leaf,
        }
    }

    pub fn children(&self) -> &[ElementNode] {
        match self.shape() {
            Shape::Root(children) | Shape::Section(children) | Shape::Replicating(children) => {
                children
            }
            Shape::Leaf => &[],
        }
    }

    pub fn find(&self, id: &str) -> Option<&ElementNode> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }
}

pub fn resolved_id(prefix: Option<&str>, id: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}_{id}"),
        None => id.to_string(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    pub source: String,
}

impl Script {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LegacyFunction {
    /// Ordered rule set; yields the `result` of the first rule whose
    /// condition holds, or null when none does.
    NoCode { rules: Vec<LegacyRule> },
    Code { source: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyRule {
    pub when: Expression,
    #[serde(default = "default_rule_result")]
    pub result: Value,
}

fn default_rule_result() -> Value {
    Value::Bool(true)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub expression: Expression,
    pub message: String,
}

/// The three ways a behavior can be expressed. More than one slot may be
/// populated; [`Behavior::mechanism`] decides which one runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "E: Deserialize<'de>"))]
pub struct Behavior<E> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<Script>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<E>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy: Option<LegacyFunction>,
}

impl<E> Default for Behavior<E> {
    fn default() -> Self {
        Self {
            script: None,
            expression: None,
            legacy: None,
        }
    }
}

#[derive(Debug)]
pub enum Mechanism<'a, E> {
    Script(&'a Script),
    Expression(&'a E),
    Legacy(&'a LegacyFunction),
    Absent,
}

impl<E> Behavior<E> {
    pub fn script(source: impl Into<String>) -> Self {
        Self {
            script: Some(Script::new(source)),
            ..Self::default()
        }
    }

    pub fn expression(expression: E) -> Self {
        Self {
            expression: Some(expression),
            ..Self::default()
        }
    }

    pub fn legacy(function: LegacyFunction) -> Self {
        Self {
            legacy: Some(function),
            ..Self::default()
        }
    }

    pub fn is_absent(&self) -> bool {
        self.script.is_none() && self.expression.is_none() && self.legacy.is_none()
    }

    pub fn mechanism(&self) -> Mechanism<'_, E> {
        if let Some(script) = &self.script {
            return Mechanism::Script(script);
        }
        if let Some(expression) = &self.expression {
            return Mechanism::Expression(expression);
        }
        if let Some(legacy) = &self.legacy {
            return Mechanism::Legacy(legacy);
        }
        Mechanism::Absent
    }
}
