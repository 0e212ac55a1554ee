use std::collections::HashSet;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    element::{ElementKind, ElementNode, ElementType, SelectOption},
    patch::merge_patch,
    validation::parse_iso_date,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    NotAnObject,
    Malformed(String),
    EmptyId,
    InvalidId(String),
    DuplicateId(String),
    AmbiguousId {
        id: String,
        container: String,
    },
    MissingRoot(ElementType),
    NestedRoot(String),
    InputOnlyAttribute {
        id: String,
        element_type: ElementType,
        attribute: &'static str,
    },
    InvalidPattern {
        id: String,
        message: String,
    },
    InvalidBounds {
        id: String,
        bounds: &'static str,
    },
    InvalidDate {
        id: String,
        value: String,
    },
    DuplicateOption {
        id: String,
        value: String,
    },
    IdentityChanged {
        id: String,
        attribute: &'static str,
    },
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::NotAnObject => write!(f, "element definition must be a JSON object"),
            ResolveError::Malformed(message) => {
                write!(f, "malformed element definition: {message}")
            }
            ResolveError::EmptyId => write!(f, "element id cannot be empty"),
            ResolveError::InvalidId(id) => write!(f, "element id '{id}' contains whitespace"),
            ResolveError::DuplicateId(id) => write!(f, "duplicate element id '{id}'"),
            ResolveError::AmbiguousId { id, container } => write!(
                f,
                "element id '{id}' can collide with the rows of replicating container '{container}'"
            ),
            ResolveError::MissingRoot(found) => {
                write!(f, "form definition must start with a root element, got {found}")
            }
            ResolveError::NestedRoot(id) => {
                write!(f, "root element '{id}' can only appear at the top of a form")
            }
            ResolveError::InputOnlyAttribute {
                id,
                element_type,
                attribute,
            } => write!(
                f,
                "element '{id}' of type {element_type} does not take input and cannot declare '{attribute}'",
            ),
            ResolveError::InvalidPattern { id, message } => {
                write!(f, "element '{id}' has an invalid pattern: {message}")
            }
            ResolveError::InvalidBounds { id, bounds } => {
                write!(f, "element '{id}' has {bounds} out of order")
            }
            ResolveError::InvalidDate { id, value } => {
                write!(f, "element '{id}' has invalid date bound '{value}'")
            }
            ResolveError::DuplicateOption { id, value } => {
                write!(f, "element '{id}' lists option '{value}' more than once")
            }
            ResolveError::IdentityChanged { id, attribute } => {
                write!(f, "override of element '{id}' cannot change its {attribute}")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

pub trait ElementResolver {
    fn resolve(&self, raw: &Value) -> Result<ElementNode, ResolveError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonElementResolver;

impl JsonElementResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve_form(&self, raw: &Value) -> Result<ElementNode, ResolveError> {
        let element = self.resolve(raw)?;
        if !element.is_root() {
            return Err(ResolveError::MissingRoot(element.element_type()));
        }
        Ok(element)
    }
}

impl ElementResolver for JsonElementResolver {
    fn resolve(&self, raw: &Value) -> Result<ElementNode, ResolveError> {
        if !raw.is_object() {
            return Err(ResolveError::NotAnObject);
        }
        let element =
            ElementNode::deserialize(raw).map_err(|err| ResolveError::Malformed(err.to_string()))?;
        let mut scope = Scope::default();
        check_element(&element, true, &mut scope)?;
        scope.check_row_prefixes()?;
        Ok(element)
    }
}

/// Applies an override payload to `original` as a JSON merge patch and
/// resolves the result. The patch may not change the element's id or type.
pub fn patch_element(
    resolver: &dyn ElementResolver,
    original: &ElementNode,
    patch: &Map<String, Value>,
) -> Result<ElementNode, ResolveError> {
    let mut raw =
        serde_json::to_value(original).map_err(|err| ResolveError::Malformed(err.to_string()))?;
    merge_patch(&mut raw, &Value::Object(patch.clone()));

    let patched = resolver.resolve(&raw)?;
    if patched.id != original.id {
        return Err(ResolveError::IdentityChanged {
            id: original.id.clone(),
            attribute: "id",
        });
    }
    if patched.element_type() != original.element_type() {
        return Err(ResolveError::IdentityChanged {
            id: original.id.clone(),
            attribute: "type",
        });
    }
    Ok(patched)
}

// Ids that resolve under the same prefix: siblings, and the contents of
// steps and groups, but not the template of a nested replicating container,
// which gets its own prefix per row.
#[derive(Default)]
struct Scope<'a> {
    ids: HashSet<&'a str>,
    containers: Vec<&'a str>,
}

impl<'a> Scope<'a> {
    fn insert(&mut self, element: &'a ElementNode) -> Result<(), ResolveError> {
        if !self.ids.insert(element.id.as_str()) {
            return Err(ResolveError::DuplicateId(element.id.clone()));
        }
        if matches!(element.kind, ElementKind::ReplicatingContainer { .. }) {
            self.containers.push(element.id.as_str());
        }
        Ok(())
    }

    // Row instances resolve to `<container>_<row>_<id>`, so no id sharing
    // their prefix may live next to the container.
    fn check_row_prefixes(&self) -> Result<(), ResolveError> {
        for container in &self.containers {
            let prefix = format!("{container}_");
            if let Some(id) = self.ids.iter().find(|id| id.starts_with(&prefix)) {
                return Err(ResolveError::AmbiguousId {
                    id: id.to_string(),
                    container: container.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn check_element<'a>(
    element: &'a ElementNode,
    top: bool,
    scope: &mut Scope<'a>,
) -> Result<(), ResolveError> {
    check_id(&element.id)?;
    scope.insert(element)?;
    if element.is_root() && !top {
        return Err(ResolveError::NestedRoot(element.id.clone()));
    }
    if !element.accepts_input() {
        let attribute = if !element.value.is_absent() {
            Some("value")
        } else if !element.validation.is_absent() {
            Some("validation")
        } else if element.required {
            Some("required")
        } else {
            None
        };
        if let Some(attribute) = attribute {
            return Err(ResolveError::InputOnlyAttribute {
                id: element.id.clone(),
                element_type: element.element_type(),
                attribute,
            });
        }
    }
    check_kind(element)?;

    match &element.kind {
        ElementKind::Root { children } | ElementKind::ReplicatingContainer { children, .. } => {
            let mut inner = Scope::default();
            for child in children {
                check_element(child, false, &mut inner)?;
            }
            inner.check_row_prefixes()?;
        }
        ElementKind::Step { children, .. } | ElementKind::Group { children, .. } => {
            for child in children {
                check_element(child, false, scope)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_id(id: &str) -> Result<(), ResolveError> {
    if id.is_empty() {
        return Err(ResolveError::EmptyId);
    }
    if id.chars().any(char::is_whitespace) {
        return Err(ResolveError::InvalidId(id.to_string()));
    }
    Ok(())
}

fn check_kind(element: &ElementNode) -> Result<(), ResolveError> {
    let id = &element.id;
    match &element.kind {
        ElementKind::ReplicatingContainer {
            min_rows, max_rows, ..
        } => check_order(id, *min_rows, *max_rows, "minRows/maxRows"),
        ElementKind::TextField {
            min_length,
            max_length,
            pattern,
        } => {
            check_order(id, *min_length, *max_length, "minLength/maxLength")?;
            if let Some(pattern) = pattern {
                Regex::new(pattern).map_err(|err| ResolveError::InvalidPattern {
                    id: id.clone(),
                    message: err.to_string(),
                })?;
            }
            Ok(())
        }
        ElementKind::NumberField { min, max, .. } => check_order(id, *min, *max, "min/max"),
        ElementKind::Select { options } => check_options(id, options),
        ElementKind::MultiSelect {
            options,
            min_selected,
            max_selected,
        } => {
            check_options(id, options)?;
            check_order(id, *min_selected, *max_selected, "minSelected/maxSelected")
        }
        ElementKind::DateField { min, max } => {
            let parse = |bound: &Option<String>| match bound {
                Some(value) => parse_iso_date(value)
                    .map(Some)
                    .ok_or_else(|| ResolveError::InvalidDate {
                        id: id.clone(),
                        value: value.clone(),
                    }),
                None => Ok(None),
            };
            let min = parse(min)?;
            let max = parse(max)?;
            check_order(id, min, max, "min/max")
        }
        ElementKind::Root { .. }
        | ElementKind::Step { .. }
        | ElementKind::Group { .. }
        | ElementKind::TextArea { .. }
        | ElementKind::EmailField {}
        | ElementKind::Checkbox { .. }
        | ElementKind::Text { .. }
        | ElementKind::Spacer {} => Ok(()),
    }
}

fn check_order<T: PartialOrd>(
    id: &str,
    min: Option<T>,
    max: Option<T>,
    bounds: &'static str,
) -> Result<(), ResolveError> {
    if let (Some(min), Some(max)) = (min, max)
        && min > max
    {
        return Err(ResolveError::InvalidBounds {
            id: id.to_string(),
            bounds,
        });
    }
    Ok(())
}

fn check_options(id: &str, options: &[SelectOption]) -> Result<(), ResolveError> {
    let mut seen = HashSet::new();
    for option in options {
        if !seen.insert(option.value.as_str()) {
            return Err(ResolveError::DuplicateOption {
                id: id.to_string(),
                value: option.value.clone(),
            });
        }
    }
    Ok(())
}
