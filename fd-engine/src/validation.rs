use std::{
    collections::{HashMap, HashSet},
    sync::{LazyLock, Mutex, PoisonError},
};

use regex::Regex;
use serde_json::Value;

use crate::{
    element::{ElementKind, ElementNode, ElementType, SelectOption},
    expression::is_blank,
};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("email pattern should compile")
});

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("date pattern should compile")
});

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_MESSAGE: &str = "This field is invalid.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    message: String,
}

impl ValidationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationFailure {}

/// Built-in format/range/type check for one element kind. Only called with
/// a present, non-blank value.
pub trait StructuralValidator: Send + Sync {
    fn validate(&self, element: &ElementNode, value: &Value) -> Result<(), ValidationFailure>;
}

pub struct ValidatorRegistry {
    validators: HashMap<ElementType, Box<dyn StructuralValidator>>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ValidatorRegistry {
    pub fn empty() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(ElementType::TextField, TextValidator::default());
        registry.register(ElementType::TextArea, TextValidator::default());
        registry.register(ElementType::EmailField, EmailValidator);
        registry.register(ElementType::NumberField, NumberValidator);
        registry.register(ElementType::Checkbox, CheckboxValidator);
        registry.register(ElementType::Select, SelectValidator);
        registry.register(ElementType::MultiSelect, MultiSelectValidator);
        registry.register(ElementType::DateField, DateValidator);
        registry.register(ElementType::ReplicatingContainer, ReplicatingValidator);
        registry
    }

    pub fn register<V>(&mut self, element_type: ElementType, validator: V)
    where
        V: StructuralValidator + 'static,
    {
        self.validators.insert(element_type, Box::new(validator));
    }

    pub fn contains(&self, element_type: ElementType) -> bool {
        self.validators.contains_key(&element_type)
    }

    /// Required check followed by the kind's validator. Blank values on
    /// optional elements are accepted without further checks.
    pub fn validate(
        &self,
        element: &ElementNode,
        value: Option<&Value>,
    ) -> Result<(), ValidationFailure> {
        let Some(value) = value.filter(|value| !is_blank(value)) else {
            if element.required {
                return Err(ValidationFailure::new(REQUIRED_MESSAGE));
            }
            return Ok(());
        };
        match self.validators.get(&element.element_type()) {
            Some(validator) => validator.validate(element, value),
            None => Ok(()),
        }
    }
}

/// Row ids of a replicating container value. Numbers are accepted and
/// rendered as their JSON text.
pub fn dataset_ids(value: &Value) -> Result<Vec<String>, ValidationFailure> {
    let Value::Array(items) = value else {
        return Err(ValidationFailure::new("Expected a list of entries."));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(id) => Ok(id.clone()),
            Value::Number(number) => Ok(number.to_string()),
            _ => Err(ValidationFailure::new(
                "Entries must be identified by text or numbers.",
            )),
        })
        .collect()
}

pub fn parse_iso_date(text: &str) -> Option<(i32, u32, u32)> {
    let captures = ISO_DATE.captures(text)?;
    let year: i32 = captures[1].parse().ok()?;
    let month: u32 = captures[2].parse().ok()?;
    let day: u32 = captures[3].parse().ok()?;
    if !(1..=12).contains(&month) || day == 0 || day > days_in_month(year, month) {
        return None;
    }
    Some((year, month, day))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn expect_text(value: &Value) -> Result<&str, ValidationFailure> {
    match value {
        Value::String(text) => Ok(text),
        _ => Err(ValidationFailure::new("Expected a text value.")),
    }
}

fn check_option(options: &[SelectOption], value: &str) -> Result<(), ValidationFailure> {
    if options.iter().any(|option| option.value == value) {
        Ok(())
    } else {
        Err(ValidationFailure::new(format!(
            "'{value}' is not one of the available options."
        )))
    }
}

#[derive(Default)]
struct TextValidator {
    patterns: Mutex<HashMap<String, Regex>>,
}

impl TextValidator {
    fn matches(&self, pattern: &str, text: &str) -> Result<bool, ValidationFailure> {
        let mut patterns = self.patterns.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(regex) = patterns.get(pattern) {
            return Ok(regex.is_match(text));
        }
        let regex = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|_| ValidationFailure::new("The field's format rule is invalid."))?;
        let matched = regex.is_match(text);
        patterns.insert(pattern.to_string(), regex);
        Ok(matched)
    }
}

impl StructuralValidator for TextValidator {
    fn validate(&self, element: &ElementNode, value: &Value) -> Result<(), ValidationFailure> {
        let text = expect_text(value)?;
        let (min_length, max_length, pattern) = match &element.kind {
            ElementKind::TextField {
                min_length,
                max_length,
                pattern,
            } => (*min_length, *max_length, pattern.as_deref()),
            ElementKind::TextArea { max_length } => (None, *max_length, None),
            _ => return Ok(()),
        };

        let len = text.chars().count();
        if let Some(min) = min_length
            && len < min
        {
            return Err(ValidationFailure::new(format!(
                "Must be at least {min} characters long."
            )));
        }
        if let Some(max) = max_length
            && len > max
        {
            return Err(ValidationFailure::new(format!(
                "Must be at most {max} characters long."
            )));
        }
        if let Some(pattern) = pattern {
            if !self.matches(pattern, text)? {
                return Err(ValidationFailure::new(
                    "Does not match the required format.",
                ));
            }
        }
        Ok(())
    }
}

struct EmailValidator;

impl StructuralValidator for EmailValidator {
    fn validate(&self, _element: &ElementNode, value: &Value) -> Result<(), ValidationFailure> {
        let text = expect_text(value)?;
        if EMAIL.is_match(text.trim()) {
            Ok(())
        } else {
            Err(ValidationFailure::new("Must be a valid email address."))
        }
    }
}

struct NumberValidator;

impl StructuralValidator for NumberValidator {
    fn validate(&self, element: &ElementNode, value: &Value) -> Result<(), ValidationFailure> {
        let ElementKind::NumberField { min, max, integer } = &element.kind else {
            return Ok(());
        };
        let number = match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|number| number.is_finite())
        .ok_or_else(|| ValidationFailure::new("Expected a number."))?;

        if *integer && number.fract() != 0.0 {
            return Err(ValidationFailure::new("Must be a whole number."));
        }
        if let Some(min) = min
            && number < *min
        {
            return Err(ValidationFailure::new(format!("Must be at least {min}.")));
        }
        if let Some(max) = max
            && number > *max
        {
            return Err(ValidationFailure::new(format!("Must be at most {max}.")));
        }
        Ok(())
    }
}

struct CheckboxValidator;

impl StructuralValidator for CheckboxValidator {
    fn validate(&self, element: &ElementNode, value: &Value) -> Result<(), ValidationFailure> {
        let checked = value
            .as_bool()
            .ok_or_else(|| ValidationFailure::new("Expected a yes/no value."))?;
        if let ElementKind::Checkbox { must_be_checked } = &element.kind
            && *must_be_checked
            && !checked
        {
            return Err(ValidationFailure::new("Must be checked."));
        }
        Ok(())
    }
}

struct SelectValidator;

impl StructuralValidator for SelectValidator {
    fn validate(&self, element: &ElementNode, value: &Value) -> Result<(), ValidationFailure> {
        let ElementKind::Select { options } = &element.kind else {
            return Ok(());
        };
        let choice = value
            .as_str()
            .ok_or_else(|| ValidationFailure::new("Expected a single choice."))?;
        check_option(options, choice)
    }
}

struct MultiSelectValidator;

impl StructuralValidator for MultiSelectValidator {
    fn validate(&self, element: &ElementNode, value: &Value) -> Result<(), ValidationFailure> {
        let ElementKind::MultiSelect {
            options,
            min_selected,
            max_selected,
        } = &element.kind
        else {
            return Ok(());
        };
        let choices = value
            .as_array()
            .ok_or_else(|| ValidationFailure::new("Expected a list of choices."))?;

        let mut seen = HashSet::new();
        for choice in choices {
            let choice = choice
                .as_str()
                .ok_or_else(|| ValidationFailure::new("Expected a list of choices."))?;
            check_option(options, choice)?;
            if !seen.insert(choice) {
                return Err(ValidationFailure::new(format!(
                    "'{choice}' was selected more than once."
                )));
            }
        }
        if let Some(min) = min_selected
            && choices.len() < *min
        {
            return Err(ValidationFailure::new(format!(
                "Select at least {min} options."
            )));
        }
        if let Some(max) = max_selected
            && choices.len() > *max
        {
            return Err(ValidationFailure::new(format!(
                "Select at most {max} options."
            )));
        }
        Ok(())
    }
}

struct DateValidator;

impl StructuralValidator for DateValidator {
    fn validate(&self, element: &ElementNode, value: &Value) -> Result<(), ValidationFailure> {
        let text = expect_text(value)?;
        let date = parse_iso_date(text.trim())
            .ok_or_else(|| ValidationFailure::new("Expected a date in YYYY-MM-DD format."))?;
        let ElementKind::DateField { min, max } = &element.kind else {
            return Ok(());
        };
        if let Some(min) = min
            && parse_iso_date(min).is_some_and(|bound| date < bound)
        {
            return Err(ValidationFailure::new(format!("Must be on or after {min}.")));
        }
        if let Some(max) = max
            && parse_iso_date(max).is_some_and(|bound| date > bound)
        {
            return Err(ValidationFailure::new(format!(
                "Must be on or before {max}."
            )));
        }
        Ok(())
    }
}

struct ReplicatingValidator;

impl StructuralValidator for ReplicatingValidator {
    fn validate(&self, element: &ElementNode, value: &Value) -> Result<(), ValidationFailure> {
        let rows = dataset_ids(value)?;
        let mut seen = HashSet::new();
        if !rows.iter().all(|row| seen.insert(row.as_str())) {
            return Err(ValidationFailure::new("Entry ids must be unique."));
        }
        let ElementKind::ReplicatingContainer {
            min_rows, max_rows, ..
        } = &element.kind
        else {
            return Ok(());
        };
        if let Some(min) = min_rows
            && rows.len() < *min
        {
            return Err(ValidationFailure::new(format!(
                "Add at least {min} entries."
            )));
        }
        if let Some(max) = max_rows
            && rows.len() > *max
        {
            return Err(ValidationFailure::new(format!("Add at most {max} entries.")));
        }
        Ok(())
    }
}
