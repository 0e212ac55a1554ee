mod common;

use common::*;
use engine::{ValidationFailure, ValidatorRegistry};

fn element(raw: Value) -> ElementNode {
    serde_json::from_value(raw).expect("element should deserialize")
}

fn check(raw: Value, value: Value) -> Result<(), String> {
    let element = element(raw);
    let value = (!value.is_null()).then_some(value);
    ValidatorRegistry::with_defaults()
        .validate(&element, value.as_ref())
        .map_err(|failure: ValidationFailure| failure.message().to_string())
}

#[test]
fn required_rejects_absent_and_blank_values() {
    let required = json!({ "id": "x", "type": "textField", "required": true });
    assert_eq!(check(required.clone(), Value::Null), Err("This field is required.".to_string()));
    assert_eq!(check(required.clone(), json!("  ")), Err("This field is required.".to_string()));
    assert_eq!(check(required, json!("ok")), Ok(()));

    let optional = json!({ "id": "x", "type": "textField", "minLength": 3 });
    assert_eq!(check(optional.clone(), Value::Null), Ok(()));
    assert_eq!(check(optional, json!("")), Ok(()));
}

#[test]
fn text_lengths_count_characters() {
    let field = json!({ "id": "x", "type": "textField", "minLength": 2, "maxLength": 4 });
    assert_eq!(
        check(field.clone(), json!("a")),
        Err("Must be at least 2 characters long.".to_string())
    );
    assert_eq!(check(field.clone(), json!("äöüß")), Ok(()));
    assert_eq!(
        check(field.clone(), json!("abcde")),
        Err("Must be at most 4 characters long.".to_string())
    );
    assert_eq!(check(field, json!(12)), Err("Expected a text value.".to_string()));

    let area = json!({ "id": "x", "type": "textArea", "maxLength": 5 });
    assert_eq!(
        check(area, json!("too long")),
        Err("Must be at most 5 characters long.".to_string())
    );
}

#[test]
fn pattern_must_match_whole_text() {
    let field = json!({ "id": "zip", "type": "textField", "pattern": "[0-9]{5}" });
    assert_eq!(check(field.clone(), json!("12345")), Ok(()));
    assert_eq!(
        check(field, json!("123456")),
        Err("Does not match the required format.".to_string())
    );
}

#[test]
fn email_shape() {
    let field = json!({ "id": "mail", "type": "emailField" });
    assert_eq!(check(field.clone(), json!("ada@example.org")), Ok(()));
    for bad in ["ada", "ada@example", "a da@example.org", "@example.org"] {
        assert_eq!(
            check(field.clone(), json!(bad)),
            Err("Must be a valid email address.".to_string()),
            "{bad}"
        );
    }
}

#[test]
fn number_bounds_and_integers() {
    let field = json!({ "id": "n", "type": "numberField", "min": 1, "max": 10, "integer": true });
    assert_eq!(check(field.clone(), json!(5)), Ok(()));
    assert_eq!(check(field.clone(), json!("7")), Ok(()));
    assert_eq!(check(field.clone(), json!(2.5)), Err("Must be a whole number.".to_string()));
    assert_eq!(check(field.clone(), json!(0)), Err("Must be at least 1.".to_string()));
    assert_eq!(check(field.clone(), json!(11)), Err("Must be at most 10.".to_string()));
    assert_eq!(check(field, json!("seven")), Err("Expected a number.".to_string()));
}

#[test]
fn checkbox_must_be_checked() {
    let field = json!({ "id": "terms", "type": "checkbox", "mustBeChecked": true });
    assert_eq!(check(field.clone(), json!(true)), Ok(()));
    assert_eq!(check(field.clone(), json!(false)), Err("Must be checked.".to_string()));
    assert_eq!(check(field, json!("yes")), Err("Expected a yes/no value.".to_string()));

    let optional = json!({ "id": "news", "type": "checkbox" });
    assert_eq!(check(optional, json!(false)), Ok(()));
}

#[test]
fn select_accepts_declared_options_only() {
    let field = json!({ "id": "c", "type": "select", "options": [
        { "value": "de", "label": "Germany" }, { "value": "at" }
    ]});
    assert_eq!(check(field.clone(), json!("at")), Ok(()));
    assert_eq!(
        check(field.clone(), json!("ch")),
        Err("'ch' is not one of the available options.".to_string())
    );
    assert_eq!(check(field, json!(["de"])), Err("Expected a single choice.".to_string()));
}

#[test]
fn multi_select_checks_options_duplicates_and_bounds() {
    let field = json!({
        "id": "m",
        "type": "multiSelect",
        "options": [{ "value": "a" }, { "value": "b" }, { "value": "c" }],
        "minSelected": 2,
        "maxSelected": 2
    });
    assert_eq!(check(field.clone(), json!(["a", "c"])), Ok(()));
    assert_eq!(
        check(field.clone(), json!(["a", "a"])),
        Err("'a' was selected more than once.".to_string())
    );
    assert_eq!(
        check(field.clone(), json!(["a"])),
        Err("Select at least 2 options.".to_string())
    );
    assert_eq!(
        check(field.clone(), json!(["a", "b", "c"])),
        Err("Select at most 2 options.".to_string())
    );
    assert_eq!(
        check(field, json!(["z", "a"])),
        Err("'z' is not one of the available options.".to_string())
    );
}

#[test]
fn dates_are_calendar_checked_and_bounded() {
    let field = json!({ "id": "d", "type": "dateField", "min": "2024-01-01", "max": "2024-12-31" });
    assert_eq!(check(field.clone(), json!("2024-02-29")), Ok(()));
    assert_eq!(
        check(field.clone(), json!("2024-02-30")),
        Err("Expected a date in YYYY-MM-DD format.".to_string())
    );
    assert_eq!(
        check(field.clone(), json!("2023-12-31")),
        Err("Must be on or after 2024-01-01.".to_string())
    );
    assert_eq!(
        check(field, json!("2025-01-01")),
        Err("Must be on or before 2024-12-31.".to_string())
    );
}

#[test]
fn replicating_rows_are_unique_and_bounded() {
    let field = json!({
        "id": "r",
        "type": "replicatingContainer",
        "minRows": 1,
        "maxRows": 2,
        "children": []
    });
    assert_eq!(check(field.clone(), json!(["a", 2])), Ok(()));
    assert_eq!(
        check(field.clone(), json!(["a", "a"])),
        Err("Entry ids must be unique.".to_string())
    );
    assert_eq!(
        check(field.clone(), json!(["a", "b", "c"])),
        Err("Add at most 2 entries.".to_string())
    );
    assert_eq!(
        check(field, json!({ "a": 1 })),
        Err("Expected a list of entries.".to_string())
    );

    let required = json!({ "id": "r", "type": "replicatingContainer", "required": true });
    assert_eq!(check(required, json!([])), Err("This field is required.".to_string()));
}

#[test]
fn min_rows_applies_to_non_empty_lists() {
    let field = json!({ "id": "r", "type": "replicatingContainer", "minRows": 2 });
    assert_eq!(check(field.clone(), json!(["a"])), Err("Add at least 2 entries.".to_string()));
    // an empty, optional container is simply unanswered
    assert_eq!(check(field, json!([])), Ok(()));
}

#[test]
fn registry_without_validators_only_checks_required() {
    let registry = ValidatorRegistry::empty();
    let field = element(json!({ "id": "n", "type": "numberField", "required": true }));
    assert!(!registry.contains(engine::ElementType::NumberField));
    assert!(registry.validate(&field, Some(&json!("not a number"))).is_ok());
    assert_eq!(
        registry.validate(&field, None),
        Err(ValidationFailure::new("This field is required."))
    );
}
