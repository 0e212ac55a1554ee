mod common;

use common::*;
use engine::{ElementKind, ElementResolver, ElementType, ResolveError, patch_element};

fn resolve(raw: Value) -> Result<ElementNode, ResolveError> {
    JsonElementResolver::new().resolve(&raw)
}

fn resolve_form(raw: Value) -> Result<ElementNode, ResolveError> {
    JsonElementResolver::new().resolve_form(&raw)
}

#[test]
fn resolves_nested_form() {
    let root = resolve_form(json!({
        "id": "root",
        "type": "root",
        "children": [
            { "id": "s1", "type": "step", "title": "Person", "children": [
                { "id": "name", "type": "textField", "label": "Name", "required": true },
                { "id": "hint", "type": "text", "content": "Use your legal name." }
            ]},
            { "id": "s2", "type": "step", "children": [
                { "id": "kids", "type": "replicatingContainer", "maxRows": 5, "children": [
                    { "id": "name", "type": "textField" }
                ]}
            ]}
        ]
    }))
    .expect("form should resolve");

    assert_eq!(root.children().len(), 2);
    let kids = root.find("kids").expect("kids should exist");
    assert!(matches!(
        kids.kind,
        ElementKind::ReplicatingContainer { max_rows: Some(5), .. }
    ));
    assert_eq!(
        root.find("hint").map(ElementNode::element_type),
        Some(ElementType::Text)
    );
}

#[test]
fn form_must_start_with_root() {
    assert_eq!(
        resolve_form(json!({ "id": "s", "type": "step" })),
        Err(ResolveError::MissingRoot(ElementType::Step))
    );
    assert_eq!(
        resolve_form(json!({ "id": "r", "type": "root", "children": [
            { "id": "inner", "type": "root" }
        ]})),
        Err(ResolveError::NestedRoot("inner".to_string()))
    );
}

#[test]
fn rejects_non_objects_and_unknown_types() {
    assert_eq!(resolve(json!(["x"])), Err(ResolveError::NotAnObject));
    assert!(matches!(
        resolve(json!({ "id": "x", "type": "hologram" })),
        Err(ResolveError::Malformed(_))
    ));
    assert!(matches!(
        resolve(json!({ "type": "textField" })),
        Err(ResolveError::Malformed(_))
    ));
}

#[test]
fn ids_must_be_non_empty_without_whitespace() {
    assert_eq!(
        resolve(json!({ "id": "", "type": "spacer" })),
        Err(ResolveError::EmptyId)
    );
    assert_eq!(
        resolve(json!({ "id": "first name", "type": "textField" })),
        Err(ResolveError::InvalidId("first name".to_string()))
    );
}

#[test]
fn duplicate_ids_are_rejected_per_scope() {
    let duplicate_across_steps = json!({ "id": "root", "type": "root", "children": [
        { "id": "s1", "type": "step", "children": [{ "id": "x", "type": "textField" }] },
        { "id": "s2", "type": "step", "children": [{ "id": "x", "type": "textField" }] }
    ]});
    assert_eq!(
        resolve_form(duplicate_across_steps),
        Err(ResolveError::DuplicateId("x".to_string()))
    );

    let template_reuses_outer_id = json!({ "id": "root", "type": "root", "children": [
        { "id": "x", "type": "textField" },
        { "id": "r", "type": "replicatingContainer", "children": [
            { "id": "x", "type": "textField" }
        ]}
    ]});
    assert!(resolve_form(template_reuses_outer_id).is_ok());
}

#[test]
fn ids_cannot_shadow_replicated_rows() {
    let shadowing = json!({ "id": "root", "type": "root", "children": [
        { "id": "s", "type": "step", "children": [
            { "id": "items", "type": "replicatingContainer", "children": [
                { "id": "qty", "type": "numberField" }
            ]}
        ]},
        { "id": "items_a_qty", "type": "numberField" }
    ]});
    assert_eq!(
        resolve_form(shadowing),
        Err(ResolveError::AmbiguousId {
            id: "items_a_qty".to_string(),
            container: "items".to_string(),
        })
    );

    let nested = json!({ "id": "root", "type": "root", "children": [
        { "id": "r", "type": "replicatingContainer", "children": [
            { "id": "inner", "type": "replicatingContainer", "children": [] },
            { "id": "inner_1_x", "type": "textField" }
        ]}
    ]});
    assert!(matches!(
        resolve_form(nested),
        Err(ResolveError::AmbiguousId { .. })
    ));

    let unrelated = json!({ "id": "root", "type": "root", "children": [
        { "id": "items", "type": "replicatingContainer", "children": [] },
        { "id": "itemsTotal", "type": "numberField" }
    ]});
    assert!(resolve_form(unrelated).is_ok());
}

#[test]
fn input_attributes_only_on_input_kinds() {
    assert_eq!(
        resolve(json!({ "id": "g", "type": "group", "required": true })),
        Err(ResolveError::InputOnlyAttribute {
            id: "g".to_string(),
            element_type: ElementType::Group,
            attribute: "required",
        })
    );
    assert_eq!(
        resolve(json!({ "id": "t", "type": "text", "value": { "script": "x" } })),
        Err(ResolveError::InputOnlyAttribute {
            id: "t".to_string(),
            element_type: ElementType::Text,
            attribute: "value",
        })
    );
    assert!(resolve(json!({ "id": "t", "type": "text", "override": { "script": "x" } })).is_ok());
}

#[test]
fn kind_attributes_are_checked() {
    assert!(matches!(
        resolve(json!({ "id": "x", "type": "textField", "pattern": "(" })),
        Err(ResolveError::InvalidPattern { .. })
    ));
    assert_eq!(
        resolve(json!({ "id": "n", "type": "numberField", "min": 5, "max": 1 })),
        Err(ResolveError::InvalidBounds {
            id: "n".to_string(),
            bounds: "min/max",
        })
    );
    assert_eq!(
        resolve(json!({ "id": "d", "type": "dateField", "min": "2024-02-30" })),
        Err(ResolveError::InvalidDate {
            id: "d".to_string(),
            value: "2024-02-30".to_string(),
        })
    );
    assert_eq!(
        resolve(json!({ "id": "s", "type": "select", "options": [
            { "value": "a" }, { "value": "a" }
        ]})),
        Err(ResolveError::DuplicateOption {
            id: "s".to_string(),
            value: "a".to_string(),
        })
    );
    assert_eq!(
        resolve(json!({ "id": "r", "type": "replicatingContainer", "minRows": 3, "maxRows": 1 }))
            .map_err(|err| err.to_string()),
        Err("element 'r' has minRows/maxRows out of order".to_string())
    );
}

#[test]
fn patch_merges_into_original_definition() {
    let original = resolve(json!({
        "id": "nick",
        "type": "textField",
        "label": "Nick",
        "maxLength": 3,
        "validation": { "script": "check()" }
    }))
    .expect("element should resolve");
    let patch = json!({ "maxLength": null, "label": "Nickname", "required": true });

    let patched = patch_element(
        &JsonElementResolver::new(),
        &original,
        patch.as_object().expect("patch should be an object"),
    )
    .expect("patch should apply");

    assert_eq!(patched.label.as_deref(), Some("Nickname"));
    assert!(patched.required);
    assert_eq!(patched.validation, original.validation);
    assert!(matches!(
        patched.kind,
        ElementKind::TextField { max_length: None, .. }
    ));
}

#[test]
fn patch_cannot_change_identity() {
    let original =
        resolve(json!({ "id": "x", "type": "textField" })).expect("element should resolve");
    let resolver = JsonElementResolver::new();

    let renamed = json!({ "id": "y" });
    assert_eq!(
        patch_element(&resolver, &original, renamed.as_object().expect("object")),
        Err(ResolveError::IdentityChanged {
            id: "x".to_string(),
            attribute: "id",
        })
    );

    let retyped = json!({ "type": "emailField" });
    assert_eq!(
        patch_element(&resolver, &original, retyped.as_object().expect("object")),
        Err(ResolveError::IdentityChanged {
            id: "x".to_string(),
            attribute: "type",
        })
    );
}

#[test]
fn definitions_round_trip_through_json() {
    let raw = json!({
        "id": "age",
        "type": "numberField",
        "label": "Age",
        "min": 0.0,
        "integer": true,
        "required": true,
        "visibility": { "expression": { "op": "not", "operand": { "op": "field", "id": "anonymous" } } }
    });
    let element = resolve(raw.clone()).expect("element should resolve");
    assert_eq!(serde_json::to_value(&element).expect("element should serialize"), raw);
}
