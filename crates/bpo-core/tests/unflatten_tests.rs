use bpo_core::parse;
use bpo_core::parse::node::SchemaNode;
use bpo_core::transform::{self, PathIndex};
use serde_json::{Value, json};

const INVOICE: &str = include_str!("fixtures/invoice.json");
const PURCHASE_ORDER: &str = include_str!("fixtures/purchase_order.json");

fn to_string(value: &Value) -> String {
    serde_json::to_string(value).unwrap()
}

#[test]
fn unflatten_injects_mutated_instruction() {
    let document = parse::from_json(INVOICE).unwrap();
    let mut flat = transform::flatten(&document).unwrap();

    let name = flat.document.properties.get_mut("customer.name").unwrap();
    assert!(name.set_instruction("Extract the full legal name of the customer"));

    let rebuilt = transform::unflatten(&flat.document, &flat.index);
    assert!(rebuilt.diagnostics.is_empty());

    let value = Value::from(rebuilt.document);
    assert_eq!(
        value["properties"]["customer"]["properties"]["name"]["instruction"],
        "Extract the full legal name of the customer"
    );

    // Everything else is untouched.
    let mut expected = Value::from(document);
    expected["properties"]["customer"]["properties"]["name"]["instruction"] =
        json!("Extract the full legal name of the customer");
    assert_eq!(to_string(&value), to_string(&expected));
}

#[test]
fn unflatten_deep_array_under_object() {
    let input = json!({
        "description": "Orders",
        "class": "order",
        "properties": {
            "order": {
                "type": "object",
                "properties": {
                    "customer": {
                        "type": "object",
                        "properties": {
                            "contacts": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "value": {"type": "string", "inferenceType": "explicit", "instruction": "Extract contact"}
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    });
    let document = parse::from_value(input.clone()).unwrap();
    let flat = transform::flatten(&document).unwrap();
    assert!(flat.index.contains("order.customer.contacts[*].value"));

    let rebuilt = transform::unflatten(&flat.document, &flat.index);
    assert_eq!(to_string(&Value::from(rebuilt.document)), to_string(&input));
}

#[test]
fn unflatten_writes_referenced_fields_into_definitions() {
    let document = parse::from_json(PURCHASE_ORDER).unwrap();
    let mut flat = transform::flatten(&document).unwrap();

    let value = flat
        .document
        .properties
        .get_mut("order.customer.contacts[*].value")
        .unwrap();
    assert!(value.set_instruction("Extract the phone number or email address"));

    let rebuilt = Value::from(transform::unflatten(&flat.document, &flat.index).document);
    assert_eq!(
        rebuilt["properties"]["order"]["properties"]["customer"],
        json!({"$ref": "#/definitions/Customer"})
    );
    assert_eq!(
        rebuilt["definitions"]["Customer"]["properties"]["contacts"]["items"]["properties"]["value"]
            ["instruction"],
        "Extract the phone number or email address"
    );
    assert_eq!(
        rebuilt["definitions"]["Customer"]["properties"]["name"],
        document.definitions().unwrap()["Customer"]["properties"]["name"]
    );
}

#[test]
fn unflatten_ref_document_round_trips() {
    let document = parse::from_json(PURCHASE_ORDER).unwrap();
    let flat = transform::flatten(&document).unwrap();
    let rebuilt = transform::unflatten(&flat.document, &flat.index);
    assert_eq!(
        to_string(&Value::from(rebuilt.document)),
        to_string(&Value::from(document))
    );
}

#[test]
fn unflatten_empty_index_is_identity() {
    let document = parse::from_json(INVOICE).unwrap();
    let rebuilt = transform::unflatten(&document, &PathIndex::new());
    assert_eq!(rebuilt.document, document);
    assert!(rebuilt.diagnostics.is_empty());
}

#[test]
fn unflatten_accepts_fields_added_after_flattening() {
    let document = parse::from_json(INVOICE).unwrap();
    let mut flat = transform::flatten(&document).unwrap();
    flat.document.properties.insert(
        "customer.address.country".to_string(),
        SchemaNode::from(json!({
            "type": "string",
            "inferenceType": "explicit",
            "instruction": "Extract the country"
        })),
    );

    let rebuilt = Value::from(transform::unflatten(&flat.document, &flat.index).document);
    let address = &rebuilt["properties"]["customer"]["properties"]["address"]["properties"];
    let keys: Vec<&String> = address.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["city", "zip", "country"]);
}

#[test]
fn unflatten_preserves_metadata_order() {
    let document = parse::from_json(INVOICE).unwrap();
    let flat = transform::flatten(&document).unwrap();
    let rebuilt = transform::unflatten(&flat.document, &flat.index);
    assert_eq!(rebuilt.document.metadata, document.metadata);
    let keys: Vec<&String> = rebuilt.document.metadata.keys().collect();
    assert_eq!(keys, ["$schema", "description", "class", "type", "definitions"]);
}
