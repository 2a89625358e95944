//! Translation of host-native parameter schemas into JSON-Schema descriptors

use std::collections::BTreeMap;

use regex::Regex;
use thiserror::Error;

use crate::host::{CustomSerializer, NativeField, NativeSchema};
use crate::model::{SchemaDescriptor, SchemaKind, SchemaNode};

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("tool arguments must be an object schema, found {found}")]
    NonObjectSchema { found: &'static str },
    #[error("no serializer available for validator {0}")]
    UnsupportedValidator(String),
    #[error("invalid pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("duplicate schema key {0}")]
    DuplicateKey(String),
}

/// Convert a tool's native argument schema into the `{type: "object", properties}` form.
pub fn translate(
    native: &NativeSchema,
    serializer: Option<&dyn CustomSerializer>,
) -> Result<SchemaDescriptor, TranslateError> {
    match convert(native, serializer)?.kind {
        SchemaKind::Object {
            properties,
            required,
        } => Ok(SchemaDescriptor::object(properties, required)),
        other => Err(TranslateError::NonObjectSchema {
            found: other.type_name(),
        }),
    }
}

pub fn convert(
    native: &NativeSchema,
    serializer: Option<&dyn CustomSerializer>,
) -> Result<SchemaNode, TranslateError> {
    let kind = match native {
        NativeSchema::Object(fields) => return convert_object(fields, serializer),
        NativeSchema::String => SchemaKind::String { pattern: None },
        NativeSchema::Integer { min, max } => SchemaKind::Integer {
            minimum: *min,
            maximum: *max,
        },
        NativeSchema::Number { min, max } => SchemaKind::Number {
            minimum: *min,
            maximum: *max,
        },
        NativeSchema::Boolean => SchemaKind::Boolean,
        NativeSchema::Any => SchemaKind::Any,
        NativeSchema::Pattern(pattern) => {
            Regex::new(pattern).map_err(|source| TranslateError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            SchemaKind::String {
                pattern: Some(pattern.clone()),
            }
        }
        NativeSchema::OneOf(choices) => SchemaKind::Enum {
            values: choices.iter().map(|choice| choice.to_json()).collect(),
        },
        NativeSchema::List(item) => SchemaKind::Array {
            items: Box::new(convert(item, serializer)?),
        },
        NativeSchema::AnyOf(options) => SchemaKind::AnyOf(
            options
                .iter()
                .map(|option| convert(option, serializer))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        NativeSchema::Custom(validator) => {
            return serializer
                .and_then(|serializer| serializer.serialize(validator))
                .ok_or_else(|| TranslateError::UnsupportedValidator(validator.clone()));
        }
    };

    Ok(SchemaNode::new(kind))
}

fn convert_object(
    fields: &[NativeField],
    serializer: Option<&dyn CustomSerializer>,
) -> Result<SchemaNode, TranslateError> {
    let mut properties = BTreeMap::new();
    let mut required = Vec::new();

    for field in fields {
        let node = convert(&field.schema, serializer)?.with_description(field.description.clone());
        if properties.insert(field.key.clone(), node).is_some() {
            return Err(TranslateError::DuplicateKey(field.key.clone()));
        }
        if field.required {
            required.push(field.key.clone());
        }
    }

    Ok(SchemaNode::new(SchemaKind::Object {
        properties,
        required,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ConstraintValue;
    use serde_json::json;

    struct NameSerializer;

    impl CustomSerializer for NameSerializer {
        fn serialize(&self, validator: &str) -> Option<SchemaNode> {
            (validator == "entity_name").then(SchemaNode::string)
        }
    }

    fn light_schema() -> NativeSchema {
        NativeSchema::Object(vec![
            NativeField::optional("name", NativeSchema::Custom("entity_name".to_string()))
                .described("Name of the device"),
            NativeField::required(
                "brightness",
                NativeSchema::Integer {
                    min: Some(0),
                    max: Some(100),
                },
            ),
            NativeField::optional(
                "mode",
                NativeSchema::OneOf(vec![
                    ConstraintValue::Text("on".to_string()),
                    ConstraintValue::Text("off".to_string()),
                ]),
            ),
            NativeField::optional("domain", NativeSchema::List(Box::new(NativeSchema::String))),
        ])
    }

    #[test]
    fn translates_object_schema_with_custom_serializer() {
        let schema = translate(&light_schema(), Some(&NameSerializer)).expect("translation");

        assert_eq!(schema.schema_type(), "object");
        assert_eq!(
            serde_json::to_value(&schema).expect("schema serialization"),
            json!({
                "type": "object",
                "properties": {
                    "brightness": {"type": "integer", "minimum": 0, "maximum": 100},
                    "domain": {"type": "array", "items": {"type": "string"}},
                    "mode": {"type": "string", "enum": ["on", "off"]},
                    "name": {"type": "string", "description": "Name of the device"}
                },
                "required": ["brightness"]
            })
        );
    }

    #[test]
    fn custom_validator_without_serializer_fails() {
        let error = translate(&light_schema(), None).expect_err("missing serializer must fail");
        assert!(matches!(error, TranslateError::UnsupportedValidator(name) if name == "entity_name"));
    }

    #[test]
    fn non_object_top_level_schema_fails() {
        let error = translate(&NativeSchema::String, None).expect_err("string schema must fail");
        assert!(matches!(
            error,
            TranslateError::NonObjectSchema { found: "string" }
        ));
    }

    #[test]
    fn invalid_pattern_fails() {
        let schema = NativeSchema::Object(vec![NativeField::required(
            "code",
            NativeSchema::Pattern("[unclosed".to_string()),
        )]);

        let error = translate(&schema, None).expect_err("bad pattern must fail");
        assert!(matches!(error, TranslateError::InvalidPattern { .. }));
    }

    #[test]
    fn duplicate_keys_fail() {
        let schema = NativeSchema::Object(vec![
            NativeField::required("name", NativeSchema::String),
            NativeField::optional("name", NativeSchema::String),
        ]);

        let error = translate(&schema, None).expect_err("duplicate key must fail");
        assert!(matches!(error, TranslateError::DuplicateKey(key) if key == "name"));
    }

    #[test]
    fn empty_object_has_no_required_list() {
        let schema = translate(&NativeSchema::Object(vec![]), None).expect("translation");
        assert_eq!(
            serde_json::to_value(&schema).expect("schema serialization"),
            json!({"type": "object", "properties": {}})
        );
    }
}
