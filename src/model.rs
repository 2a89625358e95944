//! Protocol-shaped values produced while handling a single request
//!
//! Nothing in here is cached; every value is built fresh per request and dropped
//! once the reply has been handed back to the transport.

use std::collections::BTreeMap;

use serde::{
    ser::{SerializeMap, Serializer},
    Deserialize, Serialize,
};
use serde_json::Value;

pub const OBJECT_SCHEMA_TYPE: &str = "object";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: SchemaDescriptor,
}

/// Argument schema of a tool. Always an object schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDescriptor {
    #[serde(rename = "type")]
    schema_type: &'static str,
    pub properties: BTreeMap<String, SchemaNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl SchemaDescriptor {
    pub fn object(properties: BTreeMap<String, SchemaNode>, required: Vec<String>) -> Self {
        Self {
            schema_type: OBJECT_SCHEMA_TYPE,
            properties,
            required,
        }
    }

    pub fn schema_type(&self) -> &'static str {
        self.schema_type
    }
}

/// One node of a translated JSON-Schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    String {
        pattern: Option<String>,
    },
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean,
    Array {
        items: Box<SchemaNode>,
    },
    Object {
        properties: BTreeMap<String, SchemaNode>,
        required: Vec<String>,
    },
    Enum {
        values: Vec<Value>,
    },
    AnyOf(Vec<SchemaNode>),
    Any,
}

impl SchemaNode {
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            description: None,
        }
    }

    pub fn string() -> Self {
        Self::new(SchemaKind::String { pattern: None })
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        if description.is_some() {
            self.description = description;
        }
        self
    }
}

impl SchemaKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String { .. } => "string",
            Self::Integer { .. } => "integer",
            Self::Number { .. } => "number",
            Self::Boolean => "boolean",
            Self::Array { .. } => "array",
            Self::Object { .. } => "object",
            Self::Enum { .. } => "enum",
            Self::AnyOf(_) => "anyOf",
            Self::Any => "any",
        }
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match &self.kind {
            SchemaKind::String { pattern } => {
                map.serialize_entry("type", "string")?;
                if let Some(pattern) = pattern {
                    map.serialize_entry("pattern", pattern)?;
                }
            }
            SchemaKind::Integer { minimum, maximum } => {
                map.serialize_entry("type", "integer")?;
                if let Some(minimum) = minimum {
                    map.serialize_entry("minimum", minimum)?;
                }
                if let Some(maximum) = maximum {
                    map.serialize_entry("maximum", maximum)?;
                }
            }
            SchemaKind::Number { minimum, maximum } => {
                map.serialize_entry("type", "number")?;
                if let Some(minimum) = minimum {
                    map.serialize_entry("minimum", minimum)?;
                }
                if let Some(maximum) = maximum {
                    map.serialize_entry("maximum", maximum)?;
                }
            }
            SchemaKind::Boolean => map.serialize_entry("type", "boolean")?,
            SchemaKind::Array { items } => {
                map.serialize_entry("type", "array")?;
                map.serialize_entry("items", items.as_ref())?;
            }
            SchemaKind::Object {
                properties,
                required,
            } => {
                map.serialize_entry("type", "object")?;
                map.serialize_entry("properties", properties)?;
                if !required.is_empty() {
                    map.serialize_entry("required", required)?;
                }
            }
            SchemaKind::Enum { values } => {
                // Typed only when every choice is a string.
                if values.iter().all(Value::is_string) {
                    map.serialize_entry("type", "string")?;
                }
                map.serialize_entry("enum", values)?;
            }
            SchemaKind::AnyOf(options) => map.serialize_entry("anyOf", options)?,
            SchemaKind::Any => {}
        }
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    pub mime_type: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text { text: String },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
        }
    }
}

/// Result of `tools/call`. `is_error` marks an application fault carried as content,
/// the reply itself is still a protocol success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallOutcome {
    pub content: Vec<ContentItem>,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcesListResult {
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReadResult {
    pub contents: Vec<ResourceContents>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptDescriptor {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: ContentItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptResult {
    pub description: String,
    pub messages: Vec<PromptMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_descriptor_is_always_an_object() {
        let mut properties = BTreeMap::new();
        properties.insert(
            "name".to_string(),
            SchemaNode::string().with_description(Some("Entity name".to_string())),
        );
        let schema = SchemaDescriptor::object(properties, vec![]);

        assert_eq!(schema.schema_type(), "object");
        assert_eq!(
            serde_json::to_value(&schema).expect("schema serialization"),
            json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Entity name"}
                }
            })
        );
    }

    #[test]
    fn enum_nodes_are_typed_only_for_string_choices() {
        let strings = SchemaNode::new(SchemaKind::Enum {
            values: vec![json!("on"), json!("off")],
        });
        let mixed = SchemaNode::new(SchemaKind::Enum {
            values: vec![json!("auto"), json!(3)],
        });

        assert_eq!(
            serde_json::to_value(&strings).expect("enum serialization"),
            json!({"type": "string", "enum": ["on", "off"]})
        );
        assert_eq!(
            serde_json::to_value(&mixed).expect("enum serialization"),
            json!({"enum": ["auto", 3]})
        );
    }

    #[test]
    fn tool_outcome_uses_protocol_field_names() {
        let outcome = ToolCallOutcome {
            content: vec![ContentItem::text("{}")],
            is_error: true,
        };

        assert_eq!(
            serde_json::to_value(&outcome).expect("outcome serialization"),
            json!({"content": [{"type": "text", "text": "{}"}], "isError": true})
        );
    }
}
