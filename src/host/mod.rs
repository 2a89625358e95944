//! Interfaces consumed from the host application
//!
//! The bridge never owns host state. Registries, the state store, exposure policy and
//! the capability API are injected through [`HostHandle`] and queried per request.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::SchemaNode;

pub mod memory;

pub const ANY_LANGUAGE: &str = "*";

/// Opaque trace/authorization data forwarded to the host untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    pub user_id: Option<String>,
    pub origin_id: Option<String>,
}

/// Who is asking, on behalf of which assistant, and in which language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub platform: String,
    pub trace: TraceContext,
    pub assistant: String,
    pub language: Option<String>,
}

impl CallerContext {
    /// Requested language, or the wildcard when the caller did not pick one.
    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(ANY_LANGUAGE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl ConstraintValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(value) => Value::String(value.clone()),
            Self::Integer(value) => Value::from(*value),
            Self::Float(value) => Value::from(*value),
            Self::Bool(value) => Value::Bool(*value),
        }
    }
}

/// A tool's parameter schema in the host's own validation vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeSchema {
    Object(Vec<NativeField>),
    String,
    Integer { min: Option<i64>, max: Option<i64> },
    Number { min: Option<f64>, max: Option<f64> },
    Boolean,
    Any,
    Pattern(String),
    OneOf(Vec<ConstraintValue>),
    List(Box<NativeSchema>),
    AnyOf(Vec<NativeSchema>),
    /// Host-specific validator, only encodable through a [`CustomSerializer`].
    Custom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeField {
    pub key: String,
    pub required: bool,
    pub description: Option<String>,
    pub schema: NativeSchema,
}

impl NativeField {
    pub fn required(key: impl Into<String>, schema: NativeSchema) -> Self {
        Self {
            key: key.into(),
            required: true,
            description: None,
            schema,
        }
    }

    pub fn optional(key: impl Into<String>, schema: NativeSchema) -> Self {
        Self {
            key: key.into(),
            required: false,
            description: None,
            schema,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

pub trait CustomSerializer: Send + Sync {
    /// Encode a host validator, or `None` when this serializer does not know it.
    fn serialize(&self, validator: &str) -> Option<SchemaNode>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeTool {
    pub name: String,
    pub description: Option<String>,
    pub parameters: NativeSchema,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolInput {
    pub tool_name: String,
    pub tool_args: Map<String, Value>,
}

/// Failure raised by the host while serving a capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostFault {
    #[error("{0}")]
    MatchFailed(String),
    #[error("{0}")]
    ServiceValidation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Tool {0} not found")]
    ToolNotFound(String),
    #[error("API {0} not found")]
    ApiNotFound(String),
    #[error("{message}")]
    Unexpected { kind: String, message: String },
}

impl HostFault {
    pub fn kind_name(&self) -> &str {
        match self {
            Self::MatchFailed(_) => "MatchFailedError",
            Self::ServiceValidation(_) => "ServiceValidationError",
            Self::Unauthorized(_) => "Unauthorized",
            Self::ToolNotFound(_) => "ToolNotFoundError",
            Self::ApiNotFound(_) => "ApiNotFoundError",
            Self::Unexpected { kind, .. } => kind,
        }
    }
}

#[async_trait]
pub trait CapabilityApi: Send + Sync {
    /// Tools visible to the caller, in the host's order.
    fn tools(&self) -> &[NativeTool];

    fn custom_serializer(&self) -> Option<&dyn CustomSerializer> {
        None
    }

    /// Summary of the active tool set, used when rendering prompts.
    fn prompt_text(&self) -> String;

    async fn call_tool(&self, input: ToolInput) -> Result<Value, HostFault>;
}

#[async_trait]
pub trait CapabilityRegistry: Send + Sync {
    async fn get_api(&self, caller: &CallerContext) -> Result<Arc<dyn CapabilityApi>, HostFault>;
}

pub trait ExposurePolicy: Send + Sync {
    fn should_expose(&self, assistant: &str, entity_id: &str) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityEntry {
    pub entity_id: String,
    pub name: Option<String>,
    pub aliases: Vec<String>,
    pub area_id: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaEntry {
    pub area_id: String,
    pub name: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceEntry {
    pub device_id: String,
    pub name: String,
    pub area_id: Option<String>,
}

pub trait EntityRegistry: Send + Sync {
    fn entity(&self, entity_id: &str) -> Option<EntityEntry>;
}

pub trait AreaRegistry: Send + Sync {
    fn area(&self, area_id: &str) -> Option<AreaEntry>;
}

pub trait DeviceRegistry: Send + Sync {
    fn device(&self, device_id: &str) -> Option<DeviceEntry>;
}

pub trait StateStore: Send + Sync {
    /// Point-in-time copy of every entity state, in host order.
    fn snapshot(&self) -> Vec<EntityState>;
}

pub trait UserDirectory: Send + Sync {
    fn display_name(&self, user_id: &str) -> Option<String>;
}

/// Attribute value as stored by the host. Fixed-point decimals keep their textual form.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Decimal(String),
    Enum(String),
    Text(String),
    List(Vec<AttributeValue>),
    Map(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(value) => Value::Bool(*value),
            Self::Integer(value) => Value::from(*value),
            Self::Float(value) => Value::from(*value),
            Self::Decimal(value) | Self::Enum(value) | Self::Text(value) => {
                Value::String(value.clone())
            }
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    /// Serialization used for exposed attributes: enumerations, decimals and
    /// integers become strings, everything else passes through.
    pub fn to_projected_json(&self) -> Value {
        match self {
            Self::Integer(value) => Value::String(value.to_string()),
            Self::Decimal(value) | Self::Enum(value) => Value::String(value.clone()),
            other => other.to_json(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(value),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => Self::Integer(integer),
                None => Self::Float(number.as_f64().unwrap_or_default()),
            },
            Value::String(value) => Self::Text(value),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl EntityState {
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(domain, _)| domain)
    }

    pub fn object_id(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(_, object_id)| object_id)
    }

    /// Friendly name attribute, falling back to the object id with spaces.
    pub fn name(&self) -> String {
        self.attributes
            .get("friendly_name")
            .and_then(AttributeValue::as_text)
            .map(str::to_string)
            .unwrap_or_else(|| self.object_id().replace('_', " "))
    }
}

/// Every host collaborator the bridge needs, injected once and cloned per request.
#[derive(Clone)]
pub struct HostHandle {
    pub capabilities: Arc<dyn CapabilityRegistry>,
    pub exposure: Arc<dyn ExposurePolicy>,
    pub entities: Arc<dyn EntityRegistry>,
    pub areas: Arc<dyn AreaRegistry>,
    pub devices: Arc<dyn DeviceRegistry>,
    pub states: Arc<dyn StateStore>,
    pub users: Arc<dyn UserDirectory>,
}

impl HostHandle {
    /// Wire a single host value that implements every collaborator trait.
    pub fn from_host<H>(host: Arc<H>) -> Self
    where
        H: CapabilityRegistry
            + ExposurePolicy
            + EntityRegistry
            + AreaRegistry
            + DeviceRegistry
            + StateStore
            + UserDirectory
            + 'static,
    {
        Self {
            capabilities: host.clone(),
            exposure: host.clone(),
            entities: host.clone(),
            areas: host.clone(),
            devices: host.clone(),
            states: host.clone(),
            users: host,
        }
    }
}
