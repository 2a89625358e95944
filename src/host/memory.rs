//! In-memory host used by the standalone server and the test suite
//!
//! Loads areas, devices, users and entities from a JSON fixture and serves a small
//! intent-style tool set (`HassTurnOn`, `HassTurnOff`, `GetLiveContext`).

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::host::{
    AreaEntry, AreaRegistry, AttributeValue, CallerContext, CapabilityApi, CapabilityRegistry,
    CustomSerializer, DeviceEntry, DeviceRegistry, EntityEntry, EntityRegistry, EntityState,
    ExposurePolicy, HostFault, NativeField, NativeSchema, NativeTool, StateStore, ToolInput,
    UserDirectory,
};
use crate::model::SchemaNode;

const SWITCHABLE_DOMAINS: [&str; 6] = [
    "light",
    "switch",
    "fan",
    "input_boolean",
    "media_player",
    "climate",
];
const NEVER_TARGETED_DOMAINS: [&str; 1] = ["script"];

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read host fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse host fixture: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostFixture {
    pub users: BTreeMap<String, String>,
    pub areas: Vec<AreaFixture>,
    pub devices: Vec<DeviceFixture>,
    pub entities: Vec<EntityFixture>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AreaFixture {
    pub area_id: String,
    pub name: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceFixture {
    pub device_id: String,
    pub name: String,
    pub area_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntityFixture {
    pub entity_id: String,
    pub state: String,
    pub name: Option<String>,
    pub aliases: Vec<String>,
    pub area_id: Option<String>,
    pub device_id: Option<String>,
    pub attributes: Map<String, Value>,
    /// Assistants this entity is exposed to.
    pub expose_to: Vec<String>,
}

struct HostData {
    users: BTreeMap<String, String>,
    areas: BTreeMap<String, AreaEntry>,
    devices: BTreeMap<String, DeviceEntry>,
    entities: BTreeMap<String, EntityEntry>,
    exposure: RwLock<BTreeMap<String, Vec<String>>>,
    states: RwLock<Vec<EntityState>>,
}

impl HostData {
    fn is_exposed(&self, assistant: &str, entity_id: &str) -> bool {
        self.exposure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .is_some_and(|assistants| assistants.iter().any(|name| name == assistant))
    }

    fn snapshot(&self) -> Vec<EntityState> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn names_of(&self, state: &EntityState) -> Vec<String> {
        let entry = self.entities.get(&state.entity_id);
        let mut names = vec![entry
            .and_then(|entry| entry.name.clone())
            .unwrap_or_else(|| state.name())];
        if let Some(entry) = entry {
            names.extend(entry.aliases.iter().cloned());
        }
        names
    }

    fn area_of(&self, entity_id: &str) -> Option<&AreaEntry> {
        let entry = self.entities.get(entity_id)?;
        entry
            .area_id
            .as_ref()
            .and_then(|area_id| self.areas.get(area_id))
            .or_else(|| {
                entry
                    .device_id
                    .as_ref()
                    .and_then(|device_id| self.devices.get(device_id))
                    .and_then(|device| device.area_id.as_ref())
                    .and_then(|area_id| self.areas.get(area_id))
            })
    }

    fn targetable(&self, assistant: &str) -> Vec<EntityState> {
        self.snapshot()
            .into_iter()
            .filter(|state| !NEVER_TARGETED_DOMAINS.contains(&state.domain()))
            .filter(|state| self.is_exposed(assistant, &state.entity_id))
            .collect()
    }
}

/// Fixture-backed host implementing every collaborator trait.
#[derive(Clone)]
pub struct InMemoryHost {
    data: Arc<HostData>,
}

impl InMemoryHost {
    pub fn from_fixture(fixture: HostFixture) -> Self {
        let areas = fixture
            .areas
            .into_iter()
            .map(|area| {
                (
                    area.area_id.clone(),
                    AreaEntry {
                        area_id: area.area_id,
                        name: area.name,
                        aliases: area.aliases,
                    },
                )
            })
            .collect();
        let devices = fixture
            .devices
            .into_iter()
            .map(|device| {
                (
                    device.device_id.clone(),
                    DeviceEntry {
                        device_id: device.device_id,
                        name: device.name,
                        area_id: device.area_id,
                    },
                )
            })
            .collect();

        let mut entities = BTreeMap::new();
        let mut exposure = BTreeMap::new();
        let mut states = Vec::with_capacity(fixture.entities.len());
        for entity in fixture.entities {
            entities.insert(
                entity.entity_id.clone(),
                EntityEntry {
                    entity_id: entity.entity_id.clone(),
                    name: entity.name,
                    aliases: entity.aliases,
                    area_id: entity.area_id,
                    device_id: entity.device_id,
                },
            );
            exposure.insert(entity.entity_id.clone(), entity.expose_to);
            states.push(EntityState {
                entity_id: entity.entity_id,
                state: entity.state,
                attributes: entity
                    .attributes
                    .into_iter()
                    .map(|(key, value)| (key, AttributeValue::from(value)))
                    .collect(),
            });
        }

        Self {
            data: Arc::new(HostData {
                users: fixture.users,
                areas,
                devices,
                entities,
                exposure: RwLock::new(exposure),
                states: RwLock::new(states),
            }),
        }
    }

    pub fn from_fixture_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let fixture: HostFixture = serde_json::from_str(&raw)?;
        info!(
            path = %path.as_ref().display(),
            entities = fixture.entities.len(),
            areas = fixture.areas.len(),
            "loaded host fixture"
        );
        Ok(Self::from_fixture(fixture))
    }

    /// Replace an entity's state and attributes, as a device report would.
    pub fn set_state(
        &self,
        entity_id: &str,
        state: &str,
        attributes: BTreeMap<String, AttributeValue>,
    ) {
        let mut states = self
            .data
            .states
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match states.iter_mut().find(|current| current.entity_id == entity_id) {
            Some(current) => {
                current.state = state.to_string();
                current.attributes = attributes;
            }
            None => states.push(EntityState {
                entity_id: entity_id.to_string(),
                state: state.to_string(),
                attributes,
            }),
        }
    }

    /// Replace the set of assistants an entity is exposed to.
    pub fn set_exposed(&self, entity_id: &str, assistants: Vec<String>) {
        self.data
            .exposure
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity_id.to_string(), assistants);
    }
}

#[async_trait]
impl CapabilityRegistry for InMemoryHost {
    async fn get_api(&self, caller: &CallerContext) -> Result<Arc<dyn CapabilityApi>, HostFault> {
        Ok(Arc::new(AssistApi::new(
            self.data.clone(),
            caller.assistant.clone(),
        )))
    }
}

impl ExposurePolicy for InMemoryHost {
    fn should_expose(&self, assistant: &str, entity_id: &str) -> bool {
        self.data.is_exposed(assistant, entity_id)
    }
}

impl EntityRegistry for InMemoryHost {
    fn entity(&self, entity_id: &str) -> Option<EntityEntry> {
        self.data.entities.get(entity_id).cloned()
    }
}

impl AreaRegistry for InMemoryHost {
    fn area(&self, area_id: &str) -> Option<AreaEntry> {
        self.data.areas.get(area_id).cloned()
    }
}

impl DeviceRegistry for InMemoryHost {
    fn device(&self, device_id: &str) -> Option<DeviceEntry> {
        self.data.devices.get(device_id).cloned()
    }
}

impl StateStore for InMemoryHost {
    fn snapshot(&self) -> Vec<EntityState> {
        self.data.snapshot()
    }
}

impl UserDirectory for InMemoryHost {
    fn display_name(&self, user_id: &str) -> Option<String> {
        self.data.users.get(user_id).cloned()
    }
}

struct TargetQuery {
    name: Option<String>,
    area: Option<String>,
    domains: Vec<String>,
}

impl TargetQuery {
    fn from_args(args: &Map<String, Value>) -> Result<Self, HostFault> {
        let text = |key: &str| -> Result<Option<String>, HostFault> {
            match args.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(value)) if value.trim().is_empty() => Ok(None),
                Some(Value::String(value)) => Ok(Some(value.trim().to_string())),
                Some(_) => Err(HostFault::ServiceValidation(format!(
                    "{key} must be a string"
                ))),
            }
        };

        let domains = match args.get("domain") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        HostFault::ServiceValidation("domain must be a list of strings".to_string())
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(HostFault::ServiceValidation(
                    "domain must be a list of strings".to_string(),
                ))
            }
        };

        let query = Self {
            name: text("name")?,
            area: text("area")?,
            domains,
        };
        if query.name.is_none() && query.area.is_none() {
            return Err(HostFault::ServiceValidation(
                "name or area is required".to_string(),
            ));
        }
        Ok(query)
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(format!("name={name}"));
        }
        if let Some(area) = &self.area {
            parts.push(format!("area={area}"));
        }
        if !self.domains.is_empty() {
            parts.push(format!("domain={}", self.domains.join("|")));
        }
        parts.join(", ")
    }
}

/// The tool set served by [`InMemoryHost`] for one assistant.
pub struct AssistApi {
    data: Arc<HostData>,
    assistant: String,
    tools: Vec<NativeTool>,
}

impl AssistApi {
    fn new(data: Arc<HostData>, assistant: String) -> Self {
        Self {
            data,
            assistant,
            tools: assist_tools(),
        }
    }

    fn resolve_targets(&self, query: &TargetQuery) -> Result<Vec<EntityState>, HostFault> {
        let matches_text = |candidate: &str, wanted: &str| candidate.eq_ignore_ascii_case(wanted);

        let matched: Vec<EntityState> = self
            .data
            .targetable(&self.assistant)
            .into_iter()
            .filter(|state| {
                query.domains.is_empty() || query.domains.iter().any(|domain| domain == state.domain())
            })
            .filter(|state| {
                query.name.as_deref().map_or(true, |wanted| {
                    self.data
                        .names_of(state)
                        .iter()
                        .any(|name| matches_text(name, wanted))
                })
            })
            .filter(|state| {
                query.area.as_deref().map_or(true, |wanted| {
                    self.data.area_of(&state.entity_id).is_some_and(|area| {
                        matches_text(&area.name, wanted)
                            || area.aliases.iter().any(|alias| matches_text(alias, wanted))
                    })
                })
            })
            .collect();

        if matched.is_empty() {
            return Err(HostFault::MatchFailed(format!(
                "no exposed entity matched {}",
                query.describe()
            )));
        }
        if query.name.is_some() && query.area.is_none() && matched.len() > 1 {
            return Err(HostFault::MatchFailed(format!(
                "{} entities matched {}, add an area to disambiguate",
                matched.len(),
                query.describe()
            )));
        }
        Ok(matched)
    }

    fn switch(&self, args: &Map<String, Value>, target_state: &str) -> Result<Value, HostFault> {
        let query = TargetQuery::from_args(args)?;
        let targets = self.resolve_targets(&query)?;

        if let Some(unsupported) = targets
            .iter()
            .find(|state| !SWITCHABLE_DOMAINS.contains(&state.domain()))
        {
            return Err(HostFault::ServiceValidation(format!(
                "{} does not support being turned {target_state}",
                unsupported.entity_id
            )));
        }

        let mut states = self
            .data
            .states
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut success = Vec::with_capacity(targets.len());
        for target in &targets {
            if let Some(current) = states
                .iter_mut()
                .find(|current| current.entity_id == target.entity_id)
            {
                current.state = target_state.to_string();
                success.push(json!({
                    "name": current.name(),
                    "type": "entity",
                    "id": current.entity_id,
                }));
            }
        }
        debug!(target_state, targets = success.len(), "switched entities");

        Ok(json!({
            "response_type": "action_done",
            "data": {
                "success": success,
                "failed": [],
            },
        }))
    }

    fn live_context(&self) -> Value {
        let entities: Vec<Value> = self
            .data
            .targetable(&self.assistant)
            .iter()
            .map(|state| {
                let mut entry = json!({
                    "names": self.data.names_of(state).join(", "),
                    "domain": state.domain(),
                    "state": state.state,
                });
                if let Some(area) = self.data.area_of(&state.entity_id) {
                    entry["areas"] = Value::String(area.name.clone());
                }
                entry
            })
            .collect();

        json!({ "success": true, "result": entities })
    }
}

#[async_trait]
impl CapabilityApi for AssistApi {
    fn tools(&self) -> &[NativeTool] {
        &self.tools
    }

    fn custom_serializer(&self) -> Option<&dyn CustomSerializer> {
        Some(self)
    }

    fn prompt_text(&self) -> String {
        let names: Vec<&str> = self.tools.iter().map(|tool| tool.name.as_str()).collect();
        format!(
            "When controlling a device, call HassTurnOn or HassTurnOff with its name, its area, or both. \
             Call GetLiveContext before answering questions about the current state of devices. \
             Available tools: {}.",
            names.join(", ")
        )
    }

    async fn call_tool(&self, input: ToolInput) -> Result<Value, HostFault> {
        match input.tool_name.as_str() {
            "HassTurnOn" => self.switch(&input.tool_args, "on"),
            "HassTurnOff" => self.switch(&input.tool_args, "off"),
            "GetLiveContext" => Ok(self.live_context()),
            _ => Err(HostFault::ToolNotFound(input.tool_name)),
        }
    }
}

impl CustomSerializer for AssistApi {
    fn serialize(&self, validator: &str) -> Option<SchemaNode> {
        match validator {
            "entity_name" | "area_name" => Some(SchemaNode::string()),
            _ => None,
        }
    }
}

fn target_schema() -> NativeSchema {
    NativeSchema::Object(vec![
        NativeField::optional("name", NativeSchema::Custom("entity_name".to_string()))
            .described("Name of the device or entity"),
        NativeField::optional("area", NativeSchema::Custom("area_name".to_string()))
            .described("Name of the area"),
        NativeField::optional("domain", NativeSchema::List(Box::new(NativeSchema::String)))
            .described("Restrict matches to these entity domains"),
    ])
}

fn assist_tools() -> Vec<NativeTool> {
    vec![
        NativeTool {
            name: "HassTurnOn".to_string(),
            description: Some("Turns on a device or entity".to_string()),
            parameters: target_schema(),
        },
        NativeTool {
            name: "HassTurnOff".to_string(),
            description: Some("Turns off a device or entity".to_string()),
            parameters: target_schema(),
        },
        NativeTool {
            name: "GetLiveContext".to_string(),
            description: Some(
                "Provides real-time information about the current state of exposed entities"
                    .to_string(),
            ),
            parameters: NativeSchema::Object(vec![]),
        },
    ]
}
