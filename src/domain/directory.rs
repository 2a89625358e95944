//! Live view of the tools and entities exposed to one caller
//!
//! Everything is recomputed from host state on each call. Entity listings take a
//! single state snapshot so one request never mixes two points in time.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::addressing::{self, AddressError};
use crate::domain::schema::{translate, TranslateError};
use crate::domain::utils::{
    is_excluded_domain, join_names, project_attributes, INTERESTING_ATTRIBUTES, RESOURCE_MIME_TYPE,
};
use crate::host::{
    CallerContext, CapabilityApi, EntityEntry, EntityState, HostFault, HostHandle,
};
use crate::model::{ResourceContents, ResourceDescriptor, ToolDescriptor};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Host(#[from] HostFault),
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("duplicate tool name {0}")]
    DuplicateTool(String),
    #[error("resource {0} not found")]
    NotFound(String),
}

/// An entity that passed exposure, projected into its client-facing form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExposedEntity {
    pub entity_id: String,
    pub names: String,
    pub domain: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub areas: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, Value>>,
}

impl ExposedEntity {
    pub fn uri(&self) -> String {
        addressing::encode(&self.entity_id)
    }

    pub fn descriptor(&self) -> ResourceDescriptor {
        let description = match &self.areas {
            Some(areas) => format!("{} in {}", self.domain, areas),
            None => self.domain.clone(),
        };

        ResourceDescriptor {
            uri: self.uri(),
            name: self.names.clone(),
            description,
            mime_type: Some(RESOURCE_MIME_TYPE.to_string()),
        }
    }

    pub fn contents(&self) -> Result<ResourceContents, serde_json::Error> {
        Ok(ResourceContents {
            uri: self.uri(),
            mime_type: Some(RESOURCE_MIME_TYPE.to_string()),
            text: serde_json::to_string(self)?,
        })
    }
}

pub struct CapabilityDirectory<'a> {
    host: &'a HostHandle,
    caller: &'a CallerContext,
}

impl<'a> CapabilityDirectory<'a> {
    pub fn new(host: &'a HostHandle, caller: &'a CallerContext) -> Self {
        Self { host, caller }
    }

    pub async fn api(&self) -> Result<Arc<dyn CapabilityApi>, HostFault> {
        self.host.capabilities.get_api(self.caller).await
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, DirectoryError> {
        let api = self.api().await?;
        describe_tools(api.as_ref())
    }

    pub fn list_resources(&self) -> Vec<ResourceDescriptor> {
        self.exposed_entities()
            .iter()
            .map(ExposedEntity::descriptor)
            .collect()
    }

    /// Look up an entity in the current exposed set. Exposure is re-evaluated here.
    pub fn get_resource(&self, host_id: &str) -> Result<ExposedEntity, DirectoryError> {
        self.exposed_entities()
            .into_iter()
            .find(|entity| entity.entity_id == host_id)
            .ok_or_else(|| DirectoryError::NotFound(host_id.to_string()))
    }

    pub fn resource_by_uri(&self, uri: &str) -> Result<ExposedEntity, DirectoryError> {
        let host_id = addressing::decode(uri)?;
        self.get_resource(&host_id)
    }

    pub fn exposed_entities(&self) -> Vec<ExposedEntity> {
        let snapshot = self.host.states.snapshot();
        let total = snapshot.len();

        let exposed: Vec<ExposedEntity> = snapshot
            .into_iter()
            .filter(|state| !is_excluded_domain(state.domain()))
            .filter(|state| {
                self.host
                    .exposure
                    .should_expose(&self.caller.assistant, &state.entity_id)
            })
            .map(|state| self.describe(state))
            .collect();

        debug!(
            assistant = %self.caller.assistant,
            total,
            exposed = exposed.len(),
            "computed exposed entities"
        );
        exposed
    }

    /// Display name of the calling user, when the trace context names one.
    pub fn caller_display_name(&self) -> Option<String> {
        self.caller
            .trace
            .user_id
            .as_deref()
            .and_then(|user_id| self.host.users.display_name(user_id))
    }

    fn describe(&self, state: EntityState) -> ExposedEntity {
        let entry = self.host.entities.entity(&state.entity_id);
        let primary = entry
            .as_ref()
            .and_then(|entry| entry.name.clone())
            .unwrap_or_else(|| state.name());
        let aliases = entry
            .as_ref()
            .map(|entry| entry.aliases.as_slice())
            .unwrap_or_default();

        ExposedEntity {
            names: join_names(&primary, aliases),
            domain: state.domain().to_string(),
            areas: entry.as_ref().and_then(|entry| self.location_label(entry)),
            attributes: project_attributes(&state.attributes, &INTERESTING_ATTRIBUTES),
            state: state.state,
            entity_id: state.entity_id,
        }
    }

    /// Direct area first, then the owning device's area.
    fn location_label(&self, entry: &EntityEntry) -> Option<String> {
        let area = entry
            .area_id
            .as_deref()
            .and_then(|area_id| self.host.areas.area(area_id))
            .or_else(|| {
                entry
                    .device_id
                    .as_deref()
                    .and_then(|device_id| self.host.devices.device(device_id))
                    .and_then(|device| device.area_id)
                    .and_then(|area_id| self.host.areas.area(&area_id))
            })?;

        Some(join_names(&area.name, &area.aliases))
    }
}

/// Translate every tool of an API, keeping the host's order.
pub fn describe_tools(api: &dyn CapabilityApi) -> Result<Vec<ToolDescriptor>, DirectoryError> {
    let serializer = api.custom_serializer();
    let mut seen = HashSet::new();

    api.tools()
        .iter()
        .map(|tool| {
            if !seen.insert(tool.name.as_str()) {
                return Err(DirectoryError::DuplicateTool(tool.name.clone()));
            }
            Ok(ToolDescriptor {
                name: tool.name.clone(),
                description: tool.description.clone().unwrap_or_default(),
                input_schema: translate(&tool.parameters, serializer)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{AreaFixture, DeviceFixture, EntityFixture, HostFixture, InMemoryHost};
    use crate::host::TraceContext;
    use serde_json::json;

    fn caller() -> CallerContext {
        CallerContext {
            platform: "test".to_string(),
            trace: TraceContext {
                user_id: Some("user-1".to_string()),
                origin_id: None,
            },
            assistant: "conversation".to_string(),
            language: None,
        }
    }

    fn entity(entity_id: &str, state: &str) -> EntityFixture {
        EntityFixture {
            entity_id: entity_id.to_string(),
            state: state.to_string(),
            expose_to: vec!["conversation".to_string()],
            ..EntityFixture::default()
        }
    }

    fn host() -> HostHandle {
        let fixture = HostFixture {
            areas: vec![
                AreaFixture {
                    area_id: "kitchen".to_string(),
                    name: "Kitchen".to_string(),
                    aliases: vec!["Cocina".to_string()],
                },
                AreaFixture {
                    area_id: "garage".to_string(),
                    name: "Garage".to_string(),
                    aliases: vec![],
                },
            ],
            devices: vec![DeviceFixture {
                device_id: "hub".to_string(),
                name: "Hub".to_string(),
                area_id: Some("garage".to_string()),
            }],
            entities: vec![
                EntityFixture {
                    name: Some("Ceiling Light".to_string()),
                    aliases: vec!["Big Light".to_string()],
                    area_id: Some("kitchen".to_string()),
                    device_id: Some("hub".to_string()),
                    attributes: serde_json::from_value(json!({
                        "brightness": 180,
                        "friendly_name": "ignored"
                    }))
                    .expect("attributes"),
                    ..entity("light.ceiling", "on")
                },
                EntityFixture {
                    device_id: Some("hub".to_string()),
                    ..entity("sensor.garage_temperature", "12")
                },
                entity("script.good_night", "off"),
                EntityFixture {
                    expose_to: vec![],
                    ..entity("lock.front_door", "locked")
                },
            ],
            ..HostFixture::default()
        };
        HostHandle::from_host(Arc::new(InMemoryHost::from_fixture(fixture)))
    }

    #[test]
    fn exposed_entities_skip_unexposed_and_scripts() {
        let host = host();
        let caller = caller();
        let directory = CapabilityDirectory::new(&host, &caller);

        let ids: Vec<String> = directory
            .exposed_entities()
            .into_iter()
            .map(|entity| entity.entity_id)
            .collect();
        assert_eq!(ids, vec!["light.ceiling", "sensor.garage_temperature"]);
    }

    #[test]
    fn direct_area_wins_over_device_area() {
        let host = host();
        let caller = caller();
        let directory = CapabilityDirectory::new(&host, &caller);

        let light = directory.get_resource("light.ceiling").expect("exposed light");
        assert_eq!(light.names, "Ceiling Light, Big Light");
        assert_eq!(light.areas.as_deref(), Some("Kitchen, Cocina"));
        assert_eq!(
            light.attributes,
            Some(BTreeMap::from([("brightness".to_string(), json!("180"))]))
        );

        let sensor = directory
            .get_resource("sensor.garage_temperature")
            .expect("exposed sensor");
        assert_eq!(sensor.names, "garage temperature");
        assert_eq!(sensor.areas.as_deref(), Some("Garage"));
        assert_eq!(sensor.attributes, None);
    }

    #[test]
    fn resources_carry_uri_and_mime_type() {
        let host = host();
        let caller = caller();
        let directory = CapabilityDirectory::new(&host, &caller);

        let resources = directory.list_resources();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].uri, "entity://light/ceiling");
        assert_eq!(resources[0].description, "light in Kitchen, Cocina");
        assert_eq!(resources[0].mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn unexposed_resource_is_not_found() {
        let host = host();
        let caller = caller();
        let directory = CapabilityDirectory::new(&host, &caller);

        let error = directory
            .resource_by_uri("entity://lock/front_door")
            .expect_err("unexposed lock");
        assert!(matches!(error, DirectoryError::NotFound(id) if id == "lock.front_door"));

        let error = directory
            .resource_by_uri("file:///etc/passwd")
            .expect_err("foreign uri");
        assert!(matches!(error, DirectoryError::Address(_)));
    }

    #[test]
    fn resolves_caller_display_name() {
        let fixture = HostFixture {
            users: BTreeMap::from([("user-1".to_string(), "Paulus".to_string())]),
            ..HostFixture::default()
        };
        let host = HostHandle::from_host(Arc::new(InMemoryHost::from_fixture(fixture)));
        let caller = caller();

        assert_eq!(
            CapabilityDirectory::new(&host, &caller).caller_display_name(),
            Some("Paulus".to_string())
        );
    }

    #[tokio::test]
    async fn tools_keep_host_order_and_object_schemas() {
        let host = host();
        let caller = caller();
        let tools = CapabilityDirectory::new(&host, &caller)
            .list_tools()
            .await
            .expect("tool listing");

        let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(names, vec!["HassTurnOn", "HassTurnOff", "GetLiveContext"]);
        assert!(tools
            .iter()
            .all(|tool| tool.input_schema.schema_type() == "object"));
    }
}
