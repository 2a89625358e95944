//! `resources/list` and `resources/read`
//!
//! Exposes each entity visible to the caller as a JSON document under `entity://`.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::directory::CapabilityDirectory;
use crate::errors::DispatchError;
use crate::host::{CallerContext, HostHandle};
use crate::mcp::dispatch::{
    Command, CommandHandler, CommandSchema, FieldSpec, FieldType, MessageKind, ValidatedRequest,
};
use crate::model::{ResourceReadResult, ResourcesListResult};

const LIST_SCHEMA: CommandSchema = CommandSchema {
    kind: MessageKind::ResourcesList,
    fields: &[],
};

const READ_SCHEMA: CommandSchema = CommandSchema {
    kind: MessageKind::ResourcesRead,
    fields: &[FieldSpec::required("uri", FieldType::ResourceUri)],
};

pub fn list_command() -> Command {
    Command::new(LIST_SCHEMA, ListResourcesHandler)
}

pub fn read_command() -> Command {
    Command::new(READ_SCHEMA, ReadResourceHandler)
}

pub struct ListResourcesHandler;

#[async_trait]
impl CommandHandler for ListResourcesHandler {
    async fn handle(
        &self,
        host: &HostHandle,
        caller: &CallerContext,
        _request: &ValidatedRequest,
    ) -> Result<Value, DispatchError> {
        let resources = CapabilityDirectory::new(host, caller).list_resources();
        Ok(serde_json::to_value(ResourcesListResult { resources })?)
    }
}

pub struct ReadResourceHandler;

#[async_trait]
impl CommandHandler for ReadResourceHandler {
    async fn handle(
        &self,
        host: &HostHandle,
        caller: &CallerContext,
        request: &ValidatedRequest,
    ) -> Result<Value, DispatchError> {
        let entity =
            CapabilityDirectory::new(host, caller).resource_by_uri(request.required_str("uri")?)?;

        Ok(serde_json::to_value(ResourceReadResult {
            contents: vec![entity.contents()?],
        })?)
    }
}
