//! `tools/list` and `tools/call`
//!
//! Tool faults are never transport failures. A host fault raised while calling a
//! tool is folded into a successful reply with `isError` set, so the model on the
//! other end can read the failure and try again.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::domain::directory::CapabilityDirectory;
use crate::errors::DispatchError;
use crate::host::{CallerContext, HostFault, HostHandle, ToolInput};
use crate::mcp::dispatch::{
    Command, CommandHandler, CommandSchema, FieldSpec, FieldType, MessageKind, ValidatedRequest,
};
use crate::model::{ContentItem, ToolCallOutcome, ToolsListResult};

const LIST_SCHEMA: CommandSchema = CommandSchema {
    kind: MessageKind::ToolsList,
    fields: &[],
};

const CALL_SCHEMA: CommandSchema = CommandSchema {
    kind: MessageKind::ToolsCall,
    fields: &[
        FieldSpec::required("name", FieldType::String),
        FieldSpec::optional("arguments", FieldType::Object),
    ],
};

pub fn list_command() -> Command {
    Command::new(LIST_SCHEMA, ListToolsHandler)
}

pub fn call_command() -> Command {
    Command::new(CALL_SCHEMA, CallToolHandler)
}

pub struct ListToolsHandler;

#[async_trait]
impl CommandHandler for ListToolsHandler {
    async fn handle(
        &self,
        host: &HostHandle,
        caller: &CallerContext,
        _request: &ValidatedRequest,
    ) -> Result<Value, DispatchError> {
        let tools = CapabilityDirectory::new(host, caller).list_tools().await?;
        Ok(serde_json::to_value(ToolsListResult { tools })?)
    }
}

pub struct CallToolHandler;

#[async_trait]
impl CommandHandler for CallToolHandler {
    async fn handle(
        &self,
        host: &HostHandle,
        caller: &CallerContext,
        request: &ValidatedRequest,
    ) -> Result<Value, DispatchError> {
        let input = ToolInput {
            tool_name: request.required_str("name")?.to_string(),
            tool_args: request.object_field("arguments").cloned().unwrap_or_default(),
        };
        let tool_name = input.tool_name.clone();

        let result = call_tool(host, caller, input).await;
        if let Err(fault) = &result {
            info!(
                tool = %tool_name,
                error = fault.kind_name(),
                "tool call returned a fault"
            );
        }

        Ok(serde_json::to_value(outcome_from_result(result)?)?)
    }
}

async fn call_tool(
    host: &HostHandle,
    caller: &CallerContext,
    input: ToolInput,
) -> Result<Value, HostFault> {
    let api = CapabilityDirectory::new(host, caller).api().await?;
    api.call_tool(input).await
}

/// The one place a tool result or fault becomes protocol content.
pub fn outcome_from_result(
    result: Result<Value, HostFault>,
) -> Result<ToolCallOutcome, serde_json::Error> {
    match result {
        Ok(value) => Ok(ToolCallOutcome {
            content: vec![ContentItem::text(serde_json::to_string(&value)?)],
            is_error: false,
        }),
        Err(fault) => {
            let mut body = Map::new();
            body.insert(
                "error".to_string(),
                Value::String(fault.kind_name().to_string()),
            );
            let message = fault.to_string();
            if !message.is_empty() {
                body.insert("error_text".to_string(), Value::String(message));
            }

            Ok(ToolCallOutcome {
                content: vec![ContentItem::text(serde_json::to_string(&body)?)],
                is_error: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::host::memory::{EntityFixture, HostFixture, InMemoryHost};
    use crate::host::TraceContext;
    use crate::mcp::dispatch::Dispatcher;
    use serde_json::json;

    fn decoded_text(outcome: &Value) -> Value {
        let text = outcome["content"][0]["text"]
            .as_str()
            .expect("text content");
        serde_json::from_str(text).expect("json text")
    }

    fn host() -> HostHandle {
        let fixture = HostFixture {
            entities: vec![
                EntityFixture {
                    entity_id: "light.desk".to_string(),
                    state: "off".to_string(),
                    expose_to: vec!["conversation".to_string()],
                    ..EntityFixture::default()
                },
                EntityFixture {
                    entity_id: "switch.desk".to_string(),
                    state: "off".to_string(),
                    expose_to: vec!["conversation".to_string()],
                    ..EntityFixture::default()
                },
            ],
            ..HostFixture::default()
        };
        HostHandle::from_host(Arc::new(InMemoryHost::from_fixture(fixture)))
    }

    fn caller() -> CallerContext {
        CallerContext {
            platform: "test".to_string(),
            trace: TraceContext::default(),
            assistant: "conversation".to_string(),
            language: None,
        }
    }

    #[test]
    fn faults_become_error_content() {
        let outcome = outcome_from_result(Err(HostFault::MatchFailed(
            "no entity named attic".to_string(),
        )))
        .expect("outcome");

        assert!(outcome.is_error);
        assert_eq!(outcome.content.len(), 1);
        let body: Value = serde_json::from_str(outcome.content[0].as_text()).expect("json body");
        assert_eq!(
            body,
            json!({"error": "MatchFailedError", "error_text": "no entity named attic"})
        );
    }

    #[test]
    fn empty_fault_messages_are_omitted() {
        let outcome = outcome_from_result(Err(HostFault::Unexpected {
            kind: "TimeoutError".to_string(),
            message: String::new(),
        }))
        .expect("outcome");

        let body: Value = serde_json::from_str(outcome.content[0].as_text()).expect("json body");
        assert_eq!(body, json!({"error": "TimeoutError"}));
    }

    #[tokio::test]
    async fn successful_call_returns_host_result_as_text() {
        let reply = Dispatcher::with_protocol_commands()
            .dispatch_value(
                &host(),
                &caller(),
                json!({
                    "id": 1,
                    "type": "tools/call",
                    "name": "HassTurnOn",
                    "arguments": {"name": "desk", "domain": ["light"]}
                }),
            )
            .await
            .expect("tool call reply");

        assert_eq!(reply.result["isError"], json!(false));
        assert_eq!(reply.result["content"].as_array().map(Vec::len), Some(1));
        let body = decoded_text(&reply.result);
        assert_eq!(body["response_type"], "action_done");
        assert_eq!(body["data"]["success"][0]["id"], "light.desk");
    }

    #[tokio::test]
    async fn unresolvable_target_is_a_successful_reply_with_error_content() {
        let reply = Dispatcher::with_protocol_commands()
            .dispatch_value(
                &host(),
                &caller(),
                json!({
                    "id": 2,
                    "type": "tools/call",
                    "name": "HassTurnOn",
                    "arguments": {"name": "desk"}
                }),
            )
            .await
            .expect("faults are still replies");

        assert_eq!(reply.result["isError"], json!(true));
        assert_eq!(decoded_text(&reply.result)["error"], "MatchFailedError");
    }

    #[tokio::test]
    async fn unknown_tool_is_error_content_not_a_failure() {
        let reply = Dispatcher::with_protocol_commands()
            .dispatch_value(
                &host(),
                &caller(),
                json!({"id": 3, "type": "tools/call", "name": "HassSelfDestruct"}),
            )
            .await
            .expect("faults are still replies");

        assert_eq!(reply.result["isError"], json!(true));
        assert_eq!(decoded_text(&reply.result)["error"], "ToolNotFoundError");
    }

    #[tokio::test]
    async fn list_returns_object_schemas_in_host_order() {
        let reply = Dispatcher::with_protocol_commands()
            .dispatch_value(&host(), &caller(), json!({"id": 4, "type": "tools/list"}))
            .await
            .expect("tool listing");

        let tools = reply.result["tools"].as_array().expect("tools array");
        let names: Vec<&str> = tools
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert_eq!(names, vec!["HassTurnOn", "HassTurnOff", "GetLiveContext"]);
        assert!(tools
            .iter()
            .all(|tool| tool["inputSchema"]["type"] == "object"));
        assert_eq!(
            tools[0]["inputSchema"]["properties"]["name"]["type"],
            "string"
        );
    }
}
