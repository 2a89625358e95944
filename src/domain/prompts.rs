//! `prompts/list` and `prompts/get`
//!
//! There is a single prompt. Its text is rendered per request from the caller's
//! display name, the current time and the active API's own summary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::directory::CapabilityDirectory;
use crate::errors::DispatchError;
use crate::host::{CallerContext, HostHandle};
use crate::mcp::dispatch::{
    Command, CommandHandler, CommandSchema, FieldSpec, FieldType, MessageKind, ValidatedRequest,
};
use crate::model::{ContentItem, PromptDescriptor, PromptMessage, PromptResult, PromptRole};

pub const PROMPT_NAME: &str = "assist";
pub const PROMPT_DESCRIPTION: &str = "Default prompt for controlling the host through its exposed tools";

const BASE_INSTRUCTIONS: &str = "You are a voice assistant for a home automation host. \
Answer questions about the world truthfully. \
Answer in plain text. Keep it simple and to the point.";

const LIST_SCHEMA: CommandSchema = CommandSchema {
    kind: MessageKind::PromptsList,
    fields: &[],
};

const GET_SCHEMA: CommandSchema = CommandSchema {
    kind: MessageKind::PromptsGet,
    fields: &[FieldSpec::required(
        "name",
        FieldType::PromptName(&[PROMPT_NAME]),
    )],
};

pub fn list_command() -> Command {
    Command::new(LIST_SCHEMA, ListPromptsHandler)
}

pub fn get_command() -> Command {
    Command::new(GET_SCHEMA, GetPromptHandler)
}

pub struct ListPromptsHandler;

#[async_trait]
impl CommandHandler for ListPromptsHandler {
    async fn handle(
        &self,
        _host: &HostHandle,
        _caller: &CallerContext,
        _request: &ValidatedRequest,
    ) -> Result<Value, DispatchError> {
        Ok(serde_json::to_value(vec![PromptDescriptor {
            name: PROMPT_NAME.to_string(),
            description: PROMPT_DESCRIPTION.to_string(),
        }])?)
    }
}

pub struct GetPromptHandler;

#[async_trait]
impl CommandHandler for GetPromptHandler {
    async fn handle(
        &self,
        host: &HostHandle,
        caller: &CallerContext,
        _request: &ValidatedRequest,
    ) -> Result<Value, DispatchError> {
        let directory = CapabilityDirectory::new(host, caller);
        let api = directory.api().await?;
        let display_name = directory.caller_display_name();
        let text = render_prompt(display_name.as_deref(), &api.prompt_text(), Utc::now());

        Ok(serde_json::to_value(PromptResult {
            description: PROMPT_DESCRIPTION.to_string(),
            messages: vec![PromptMessage {
                role: PromptRole::Assistant,
                content: ContentItem::text(text),
            }],
        })?)
    }
}

pub fn render_prompt(display_name: Option<&str>, summary: &str, now: DateTime<Utc>) -> String {
    let mut sections = vec![BASE_INSTRUCTIONS.to_string()];
    if let Some(display_name) = display_name {
        sections.push(format!("You are assisting {display_name}."));
    }
    sections.push(format!(
        "Current time is {}. Today's date is {}.",
        now.format("%H:%M:%S"),
        now.format("%Y-%m-%d")
    ));
    sections.push(summary.to_string());
    sections.join("\n")
}
