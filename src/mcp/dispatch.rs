//! Request dispatcher
//!
//! Every inbound envelope walks `Received -> Validated -> Executing -> Replied`, or
//! stops early when its `type` is unknown or its fields do not match the command
//! schema. Handlers never see a request that failed validation.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{addressing, prompts, resources, tools};
use crate::errors::DispatchError;
use crate::host::{CallerContext, HostHandle};
use crate::logging::{audit_command, redact_audit_params};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ToolsList,
    ToolsCall,
    ResourcesList,
    ResourcesRead,
    PromptsList,
    PromptsGet,
}

impl MessageKind {
    pub const ALL: [MessageKind; 6] = [
        Self::ToolsList,
        Self::ToolsCall,
        Self::ResourcesList,
        Self::ResourcesRead,
        Self::PromptsList,
        Self::PromptsGet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::ResourcesList => "resources/list",
            Self::ResourcesRead => "resources/read",
            Self::PromptsList => "prompts/list",
            Self::PromptsGet => "prompts/get",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Validated,
    Executing,
    Replied,
    Rejected,
}

impl RequestState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Executing => "executing",
            Self::Replied => "replied",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Object,
    /// A string that must decode as a resource URI.
    ResourceUri,
    /// A string that must name one of the listed prompts.
    PromptName(&'static [&'static str]),
}

impl FieldType {
    fn check(self, field: &'static str, value: &Value) -> Result<(), DispatchError> {
        let invalid = || DispatchError::InvalidField {
            field,
            expected: self.expected(),
        };
        match self {
            Self::String => value.as_str().map(drop).ok_or_else(invalid),
            Self::Object => value.as_object().map(drop).ok_or_else(invalid),
            Self::ResourceUri => {
                addressing::decode(value.as_str().ok_or_else(invalid)?)?;
                Ok(())
            }
            Self::PromptName(names) => {
                let name = value.as_str().ok_or_else(invalid)?;
                if names.contains(&name) {
                    Ok(())
                } else {
                    Err(DispatchError::InvalidPromptName(name.to_string()))
                }
            }
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Self::Object => "an object",
            Self::String | Self::ResourceUri | Self::PromptName(_) => "a string",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: false,
        }
    }
}

/// Fields a message kind must or may carry. Unlisted fields are ignored.
#[derive(Debug, Clone, Copy)]
pub struct CommandSchema {
    pub kind: MessageKind,
    pub fields: &'static [FieldSpec],
}

impl CommandSchema {
    pub fn validate(&self, envelope: RequestEnvelope) -> Result<ValidatedRequest, DispatchError> {
        for spec in self.fields {
            match envelope.fields.get(spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(DispatchError::MissingField {
                        kind: self.kind.as_str(),
                        field: spec.name,
                    })
                }
                Some(value) if !value.is_null() => spec.field_type.check(spec.name, value)?,
                _ => {}
            }
        }

        Ok(ValidatedRequest {
            id: envelope.id,
            kind: self.kind,
            fields: envelope.fields,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub id: Value,
    pub kind: String,
    pub fields: Map<String, Value>,
}

impl RequestEnvelope {
    pub fn new(id: Value, kind: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id,
            kind: kind.into(),
            fields,
        }
    }

    /// Split a raw `{id, type, ...}` message into an envelope.
    pub fn from_value(value: Value) -> Result<Self, DispatchError> {
        let Value::Object(mut fields) = value else {
            return Err(DispatchError::MalformedEnvelope("envelope must be an object"));
        };
        let id = match fields.remove("id") {
            Some(id) if id.is_string() || id.is_number() => id,
            _ => return Err(DispatchError::MalformedEnvelope("id is required")),
        };
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return Err(DispatchError::MalformedEnvelope("type is required")),
        };
        Ok(Self { id, kind, fields })
    }
}

/// A request whose fields matched its command schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub id: Value,
    pub kind: MessageKind,
    pub fields: Map<String, Value>,
}

impl ValidatedRequest {
    pub fn str_field(&self, name: &'static str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn required_str(&self, name: &'static str) -> Result<&str, DispatchError> {
        self.str_field(name).ok_or(DispatchError::MissingField {
            kind: self.kind.as_str(),
            field: name,
        })
    }

    pub fn object_field(&self, name: &'static str) -> Option<&Map<String, Value>> {
        self.fields.get(name).and_then(Value::as_object)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyEnvelope {
    pub id: Value,
    pub result: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Validation,
    Execution,
}

/// A request that ended without a result. The transport decides how to signal it.
#[derive(Debug)]
pub struct FailedReply {
    pub id: Value,
    pub stage: FailureStage,
    pub error: DispatchError,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        host: &HostHandle,
        caller: &CallerContext,
        request: &ValidatedRequest,
    ) -> Result<Value, DispatchError>;
}

pub struct Command {
    pub schema: CommandSchema,
    pub handler: Arc<dyn CommandHandler>,
}

impl Command {
    pub fn new(schema: CommandSchema, handler: impl CommandHandler + 'static) -> Self {
        Self {
            schema,
            handler: Arc::new(handler),
        }
    }
}

/// Anything that can route message kinds to handlers.
pub trait CommandRouter {
    fn register_command(&mut self, command: Command);
}

/// Attach the six protocol commands to a router.
pub fn register_commands(router: &mut impl CommandRouter) {
    router.register_command(tools::list_command());
    router.register_command(tools::call_command());
    router.register_command(resources::list_command());
    router.register_command(resources::read_command());
    router.register_command(prompts::list_command());
    router.register_command(prompts::get_command());
}

#[derive(Clone, Default)]
pub struct Dispatcher {
    commands: HashMap<&'static str, Arc<Command>>,
}

impl CommandRouter for Dispatcher {
    fn register_command(&mut self, command: Command) {
        self.commands
            .insert(command.schema.kind.as_str(), Arc::new(command));
    }
}

impl Dispatcher {
    pub fn with_protocol_commands() -> Self {
        let mut dispatcher = Self::default();
        register_commands(&mut dispatcher);
        dispatcher
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.commands.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub async fn dispatch_value(
        &self,
        host: &HostHandle,
        caller: &CallerContext,
        message: Value,
    ) -> Result<ReplyEnvelope, FailedReply> {
        let id = message.get("id").cloned().unwrap_or(Value::Null);
        let envelope = RequestEnvelope::from_value(message).map_err(|error| FailedReply {
            id,
            stage: FailureStage::Validation,
            error,
        })?;
        self.dispatch(host, caller, envelope).await
    }

    pub async fn dispatch(
        &self,
        host: &HostHandle,
        caller: &CallerContext,
        envelope: RequestEnvelope,
    ) -> Result<ReplyEnvelope, FailedReply> {
        let kind = envelope.kind.clone();
        let audit_params = redact_audit_params(&envelope.fields);
        trace_state(&envelope.id, &kind, RequestState::Received);

        let outcome = self.run(host, caller, envelope).await;
        match &outcome {
            Ok(reply) => trace_state(&reply.id, &kind, RequestState::Replied),
            Err(failed) => {
                trace_state(&failed.id, &kind, RequestState::Rejected);
                if !failed.error.is_client_fault() {
                    warn!(
                        kind = %kind,
                        code = failed.error.code(),
                        error = %failed.error,
                        "command failed during execution"
                    );
                }
            }
        }
        audit_command(&kind, &audit_params, outcome.is_ok());
        outcome
    }

    async fn run(
        &self,
        host: &HostHandle,
        caller: &CallerContext,
        envelope: RequestEnvelope,
    ) -> Result<ReplyEnvelope, FailedReply> {
        let Some(command) = self.commands.get(envelope.kind.as_str()).cloned() else {
            return Err(FailedReply {
                id: envelope.id,
                stage: FailureStage::Validation,
                error: DispatchError::UnknownType(envelope.kind),
            });
        };

        let id = envelope.id.clone();
        let request = command
            .schema
            .validate(envelope)
            .map_err(|error| FailedReply {
                id,
                stage: FailureStage::Validation,
                error,
            })?;
        trace_state(&request.id, request.kind.as_str(), RequestState::Validated);

        trace_state(&request.id, request.kind.as_str(), RequestState::Executing);
        match command.handler.handle(host, caller, &request).await {
            Ok(result) => Ok(ReplyEnvelope {
                id: request.id,
                result,
            }),
            Err(error) => Err(FailedReply {
                id: request.id,
                stage: FailureStage::Execution,
                error,
            }),
        }
    }
}

fn trace_state(id: &Value, kind: &str, state: RequestState) {
    debug!(id = %id, kind = %kind, state = state.as_str(), "request state");
}
