//! JSON-RPC entry point for the MCP endpoint
//!
//! Decodes JSON-RPC messages, answers the `initialize` and `ping` handshake itself and
//! hands every other method to the dispatcher as a typed request envelope.

use rust_mcp_sdk::schema::{
    Implementation, InitializeRequest, InitializeResult, JsonrpcMessage, PingRequest,
    ProtocolVersion, ServerCapabilities, ServerCapabilitiesPrompts, ServerCapabilitiesResources,
    ServerCapabilitiesTools,
};
use serde_json::{json, Map, Value};

use crate::auth::CallerIdentity;
use crate::host::{CallerContext, TraceContext};
use crate::logging::{audit_command, redact_audit_params};
use crate::mcp::dispatch::RequestEnvelope;
use crate::mcp::rpc::{
    app_error_to_json_rpc, dispatch_error_to_json_rpc, is_json_rpc_error, json_rpc_error,
    json_rpc_result, request_id_to_value, INVALID_PARAMS, INVALID_REQUEST,
};
use crate::{errors::AppError, AppState};

pub const SUPPORTED_PROTOCOL_VERSION: &str = "2024-11-05";

pub async fn handle_json_rpc_value(
    state: &AppState,
    identity: &CallerIdentity,
    payload: Value,
) -> Option<Value> {
    if !payload.is_object() {
        return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request"));
    }

    let request_id = payload.get("id").cloned();
    let handshake_valid = validate_handshake_shape(&payload);
    let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
        Ok(message) => message,
        Err(_) => return Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")),
    };

    match parsed {
        JsonrpcMessage::Request(request) => {
            let request_id = request_id_to_value(request.id);
            if request.method.trim().is_empty() {
                return Some(json_rpc_error(
                    Some(request_id),
                    INVALID_REQUEST,
                    "Invalid Request",
                ));
            }
            if !handshake_valid {
                return Some(json_rpc_error(Some(request_id), INVALID_PARAMS, "Invalid params"));
            }

            Some(
                handle_json_rpc_request(state, identity, request_id, request.method, request.params)
                    .await,
            )
        }
        // Notifications carry nothing the bridge acts on.
        JsonrpcMessage::Notification(_) => None,
        JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
            Some(json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request"))
        }
    }
}

/// Check `initialize` and `ping` against their protocol shapes. Other methods are
/// validated by the dispatcher's command schemas.
pub fn validate_handshake_shape(payload: &Value) -> bool {
    match payload.get("method").and_then(Value::as_str) {
        Some("initialize") => serde_json::from_value::<InitializeRequest>(payload.clone()).is_ok(),
        Some("ping") => serde_json::from_value::<PingRequest>(payload.clone()).is_ok(),
        _ => true,
    }
}

pub async fn handle_json_rpc_request(
    state: &AppState,
    identity: &CallerIdentity,
    id: Value,
    method: String,
    params: Option<Map<String, Value>>,
) -> Value {
    match method.as_str() {
        "initialize" | "ping" => {
            let response = handle_handshake(id, &method, params.as_ref());
            let audit_params = params
                .as_ref()
                .map(redact_audit_params)
                .unwrap_or(Value::Null);
            audit_command(&method, &audit_params, !is_json_rpc_error(&response));
            response
        }
        _ => {
            let caller = caller_context(state, identity, &id);
            let envelope = RequestEnvelope::new(id, method, params.unwrap_or_default());
            match state.dispatcher.dispatch(&state.host, &caller, envelope).await {
                Ok(reply) => json_rpc_result(Some(reply.id), reply.result),
                Err(failed) => dispatch_error_to_json_rpc(Some(failed.id), &failed.error),
            }
        }
    }
}

fn handle_handshake(id: Value, method: &str, params: Option<&Map<String, Value>>) -> Value {
    if method == "ping" {
        return json_rpc_result(Some(id), json!({}));
    }

    match initialize_result(params) {
        Ok(result) => json_rpc_result(Some(id), result),
        Err(err) => app_error_to_json_rpc(Some(id), err),
    }
}

fn initialize_result(params: Option<&Map<String, Value>>) -> Result<Value, AppError> {
    let protocol_version = negotiate_protocol_version(params)?;

    let initialize_result = InitializeResult {
        server_info: Implementation {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            description: None,
            icons: vec![],
            website_url: None,
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools {
                list_changed: Some(false),
            }),
            resources: Some(ServerCapabilitiesResources {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
            prompts: Some(ServerCapabilitiesPrompts {
                list_changed: Some(false),
            }),
            ..Default::default()
        },
        protocol_version: protocol_version.into(),
        instructions: None,
        meta: None,
    };

    serde_json::to_value(initialize_result).map_err(|err| AppError::internal(err.to_string()))
}

pub fn negotiate_protocol_version(
    params: Option<&Map<String, Value>>,
) -> Result<ProtocolVersion, AppError> {
    let offered_version = params
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    if offered_version != SUPPORTED_PROTOCOL_VERSION {
        return Err(AppError::bad_request(
            "unsupported_protocol_version",
            "unsupported initialize protocolVersion",
        ));
    }

    Ok(ProtocolVersion::V2024_11_05)
}

/// Build the per-request caller from the authenticated identity and configured defaults.
pub fn caller_context(state: &AppState, identity: &CallerIdentity, request_id: &Value) -> CallerContext {
    let origin_id = match request_id {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    };

    CallerContext {
        platform: env!("CARGO_PKG_NAME").to_string(),
        trace: TraceContext {
            user_id: identity.user_id.clone(),
            origin_id: Some(origin_id),
        },
        assistant: state.defaults.assistant.clone(),
        language: state.defaults.language.clone(),
    }
}
