//! JSON-RPC framing and error mapping
//!
//! Turns dispatcher replies and failures into JSON-RPC 2.0 payloads. Failure data
//! always carries `{code, message, details}` and never leaks host internals.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::errors::{AppError, DispatchError};

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const UNAUTHORIZED: i32 = -32001;
pub const RESOURCE_NOT_FOUND: i32 = -32002;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn app_error_to_json_rpc(id: Option<Value>, err: AppError) -> Value {
    match err {
        AppError::BadRequest { code, message } => json_rpc_error_with_data(
            id,
            INVALID_PARAMS,
            "Invalid params",
            Some(error_data(code, message, json!({}))),
        ),
        AppError::Unauthorized { code, message } => json_rpc_error_with_data(
            id,
            UNAUTHORIZED,
            "Unauthorized",
            Some(error_data(code, message, json!({}))),
        ),
        AppError::Internal { message, .. } => {
            tracing::error!(error = %message, "request failed with internal error");
            json_rpc_error(id, INTERNAL_ERROR, "Internal error")
        }
    }
}

/// Map a dispatcher failure. Client faults echo their message, host faults only name
/// their kind.
pub fn dispatch_error_to_json_rpc(id: Option<Value>, err: &DispatchError) -> Value {
    let (code, message) = match err {
        DispatchError::MalformedEnvelope(_) => (INVALID_REQUEST, "Invalid Request"),
        DispatchError::UnknownType(_) => (METHOD_NOT_FOUND, "Method not found"),
        DispatchError::MissingField { .. }
        | DispatchError::InvalidField { .. }
        | DispatchError::InvalidUri(_)
        | DispatchError::InvalidPromptName(_) => (INVALID_PARAMS, "Invalid params"),
        DispatchError::ResourceNotFound(_) => (RESOURCE_NOT_FOUND, "Resource not found"),
        DispatchError::Host(_)
        | DispatchError::Translate(_)
        | DispatchError::DuplicateTool(_)
        | DispatchError::Serialization(_) => (INTERNAL_ERROR, "Internal error"),
    };

    let data = match err {
        DispatchError::Host(fault) => error_data(
            err.code(),
            "the host could not complete the request",
            json!({ "kind": fault.kind_name() }),
        ),
        _ if err.is_client_fault() => error_data(err.code(), &err.to_string(), json!({})),
        _ => error_data(err.code(), "internal error", json!({})),
    };

    json_rpc_error_with_data(id, code, message, Some(data))
}

fn error_data(code: &str, message: &str, details: Value) -> Value {
    json!({
        "code": code,
        "message": message,
        "details": details
    })
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let response = JsonrpcErrorResponse::new(
        RpcError {
            code: i64::from(code),
            data,
            message: message.to_string(),
        },
        id.as_ref().and_then(value_to_request_id),
    );

    serde_json::to_value(response).unwrap_or_else(|_| {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": code, "message": message}
        })
    })
}

/// Wrap a result. Non-object results (such as the bare prompt list) bypass the typed
/// response, which only carries object results.
pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let (Some(request_id), Some(extra)) = (
        id.as_ref().and_then(value_to_request_id),
        result.as_object(),
    ) {
        let response = JsonrpcResultResponse::new(
            request_id,
            McpResult {
                meta: None,
                extra: Some(extra.clone()),
            },
        );
        if let Ok(value) = serde_json::to_value(response) {
            return value;
        }
    }

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

pub fn request_id_to_value(id: RequestId) -> Value {
    match id {
        RequestId::String(value) => Value::String(value),
        RequestId::Integer(value) => Value::Number(value.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::addressing::AddressError;
    use crate::host::HostFault;

    #[test]
    fn unknown_type_maps_to_method_not_found() {
        let value = dispatch_error_to_json_rpc(
            Some(json!(4)),
            &DispatchError::UnknownType("tools/delete".to_string()),
        );

        assert_eq!(value["id"], 4);
        assert_eq!(value["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(value["error"]["data"]["code"], "unknown_type");
    }

    #[test]
    fn invalid_uri_maps_to_invalid_params() {
        let value = dispatch_error_to_json_rpc(
            Some(json!("a")),
            &DispatchError::InvalidUri(AddressError::InvalidUri("ftp://x".to_string())),
        );

        assert_eq!(value["error"]["code"], INVALID_PARAMS);
        assert_eq!(value["error"]["data"]["code"], "invalid_uri");
    }

    #[test]
    fn resource_not_found_has_its_own_code() {
        let value = dispatch_error_to_json_rpc(
            Some(json!(1)),
            &DispatchError::ResourceNotFound("light.gone".to_string()),
        );

        assert_eq!(value["error"]["code"], RESOURCE_NOT_FOUND);
        assert_eq!(value["error"]["data"]["message"], "resource light.gone not found");
    }

    #[test]
    fn host_faults_hide_their_message() {
        let value = dispatch_error_to_json_rpc(
            Some(json!(1)),
            &DispatchError::Host(HostFault::Unexpected {
                kind: "DatabaseError".to_string(),
                message: "connection string postgres://admin:pw@db".to_string(),
            }),
        );

        assert_eq!(value["error"]["code"], INTERNAL_ERROR);
        assert_eq!(value["error"]["data"]["details"]["kind"], "DatabaseError");
        assert!(!value.to_string().contains("postgres://"));
    }

    #[test]
    fn array_results_are_wrapped_verbatim() {
        let value = json_rpc_result(Some(json!(9)), json!([{"name": "assist"}]));

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 9);
        assert_eq!(value["result"][0]["name"], "assist");
    }

    #[test]
    fn request_ids_keep_their_json_type() {
        assert_eq!(
            value_to_request_id(&json!("abc")).map(request_id_to_value),
            Some(json!("abc"))
        );
        assert_eq!(
            value_to_request_id(&json!(12)).map(request_id_to_value),
            Some(json!(12))
        );
        assert!(value_to_request_id(&json!(true)).is_none());
    }
}
