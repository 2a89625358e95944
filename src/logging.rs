use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use serde_json::{Map, Value};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const REDACTED: &str = "[REDACTED]";

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started_at.elapsed().as_millis();

    info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = elapsed_ms,
        "request summary"
    );

    if status.as_u16() == 401 {
        warn!(method = %method, path = %path, "authentication failure");
    }

    response
}

/// One audit line per handled command, with secrets already stripped from `params`.
pub fn audit_command(kind: &str, params: &Value, success: bool) {
    info!(
        kind = %kind,
        params = %params,
        outcome = if success { "success" } else { "failure" },
        "mcp action audited"
    );
}

pub fn redact_audit_params(params: &Map<String, Value>) -> Value {
    Value::Object(redact_audit_map(params))
}

fn redact_audit_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, item)| {
            if is_sensitive_key(key) {
                (key.clone(), Value::String(REDACTED.to_string()))
            } else {
                (key.clone(), redact_audit_value(item))
            }
        })
        .collect()
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact_audit_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey" | "pin" | "code"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}
