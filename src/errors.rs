use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::domain::{addressing::AddressError, directory::DirectoryError, schema::TranslateError};
use crate::host::HostFault;

/// Failures surfaced by the HTTP transport itself, outside any dispatched command.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest {
        code: &'static str,
        message: &'static str,
    },
    #[error("unauthorized: {message}")]
    Unauthorized {
        code: &'static str,
        message: &'static str,
    },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: &'static str) -> Self {
        Self::BadRequest { code, message }
    }

    pub fn unauthorized(code: &'static str, message: &'static str) -> Self {
        Self::Unauthorized { code, message }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, code, message.to_string())
            }
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, code, message.to_string())
            }
            Self::Internal { code, message } => {
                tracing::error!(error = %message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}

/// Envelope-level faults. Each one ends a request without a successful reply.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(&'static str),
    #[error("unknown message type {0}")]
    UnknownType(String),
    #[error("{kind} requires field {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("field {field} must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
    #[error(transparent)]
    InvalidUri(#[from] AddressError),
    #[error("unknown prompt {0}")]
    InvalidPromptName(String),
    #[error("resource {0} not found")]
    ResourceNotFound(String),
    #[error(transparent)]
    Host(#[from] HostFault),
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error("duplicate tool name {0}")]
    DuplicateTool(String),
    #[error("failed to serialize reply: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DispatchError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope(_) => "malformed_envelope",
            Self::UnknownType(_) => "unknown_type",
            Self::MissingField { .. } => "missing_field",
            Self::InvalidField { .. } => "invalid_field",
            Self::InvalidUri(_) => "invalid_uri",
            Self::InvalidPromptName(_) => "invalid_prompt_name",
            Self::ResourceNotFound(_) => "resource_not_found",
            Self::Host(_) => "host_fault",
            Self::Translate(_) => "invalid_tool_schema",
            Self::DuplicateTool(_) => "duplicate_tool",
            Self::Serialization(_) => "serialization_failed",
        }
    }

    /// True for faults caused by the request itself rather than by the host.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Self::MalformedEnvelope(_)
                | Self::UnknownType(_)
                | Self::MissingField { .. }
                | Self::InvalidField { .. }
                | Self::InvalidUri(_)
                | Self::InvalidPromptName(_)
                | Self::ResourceNotFound(_)
        )
    }
}

impl From<DirectoryError> for DispatchError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Host(fault) => Self::Host(fault),
            DirectoryError::Translate(err) => Self::Translate(err),
            DirectoryError::Address(err) => Self::InvalidUri(err),
            DirectoryError::DuplicateTool(name) => Self::DuplicateTool(name),
            DirectoryError::NotFound(host_id) => Self::ResourceNotFound(host_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_not_found_becomes_resource_not_found() {
        let err = DispatchError::from(DirectoryError::NotFound("light.gone".to_string()));

        assert_eq!(err.code(), "resource_not_found");
        assert!(err.is_client_fault());
        assert_eq!(err.to_string(), "resource light.gone not found");
    }

    #[test]
    fn host_faults_are_not_client_faults() {
        let err = DispatchError::from(HostFault::ApiNotFound("assist".to_string()));

        assert_eq!(err.code(), "host_fault");
        assert!(!err.is_client_fault());
    }
}
