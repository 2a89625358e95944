//! HTTP transport for the bridge
//!
//! Routes the `/mcp` JSON-RPC endpoint alongside the public health and discovery documents.

pub mod handlers;
