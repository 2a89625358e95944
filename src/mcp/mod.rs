//! Model Context Protocol (MCP) request handling
//!
//! The dispatcher routes typed request envelopes to command handlers. `rpc` and `server`
//! wrap it in JSON-RPC framing, version negotiation and error mapping.

pub mod dispatch;
pub mod rpc;
pub mod server;
