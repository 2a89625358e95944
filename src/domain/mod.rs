//! Translation between the host's capability model and protocol shapes
//!
//! Schema translation, resource addressing, the per-caller capability directory and
//! the six command handlers the dispatcher routes to.

pub mod addressing;
pub mod directory;
pub mod prompts;
pub mod resources;
pub mod schema;
pub mod tools;
pub mod utils;
