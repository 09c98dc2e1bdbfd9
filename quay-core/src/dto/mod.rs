//! Data Transfer Objects for the HTTP API
//!
//! Request bodies and query strings exchanged between the server and its
//! callers (creators, agents and the CLI).

pub mod pipeline;
pub mod task;
