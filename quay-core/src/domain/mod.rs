//! Core domain types
//!
//! These types represent the entities the claim protocol works with and are
//! shared between the server (for persistence) and agents (for claiming and
//! reporting progress).

pub mod agent;
pub mod event;
pub mod pipeline;
pub mod task;
