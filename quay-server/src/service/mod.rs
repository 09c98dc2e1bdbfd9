//! Service Module
//!
//! Business logic layer for the server.
//! Services orchestrate between repositories and contain domain logic.

pub mod claim;
pub mod registry;
pub mod task;

// Re-export for convenience
pub use claim as claim_service;
pub use registry as registry_service;
pub use task as task_service;
