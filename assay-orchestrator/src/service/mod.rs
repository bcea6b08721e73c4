//! Service Module
//!
//! Business logic layer for the orchestrator.
//! The launcher, executor and status services only share state through
//! the record store, so each can run as its own deployment.

pub mod dispatch;
pub mod executor;
pub mod launcher;
pub mod status;

// Re-export for convenience
pub use launcher as launcher_service;
pub use status as status_service;
