//! Repository Module
//!
//! Job lifecycle operations on top of the durable record store.
//! Launcher, executor and status endpoint only touch records through here.

pub mod job;

// Re-export for convenience
pub use job as job_repository;
