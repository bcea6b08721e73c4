//! Data Transfer Objects for inter-service communication
//!
//! Bodies exchanged between the client, the launcher and the executor.
//! Field names are camelCase on the wire.

pub mod job;
