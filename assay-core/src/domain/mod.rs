//! Core domain types
//!
//! `JobRecord` is the single durable entity. It is written by the launcher
//! and the executor, read by the status endpoint, and never mutated by clients.

pub mod job;
