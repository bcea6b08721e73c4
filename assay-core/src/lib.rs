//! Assay Core
//!
//! Core types shared by the Assay job services.
//!
//! This crate contains:
//! - Domain types: the durable `JobRecord` and its merge-patch rules
//! - DTOs: request/response bodies exchanged between client, launcher and executor
//! - Backoff: the pure interval schedule used by status pollers

pub mod backoff;
pub mod domain;
pub mod dto;
