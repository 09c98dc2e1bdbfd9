//! Quay Core
//!
//! Core types shared by the Quay server, client and CLI.
//!
//! This crate contains:
//! - Domain types: pipelines, version references, tasks, statuses and audit events
//! - DTOs: request and query payloads exchanged over the HTTP API

pub mod domain;
pub mod dto;
