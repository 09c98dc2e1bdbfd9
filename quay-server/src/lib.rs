//! Quay task service
//!
//! Hands batches of pending tasks to worker agents so that no task is ever
//! claimed twice.

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;
