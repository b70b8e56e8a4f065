//! Integration tests module
//!
//! End-to-end tests for the PostgreSQL backend:
//! - Conditional campaign transitions
//! - Lead uniqueness
//! - Global dedup under concurrent inserts

pub mod fixtures;
pub mod postgres_test;
