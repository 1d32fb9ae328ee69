//! Shared utilities for the Arbor dependency resolver.
//!
//! This crate provides cross-cutting concerns used by all other Arbor crates:
//! the unified error type and small filesystem helpers.

pub mod errors;
pub mod fs;
