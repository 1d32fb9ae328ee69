//! Core data types for the Arbor dependency resolver.
//!
//! This crate defines the coordinates the rest of the workspace passes around:
//! artifacts and repository metadata, dependency declarations with their scopes
//! and exclusions, and the resolver configuration.
//!
//! This crate is intentionally free of async code and network I/O.

pub mod artifact;
pub mod config;
pub mod dependency;
