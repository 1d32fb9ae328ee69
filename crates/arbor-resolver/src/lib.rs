//! Dependency graph engine: generic version ordering and ranges, transitive
//! graph collection, conflict marking and sorting, and nearest-wins
//! version/scope selection.

pub mod collect;
pub mod conflict;
pub mod context;
pub mod graph;
pub mod marker;
pub mod resolver;
pub mod selector;
pub mod sorter;
pub mod version;
