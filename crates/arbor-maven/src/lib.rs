//! Maven repository protocol pieces that decide what to fetch: remote
//! repositories and their update policies, the session-scoped update check
//! manager with its persistent tracking files, the local repository layout and
//! a concurrent artifact fetcher driven by the update checks.

pub mod fetch;
pub mod local;
pub mod policy;
pub mod repository;
pub mod session;
pub mod tracking;
pub mod transfer;
pub mod update;
