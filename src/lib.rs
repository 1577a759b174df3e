//! sessionlens: a caching GraphQL proxy for browsing LLM sessions.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
