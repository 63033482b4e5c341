//! Shared integration test infrastructure.

pub mod common;
