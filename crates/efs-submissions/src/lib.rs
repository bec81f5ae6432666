//! Lifecycle orchestration for electronic filing submissions.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
