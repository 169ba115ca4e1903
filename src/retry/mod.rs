//! Retry module
//! - policy.rs: per-configuration bounded retry with exponential backoff

pub mod policy;

pub use policy::*;
