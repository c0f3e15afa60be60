//! Ragway runtime: the gateway that sits between callers and providers.
//!
//! A request is validated against the provider registry, answered from the
//! response cache when possible (single mode), otherwise dispatched to one
//! or many providers concurrently. Every attempt is recorded as a metric and
//! successful live answers are written back to the cache.

pub mod compare;
pub mod dispatch;
pub mod gateway;
pub mod prompt;
pub mod types;

pub use compare::{compare_responses, ComparisonResult, ResponseLength, ResponseTime};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use gateway::{Gateway, GatewayError};
pub use prompt::{build_messages, AgentContext, Passage};
pub use types::*;

#[cfg(test)]
mod testing;
