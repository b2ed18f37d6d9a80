//! Provider-facing endpoints (data), retry policy, and strategies (behavior).
//!
//! `endpoints` names the URIs a credential talks to and ships Google defaults. `retry` decides
//! which response statuses are worth one refresh-and-retry. `strategy` defines
//! [`ProviderStrategy`], an HTTP-client-agnostic hook that augments token requests and decides
//! how provider errors affect a credential.

pub mod endpoints;
pub mod retry;
pub mod strategy;

pub use endpoints::*;
pub use retry::*;
pub use strategy::*;
