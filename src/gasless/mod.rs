pub mod circuit_breaker;
pub mod client;
pub mod retry;
pub mod transport;
pub mod types;

#[cfg(test)]
mod tests;

pub use circuit_breaker::{BreakerSnapshot, BreakerState, CircuitBreakerConfig};
pub use client::{GaslessConfig, GaslessSponsorClient};
pub use retry::RetryPolicy;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::{Eligibility, SponsorshipResult, TypedData, TypedDataDomain, TypedDataField};
