// src/circuit_breaker/mod.rs
mod breaker;

pub use breaker::{CircuitBreaker, CircuitBreakerManager, CircuitBreakerState, Clock, SystemClock};

#[cfg(test)]
pub(crate) use breaker::test_clock::ManualClock;
