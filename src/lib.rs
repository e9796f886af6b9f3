// src/lib.rs
pub mod config;
pub mod server;
pub mod proxy;
pub mod selector;
pub mod health;
pub mod circuit_breaker;
pub mod metrics;
