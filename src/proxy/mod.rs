// src/proxy/mod.rs
mod forwarder;
mod proxy;

pub use forwarder::{ForwardError, Forwarder, HttpForwarder};
pub use proxy::{Proxy, ProxyError};
