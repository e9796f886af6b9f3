// src/server/mod.rs
pub mod builder;
pub mod handler;
pub mod listener;

pub use builder::ServerBuilder;
pub use handler::{AppState, RequestHandler};
