//! Infrastructure adapters and runtime bootstrap.

pub mod context;
pub mod db;
pub mod error;
pub mod http;
pub mod telemetry;
