//! Domain layer: trace entities and the rules a write bundle must satisfy.

pub mod entities;
pub mod error;
pub mod traces;
