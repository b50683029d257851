//! Application services: the write and read paths over the trace store.

pub mod error;
pub mod repos;
pub mod traces;
pub mod window;
