//! Vestige: bounded player traces served from a compressed read-through cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
