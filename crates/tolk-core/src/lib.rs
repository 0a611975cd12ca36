//! # tolk-core
//!
//! Core types, traits, configuration, rate limiting, and the language table for tolk.

pub mod config;
pub mod error;
pub mod languages;
pub mod message;
pub mod outcome;
pub mod rate_limit;
pub mod traits;
