//! # tolk-providers
//!
//! Translation service clients for tolk.

pub mod openai;
