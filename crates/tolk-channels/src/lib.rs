//! # tolk-channels
//!
//! Messaging platform integrations for tolk.

pub mod telegram;
