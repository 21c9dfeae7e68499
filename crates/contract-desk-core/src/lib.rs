//! # Contract Desk Core
//!
//! Shared, I/O-free logic for Contract Desk: contract models, category
//! bucketing, the representative sampler, contract filters, text
//! preprocessing for LLM context limits, LLM response parsing, and the
//! store abstraction.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Everything here is a pure function of its inputs (the in-memory store
//! aside), which keeps the sampler and the parsers trivially testable.

pub mod analysis;
pub mod category;
pub mod chunk;
pub mod custom_filter;
pub mod filter;
pub mod models;
pub mod sampler;
pub mod store;
pub mod text;
