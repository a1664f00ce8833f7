//! Persistence-layer integration tests.
//!
//! Exercises the full stack end to end: facade, worker lanes, root
//! context, merge policy, change notification, reactive queries, and the
//! durable store. Split into end-to-end scenarios and cross-cutting
//! property tests.

mod common;
mod properties;
mod scenarios;
