//! Domain Layer - Stock state and the price walk.
//!
//! This layer contains the core ticker types with no I/O. Everything here
//! is synchronous and safe to share across threads.

/// Stock entities, price updates, and the concurrent stock store.
pub mod stock;

/// Randomized price mutation policy.
pub mod pricing;
