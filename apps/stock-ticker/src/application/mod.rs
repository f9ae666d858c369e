//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the stock store interacts with subscribers.

/// Port interfaces for subscribers and broadcast.
pub mod ports;

/// Application services: update cycle, scheduler, and the ticker facade.
pub mod services;
