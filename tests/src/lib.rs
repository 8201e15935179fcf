//! Shared helpers for the migration integration tests.

pub mod containers;
pub mod mocks;
pub mod setup;
